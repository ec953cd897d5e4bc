//! Baking: sampling an action as it is seen on one armature and keying the
//! result onto another.
//!
//! Every bone of the destination skeleton is linked to a bone of the
//! original. At each frame the original is evaluated in full (constraints
//! included) and each destination bone is keyed with whatever local
//! location/rotation/scale puts it exactly where its linked bone is in world
//! space. The baked action doesn't refer to the original in any way.

use anim::{pose_bone_path, Action, Channel, FrameRange, Interpolation, Keyframe};
use anim::{LOCATION, ROTATION_QUATERNION, SCALE};
use cgmath::{Matrix4, One, Quaternion, SquareMatrix};
use errors::{ErrorKind, Result};
use pose::trs::{make_continuous, TRS};
use pose::{evaluate_pose_at, BoneSpace, RestPose};
use scene::{ActionId, ObjectId, Scene};
use skeleton::{Hierarchy, DEF_PREFIX, ROOT_NAME};
use std::collections::HashMap;
use util::namers::UniqueNamer;

/// Appended to the name of a baked action.
pub static CONVERTED_SUFFIX: &str = "_Converted";

/// One action to bake, and over which frames.
#[derive(Debug, Copy, Clone)]
pub struct BakeJob {
    pub action: ActionId,
    pub frames: FrameRange,
}

/// Destination bone name -> original bone name.
#[derive(Debug, Clone, Default)]
pub struct BoneLinks {
    links: HashMap<String, String>,
}

impl BoneLinks {
    /// Links bones with the same name. A destination bone that has already
    /// had its final name applied is linked to the bone it was named after
    /// (`spine` to `DEF-spine`, `root` to `root_name`).
    pub fn new(dest: &Hierarchy, original: &Hierarchy, root_name: &str) -> BoneLinks {
        let mut links = HashMap::new();
        for bone in dest.bones() {
            let name = bone.name();
            let deform_name = format!("{}{}", DEF_PREFIX, name);
            let source = if original.contains(name) {
                Some(name.to_string())
            } else if name == ROOT_NAME && original.contains(root_name) {
                Some(root_name.to_string())
            } else if original.contains(&deform_name) {
                Some(deform_name)
            } else {
                None
            };
            match source {
                Some(source) => { links.insert(name.to_string(), source); }
                None => warn!("bone {} has no counterpart to bake from; it won't be keyed", name),
            }
        }
        BoneLinks { links }
    }

    pub fn get(&self, dest_bone: &str) -> Option<&str> {
        self.links.get(dest_bone).map(|s| &s[..])
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }
}

/// Bakes `source` over the inclusive frame range `frames` onto `skeleton`.
/// Only linked bones are keyed. Unlinked bones hold their rest pose.
pub fn bake_action(
    scene: &Scene,
    skeleton: ObjectId,
    original: ObjectId,
    source: &Action,
    frames: (i64, i64),
    links: &BoneLinks,
) -> Result<Action> {
    let object = scene.get_object(skeleton)
        .ok_or_else(|| ErrorKind::NoSuchObject(format!("{}", skeleton)))?;
    let world_to_armature = match object.matrix_world.invert() {
        Some(inv) => inv,
        None => bail!("the world matrix of {} can't be inverted", object.name),
    };
    let h = &scene.armature(skeleton)?.hierarchy;
    let rest = RestPose::of(h);
    let order = h.depth_first();

    // Per bone, the local transform at every frame.
    let mut samples: Vec<Vec<TRS>> = vec![vec![]; h.len()];

    for frame in frames.0..=frames.1 {
        let pose = evaluate_pose_at(scene, original, Some(source), frame as f64)?;

        let mut posed = vec![Matrix4::one(); h.len()];
        for &idx in &order {
            let parent_pose = h.parent(idx).map(|p| posed[p.index()]);
            let space = BoneSpace::new(h, &rest, idx, parent_pose.as_ref());
            let target = links.get(h[idx].name()).and_then(|name| pose.world(name));
            match target {
                Some(world) => {
                    let local = space.solve(&(world_to_armature * world));
                    posed[idx.index()] = space.apply(&local);
                    samples[idx.index()].push(local);
                }
                None => {
                    posed[idx.index()] = space.apply(&TRS::identity());
                }
            }
        }
    }

    let mut action = Action::new(format!("{}{}", source.name, CONVERTED_SUFFIX));
    action.fake_user = true;
    for &idx in &order {
        let trses = &samples[idx.index()];
        if trses.is_empty() {
            continue;
        }
        let name = h[idx].name();

        let mut rotations: Vec<Quaternion<f64>> = trses.iter().map(|trs| trs.rotation).collect();
        make_continuous(&mut rotations);

        let mut channels: Vec<Channel> = vec![];
        let mut add_channel = |prop: &str, index: usize, value: &dyn Fn(usize) -> f64| {
            let mut channel = Channel::new(pose_bone_path(name, prop), index);
            channel.group = Some(name.to_string());
            for (i, frame) in (frames.0..=frames.1).enumerate() {
                channel.curve.insert(Keyframe {
                    frame: frame as f64,
                    value: value(i),
                    interpolation: Interpolation::Linear,
                });
            }
            channels.push(channel);
        };
        add_channel(LOCATION, 0, &|i| trses[i].translation.x);
        add_channel(LOCATION, 1, &|i| trses[i].translation.y);
        add_channel(LOCATION, 2, &|i| trses[i].translation.z);
        add_channel(ROTATION_QUATERNION, 0, &|i| rotations[i].s);
        add_channel(ROTATION_QUATERNION, 1, &|i| rotations[i].v.x);
        add_channel(ROTATION_QUATERNION, 2, &|i| rotations[i].v.y);
        add_channel(ROTATION_QUATERNION, 3, &|i| rotations[i].v.z);
        add_channel(SCALE, 0, &|i| trses[i].scale.x);
        add_channel(SCALE, 1, &|i| trses[i].scale.y);
        add_channel(SCALE, 2, &|i| trses[i].scale.z);

        action.channels.extend(channels);
    }

    Ok(action)
}

/// Removes channels that don't animate a bone of `h`. Returns how many were
/// removed.
pub fn drop_orphan_channels(action: &mut Action, h: &Hierarchy) -> usize {
    let before = action.channels.len();
    action.channels.retain(|c| c.bone_name().map(|bone| h.contains(bone)).unwrap_or(false));
    before - action.channels.len()
}

/// Adds a baked action to the scene. If the name is taken the old action is
/// replaced in place when `overwrite` is set; otherwise the new one is given
/// a fresh name.
pub fn store_action(scene: &mut Scene, mut action: Action, overwrite: bool) -> Result<ActionId> {
    match scene.find_action(&action.name) {
        Some(existing) if overwrite => {
            debug!("replacing action {}", action.name);
            scene.replace_action(existing, action)?;
            Ok(existing)
        }
        Some(_) => {
            let fresh = UniqueNamer::with_taken(scene.action_names())
                .get_fresh_name(&action.name);
            warn!("there's already an action named {}; saving as {} instead", action.name, fresh);
            action.name = fresh;
            Ok(scene.add_action(action))
        }
        None => Ok(scene.add_action(action)),
    }
}

/// Bakes every job in order onto `skeleton` and stores the results. Returns
/// the new actions, one per job.
pub fn bake_actions(
    scene: &mut Scene,
    skeleton: ObjectId,
    original: ObjectId,
    jobs: &[BakeJob],
    root_name: &str,
    overwrite: bool,
) -> Result<Vec<ActionId>> {
    let links = BoneLinks::new(
        &scene.armature(skeleton)?.hierarchy,
        &scene.armature(original)?.hierarchy,
        root_name,
    );
    debug!("{} bones linked for baking", links.len());

    let mut baked_ids = Vec::with_capacity(jobs.len());
    for job in jobs {
        let baked = {
            let source = scene.get_action(job.action)
                .ok_or_else(|| ErrorKind::NoSuchAction(format!("{}", job.action)))?;
            let frames = job.frames.resolve(source)?;
            info!("baking {} (frames {} to {})", source.name, frames.0, frames.1);
            let mut baked = bake_action(scene, skeleton, original, source, frames, &links)?;
            let dropped = drop_orphan_channels(&mut baked, &scene.armature(skeleton)?.hierarchy);
            if dropped != 0 {
                debug!("dropped {} channels for missing bones", dropped);
            }
            baked
        };
        baked_ids.push(store_action(scene, baked, overwrite)?);
    }
    Ok(baked_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::vec3;
    use pose::trs::assert_matrix_eq;
    use scene::{Armature, Object, ObjectData};
    use skeleton::copy::copy_bones;
    use skeleton::reduce::reduce;
    use testing::rig_scene;

    /// Adds the reduced copy of the test rig to the scene.
    fn add_reduced(scene: &mut Scene, rig: ObjectId) -> ObjectId {
        let mut h = {
            let original = &scene.armature(rig).unwrap().hierarchy;
            let rolls = original.rolls();
            copy_bones(original, &original.roots(), |name| rolls.get(name).cloned()).unwrap()
        };
        reduce(&mut h, "root").unwrap();
        scene.add_object(Object::new("rig_Converted", ObjectData::Armature(Armature::new("rig_Converted", h))))
    }

    #[test]
    fn baked_pose_matches_original() {
        let mut t = rig_scene();
        let new = add_reduced(&mut t.scene, t.rig);
        let jobs = [BakeJob { action: t.walk, frames: FrameRange::default() }];
        let ids = bake_actions(&mut t.scene, new, t.rig, &jobs, "root", false).unwrap();
        assert_eq!(ids.len(), 1);

        let baked = &t.scene[ids[0]];
        assert_eq!(baked.name, "walk_Converted");
        assert!(baked.fake_user);
        // 3 bones, 10 channels each, 24 keys each.
        assert_eq!(baked.channels.len(), 30);
        for channel in &baked.channels {
            assert_eq!(channel.curve.keyframes().len(), 24);
            assert_eq!(channel.curve.frame_range(), Some((1.0, 24.0)));
            assert_eq!(channel.group.as_ref().map(|g| &g[..]), channel.bone_name());
        }

        let walk = t.scene[t.walk].clone();
        for &frame in &[1.0, 7.0, 13.0, 24.0] {
            let want = evaluate_pose_at(&t.scene, t.rig, Some(&walk), frame).unwrap();
            let got = evaluate_pose_at(&t.scene, new, Some(baked), frame).unwrap();
            for name in &["root", "DEF-spine", "DEF-arm"] {
                assert_matrix_eq(&got.world(name).unwrap(), &want.world(name).unwrap(), 1e-6);
            }
        }
    }

    #[test]
    fn connected_bone_moved_to_the_root() {
        let mut t = rig_scene();
        {
            let h = &mut t.scene.armature_mut(t.rig).unwrap().hierarchy;
            let arm = h.find("DEF-arm").unwrap();
            h[arm].flags.connect = true;
            h[arm].head = vec3(0.0, 0.5, 2.0);
            h[arm].tail = vec3(1.0, 0.5, 2.0);
        }
        let new = add_reduced(&mut t.scene, t.rig);
        let jobs = [BakeJob { action: t.walk, frames: FrameRange::default() }];
        let ids = bake_actions(&mut t.scene, new, t.rig, &jobs, "root", false).unwrap();

        let walk = t.scene[t.walk].clone();
        let baked = &t.scene[ids[0]];
        for &frame in &[1.0, 12.0, 24.0] {
            let want = evaluate_pose_at(&t.scene, t.rig, Some(&walk), frame).unwrap();
            let got = evaluate_pose_at(&t.scene, new, Some(baked), frame).unwrap();
            assert_matrix_eq(&got.world("DEF-arm").unwrap(), &want.world("DEF-arm").unwrap(), 1e-6);
        }
    }

    #[test]
    fn baking_leaves_inputs_alone() {
        let mut t = rig_scene();
        let new = add_reduced(&mut t.scene, t.rig);
        let walk_before = t.scene[t.walk].clone();
        let jobs = [BakeJob { action: t.walk, frames: FrameRange { start: 5, end: 6 } }];
        bake_actions(&mut t.scene, new, t.rig, &jobs, "root", false).unwrap();

        assert_eq!(t.scene[t.walk], walk_before);
        assert_eq!(t.scene.armature(t.rig).unwrap().active_action, Some(t.idle));
        assert_eq!(t.scene.armature(new).unwrap().active_action, None);
        for bone in t.scene.armature(new).unwrap().hierarchy.bones() {
            assert!(bone.constraints.is_empty());
        }
    }

    #[test]
    fn rebaking_is_stable() {
        let mut t = rig_scene();
        let new = add_reduced(&mut t.scene, t.rig);
        let jobs = [BakeJob { action: t.walk, frames: FrameRange::default() }];
        let first = bake_actions(&mut t.scene, new, t.rig, &jobs, "root", true).unwrap();
        let first_action = t.scene[first[0]].clone();
        let second = bake_actions(&mut t.scene, new, t.rig, &jobs, "root", true).unwrap();

        // Replaced in place.
        assert_eq!(first, second);
        assert_eq!(t.scene.actions().filter(|&(_, a)| a.name == "walk_Converted").count(), 1);
        assert_eq!(t.scene[second[0]], first_action);
    }

    #[test]
    fn collisions_get_fresh_names_without_overwrite() {
        let mut t = rig_scene();
        let new = add_reduced(&mut t.scene, t.rig);
        let jobs = [BakeJob { action: t.walk, frames: FrameRange::default() }];
        let first = bake_actions(&mut t.scene, new, t.rig, &jobs, "root", false).unwrap();
        let second = bake_actions(&mut t.scene, new, t.rig, &jobs, "root", false).unwrap();
        assert_ne!(first, second);
        assert_eq!(t.scene[first[0]].name, "walk_Converted");
        assert_eq!(t.scene[second[0]].name, "walk_Converted1");
    }

    #[test]
    fn bad_ranges_are_rejected() {
        let mut t = rig_scene();
        let new = add_reduced(&mut t.scene, t.rig);
        let jobs = [BakeJob { action: t.walk, frames: FrameRange { start: 30, end: 10 } }];
        match *bake_actions(&mut t.scene, new, t.rig, &jobs, "root", false).unwrap_err().kind() {
            ErrorKind::BadFrameRange(ref name, 30, 10) => assert_eq!(name, "walk"),
            ref e => panic!("unexpected error {:?}", e),
        }
    }

    #[test]
    fn renamed_bones_link_to_their_sources() {
        let t = rig_scene();
        let original = &t.scene.armature(t.rig).unwrap().hierarchy;
        let dest = ::skeleton::hierarchy_from_pairs(&[
            ("root", None),
            ("spine", Some("root")),
            ("DEF-arm", Some("spine")),
            ("tail", Some("root")),
        ]);
        let links = BoneLinks::new(&dest, original, "root");
        assert_eq!(links.get("root"), Some("root"));
        assert_eq!(links.get("spine"), Some("DEF-spine"));
        assert_eq!(links.get("DEF-arm"), Some("DEF-arm"));
        assert_eq!(links.get("tail"), None);

        let mut h = dest.clone();
        let idx = h.find("root").unwrap();
        h.rename_bone(idx, "torso").unwrap();
        let links = BoneLinks::new(&h, original, "root");
        assert_eq!(links.get("torso"), None);
    }

    #[test]
    fn orphan_channels_are_dropped() {
        let h = ::skeleton::hierarchy_from_pairs(&[("root", None), ("DEF-spine", Some("root"))]);
        let mut action = Action::new("a");
        action.channels.push(Channel::new(pose_bone_path("DEF-spine", LOCATION), 0));
        action.channels.push(Channel::new(pose_bone_path("MCH-gone", LOCATION), 0));
        action.channels.push(Channel::new("location", 0));
        assert_eq!(drop_orphan_channels(&mut action, &h), 2);
        assert_eq!(action.channels.len(), 1);
    }
}
