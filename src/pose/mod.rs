//! Evaluating an armature's pose.
//!
//! A bone's rest matrix takes bone space to armature space. Bone space has
//! the bone's head at the origin and the Y axis running along the bone
//! (towards the tail), rolled about Y by the bone's roll.
//!
//! Posing a bone means applying its local transform (from the action's
//! location/rotation/scale channels) in the frame its parent has put it in;
//! see `BoneSpace`. Transform constraints are applied last and simply
//! overwrite the result.
//!
//! Evaluation is a pure function of the scene, an action and a frame. The
//! action to use is passed in, never swapped onto the armature.

pub mod trs;

use anim::{Action, Channel, LOCATION, ROTATION_EULER, ROTATION_QUATERNION, SCALE};
use cgmath::{InnerSpace, Matrix, Matrix3, Matrix4, One, Quaternion, Rad, Rotation3, SquareMatrix};
use cgmath::{Vector3, vec3};
use errors::{ErrorKind, Result};
use scene::{ObjectId, Scene};
use self::trs::{linear_part, TRS};
use skeleton::{Bone, BoneFlags, BoneIdx, Constraint, Hierarchy};
use std::collections::HashMap;

/// Bone space -> armature space, at rest.
pub fn rest_matrix(bone: &Bone) -> Matrix4<f64> {
    let up = vec3(0.0, 1.0, 0.0);
    let axis = bone.tail - bone.head;
    let dir = if axis.magnitude2() > 1e-12 { axis.normalize() } else { up };
    let align = Quaternion::from_arc(up, dir, Some(vec3(0.0, 0.0, 1.0)));
    let roll = Quaternion::from_angle_y(Rad(bone.roll));
    Matrix4::from_translation(bone.head) * Matrix4::from(align * roll)
}

/// Inverse of a rotation+translation matrix.
fn rigid_inverse(m: &Matrix4<f64>) -> Matrix4<f64> {
    let rt = linear_part(m).transpose();
    let t = -(rt * m.w.truncate());
    let mut inv = Matrix4::from(rt);
    inv.w = t.extend(1.0);
    inv
}

/// Rest matrices for every bone of a hierarchy.
pub struct RestPose {
    matrices: Vec<Matrix4<f64>>,
}

impl RestPose {
    pub fn of(h: &Hierarchy) -> RestPose {
        RestPose {
            matrices: h.bone_idxs().map(|idx| rest_matrix(&h[idx])).collect(),
        }
    }

    pub fn get(&self, idx: BoneIdx) -> &Matrix4<f64> {
        &self.matrices[idx.index()]
    }
}

/// The frame a bone's local transform acts in, given the (armature space)
/// pose of its parent.
///
/// With local location:
///
///     M = chain * T(loc) * R * S
///
/// without, location is measured along the parent's axes:
///
///     M = T(parent_axes * loc) * chain * R * S
///
/// where `chain` is the parent's pose (minus whatever rotation/scale the bone
/// doesn't inherit) times the bone's rest offset from its parent.
pub struct BoneSpace {
    chain: Matrix4<f64>,
    parent_axes: Matrix3<f64>,
    flags: BoneFlags,
}

impl BoneSpace {
    pub fn new(h: &Hierarchy, rest: &RestPose, idx: BoneIdx, parent_pose: Option<&Matrix4<f64>>) -> BoneSpace {
        let flags = h[idx].flags;
        let rest_m = rest.get(idx);
        let (chain, parent_axes) = match (h.parent(idx), parent_pose) {
            (Some(parent), Some(parent_pose)) => {
                let parent_rest = rest.get(parent);
                let offset = rigid_inverse(parent_rest) * *rest_m;
                let inherited = inherited_part(parent_pose, parent_rest, flags);
                let mut chain = inherited * offset;
                // The head always rides along with the parent.
                chain.w = *parent_pose * offset.w;
                (chain, linear_part(&inherited))
            }
            _ => (*rest_m, Matrix3::one()),
        };
        BoneSpace { chain, parent_axes, flags }
    }

    /// Armature-space pose matrix for a local transform.
    pub fn apply(&self, local: &TRS) -> Matrix4<f64> {
        let loc = if self.flags.connect { zero() } else { local.translation };
        let rs = Matrix4::from(&TRS { translation: zero(), ..*local });
        if self.flags.local_location {
            self.chain * Matrix4::from_translation(loc) * rs
        } else {
            Matrix4::from_translation(self.parent_axes * loc) * self.chain * rs
        }
    }

    /// The local transform that poses the bone at `pose` (armature space).
    /// Inverse of `apply` up to shear.
    pub fn solve(&self, pose: &Matrix4<f64>) -> TRS {
        let chain_inv = match self.chain.invert() {
            Some(inv) => inv,
            // Parent scaled to nothing.
            None => return TRS::identity(),
        };
        if self.flags.local_location {
            let mut trs = TRS::decompose(&(chain_inv * *pose));
            if self.flags.connect {
                trs.translation = zero();
            }
            trs
        } else {
            let shift = pose.w.truncate() - self.chain.w.truncate();
            let loc = match (self.flags.connect, self.parent_axes.invert()) {
                (false, Some(inv)) => inv * shift,
                _ => zero(),
            };
            let rs = chain_inv * Matrix4::from_translation(-(self.parent_axes * loc)) * *pose;
            let mut trs = TRS::decompose(&rs);
            trs.translation = loc;
            trs
        }
    }
}

fn zero() -> Vector3<f64> {
    vec3(0.0, 0.0, 0.0)
}

/// What a child sees of its parent's pose.
fn inherited_part(parent_pose: &Matrix4<f64>, parent_rest: &Matrix4<f64>, flags: BoneFlags) -> Matrix4<f64> {
    if flags.inherit_rotation && flags.inherit_scale {
        return *parent_pose;
    }
    let posed = TRS::decompose(parent_pose);
    let rotation = if flags.inherit_rotation {
        posed.rotation
    } else {
        TRS::decompose(parent_rest).rotation
    };
    let scale = if flags.inherit_scale { posed.scale } else { vec3(1.0, 1.0, 1.0) };
    Matrix4::from(&TRS { translation: posed.translation, rotation, scale })
}

/// An action's channels, grouped by the bone they animate.
fn channels_by_bone(action: &Action) -> HashMap<&str, Vec<&Channel>> {
    let mut map: HashMap<&str, Vec<&Channel>> = HashMap::new();
    for channel in &action.channels {
        if let Some(bone) = channel.bone_name() {
            map.entry(bone).or_insert_with(Vec::new).push(channel);
        }
    }
    map
}

/// A bone's local transform at `frame`. Unanimated components stay at rest.
pub fn local_transform(channels: &[&Channel], frame: f64) -> TRS {
    let has = |prop: &str| channels.iter().any(|c| c.property() == prop);
    let get = |prop: &str, index: usize, default: f64| {
        channels.iter()
            .find(|c| c.property() == prop && c.array_index == index)
            .and_then(|c| c.curve.sample(frame))
            .unwrap_or(default)
    };

    let translation = vec3(get(LOCATION, 0, 0.0), get(LOCATION, 1, 0.0), get(LOCATION, 2, 0.0));
    let scale = vec3(get(SCALE, 0, 1.0), get(SCALE, 1, 1.0), get(SCALE, 2, 1.0));

    let rotation = if has(ROTATION_QUATERNION) {
        let q = Quaternion::new(
            get(ROTATION_QUATERNION, 0, 1.0),
            get(ROTATION_QUATERNION, 1, 0.0),
            get(ROTATION_QUATERNION, 2, 0.0),
            get(ROTATION_QUATERNION, 3, 0.0),
        );
        if q.magnitude2() > 1e-12 { q.normalize() } else { Quaternion::one() }
    } else if has(ROTATION_EULER) {
        // XYZ order: X applied first.
        Quaternion::from_angle_z(Rad(get(ROTATION_EULER, 2, 0.0))) *
            Quaternion::from_angle_y(Rad(get(ROTATION_EULER, 1, 0.0))) *
            Quaternion::from_angle_x(Rad(get(ROTATION_EULER, 0, 0.0)))
    } else {
        Quaternion::one()
    };

    TRS { translation, rotation, scale }
}

/// The posed bones of one armature at one frame.
#[derive(Debug, Clone)]
pub struct Pose {
    pub object_matrix: Matrix4<f64>,
    /// Bone name -> pose matrix, in armature space.
    pub bones: HashMap<String, Matrix4<f64>>,
}

impl Pose {
    pub fn armature_space(&self, bone: &str) -> Option<&Matrix4<f64>> {
        self.bones.get(bone)
    }

    pub fn world(&self, bone: &str) -> Option<Matrix4<f64>> {
        self.bones.get(bone).map(|m| self.object_matrix * m)
    }
}

/// Evaluates armature `skeleton` driven by `action` at `frame`, including
/// constraints. Constraint targets are driven by their own active action.
pub fn evaluate_pose_at(scene: &Scene, skeleton: ObjectId, action: Option<&Action>, frame: f64) -> Result<Pose> {
    let mut evaluator = Evaluator {
        scene,
        frame,
        in_progress: vec![],
        targets: HashMap::new(),
    };
    evaluator.evaluate(skeleton, action)
}

struct Evaluator<'a> {
    scene: &'a Scene,
    frame: f64,
    /// Armatures being evaluated, innermost last.
    in_progress: Vec<ObjectId>,
    /// Finished constraint targets.
    targets: HashMap<ObjectId, Pose>,
}

impl<'a> Evaluator<'a> {
    fn evaluate(&mut self, id: ObjectId, action: Option<&Action>) -> Result<Pose> {
        if self.in_progress.contains(&id) {
            let name = self.scene.get_object(id).map(|o| o.name.clone()).unwrap_or_default();
            bail!(ErrorKind::ConstraintCycle(name));
        }
        self.in_progress.push(id);
        let res = self.evaluate_armature(id, action);
        self.in_progress.pop();
        res
    }

    fn evaluate_armature(&mut self, id: ObjectId, action: Option<&Action>) -> Result<Pose> {
        let scene = self.scene;
        let object_matrix = scene.get_object(id)
            .ok_or_else(|| ErrorKind::NoSuchObject(format!("{}", id)))?
            .matrix_world;
        let h = &scene.armature(id)?.hierarchy;
        let rest = RestPose::of(h);
        let channels = action.map(channels_by_bone).unwrap_or_default();
        let object_inv = object_matrix.invert();

        let mut matrices = vec![Matrix4::one(); h.len()];
        for idx in h.depth_first() {
            let bone = &h[idx];
            let parent_pose = h.parent(idx).map(|p| matrices[p.index()]);
            let space = BoneSpace::new(h, &rest, idx, parent_pose.as_ref());
            let local = match channels.get(bone.name()) {
                Some(chs) => local_transform(chs, self.frame),
                None => TRS::identity(),
            };
            let mut m = space.apply(&local);

            for constraint in &bone.constraints {
                match *constraint {
                    Constraint::CopyTransforms { target, ref subtarget } => {
                        match (self.target_world(target, subtarget)?, object_inv) {
                            (Some(world), Some(inv)) => m = inv * world,
                            (None, _) => {
                                debug!("{}: copy-transforms target {} is missing; ignored",
                                    bone.name(), subtarget);
                            }
                            (_, None) => {}
                        }
                    }
                }
            }

            matrices[idx.index()] = m;
        }

        let bones = h.bone_idxs()
            .map(|idx| (h[idx].name().to_string(), matrices[idx.index()]))
            .collect();
        Ok(Pose { object_matrix, bones })
    }

    /// World matrix of bone `bone` of armature `target`.
    fn target_world(&mut self, target: ObjectId, bone: &str) -> Result<Option<Matrix4<f64>>> {
        if !self.targets.contains_key(&target) {
            let scene = self.scene;
            let pose = self.evaluate(target, scene.active_action(target))?;
            self.targets.insert(target, pose);
        }
        Ok(self.targets.get(&target).and_then(|pose| pose.world(bone)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pose::trs::assert_matrix_eq;
    use anim::{pose_bone_path, Interpolation, Keyframe};
    use cgmath::{Deg, Vector4};
    use scene::{Armature, Object, ObjectData};
    use skeleton::hierarchy_from_pairs;

    fn arm_hierarchy() -> Hierarchy {
        let mut h = hierarchy_from_pairs(&[("upper", None), ("lower", Some("upper"))]);
        let upper = h.find("upper").unwrap();
        let lower = h.find("lower").unwrap();
        h[upper].head = vec3(0.0, 0.0, 0.0);
        h[upper].tail = vec3(1.0, 0.0, 0.0);
        h[lower].head = vec3(1.0, 0.0, 0.0);
        h[lower].tail = vec3(2.0, 0.0, 0.0);
        h[lower].roll = 0.3;
        h
    }

    fn key_channel(action: &mut Action, bone: &str, prop: &str, index: usize, keys: &[(f64, f64)]) {
        let path = pose_bone_path(bone, prop);
        let channel = action.channel_or_insert(&path, index, bone);
        for &(frame, value) in keys {
            channel.curve.insert(Keyframe { frame, value, interpolation: Interpolation::Linear });
        }
    }

    fn scene_with(h: Hierarchy) -> (Scene, ObjectId) {
        let mut scene = Scene::new();
        let id = scene.add_object(Object::new("arm", ObjectData::Armature(Armature::new("arm", h))));
        (scene, id)
    }

    #[test]
    fn rest_matrix_points_y_along_bone() {
        let mut bone = Bone::new("b");
        bone.head = vec3(1.0, 2.0, 3.0);
        bone.tail = vec3(1.0, 2.0, 5.0);
        let m = rest_matrix(&bone);
        let y = m * Vector4::new(0.0, 1.0, 0.0, 0.0);
        assert!((y.truncate() - vec3(0.0, 0.0, 1.0)).magnitude() < 1e-12);
        assert_eq!(m.w, Vector4::new(1.0, 2.0, 3.0, 1.0));

        // Roll spins the other axes about Y.
        bone.roll = 0.7;
        let rolled = rest_matrix(&bone);
        let y2 = rolled * Vector4::new(0.0, 1.0, 0.0, 0.0);
        assert!((y2 - y).magnitude() < 1e-12);
        assert!((rolled.x - m.x).magnitude() > 0.1);
        assert_matrix_eq(&(rigid_inverse(&rolled) * rolled), &Matrix4::one(), 1e-12);
    }

    #[test]
    fn unanimated_pose_is_rest() {
        let (scene, id) = scene_with(arm_hierarchy());
        let pose = evaluate_pose_at(&scene, id, None, 1.0).unwrap();
        let h = &scene.armature(id).unwrap().hierarchy;
        for bone in h.bones() {
            assert_matrix_eq(pose.armature_space(bone.name()).unwrap(), &rest_matrix(bone), 1e-12);
        }
    }

    #[test]
    fn children_follow_parents() {
        let (scene, id) = scene_with(arm_hierarchy());
        let mut action = Action::new("bend");
        // 90 degrees about the bone's Z axis at frame 10.
        let half = Deg(45.0f64);
        let (s, c) = (Rad::from(half).0.sin(), Rad::from(half).0.cos());
        key_channel(&mut action, "upper", ROTATION_QUATERNION, 0, &[(0.0, 1.0), (10.0, c)]);
        key_channel(&mut action, "upper", ROTATION_QUATERNION, 3, &[(0.0, 0.0), (10.0, s)]);

        let pose = evaluate_pose_at(&scene, id, Some(&action), 10.0).unwrap();
        // The upper bone now points along +Y (or -Y); the lower bone's head
        // sits at the upper bone's tail.
        let upper = pose.world("upper").unwrap();
        let lower = pose.world("lower").unwrap();
        let tail = upper * Vector4::new(0.0, 1.0, 0.0, 1.0);
        assert!((lower.w - tail).magnitude() < 1e-9);
        assert!(lower.w.x.abs() < 1e-9);
        assert!((lower.w.y.abs() - 1.0).abs() < 1e-9);

        // At frame 0 nothing has moved.
        let pose = evaluate_pose_at(&scene, id, Some(&action), 0.0).unwrap();
        assert!((pose.world("lower").unwrap().w - Vector4::new(1.0, 0.0, 0.0, 1.0)).magnitude() < 1e-9);
    }

    #[test]
    fn euler_and_quaternion_agree() {
        let mut a = Action::new("quat");
        let mut b = Action::new("euler");
        let q = Quaternion::from_angle_z(Deg(30.0)) *
            Quaternion::from_angle_y(Deg(20.0)) *
            Quaternion::from_angle_x(Deg(10.0));
        for (i, v) in [q.s, q.v.x, q.v.y, q.v.z].iter().enumerate() {
            key_channel(&mut a, "lower", ROTATION_QUATERNION, i, &[(0.0, *v)]);
        }
        for (i, deg) in [10.0f64, 20.0, 30.0].iter().enumerate() {
            key_channel(&mut b, "lower", ROTATION_EULER, i, &[(0.0, deg.to_radians())]);
        }
        let (scene, id) = scene_with(arm_hierarchy());
        let pa = evaluate_pose_at(&scene, id, Some(&a), 0.0).unwrap();
        let pb = evaluate_pose_at(&scene, id, Some(&b), 0.0).unwrap();
        assert_matrix_eq(&pa.world("lower").unwrap(), &pb.world("lower").unwrap(), 1e-9);
    }

    #[test]
    fn solve_inverts_apply() {
        let h = arm_hierarchy();
        let rest = RestPose::of(&h);
        let upper = h.find("upper").unwrap();
        let lower = h.find("lower").unwrap();
        let parent_pose = Matrix4::from_translation(vec3(0.2, 0.0, -1.0)) *
            Matrix4::from_angle_x(Deg(35.0)) *
            Matrix4::from_nonuniform_scale(1.0, 2.0, 1.0) *
            *rest.get(upper);
        let local = TRS {
            translation: vec3(0.1, 0.4, -0.3),
            rotation: Quaternion::from_angle_y(Deg(50.0)) * Quaternion::from_angle_x(Deg(-20.0)),
            scale: vec3(1.0, 1.0, 1.0),
        };

        let flag_sets = [
            (true, true, true),
            (false, true, true),
            (true, false, true),
            (true, true, false),
            (false, false, false),
        ];
        for &(local_location, inherit_rotation, inherit_scale) in &flag_sets {
            let mut h = h.clone();
            h[lower].flags.local_location = local_location;
            h[lower].flags.inherit_rotation = inherit_rotation;
            h[lower].flags.inherit_scale = inherit_scale;
            let space = BoneSpace::new(&h, &rest, lower, Some(&parent_pose));
            let posed = space.apply(&local);
            let solved = space.solve(&posed);
            assert_matrix_eq(&space.apply(&solved), &posed, 1e-9);
        }
    }

    #[test]
    fn copy_transforms_matches_target_world() {
        let mut scene = Scene::new();
        let mut action = Action::new("bend");
        key_channel(&mut action, "upper", ROTATION_EULER, 2, &[(0.0, 0.0), (10.0, 1.0)]);
        key_channel(&mut action, "lower", LOCATION, 1, &[(0.0, 0.0), (10.0, 0.5)]);
        let action = scene.add_action(action);

        let mut original = Object::new("orig", ObjectData::Armature(Armature::new("orig", arm_hierarchy())));
        original.matrix_world = Matrix4::from_translation(vec3(3.0, 0.0, 0.0)) * Matrix4::from_angle_z(Deg(90.0));
        let original = scene.add_object(original);
        scene.armature_mut(original).unwrap().active_action = Some(action);

        let mut proxy_h = arm_hierarchy();
        for name in &["upper", "lower"] {
            let idx = proxy_h.find(name).unwrap();
            proxy_h[idx].constraints.push(Constraint::CopyTransforms {
                target: original,
                subtarget: name.to_string(),
            });
        }
        let mut proxy = Object::new("proxy", ObjectData::Armature(Armature::new("proxy", proxy_h)));
        proxy.matrix_world = Matrix4::from_scale(2.0);
        let proxy = scene.add_object(proxy);

        for &frame in &[0.0, 4.0, 10.0] {
            let want = evaluate_pose_at(&scene, original, scene.active_action(original), frame).unwrap();
            let got = evaluate_pose_at(&scene, proxy, None, frame).unwrap();
            for name in &["upper", "lower"] {
                assert_matrix_eq(&got.world(name).unwrap(), &want.world(name).unwrap(), 1e-9);
            }
        }
    }

    #[test]
    fn constraint_cycles_are_errors() {
        let mut scene = Scene::new();
        let a = scene.add_object(Object::new("a", ObjectData::Armature(Armature::new("a", arm_hierarchy()))));
        let b = scene.add_object(Object::new("b", ObjectData::Armature(Armature::new("b", arm_hierarchy()))));
        for &(this, other) in &[(a, b), (b, a)] {
            let h = &mut scene.armature_mut(this).unwrap().hierarchy;
            let idx = h.find("upper").unwrap();
            h[idx].constraints.push(Constraint::CopyTransforms {
                target: other,
                subtarget: "upper".into(),
            });
        }
        match *evaluate_pose_at(&scene, a, None, 0.0).unwrap_err().kind() {
            ErrorKind::ConstraintCycle(_) => {}
            ref e => panic!("unexpected error {:?}", e),
        }
    }
}
