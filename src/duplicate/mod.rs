//! Proxy skeletons that follow a rig.
//!
//! A duplicate has the same reduced bones a conversion would produce, but
//! instead of baked actions every bone gets a transform-copy constraint on
//! its counterpart in the original, so it follows whatever the original is
//! doing, live. The rig's meshes are copied and bound to the proxy.

use args::{path_arg, pick_rig, read_input};
use bake::CONVERTED_SUFFIX;
use clap::ArgMatches;
use errors::{ErrorKind, Result};
use scene::write::write_scene_file;
use scene::{Armature, Modifier, ObjectData, ObjectId, Scene};
use skeleton::copy::copy_bones;
use skeleton::reduce::reduce;
use skeleton::rename::{rename, rename_vertex_groups};
use skeleton::{BoneRole, Constraint, Hierarchy};
use anim::Action;
use std::iter;
use util::first_if_only;

pub fn main(matches: &ArgMatches) -> Result<()> {
    let mut scene = read_input(matches)?;
    let rig = pick_rig(&scene, matches)?;
    let suffix = matches.value_of("suffix").unwrap_or(CONVERTED_SUFFIX);

    let output = duplicate_rig(&mut scene, rig, suffix)?;

    println!("Skeleton: {}", scene[output.skeleton].name);
    for &mesh in &output.meshes {
        println!("Mesh: {}", scene[mesh].name);
    }

    let out_path = path_arg(matches, "OUTPUT")?;
    write_scene_file(&out_path, &scene)?;
    debug!("wrote {}", out_path.to_string_lossy());

    Ok(())
}

#[derive(Debug, Clone)]
pub struct DuplicateOutput {
    pub skeleton: ObjectId,
    /// One per mesh child of the original, in the same order.
    pub meshes: Vec<ObjectId>,
}

/// Makes `<rig><suffix>`, a following proxy of `rig`, and a
/// `<mesh><suffix>` for each of its mesh children, of which there must be at
/// least one. Existing objects with those names are overwritten. On error the
/// scene is left as it was.
pub fn duplicate_rig(scene: &mut Scene, rig: ObjectId, suffix: &str) -> Result<DuplicateOutput> {
    let mut work = scene.clone();
    let output = duplicate_in_place(&mut work, rig, suffix)?;
    *scene = work;
    Ok(output)
}

/// The root is the only parentless bone without a role prefix.
fn find_root(h: &Hierarchy, object_name: &str) -> Result<String> {
    let candidates = || {
        h.roots().into_iter().filter(move |&idx| h[idx].role() == BoneRole::Plain)
    };
    match first_if_only(candidates()) {
        Some(idx) => Ok(h[idx].name().to_string()),
        None => bail!(ErrorKind::AmbiguousRoot(object_name.to_string(), candidates().count())),
    }
}

fn duplicate_in_place(scene: &mut Scene, rig: ObjectId, suffix: &str) -> Result<DuplicateOutput> {
    let rig_name = scene[rig].name.clone();
    let skeleton_name = format!("{}{}", rig_name, suffix);
    let mesh_children = scene.mesh_children(rig);
    if mesh_children.is_empty() {
        bail!(ErrorKind::MeshCount(rig_name, 0));
    }

    let (mut h, root_name) = {
        let arm = scene.armature(rig)?;
        if !arm.is_rig() {
            bail!(ErrorKind::NotARig(rig_name.clone()));
        }
        let original = &arm.hierarchy;
        let root_name = find_root(original, &rig_name)?;
        debug!("root bone of {} is {}", rig_name, root_name);
        let rolls = original.rolls();
        let h = copy_bones(original, &original.roots(), |name| rolls.get(name).cloned())?;
        (h, root_name)
    };

    // Writing over one of the inputs would destroy it.
    let mesh_names: Vec<String> = mesh_children.iter()
        .map(|&mesh| format!("{}{}", scene[mesh].name, suffix))
        .collect();
    let inputs: Vec<&str> = iter::once(rig)
        .chain(mesh_children.iter().cloned())
        .map(|id| &scene[id].name[..])
        .collect();
    for name in iter::once(&skeleton_name).chain(mesh_names.iter()) {
        if inputs.contains(&&name[..]) {
            bail!(ErrorKind::NameOccupied(name.clone()));
        }
    }

    reduce(&mut h, &root_name)?;

    // Link every bone to its counterpart by the name it has now, ie. the
    // name in the original.
    let idxs: Vec<_> = h.bone_idxs().collect();
    for idx in idxs {
        let subtarget = h[idx].name().to_string();
        h[idx].constraints.push(Constraint::CopyTransforms { target: rig, subtarget });
    }

    let renames = rename(&mut h, iter::empty::<&mut Action>(), &root_name)?;

    let num_bones = h.len();
    let armature = Armature::new(skeleton_name.clone(), h);
    let skeleton = scene.place_object(&skeleton_name, ObjectData::Armature(armature), true)?.id();

    let mut meshes = Vec::with_capacity(mesh_children.len());
    for (&original, name) in mesh_children.iter().zip(mesh_names) {
        let mut data = scene.mesh(original)?.clone();
        data.data_name = name.clone();
        data.modifiers = vec![Modifier::Armature {
            name: "Armature".to_string(),
            object: Some(skeleton),
        }];
        rename_vertex_groups(&mut data, &renames);
        let mesh = scene.place_object(&name, ObjectData::Mesh(data), true)?.id();
        scene[mesh].parent = Some(skeleton);
        meshes.push(mesh);
    }

    info!("duplicated {} as {} ({} bones, {} mesh{})",
        rig_name, skeleton_name, num_bones, meshes.len(), if meshes.len() == 1 { "" } else { "es" });

    Ok(DuplicateOutput { skeleton, meshes })
}
