//! Converting a rig into a plain deform skeleton with baked actions.

use bake::{bake_actions, BakeJob, CONVERTED_SUFFIX};
use convert::options::ConvertOptions;
use errors::{ErrorKind, Result};
use scene::{ActionId, Armature, Modifier, ObjectData, ObjectId, ObjectKind, Scene};
use skeleton::copy::copy_bones;
use skeleton::reduce::{plan_reduction, reduce};
use skeleton::rename::{rename_bones, rename_channels, rename_vertex_groups, renames_root};

/// What a conversion made.
#[derive(Debug, Clone)]
pub struct ConvertOutput {
    pub skeleton: ObjectId,
    pub mesh: ObjectId,
    /// The converted actions, in the order they were asked for.
    pub actions: Vec<ActionId>,
}

/// Converts `rig` and its mesh `mesh`, baking each of `actions`.
///
/// Produces `<rig>_Converted`, an armature with only the DEF- bones and the
/// root (renamed), `<mesh>_Converted`, a copy of the mesh bound to it, and an
/// `<action>_Converted` for every action. On error the scene is left as it
/// was.
pub fn convert_rig(
    scene: &mut Scene,
    rig: ObjectId,
    mesh: ObjectId,
    actions: &[ActionId],
    options: &ConvertOptions,
) -> Result<ConvertOutput> {
    let mut work = scene.clone();
    let output = convert_in_place(&mut work, rig, mesh, actions, options)?;
    *scene = work;
    Ok(output)
}

fn convert_in_place(
    scene: &mut Scene,
    rig: ObjectId,
    mesh: ObjectId,
    actions: &[ActionId],
    options: &ConvertOptions,
) -> Result<ConvertOutput> {
    let root_name = &options.root_bone[..];
    let overwrite = options.overwrite;

    let jobs = check_preconditions(scene, rig, mesh, actions, options)?;
    let rig_name = scene[rig].name.clone();
    let skeleton_name = format!("{}{}", rig_name, CONVERTED_SUFFIX);
    let mesh_name = format!("{}{}", scene[mesh].name, CONVERTED_SUFFIX);

    // Build the reduced skeleton.
    let mut h = {
        let original = &scene.armature(rig)?.hierarchy;
        let rolls = original.rolls();
        copy_bones(original, &original.roots(), |name| rolls.get(name).cloned())?
    };
    debug!("copied {} bones", h.len());
    reduce(&mut h, root_name)?;
    debug!("reduced to {} bones", h.len());

    // The names the bones will end up with, for the vertex groups.
    let renames = rename_bones(&mut h.clone(), root_name)?;

    let armature = Armature::new(skeleton_name.clone(), h);
    let skeleton = scene.place_object(&skeleton_name, ObjectData::Armature(armature), overwrite.objects())?;
    if !skeleton.has_new_data() {
        warn!("reusing the existing skeleton {}", skeleton_name);
    }
    let skeleton = skeleton.id();

    let mut mesh_data = scene.mesh(mesh)?.clone();
    mesh_data.data_name = mesh_name.clone();
    mesh_data.modifiers = vec![Modifier::Armature {
        name: "Armature".to_string(),
        object: Some(skeleton),
    }];
    rename_vertex_groups(&mut mesh_data, &renames);
    let new_mesh = scene.place_object(&mesh_name, ObjectData::Mesh(mesh_data), overwrite.objects())?;
    if new_mesh.has_new_data() {
        scene[new_mesh.id()].parent = Some(skeleton);
    } else {
        warn!("reusing the existing mesh {}", mesh_name);
    }
    let new_mesh = new_mesh.id();

    // Bake before renaming; baked channels name the bones as they are now.
    let baked = bake_actions(scene, skeleton, rig, &jobs, root_name, overwrite.actions())?;

    let final_renames = rename_bones(&mut scene.armature_mut(skeleton)?.hierarchy, root_name)?;
    let rename_root = renames_root(&final_renames, root_name);
    for &id in &baked {
        rename_channels(&mut scene[id], root_name, rename_root);
    }

    info!("converted {} into {} with {} action{}",
        rig_name, skeleton_name, baked.len(), if baked.len() == 1 { "" } else { "s" });

    Ok(ConvertOutput { skeleton, mesh: new_mesh, actions: baked })
}

/// Everything that can be checked before touching the scene. Returns the
/// bake jobs.
fn check_preconditions(
    scene: &Scene,
    rig: ObjectId,
    mesh: ObjectId,
    actions: &[ActionId],
    options: &ConvertOptions,
) -> Result<Vec<BakeJob>> {
    let arm = scene.armature(rig)?;
    let rig_name = &scene[rig].name;
    if !arm.has_deform_bones() {
        bail!(ErrorKind::NotARig(rig_name.clone()));
    }
    plan_reduction(&arm.hierarchy, &options.root_bone)?;
    scene.mesh(mesh)?;

    let mut jobs = Vec::with_capacity(actions.len());
    for &action in actions {
        let a = scene.get_action(action)
            .ok_or_else(|| ErrorKind::NoSuchAction(format!("{}", action)))?;
        let frames = options.frames_for(&a.name);
        frames.resolve(a)?;
        jobs.push(BakeJob { action, frames });
    }

    let mesh_name = &scene[mesh].name;
    let overwrite = options.overwrite.objects();
    for &(ref name, kind) in &[
        (format!("{}{}", rig_name, CONVERTED_SUFFIX), ObjectKind::Armature),
        (format!("{}{}", mesh_name, CONVERTED_SUFFIX), ObjectKind::Mesh),
    ] {
        // Never replace one of the inputs.
        if name == rig_name || name == mesh_name {
            bail!(ErrorKind::NameOccupied(name.clone()));
        }
        scene.check_placeable(name, kind, overwrite)?;
    }

    Ok(jobs)
}
