mod options;
mod rig;

use self::options::ConvertOptions;
use self::rig::convert_rig;

use args::{path_arg, pick_rig, read_input};
use bake::CONVERTED_SUFFIX;
use clap::ArgMatches;
use errors::{ErrorKind, Result};
use scene::write::write_scene_file;
use scene::{ActionId, ObjectId, Scene};

pub fn main(matches: &ArgMatches) -> Result<()> {
    let mut scene = read_input(matches)?;
    let options = ConvertOptions::from_arg_matches(matches)?;

    let rig = pick_rig(&scene, matches)?;
    let mesh = pick_mesh(&scene, rig, matches)?;
    let actions = pick_actions(&scene, matches)?;
    for name in options.frames.keys() {
        if !actions.iter().any(|&id| &scene[id].name == name) {
            warn!("--frames given for {}, which isn't being converted", name);
        }
    }

    let output = convert_rig(&mut scene, rig, mesh, &actions, &options)?;

    println!("Skeleton: {}", scene[output.skeleton].name);
    println!("Mesh: {}", scene[output.mesh].name);
    let plural = |x| if x != 1 { "s" } else { "" };
    println!("Converted {} action{}.", output.actions.len(), plural(output.actions.len()));
    for &id in &output.actions {
        println!("  {}", scene[id].name);
    }

    let out_path = path_arg(matches, "OUTPUT")?;
    write_scene_file(&out_path, &scene)?;
    debug!("wrote {}", out_path.to_string_lossy());

    Ok(())
}

/// The mesh named by `--mesh`, or else the one mesh parented to `rig`.
fn pick_mesh(scene: &Scene, rig: ObjectId, matches: &ArgMatches) -> Result<ObjectId> {
    if let Some(name) = matches.value_of("mesh") {
        let id = scene.find_object(name)
            .ok_or_else(|| ErrorKind::NoSuchObject(name.to_string()))?;
        scene.mesh(id)?;
        return Ok(id);
    }
    let meshes = scene.mesh_children(rig);
    if meshes.len() != 1 {
        bail!(ErrorKind::MeshCount(scene[rig].name.clone(), meshes.len()));
    }
    Ok(meshes[0])
}

/// The actions named with `-a`, or else every action that isn't itself the
/// result of a conversion.
fn pick_actions(scene: &Scene, matches: &ArgMatches) -> Result<Vec<ActionId>> {
    match matches.values_of("action") {
        Some(names) => names
            .map(|name| {
                scene.find_action(name)
                    .ok_or_else(|| ErrorKind::NoSuchAction(name.to_string()).into())
            })
            .collect(),
        None => Ok(scene.actions()
            .filter(|&(_, action)| !action.name.ends_with(CONVERTED_SUFFIX))
            .map(|(id, _)| id)
            .collect()),
    }
}
