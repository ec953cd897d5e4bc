//! Helpers shared by the subcommands for pulling things out of the command
//! line.

use clap::ArgMatches;
use errors::{ErrorKind, Result};
use scene::read::read_scene_file;
use scene::{ObjectId, Scene};
use std::path::PathBuf;

pub fn path_arg(matches: &ArgMatches, name: &str) -> Result<PathBuf> {
    match matches.value_of_os(name) {
        Some(os_str) => Ok(PathBuf::from(os_str)),
        None => bail!("missing argument {}", name),
    }
}

/// Reads the scene named by the INPUT argument.
pub fn read_input(matches: &ArgMatches) -> Result<Scene> {
    let path = path_arg(matches, "INPUT")?;
    debug!("reading {}", path.to_string_lossy());
    read_scene_file(&path)
}

/// The armature named by `--rig`, or else the only rig in the scene.
pub fn pick_rig(scene: &Scene, matches: &ArgMatches) -> Result<ObjectId> {
    if let Some(name) = matches.value_of("rig") {
        let id = scene.find_object(name)
            .ok_or_else(|| ErrorKind::NoSuchObject(name.to_string()))?;
        scene.armature(id)?;
        return Ok(id);
    }

    let rigs: Vec<ObjectId> = scene.objects()
        .filter(|&(id, _)| scene.armature(id).map(|arm| arm.is_rig()).unwrap_or(false))
        .map(|(id, _)| id)
        .collect();
    match rigs.len() {
        1 => Ok(rigs[0]),
        0 => bail!("no rigs in the scene"),
        n => bail!("{} rigs in the scene; pick one with --rig", n),
    }
}
