use anim::FrameRange;
use args::read_input;
use clap::ArgMatches;
use errors::Result;
use scene::{Armature, Mesh, Modifier, Object, ObjectData, ObjectId, Scene};
use skeleton::{BoneRole, Constraint};

pub fn main(matches: &ArgMatches) -> Result<()> {
    let scene = read_input(matches)?;

    let num_objects = scene.objects().count();
    let num_actions = scene.actions().count();
    let plural = |x| if x != 1 { "s" } else { "" };
    println!("Found {} object{}.", num_objects, plural(num_objects));
    println!("Found {} action{}.", num_actions, plural(num_actions));
    println!();

    for (_, object) in scene.objects() {
        object_info(&scene, object);
    }
    for (_, action) in scene.actions() {
        print!("Action {:?}: {} channel{}, ",
            action.name, action.channels.len(), plural(action.channels.len()));
        match FrameRange::default().resolve(action) {
            Ok((start, end)) => print!("frames {} to {}", start, end),
            Err(_) => print!("no keyframes"),
        }
        if action.fake_user {
            print!(" (fake user)");
        }
        println!();
    }

    Ok(())
}

fn object_name(scene: &Scene, id: Option<ObjectId>) -> String {
    match id.and_then(|id| scene.get_object(id)) {
        Some(o) => format!("{:?}", o.name),
        None => "none".to_string(),
    }
}

fn object_info(scene: &Scene, object: &Object) {
    match object.data {
        ObjectData::Armature(ref arm) => {
            println!("Armature {:?}:", object.name);
            println!("  Parent: {}", object_name(scene, object.parent));
            armature_info(scene, arm);
        }
        ObjectData::Mesh(ref mesh) => {
            println!("Mesh {:?}:", object.name);
            println!("  Parent: {}", object_name(scene, object.parent));
            mesh_info(scene, mesh);
        }
    }
}

fn armature_info(scene: &Scene, arm: &Armature) {
    let h = &arm.hierarchy;
    if let Some(ref rig_id) = arm.rig_id {
        println!("  Rig ID: {}", rig_id);
    }
    if let Some(action) = arm.active_action.and_then(|id| scene.get_action(id)) {
        println!("  Active Action: {:?}", action.name);
    }

    let count = |role| h.bones().filter(|bone| bone.role() == role).count();
    println!("  Bones ({} total, {} DEF, {} ORG, {} MCH):", h.len(),
        count(BoneRole::Deform), count(BoneRole::Organizational), count(BoneRole::Mechanism));

    // Indent by depth.
    for idx in h.depth_first() {
        let mut depth = 0;
        let mut cur = idx;
        while let Some(parent) = h.parent(cur) {
            depth += 1;
            cur = parent;
        }
        let bone = &h[idx];
        print!("    {:width$}{}", "", bone.name(), width = 2 * depth);
        let role = match bone.role() {
            BoneRole::Deform => "deform",
            BoneRole::Organizational => "organizational",
            BoneRole::Mechanism => "mechanism",
            BoneRole::Plain => "plain",
        };
        print!(" ({})", role);
        for constraint in &bone.constraints {
            let Constraint::CopyTransforms { target, ref subtarget } = *constraint;
            print!(" [copies {}/{:?}]", object_name(scene, Some(target)), subtarget);
        }
        println!();
    }
}

fn mesh_info(scene: &Scene, mesh: &Mesh) {
    println!("  Num Vertices: {}", mesh.vertices.len());
    println!("  Num Faces: {}", mesh.faces.len());
    println!("  Vertex Groups: {:?}", mesh.vertex_groups);
    for modifier in &mesh.modifiers {
        let Modifier::Armature { ref name, object } = *modifier;
        println!("  Armature Modifier {:?}: {}", name, object_name(scene, object));
    }
}
