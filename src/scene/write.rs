//! Writing scenes as JSON. The inverse of `read.rs`.

use anim::{Action, Channel, Interpolation};
use cgmath::Vector3;
use errors::Result;
use json::{self, JsonValue};
use scene::{Armature, Mesh, Modifier, Object, ObjectData, Scene};
use skeleton::{Bone, Constraint, Hierarchy};
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub fn write_scene_file<P: AsRef<Path>>(path: P, scene: &Scene) -> Result<()> {
    let s = json::stringify_pretty(scene_to_json(scene), 2);
    let mut f = File::create(path)?;
    f.write_all(s.as_bytes())?;
    f.write_all(b"\n")?;
    Ok(())
}

pub fn scene_to_json(scene: &Scene) -> JsonValue {
    let mut objects = array!();
    for (_, object) in scene.objects() {
        objects.push(object_to_json(scene, object)).ok();
    }
    let mut actions = array!();
    for (_, action) in scene.actions() {
        actions.push(action_to_json(action)).ok();
    }
    object!(
        "objects" => objects,
        "actions" => actions,
    )
}

fn vec3_to_json(v: Vector3<f64>) -> JsonValue {
    array!(v.x, v.y, v.z)
}

fn object_to_json(scene: &Scene, object: &Object) -> JsonValue {
    let m: &[f64; 16] = object.matrix_world.as_ref();
    let (ty, data) = match object.data {
        ObjectData::Armature(ref arm) => ("ARMATURE", armature_to_json(scene, arm)),
        ObjectData::Mesh(ref mesh) => ("MESH", mesh_to_json(scene, mesh)),
    };
    object!(
        "name" => &object.name[..],
        "type" => ty,
        "parent" => object.parent.map(|p| scene[p].name.clone()),
        "matrix_world" => m.to_vec(),
        "data" => data,
    )
}

fn armature_to_json(scene: &Scene, arm: &Armature) -> JsonValue {
    object!(
        "name" => &arm.data_name[..],
        "rig_id" => arm.rig_id.clone(),
        "active_action" => arm.active_action
            .and_then(|id| scene.get_action(id))
            .map(|action| action.name.clone()),
        "bones" => bones_to_json(scene, &arm.hierarchy),
    )
}

/// Parents come before their children.
fn bones_to_json(scene: &Scene, h: &Hierarchy) -> JsonValue {
    let mut bones = array!();
    for idx in h.depth_first() {
        let parent = h.parent_name(idx).map(|p| p.to_string());
        bones.push(bone_to_json(scene, &h[idx], parent)).ok();
    }
    bones
}

fn bone_to_json(scene: &Scene, bone: &Bone, parent: Option<String>) -> JsonValue {
    let mut constraints = array!();
    for constraint in &bone.constraints {
        match *constraint {
            Constraint::CopyTransforms { target, ref subtarget } => {
                let target = match scene.get_object(target) {
                    Some(o) => o.name.clone(),
                    None => continue,
                };
                constraints.push(object!(
                    "type" => "COPY_TRANSFORMS",
                    "target" => target,
                    "subtarget" => &subtarget[..],
                )).ok();
            }
        }
    }
    let f = bone.flags;
    object!(
        "name" => bone.name(),
        "parent" => parent,
        "head" => vec3_to_json(bone.head),
        "tail" => vec3_to_json(bone.tail),
        "roll" => bone.roll,
        "inherit_scale" => f.inherit_scale,
        "inherit_rotation" => f.inherit_rotation,
        "local_location" => f.local_location,
        "relative_parent" => f.relative_parent,
        "connect" => f.connect,
        "deform" => f.deform,
        "constraints" => constraints,
    )
}

fn mesh_to_json(scene: &Scene, mesh: &Mesh) -> JsonValue {
    let vertices: Vec<JsonValue> = mesh.vertices.iter()
        .map(|&v| vec3_to_json(v))
        .collect();
    let faces: Vec<JsonValue> = mesh.faces.iter()
        .map(|face| face.clone().into())
        .collect();
    let weights: Vec<JsonValue> = mesh.weights.iter()
        .map(|ws| {
            let pairs: Vec<JsonValue> = ws.iter().map(|&(g, w)| array!(g, w)).collect();
            pairs.into()
        })
        .collect();
    let modifiers: Vec<JsonValue> = mesh.modifiers.iter()
        .map(|modifier| match *modifier {
            Modifier::Armature { ref name, object } => object!(
                "type" => "ARMATURE",
                "name" => &name[..],
                "object" => object
                    .and_then(|o| scene.get_object(o))
                    .map(|o| o.name.clone()),
            ),
        })
        .collect();
    object!(
        "name" => &mesh.data_name[..],
        "vertices" => vertices,
        "faces" => faces,
        "vertex_groups" => mesh.vertex_groups.clone(),
        "weights" => weights,
        "modifiers" => modifiers,
    )
}

fn action_to_json(action: &Action) -> JsonValue {
    let channels: Vec<JsonValue> = action.channels.iter().map(channel_to_json).collect();
    let mut o = object!(
        "name" => &action.name[..],
        "fake_user" => action.fake_user,
        "channels" => channels,
    );
    if let Some((start, end)) = action.manual_range {
        o["frame_range"] = array!(start, end);
    }
    o
}

fn channel_to_json(channel: &Channel) -> JsonValue {
    let keyframes: Vec<JsonValue> = channel.curve.keyframes().iter()
        .map(|k| match k.interpolation {
            Interpolation::Linear => array!(k.frame, k.value),
            interp => array!(k.frame, k.value, interp.name()),
        })
        .collect();
    object!(
        "data_path" => &channel.data_path[..],
        "index" => channel.array_index,
        "group" => channel.group.clone(),
        "keyframes" => keyframes,
    )
}
