//! Reading scenes from JSON.
//!
//! The file has two top-level arrays, `objects` and `actions`. Objects refer
//! to each other (parents, modifiers, constraint targets) and to actions by
//! name. See `write.rs` for the exact layout; absent optional fields get the
//! defaults a fresh object would have.

use anim::{Action, Channel, Interpolation, Keyframe};
use cgmath::{Matrix4, One, Vector3, Vector4, vec3};
use errors::{Error, ErrorKind, Result};
use json::{self, JsonValue};
use json::iterators::Members;
use scene::{ActionId, Armature, Mesh, Modifier, Object, ObjectData, ObjectId, Scene};
use skeleton::{Bone, BoneFlags, Constraint, Hierarchy};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub fn read_scene_file<P: AsRef<Path>>(path: P) -> Result<Scene> {
    let mut s = String::new();
    File::open(path)?.read_to_string(&mut s)?;
    parse_scene(&s)
}

pub fn parse_scene(s: &str) -> Result<Scene> {
    let root = json::parse(s)?;
    if !root.is_object() {
        bail!(bad("top level should be an object"));
    }

    let mut scene = Scene::new();

    let mut action_ids: HashMap<String, ActionId> = HashMap::new();
    for v in array(&root, "actions", "scene")? {
        let action = read_action(v)?;
        if action_ids.contains_key(&action.name) {
            bail!(bad(format!("two actions named {}", action.name)));
        }
        let name = action.name.clone();
        action_ids.insert(name, scene.add_action(action));
    }

    // Objects get consecutive ids in file order, so names can be resolved
    // before the objects exist.
    let mut object_ids: HashMap<String, ObjectId> = HashMap::new();
    for (i, v) in array(&root, "objects", "scene")?.enumerate() {
        let name = string(v, "name", "object")?;
        if object_ids.insert(name.clone(), ObjectId(i)).is_some() {
            bail!(bad(format!("two objects named {}", name)));
        }
    }
    let refs = Refs { objects: &object_ids, actions: &action_ids };

    for (i, v) in array(&root, "objects", "scene")?.enumerate() {
        let object = read_object(v, &refs)?;
        let id = scene.add_object(object);
        check!(id == ObjectId(i))?;
    }

    Ok(scene)
}

struct Refs<'a> {
    objects: &'a HashMap<String, ObjectId>,
    actions: &'a HashMap<String, ActionId>,
}

impl<'a> Refs<'a> {
    fn object(&self, name: &str, ctx: &str) -> Result<ObjectId> {
        match self.objects.get(name) {
            Some(&id) => Ok(id),
            None => bail!(bad(format!("{}: no object named {}", ctx, name))),
        }
    }

    fn action(&self, name: &str, ctx: &str) -> Result<ActionId> {
        match self.actions.get(name) {
            Some(&id) => Ok(id),
            None => bail!(bad(format!("{}: no action named {}", ctx, name))),
        }
    }
}

fn bad<S: Into<String>>(what: S) -> Error {
    ErrorKind::BadScene(what.into()).into()
}

fn string(v: &JsonValue, key: &str, ctx: &str) -> Result<String> {
    match v[key].as_str() {
        Some(s) => Ok(s.to_string()),
        None => bail!(bad(format!("{}: {} should be a string", ctx, key))),
    }
}

fn opt_string(v: &JsonValue, key: &str, ctx: &str) -> Result<Option<String>> {
    if v[key].is_null() {
        return Ok(None);
    }
    string(v, key, ctx).map(Some)
}

fn number(v: &JsonValue, ctx: &str) -> Result<f64> {
    match v.as_f64() {
        Some(x) => Ok(x),
        None => bail!(bad(format!("{}: expected a number, found {}", ctx, v.dump()))),
    }
}

fn number_or(v: &JsonValue, key: &str, ctx: &str, default: f64) -> Result<f64> {
    if v[key].is_null() {
        return Ok(default);
    }
    number(&v[key], &format!("{}.{}", ctx, key))
}

fn bool_or(v: &JsonValue, key: &str, ctx: &str, default: bool) -> Result<bool> {
    if v[key].is_null() {
        return Ok(default);
    }
    match v[key].as_bool() {
        Some(b) => Ok(b),
        None => bail!(bad(format!("{}: {} should be true or false", ctx, key))),
    }
}

/// The members of the array `v[key]`. Missing means empty.
fn array<'a>(v: &'a JsonValue, key: &str, ctx: &str) -> Result<Members<'a>> {
    let a = &v[key];
    if !a.is_null() && !a.is_array() {
        bail!(bad(format!("{}: {} should be an array", ctx, key)));
    }
    Ok(a.members())
}

fn numbers(v: &JsonValue, len: usize, ctx: &str) -> Result<Vec<f64>> {
    if !v.is_array() || v.len() != len {
        bail!(bad(format!("{}: expected an array of {} numbers", ctx, len)));
    }
    v.members().map(|x| number(x, ctx)).collect()
}

fn vec3_or(v: &JsonValue, key: &str, ctx: &str, default: Vector3<f64>) -> Result<Vector3<f64>> {
    if v[key].is_null() {
        return Ok(default);
    }
    let xs = numbers(&v[key], 3, &format!("{}.{}", ctx, key))?;
    Ok(vec3(xs[0], xs[1], xs[2]))
}

/// Column-major, 16 numbers.
fn matrix_or_identity(v: &JsonValue, key: &str, ctx: &str) -> Result<Matrix4<f64>> {
    if v[key].is_null() {
        return Ok(Matrix4::one());
    }
    let xs = numbers(&v[key], 16, &format!("{}.{}", ctx, key))?;
    let col = |i: usize| Vector4::new(xs[4 * i], xs[4 * i + 1], xs[4 * i + 2], xs[4 * i + 3]);
    Ok(Matrix4::from_cols(col(0), col(1), col(2), col(3)))
}

fn read_action(v: &JsonValue) -> Result<Action> {
    let name = string(v, "name", "action")?;
    let ctx = format!("action {}", name);
    let mut action = Action::new(name);
    action.fake_user = bool_or(v, "fake_user", &ctx, false)?;
    if !v["frame_range"].is_null() {
        let r = numbers(&v["frame_range"], 2, &ctx)?;
        action.manual_range = Some((r[0], r[1]));
    }
    for c in array(v, "channels", &ctx)? {
        action.channels.push(read_channel(c, &ctx)?);
    }
    Ok(action)
}

fn read_channel(v: &JsonValue, ctx: &str) -> Result<Channel> {
    let data_path = string(v, "data_path", ctx)?;
    let ctx = format!("{}, channel {}", ctx, data_path);
    let index = number_or(v, "index", &ctx, 0.0)?;
    if index < 0.0 || index.fract() != 0.0 {
        bail!(bad(format!("{}: bad index {}", ctx, index)));
    }
    let mut channel = Channel::new(data_path, index as usize);
    channel.group = opt_string(v, "group", &ctx)?;
    for k in array(v, "keyframes", &ctx)? {
        // [frame, value] or [frame, value, interpolation]
        if !k.is_array() || k.len() < 2 || k.len() > 3 {
            bail!(bad(format!("{}: bad keyframe {}", ctx, k.dump())));
        }
        let interpolation = match k[2].as_str() {
            None if k[2].is_null() => Interpolation::Linear,
            Some(s) => match Interpolation::from_name(s) {
                Some(interp) => interp,
                None => bail!(bad(format!("{}: unknown interpolation {}", ctx, s))),
            },
            None => bail!(bad(format!("{}: bad keyframe {}", ctx, k.dump()))),
        };
        channel.curve.insert(Keyframe {
            frame: number(&k[0], &ctx)?,
            value: number(&k[1], &ctx)?,
            interpolation,
        });
    }
    Ok(channel)
}

fn read_object(v: &JsonValue, refs: &Refs) -> Result<Object> {
    let name = string(v, "name", "object")?;
    let ctx = format!("object {}", name);
    let ty = string(v, "type", &ctx)?;
    let data = match &ty[..] {
        "ARMATURE" => ObjectData::Armature(read_armature(&v["data"], &name, refs)?),
        "MESH" => ObjectData::Mesh(read_mesh(&v["data"], &name, refs)?),
        _ => bail!(bad(format!("{}: unknown type {}", ctx, ty))),
    };
    let mut object = Object::new(name, data);
    object.matrix_world = matrix_or_identity(v, "matrix_world", &ctx)?;
    object.parent = match opt_string(v, "parent", &ctx)? {
        Some(parent) => Some(refs.object(&parent, &ctx)?),
        None => None,
    };
    Ok(object)
}

fn read_armature(v: &JsonValue, object_name: &str, refs: &Refs) -> Result<Armature> {
    let ctx = format!("armature of {}", object_name);
    let data_name = opt_string(v, "name", &ctx)?.unwrap_or_else(|| object_name.to_string());

    // Bones can be listed in any order; add each one once its parent is in.
    let mut pending: Vec<(Bone, Option<String>)> = vec![];
    for b in array(v, "bones", &ctx)? {
        pending.push(read_bone(b, &ctx, refs)?);
    }
    let mut hierarchy = Hierarchy::new();
    while !pending.is_empty() {
        let before = pending.len();
        let mut waiting = vec![];
        for (bone, parent) in pending {
            let parent_idx = match parent {
                None => None,
                Some(ref p) => match hierarchy.find(p) {
                    Some(idx) => Some(idx),
                    None => {
                        waiting.push((bone, parent));
                        continue;
                    }
                },
            };
            hierarchy.add_bone(bone, parent_idx)?;
        }
        if waiting.len() == before {
            let names: Vec<&str> = waiting.iter().map(|&(ref b, _)| b.name()).collect();
            bail!(bad(format!("{}: bones {:?} have missing parents or form a loop", ctx, names)));
        }
        pending = waiting;
    }

    let mut armature = Armature::new(data_name, hierarchy);
    armature.rig_id = opt_string(v, "rig_id", &ctx)?;
    armature.active_action = match opt_string(v, "active_action", &ctx)? {
        Some(action) => Some(refs.action(&action, &ctx)?),
        None => None,
    };
    Ok(armature)
}

fn read_bone(v: &JsonValue, ctx: &str, refs: &Refs) -> Result<(Bone, Option<String>)> {
    let name = string(v, "name", ctx)?;
    let ctx = format!("{}, bone {}", ctx, name);
    let mut bone = Bone::new(name);
    bone.head = vec3_or(v, "head", &ctx, bone.head)?;
    bone.tail = vec3_or(v, "tail", &ctx, bone.tail)?;
    bone.roll = number_or(v, "roll", &ctx, 0.0)?;

    let d = BoneFlags::default();
    bone.flags = BoneFlags {
        inherit_scale: bool_or(v, "inherit_scale", &ctx, d.inherit_scale)?,
        inherit_rotation: bool_or(v, "inherit_rotation", &ctx, d.inherit_rotation)?,
        local_location: bool_or(v, "local_location", &ctx, d.local_location)?,
        relative_parent: bool_or(v, "relative_parent", &ctx, d.relative_parent)?,
        connect: bool_or(v, "connect", &ctx, d.connect)?,
        deform: bool_or(v, "deform", &ctx, d.deform)?,
    };

    for c in array(v, "constraints", &ctx)? {
        let ty = string(c, "type", &ctx)?;
        match &ty[..] {
            "COPY_TRANSFORMS" => {
                let target = refs.object(&string(c, "target", &ctx)?, &ctx)?;
                let subtarget = string(c, "subtarget", &ctx)?;
                bone.constraints.push(Constraint::CopyTransforms { target, subtarget });
            }
            _ => warn!("{}: ignoring unsupported {} constraint", ctx, ty),
        }
    }

    let parent = opt_string(v, "parent", &ctx)?;
    Ok((bone, parent))
}

fn read_mesh(v: &JsonValue, object_name: &str, refs: &Refs) -> Result<Mesh> {
    let ctx = format!("mesh of {}", object_name);
    let mut mesh = Mesh::default();
    mesh.data_name = opt_string(v, "name", &ctx)?.unwrap_or_else(|| object_name.to_string());

    for p in array(v, "vertices", &ctx)? {
        let xs = numbers(p, 3, &ctx)?;
        mesh.vertices.push(vec3(xs[0], xs[1], xs[2]));
    }
    let num_verts = mesh.vertices.len();
    let vertex_index = |x: &JsonValue| -> Result<usize> {
        match x.as_usize() {
            Some(i) if i < num_verts => Ok(i),
            _ => bail!(bad(format!("{}: bad vertex index {}", ctx, x.dump()))),
        }
    };

    for f in array(v, "faces", &ctx)? {
        let face = f.members()
            .map(|x| vertex_index(x).map(|i| i as u32))
            .collect::<Result<Vec<u32>>>()?;
        mesh.faces.push(face);
    }

    for g in array(v, "vertex_groups", &ctx)? {
        match g.as_str() {
            Some(name) => mesh.vertex_groups.push(name.to_string()),
            None => bail!(bad(format!("{}: vertex group names should be strings", ctx))),
        }
    }

    // One list of [group, weight] pairs per vertex.
    let num_groups = mesh.vertex_groups.len();
    for w in array(v, "weights", &ctx)? {
        let mut vertex_weights = vec![];
        for pair in w.members() {
            let group = match pair[0].as_usize() {
                Some(g) if g < num_groups => g,
                _ => bail!(bad(format!("{}: bad vertex group index in {}", ctx, pair.dump()))),
            };
            vertex_weights.push((group, number(&pair[1], &ctx)?));
        }
        mesh.weights.push(vertex_weights);
    }
    if !mesh.weights.is_empty() && mesh.weights.len() != num_verts {
        bail!(bad(format!("{}: {} vertices but weights for {}", ctx, num_verts, mesh.weights.len())));
    }

    for m in array(v, "modifiers", &ctx)? {
        let ty = string(m, "type", &ctx)?;
        match &ty[..] {
            "ARMATURE" => {
                let name = opt_string(m, "name", &ctx)?.unwrap_or_else(|| "Armature".to_string());
                let object = match opt_string(m, "object", &ctx)? {
                    Some(o) => Some(refs.object(&o, &ctx)?),
                    None => None,
                };
                mesh.modifiers.push(Modifier::Armature { name, object });
            }
            _ => warn!("{}: ignoring unsupported {} modifier", ctx, ty),
        }
    }

    Ok(mesh)
}
