//! Small scenes for tests.

use anim::{pose_bone_path, Action, Interpolation, Keyframe};
use anim::{LOCATION, ROTATION_EULER, ROTATION_QUATERNION, SCALE};
use cgmath::{Deg, Matrix4, vec3};
use scene::{ActionId, Armature, Mesh, Modifier, Object, ObjectData, ObjectId, Scene};
use skeleton::hierarchy_from_pairs;

pub fn key(action: &mut Action, bone: &str, prop: &str, index: usize, keys: &[(f64, f64)]) {
    let path = pose_bone_path(bone, prop);
    let channel = action.channel_or_insert(&path, index, bone);
    for &(frame, value) in keys {
        channel.curve.insert(Keyframe { frame, value, interpolation: Interpolation::Linear });
    }
}

pub struct RigScene {
    pub scene: Scene,
    pub rig: ObjectId,
    pub mesh: ObjectId,
    pub walk: ActionId,
    pub idle: ActionId,
}

/// A tiny generated-style rig:
///
///     root
///       ORG-spine
///         DEF-spine
///           MCH-spineIK
///             DEF-arm
///         ORG-arm
///
/// with one mesh child and two actions, `walk` (keyed on frames 1 and 24)
/// and `idle` (frames 0 to 10).
pub fn rig_scene() -> RigScene {
    let mut h = hierarchy_from_pairs(&[
        ("root", None),
        ("ORG-spine", Some("root")),
        ("DEF-spine", Some("ORG-spine")),
        ("MCH-spineIK", Some("DEF-spine")),
        ("DEF-arm", Some("MCH-spineIK")),
        ("ORG-arm", Some("ORG-spine")),
    ]);
    let placement = [
        ("root", vec3(0.0, 0.0, 0.0), vec3(0.0, 1.0, 0.0), 0.0),
        ("ORG-spine", vec3(0.0, 0.0, 1.0), vec3(0.0, 0.0, 2.0), 0.0),
        ("DEF-spine", vec3(0.0, 0.0, 1.0), vec3(0.0, 0.0, 2.0), 0.1),
        ("MCH-spineIK", vec3(0.0, 0.0, 2.0), vec3(0.0, 0.5, 2.0), 0.0),
        ("DEF-arm", vec3(0.0, 0.0, 2.0), vec3(1.0, 0.0, 2.0), -0.4),
        ("ORG-arm", vec3(0.0, 0.0, 2.0), vec3(1.0, 0.0, 2.0), 0.0),
    ];
    for &(name, head, tail, roll) in &placement {
        let idx = h.find(name).unwrap();
        h[idx].head = head;
        h[idx].tail = tail;
        h[idx].roll = roll;
    }
    let arm = h.find("DEF-arm").unwrap();
    h[arm].flags.inherit_scale = false;

    let mut scene = Scene::new();

    let mut walk = Action::new("walk");
    key(&mut walk, "root", LOCATION, 1, &[(1.0, 0.0), (24.0, 2.0)]);
    key(&mut walk, "ORG-spine", ROTATION_EULER, 0, &[(1.0, 0.0), (24.0, 0.5)]);
    key(&mut walk, "MCH-spineIK", ROTATION_QUATERNION, 0, &[(1.0, 1.0), (24.0, 0.8)]);
    key(&mut walk, "MCH-spineIK", ROTATION_QUATERNION, 3, &[(1.0, 0.0), (24.0, 0.6)]);
    key(&mut walk, "DEF-arm", SCALE, 1, &[(1.0, 1.0), (24.0, 1.5)]);
    let walk = scene.add_action(walk);

    let mut idle = Action::new("idle");
    key(&mut idle, "DEF-spine", ROTATION_EULER, 2, &[(0.0, 0.0), (5.0, 0.3), (10.0, 0.0)]);
    let idle = scene.add_action(idle);

    let mut armature = Armature::new("rig_data", h);
    armature.rig_id = Some("c0ffee".to_string());
    armature.active_action = Some(idle);
    let mut rig = Object::new("rig", ObjectData::Armature(armature));
    rig.matrix_world = Matrix4::from_translation(vec3(1.0, 0.0, 0.0)) * Matrix4::from_angle_z(Deg(30.0));
    let rig = scene.add_object(rig);

    let mesh = Mesh {
        data_name: "body_data".to_string(),
        vertices: vec![vec3(0.0, 0.0, 1.0), vec3(0.0, 0.0, 2.0), vec3(1.0, 0.0, 2.0)],
        faces: vec![vec![0, 1, 2]],
        vertex_groups: vec!["DEF-spine".to_string(), "DEF-arm".to_string()],
        weights: vec![vec![(0, 1.0)], vec![(0, 0.5), (1, 0.5)], vec![(1, 1.0)]],
        modifiers: vec![Modifier::Armature { name: "Armature".to_string(), object: Some(rig) }],
    };
    let mut body = Object::new("body", ObjectData::Mesh(mesh));
    body.parent = Some(rig);
    let mesh = scene.add_object(body);

    RigScene { scene, rig, mesh, walk, idle }
}
