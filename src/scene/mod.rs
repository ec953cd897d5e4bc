//! The scene document: objects (armatures and meshes) and actions.
//!
//! Everything outside this crate refers to objects and actions by name, so
//! names are the collision key when a run creates something. Inside the crate
//! they are referred to by handle. Removing something leaves a hole so that
//! handles held by someone else never start pointing at a different thing.

pub mod read;
pub mod write;

use anim::Action;
use cgmath::{Matrix4, Vector3, One};
use errors::{ErrorKind, Result};
use skeleton::{Constraint, Hierarchy};
use std::fmt;
use std::ops::{Index, IndexMut};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub usize);

#[derive(Debug, Clone)]
pub struct Object {
    pub name: String,
    pub matrix_world: Matrix4<f64>,
    pub parent: Option<ObjectId>,
    pub data: ObjectData,
}

#[derive(Debug, Clone)]
pub enum ObjectData {
    Armature(Armature),
    Mesh(Mesh),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ObjectKind {
    Armature,
    Mesh,
}

impl ObjectKind {
    pub fn description(self) -> &'static str {
        match self {
            ObjectKind::Armature => "an armature",
            ObjectKind::Mesh => "a mesh",
        }
    }
}

impl ObjectData {
    pub fn kind(&self) -> ObjectKind {
        match *self {
            ObjectData::Armature(_) => ObjectKind::Armature,
            ObjectData::Mesh(_) => ObjectKind::Mesh,
        }
    }
}

/// What `Scene::place_object` did.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Placed {
    /// Made a new object.
    Created(ObjectId),
    /// Swapped the data of an existing object of the same kind.
    Replaced(ObjectId),
    /// Left an existing object of the same kind alone.
    Kept(ObjectId),
}

impl Placed {
    pub fn id(self) -> ObjectId {
        match self {
            Placed::Created(id) | Placed::Replaced(id) | Placed::Kept(id) => id,
        }
    }

    /// Whether the object now holds the data that was passed in.
    pub fn has_new_data(self) -> bool {
        match self {
            Placed::Created(_) | Placed::Replaced(_) => true,
            Placed::Kept(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Armature {
    pub data_name: String,
    pub hierarchy: Hierarchy,
    /// The action currently driving this armature.
    pub active_action: Option<ActionId>,
    /// Custom property the rig generator stamps on rigs it made.
    pub rig_id: Option<String>,
}

impl Armature {
    pub fn new<S: Into<String>>(data_name: S, hierarchy: Hierarchy) -> Armature {
        Armature {
            data_name: data_name.into(),
            hierarchy,
            active_action: None,
            rig_id: None,
        }
    }

    pub fn has_deform_bones(&self) -> bool {
        self.hierarchy.bones().any(|bone| bone.is_deform())
    }

    /// Whether this looks like a generated rig (stamped, or has DEF- bones).
    pub fn is_rig(&self) -> bool {
        self.rig_id.is_some() || self.has_deform_bones()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub data_name: String,
    pub vertices: Vec<Vector3<f64>>,
    pub faces: Vec<Vec<u32>>,
    /// Vertex groups are matched to bones by name.
    pub vertex_groups: Vec<String>,
    /// For every vertex, its (vertex group index, weight) pairs.
    pub weights: Vec<Vec<(usize, f64)>>,
    pub modifiers: Vec<Modifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    /// Skins the mesh with the bones of `object`.
    Armature {
        name: String,
        object: Option<ObjectId>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    objects: Vec<Option<Object>>,
    actions: Vec<Action>,
}

impl Scene {
    pub fn new() -> Scene {
        Scene::default()
    }

    pub fn add_object(&mut self, object: Object) -> ObjectId {
        self.objects.push(Some(object));
        ObjectId(self.objects.len() - 1)
    }

    pub fn get_object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.0).and_then(|o| o.as_ref())
    }

    pub fn get_object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id.0).and_then(|o| o.as_mut())
    }

    pub fn find_object(&self, name: &str) -> Option<ObjectId> {
        self.objects().find(|&(_, o)| o.name == name).map(|(id, _)| id)
    }

    pub fn objects<'a>(&'a self) -> impl Iterator<Item = (ObjectId, &'a Object)> + 'a {
        self.objects.iter().enumerate()
            .filter_map(|(i, o)| o.as_ref().map(|o| (ObjectId(i), o)))
    }

    /// Objects whose parent is `id`.
    pub fn children(&self, id: ObjectId) -> Vec<ObjectId> {
        self.objects()
            .filter(|&(_, o)| o.parent == Some(id))
            .map(|(child, _)| child)
            .collect()
    }

    /// Removes an object and clears every reference to it.
    pub fn remove_object(&mut self, id: ObjectId) -> Option<Object> {
        let removed = self.objects.get_mut(id.0).and_then(|o| o.take());
        if removed.is_none() {
            return None;
        }
        for object in self.objects.iter_mut().filter_map(|o| o.as_mut()) {
            if object.parent == Some(id) {
                object.parent = None;
            }
            match object.data {
                ObjectData::Mesh(ref mut mesh) => {
                    for modifier in &mut mesh.modifiers {
                        let Modifier::Armature { ref mut object, .. } = *modifier;
                        if *object == Some(id) {
                            *object = None;
                        }
                    }
                }
                ObjectData::Armature(ref mut arm) => {
                    let idxs: Vec<_> = arm.hierarchy.bone_idxs().collect();
                    for idx in idxs {
                        arm.hierarchy[idx].constraints.retain(|c| match *c {
                            Constraint::CopyTransforms { target, .. } => target != id,
                        });
                    }
                }
            }
        }
        removed
    }

    /// Checks that `place_object` would succeed.
    pub fn check_placeable(&self, name: &str, kind: ObjectKind, overwrite: bool) -> Result<()> {
        match self.find_object(name) {
            Some(id) if self[id].data.kind() != kind && !overwrite => {
                bail!(ErrorKind::NameOccupied(name.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Puts `data` into the scene as the object called `name`.
    ///
    /// If there's already an object with that name and it's of the same kind,
    /// its data is swapped out when `overwrite` is set (the object itself, its
    /// transform and parent stay) and it's left alone otherwise. An object of
    /// another kind is removed when `overwrite` is set and is an error
    /// otherwise.
    pub fn place_object(&mut self, name: &str, data: ObjectData, overwrite: bool) -> Result<Placed> {
        self.check_placeable(name, data.kind(), overwrite)?;
        let existing = self.find_object(name);
        match existing {
            Some(id) if self[id].data.kind() == data.kind() => {
                if !overwrite {
                    info!("{} already exists; keeping it", name);
                    return Ok(Placed::Kept(id));
                }
                let mut data = data;
                // The active action belongs to the object, not its data.
                if let (&mut ObjectData::Armature(ref mut new), &ObjectData::Armature(ref old)) =
                    (&mut data, &self[id].data)
                {
                    new.active_action = old.active_action;
                }
                debug!("replacing the data of {}", name);
                self[id].data = data;
                Ok(Placed::Replaced(id))
            }
            Some(id) => {
                debug!("removing {}, which is {}", name, self[id].data.kind().description());
                self.remove_object(id);
                Ok(Placed::Created(self.add_object(Object::new(name, data))))
            }
            None => Ok(Placed::Created(self.add_object(Object::new(name, data)))),
        }
    }

    pub fn armature(&self, id: ObjectId) -> Result<&Armature> {
        let object = self.get_object(id)
            .ok_or_else(|| ErrorKind::NoSuchObject(format!("{}", id)))?;
        match object.data {
            ObjectData::Armature(ref arm) => Ok(arm),
            _ => bail!(ErrorKind::WrongObjectKind(object.name.clone(), "an armature")),
        }
    }

    pub fn armature_mut(&mut self, id: ObjectId) -> Result<&mut Armature> {
        let object = self.get_object_mut(id)
            .ok_or_else(|| ErrorKind::NoSuchObject(format!("{}", id)))?;
        match object.data {
            ObjectData::Armature(ref mut arm) => Ok(arm),
            _ => bail!(ErrorKind::WrongObjectKind(object.name.clone(), "an armature")),
        }
    }

    pub fn mesh(&self, id: ObjectId) -> Result<&Mesh> {
        let object = self.get_object(id)
            .ok_or_else(|| ErrorKind::NoSuchObject(format!("{}", id)))?;
        match object.data {
            ObjectData::Mesh(ref mesh) => Ok(mesh),
            _ => bail!(ErrorKind::WrongObjectKind(object.name.clone(), "a mesh")),
        }
    }

    pub fn mesh_mut(&mut self, id: ObjectId) -> Result<&mut Mesh> {
        let object = self.get_object_mut(id)
            .ok_or_else(|| ErrorKind::NoSuchObject(format!("{}", id)))?;
        match object.data {
            ObjectData::Mesh(ref mut mesh) => Ok(mesh),
            _ => bail!(ErrorKind::WrongObjectKind(object.name.clone(), "a mesh")),
        }
    }

    /// Mesh objects parented to `id`.
    pub fn mesh_children(&self, id: ObjectId) -> Vec<ObjectId> {
        self.children(id).into_iter()
            .filter(|&child| self.mesh(child).is_ok())
            .collect()
    }

    pub fn add_action(&mut self, action: Action) -> ActionId {
        self.actions.push(action);
        ActionId(self.actions.len() - 1)
    }

    pub fn get_action(&self, id: ActionId) -> Option<&Action> {
        self.actions.get(id.0)
    }

    pub fn find_action(&self, name: &str) -> Option<ActionId> {
        self.actions().find(|&(_, a)| a.name == name).map(|(id, _)| id)
    }

    pub fn actions<'a>(&'a self) -> impl Iterator<Item = (ActionId, &'a Action)> + 'a {
        self.actions.iter().enumerate().map(|(i, a)| (ActionId(i), a))
    }

    pub fn action_names(&self) -> Vec<String> {
        self.actions().map(|(_, a)| a.name.clone()).collect()
    }

    /// Swaps in new contents for an existing action. Anything pointing at
    /// `id` now sees `action`.
    pub fn replace_action(&mut self, id: ActionId, action: Action) -> Result<()> {
        match self.actions.get_mut(id.0) {
            Some(slot) => {
                *slot = action;
                Ok(())
            }
            None => bail!(ErrorKind::NoSuchAction(format!("{}", id))),
        }
    }

    /// The action driving armature `id`, if any.
    pub fn active_action(&self, id: ObjectId) -> Option<&Action> {
        self.armature(id).ok()
            .and_then(|arm| arm.active_action)
            .and_then(|action| self.get_action(action))
    }
}

impl Index<ObjectId> for Scene {
    type Output = Object;

    fn index(&self, id: ObjectId) -> &Object {
        match self.objects[id.0] {
            Some(ref object) => object,
            None => panic!("{} was removed", id),
        }
    }
}

impl IndexMut<ObjectId> for Scene {
    fn index_mut(&mut self, id: ObjectId) -> &mut Object {
        match self.objects[id.0] {
            Some(ref mut object) => object,
            None => panic!("{} was removed", id),
        }
    }
}

impl Index<ActionId> for Scene {
    type Output = Action;

    fn index(&self, id: ActionId) -> &Action {
        &self.actions[id.0]
    }
}

impl IndexMut<ActionId> for Scene {
    fn index_mut(&mut self, id: ActionId) -> &mut Action {
        &mut self.actions[id.0]
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "object #{}", self.0)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "action #{}", self.0)
    }
}

impl Object {
    pub fn new<S: Into<String>>(name: S, data: ObjectData) -> Object {
        Object {
            name: name.into(),
            matrix_world: Matrix4::one(),
            parent: None,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skeleton::{Bone, Constraint};

    fn armature_object(name: &str) -> Object {
        let mut h = Hierarchy::new();
        h.add_bone(Bone::new("root"), None).unwrap();
        Object::new(name, ObjectData::Armature(Armature::new(name, h)))
    }

    #[test]
    fn removing_an_object_clears_references() {
        let mut scene = Scene::new();
        let rig = scene.add_object(armature_object("rig"));
        let proxy = scene.add_object(armature_object("proxy"));
        {
            let arm = scene.armature_mut(proxy).unwrap();
            let root = arm.hierarchy.find("root").unwrap();
            arm.hierarchy[root].constraints.push(Constraint::CopyTransforms {
                target: rig,
                subtarget: "root".to_string(),
            });
        }
        let mut body = Object::new("body", ObjectData::Mesh(Mesh {
            modifiers: vec![Modifier::Armature { name: "Armature".into(), object: Some(rig) }],
            ..Mesh::default()
        }));
        body.parent = Some(rig);
        let body = scene.add_object(body);

        assert_eq!(scene.mesh_children(rig), vec![body]);
        scene.remove_object(rig).unwrap();

        assert!(scene.get_object(rig).is_none());
        assert_eq!(scene.find_object("rig"), None);
        assert_eq!(scene[body].parent, None);
        assert_eq!(scene.mesh(body).unwrap().modifiers[0],
            Modifier::Armature { name: "Armature".into(), object: None });
        let arm = scene.armature(proxy).unwrap();
        assert!(arm.hierarchy.get("root").unwrap().constraints.is_empty());
        // Handles stay put.
        assert_eq!(scene.find_object("proxy"), Some(proxy));
    }

    #[test]
    fn placing_follows_the_overwrite_policy() {
        let mut scene = Scene::new();
        let rig = scene.add_object(armature_object("rig"));
        scene[rig].matrix_world = Matrix4::from_scale(2.0);
        let mesh = || ObjectData::Mesh(Mesh::default());
        let arm = || {
            let mut h = Hierarchy::new();
            h.add_bone(Bone::new("other"), None).unwrap();
            ObjectData::Armature(Armature::new("new", h))
        };

        // Same kind, no overwrite: untouched.
        assert_eq!(scene.place_object("rig", arm(), false).unwrap(), Placed::Kept(rig));
        assert!(scene.armature(rig).unwrap().hierarchy.contains("root"));

        // Same kind, overwrite: new data, same object.
        assert_eq!(scene.place_object("rig", arm(), true).unwrap(), Placed::Replaced(rig));
        assert!(scene.armature(rig).unwrap().hierarchy.contains("other"));
        assert_eq!(scene[rig].matrix_world, Matrix4::from_scale(2.0));

        // Other kind, no overwrite: error, nothing changes.
        assert!(scene.place_object("rig", mesh(), false).is_err());
        assert!(scene.armature(rig).is_ok());

        // Other kind, overwrite: the old one goes.
        let placed = scene.place_object("rig", mesh(), true).unwrap();
        assert_ne!(placed.id(), rig);
        assert!(scene.get_object(rig).is_none());
        assert!(scene.mesh(placed.id()).is_ok());
    }

    #[test]
    fn wrong_kind_is_an_error() {
        let mut scene = Scene::new();
        let body = scene.add_object(Object::new("body", ObjectData::Mesh(Mesh::default())));
        assert!(scene.armature(body).is_err());
        assert!(scene.mesh(body).is_ok());
    }
}
