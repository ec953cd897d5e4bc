//! Bone hierarchies.
//!
//! Rigs built with the auto-rigging convention tag every bone with a role by
//! prefixing its name:
//!
//!     DEF-upper_arm.L     deformation bone, actually skins the mesh
//!     ORG-upper_arm.L     "organizational" bone the rig was generated from
//!     MCH-upper_arm_ik.L  mechanism bone (IK targets, switches, etc.)
//!     root                no prefix: a plain bone
//!
//! The role is worked out from the name once, when a bone is created or
//! renamed, and stored next to it. Nothing else looks at prefixes.
//!
//! A hierarchy is a forest of bones. It is stored as a petgraph `Graph` with
//! the convention that edges run _from_ the parent _to_ the child, plus a
//! name index, since every outside reference to a bone (animation channels,
//! vertex groups, constraints) is by name.
//!
//! This is the "edit" representation of the bones: it has the rest
//! head/tail/roll. Poses live in actions.

pub mod copy;
pub mod reduce;
pub mod rename;

use cgmath::{Vector3, vec3};
use errors::{ErrorKind, Result};
use petgraph::Direction;
use petgraph::graph::{Graph, NodeIndex, NodeIndices};
use scene::ObjectId;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::ops::{Index, IndexMut};

pub static DEF_PREFIX: &str = "DEF-";
pub static ORG_PREFIX: &str = "ORG-";
pub static MCH_PREFIX: &str = "MCH-";

/// What the root bone is called after conversion.
pub static ROOT_NAME: &str = "root";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BoneRole {
    Deform,
    Organizational,
    Mechanism,
    Plain,
}

impl BoneRole {
    pub fn of_name(name: &str) -> BoneRole {
        if name.starts_with(DEF_PREFIX) {
            BoneRole::Deform
        } else if name.starts_with(ORG_PREFIX) {
            BoneRole::Organizational
        } else if name.starts_with(MCH_PREFIX) {
            BoneRole::Mechanism
        } else {
            BoneRole::Plain
        }
    }

    pub fn prefix(self) -> Option<&'static str> {
        match self {
            BoneRole::Deform => Some(DEF_PREFIX),
            BoneRole::Organizational => Some(ORG_PREFIX),
            BoneRole::Mechanism => Some(MCH_PREFIX),
            BoneRole::Plain => None,
        }
    }
}

/// The name with its role prefix removed, eg. `ORG-spine` -> `spine`.
pub fn base_name(name: &str) -> &str {
    match BoneRole::of_name(name).prefix() {
        Some(prefix) => &name[prefix.len()..],
        None => name,
    }
}

/// Per-bone structural switches. Defaults are what a freshly added bone gets.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BoneFlags {
    pub inherit_scale: bool,
    pub inherit_rotation: bool,
    /// Location channels are in the bone's own space (not the parent's).
    pub local_location: bool,
    /// Only matters to child objects parented to the bone; carried along.
    pub relative_parent: bool,
    /// Head is glued to the parent's tail, location channels are ignored.
    pub connect: bool,
    pub deform: bool,
}

impl Default for BoneFlags {
    fn default() -> BoneFlags {
        BoneFlags {
            inherit_scale: true,
            inherit_rotation: true,
            local_location: true,
            relative_parent: false,
            connect: false,
            deform: true,
        }
    }
}

/// Pose-level directives attached to a bone.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Take the world transform of bone `subtarget` of armature `target`.
    CopyTransforms {
        target: ObjectId,
        subtarget: String,
    },
}

#[derive(Debug, Clone)]
pub struct Bone {
    name: String,
    role: BoneRole,
    /// Rest head/tail in armature space.
    pub head: Vector3<f64>,
    pub tail: Vector3<f64>,
    /// Rotation about the head->tail axis, in radians.
    pub roll: f64,
    pub flags: BoneFlags,
    pub constraints: SmallVec<[Constraint; 1]>,
}

impl Bone {
    pub fn new<S: Into<String>>(name: S) -> Bone {
        let name = name.into();
        let role = BoneRole::of_name(&name);
        Bone {
            name,
            role,
            head: vec3(0.0, 0.0, 0.0),
            tail: vec3(0.0, 1.0, 0.0),
            roll: 0.0,
            flags: BoneFlags::default(),
            constraints: SmallVec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> BoneRole {
        self.role
    }

    pub fn is_deform(&self) -> bool {
        self.role == BoneRole::Deform
    }
}

pub type BoneIdx = NodeIndex;

#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    graph: Graph<Bone, ()>,
    by_name: HashMap<String, BoneIdx>,
}

impl Hierarchy {
    pub fn new() -> Hierarchy {
        Hierarchy::default()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds a bone under `parent` (which must already be in the hierarchy).
    pub fn add_bone(&mut self, bone: Bone, parent: Option<BoneIdx>) -> Result<BoneIdx> {
        if self.by_name.contains_key(bone.name()) {
            bail!(ErrorKind::BoneNameTaken(bone.name().to_string()));
        }
        let name = bone.name().to_string();
        let idx = self.graph.add_node(bone);
        if let Some(parent) = parent {
            self.graph.add_edge(parent, idx, ());
        }
        self.by_name.insert(name, idx);
        Ok(idx)
    }

    pub fn find(&self, name: &str) -> Option<BoneIdx> {
        self.by_name.get(name).cloned()
    }

    pub fn get(&self, name: &str) -> Option<&Bone> {
        self.find(name).map(|idx| &self.graph[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn parent(&self, idx: BoneIdx) -> Option<BoneIdx> {
        self.graph.neighbors_directed(idx, Direction::Incoming).next()
    }

    pub fn parent_name(&self, idx: BoneIdx) -> Option<&str> {
        self.parent(idx).map(|p| self.graph[p].name())
    }

    /// Children of a bone, in the order they were added.
    pub fn children(&self, idx: BoneIdx) -> Vec<BoneIdx> {
        let mut children: Vec<BoneIdx> =
            self.graph.neighbors_directed(idx, Direction::Outgoing).collect();
        children.sort();
        children
    }

    /// Parentless bones, in the order they were added.
    pub fn roots(&self) -> Vec<BoneIdx> {
        self.graph.node_indices()
            .filter(|&idx| self.parent(idx).is_none())
            .collect()
    }

    /// All bone indices, in the order they were added.
    pub fn bone_idxs(&self) -> NodeIndices {
        self.graph.node_indices()
    }

    pub fn bones<'a>(&'a self) -> impl Iterator<Item = &'a Bone> + 'a {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    /// Every bone, each one after its parent. Subtrees are visited
    /// depth-first in the order bones were added.
    pub fn depth_first(&self) -> Vec<BoneIdx> {
        let mut order = Vec::with_capacity(self.len());
        let mut stack: Vec<BoneIdx> = self.roots();
        stack.reverse();
        while let Some(idx) = stack.pop() {
            order.push(idx);
            let mut children = self.children(idx);
            children.reverse();
            stack.extend(children);
        }
        order
    }

    /// Renames a bone. The new name must not belong to another bone.
    pub fn rename_bone(&mut self, idx: BoneIdx, new_name: &str) -> Result<()> {
        if self.graph[idx].name() == new_name {
            return Ok(());
        }
        if self.by_name.contains_key(new_name) {
            bail!(ErrorKind::BoneNameTaken(new_name.to_string()));
        }
        let old_name = self.graph[idx].name.clone();
        self.by_name.remove(&old_name);
        self.by_name.insert(new_name.to_string(), idx);
        let bone = &mut self.graph[idx];
        bone.name = new_name.to_string();
        bone.role = BoneRole::of_name(new_name);
        Ok(())
    }

    /// Name -> roll for every bone.
    pub fn rolls(&self) -> HashMap<String, f64> {
        self.bones()
            .map(|bone| (bone.name().to_string(), bone.roll))
            .collect()
    }
}

impl Index<BoneIdx> for Hierarchy {
    type Output = Bone;

    fn index(&self, idx: BoneIdx) -> &Bone {
        &self.graph[idx]
    }
}

impl IndexMut<BoneIdx> for Hierarchy {
    fn index_mut(&mut self, idx: BoneIdx) -> &mut Bone {
        &mut self.graph[idx]
    }
}

/// Builds a hierarchy from `(name, parent name)` pairs given in any order.
/// Handy for tests.
#[cfg(test)]
pub fn hierarchy_from_pairs(pairs: &[(&str, Option<&str>)]) -> Hierarchy {
    let mut h = Hierarchy::new();
    let mut remaining: Vec<(&str, Option<&str>)> = pairs.to_vec();
    while !remaining.is_empty() {
        let before = remaining.len();
        remaining.retain(|&(name, parent)| {
            let parent_idx = match parent {
                None => None,
                Some(p) => match h.find(p) {
                    Some(idx) => Some(idx),
                    None => return true,
                },
            };
            h.add_bone(Bone::new(name), parent_idx).unwrap();
            false
        });
        assert!(remaining.len() < before, "parent missing or cycle");
    }
    h
}
