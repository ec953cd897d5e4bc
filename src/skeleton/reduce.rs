//! Cutting a rig down to its deformation bones.
//!
//! Only the DEF- bones actually skin the mesh, so only they (and a root to
//! hold them together) need to survive. The catch is that in a generated rig
//! a DEF- bone is very often parented to an ORG- or MCH- bone, so dropping
//! everything else would scatter the DEF- bones into a forest. Each DEF- bone
//! is moved to the DEF- bone it "belongs" under:
//!
//! * parent is DEF-X          keep it
//! * parent is ORG-X          DEF-X, the deform twin of the ORG bone
//! * anything else            no parent; ends up under the root
//!
//! If that would make a bone its own parent (DEF-X under ORG-X) the rule is
//! applied once more, one level further up.
//!
//! All of this is decided from the original parent links first (a
//! `ReductionPlan`) and then a new hierarchy is built from the plan in one go.

use errors::{ErrorKind, Result};
use skeleton::{base_name, BoneIdx, BoneRole, Hierarchy, DEF_PREFIX};
use std::collections::HashMap;

/// Which bones survive and what their new parents are. Indices refer to the
/// hierarchy the plan was made from.
#[derive(Debug, Clone)]
pub struct ReductionPlan {
    pub root: BoneIdx,
    /// Every retained bone except the root, with its final parent.
    pub parents: Vec<(BoneIdx, BoneIdx)>,
}

/// Where the re-parent rule sends the parent of `idx`. `None` means "no
/// DEF- parent", ie. attach to the root.
fn deform_parent_of(h: &Hierarchy, idx: BoneIdx) -> Option<BoneIdx> {
    let parent = h.parent(idx)?;
    match h[parent].role() {
        BoneRole::Deform => Some(parent),
        BoneRole::Organizational => {
            let twin = format!("{}{}", DEF_PREFIX, base_name(h[parent].name()));
            let found = h.find(&twin);
            if found.is_none() {
                warn!("{} has no deform twin {}; moving {} under the root",
                    h[parent].name(), twin, h[idx].name());
            }
            found
        }
        BoneRole::Mechanism | BoneRole::Plain => None,
    }
}

pub fn plan_reduction(h: &Hierarchy, root_name: &str) -> Result<ReductionPlan> {
    let root = h.find(root_name)
        .ok_or_else(|| ErrorKind::MissingRootBone(root_name.to_string()))?;
    if h[root].is_deform() {
        bail!(ErrorKind::DeformRoot(root_name.to_string()));
    }

    let mut parents = vec![];
    for idx in h.depth_first() {
        if idx == root || !h[idx].is_deform() {
            continue;
        }

        let mut new_parent = deform_parent_of(h, idx);
        if new_parent == Some(idx) {
            // DEF-X under ORG-X. Try again from ORG-X.
            let org = h.parent(idx);
            new_parent = org.and_then(|org| deform_parent_of(h, org));
            if new_parent == Some(idx) {
                bail!(ErrorKind::SelfParent(h[idx].name().to_string()));
            }
        }

        let new_parent = new_parent.unwrap_or(root);
        debug!("{} -> {}", h[idx].name(), h[new_parent].name());
        parents.push((idx, new_parent));
    }

    Ok(ReductionPlan { root, parents })
}

/// Builds the reduced hierarchy described by `plan`.
pub fn materialize(h: &Hierarchy, plan: &ReductionPlan) -> Result<Hierarchy> {
    let mut children: HashMap<BoneIdx, Vec<BoneIdx>> = HashMap::new();
    for &(idx, parent) in &plan.parents {
        children.entry(parent).or_insert_with(Vec::new).push(idx);
    }
    for list in children.values_mut() {
        list.sort();
    }

    let mut out = Hierarchy::new();
    let mut root_bone = h[plan.root].clone();
    root_bone.constraints.clear();
    root_bone.flags.connect = false;
    let new_root = out.add_bone(root_bone, None)?;

    let mut stack = vec![(plan.root, new_root)];
    while let Some((old_idx, new_idx)) = stack.pop() {
        let kids = match children.get(&old_idx) {
            Some(kids) => kids,
            None => continue,
        };
        let mut added = Vec::with_capacity(kids.len());
        for &kid in kids {
            let mut bone = h[kid].clone();
            bone.constraints.clear();
            // A connected head is pinned to the old parent's tail.
            if h.parent(kid) != Some(old_idx) {
                bone.flags.connect = false;
            }
            added.push((kid, out.add_bone(bone, Some(new_idx))?));
        }
        // Pop the first child first.
        stack.extend(added.into_iter().rev());
    }

    // Anything not reached from the root is stuck in a parent loop.
    if out.len() != plan.parents.len() + 1 {
        let stuck = plan.parents.iter()
            .map(|&(idx, _)| h[idx].name())
            .find(|name| !out.contains(name))
            .unwrap_or("?");
        bail!(ErrorKind::ReparentCycle(stuck.to_string()));
    }

    Ok(out)
}

/// Reduces `h` to the root bone plus all DEF- bones, in a single tree under
/// the root.
pub fn reduce(h: &mut Hierarchy, root_name: &str) -> Result<()> {
    let plan = plan_reduction(h, root_name)?;
    let reduced = materialize(h, &plan)?;
    debug!("reduced {} bones to {}", h.len(), reduced.len());
    *h = reduced;
    Ok(())
}
