//! Final names for bones and the channels that animate them.
//!
//! Bones lose their DEF- prefix and the root bone becomes `root`. Channel
//! paths and group labels get the same substitutions, but as plain substring
//! replacements anywhere in the string, since the bone name is buried inside
//! the path.

use anim::Action;
use errors::{ErrorKind, Result};
use scene::Mesh;
use skeleton::{BoneRole, Hierarchy, DEF_PREFIX, ROOT_NAME};

/// `(old name, new name)` for every bone that was renamed.
pub type BoneRenames = Vec<(String, String)>;

pub fn rename_bones(h: &mut Hierarchy, root_name: &str) -> Result<BoneRenames> {
    let root = match h.find(root_name) {
        Some(idx) => Some(idx),
        // Already renamed.
        None if h.contains(ROOT_NAME) => None,
        None => bail!(ErrorKind::MissingRootBone(root_name.to_string())),
    };

    let mut renames: BoneRenames = h.bones()
        .filter(|bone| bone.role() == BoneRole::Deform)
        .map(|bone| (bone.name().to_string(), bone.name()[DEF_PREFIX.len()..].to_string()))
        .collect();
    for &(ref old, ref new) in &renames {
        if let Some(idx) = h.find(old) {
            h.rename_bone(idx, new)?;
        }
    }

    if let Some(root) = root {
        if root_name != ROOT_NAME {
            h.rename_bone(root, ROOT_NAME)?;
            renames.push((root_name.to_string(), ROOT_NAME.to_string()));
        }
    }

    Ok(renames)
}

fn substitute(s: &mut String, from: &str, to: &str) {
    if !from.is_empty() && s.contains(from) {
        *s = s.replace(from, to);
    }
}

/// Whether `renames` includes renaming the root bone `root_name`.
pub fn renames_root(renames: &BoneRenames, root_name: &str) -> bool {
    renames.iter().any(|&(ref old, ref new)| old == root_name && new == ROOT_NAME)
}

/// Strips DEF- from every channel path and group. The root name is only
/// replaced when `rename_root` is set, ie. when the root bone was renamed in
/// the same pass.
pub fn rename_channels(action: &mut Action, root_name: &str, rename_root: bool) {
    for channel in &mut action.channels {
        substitute(&mut channel.data_path, DEF_PREFIX, "");
        if rename_root {
            substitute(&mut channel.data_path, root_name, ROOT_NAME);
        }
        if let Some(ref mut group) = channel.group {
            substitute(group, DEF_PREFIX, "");
            if rename_root {
                substitute(group, root_name, ROOT_NAME);
            }
        }
    }
}

/// Renames the bones of `h` and every channel of `actions`. Running it again
/// with the same root name changes nothing.
pub fn rename<'a, I>(h: &mut Hierarchy, actions: I, root_name: &str) -> Result<BoneRenames>
where I: IntoIterator<Item = &'a mut Action>
{
    let renames = rename_bones(h, root_name)?;
    let rename_root = renames_root(&renames, root_name);
    for action in actions {
        rename_channels(action, root_name, rename_root);
    }
    Ok(renames)
}

/// Vertex groups follow the bones they are named after.
pub fn rename_vertex_groups(mesh: &mut Mesh, renames: &BoneRenames) {
    for group in &mut mesh.vertex_groups {
        if let Some(&(_, ref new)) = renames.iter().find(|&&(ref old, _)| old.as_str() == group.as_str()) {
            *group = new.clone();
        }
    }
}
