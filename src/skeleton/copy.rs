//! Copying bone trees.

use errors::{ErrorKind, Result};
use skeleton::{Bone, BoneIdx, Hierarchy};

/// Copies every bone reachable from `roots` into a fresh hierarchy.
///
/// Name, flags, head and tail are copied as-is. The roll comes from
/// `roll_of` instead, since the caller may only trust rolls read back from a
/// separate source. Constraints are not copied.
///
/// Parents are always added before their children. A copied bone's parent is
/// looked up by name in the new hierarchy, so a root whose parent wasn't
/// copied becomes parentless.
pub fn copy_bones<F>(source: &Hierarchy, roots: &[BoneIdx], roll_of: F) -> Result<Hierarchy>
where F: Fn(&str) -> Option<f64>
{
    let mut dest = Hierarchy::new();
    for &root in roots {
        copy_subtree(source, root, &roll_of, &mut dest)?;
    }
    Ok(dest)
}

fn copy_subtree<F>(source: &Hierarchy, idx: BoneIdx, roll_of: &F, dest: &mut Hierarchy) -> Result<()>
where F: Fn(&str) -> Option<f64>
{
    let src = &source[idx];

    // Already copied through an earlier root.
    if dest.contains(src.name()) {
        return Ok(());
    }

    let roll = roll_of(src.name())
        .ok_or_else(|| ErrorKind::MissingRoll(src.name().to_string()))?;

    let mut bone = Bone::new(src.name());
    bone.head = src.head;
    bone.tail = src.tail;
    bone.roll = roll;
    bone.flags = src.flags;

    let parent = source.parent_name(idx).and_then(|name| dest.find(name));
    if parent.is_none() {
        bone.flags.connect = false;
    }
    dest.add_bone(bone, parent)?;

    for child in source.children(idx) {
        copy_subtree(source, child, roll_of, dest)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::vec3;
    use skeleton::{hierarchy_from_pairs, Constraint};
    use scene::ObjectId;

    fn sample_hierarchy() -> Hierarchy {
        let mut h = hierarchy_from_pairs(&[
            ("root", None),
            ("DEF-spine", Some("root")),
            ("DEF-chest", Some("DEF-spine")),
            ("ORG-hand.L", Some("DEF-chest")),
            ("prop", None),
        ]);
        let chest = h.find("DEF-chest").unwrap();
        h[chest].head = vec3(0.0, 0.1, 1.2);
        h[chest].tail = vec3(0.0, 0.1, 1.5);
        h[chest].roll = 99.0;
        h[chest].flags.inherit_scale = false;
        h[chest].flags.connect = true;
        h[chest].flags.local_location = false;
        h[chest].constraints.push(Constraint::CopyTransforms {
            target: ObjectId(0),
            subtarget: "x".into(),
        });
        h
    }

    #[test]
    fn copy_is_lossless_except_roll() {
        let source = sample_hierarchy();
        let rolls = source.rolls();
        let roots = source.roots();
        let copy = copy_bones(&source, &roots, |name| rolls.get(name).map(|&r| r * 0.5)).unwrap();

        assert_eq!(copy.len(), source.len());
        for src in source.bones() {
            let dst = copy.get(src.name()).unwrap();
            assert_eq!(dst.head, src.head);
            assert_eq!(dst.tail, src.tail);
            assert_eq!(dst.flags, src.flags);
            assert_eq!(dst.roll, src.roll * 0.5);
            assert!(dst.constraints.is_empty());
            let src_parent = source.parent_name(source.find(src.name()).unwrap());
            let dst_parent = copy.parent_name(copy.find(src.name()).unwrap());
            assert_eq!(src_parent, dst_parent);
        }
    }

    #[test]
    fn only_reachable_bones_are_copied() {
        let source = sample_hierarchy();
        let spine = source.find("DEF-spine").unwrap();
        let copy = copy_bones(&source, &[spine], |_| Some(0.0)).unwrap();
        let mut names: Vec<&str> = copy.bones().map(|b| b.name()).collect();
        names.sort();
        assert_eq!(names, vec!["DEF-chest", "DEF-spine", "ORG-hand.L"]);
        // Its parent wasn't copied.
        assert_eq!(copy.roots(), vec![copy.find("DEF-spine").unwrap()]);
    }

    #[test]
    fn overlapping_roots_copy_once() {
        let source = sample_hierarchy();
        let root = source.find("root").unwrap();
        let chest = source.find("DEF-chest").unwrap();
        let copy = copy_bones(&source, &[root, chest], |_| Some(0.0)).unwrap();
        assert_eq!(copy.len(), 4);
    }

    #[test]
    fn missing_roll_is_fatal() {
        let source = sample_hierarchy();
        let roots = source.roots();
        let err = copy_bones(&source, &roots, |name| {
            if name == "DEF-chest" { None } else { Some(0.0) }
        }).unwrap_err();
        match *err.kind() {
            ErrorKind::MissingRoll(ref bone) => assert_eq!(bone, "DEF-chest"),
            ref e => panic!("unexpected error {:?}", e),
        }
    }
}
