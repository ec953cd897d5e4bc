error_chain! {
    foreign_links {
        Fmt(::std::fmt::Error);
        Io(::std::io::Error);
        Json(::json::Error);
    }

    errors {
        // Preconditions. These are checked before a run touches the scene.
        NotARig(object: String) {
            description("not a deformation rig")
            display("object {} has no DEF- bones; it isn't a rig skelbake understands", object)
        }
        MissingRootBone(bone: String) {
            description("root bone not found")
            display("no bone named {} to use as the root", bone)
        }
        DeformRoot(bone: String) {
            description("root bone is a deformation bone")
            display("root bone {} can't be a DEF- bone", bone)
        }
        AmbiguousRoot(object: String, candidates: usize) {
            description("couldn't identify the root bone")
            display("couldn't find root bone in armature {} ({} candidates, need exactly 1)",
                object, candidates)
        }
        MeshCount(object: String, count: usize) {
            description("wrong number of meshes under the rig")
            display("rig {} is the parent of {} meshes", object, count)
        }
        BadFrameRange(action: String, start: i64, end: i64) {
            description("bad frame range")
            display("action {} has an unusable frame range [{}, {}]", action, start, end)
        }
        EmptyAction(action: String) {
            description("action has no keyframes")
            display("action {} has no keyframes, so it has no frame range", action)
        }
        NoSuchObject(name: String) {
            description("no such object")
            display("no object named {}", name)
        }
        NoSuchAction(name: String) {
            description("no such action")
            display("no action named {}", name)
        }
        WrongObjectKind(name: String, expected: &'static str) {
            description("object has the wrong type")
            display("object {} is not {}", name, expected)
        }
        NameOccupied(name: String) {
            description("output name is taken by another kind of object")
            display("can't create {}: an object of another type already has that name \
                and overwriting objects is disabled", name)
        }

        // Structural inconsistencies. Fatal.
        SelfParent(bone: String) {
            description("bone would be its own parent")
            display("re-parenting {} would make it its own parent", bone)
        }
        ReparentCycle(bone: String) {
            description("re-parenting produced a cycle")
            display("re-parenting produced a cycle through {}", bone)
        }
        MissingRoll(bone: String) {
            description("no roll for bone")
            display("no roll available for bone {}", bone)
        }
        BoneNameTaken(bone: String) {
            description("bone name already in use")
            display("there is already a bone named {}", bone)
        }
        ConstraintCycle(object: String) {
            description("constraint dependency cycle")
            display("transform constraints on {} depend on themselves", object)
        }

        // Bad input files.
        BadScene(what: String) {
            description("malformed scene file")
            display("malformed scene file: {}", what)
        }
    }
}

macro_rules! check {
    ($b:expr) => {
        if !$b {
            use errors::Error;
            use errors::ErrorKind;
            Err(Error::from_kind(ErrorKind::Msg(format!(
                "expected: {}",
                stringify!($b)
            ))))
        } else {
            Ok(())
        }
    };
}
