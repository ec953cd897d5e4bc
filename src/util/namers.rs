use std::collections::HashSet;

/// Returns unique names.
pub struct UniqueNamer {
    taken_names: HashSet<String>,
}

impl UniqueNamer {
    /// A namer for which every name in `taken` is already in use.
    pub fn with_taken<I, S>(taken: I) -> UniqueNamer
    where I: IntoIterator<Item = S>, S: Into<String> {
        UniqueNamer {
            taken_names: taken.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a name, either `desired_name` or something "close" to it, which
    /// has never been returned by a prior call to this function on the same
    /// `UniqueNamer` receiver (and wasn't taken to begin with).
    pub fn get_fresh_name<S: AsRef<str>>(&mut self, desired_name: S) -> String {
        let desired_name = desired_name.as_ref();
        let chosen_name =
            if !self.taken_names.contains(desired_name) {
                desired_name.to_string()
            } else {
                let mut name = String::new();
                for i in 1.. {
                    name = format!("{}{}", desired_name, i);
                    if !self.taken_names.contains(&name) {
                        break;
                    }
                }
                name
            };
        self.taken_names.insert(chosen_name.clone());
        chosen_name
    }
}

#[test]
fn test_unique_namer() {
    let mut un = UniqueNamer::with_taken(Vec::<String>::new());
    assert_eq!(un.get_fresh_name("A"), "A");
    assert_eq!(un.get_fresh_name("A"), "A1");
    assert_eq!(un.get_fresh_name("A"), "A2");
    assert_eq!(un.get_fresh_name("B"), "B");
    assert_eq!(un.get_fresh_name("A"), "A3");
}

#[test]
fn test_unique_namer_with_taken() {
    let mut un = UniqueNamer::with_taken(vec!["walk_Converted", "walk_Converted1"]);
    assert_eq!(un.get_fresh_name("walk_Converted"), "walk_Converted2");
    assert_eq!(un.get_fresh_name("run_Converted"), "run_Converted");
    assert_eq!(un.get_fresh_name("run_Converted"), "run_Converted1");
}
