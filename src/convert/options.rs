use anim::FrameRange;
use clap::ArgMatches;
use errors::{Error, Result};
use skeleton::ROOT_NAME;
use std::collections::HashMap;
use std::str::FromStr;

/// What a conversion may overwrite when its outputs' names are taken.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Overwrite {
    Nothing,
    Objects,
    Actions,
    Both,
}

impl Overwrite {
    pub fn objects(self) -> bool {
        self == Overwrite::Objects || self == Overwrite::Both
    }

    pub fn actions(self) -> bool {
        self == Overwrite::Actions || self == Overwrite::Both
    }
}

impl Default for Overwrite {
    fn default() -> Overwrite {
        Overwrite::Both
    }
}

impl FromStr for Overwrite {
    type Err = Error;

    fn from_str(s: &str) -> Result<Overwrite> {
        Ok(match s {
            "none" => Overwrite::Nothing,
            "objects" => Overwrite::Objects,
            "actions" => Overwrite::Actions,
            "both" => Overwrite::Both,
            _ => bail!("unknown overwrite policy {} (try none, objects, actions or both)", s),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Bone that becomes the root of the converted skeleton.
    pub root_bone: String,
    pub overwrite: Overwrite,
    /// Frame range overrides, by action name.
    pub frames: HashMap<String, FrameRange>,
}

impl Default for ConvertOptions {
    fn default() -> ConvertOptions {
        ConvertOptions {
            root_bone: ROOT_NAME.to_string(),
            overwrite: Overwrite::default(),
            frames: HashMap::new(),
        }
    }
}

impl ConvertOptions {
    pub fn from_arg_matches(matches: &ArgMatches) -> Result<ConvertOptions> {
        let mut options = ConvertOptions::default();
        if let Some(root) = matches.value_of("root") {
            options.root_bone = root.to_string();
        }
        if let Some(policy) = matches.value_of("overwrite") {
            options.overwrite = policy.parse()?;
        }
        if let Some(values) = matches.values_of("frames") {
            for value in values {
                let (action, range) = parse_frames_arg(value)?;
                options.frames.insert(action, range);
            }
        }
        Ok(options)
    }

    /// The frames to bake for the action called `action`.
    pub fn frames_for(&self, action: &str) -> FrameRange {
        self.frames.get(action).cloned().unwrap_or_default()
    }
}

/// Parses `ACTION=START:END`. Either bound may be left empty to use the
/// action's own.
fn parse_frames_arg(s: &str) -> Result<(String, FrameRange)> {
    let eq = match s.rfind('=') {
        Some(i) => i,
        None => bail!("bad --frames {}: expected ACTION=START:END", s),
    };
    let (action, range) = (&s[..eq], &s[eq + 1..]);
    let mut bounds = range.splitn(2, ':');
    let mut bound = || -> Result<i64> {
        match bounds.next() {
            Some("") => Ok(-1),
            Some(b) => match b.parse::<i64>() {
                Ok(n) => Ok(n),
                Err(_) => bail!("bad --frames {}: {} isn't a frame number", s, b),
            },
            None => bail!("bad --frames {}: expected ACTION=START:END", s),
        }
    };
    let start = bound()?;
    let end = bound()?;
    Ok((action.to_string(), FrameRange { start, end }))
}
