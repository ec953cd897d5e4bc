//! Actions: named bundles of keyframed channels.
//!
//! A channel animates one component of one property, named by a data path
//! like
//!
//!     pose.bones["DEF-spine"].rotation_quaternion
//!
//! and an array index (`w, x, y, z` are 0..4 for a quaternion). Channels for a
//! bone are usually grouped under a label with the bone's name.

pub mod curve;

pub use self::curve::{Curve, Interpolation, Keyframe};

use errors::{ErrorKind, Result};

pub static LOCATION: &str = "location";
pub static ROTATION_QUATERNION: &str = "rotation_quaternion";
pub static ROTATION_EULER: &str = "rotation_euler";
pub static SCALE: &str = "scale";

static POSE_BONES_OPEN: &str = "pose.bones[\"";
static POSE_BONES_CLOSE: &str = "\"]";

/// Data path of a property of a pose bone.
pub fn pose_bone_path(bone: &str, property: &str) -> String {
    format!("{}{}{}.{}", POSE_BONES_OPEN, bone, POSE_BONES_CLOSE, property)
}

/// Splits `pose.bones["NAME"].prop` into `("NAME", "prop")`.
pub fn split_pose_bone_path(path: &str) -> Option<(&str, &str)> {
    if !path.starts_with(POSE_BONES_OPEN) {
        return None;
    }
    let rest = &path[POSE_BONES_OPEN.len()..];
    let close = rest.find(POSE_BONES_CLOSE)?;
    let bone = &rest[..close];
    let after = &rest[close + POSE_BONES_CLOSE.len()..];
    if !after.starts_with('.') {
        return None;
    }
    Some((bone, &after[1..]))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub data_path: String,
    pub array_index: usize,
    pub group: Option<String>,
    pub curve: Curve,
}

impl Channel {
    pub fn new<S: Into<String>>(data_path: S, array_index: usize) -> Channel {
        Channel {
            data_path: data_path.into(),
            array_index,
            group: None,
            curve: Curve::new(),
        }
    }

    /// Name of the pose bone this channel animates.
    pub fn bone_name(&self) -> Option<&str> {
        split_pose_bone_path(&self.data_path).map(|(bone, _)| bone)
    }

    /// Name of the animated property, eg. `location`.
    pub fn property(&self) -> &str {
        match split_pose_bone_path(&self.data_path) {
            Some((_, prop)) => prop,
            None => &self.data_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub name: String,
    pub channels: Vec<Channel>,
    /// Keep the action around even when nothing uses it.
    pub fake_user: bool,
    /// Playback range set by hand. Overrides the keyframe range.
    pub manual_range: Option<(f64, f64)>,
}

impl Action {
    pub fn new<S: Into<String>>(name: S) -> Action {
        Action {
            name: name.into(),
            channels: vec![],
            fake_user: false,
            manual_range: None,
        }
    }

    /// Range from the first to the last keyframe of any channel, unless a
    /// manual range is set.
    pub fn natural_range(&self) -> Option<(f64, f64)> {
        if self.manual_range.is_some() {
            return self.manual_range;
        }
        self.channels.iter()
            .filter_map(|c| c.curve.frame_range())
            .fold(None, |acc, (lo, hi)| match acc {
                None => Some((lo, hi)),
                Some((a, b)) => Some((a.min(lo), b.max(hi))),
            })
    }

    /// Finds a channel, creating it (in `group`) if it doesn't exist.
    pub fn channel_or_insert(&mut self, data_path: &str, array_index: usize, group: &str) -> &mut Channel {
        let pos = self.channels.iter()
            .position(|c| c.data_path == data_path && c.array_index == array_index);
        let i = match pos {
            Some(i) => i,
            None => {
                let mut channel = Channel::new(data_path, array_index);
                channel.group = Some(group.to_string());
                self.channels.push(channel);
                self.channels.len() - 1
            }
        };
        &mut self.channels[i]
    }
}

/// A requested frame range. A negative component means "use the action's own
/// range" for that end.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameRange {
    pub start: i64,
    pub end: i64,
}

impl Default for FrameRange {
    fn default() -> FrameRange {
        FrameRange { start: -1, end: -1 }
    }
}

impl FrameRange {
    /// The inclusive integer range to bake `action` over. The action's own
    /// range is widened outwards to whole frames.
    pub fn resolve(self, action: &Action) -> Result<(i64, i64)> {
        let natural = || {
            action.natural_range()
                .ok_or_else(|| ErrorKind::EmptyAction(action.name.clone()))
        };
        let start = match self.start {
            s if s >= 0 => s,
            _ => natural()?.0.floor() as i64,
        };
        let end = match self.end {
            e if e >= 0 => e,
            _ => natural()?.1.ceil() as i64,
        };
        if start > end {
            bail!(ErrorKind::BadFrameRange(action.name.clone(), start, end));
        }
        Ok((start, end))
    }
}
