//! Keyframed scalar curves.

/// How a curve gets from one keyframe to the next.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Interpolation {
    /// Hold the value until the next keyframe.
    Constant,
    Linear,
}

impl Interpolation {
    pub fn name(self) -> &'static str {
        match self {
            Interpolation::Constant => "CONSTANT",
            Interpolation::Linear => "LINEAR",
        }
    }

    pub fn from_name(name: &str) -> Option<Interpolation> {
        match name {
            "CONSTANT" => Some(Interpolation::Constant),
            "LINEAR" => Some(Interpolation::Linear),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Keyframe {
    pub frame: f64,
    pub value: f64,
    /// Interpolation used on the way to the _next_ keyframe.
    pub interpolation: Interpolation,
}

/// Keyframes sorted by frame, with no two on the same frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Curve {
    keyframes: Vec<Keyframe>,
}

impl Curve {
    pub fn new() -> Curve {
        Curve::default()
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Inserts a keyframe, replacing any keyframe already on that frame.
    pub fn insert(&mut self, key: Keyframe) {
        let pos = self.keyframes.iter().position(|k| k.frame >= key.frame);
        match pos {
            Some(i) if self.keyframes[i].frame == key.frame => self.keyframes[i] = key,
            Some(i) => self.keyframes.insert(i, key),
            None => self.keyframes.push(key),
        }
    }

    /// First and last keyed frame.
    pub fn frame_range(&self) -> Option<(f64, f64)> {
        match (self.keyframes.first(), self.keyframes.last()) {
            (Some(first), Some(last)) => Some((first.frame, last.frame)),
            _ => None,
        }
    }

    /// Value of the curve at `frame`. Before the first and after the last
    /// keyframe the curve is flat.
    pub fn sample(&self, frame: f64) -> Option<f64> {
        let keys = &self.keyframes;
        let first = keys.first()?;
        let last = keys.last()?;
        if frame <= first.frame {
            return Some(first.value);
        }
        if frame >= last.frame {
            return Some(last.value);
        }

        // keys[i].frame <= frame < keys[i+1].frame
        let i = keys.iter().rposition(|k| k.frame <= frame)?;
        let (k0, k1) = (&keys[i], &keys[i + 1]);
        let value = match k0.interpolation {
            Interpolation::Constant => k0.value,
            Interpolation::Linear => {
                let t = (frame - k0.frame) / (k1.frame - k0.frame);
                (1.0 - t) * k0.value + t * k1.value
            }
        };
        Some(value)
    }
}
