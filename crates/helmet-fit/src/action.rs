//! Discrete positioning actions and their step sizes.

use std::fmt;
use std::str::FromStr;

use mesh_transform::Axis;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::HelmetFitError;
use crate::pose::Pose;

/// Which way a stepped control moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// One step up.
    Increase,
    /// One step down.
    Decrease,
}

impl Direction {
    /// `+1` or `-1`.
    pub const fn sign(self) -> i32 {
        match self {
            Self::Increase => 1,
            Self::Decrease => -1,
        }
    }

    const fn symbol(self) -> char {
        match self {
            Self::Increase => '+',
            Self::Decrease => '-',
        }
    }
}

/// Size of one step for each stepped control.
///
/// # Example
///
/// ```
/// use helmet_fit::StepSizes;
///
/// let steps = StepSizes::default().with_translation(1.0);
/// assert_eq!(steps.rotation_deg, 2.0);
/// assert_eq!(steps.translation, 1.0);
/// assert_eq!(steps.scale, 0.01);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepSizes {
    /// Degrees per rotation step.
    ///
    /// Default: `2.0`
    pub rotation_deg: f64,

    /// Millimeters per translation step.
    ///
    /// Default: `0.5`
    pub translation: f64,

    /// Scale change per step.
    ///
    /// Default: `0.01`
    pub scale: f64,
}

impl Default for StepSizes {
    fn default() -> Self {
        Self {
            rotation_deg: 2.0,
            translation: 0.5,
            scale: 0.01,
        }
    }
}

impl StepSizes {
    /// Coarse steps for rough placement.
    #[must_use]
    pub fn coarse() -> Self {
        Self {
            rotation_deg: 10.0,
            translation: 2.0,
            scale: 0.05,
        }
    }

    /// Set the rotation step in degrees.
    #[must_use]
    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation_deg = degrees;
        self
    }

    /// Set the translation step in millimeters.
    #[must_use]
    pub fn with_translation(mut self, millimeters: f64) -> Self {
        self.translation = millimeters;
        self
    }

    /// Set the scale step.
    #[must_use]
    pub fn with_scale(mut self, step: f64) -> Self {
        self.scale = step;
        self
    }
}

/// One user action on the head pose.
///
/// Actions parse from short tokens: `rx+`, `ty-`, `s+`, `smooth=40`.
///
/// ```
/// use helmet_fit::{Direction, PoseAction};
/// use mesh_transform::Axis;
///
/// let action: PoseAction = "rz-".parse().unwrap();
/// assert_eq!(action, PoseAction::Rotate { axis: Axis::Z, direction: Direction::Decrease });
/// assert_eq!(action.to_string(), "rz-");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoseAction {
    /// Rotate one step about a fixed world axis.
    Rotate {
        /// Rotation axis.
        axis: Axis,
        /// Step direction.
        direction: Direction,
    },
    /// Translate one step along an axis.
    Translate {
        /// Translation axis.
        axis: Axis,
        /// Step direction.
        direction: Direction,
    },
    /// Scale one step about the head centroid.
    Scale {
        /// Step direction.
        direction: Direction,
    },
    /// Set the smoothing slider.
    SetSmoothing {
        /// Slider value, clamped to 0..=100.
        percent: u8,
    },
}

impl PoseAction {
    /// Return the pose after this action.
    ///
    /// A scale step that would make the scale zero or negative is ignored.
    #[must_use]
    pub fn apply(&self, pose: &Pose, steps: &StepSizes) -> Pose {
        let mut counts = *pose.counts();
        let mut percent = pose.smoothing_percent();
        match *self {
            Self::Rotate { axis, direction } => counts.rotation[axis.index()] += direction.sign(),
            Self::Translate { axis, direction } => {
                counts.translation[axis.index()] += direction.sign();
            }
            Self::Scale { direction } => counts.scale += direction.sign(),
            Self::SetSmoothing { percent: p } => percent = p.min(100),
        }

        let next = Pose::from_counts(counts, percent, steps);
        if next.scale() <= 0.0 || !next.scale().is_finite() {
            debug!(scale = next.scale(), "ignoring scale step");
            return *pose;
        }
        next
    }
}

impl fmt::Display for PoseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rotate { axis, direction } => write!(f, "r{axis}{}", direction.symbol()),
            Self::Translate { axis, direction } => write!(f, "t{axis}{}", direction.symbol()),
            Self::Scale { direction } => write!(f, "s{}", direction.symbol()),
            Self::SetSmoothing { percent } => write!(f, "smooth={percent}"),
        }
    }
}

impl FromStr for PoseAction {
    type Err = HelmetFitError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let lower = token.trim().to_ascii_lowercase();

        if let Some(value) = lower.strip_prefix("smooth=") {
            let percent: u8 = value
                .parse()
                .map_err(|_| HelmetFitError::invalid_action(token, "smoothing must be 0-100"))?;
            if percent > 100 {
                return Err(HelmetFitError::invalid_action(token, "smoothing must be 0-100"));
            }
            return Ok(Self::SetSmoothing { percent });
        }

        let direction = match lower.chars().last() {
            Some('+') => Direction::Increase,
            Some('-') => Direction::Decrease,
            _ => return Err(HelmetFitError::invalid_action(token, "must end in + or -")),
        };
        let body = &lower[..lower.len() - 1];

        let axis = |name: &str| {
            name.parse::<Axis>()
                .map_err(|e| HelmetFitError::invalid_action(token, e.to_string()))
        };
        match body.split_at_checked(1) {
            Some(("r", name)) => Ok(Self::Rotate {
                axis: axis(name)?,
                direction,
            }),
            Some(("t", name)) => Ok(Self::Translate {
                axis: axis(name)?,
                direction,
            }),
            Some(("s", "")) => Ok(Self::Scale { direction }),
            _ => Err(HelmetFitError::invalid_action(
                token,
                "expected r<axis>, t<axis>, s or smooth=<percent>",
            )),
        }
    }
}

/// Parse a whitespace-separated action script such as `"rx+ rx+ s+ tz-"`.
///
/// # Errors
///
/// Returns [`HelmetFitError::InvalidAction`] for the first bad token.
pub fn parse_actions(script: &str) -> Result<Vec<PoseAction>, HelmetFitError> {
    script.split_whitespace().map(str::parse).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_kind() {
        let actions = parse_actions("rx+ RY- tz+ s- smooth=40").unwrap();
        assert_eq!(
            actions,
            vec![
                PoseAction::Rotate { axis: Axis::X, direction: Direction::Increase },
                PoseAction::Rotate { axis: Axis::Y, direction: Direction::Decrease },
                PoseAction::Translate { axis: Axis::Z, direction: Direction::Increase },
                PoseAction::Scale { direction: Direction::Decrease },
                PoseAction::SetSmoothing { percent: 40 },
            ]
        );
    }

    #[test]
    fn display_round_trips() {
        for token in ["rx+", "ry-", "tz+", "s-", "smooth=7"] {
            let action: PoseAction = token.parse().unwrap();
            assert_eq!(action.to_string(), token);
        }
    }

    #[test]
    fn rejects_bad_tokens() {
        for token in ["", "rx", "rw+", "q+", "sx+", "smooth=101", "smooth=abc", "t+"] {
            assert!(
                matches!(token.parse::<PoseAction>(), Err(HelmetFitError::InvalidAction { .. })),
                "{token}"
            );
        }
    }

    #[test]
    fn steps_accumulate_as_counts() {
        let steps = StepSizes::default();
        let up = PoseAction::Translate { axis: Axis::Y, direction: Direction::Increase };
        let mut pose = Pose::default();
        for _ in 0..3 {
            pose = up.apply(&pose, &steps);
        }
        assert_eq!(pose.counts().translation, [0, 3, 0]);
        assert_eq!(pose.translation().y, 1.5);
    }

    #[test]
    fn scale_cannot_reach_zero() {
        let steps = StepSizes::default().with_scale(0.5);
        let down = PoseAction::Scale { direction: Direction::Decrease };
        let pose = down.apply(&Pose::default(), &steps);
        assert_eq!(pose.scale(), 0.5);
        assert_eq!(down.apply(&pose, &steps), pose);
    }

    #[test]
    fn smoothing_is_clamped() {
        let pose = PoseAction::SetSmoothing { percent: 250 }.apply(&Pose::default(), &StepSizes::default());
        assert_eq!(pose.smoothing_percent(), 100);
        assert_eq!(pose.smoothing(), 1.0);
    }
}
