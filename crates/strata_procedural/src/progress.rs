//! Progress reporting for cooperative generation.
//!
//! Every pass is a resumable state machine. One call to `step` processes a
//! bounded number of work units and reports where it got to, so the host can
//! redraw a loading screen between steps.

use std::fmt;

/// Number of steps a pass is split into.
pub const STEPS_PER_PASS: usize = 10;

/// Work units a pass processes per step: `ceil(total / 10)`, at least 1.
#[inline]
#[must_use]
pub fn step_budget(total: usize) -> usize {
    total.div_ceil(STEPS_PER_PASS).max(1)
}

/// Generation stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Cell heights, layers and materials.
    Cells,
    /// Height lowering and material exposure.
    Erosion,
    /// Water depth and wet variants.
    Hydration,
    /// Initial chunk bake around spawn.
    Baking,
    /// Background chunk buffer.
    Streaming,
    /// Region flood fill.
    Regions,
}

impl Stage {
    /// Human-readable stage label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cells => "generating cells",
            Self::Erosion => "eroding terrain",
            Self::Hydration => "hydrating terrain",
            Self::Baking => "baking chunks",
            Self::Streaming => "streaming chunks",
            Self::Regions => "classifying regions",
        }
    }
}

/// Snapshot of generation progress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Progress {
    /// Current stage.
    pub stage: Stage,
    /// Work units done in this stage.
    pub completed: usize,
    /// Work units in this stage.
    pub total: usize,
    /// Display message.
    pub message: String,
}

impl Progress {
    /// Creates a progress report with the stage's default message.
    #[must_use]
    pub fn new(stage: Stage, completed: usize, total: usize) -> Self {
        Self { stage, completed, total, message: stage.label().to_string() }
    }

    /// Fraction of the stage completed, in [0, 1].
    #[must_use]
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            (self.completed as f32 / self.total as f32).min(1.0)
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.message, self.completed, self.total)
    }
}

/// Result of stepping one pass.
#[derive(Debug)]
pub enum PassStep<T> {
    /// More work remains.
    Pending(Progress),
    /// The pass finished and produced its output.
    Done(T),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_budget() {
        assert_eq!(step_budget(0), 1);
        assert_eq!(step_budget(1), 1);
        assert_eq!(step_budget(10), 1);
        assert_eq!(step_budget(11), 2);
        assert_eq!(step_budget(1000), 100);
    }

    #[test]
    fn test_progress_fraction() {
        assert!((Progress::new(Stage::Erosion, 5, 10).fraction() - 0.5).abs() < f32::EPSILON);
        assert!((Progress::new(Stage::Regions, 0, 0).fraction() - 1.0).abs() < f32::EPSILON);
        assert_eq!(Progress::new(Stage::Cells, 1, 4).to_string(), "generating cells (1/4)");
    }
}
