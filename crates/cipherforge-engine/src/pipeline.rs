//! The per-target stage model: Verify → AcquireSource → Build → Collect.

use std::fmt;
use std::path::PathBuf;

use cipherforge_targets::TargetId;

/// The four stages of one target's pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Verify,
    AcquireSource,
    Build,
    Collect,
}

impl PipelineStage {
    /// All stages in execution order.
    pub const ALL: [Self; 4] = [
        Self::Verify,
        Self::AcquireSource,
        Self::Build,
        Self::Collect,
    ];
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Verify => "Verify",
            Self::AcquireSource => "AcquireSource",
            Self::Build => "Build",
            Self::Collect => "Collect",
        };
        f.write_str(name)
    }
}

/// State of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

/// What happened to one target across its pipeline.
#[derive(Debug)]
pub struct TargetOutcome {
    pub target: TargetId,
    stages: Vec<(PipelineStage, StageState)>,
    /// Directory holding the target's collected artifacts, when any stage
    /// produced them.
    pub output_dir: Option<PathBuf>,
    /// Captured stdout of the final build script.
    pub stdout: String,
    /// Captured stderr of the final build script.
    pub stderr: String,
    pub success: bool,
}

impl TargetOutcome {
    /// A fresh outcome with every stage pending.
    pub fn new(target: TargetId) -> Self {
        Self {
            target,
            stages: PipelineStage::ALL
                .into_iter()
                .map(|s| (s, StageState::Pending))
                .collect(),
            output_dir: None,
            stdout: String::new(),
            stderr: String::new(),
            success: false,
        }
    }

    /// Outcome for a target skipped because the host cannot build it.
    /// Not a failure: the same declarative target list is shared across
    /// CI hosts running different operating systems.
    pub fn ignored(target: TargetId) -> Self {
        let mut outcome = Self::new(target);
        for (_, state) in &mut outcome.stages {
            *state = StageState::Skipped;
        }
        outcome.success = true;
        outcome
    }

    /// Whether every stage was skipped (host-unsupported target).
    pub fn is_ignored(&self) -> bool {
        self.stages.iter().all(|(_, s)| *s == StageState::Skipped)
    }

    /// Record a stage transition.
    pub fn set(&mut self, stage: PipelineStage, state: StageState) {
        for (s, current) in &mut self.stages {
            if *s == stage {
                *current = state;
            }
        }
    }

    /// Mark every stage still pending as skipped (after a failure).
    pub fn skip_pending(&mut self) {
        for (_, state) in &mut self.stages {
            if *state == StageState::Pending {
                *state = StageState::Skipped;
            }
        }
    }

    /// Current state of a stage.
    pub fn state(&self, stage: PipelineStage) -> StageState {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map_or(StageState::Pending, |(_, state)| *state)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn new_outcome_is_all_pending() {
        let outcome = TargetOutcome::new(TargetId::LinuxX64);
        for stage in PipelineStage::ALL {
            assert_eq!(outcome.state(stage), StageState::Pending);
        }
        assert!(!outcome.success);
        assert!(!outcome.is_ignored());
    }

    #[test]
    fn ignored_outcome_skips_everything_without_failing() {
        let outcome = TargetOutcome::ignored(TargetId::MingwX64);
        assert!(outcome.is_ignored());
        assert!(outcome.success);
        assert!(outcome.output_dir.is_none());
    }

    #[test]
    fn failure_skips_downstream_stages() {
        let mut outcome = TargetOutcome::new(TargetId::LinuxX64);
        outcome.set(PipelineStage::Verify, StageState::Succeeded);
        outcome.set(PipelineStage::AcquireSource, StageState::Failed);
        outcome.skip_pending();

        assert_eq!(outcome.state(PipelineStage::Verify), StageState::Succeeded);
        assert_eq!(outcome.state(PipelineStage::AcquireSource), StageState::Failed);
        assert_eq!(outcome.state(PipelineStage::Build), StageState::Skipped);
        assert_eq!(outcome.state(PipelineStage::Collect), StageState::Skipped);
    }

    #[test]
    fn stage_names_render_for_logs() {
        assert_eq!(PipelineStage::AcquireSource.to_string(), "AcquireSource");
    }
}
