//! Run state machine.
//!
//! `DISCOVERING → PROCESSING → REDUCING → SYNTHESIZING → WRITING → DONE`, with
//! `FAILED` reachable from every non-terminal stage. `PROCESSING` may jump to
//! `DONE` when synthesis is skipped, and a finalize retry re-enters
//! `REDUCING` from `SYNTHESIZING` or `WRITING`.

use serde::Serialize;
use strum::{Display, EnumString};
use tracing::info;

use crate::error::RunError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Discovering,
    Processing,
    Reducing,
    Synthesizing,
    Writing,
    Done,
    Failed,
}

impl Stage {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        use Stage::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Discovering, Processing)
            | (Processing, Reducing | Done)
            | (Reducing, Synthesizing)
            | (Synthesizing, Writing | Reducing)
            | (Writing, Done | Reducing) => true,
            _ => false,
        }
    }
}

/// Current stage plus every stage entered so far.
#[derive(Debug, Clone, Serialize)]
pub struct StageTracker {
    current: Stage,
    history: Vec<Stage>,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self {
            current: Stage::Discovering,
            history: vec![Stage::Discovering],
        }
    }
}

impl StageTracker {
    #[must_use]
    pub fn current(&self) -> Stage {
        self.current
    }

    #[must_use]
    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    /// # Errors
    ///
    /// Returns `RunError::InvalidTransition` when `next` is not reachable
    /// from the current stage.
    pub fn advance(&mut self, next: Stage) -> Result<(), RunError> {
        if !self.current.can_advance_to(next) {
            return Err(RunError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        info!(from = %self.current, stage = %next, "Stage transition");
        self.current = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to `FAILED` unless already terminal.
    pub fn fail(&mut self) {
        if !self.current.is_terminal() {
            info!(from = %self.current, stage = %Stage::Failed, "Stage transition");
            self.current = Stage::Failed;
            self.history.push(Stage::Failed);
        }
    }
}
