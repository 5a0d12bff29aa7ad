//! Parley Learning crate - conversational feedback over executed commands.
//!
//! After an action runs, the [`LearningLoop`] watches for undo, rejection
//! or correction and adjusts the shared dictionary accordingly. Silence
//! within the window counts as acceptance. Low-confidence resolutions are
//! turned into confirmation questions, and the user's answer is learned.

pub mod effects;
pub mod error;
pub mod grammar;
pub mod learning_loop;
pub mod maintenance;
pub mod state;

pub use effects::{Effect, FeedbackEffects, NoopEffects, RecordingEffects};
pub use error::LearningError;
pub use grammar::{FeedbackGrammar, FeedbackSignal};
pub use learning_loop::{FeedbackOutcome, LearningLoop};
pub use maintenance::MaintenanceScheduler;
pub use state::{
    CorrectionContext, LearningPhase, LearningState, ObservedAction, PendingConfirmation,
};
