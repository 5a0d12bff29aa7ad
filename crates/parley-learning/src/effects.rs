//! Side-effect capability handed to the learning loop.
//!
//! The loop never performs I/O itself. Prompts and accepted actions go
//! through a [`FeedbackEffects`] implementation supplied at construction.

use std::sync::Mutex;

/// Outward effects of the learning loop.
pub trait FeedbackEffects: Send + Sync {
    /// Say a prompt or acknowledgment to the user.
    fn speak(&self, text: &str);
    /// Run an accepted action.
    fn execute(&self, action: &str, target: Option<&str>);
}

/// Discards every effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEffects;

impl FeedbackEffects for NoopEffects {
    fn speak(&self, _text: &str) {}
    fn execute(&self, _action: &str, _target: Option<&str>) {}
}

/// One recorded effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Speak(String),
    Execute {
        action: String,
        target: Option<String>,
    },
}

/// Records every effect in order. Test double.
#[derive(Debug, Default)]
pub struct RecordingEffects {
    log: Mutex<Vec<Effect>>,
}

impl RecordingEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effects(&self) -> Vec<Effect> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.effects()
            .into_iter()
            .filter_map(|e| match e {
                Effect::Speak(text) => Some(text),
                Effect::Execute { .. } => None,
            })
            .collect()
    }

    pub fn executed(&self) -> Vec<(String, Option<String>)> {
        self.effects()
            .into_iter()
            .filter_map(|e| match e {
                Effect::Execute { action, target } => Some((action, target)),
                Effect::Speak(_) => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn push(&self, effect: Effect) {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).push(effect);
    }
}

impl FeedbackEffects for RecordingEffects {
    fn speak(&self, text: &str) {
        self.push(Effect::Speak(text.to_string()));
    }

    fn execute(&self, action: &str, target: Option<&str>) {
        self.push(Effect::Execute {
            action: action.to_string(),
            target: target.map(str::to_string),
        });
    }
}

/// Deliver `effect` through `effects`.
pub fn dispatch(effects: &dyn FeedbackEffects, effect: &Effect) {
    match effect {
        Effect::Speak(text) => effects.speak(text),
        Effect::Execute { action, target } => effects.execute(action, target.as_deref()),
    }
}
