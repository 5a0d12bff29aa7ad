//! The learning loop: conversational feedback after a resolved action.
//!
//! One [`LearningLoop`] owns the current [`LearningState`] and the timers
//! that belong to it. Every transition cancels all live timers before the
//! next state starts its own, so a timer never outlives the state that
//! started it. Timers also carry the generation they were started in and
//! are ignored if the loop has moved on by the time they fire.
//!
//! Dictionary mutations happen under the state lock; prompts and executed
//! actions are collected and dispatched after it is released.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use parley_core::config::LearningConfig;
use parley_core::text::normalize_utterance;
use parley_core::types::{clamp_confidence, CommandSource, ResolutionTier, Timestamp};
use parley_dictionary::{describe_action, CommandDictionary};
use parley_intent::ResolutionResult;
use tokio::task::JoinHandle;

use crate::effects::{dispatch, Effect, FeedbackEffects};
use crate::error::LearningError;
use crate::grammar::{FeedbackGrammar, FeedbackSignal};
use crate::state::{
    CorrectionContext, LearningPhase, LearningState, ObservedAction, PendingConfirmation,
};

/// Whether the loop took an utterance as feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOutcome {
    /// The utterance was feedback; do not resolve or type it.
    Consumed,
    /// Not feedback; resolve it normally.
    NotFeedback,
}

impl FeedbackOutcome {
    pub fn is_consumed(&self) -> bool {
        matches!(self, FeedbackOutcome::Consumed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    ImplicitPositive,
    Confirmation,
    Correction,
}

struct Inner {
    state: LearningState,
    generation: u64,
    positive_timer: Option<JoinHandle<()>>,
    confirmation_timer: Option<JoinHandle<()>>,
    correction_timer: Option<JoinHandle<()>>,
}

impl Inner {
    fn cancel_timers(&mut self) {
        for timer in [
            self.positive_timer.take(),
            self.confirmation_timer.take(),
            self.correction_timer.take(),
        ]
        .into_iter()
        .flatten()
        {
            timer.abort();
        }
    }

    fn timer_slot(&mut self, kind: TimerKind) -> &mut Option<JoinHandle<()>> {
        match kind {
            TimerKind::ImplicitPositive => &mut self.positive_timer,
            TimerKind::Confirmation => &mut self.confirmation_timer,
            TimerKind::Correction => &mut self.correction_timer,
        }
    }

    /// Cancel timers, bump the generation and enter `next`.
    fn transition(&mut self, next: LearningState) {
        let from = self.state.phase();
        let to = next.phase();
        if let Err(e) = from.check_transition(to) {
            tracing::warn!(error = %e, "Unexpected learning transition");
        }
        self.cancel_timers();
        self.generation = self.generation.wrapping_add(1);
        self.state = next;
        tracing::debug!(from = %from, to = %to, "Learning state changed");
    }
}

/// Effects and persistence owed once the state lock is released.
#[derive(Default)]
struct Pending {
    effects: Vec<Effect>,
    dirty: bool,
}

impl Pending {
    fn speak(&mut self, text: impl Into<String>) {
        self.effects.push(Effect::Speak(text.into()));
    }

    fn execute(&mut self, action: &str, target: Option<&str>) {
        self.effects.push(Effect::Execute {
            action: action.to_string(),
            target: target.map(str::to_string),
        });
    }
}

struct Shared {
    dictionary: Arc<CommandDictionary>,
    effects: Arc<dyn FeedbackEffects>,
    grammar: FeedbackGrammar,
    config: LearningConfig,
    inner: Mutex<Inner>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.inner
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .cancel_timers();
    }
}

/// Human wording for an action, used in prompts.
fn describe(action: &str) -> String {
    describe_action(action)
        .map(str::to_string)
        .unwrap_or_else(|| action.to_lowercase().replace('_', " "))
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn finish(&self, pending: Pending) {
        if pending.dirty {
            self.dictionary.autosave();
        }
        for effect in &pending.effects {
            dispatch(self.effects.as_ref(), effect);
        }
    }

    fn start_timer(self: &Arc<Self>, inner: &mut Inner, kind: TimerKind, delay: Duration) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(timer = ?kind, "No async runtime, learning timer not started");
                return;
            }
        };
        let generation = inner.generation;
        let weak: Weak<Shared> = Arc::downgrade(self);
        let task = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                shared.on_timer(kind, generation);
            }
        });
        *inner.timer_slot(kind) = Some(task);
    }

    fn on_timer(&self, kind: TimerKind, generation: u64) {
        let mut pending = Pending::default();
        {
            let mut inner = self.lock();
            if inner.generation != generation {
                return;
            }
            // Our own handle; dropping it detaches rather than aborts.
            inner.timer_slot(kind).take();

            match (kind, std::mem::take(&mut inner.state)) {
                (TimerKind::ImplicitPositive, LearningState::Observing(observed)) => {
                    self.accept(&observed, &mut pending);
                    inner.transition(LearningState::Idle);
                }
                (TimerKind::Confirmation, LearningState::AwaitingConfirmation(p)) => {
                    tracing::debug!(phrase = %p.phrase, "Confirmation unanswered, discarding");
                    inner.transition(LearningState::Idle);
                }
                (TimerKind::Correction, LearningState::AwaitingCorrection(c)) => {
                    tracing::debug!(phrase = %c.phrase, "Correction abandoned");
                    inner.transition(LearningState::Idle);
                }
                (_, state) => inner.state = state,
            }
        }
        self.finish(pending);
    }

    // =========================================================================
    // Dictionary feedback
    // =========================================================================

    /// Implicit acceptance of an observed action.
    fn accept(&self, observed: &ObservedAction, pending: &mut Pending) {
        let key = observed.feedback_phrase();
        match self.dictionary.entry_for(key) {
            Some(entry) if entry.action == observed.action => {
                self.dictionary
                    .adjust_entry_confidence(entry.id, self.config.implicit_positive);
                self.dictionary.record_use(key);
                pending.dirty = true;
                tracing::debug!(phrase = key, action = %observed.action, "Action accepted");
            }
            None if observed.tier == ResolutionTier::External
                && observed.confidence >= self.config.auto_learn_threshold =>
            {
                self.dictionary.learn_with_target(
                    &observed.phrase,
                    &observed.action,
                    observed.target.clone(),
                    CommandSource::Learned,
                    observed.confidence,
                );
                self.dictionary.record_use(&observed.phrase);
                pending.dirty = true;
                tracing::info!(
                    phrase = %observed.phrase,
                    action = %observed.action,
                    confidence = observed.confidence,
                    "Auto-learned classifier result"
                );
            }
            _ => {}
        }
    }

    /// Lower the confidence of the entry mapping `phrase` to `action`, and
    /// drop it if it is not a default entry and falls below the floor.
    fn penalize(&self, phrase: &str, action: &str, delta: f32, pending: &mut Pending) {
        let Some(entry) = self.dictionary.entry_for(phrase) else {
            return;
        };
        if entry.action != action {
            return;
        }
        let Some(confidence) = self.dictionary.adjust_entry_confidence(entry.id, delta) else {
            return;
        };
        pending.dirty = true;

        if !entry.is_default() && confidence < self.config.remove_learned_below {
            self.dictionary.forget(phrase);
            tracing::info!(phrase, action, confidence, "Forgot rejected mapping");
        } else {
            tracing::debug!(phrase, action, confidence, "Negative feedback recorded");
        }
    }

    /// Persist a confirmed suggestion. A fuzzy suggestion also teaches the
    /// spoken phrase and reinforces the entry it was matched against.
    fn affirm(&self, p: &PendingConfirmation, pending: &mut Pending) {
        let delta = self.config.explicit_confirm;
        self.dictionary.confirm(
            &p.phrase,
            &p.suggested_action,
            p.target.clone(),
            p.confidence,
            delta,
        );
        if let Some(matched) = p.matched_phrase.as_deref().filter(|m| *m != p.phrase) {
            if let Some(entry) = self.dictionary.entry_for(matched) {
                if entry.action == p.suggested_action {
                    self.dictionary.adjust_entry_confidence(entry.id, delta);
                }
            }
        }
        self.dictionary.record_use(&p.phrase);
        pending.dirty = true;
    }

    /// Map `context.phrase` to whatever `intended` resolves to.
    fn apply_correction(&self, context: &CorrectionContext, intended: &str, pending: &mut Pending) {
        let intended = normalize_utterance(intended);
        let Some(m) = self.dictionary.lookup(&intended) else {
            tracing::debug!(intended = %intended, "Correction names no known command");
            pending.speak("Sorry, I don't know that command.");
            return;
        };

        if m.action == context.action {
            pending.speak("Okay.");
            return;
        }

        self.dictionary.learn_with_target(
            &context.phrase,
            &m.action,
            m.target.clone(),
            CommandSource::Confirmed,
            m.confidence,
        );
        self.dictionary.record_use(&context.phrase);
        pending.dirty = true;
        pending.execute(&m.action, m.target.as_deref());
        pending.speak(format!(
            "Got it. \"{}\" will {} from now on.",
            context.phrase,
            describe(&m.action)
        ));
        tracing::info!(
            phrase = %context.phrase,
            from = %context.action,
            to = %m.action,
            "Learned correction"
        );
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Leave whatever state we are in ahead of a new action or suggestion.
    /// An observation still pending counts as accepted.
    fn settle(&self, inner: &mut Inner, pending: &mut Pending) {
        match std::mem::take(&mut inner.state) {
            LearningState::Observing(previous) => self.accept(&previous, pending),
            LearningState::AwaitingConfirmation(p) => {
                tracing::debug!(phrase = %p.phrase, "Pending confirmation superseded");
            }
            LearningState::AwaitingCorrection(c) => {
                tracing::debug!(phrase = %c.phrase, "Pending correction superseded");
            }
            LearningState::Idle => {}
        }
    }

    fn observe(self: &Arc<Self>, observed: ObservedAction) {
        let mut pending = Pending::default();
        {
            let mut inner = self.lock();
            self.settle(&mut inner, &mut pending);
            tracing::debug!(
                phrase = %observed.phrase,
                action = %observed.action,
                tier = %observed.tier,
                "Observing action"
            );
            inner.transition(LearningState::Observing(observed));
            self.start_timer(&mut inner, TimerKind::ImplicitPositive, self.config.positive_window());
        }
        self.finish(pending);
    }

    fn ask(self: &Arc<Self>, confirmation: PendingConfirmation) {
        let mut pending = Pending::default();
        {
            let mut inner = self.lock();
            self.settle(&mut inner, &mut pending);
            pending.speak(format!("Did you mean {}?", confirmation.description));
            inner.transition(LearningState::AwaitingConfirmation(confirmation));
            self.start_timer(
                &mut inner,
                TimerKind::Confirmation,
                self.config.confirmation_timeout(),
            );
        }
        self.finish(pending);
    }

    /// Enter `AwaitingCorrection`, or apply the correction at once if the
    /// user already named the intended phrase.
    fn reject(
        self: &Arc<Self>,
        inner: &mut Inner,
        context: CorrectionContext,
        intended: Option<String>,
        pending: &mut Pending,
    ) {
        match intended {
            Some(intended) => {
                self.apply_correction(&context, &intended, pending);
                inner.transition(LearningState::Idle);
            }
            None => {
                pending.speak("What did you mean?");
                inner.transition(LearningState::AwaitingCorrection(context));
                self.start_timer(inner, TimerKind::Correction, self.config.correction_timeout());
            }
        }
    }

    fn handle_utterance(self: &Arc<Self>, text: &str) -> FeedbackOutcome {
        let mut pending = Pending::default();
        let outcome = {
            let mut inner = self.lock();
            let signal = self.grammar.classify(text);

            match (std::mem::take(&mut inner.state), signal) {
                (LearningState::Idle, _) => FeedbackOutcome::NotFeedback,

                // -------------------------------------------------------------
                // Observing
                // -------------------------------------------------------------
                (LearningState::Observing(observed), Some(FeedbackSignal::Undo)) => {
                    // Restore first so the transition is checked from the
                    // right phase.
                    inner.state = LearningState::Observing(observed.clone());
                    self.penalize(
                        observed.feedback_phrase(),
                        &observed.action,
                        self.config.immediate_undo,
                        &mut pending,
                    );
                    inner.transition(LearningState::Idle);
                    FeedbackOutcome::Consumed
                }
                (LearningState::Observing(observed), Some(FeedbackSignal::Negative(intended))) => {
                    inner.state = LearningState::Observing(observed.clone());
                    self.penalize(
                        observed.feedback_phrase(),
                        &observed.action,
                        self.config.explicit_reject,
                        &mut pending,
                    );
                    let context = CorrectionContext {
                        phrase: observed.phrase.clone(),
                        action: observed.action.clone(),
                        confidence: clamp_confidence(
                            observed.confidence + self.config.explicit_reject,
                        ),
                        tier: Some(observed.tier),
                        timestamp: Timestamp::now(),
                    };
                    self.reject(&mut inner, context, intended, &mut pending);
                    FeedbackOutcome::Consumed
                }
                (state @ LearningState::Observing(_), _) => {
                    inner.state = state;
                    FeedbackOutcome::NotFeedback
                }

                // -------------------------------------------------------------
                // Awaiting confirmation
                // -------------------------------------------------------------
                (LearningState::AwaitingConfirmation(p), Some(FeedbackSignal::Affirmative)) => {
                    inner.state = LearningState::AwaitingConfirmation(p.clone());
                    self.affirm(&p, &mut pending);
                    pending.execute(&p.suggested_action, p.target.as_deref());
                    pending.speak("Okay.");
                    tracing::info!(
                        phrase = %p.phrase,
                        action = %p.suggested_action,
                        "Suggestion confirmed"
                    );
                    inner.transition(LearningState::Idle);
                    FeedbackOutcome::Consumed
                }
                (LearningState::AwaitingConfirmation(p), Some(FeedbackSignal::Negative(intended))) => {
                    inner.state = LearningState::AwaitingConfirmation(p.clone());
                    self.penalize(
                        p.feedback_phrase(),
                        &p.suggested_action,
                        self.config.explicit_reject,
                        &mut pending,
                    );
                    let context = CorrectionContext {
                        phrase: p.phrase.clone(),
                        action: p.suggested_action.clone(),
                        confidence: clamp_confidence(p.confidence + self.config.explicit_reject),
                        tier: p.tier,
                        timestamp: Timestamp::now(),
                    };
                    self.reject(&mut inner, context, intended, &mut pending);
                    FeedbackOutcome::Consumed
                }
                (LearningState::AwaitingConfirmation(p), Some(FeedbackSignal::Undo)) => {
                    inner.state = LearningState::AwaitingConfirmation(p);
                    pending.speak("Cancelled.");
                    inner.transition(LearningState::Idle);
                    FeedbackOutcome::Consumed
                }
                (LearningState::AwaitingConfirmation(p), None) => {
                    tracing::debug!(phrase = %p.phrase, "Confirmation abandoned by new speech");
                    inner.state = LearningState::AwaitingConfirmation(p);
                    inner.transition(LearningState::Idle);
                    FeedbackOutcome::NotFeedback
                }

                // -------------------------------------------------------------
                // Awaiting correction
                // -------------------------------------------------------------
                (LearningState::AwaitingCorrection(context), signal) => {
                    inner.state = LearningState::AwaitingCorrection(context.clone());
                    match signal {
                        Some(FeedbackSignal::Undo) | Some(FeedbackSignal::Negative(None)) => {
                            pending.speak("Okay, never mind.");
                        }
                        Some(FeedbackSignal::Negative(Some(intended))) => {
                            self.apply_correction(&context, &intended, &mut pending);
                        }
                        Some(FeedbackSignal::Affirmative) | None => {
                            self.apply_correction(&context, text, &mut pending);
                        }
                    }
                    inner.transition(LearningState::Idle);
                    FeedbackOutcome::Consumed
                }
            }
        };
        self.finish(pending);
        outcome
    }

    fn cleanup_unused(&self, now: Timestamp) -> usize {
        let mut removed = 0;
        let mut decayed = 0;

        for entry in self.dictionary.entries() {
            if entry.source != CommandSource::Learned {
                continue;
            }
            if entry.last_activity().days_until(now) <= self.config.stale_after_days {
                continue;
            }
            decayed += 1;
            let Some(confidence) = self
                .dictionary
                .adjust_entry_confidence(entry.id, -self.config.stale_decay)
            else {
                continue;
            };
            if confidence < self.config.remove_learned_below
                && self.dictionary.remove_entry(entry.id, false)
            {
                removed += 1;
                tracing::info!(action = %entry.action, confidence, "Removed stale learned command");
            }
        }

        if removed > 0 {
            self.dictionary.build_indexes();
        }
        if decayed > 0 {
            self.dictionary.autosave();
        }
        tracing::info!(decayed, removed, "Dictionary cleanup finished");
        removed
    }

    fn reset(&self) {
        let mut inner = self.lock();
        inner.transition(LearningState::Idle);
        tracing::debug!("Learning loop reset");
    }
}

/// The feedback state machine.
///
/// Cheap to clone; clones share state. Timers run on the ambient tokio
/// runtime, so the loop must be driven from within one.
#[derive(Clone)]
pub struct LearningLoop {
    shared: Arc<Shared>,
}

impl LearningLoop {
    pub fn new(
        dictionary: Arc<CommandDictionary>,
        effects: Arc<dyn FeedbackEffects>,
        config: LearningConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                dictionary,
                effects,
                grammar: FeedbackGrammar::new(),
                config,
                inner: Mutex::new(Inner {
                    state: LearningState::Idle,
                    generation: 0,
                    positive_timer: None,
                    confirmation_timer: None,
                    correction_timer: None,
                }),
            }),
        }
    }

    pub fn dictionary(&self) -> &Arc<CommandDictionary> {
        &self.shared.dictionary
    }

    pub fn config(&self) -> &LearningConfig {
        &self.shared.config
    }

    /// Start watching an executed action. If nothing contradicts it within
    /// the implicit-positive window, it counts as accepted.
    pub fn observe_action(&self, phrase: &str, action: &str, confidence: f32, tier: ResolutionTier) {
        self.shared.observe(ObservedAction {
            phrase: normalize_utterance(phrase),
            matched_phrase: None,
            action: action.to_string(),
            target: None,
            confidence: clamp_confidence(confidence),
            tier,
            timestamp: Timestamp::now(),
        });
    }

    /// [`observe_action`](Self::observe_action) for a resolver result,
    /// keeping its matched phrase and target.
    pub fn observe(&self, result: &ResolutionResult) {
        self.shared.observe(ObservedAction {
            phrase: result.phrase.clone(),
            matched_phrase: result.matched_phrase.clone(),
            action: result.action.clone(),
            target: result.target.clone(),
            confidence: result.confidence,
            tier: result.tier,
            timestamp: Timestamp::now(),
        });
    }

    /// Ask the user to confirm `suggested_action` for `phrase`.
    pub fn ask_for_confirmation(
        &self,
        phrase: &str,
        suggested_action: &str,
        confidence: f32,
        description: &str,
    ) {
        let description = if description.trim().is_empty() {
            describe(suggested_action)
        } else {
            description.to_string()
        };
        self.shared.ask(PendingConfirmation {
            phrase: normalize_utterance(phrase),
            matched_phrase: None,
            suggested_action: suggested_action.to_string(),
            target: None,
            confidence: clamp_confidence(confidence),
            description,
            tier: None,
            timestamp: Timestamp::now(),
        });
    }

    /// [`ask_for_confirmation`](Self::ask_for_confirmation) for a resolver
    /// result.
    pub fn confirm(&self, result: &ResolutionResult) {
        let mut description = describe(&result.action);
        if let Some(target) = &result.target {
            description = format!("{} {}", description, target);
        }
        self.shared.ask(PendingConfirmation {
            phrase: result.phrase.clone(),
            matched_phrase: result.matched_phrase.clone(),
            suggested_action: result.action.clone(),
            target: result.target.clone(),
            confidence: result.confidence,
            description,
            tier: Some(result.tier),
            timestamp: Timestamp::now(),
        });
    }

    /// Offer an utterance to the loop before normal resolution.
    pub fn handle_utterance(&self, text: &str) -> FeedbackOutcome {
        self.shared.handle_utterance(text)
    }

    /// Decay learned entries unused for longer than the staleness window and
    /// forget those that fall below the removal floor. Returns the number
    /// removed.
    pub fn cleanup_unused(&self) -> usize {
        self.shared.cleanup_unused(Timestamp::now())
    }

    /// [`cleanup_unused`](Self::cleanup_unused) as of `now`.
    pub fn cleanup_unused_at(&self, now: Timestamp) -> usize {
        self.shared.cleanup_unused(now)
    }

    /// Cancel every timer, drop all transient context and return to idle.
    pub fn reset(&self) {
        self.shared.reset();
    }

    /// Persist the dictionary now.
    pub fn flush(&self) -> Result<(), LearningError> {
        self.shared.dictionary.save()?;
        Ok(())
    }

    pub fn phase(&self) -> LearningPhase {
        self.shared.lock().state.phase()
    }

    /// Snapshot of the current state and its context.
    pub fn state(&self) -> LearningState {
        self.shared.lock().state.clone()
    }

    /// Number of timers currently held.
    pub fn live_timers(&self) -> usize {
        let inner = self.shared.lock();
        [
            &inner.positive_timer,
            &inner.confirmation_timer,
            &inner.correction_timer,
        ]
        .iter()
        .filter(|t| t.as_ref().is_some_and(|h| !h.is_finished()))
        .count()
    }
}
