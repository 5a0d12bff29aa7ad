//! End-to-end feedback scenarios against a real on-disk dictionary.

use std::sync::Arc;
use std::time::Duration;

use parley_core::config::{DictionaryConfig, LearningConfig, ResolverConfig};
use parley_core::types::{CommandSource, ResolutionTier, Timestamp};
use parley_dictionary::{CommandDictionary, DEFAULT_COMMANDS};
use parley_intent::IntentResolver;
use parley_learning::{
    FeedbackOutcome, LearningLoop, LearningPhase, LearningState, RecordingEffects,
};
use tempfile::TempDir;

struct Setup {
    dir: TempDir,
    dictionary: Arc<CommandDictionary>,
    effects: Arc<RecordingEffects>,
    learning: LearningLoop,
}

fn setup() -> Setup {
    let dir = tempfile::tempdir().unwrap();
    let dictionary = Arc::new(CommandDictionary::new(
        dir.path().join("commands.json"),
        DictionaryConfig::default(),
    ));
    let effects = Arc::new(RecordingEffects::new());
    let learning = LearningLoop::new(dictionary.clone(), effects.clone(), LearningConfig::default());
    Setup {
        dir,
        dictionary,
        effects,
        learning,
    }
}

/// Like [`setup`], with the shipped commands seeded.
fn seeded_setup() -> Setup {
    let s = setup();
    s.dictionary.migrate_defaults(DEFAULT_COMMANDS);
    s.dictionary.build_indexes();
    s
}

/// A learned SAVE_FILE entry at 0.80 with five prior uses.
fn seed_save_file(dictionary: &CommandDictionary) {
    dictionary.learn("save file", "SAVE_FILE", CommandSource::Learned, 0.80);
    for _ in 0..5 {
        dictionary.record_use("save file");
    }
}

async fn elapse(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    tokio::task::yield_now().await;
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

#[tokio::test(start_paused = true)]
async fn accepted_action_gains_confidence_and_use() {
    let s = setup();
    seed_save_file(&s.dictionary);
    let config = LearningConfig::default();

    s.learning
        .observe_action("save file", "SAVE_FILE", 0.95, ResolutionTier::Exact);
    assert_eq!(s.learning.phase(), LearningPhase::Observing);

    elapse(config.positive_window_ms + 1).await;

    assert_eq!(s.learning.phase(), LearningPhase::Idle);
    let entry = s.dictionary.entry_for("save file").unwrap();
    assert!(approx(entry.confidence, 0.80 + config.implicit_positive));
    assert_eq!(entry.use_count, 6);
    assert!(s.effects.effects().is_empty());
}

#[tokio::test(start_paused = true)]
async fn undo_lowers_confidence_without_executing() {
    let s = setup();
    seed_save_file(&s.dictionary);
    let config = LearningConfig::default();

    s.learning
        .observe_action("save file", "SAVE_FILE", 0.95, ResolutionTier::Exact);
    let outcome = s.learning.handle_utterance("undo");

    assert_eq!(outcome, FeedbackOutcome::Consumed);
    assert_eq!(s.learning.phase(), LearningPhase::Idle);
    let entry = s.dictionary.entry_for("save file").unwrap();
    assert!(approx(entry.confidence, 0.80 + config.immediate_undo));
    assert!(s.effects.executed().is_empty());

    // The positive window was cancelled with the transition.
    elapse(config.positive_window_ms * 2).await;
    let entry = s.dictionary.entry_for("save file").unwrap();
    assert!(approx(entry.confidence, 0.80 + config.immediate_undo));
    assert_eq!(entry.use_count, 5);
}

#[tokio::test(start_paused = true)]
async fn confirmed_suggestion_executes_and_persists() {
    let s = setup();

    s.learning
        .ask_for_confirmation("save file", "SAVE_FILE", 0.65, "save the current file");
    assert_eq!(
        s.effects.spoken(),
        vec!["Did you mean save the current file?".to_string()]
    );

    let outcome = s.learning.handle_utterance("yes");
    assert_eq!(outcome, FeedbackOutcome::Consumed);
    assert_eq!(s.learning.phase(), LearningPhase::Idle);
    assert_eq!(s.effects.executed(), vec![("SAVE_FILE".to_string(), None)]);

    let entry = s.dictionary.entry_for("save file").unwrap();
    assert_eq!(entry.source, CommandSource::Confirmed);
    assert_eq!(entry.action, "SAVE_FILE");

    // Autosave put it on disk.
    let reloaded = CommandDictionary::new(
        s.dir.path().join("commands.json"),
        DictionaryConfig::default(),
    );
    assert_eq!(reloaded.load(), 1);
    reloaded.build_indexes();
    assert_eq!(
        reloaded.entry_for("save file").unwrap().source,
        CommandSource::Confirmed
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_suggestion_asks_what_was_meant() {
    let s = setup();

    s.learning
        .ask_for_confirmation("save file", "SAVE_FILE", 0.65, "save the current file");
    let outcome = s.learning.handle_utterance("no");

    assert_eq!(outcome, FeedbackOutcome::Consumed);
    assert_eq!(s.learning.phase(), LearningPhase::AwaitingCorrection);
    assert_eq!(
        s.effects.spoken().last().map(String::as_str),
        Some("What did you mean?")
    );
    match s.learning.state() {
        LearningState::AwaitingCorrection(context) => {
            assert_eq!(context.phrase, "save file");
            assert!(context.confidence < 0.65);
        }
        other => panic!("unexpected state {:?}", other),
    }
    assert!(s.effects.executed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn confirming_a_shipped_command_marks_it_confirmed() {
    let s = seeded_setup();
    let config = LearningConfig::default();
    let before = s.dictionary.entry_for("save file").unwrap();
    assert_eq!(before.source, CommandSource::Default);

    s.learning
        .ask_for_confirmation("save file", "SAVE_FILE", 0.65, "save the current file");
    assert!(s.learning.handle_utterance("yes").is_consumed());
    assert_eq!(s.effects.executed(), vec![("SAVE_FILE".to_string(), None)]);

    let after = s.dictionary.entry_for("save file").unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.source, CommandSource::Confirmed);
    assert!(approx(
        after.confidence,
        (before.confidence + config.explicit_confirm).min(1.0)
    ));
    assert!(after.is_default());

    let reloaded = CommandDictionary::new(
        s.dir.path().join("commands.json"),
        DictionaryConfig::default(),
    );
    reloaded.load();
    assert_eq!(
        reloaded.entry_for("save file").unwrap().source,
        CommandSource::Confirmed
    );
}

#[tokio::test(start_paused = true)]
async fn rejecting_a_shipped_command_lowers_it() {
    let s = seeded_setup();
    let before = s.dictionary.entry_for("save file").unwrap().confidence;

    s.learning
        .ask_for_confirmation("save file", "SAVE_FILE", 0.65, "save the current file");
    assert!(s.learning.handle_utterance("no").is_consumed());

    assert_eq!(s.learning.phase(), LearningPhase::AwaitingCorrection);
    let after = s.dictionary.entry_for("save file").unwrap();
    assert!(after.confidence < before);
    assert_eq!(after.source, CommandSource::Default);
}

#[tokio::test(start_paused = true)]
async fn fuzzy_suggestion_rejected_then_confirmed() {
    let s = seeded_setup();
    let config = LearningConfig::default();
    s.dictionary.adjust_confidence("close window", -0.3);
    let resolver = IntentResolver::new(s.dictionary.clone(), ResolverConfig::default());

    let suggestion = resolver.resolve_with_dictionary("close windoe").unwrap();
    assert_eq!(suggestion.tier, ResolutionTier::Fuzzy);
    assert_eq!(suggestion.matched_phrase.as_deref(), Some("close window"));
    let before = s.dictionary.entry_for("close window").unwrap().confidence;

    s.learning.confirm(&suggestion);
    s.learning.handle_utterance("no");
    let lowered = s.dictionary.entry_for("close window").unwrap().confidence;
    assert!(approx(lowered, before + config.explicit_reject));
    assert!(s.effects.executed().is_empty());

    s.learning.reset();
    s.learning.confirm(&suggestion);
    s.learning.handle_utterance("correct");
    assert_eq!(s.effects.executed(), vec![("CLOSE_WINDOW".to_string(), None)]);
    let hit = s.dictionary.lookup("close windoe").unwrap();
    assert_eq!(hit.action, "CLOSE_WINDOW");
    assert_eq!(hit.source, CommandSource::Confirmed);
    assert!(approx(
        s.dictionary.entry_for("close window").unwrap().confidence,
        lowered + config.explicit_confirm
    ));
}

#[tokio::test(start_paused = true)]
async fn unanswered_confirmation_expires() {
    let s = setup();
    let config = LearningConfig::default();

    s.learning
        .ask_for_confirmation("save file", "SAVE_FILE", 0.65, "save the current file");
    elapse(config.confirmation_timeout_ms - 1).await;
    assert_eq!(s.learning.phase(), LearningPhase::AwaitingConfirmation);

    elapse(2).await;
    assert_eq!(s.learning.phase(), LearningPhase::Idle);
    assert!(s.dictionary.is_empty());

    // A late "yes" is ordinary speech now.
    assert_eq!(s.learning.handle_utterance("yes"), FeedbackOutcome::NotFeedback);
    assert!(s.effects.executed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn correction_teaches_the_misheard_phrase() {
    let s = setup();
    s.dictionary.migrate_defaults(DEFAULT_COMMANDS);
    s.dictionary.build_indexes();

    // A fuzzy CLOSE_TAB that the user meant as "close window".
    s.learning
        .observe_action("shut that pane", "CLOSE_TAB", 0.72, ResolutionTier::Fuzzy);
    assert!(s.learning.handle_utterance("wrong").is_consumed());
    assert_eq!(s.learning.phase(), LearningPhase::AwaitingCorrection);

    assert!(s.learning.handle_utterance("close window").is_consumed());
    assert_eq!(s.learning.phase(), LearningPhase::Idle);

    let hit = s.dictionary.lookup("shut that pane").unwrap();
    assert_eq!(hit.action, "CLOSE_WINDOW");
    assert_eq!(hit.source, CommandSource::Confirmed);
    assert_eq!(s.effects.executed(), vec![("CLOSE_WINDOW".to_string(), None)]);
}

#[tokio::test(start_paused = true)]
async fn reset_leaves_no_live_timers() {
    let s = setup();
    seed_save_file(&s.dictionary);

    s.learning
        .observe_action("save file", "SAVE_FILE", 0.95, ResolutionTier::Exact);
    s.learning
        .ask_for_confirmation("new tab", "NEW_TAB", 0.6, "open a new tab");
    s.learning.handle_utterance("no");
    assert_eq!(s.learning.phase(), LearningPhase::AwaitingCorrection);

    s.learning.reset();
    assert_eq!(s.learning.phase(), LearningPhase::Idle);
    assert_eq!(s.learning.live_timers(), 0);

    elapse(60_000).await;
    assert_eq!(s.learning.phase(), LearningPhase::Idle);
}

#[tokio::test]
async fn cleanup_keeps_defaults_and_drops_decayed_learned() {
    let s = setup();
    s.dictionary.migrate_defaults(DEFAULT_COMMANDS);
    s.dictionary.build_indexes();
    let defaults = s.dictionary.len();
    s.dictionary
        .adjust_confidence("mute", -1.0)
        .expect("mute is seeded");
    s.dictionary
        .learn("zap it", "DELETE_LINE", CommandSource::Learned, 0.35);

    let far_future = Timestamp(Timestamp::now().0 + 365 * 86_400);
    let removed = s.learning.cleanup_unused_at(far_future);

    assert_eq!(removed, 1);
    assert_eq!(s.dictionary.len(), defaults);
    assert!(s.dictionary.entry_for("mute").is_some());
    assert!(s.dictionary.entry_for("zap it").is_none());
    assert!(s.dictionary.is_consistent());
}
