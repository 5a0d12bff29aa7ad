//! Console rendering of learning-loop effects.

use parley_learning::FeedbackEffects;

/// Prints prompts and executed actions to stdout.
///
/// Stands in for text-to-speech and OS automation, which live outside
/// this binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleEffects;

impl FeedbackEffects for ConsoleEffects {
    fn speak(&self, text: &str) {
        println!("[say] {}", text);
    }

    fn execute(&self, action: &str, target: Option<&str>) {
        match target {
            Some(target) => println!("[run] {} {}", action, target),
            None => println!("[run] {}", action),
        }
        tracing::info!(action, param = ?target, "Action executed");
    }
}
