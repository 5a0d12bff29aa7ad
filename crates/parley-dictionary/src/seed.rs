//! Bundled default commands.
//!
//! Inserted as `source = default` the first time an empty dictionary is
//! opened. Each phrase is expanded through the variation generator.

/// One shipped phrase-to-action mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedCommand {
    pub phrase: &'static str,
    pub action: &'static str,
    /// Short human description, used in confirmation prompts.
    pub description: &'static str,
}

/// Confidence assigned to shipped commands.
pub const DEFAULT_SEED_CONFIDENCE: f32 = 0.9;

const fn seed(phrase: &'static str, action: &'static str, description: &'static str) -> SeedCommand {
    SeedCommand {
        phrase,
        action,
        description,
    }
}

pub const DEFAULT_COMMANDS: &[SeedCommand] = &[
    // Text layout
    seed("new line", "NEW_LINE", "start a new line"),
    seed("new paragraph", "NEW_PARAGRAPH", "start a new paragraph"),
    seed("press enter", "NEW_LINE", "start a new line"),
    seed("tab key", "TAB", "insert a tab"),
    // Editing
    seed("undo", "UNDO", "undo the last change"),
    seed("redo", "REDO", "redo the last change"),
    seed("select all", "SELECT_ALL", "select everything"),
    seed("copy that", "COPY", "copy the selection"),
    seed("paste", "PASTE", "paste the clipboard"),
    seed("cut that", "CUT", "cut the selection"),
    seed("delete that", "DELETE_SELECTION", "delete the selection"),
    seed("delete word", "DELETE_WORD", "delete the previous word"),
    seed("delete line", "DELETE_LINE", "delete the current line"),
    // Files
    seed("save file", "SAVE_FILE", "save the current file"),
    seed("save", "SAVE_FILE", "save the current file"),
    // Tabs and windows
    seed("new tab", "NEW_TAB", "open a new tab"),
    seed("close tab", "CLOSE_TAB", "close the current tab"),
    seed("next tab", "NEXT_TAB", "switch to the next tab"),
    seed("previous tab", "PREVIOUS_TAB", "switch to the previous tab"),
    seed("close window", "CLOSE_WINDOW", "close the current window"),
    seed("minimize window", "MINIMIZE_WINDOW", "minimize the current window"),
    // Navigation
    seed("scroll up", "SCROLL_UP", "scroll up"),
    seed("scroll down", "SCROLL_DOWN", "scroll down"),
    seed("go to end", "GO_TO_END", "jump to the end"),
    seed("go to start", "GO_TO_START", "jump to the start"),
    // Media and system
    seed("mute", "MUTE", "mute the audio"),
    seed("power off", "POWER_OFF", "shut the computer down"),
    seed("stop listening", "STOP_LISTENING", "stop listening"),
];

/// Human description of a shipped action, if it has one.
pub fn describe_action(action: &str) -> Option<&'static str> {
    DEFAULT_COMMANDS
        .iter()
        .find(|c| c.action == action)
        .map(|c| c.description)
}
