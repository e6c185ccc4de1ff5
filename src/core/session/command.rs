use super::waiters::PatternSet;
use crate::core::error::SessionError;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

pub const COMMAND_TIMEOUT: Duration = Duration::from_millis(5_000);

const SUCCESS_SIGNATURES: &[&str] = &[
    r"set the block",
    r"changed the block at",
    r"filled \d+ blocks?",
    r"successfully filled",
    r"gave .* to ",
    r"^gave ",
    r"teleported",
    r"summoned",
    r"changed the time",
    r"set the time to",
    r"changed the weather",
    r"set the weather to",
    r"game mode has been updated",
    r"saved the game",
    r"(\d+ )?entities? (?:have been |was )?killed",
    r"\bok\b",
    r"\d+ blocks? cloned",
    r"successfully cloned",
    r"gamerule .* (?:set to|is )",
    r"game rule .* (?:set to|is )",
    r"gamerule .* (?:has been|was) updated",
    r"the value of gamerule .* is",
    r"changing to ",
];

const PERMISSION_SIGNATURES: &[&str] = &[
    r"you do not have permission",
    r"i'?m sorry, (?:but )?you do not have permission",
    r"requires operator",
    r"unknown or incomplete command",
    r"cannot execute",
    r"not permitted",
];

const UNKNOWN_SIGNATURES: &[&str] = &[r"unknown command", r"unknown or incomplete command"];

const FAILED_SIGNATURES: &[&str] = &[
    r"failed",
    r"no blocks? (?:were )?(?:filled|changed|cloned)",
    r"cannot place blocks? outside of the world",
    r"that position is not loaded",
    r"could not",
];

struct FeedbackPatterns {
    success: PatternSet,
    permission: PatternSet,
    unknown: PatternSet,
    /// Matching pool: permission, unknown, failed, success.
    pool: Arc<PatternSet>,
}

static FEEDBACK: LazyLock<FeedbackPatterns> = LazyLock::new(|| {
    let compile =
        |sources: &[&str]| PatternSet::case_insensitive(sources).expect("feedback signature");
    let success = compile(SUCCESS_SIGNATURES);
    let permission = compile(PERMISSION_SIGNATURES);
    let unknown = compile(UNKNOWN_SIGNATURES);
    let failed = compile(FAILED_SIGNATURES);
    let pool = Arc::new(PatternSet::chain([
        &permission,
        &unknown,
        &failed,
        &success,
    ]));
    FeedbackPatterns {
        success,
        permission,
        unknown,
        pool,
    }
});

/// Every signature any feedback category recognises, as one waiter pattern set.
pub fn feedback_pool() -> Arc<PatternSet> {
    FEEDBACK.pool.clone()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandCategory {
    Success,
    PermissionDenied,
    UnknownCommand,
    Failed,
    Timeout,
}

impl CommandCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandCategory::Success => "success",
            CommandCategory::PermissionDenied => "permission_denied",
            CommandCategory::UnknownCommand => "unknown_command",
            CommandCategory::Failed => "failed",
            CommandCategory::Timeout => "timeout",
        }
    }
}

impl fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one `execute_command` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub command: String,
    pub matched_response: Option<String>,
    pub timed_out: bool,
    pub category: CommandCategory,
    pub executed: bool,
}

impl CommandResult {
    pub fn timed_out(command: String) -> Self {
        Self {
            command,
            matched_response: None,
            timed_out: true,
            category: CommandCategory::Timeout,
            executed: false,
        }
    }

    pub fn from_feedback(command: String, feedback: String) -> Self {
        let category = classify_feedback(&feedback);
        Self {
            command,
            matched_response: Some(feedback),
            timed_out: false,
            category,
            executed: category == CommandCategory::Success,
        }
    }
}

/// Assigns a category to matched feedback text.
///
/// Unknown-command and permission signatures dominate a success signature in
/// the same text; text matching nothing is `Failed`.
pub fn classify_feedback(text: &str) -> CommandCategory {
    let patterns = &*FEEDBACK;
    if patterns.unknown.is_match(text) {
        CommandCategory::UnknownCommand
    } else if patterns.permission.is_match(text) {
        CommandCategory::PermissionDenied
    } else if patterns.success.is_match(text) {
        CommandCategory::Success
    } else {
        CommandCategory::Failed
    }
}

/// Trims and prefixes a leading `/` when absent.
pub fn normalize_command(command: &str) -> Result<String, SessionError> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Err(SessionError::EmptyCommand);
    }
    if trimmed.starts_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("/{trimmed}"))
    }
}
