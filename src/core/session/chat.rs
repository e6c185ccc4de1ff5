use crate::game::ChannelMarker;
use regex::Regex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::LazyLock;

pub const MAX_CHAT_BUFFER: usize = 50;

/// Player chat is rendered as `<name> message`.
static CHAT_DISPLAY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<[^>]+>\s").expect("chat prefix pattern"));

/// One inbound message. `sender` is empty for system-originated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatEntry {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub sender: String,
    pub text: String,
}

impl ChatEntry {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            sender: sender.into(),
            text: text.into(),
        }
    }
}

/// Bounded FIFO of recent messages, oldest first.
#[derive(Debug, Clone)]
pub struct ChatBuffer {
    entries: VecDeque<ChatEntry>,
    capacity: usize,
}

impl Default for ChatBuffer {
    fn default() -> Self {
        Self::with_capacity(MAX_CHAT_BUFFER)
    }
}

impl ChatBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: ChatEntry) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owned copy for status output; later pushes do not affect it.
    pub fn snapshot(&self) -> Vec<ChatEntry> {
        self.entries.iter().cloned().collect()
    }
}

/// Decides whether an inbound message is server feedback rather than player chat.
///
/// Precedence: the literal sender `server`, then any other non-empty sender,
/// then the channel marker, and only then the shape of the text.
pub fn is_system_feedback(sender: &str, marker: Option<&ChannelMarker>, text: &str) -> bool {
    let sender = sender.trim();
    if sender.eq_ignore_ascii_case("server") {
        return true;
    }
    if !sender.is_empty() {
        return false;
    }

    match marker {
        Some(ChannelMarker::Named(name)) => match name.as_str() {
            "chat" => return false,
            "system" | "game_info" => return true,
            _ => {}
        },
        Some(ChannelMarker::Legacy(position)) => match position {
            0 => return false,
            1 | 2 => return true,
            _ => {}
        },
        None => {}
    }

    !CHAT_DISPLAY_PREFIX.is_match(text)
}
