//! Chat relay with a bounded recent-history buffer

use std::collections::VecDeque;

use crate::ws::protocol::ChatLine;

/// Lines kept for late joiners
pub const CHAT_HISTORY: usize = 30;

/// Longest relayed message, in characters
pub const MAX_MESSAGE_CHARS: usize = 200;

#[derive(Debug)]
pub struct ChatLog {
    lines: VecDeque<ChatLine>,
    capacity: usize,
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::new(CHAT_HISTORY)
    }
}

impl ChatLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a line under the sender's name. Blank messages are ignored.
    pub fn push(&mut self, username: &str, message: &str) -> Option<ChatLine> {
        let message = message.trim();
        if message.is_empty() {
            return None;
        }
        let line = ChatLine {
            username: username.to_string(),
            message: message.chars().take(MAX_MESSAGE_CHARS).collect(),
        };

        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.clone());
        Some(line)
    }

    /// Oldest first
    pub fn history(&self) -> Vec<ChatLine> {
        self.lines.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_recent_lines() {
        let mut log = ChatLog::default();
        for i in 0..40 {
            log.push("bob", &format!("line {}", i));
        }

        let history = log.history();
        assert_eq!(history.len(), CHAT_HISTORY);
        assert_eq!(history[0].message, "line 10");
        assert_eq!(history[CHAT_HISTORY - 1].message, "line 39");
    }

    #[test]
    fn ignores_blank_and_caps_length() {
        let mut log = ChatLog::default();
        assert!(log.push("bob", "   ").is_none());

        let long = "x".repeat(500);
        let line = log.push("bob", &long).unwrap();
        assert_eq!(line.message.chars().count(), MAX_MESSAGE_CHARS);
        assert_eq!(line.username, "bob");
    }
}
