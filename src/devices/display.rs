// MIT License - Copyright (c) 2026 Peter Wright
// Touchpad display text history

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One line of text the panel pushed to the touchpads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayMessage {
    pub partition_number: u8,
    pub area_number: u8,
    pub message_type: &'static str,
    pub display_text: String,
    pub received_at: DateTime<Utc>,
}

/// Most recent display messages, oldest first, capped at `capacity`.
#[derive(Debug, Clone)]
pub struct DisplayHistory {
    messages: VecDeque<DisplayMessage>,
    capacity: usize,
}

impl DisplayHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, message: DisplayMessage) {
        if self.capacity == 0 {
            return;
        }
        while self.messages.len() >= self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    pub fn latest(&self) -> Option<&DisplayMessage> {
        self.messages.back()
    }

    pub fn to_vec(&self) -> Vec<DisplayMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
