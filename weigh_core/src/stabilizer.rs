//! Majority-vote stabilization of noisy scale transmissions.
//!
//! Per channel, the last few whitespace-delimited tokens are kept. Each frame
//! appends its tokens, the most frequent token in the window wins, and its first
//! signed decimal number becomes the candidate weight. A `StableWeight` is emitted
//! only when the candidate differs from what the channel last emitted.
//!
//! Two legacy behaviours are kept on purpose:
//! - ties go to the token whose first occurrence in the window is oldest;
//! - channels flagged `reverse_digits` have the extracted numeric text reversed
//!   character by character before parsing (so "120" reads as 21, and a reversed
//!   negative like "-5" becomes "5-" and is dropped).
//!
//! Parsing is locale-independent: `.` is the only decimal separator.

use rust_decimal::Decimal;
use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;

use crate::types::{ChannelId, RawFrame, StableWeight};

/// Tokens kept per channel; at ~100 ms polling the window settles within ~400 ms.
pub const DEFAULT_HISTORY_CAPACITY: usize = 4;

/// Bounded, insertion-ordered window of the most recent tokens.
#[derive(Debug, Clone)]
pub struct TokenHistory {
    tokens: VecDeque<String>,
    capacity: usize,
}

impl Default for TokenHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl TokenHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            tokens: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append, evicting the oldest token once over capacity.
    pub fn push(&mut self, token: impl Into<String>) {
        self.tokens.push_back(token.into());
        while self.tokens.len() > self.capacity {
            self.tokens.pop_front();
        }
    }

    /// Most frequent token; on a tie, the one first seen earliest in the window.
    pub fn majority(&self) -> Option<&str> {
        // Distinct tokens in first-occurrence order with their counts.
        let mut counts: Vec<(&str, usize)> = Vec::with_capacity(self.tokens.len());
        for t in &self.tokens {
            match counts.iter_mut().find(|(seen, _)| *seen == t.as_str()) {
                Some((_, n)) => *n += 1,
                None => counts.push((t.as_str(), 1)),
            }
        }
        let mut best: Option<(&str, usize)> = None;
        for (token, n) in counts {
            if best.is_none_or(|(_, m)| n > m) {
                best = Some((token, n));
            }
        }
        best.map(|(t, _)| t)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
    }
}

/// First match of `[-+]?\d+(\.\d+)?` in `token` (ASCII digits only).
pub fn extract_number(token: &str) -> Option<&str> {
    let b = token.as_bytes();
    let mut i = 0;
    while i < b.len() {
        let signed = matches!(b[i], b'-' | b'+') && b.get(i + 1).is_some_and(u8::is_ascii_digit);
        if signed || b[i].is_ascii_digit() {
            let start = i;
            let mut end = if signed { i + 1 } else { i };
            while end < b.len() && b[end].is_ascii_digit() {
                end += 1;
            }
            if end + 1 < b.len() && b[end] == b'.' && b[end + 1].is_ascii_digit() {
                end += 1;
                while end < b.len() && b[end].is_ascii_digit() {
                    end += 1;
                }
            }
            return Some(&token[start..end]);
        }
        i += 1;
    }
    None
}

/// Apply the site orientation to extracted numeric text.
pub fn orient(numeric: &str, reverse_digits: bool) -> Cow<'_, str> {
    if reverse_digits {
        Cow::Owned(numeric.chars().rev().collect())
    } else {
        Cow::Borrowed(numeric)
    }
}

/// Invariant-format decimal parse; `None` for anything that is not a plain number.
pub fn parse_weight(numeric: &str) -> Option<Decimal> {
    Decimal::from_str(numeric).ok()
}

/// Token → weight: extract, orient, parse.
pub fn token_to_weight(token: &str, reverse_digits: bool) -> Option<Decimal> {
    let numeric = extract_number(token)?;
    parse_weight(&orient(numeric, reverse_digits))
}

#[derive(Debug, Clone)]
struct ChannelState {
    history: TokenHistory,
    reverse_digits: bool,
    last_emitted: Option<Decimal>,
}

/// Per-channel denoiser. Owned by the single consumer thread; no locking inside.
#[derive(Debug, Clone)]
pub struct StabilizationEngine {
    capacity: usize,
    channels: HashMap<ChannelId, ChannelState>,
}

impl Default for StabilizationEngine {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl StabilizationEngine {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            capacity: history_capacity.max(1),
            channels: HashMap::new(),
        }
    }

    /// Declare a channel and its digit orientation. Frames from undeclared
    /// channels are processed with normal orientation.
    pub fn register(&mut self, channel: ChannelId, reverse_digits: bool) {
        let capacity = self.capacity;
        self.channels
            .entry(channel)
            .and_modify(|s| s.reverse_digits = reverse_digits)
            .or_insert_with(|| ChannelState {
                history: TokenHistory::with_capacity(capacity),
                reverse_digits,
                last_emitted: None,
            });
    }

    /// Run one frame through the window; `Some` only when the channel's value changed.
    pub fn process(&mut self, frame: &RawFrame) -> Option<StableWeight> {
        let capacity = self.capacity;
        let state = self
            .channels
            .entry(frame.channel.clone())
            .or_insert_with(|| ChannelState {
                history: TokenHistory::with_capacity(capacity),
                reverse_digits: false,
                last_emitted: None,
            });

        for token in frame.text.split_whitespace() {
            state.history.push(token);
        }
        let majority = state.history.majority()?;
        let Some(value) = token_to_weight(majority, state.reverse_digits) else {
            tracing::trace!(channel = %frame.channel, token = majority, "no usable number in frame");
            return None;
        };
        if state.last_emitted == Some(value) {
            tracing::trace!(channel = %frame.channel, %value, "weight unchanged");
            return None;
        }
        state.last_emitted = Some(value);
        tracing::debug!(channel = %frame.channel, %value, "stable weight");
        Some(StableWeight {
            channel: frame.channel.clone(),
            value,
            at: frame.received_at,
        })
    }

    /// Last value emitted for a channel.
    pub fn last_emitted(&self, channel: &ChannelId) -> Option<Decimal> {
        self.channels.get(channel).and_then(|s| s.last_emitted)
    }

    pub fn history(&self, channel: &ChannelId) -> Option<&TokenHistory> {
        self.channels.get(channel).map(|s| &s.history)
    }
}
