// src/watch/mod.rs

//! Pattern watches over background command output.
//!
//! See [`pattern`] for the event-driven wait and the line counting helpers.

pub mod pattern;

pub use pattern::{
    MatchResult, count_lines, count_matching, wait_until_match, watch_for, watch_reader,
};
