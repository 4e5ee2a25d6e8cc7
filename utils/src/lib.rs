//! Shared utilities for the agent client workspace.

pub mod time;
pub mod wait;

pub use time::{format_duration, format_std_duration};
pub use wait::{poll_until, PollError, PollSettings, WaitTimedOut};
