//! Working days and the daily check-in cycle.
//!
//! - [`calendar`]: which days are working days.
//! - [`reminder`]: the prompt, reminder and reset triggers.
//! - [`runner`]: fires the triggers on their cron schedules.

pub mod calendar;
pub mod reminder;
pub mod runner;
