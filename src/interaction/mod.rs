//! Event handling and user interactions for checkin-bot.
//!
//! This module provides functionality for handling inbound messages:
//! - Orchestrating classification, confirmation and replies ([`bot`])
//! - Recording and clearing locations ([`actions`])
//! - Answering read-only queries ([`queries`])
//! - Operational routes ([`admin`])

pub mod actions;
pub mod admin;
pub mod bot;
pub mod dedup;
pub mod message;
pub mod queries;
pub mod submission;
