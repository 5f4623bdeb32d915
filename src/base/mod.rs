//! Core components, types, and utilities for the checkin-bot.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - The classifier prompt and card templates.
//! - Common types and result handling.

pub mod cards;
pub mod config;
pub mod prompts;
pub mod types;
