//! Service integrations for external APIs and clients.
//!
//! This module contains implementations for various services used by the checkin-bot:
//! - Chat services (e.g., Microsoft Teams)
//! - Database services (e.g., SurrealDB)
//! - LLM services (e.g., OpenAI)
//! - Holiday and directory services
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod auth;
pub mod chat;
pub mod conversation;
pub mod db;
pub mod directory;
pub mod holiday;
pub mod llm;
