//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Streamed tutoring chat.
pub mod chat;
/// Liveness and API description.
pub mod health;
/// Document upload, grounded Q&A streams and index listing.
pub mod rag;
/// Basic, deep and multi-agent research.
pub mod research;
