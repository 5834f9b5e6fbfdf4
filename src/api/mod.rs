//! HTTP API Handlers and Routes
//!
//! This module provides the REST API layer, built on the Axum web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! ## Research
//! - `POST /research` - one search, one synthesis
//! - `POST /deep-research` - initial synthesis plus a follow-up layer
//! - `POST /multi-agent-research` - three concurrent subagents and an integration step
//!
//! ## Streams
//! - `POST /chat/stream` - tutoring chat as server-sent frames
//! - `POST /rag/query/stream` - answer grounded in an uploaded index
//!
//! ## Documents
//! - `POST /rag/upload` - multipart text upload into a named index
//! - `GET /rag/indexes` - list indexes
//!
//! ## Service
//! - `GET /health` - liveness probe
//! - `GET /openapi.json` - generated OpenAPI document
//!
//! # Stream frames
//!
//! Every streamed frame is a `data: <json>` line followed by a blank line.
//! See [`crate::streaming`].

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
