//! Document-grounded question answering
//!
//! # Module Structure
//!
//! - [`extract`] - text from PDF and plain-text uploads
//! - [`chunker`] - character-bounded chunking with overlap (text-splitter)
//! - [`bm25`] - lexical ranking of chunks
//! - [`index`] - the [`index::DocumentIndex`] contract and an in-process store
//! - [`service`] - upload and the streamed grounded answer
//!
//! # Pipeline
//!
//! 1. **Upload** - a PDF or text document is extracted, chunked and appended to a named index
//! 2. **Retrieval** - the top-k chunks for the query are ranked
//! 3. **Generation** - the answer streams as `content` frames, followed by one
//!    `sources` frame and `done`

pub mod bm25;
pub mod chunker;
pub mod extract;
pub mod index;
pub mod service;

pub use index::{DocumentIndex, IndexedChunk, LocalDocumentIndex};
pub use service::RagService;
