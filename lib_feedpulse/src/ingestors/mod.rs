//! # Push Ingestors
//!
//! The physical side of the push channel.
//!
//! ## Contained Modules:
//! - **`sse_codec`**: incremental decoder for `text/event-stream` bodies.
//! - **`sse_stream`**: `SseConnector`, the `Connector` that opens one
//!   long-lived HTTP request per credential and pumps decoded frames into the
//!   connection handle until the handle is closed.

pub mod sse_codec;
pub mod sse_stream;

pub use sse_codec::SseDecoder;
pub use sse_stream::SseConnector;
