//! Gemini and nimigem protocol implementation.
//!
//! Every connection carries exactly one request and one response:
//!
//! ```text
//! client: <url>[ <percent-encoded payload>]\r\n
//! server: <status> <meta>\r\n<body...>
//! ```
//!
//! The payload is only allowed for `nimigem://` requests, which may also be
//! longer (15360 bytes instead of 1024).
//!
//! # Architecture
//!
//! - **`status`**: status codes and their families
//! - **`request`**: schemes and the decoded request
//! - **`parser`**: the request decoder
//! - **`response`**: write-once status line plus raw body writes
//! - **`handler`**: the `Handler` trait and the prefix `Router`
//! - **`connection`**: runs one connection from decode to close
//!
//! # Connection flow
//!
//! ```text
//!        ┌──────────────────┐
//!        │ Scheme snippet   │ ← first 10 bytes pick the size limit
//!        └──────┬───────────┘
//!               ▼
//!        ┌──────────────────┐
//!        │ Rest of line     │ ← bounded read up to the terminator
//!        └──────┬───────────┘
//!               ▼
//!        ┌──────────────────┐
//!        │ Split payload    │ ← nimigem only
//!        └──────┬───────────┘
//!               ▼
//!        ┌──────────────────┐
//!        │ Parse URL        │
//!        └──────┬───────────┘
//!               ▼
//!        ┌──────────────────┐
//!        │ Handler          │ ← writes through Response
//!        └──────┬───────────┘
//!               ▼
//!             Closed
//! ```
//!
//! Any decoding failure skips the handler: a status line is sent and the
//! connection is closed.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use nightjar::gemini::connection::Connection;
//! use nightjar::gemini::handler::Router;
//!
//! let router = Arc::new(Router::new().route("/info", Arc::new(InfoPage::new("demo"))));
//! Connection::new(stream, peer, local, router).run().await;
//! ```

pub mod connection;
pub mod handler;
pub mod parser;
pub mod request;
pub mod response;
pub mod status;
