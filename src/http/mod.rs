//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id and trace layers)
//!     → request.rs (read body within limit)
//!     → mapping table resolves a RequestMapping
//!     → pipe (cache, upstream, transform, store)
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, ServerError};
