//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields (mapping, uri, cache_key, status)
//!     → tower-http TraceLayer spans per inbound request
//!     → x-request-id set on entry and echoed on the response
//!
//! Consumers:
//!     → logging.rs (fmt subscriber to stdout, EnvFilter)
//! ```

pub mod logging;

pub use logging::init_logging;
