//! Process lifecycle.
//!
//! # Data Flow
//! ```text
//! SIGINT / SIGTERM
//!     → signals.rs (wait for OS signal)
//!     → shutdown.rs (broadcast stop)
//!     → server graceful shutdown, cache sweeper and reload loop exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
