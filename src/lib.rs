//! aproxy: an HTTP forwarding proxy with response caching and body transforms.

// Core subsystems
pub mod config;
pub mod http;
pub mod mapping;
pub mod pipe;

// Response handling
pub mod cache;
pub mod transform;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use mapping::RequestMapping;
pub use pipe::HttpPipe;
