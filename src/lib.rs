// Library root: exposes the server internals to the binary and to the
// integration tests. The binary entry point is src/main.rs.

pub mod assistant;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod knowledge;
pub mod learning;
pub mod llm;
pub mod logger;
pub mod runtime;
pub mod store;

#[cfg(feature = "channel-console")]
pub mod console;

#[cfg(feature = "channel-http")]
pub mod http;
