//! Pattern matching: learned trigger lookup plus the built-in starter
//! responder.

pub mod matcher;
pub mod starter;

pub use matcher::{first_match, normalize};
pub use starter::StarterEngine;
