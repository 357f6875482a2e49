//! Configuration parsing for padmap
//!
//! This crate handles parsing the KDL configuration file that describes the
//! control panel: which expander pins are wired to buttons, which key each
//! button emits, and which timed combo gestures synthesize extra keys.

mod error;
mod model;
mod parser;

pub use error::ConfigError;
pub use model::*;
pub use parser::{parse_config, parse_config_str};
