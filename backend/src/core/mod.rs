//! Core primitives shared by every settlement layer
//!
//! - **math**: arbitrary-precision amount helpers
//! - **constants**: compiled-in protocol constants and override keys
//! - **version**: protocol version ordering for engine selection
//! - **logging**: opt-in tracing subscriber setup

pub mod constants;
pub mod logging;
pub mod math;
pub mod version;
