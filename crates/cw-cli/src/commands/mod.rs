//! CLI command implementations.

pub mod catalog;

pub use catalog::{cmd_get, cmd_type, cmd_walk, connect, WalkArgs};
