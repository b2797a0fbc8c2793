//! Shared utilities for the swpatcher CLI

pub mod progress;

pub use progress::*;
