//! Command-line argument definitions.

pub mod task;
