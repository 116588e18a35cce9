//! Utilities for SchemaCompare
//!
//! This module provides utility functions used across the library.

pub mod logging;
pub mod naming;

// Re-export key utility functions
pub use logging::init_logging;
pub use naming::{generate_identifier_name, normalize_identifier, quote_identifier, trim_quotes};
