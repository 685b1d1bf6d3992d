//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the runtime:
//! - Math types, transforms and bounding volumes
//! - Hashed names used as registry keys
//! - Logging utilities

pub mod math;
pub mod hash;
pub mod logging;

pub use hash::HashedName;
