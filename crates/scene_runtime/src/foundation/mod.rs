//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the runtime:
//! - 2D math types and bounds
//! - Typed shared resources (blackboard)
//! - Frame timing for host loops
//! - Logging utilities

pub mod blackboard;
pub mod logging;
pub mod math;
pub mod time;
