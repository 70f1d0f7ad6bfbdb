//! Utility types for the cycle analysis engine.
//!
//! This module provides:
//! - A sparse, optionally bounded index set (the worker-private visited set)
//! - A bounded work queue with a high-water mark

pub mod intset;
pub mod queue;
