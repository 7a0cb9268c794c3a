//! AWS-oriented adapters and handlers for completing warm pool lifecycle
//! actions.
//!
//! This crate owns runtime integration details (the Lambda handler, its
//! configuration, and the autoscaling control-plane seam). Event schema and
//! request construction live in `warm_pool_lifecycle_core`.

pub mod adapters;
pub mod config;
pub mod handlers;
