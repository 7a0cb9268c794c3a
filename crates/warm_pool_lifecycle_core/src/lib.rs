//! Shared warm pool lifecycle primitives.
//!
//! This crate owns the inbound event schema, validation, and construction of
//! the outbound `CompleteLifecycleAction` request, plus the EventBridge rule
//! and IAM policy documents the handler is deployed with. It intentionally
//! excludes AWS SDK and Lambda runtime concerns.

pub mod contract;
pub mod event_pattern;
