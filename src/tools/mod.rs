//! Tool surface: the names a Stage-3 program may call through
//! [`crate::kernel::registry::ToolRegistry`], and the response-format
//! helpers a real tool implementation would use to tolerate loosely
//! structured model text (spec 4.3, 4.10).
//!
//! Actual tool bodies (browser automation, CV matching, calling back into
//! the vision-language agent) are out of scope (spec 1); this module
//! re-exports the registry's name constants for callers that only need to
//! know the contract, and hosts the parsing helpers that survive
//! independently of those bodies.

pub mod response_format;

pub use crate::kernel::registry::{build_default_registry, ACTION_TOOL_NAMES, VISION_TOOL_NAMES};
