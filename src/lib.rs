//! A safe planner/executor core for a multi-stage, vision-language-model
//! driven CAPTCHA solver.
//!
//! Three stages run in sequence against a frame tree built from a
//! screenshot: objective identification fills in frame descriptions and
//! relations and infers the objective ([`kernel::pipeline::run_stage1`]);
//! structure abstraction applies a small annotation DSL to tag exactly one
//! interactable ([`kernel::pipeline::run_stage2`],
//! [`kernel::stage2::apply_stage2_plan`]); solution composition runs a
//! sandboxed statement interpreter against a closed tool-name and
//! method-name allowlist ([`kernel::pipeline::run_stage3`],
//! [`kernel::stage3`]) — a safe replacement for an `eval()`-based execution
//! primitive.
//!
//! The agent boundary ([`agent::Agent`]) and the tool bodies behind
//! [`tools::ACTION_TOOL_NAMES`]/[`tools::VISION_TOOL_NAMES`] are
//! intentionally abstract: this crate owns the parsing, validation, and
//! interpreter core, not any concrete browser or vision-model integration.

pub mod agent;
pub mod config;
pub mod errors;
pub mod frame;
pub mod kernel;
pub mod logging;
pub mod tools;
pub mod types;

pub use errors::{HalliganError, Result};
