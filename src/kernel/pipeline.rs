//! Retry-with-feedback orchestration for the three stages (spec 4.7, I4).
//!
//! Each stage sends an initial prompt, parses and validates (and, for
//! Stage 3, executes) the response, and on a retryable failure resets the
//! agent's history before sending a feedback prompt describing the error.
//! History is always reset before a retry prompt (I4) so a failed attempt
//! never leaks into the next one.

use serde_json::Value;

use crate::agent::Agent;
use crate::errors::{HalliganError, Result};
use crate::frame::FrameTree;
use crate::kernel::parser::parse_json_from_response;
use crate::kernel::registry::ToolRegistry;
use crate::kernel::schemas::{self, Stage1Result, Stage2Plan, Stage3Program};
use crate::kernel::stage3::{self, Env};
use crate::types::Image;

const STAGE12_FEEDBACK: &str = "Your previous output was invalid.\nError: {error}\n\n\
Please output ONLY valid JSON that matches the required schema.\n\
Do not include markdown fences or any extra text.";

const STAGE3_FEEDBACK: &str = "Your previous output failed to parse/validate/execute.\nError: {error}\n\n\
Please output ONLY valid JSON that matches the required schema.\n\
Do not include markdown fences or any extra text.";

/// Maximum attempts for the Stage 1/2 schema-validation retry loop
/// (spec 4.7).
pub const STAGE12_MAX_ATTEMPTS: u32 = 3;

/// Maximum attempts for the Stage 3 parse/validate/execute retry loop
/// (spec 4.7).
pub const STAGE3_MAX_ATTEMPTS: u32 = 4;

async fn retry_loop<T>(
    agent: &mut dyn Agent,
    images: &[Image],
    initial_prompt: &str,
    max_attempts: u32,
    feedback_template: &str,
    retryable: impl Fn(&HalliganError) -> bool,
    mut attempt_once: impl FnMut(&Value) -> Result<T>,
) -> Result<T> {
    let mut prompt = initial_prompt.to_owned();

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            agent.reset();
        }
        let (text, _metadata) = agent.call(&prompt, images, None).await?;
        let outcome = parse_json_from_response(&text).and_then(|value| attempt_once(&value));

        match outcome {
            Ok(result) => return Ok(result),
            Err(err) => {
                if attempt == max_attempts || !retryable(&err) {
                    return Err(err);
                }
                prompt = feedback_template.replace("{error}", &err.to_string());
            }
        }
    }
    unreachable!("loop always returns by the last iteration")
}

/// Run the Stage-1 objective-identification orchestrator (spec 4.7):
/// request frame descriptions, relations, and an objective string, retrying
/// up to [`STAGE12_MAX_ATTEMPTS`] times on a schema failure.
///
/// # Errors
/// Returns whatever the final attempt's error was once retries (or
/// retryability) are exhausted.
pub async fn run_stage1(
    agent: &mut dyn Agent,
    images: &[Image],
    initial_prompt: &str,
    frames: usize,
) -> Result<Stage1Result> {
    retry_loop(
        agent,
        images,
        initial_prompt,
        STAGE12_MAX_ATTEMPTS,
        STAGE12_FEEDBACK,
        HalliganError::retryable_stage12,
        |value| schemas::validate_stage1(value, frames),
    )
    .await
}

/// Run the Stage-2 structure-abstraction orchestrator (spec 4.7): request
/// an annotation plan, validate its schema, retrying up to
/// [`STAGE12_MAX_ATTEMPTS`] times on a schema failure. Applying the plan to
/// the frame tree (and its post-condition check) is the caller's
/// responsibility via [`crate::kernel::stage2::apply_stage2_plan`], since
/// that check needs the tree and root id list this module does not own.
///
/// # Errors
/// Returns whatever the final attempt's error was once retries (or
/// retryability) are exhausted.
pub async fn run_stage2(
    agent: &mut dyn Agent,
    images: &[Image],
    initial_prompt: &str,
    frames: usize,
) -> Result<Stage2Plan> {
    retry_loop(
        agent,
        images,
        initial_prompt,
        STAGE12_MAX_ATTEMPTS,
        STAGE12_FEEDBACK,
        HalliganError::retryable_stage12,
        |value| schemas::validate_stage2(value, frames),
    )
    .await
}

/// Run the Stage-3 solution-composition orchestrator (spec 4.7): request a
/// program, validate its shallow schema, and execute it against `tree`,
/// retrying up to [`STAGE3_MAX_ATTEMPTS`] times on a parse, validation, or
/// tool failure. `env` accumulates across attempts is reset per attempt so
/// a partially-executed failed program cannot leak state into the retry.
///
/// # Errors
/// Returns whatever the final attempt's error was once retries (or
/// retryability) are exhausted.
pub async fn run_stage3(
    agent: &mut dyn Agent,
    images: &[Image],
    initial_prompt: &str,
    tree: &mut FrameTree,
    registry: &ToolRegistry,
) -> Result<Env> {
    let mut prompt = initial_prompt.to_owned();

    for attempt in 1..=STAGE3_MAX_ATTEMPTS {
        if attempt > 1 {
            agent.reset();
        }
        let (text, _metadata) = agent.call(&prompt, images, None).await?;

        let mut env = Env::new();
        let outcome: Result<Stage3Program> =
            parse_json_from_response(&text).and_then(|value| schemas::validate_stage3(&value));

        let result = match outcome {
            Ok(program) => stage3::execute_stage3_program(&program, &mut env, tree, registry)
                .await
                .map(|()| env),
            Err(err) => Err(err),
        };

        match result {
            Ok(env) => return Ok(env),
            Err(err) => {
                if attempt == STAGE3_MAX_ATTEMPTS || !err.retryable_stage3() {
                    return Err(err);
                }
                prompt = STAGE3_FEEDBACK.replace("{error}", &err.to_string());
            }
        }
    }
    unreachable!("loop always returns by the last iteration")
}
