//! Thin CLI entry point wiring an [`Agent`], a [`FrameTree`] built from a
//! single image, and a [`ToolRegistry`] through the three stages in order.
//!
//! There is no bundled model provider (spec 1 — out of scope); the binary
//! drives a [`StdinAgent`] that prints each prompt to stdout and reads the
//! model's JSON response from stdin, so the pipeline can be exercised
//! end-to-end without a network dependency.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use clap::Parser;

use halligan::agent::{Agent, AgentMetadata};
use halligan::config::RuntimeConfig;
use halligan::errors::Result;
use halligan::frame::{Frame, FrameTree};
use halligan::kernel::pipeline;
use halligan::kernel::stage2::apply_stage2_plan;
use halligan::tools::build_default_registry;
use halligan::types::Image;

/// Run the three-stage planner/executor core against a single screenshot.
#[derive(Debug, Parser)]
#[command(name = "halligan", about = "Sandboxed planner/executor core for a visual CAPTCHA solver")]
struct Cli {
    /// Path to the root frame's image.
    image: PathBuf,
}

/// Prints each prompt to stdout and reads the model's JSON response from
/// stdin, one line per call. Useful for exercising the pipeline without a
/// real model provider wired in.
struct StdinAgent {
    stdin: io::Stdin,
}

impl StdinAgent {
    fn new() -> Self {
        Self { stdin: io::stdin() }
    }
}

#[async_trait]
impl Agent for StdinAgent {
    async fn call(
        &mut self,
        prompt: &str,
        images: &[Image],
        image_captions: Option<&[String]>,
    ) -> Result<(String, AgentMetadata)> {
        let captions = halligan::agent::default_captions(images, image_captions);
        println!("--- prompt ---\n{prompt}\nimages: {captions:?}\n> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        self.stdin
            .lock()
            .read_line(&mut line)
            .map_err(|e| halligan::HalliganError::tool(format!("failed to read stdin: {e}")))?;

        Ok((line, AgentMetadata::default()))
    }

    fn reset(&mut self) {}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    halligan::logging::init();

    let config = RuntimeConfig::from_env();
    config.validate()?;

    let cli = Cli::parse();
    let image_bytes = std::fs::read(&cli.image)?;
    let mut tree = FrameTree::new(vec![Frame::new(Image(image_bytes))]);
    let registry = build_default_registry();
    let mut agent = StdinAgent::new();

    let stage1 = pipeline::run_stage1(&mut agent, &[], "Describe the frame and infer the objective.", tree.len()).await?;
    tracing::info!(objective = %stage1.objective, "stage 1 complete");

    let stage2 = pipeline::run_stage2(&mut agent, &[], "Annotate the frame tree with exactly one interactable.", tree.len()).await?;
    apply_stage2_plan(&mut tree, &[0], &stage2)?;
    tracing::info!("stage 2 complete");

    let env = pipeline::run_stage3(&mut agent, &[], "Compose a solution program.", &mut tree, &registry).await?;
    tracing::info!(bindings = env.len(), "stage 3 complete");

    Ok(())
}
