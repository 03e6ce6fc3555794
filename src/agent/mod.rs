//! The vision-language agent boundary (spec 5).
//!
//! The core only ever depends on the [`Agent`] trait; concrete providers
//! (OpenAI, a local VLM, ...) are out of scope (spec 1). Suspension happens
//! at `Agent::call`, modelled as `async` so an executor can interleave stage
//! retries without blocking a worker thread.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::Image;

/// Token accounting and a provider fingerprint returned alongside every
/// agent response (spec 5).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetadata {
    /// Opaque provider/model fingerprint, for audit logs.
    pub fingerprint: String,
    /// Total tokens billed for this call.
    pub total_tokens: u64,
    /// Prompt-side token count.
    pub prompt_tokens: u64,
    /// Completion-side token count.
    pub completion_tokens: u64,
}

/// A stateful conversational agent (spec 5).
///
/// Implementations accumulate history across calls until [`Agent::reset`]
/// is invoked; the stage orchestrators reset history before every retry
/// prompt (invariant I4) so a failed attempt never leaks into the next.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Send `prompt` plus optional `images` to the underlying model and
    /// return its raw text response alongside call metadata.
    ///
    /// `image_captions`, when shorter than `images` or omitted, is padded
    /// with `Image {i}` placeholders (1-indexed) for the remaining images.
    async fn call(
        &mut self,
        prompt: &str,
        images: &[Image],
        image_captions: Option<&[String]>,
    ) -> Result<(String, AgentMetadata)>;

    /// Discard accumulated conversational history.
    fn reset(&mut self);
}

/// Pad or default per-image captions the way every concrete agent should
/// (spec 5): missing captions become `Image {n}`, 1-indexed.
pub fn default_captions(images: &[Image], image_captions: Option<&[String]>) -> Vec<String> {
    let provided = image_captions.unwrap_or(&[]);
    (0..images.len())
        .map(|i| {
            provided
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("Image {}", i.saturating_add(1)))
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod mock {
    use super::{Agent, AgentMetadata};
    use crate::errors::Result;
    use crate::types::Image;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// A scripted [`Agent`] double: returns queued responses in order and
    /// records every prompt it was called with, for assertions in stage
    /// orchestrator tests.
    #[derive(Debug, Default)]
    pub struct MockAgent {
        pub responses: VecDeque<String>,
        pub prompts: Vec<String>,
        pub reset_count: u32,
    }

    impl MockAgent {
        pub fn with_responses(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
            Self {
                responses: responses.into_iter().map(Into::into).collect(),
                prompts: Vec::new(),
                reset_count: 0,
            }
        }
    }

    #[async_trait]
    impl Agent for MockAgent {
        async fn call(
            &mut self,
            prompt: &str,
            _images: &[Image],
            _image_captions: Option<&[String]>,
        ) -> Result<(String, AgentMetadata)> {
            self.prompts.push(prompt.to_owned());
            let text = self
                .responses
                .pop_front()
                .unwrap_or_else(|| "{}".to_owned());
            Ok((text, AgentMetadata::default()))
        }

        fn reset(&mut self) {
            self.reset_count = self.reset_count.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_captions_pads_missing_entries() {
        let images = vec![Image::default(), Image::default(), Image::default()];
        let provided = vec!["first".to_owned()];
        let captions = default_captions(&images, Some(&provided));
        assert_eq!(captions, vec!["first", "Image 2", "Image 3"]);
    }

    #[test]
    fn default_captions_handles_none() {
        let images = vec![Image::default(), Image::default()];
        let captions = default_captions(&images, None);
        assert_eq!(captions, vec!["Image 1", "Image 2"]);
    }

    #[tokio::test]
    async fn mock_agent_replies_in_order_and_tracks_resets() {
        use mock::MockAgent;
        let mut agent = MockAgent::with_responses(["one", "two"]);
        let (first, _) = agent.call("p1", &[], None).await.expect("call");
        assert_eq!(first, "one");
        agent.reset();
        let (second, _) = agent.call("p2", &[], None).await.expect("call");
        assert_eq!(second, "two");
        assert_eq!(agent.reset_count, 1);
        assert_eq!(agent.prompts, vec!["p1", "p2"]);
    }
}
