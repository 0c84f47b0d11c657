use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::{StreamExt, stream};
use tubedigest_core::{CompletionRequest, FragmentStream, LanguageModel, LlmError};

pub const REPORT: &str = "# [Mock Talk](https://youtu.be/dQw4w9WgXcQ)\n\n## 📖 Overview\n\nIt went well.";

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Truncate {
    Never,
    Chunks,
    Synthesis,
}

/// Answers chunk prompts with `summary[<first word>]` and synthesis prompts
/// with [`REPORT`], each split into two fragments.
#[derive(Clone)]
pub struct MockLanguageModel {
    pub calls: Arc<Mutex<Vec<CompletionRequest>>>,
    pub truncate: Truncate,
    pub reject_with: Option<u16>,
    /// Chunks whose text starts with the given word are answered after the delay.
    pub delays: Vec<(String, Duration)>,
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            truncate: Truncate::Never,
            reject_with: None,
            delays: Vec::new(),
        }
    }
}

impl MockLanguageModel {
    pub fn truncating(truncate: Truncate) -> Self {
        Self {
            truncate,
            ..Self::default()
        }
    }

    pub fn rejecting(status: u16) -> Self {
        Self {
            reject_with: Some(status),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, first_word: &str, delay: Duration) -> Self {
        self.delays.push((first_word.to_string(), delay));
        self
    }

    pub fn chunk_calls(&self) -> Vec<CompletionRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| is_chunk_prompt(&c.user))
            .cloned()
            .collect()
    }

    pub fn synthesis_calls(&self) -> Vec<CompletionRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| !is_chunk_prompt(&c.user))
            .cloned()
            .collect()
    }
}

fn is_chunk_prompt(user: &str) -> bool {
    user.starts_with("Video data:")
}

/// First word of the chunk text that follows the metadata line.
fn chunk_first_word(user: &str) -> String {
    user.split("\n\n")
        .nth(1)
        .and_then(|text| text.split_whitespace().next())
        .unwrap_or_default()
        .to_string()
}

impl LanguageModel for MockLanguageModel {
    async fn stream(&self, request: CompletionRequest) -> Result<FragmentStream, LlmError> {
        self.calls.lock().unwrap().push(request.clone());

        if let Some(status) = self.reject_with {
            return Err(LlmError::Api {
                status,
                message: "rate limited".into(),
            });
        }

        let chunk = is_chunk_prompt(&request.user);
        let reply = if chunk {
            let first = chunk_first_word(&request.user);
            if let Some((_, delay)) = self.delays.iter().find(|(word, _)| *word == first) {
                tokio::time::sleep(*delay).await;
            }
            format!("summary[{first}]")
        } else {
            REPORT.to_string()
        };

        let mid = reply
            .char_indices()
            .nth(reply.chars().count() / 2)
            .map(|(i, _)| i)
            .unwrap_or(0);
        let (head, tail) = reply.split_at(mid);
        let mut items: Vec<Result<String, LlmError>> = vec![Ok(head.to_string())];
        let truncated = match self.truncate {
            Truncate::Never => false,
            Truncate::Chunks => chunk,
            Truncate::Synthesis => !chunk,
        };
        if truncated {
            items.push(Err(LlmError::Truncated {
                reason: "stream ended before the model finished".into(),
            }));
        } else {
            items.push(Ok(tail.to_string()));
        }

        Ok(stream::iter(items).boxed())
    }
}
