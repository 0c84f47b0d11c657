//! Single model calls: one per chunk summary and one for the final report.

use chrono::{DateTime, Local};
use futures::StreamExt;
use uuid::Uuid;

use crate::{
    error::{DigestError, Result},
    events::{EventBus, PipelineEvent},
    llm::{CompletionRequest, FragmentStream, LanguageModel, LlmError},
    prompts,
    types::{Chunk, ChunkSummary, SummaryRequest, TruncationPolicy, VideoReference},
};

/// Shared state for every invocation of one run.
pub struct InvocationContext<'a> {
    pub bus: &'a EventBus,
    pub request: &'a SummaryRequest,
    pub now: DateTime<Local>,
}

impl InvocationContext<'_> {
    fn run_id(&self) -> Uuid {
        self.request.run_id
    }
}

/// What the synthesizer reads.
#[derive(Debug, Clone, Copy)]
pub enum SynthesisInput<'a> {
    RawCaptions(&'a str),
    ChunkSummaries(&'a [ChunkSummary]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drained {
    pub text: String,
    /// Set when the stream ended without a normal completion.
    pub truncation: Option<String>,
}

/// Pull every fragment in arrival order. Stops at the first stream error.
pub async fn drain<F>(mut stream: FragmentStream, mut on_fragment: F) -> Drained
where
    F: FnMut(&str),
{
    let mut text = String::new();
    let mut truncation = None;

    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                on_fragment(&fragment);
                text.push_str(&fragment);
            }
            Err(LlmError::Truncated { reason }) => {
                truncation = Some(reason);
                break;
            }
            Err(e) => {
                truncation = Some(e.to_string());
                break;
            }
        }
    }

    Drained { text, truncation }
}

/// Apply the run's truncation policy. Returns the text and whether it is partial.
fn settle(ctx: &InvocationContext<'_>, stage: &str, drained: Drained) -> Result<(String, bool)> {
    let Some(reason) = drained.truncation else {
        return Ok((drained.text, false));
    };

    tracing::warn!(run_id = %ctx.run_id(), stage, %reason, "Model stream truncated");

    match ctx.request.truncation {
        TruncationPolicy::AcceptPartial => {
            ctx.bus.publish(
                ctx.run_id(),
                PipelineEvent::StreamTruncated {
                    stage: stage.to_string(),
                    reason,
                },
            );
            Ok((drained.text, true))
        }
        TruncationPolicy::Fail => Err(DigestError::StreamTruncated {
            stage: stage.to_string(),
            reason,
        }),
    }
}

async fn open<M: LanguageModel>(
    model: &M,
    stage: &str,
    request: CompletionRequest,
) -> Result<FragmentStream> {
    model
        .stream(request)
        .await
        .map_err(|source| DigestError::ModelRequest {
            stage: stage.to_string(),
            source,
        })
}

pub async fn summarize_chunk<M: LanguageModel>(
    model: &M,
    ctx: &InvocationContext<'_>,
    video: &VideoReference,
    chunk: &Chunk,
) -> Result<ChunkSummary> {
    let stage = format!("chunk {}", chunk.index);
    tracing::debug!(
        run_id = %ctx.run_id(),
        chunk = chunk.index,
        words = chunk.word_count,
        "Summarizing chunk"
    );

    let stream = open(
        model,
        &stage,
        CompletionRequest {
            model: ctx.request.model.clone(),
            system: prompts::chunk_system_prompt(ctx.now),
            user: prompts::chunk_user_prompt(video, &chunk.text),
        },
    )
    .await?;

    let drained = drain(stream, |fragment| {
        ctx.bus.publish(
            ctx.run_id(),
            PipelineEvent::ChunkFragment {
                chunk: chunk.index,
                fragment: fragment.to_string(),
            },
        )
    })
    .await;
    let (text, truncated) = settle(ctx, &stage, drained)?;

    ctx.bus.publish(
        ctx.run_id(),
        PipelineEvent::ChunkSummarized {
            chunk: chunk.index,
            chars: text.chars().count(),
            truncated,
        },
    );

    Ok(ChunkSummary {
        index: chunk.index,
        text,
        truncated,
    })
}

/// Final pass. Returns the report markdown and whether it is partial.
pub async fn synthesize_report<M: LanguageModel>(
    model: &M,
    ctx: &InvocationContext<'_>,
    video: &VideoReference,
    input: SynthesisInput<'_>,
) -> Result<(String, bool)> {
    let stage = "synthesis";
    let user = match input {
        SynthesisInput::RawCaptions(captions) => prompts::captions_user_prompt(video, captions),
        SynthesisInput::ChunkSummaries(summaries) => {
            prompts::summaries_user_prompt(video, summaries)
        }
    };

    let stream = open(
        model,
        stage,
        CompletionRequest {
            model: ctx.request.model.clone(),
            system: prompts::synthesis_system_prompt(ctx.request.length, ctx.now),
            user,
        },
    )
    .await?;

    let drained = drain(stream, |fragment| {
        ctx.bus.publish(
            ctx.run_id(),
            PipelineEvent::ReportFragment {
                fragment: fragment.to_string(),
            },
        )
    })
    .await;

    settle(ctx, stage, drained)
}
