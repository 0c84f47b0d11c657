use chrono::Local;
use futures::{StreamExt, TryStreamExt, stream};

use crate::{
    chunker::chunk_text,
    error::{DigestError, Result},
    events::{EventBus, Phase, PipelineEvent},
    invocation::{InvocationContext, SynthesisInput, summarize_chunk, synthesize_report},
    llm::LanguageModel,
    source::VideoSource,
    types::{ChunkSummary, Report, SummaryRequest, SynthesisPath, VideoMetadata, VideoReference},
    youtube::watch_url,
};

/// Runs requests end to end: metadata, captions, chunking, chunk summaries,
/// synthesis. Holds no per-run state, so the same instance serves regenerate.
pub struct Orchestrator<S, M> {
    source: S,
    model: M,
    bus: EventBus,
}

impl<S: VideoSource, M: LanguageModel> Orchestrator<S, M> {
    pub fn new(source: S, model: M, bus: EventBus) -> Self {
        Self { source, model, bus }
    }

    /// Execute one run. Failures end in the `Failed` phase and are returned;
    /// dropping the future cancels the run.
    #[tracing::instrument(skip_all, fields(run_id = %request.run_id, model = %request.model))]
    pub async fn run(&self, request: &SummaryRequest) -> Result<Report> {
        let result = self.execute(request).await;

        match &result {
            Ok(report) => {
                tracing::info!(path = ?report.path, truncated = report.truncated, "Run completed");
                self.enter(request, Phase::Done);
                self.bus.publish(
                    request.run_id,
                    PipelineEvent::RunCompleted {
                        report: report.clone(),
                    },
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Run failed");
                self.enter(request, Phase::Failed);
                self.bus.publish(
                    request.run_id,
                    PipelineEvent::RunFailed {
                        message: e.to_string(),
                    },
                );
            }
        }

        result
    }

    fn enter(&self, request: &SummaryRequest, phase: Phase) {
        tracing::debug!(phase = %phase.label(), "Entering phase");
        self.bus
            .publish(request.run_id, PipelineEvent::phase(phase));
    }

    async fn execute(&self, request: &SummaryRequest) -> Result<Report> {
        // Lookups and prompts use the canonical form, whatever the user typed.
        let url = watch_url(&request.video_id);

        self.enter(request, Phase::FetchingMetadata);
        let video = VideoReference {
            metadata: self.metadata(&url).await,
            url,
        };
        self.bus.publish(
            request.run_id,
            PipelineEvent::MetadataFetched {
                metadata: video.metadata.clone(),
            },
        );

        self.enter(request, Phase::FetchingCaptions);
        let captions = self
            .source
            .fetch_captions(&video.url)
            .await?
            .filter(|captions| !captions.trim().is_empty())
            .ok_or_else(|| DigestError::CaptionUnavailable {
                url: request.url.clone(),
            })?;
        let words = captions.split_whitespace().count();
        self.bus
            .publish(request.run_id, PipelineEvent::CaptionsFetched { words });

        self.enter(request, Phase::Chunking);
        let chunks = chunk_text(&captions, request.chunk_limit.get())?;
        self.bus.publish(
            request.run_id,
            PipelineEvent::Chunked {
                chunks: chunks.len(),
                limit: request.chunk_limit.get(),
            },
        );
        tracing::info!(words, chunks = chunks.len(), "Captions chunked");

        if chunks.is_empty() {
            return Err(DigestError::CaptionUnavailable {
                url: request.url.clone(),
            });
        }

        let ctx = InvocationContext {
            bus: &self.bus,
            request,
            now: Local::now(),
        };

        let (markdown, truncated, path) = if chunks.len() == 1 {
            self.enter(request, Phase::Synthesizing);
            let (markdown, truncated) = synthesize_report(
                &self.model,
                &ctx,
                &video,
                SynthesisInput::RawCaptions(&captions),
            )
            .await?;
            (markdown, truncated, SynthesisPath::RawCaptions)
        } else {
            let total = chunks.len();
            let ctx = &ctx;
            let video = &video;

            // `buffered` yields in submission order whatever the completion order.
            let summaries: Vec<ChunkSummary> = stream::iter(chunks.iter())
                .map(|chunk| async move {
                    self.enter(
                        request,
                        Phase::SummarizingChunk {
                            chunk: chunk.index,
                            of: total,
                        },
                    );
                    summarize_chunk(&self.model, ctx, video, chunk).await
                })
                .buffered(request.concurrency)
                .try_collect()
                .await?;

            self.enter(request, Phase::Synthesizing);
            let (markdown, truncated) = synthesize_report(
                &self.model,
                ctx,
                video,
                SynthesisInput::ChunkSummaries(&summaries),
            )
            .await?;
            let truncated = truncated || summaries.iter().any(|s| s.truncated);
            (
                markdown,
                truncated,
                SynthesisPath::ChunkSummaries {
                    count: summaries.len(),
                },
            )
        };

        Ok(Report {
            url: video.url,
            model: request.model.clone(),
            length: request.length,
            path,
            markdown,
            truncated,
            generated_at: ctx.now,
        })
    }

    /// Metadata is best effort; a failed lookup leaves only the URL.
    async fn metadata(&self, url: &str) -> VideoMetadata {
        match self.source.fetch_metadata(url).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(error = %e, "Metadata unavailable, continuing with URL only");
                let mut metadata = VideoMetadata::new();
                metadata.insert("url", url);
                metadata
            }
        }
    }
}
