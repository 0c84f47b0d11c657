use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::types::{Report, VideoMetadata};

/// Orchestrator states, published as a run enters them. Runs only move forward;
/// `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Phase {
    FetchingMetadata,
    FetchingCaptions,
    Chunking,
    SummarizingChunk { chunk: usize, of: usize },
    Synthesizing,
    Done,
    Failed,
}

impl Phase {
    /// Progress label shown to the user.
    pub fn label(&self) -> String {
        match self {
            Phase::FetchingMetadata => "Parsing Video".to_string(),
            Phase::FetchingCaptions => "Reading Captions".to_string(),
            Phase::Chunking => "Chunking".to_string(),
            Phase::SummarizingChunk { chunk, .. } => format!("Summarizing chunk {chunk}"),
            Phase::Synthesizing => "Processing...".to_string(),
            Phase::Done => "Done".to_string(),
            Phase::Failed => "Failed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    PhaseChanged {
        phase: Phase,
        label: String,
    },
    MetadataFetched {
        metadata: VideoMetadata,
    },
    CaptionsFetched {
        words: usize,
    },
    Chunked {
        chunks: usize,
        limit: usize,
    },
    ChunkFragment {
        chunk: usize,
        fragment: String,
    },
    ChunkSummarized {
        chunk: usize,
        chars: usize,
        truncated: bool,
    },
    ReportFragment {
        fragment: String,
    },
    StreamTruncated {
        stage: String,
        reason: String,
    },
    RunFailed {
        message: String,
    },
    RunCompleted {
        report: Report,
    },
}

impl PipelineEvent {
    pub fn phase(phase: Phase) -> Self {
        PipelineEvent::PhaseChanged {
            label: phase.label(),
            phase,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::PhaseChanged { .. } => "phase.changed",
            PipelineEvent::MetadataFetched { .. } => "metadata.fetched",
            PipelineEvent::CaptionsFetched { .. } => "captions.fetched",
            PipelineEvent::Chunked { .. } => "captions.chunked",
            PipelineEvent::ChunkFragment { .. } => "chunk.fragment",
            PipelineEvent::ChunkSummarized { .. } => "chunk.summarized",
            PipelineEvent::ReportFragment { .. } => "report.fragment",
            PipelineEvent::StreamTruncated { .. } => "stream.truncated",
            PipelineEvent::RunFailed { .. } => "run.failed",
            PipelineEvent::RunCompleted { .. } => "run.completed",
        }
    }
}

/// A published event stamped by the bus.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedEvent {
    pub event_id: Uuid,
    pub run_id: Uuid,
    pub session_id: Uuid,
    pub ingest_seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: PipelineEvent,
}
