pub mod chunker;
pub mod error;
pub mod events;
pub mod invocation;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod provider;
pub mod source;
pub mod types;
pub mod youtube;

pub use chunker::{chunk, chunk_text};
pub use error::{DigestError, Result};
pub use events::{EnrichedEvent, EventBus, EventReceiver, Phase, PipelineEvent};
pub use llm::{CompletionRequest, FragmentStream, LanguageModel, LlmError, openai::OpenAiClient};
pub use orchestrator::Orchestrator;
pub use provider::{Provider, ProviderConfig};
pub use source::{VideoSource, YoutubeSource};
pub use types::{
    Chunk, ChunkLimit, ChunkSummary, Report, ReportLength, SummaryRequest, SynthesisPath,
    TruncationPolicy, VideoMetadata, VideoReference,
};
