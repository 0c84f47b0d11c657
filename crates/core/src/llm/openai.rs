use std::collections::VecDeque;

use futures::{StreamExt, stream::BoxStream};
use reqwest::Client;

use crate::{
    llm::{
        CompletionRequest, FragmentStream, LanguageModel, LlmError,
        sse::{ChatChunk, SseDecoder, SseEvent},
    },
    provider::Provider,
};

/// Streaming client for any OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn for_provider(provider: &Provider, api_key: impl Into<String>) -> Self {
        Self::new(api_key, provider.config().base_url)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl LanguageModel for OpenAiClient {
    async fn stream(&self, request: CompletionRequest) -> Result<FragmentStream, LlmError> {
        let body = serde_json::json!({
            "model": request.model,
            "stream": true,
            "messages": [
                {
                    "role": "system",
                    "content": request.system,
                },
                {
                    "role": "user",
                    "content": request.user,
                },
            ],
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            tracing::error!(status, %message, "Completion request rejected");
            return Err(LlmError::Api { status, message });
        }

        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();

        Ok(fragments(body))
    }
}

struct StreamState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    completed: bool,
    closed: bool,
}

impl StreamState {
    fn apply(&mut self, event: SseEvent) {
        match event {
            SseEvent::Done => {
                self.completed = true;
                self.closed = true;
            }
            SseEvent::Data(data) => {
                let chunk = match serde_json::from_str::<ChatChunk>(&data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping undecodable stream payload");
                        return;
                    }
                };

                for choice in chunk.choices {
                    if let Some(content) = choice.delta.and_then(|d| d.content) {
                        if !content.is_empty() {
                            self.pending.push_back(Ok(content));
                        }
                    }

                    match choice.finish_reason.as_deref() {
                        Some("length") => {
                            self.pending.push_back(Err(LlmError::Truncated {
                                reason: "model stopped at its token limit".into(),
                            }));
                            self.closed = true;
                        }
                        Some(_) => self.completed = true,
                        None => {}
                    }
                }
            }
        }
    }
}

/// Turn a raw SSE body into text fragments, ending with a truncation error if
/// the body closes before the model signalled completion.
pub fn fragments(body: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> FragmentStream {
    let state = StreamState {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        completed: false,
        closed: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.closed {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    for event in state.decoder.push(&bytes) {
                        if state.closed {
                            break;
                        }
                        state.apply(event);
                    }
                }
                Some(Err(e)) => {
                    state.closed = true;
                    return Some((
                        Err(LlmError::Truncated {
                            reason: format!("transport error: {e}"),
                        }),
                        state,
                    ));
                }
                None => {
                    if let Some(event) = state.decoder.finish() {
                        state.apply(event);
                    }
                    if !state.completed && !state.closed {
                        state.pending.push_back(Err(LlmError::Truncated {
                            reason: "stream ended before the model finished".into(),
                        }));
                    }
                    state.closed = true;
                }
            }
        }
    })
    .boxed()
}
