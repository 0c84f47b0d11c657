use std::sync::{Arc, Mutex};

use tubedigest_core::{DigestError, Result, VideoMetadata, VideoSource};

#[derive(Clone)]
pub struct MockVideoSource {
    pub captions: Option<String>,
    pub metadata_fails: bool,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockVideoSource {
    pub fn with_captions(captions: &str) -> Self {
        Self {
            captions: Some(captions.to_string()),
            metadata_fails: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn without_captions() -> Self {
        Self {
            captions: None,
            metadata_fails: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_metadata(mut self) -> Self {
        self.metadata_fails = true;
        self
    }
}

impl VideoSource for MockVideoSource {
    async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata> {
        self.calls.lock().unwrap().push(format!("metadata {url}"));
        if self.metadata_fails {
            return Err(DigestError::Metadata {
                url: url.to_string(),
                reason: "404 Not Found".into(),
            });
        }

        let mut metadata = VideoMetadata::new();
        metadata.insert("title", "Mock Talk");
        metadata.insert("author_name", "Mock Channel");
        Ok(metadata)
    }

    async fn fetch_captions(&self, url: &str) -> Result<Option<String>> {
        self.calls.lock().unwrap().push(format!("captions {url}"));
        Ok(self.captions.clone())
    }
}

/// `count` distinct words: `w1 w2 ... w{count}`.
pub fn numbered_words(count: usize) -> String {
    (1..=count)
        .map(|i| format!("w{i}"))
        .collect::<Vec<_>>()
        .join(" ")
}
