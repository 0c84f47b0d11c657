mod mocks;

use std::time::Duration;

use mocks::{
    language_model::{MockLanguageModel, REPORT, Truncate},
    video_source::{MockVideoSource, numbered_words},
};
use tubedigest_core::{
    ChunkLimit, DigestError, EventBus, EventReceiver, Orchestrator, PipelineEvent, SummaryRequest,
    SynthesisPath, TruncationPolicy,
};

const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
const MODEL: &str = "llama3-70b-8192";

fn request() -> SummaryRequest {
    SummaryRequest::new(URL, MODEL).unwrap()
}

fn build(
    source: MockVideoSource,
    model: MockLanguageModel,
) -> (Orchestrator<MockVideoSource, MockLanguageModel>, EventReceiver) {
    let bus = EventBus::default();
    let rx = bus.subscribe();
    (Orchestrator::new(source, model, bus), rx)
}

fn collect(rx: &mut EventReceiver) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event.event.clone());
    }
    events
}

fn phase_labels(events: &[PipelineEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            PipelineEvent::PhaseChanged { label, .. } => Some(label.clone()),
            _ => None,
        })
        .collect()
}

// ─── Synthesis paths ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_multi_chunk_run_summarizes_then_synthesizes() {
    let model = MockLanguageModel::default();
    let (orchestrator, mut rx) = build(
        MockVideoSource::with_captions(&numbered_words(2500)),
        model.clone(),
    );

    let report = orchestrator.run(&request()).await.unwrap();

    let chunk_calls = model.chunk_calls();
    assert_eq!(chunk_calls.len(), 2, "2500 words at 2000 should be 2 chunks");
    assert!(chunk_calls[0].user.contains("w1 w2"));
    assert!(chunk_calls[0].user.contains("w2000\n\n"));
    assert!(chunk_calls[1].user.contains("w2001 "));
    assert!(chunk_calls[1].user.contains("w2500\n\n"));
    assert!(chunk_calls[0].system.contains("<report_format>"));
    assert!(chunk_calls.iter().all(|c| c.model == MODEL));

    let synthesis = model.synthesis_calls();
    assert_eq!(synthesis.len(), 1);
    let user = &synthesis[0].user;
    assert!(user.starts_with(&format!("Video URL: {URL}\n\n")));
    assert!(user.contains("Chunk 1:\n\nsummary[w1]\n\n---\n\n"));
    assert!(user.contains("Chunk 2:\n\nsummary[w2001]\n\n---\n\n"));
    assert!(!user.contains("Captions:"));

    assert_eq!(report.markdown, REPORT);
    assert_eq!(report.path, SynthesisPath::ChunkSummaries { count: 2 });
    assert!(!report.truncated);

    let events = collect(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::Chunked {
            chunks: 2,
            limit: 2000
        }
    )));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, PipelineEvent::RunCompleted { .. }))
    );
}

#[tokio::test]
async fn test_single_chunk_run_reads_raw_captions() {
    let model = MockLanguageModel::default();
    let captions = numbered_words(800);
    let (orchestrator, _rx) = build(MockVideoSource::with_captions(&captions), model.clone());

    let report = orchestrator.run(&request()).await.unwrap();

    assert!(model.chunk_calls().is_empty(), "chunk pass must be skipped");
    let synthesis = model.synthesis_calls();
    assert_eq!(synthesis.len(), 1);
    assert!(
        synthesis[0]
            .user
            .contains(&format!("Captions: {captions}\n\n"))
    );
    assert_eq!(report.path, SynthesisPath::RawCaptions);
}

#[tokio::test]
async fn test_short_length_selects_short_prompt() {
    let model = MockLanguageModel::default();
    let (orchestrator, _rx) = build(
        MockVideoSource::with_captions(&numbered_words(50)),
        model.clone(),
    );
    let request = request().with_length(tubedigest_core::ReportLength::Short);

    let report = orchestrator.run(&request).await.unwrap();

    let system = &model.synthesis_calls()[0].system;
    assert!(!system.contains("Section 1"));
    assert!(system.contains("Takeaways"));
    assert_eq!(report.length, tubedigest_core::ReportLength::Short);
}

#[tokio::test]
async fn test_schemeless_url_is_canonicalized_for_lookups_and_prompts() {
    let source = MockVideoSource::with_captions(&numbered_words(10));
    let source_calls = source.calls.clone();
    let model = MockLanguageModel::default();
    let (orchestrator, _rx) = build(source, model.clone());
    let request = SummaryRequest::new("youtube.com/shorts/dQw4w9WgXcQ", MODEL).unwrap();

    let report = orchestrator.run(&request).await.unwrap();

    assert_eq!(
        *source_calls.lock().unwrap(),
        vec![format!("metadata {URL}"), format!("captions {URL}")]
    );
    let user = &model.synthesis_calls()[0].user;
    assert!(user.starts_with(&format!("Video URL: {URL}\n\nVideo Data: {{\"author_name\"")));
    assert_eq!(report.url, URL);
}

// ─── Failures ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_captions_fail_without_model_calls() {
    for source in [
        MockVideoSource::without_captions(),
        MockVideoSource::with_captions("   \n\t "),
    ] {
        let model = MockLanguageModel::default();
        let (orchestrator, mut rx) = build(source, model.clone());

        let result = orchestrator.run(&request()).await;

        assert!(matches!(result, Err(DigestError::CaptionUnavailable { .. })));
        assert!(model.calls.lock().unwrap().is_empty());

        let events = collect(&mut rx);
        assert_eq!(
            phase_labels(&events),
            vec!["Parsing Video", "Reading Captions", "Failed"]
        );
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::RunFailed { message } if message.starts_with("Sorry, could not parse video")
        )));
    }
}

#[tokio::test]
async fn test_rejected_model_request_is_fatal() {
    let (orchestrator, _rx) = build(
        MockVideoSource::with_captions(&numbered_words(2500)),
        MockLanguageModel::rejecting(429),
    );

    let result = orchestrator.run(&request()).await;

    match result {
        Err(DigestError::ModelRequest { stage, .. }) => assert_eq!(stage, "chunk 1"),
        other => panic!("expected ModelRequest, got {other:?}"),
    }
}

#[tokio::test]
async fn test_metadata_failure_falls_back_to_url() {
    let model = MockLanguageModel::default();
    let (orchestrator, _rx) = build(
        MockVideoSource::with_captions(&numbered_words(10)).failing_metadata(),
        model.clone(),
    );

    orchestrator.run(&request()).await.unwrap();

    let user = &model.synthesis_calls()[0].user;
    assert!(user.contains(&format!(r#"Video Data: {{"url":"{URL}"}}"#)));
}

// ─── Ordering & events ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_parallel_summaries_keep_chunk_order() {
    let model = MockLanguageModel::default().with_delay("w1", Duration::from_millis(80));
    let (orchestrator, mut rx) = build(
        MockVideoSource::with_captions(&numbered_words(3000)),
        model.clone(),
    );
    let request = request()
        .with_chunk_limit(ChunkLimit::new(1000).unwrap())
        .with_concurrency(3)
        .unwrap();

    let report = orchestrator.run(&request).await.unwrap();
    assert_eq!(report.path, SynthesisPath::ChunkSummaries { count: 3 });

    let events = collect(&mut rx);
    let completion_order: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::ChunkSummarized { chunk, .. } => Some(*chunk),
            _ => None,
        })
        .collect();
    assert_eq!(completion_order.len(), 3);
    assert_eq!(
        completion_order.last(),
        Some(&1),
        "delayed chunk finishes last"
    );

    let user = &model.synthesis_calls()[0].user;
    let first = user.find("Chunk 1:\n\nsummary[w1]").unwrap();
    let second = user.find("Chunk 2:\n\nsummary[w1001]").unwrap();
    let third = user.find("Chunk 3:\n\nsummary[w2001]").unwrap();
    assert!(first < second && second < third);
}

#[tokio::test]
async fn test_phases_are_published_in_order() {
    let (orchestrator, mut rx) = build(
        MockVideoSource::with_captions(&numbered_words(2500)),
        MockLanguageModel::default(),
    );

    orchestrator.run(&request()).await.unwrap();

    let events = collect(&mut rx);
    assert_eq!(
        phase_labels(&events),
        vec![
            "Parsing Video",
            "Reading Captions",
            "Chunking",
            "Summarizing chunk 1",
            "Summarizing chunk 2",
            "Processing...",
            "Done",
        ]
    );

    let fragments: String = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::ReportFragment { fragment } => Some(fragment.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(fragments, REPORT);
}

#[tokio::test]
async fn test_regenerate_refetches_everything() {
    let source = MockVideoSource::with_captions(&numbered_words(10));
    let calls = source.calls.clone();
    let (orchestrator, mut rx) = build(source, MockLanguageModel::default());

    let first = request();
    let second = first.regenerate();
    orchestrator.run(&first).await.unwrap();
    orchestrator.run(&second).await.unwrap();

    assert_eq!(calls.lock().unwrap().len(), 4, "nothing is cached");

    let mut run_ids = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if !run_ids.contains(&event.run_id) {
            run_ids.push(event.run_id);
        }
    }
    assert_eq!(run_ids, vec![first.run_id, second.run_id]);
}

// ─── Truncation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_truncated_chunk_is_accepted_and_flagged() {
    let model = MockLanguageModel::truncating(Truncate::Chunks);
    let (orchestrator, mut rx) = build(
        MockVideoSource::with_captions(&numbered_words(2500)),
        model.clone(),
    );

    let report = orchestrator.run(&request()).await.unwrap();

    assert!(report.truncated);
    assert_eq!(report.markdown, REPORT);

    let events = collect(&mut rx);
    let truncations = events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::StreamTruncated { .. }))
        .count();
    assert_eq!(truncations, 2);

    // Partial chunk text still reaches the synthesizer.
    let user = &model.synthesis_calls()[0].user;
    assert!(user.contains("Chunk 1:\n\nsumma"));
    assert!(!user.contains("summary[w1]"));
}

#[tokio::test]
async fn test_truncation_fails_run_under_fail_policy() {
    let model = MockLanguageModel::truncating(Truncate::Chunks);
    let (orchestrator, _rx) = build(
        MockVideoSource::with_captions(&numbered_words(2500)),
        model.clone(),
    );
    let request = request().with_truncation_policy(TruncationPolicy::Fail);

    let result = orchestrator.run(&request).await;

    assert!(matches!(
        result,
        Err(DigestError::StreamTruncated { ref stage, .. }) if stage == "chunk 1"
    ));
    assert!(model.synthesis_calls().is_empty());
}

#[tokio::test]
async fn test_truncated_report_is_returned_partial() {
    let (orchestrator, _rx) = build(
        MockVideoSource::with_captions(&numbered_words(100)),
        MockLanguageModel::truncating(Truncate::Synthesis),
    );

    let report = orchestrator.run(&request()).await.unwrap();

    assert!(report.truncated);
    assert!(REPORT.starts_with(&report.markdown));
    assert!(report.markdown.len() < REPORT.len());
}
