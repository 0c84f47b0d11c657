use std::{
    io::{self, Write},
    time::{Duration, Instant},
};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tubedigest_core::{EnrichedEvent, Phase, PipelineEvent, SynthesisPath};

const SUMMARIZED: &str = "Chunks summarized";

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

type Sink = Box<dyn Write + Send>;

/// Turns bus events into terminal output. The report (or NDJSON) goes to `out`;
/// progress, timings and the footer go to `status` so `out` can be piped.
pub struct Renderer {
    json: bool,
    out: Sink,
    status: Sink,
    spinners: bool,
    spinner: Option<ProgressBar>,
    label: String,
    step_start: Instant,
    run_start: Instant,
    chunk_chars: usize,
    streaming: bool,
}

impl Renderer {
    pub fn new(json: bool) -> Self {
        Self {
            spinners: true,
            ..Self::with_writers(json, Box::new(io::stdout()), Box::new(io::stderr()))
        }
    }

    /// Plain status lines instead of spinners.
    pub fn with_writers(json: bool, out: Sink, status: Sink) -> Self {
        Self {
            json,
            out,
            status,
            spinners: false,
            spinner: None,
            label: String::new(),
            step_start: Instant::now(),
            run_start: Instant::now(),
            chunk_chars: 0,
            streaming: false,
        }
    }

    pub fn handle(&mut self, event: &EnrichedEvent) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => {
                    let _ = writeln!(self.out, "{line}");
                }
                Err(e) => tracing::warn!(error = %e, "Failed to encode event"),
            }
            return;
        }

        if self.streaming && !matches!(event.event, PipelineEvent::ReportFragment { .. }) {
            self.end_report();
        }

        match &event.event {
            PipelineEvent::PhaseChanged { phase, label } => self.enter(*phase, label),
            PipelineEvent::MetadataFetched { metadata } => {
                if let Some(title) = metadata.get("title").and_then(|t| t.as_str()) {
                    self.line(format!(
                        "{} {}",
                        style("Video:").dim(),
                        style(title).yellow()
                    ));
                }
            }
            PipelineEvent::CaptionsFetched { words } => {
                self.line(format!("{} {} words", style("Captions:").dim(), words));
            }
            PipelineEvent::Chunked { chunks, limit } => {
                self.line(format!(
                    "{} {} of up to {} words",
                    style("Chunks:").dim(),
                    chunks,
                    limit
                ));
            }
            PipelineEvent::ChunkFragment { chunk, fragment } => {
                self.chunk_chars += fragment.chars().count();
                if let Some(spinner) = &self.spinner {
                    spinner.set_message(format!(
                        "Summarizing chunk {chunk} {}",
                        style(format!("({} chars)", self.chunk_chars)).dim()
                    ));
                }
            }
            PipelineEvent::ChunkSummarized { chunk, chars, .. } => {
                self.line(format!(
                    "{} Chunk {} summarized {}",
                    style("✓").green().bold(),
                    chunk,
                    style(format!("({chars} chars)")).dim()
                ));
            }
            PipelineEvent::ReportFragment { fragment } => {
                if !self.streaming {
                    self.finish_step();
                    self.line(style("─".repeat(60)).dim().to_string());
                    self.streaming = true;
                }
                let _ = write!(self.out, "{fragment}");
                let _ = self.out.flush();
            }
            PipelineEvent::StreamTruncated { stage, reason } => {
                self.line(format!(
                    "{} {} output was cut short: {}",
                    style("!").yellow().bold(),
                    stage,
                    reason
                ));
            }
            PipelineEvent::RunFailed { message } => {
                self.line(format!("{} {}", style("Error:").red().bold(), message));
            }
            PipelineEvent::RunCompleted { report } => {
                let path = match report.path {
                    SynthesisPath::RawCaptions => "from captions".to_string(),
                    SynthesisPath::ChunkSummaries { count } => format!("from {count} chunk summaries"),
                };
                self.line(style("─".repeat(60)).dim().to_string());
                self.line(format!(
                    "{} {} report by {} {}",
                    style("Report:").dim(),
                    report.length.name(),
                    style(&report.model).cyan(),
                    style(path).dim()
                ));
                if report.truncated {
                    self.line(
                        style("Parts of this report come from truncated model output.")
                            .yellow()
                            .to_string(),
                    );
                }
            }
        }
    }

    fn enter(&mut self, phase: Phase, label: &str) {
        match phase {
            Phase::FetchingMetadata => {
                self.reset();
                self.start(label);
            }
            Phase::Done => {
                self.finish_step();
                let total = format_duration(self.run_start.elapsed());
                self.line(format!(
                    "\n{} {}\n",
                    style("Total time:").dim(),
                    style(total).cyan().bold()
                ));
            }
            Phase::Failed => {
                if let Some(spinner) = self.spinner.take() {
                    let msg = format!("{} {}", style("✗").red().bold(), self.label);
                    if spinner.is_hidden() {
                        let _ = writeln!(self.status, "{msg}");
                    }
                    spinner.abandon_with_message(msg);
                }
            }
            Phase::SummarizingChunk { .. } => {
                self.chunk_chars = 0;
                // One spinner covers every chunk.
                if self.label != SUMMARIZED || self.spinner.is_none() {
                    self.finish_step();
                    self.start(label);
                    self.label = SUMMARIZED.to_string();
                }
                if let Some(spinner) = &self.spinner {
                    spinner.set_message(label.to_string());
                }
            }
            _ => {
                self.finish_step();
                self.start(label);
            }
        }
    }

    /// Drop any state left from an earlier run.
    pub fn reset(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        self.streaming = false;
        self.chunk_chars = 0;
        self.run_start = Instant::now();
    }

    fn start(&mut self, label: &str) {
        self.label = label.to_string();
        self.step_start = Instant::now();
        self.spinner = Some(if self.spinners {
            create_spinner(label)
        } else {
            ProgressBar::hidden()
        });
    }

    fn finish_step(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            let msg = format!(
                "{} {} {}",
                style("✓").green().bold(),
                self.label.trim_end_matches("..."),
                style(format!("[{}]", format_duration(self.step_start.elapsed()))).dim()
            );
            if spinner.is_hidden() {
                let _ = writeln!(self.status, "{msg}");
            }
            spinner.finish_with_message(msg);
        }
    }

    /// Close the streamed report with a newline.
    fn end_report(&mut self) {
        let _ = writeln!(self.out);
        let _ = self.out.flush();
        self.streaming = false;
    }

    fn line(&mut self, msg: String) {
        match &self.spinner {
            Some(spinner) if !spinner.is_hidden() => spinner.println(msg),
            _ => {
                let _ = writeln!(self.status, "{msg}");
            }
        }
    }
}

/// In-memory sink that stays readable after being boxed into a `Renderer`.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct SharedBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

#[cfg(test)]
impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
