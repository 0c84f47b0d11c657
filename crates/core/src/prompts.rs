use chrono::{DateTime, Local};

use crate::types::{ChunkSummary, ReportLength, VideoReference};

static CHUNK_SUMMARIZER_PROMPT: &str = r#"You are a Senior NYT Reporter tasked with summarizing a youtube video.

INSTRUCTIONS:
- You will be provided with a youtube video transcript.
- Carefully read the transcript and prepare a thorough report of key facts and details.
- Provide as many details and facts as possible in the summary.
- Your report will be used to generate a final New York Times worthy report.
- Give the sections relevant titles and provide details/facts/processes in each section.
- REMEMBER: you are writing for the New York Times, so the quality of the report is important.
- Make sure your report is properly formatted and follows the <report_format> provided below.

<report_format>
### Overview
{give an overview of the video}

### Section 1
{provide details/facts/processes in this section}

... more sections as necessary...

### Takeaways
{provide key takeaways from the video}
</report_format>"#;

static LONG_REPORT_PROMPT: &str = r#"You are a Senior NYT Reporter tasked with writing a summary of a youtube video.

INSTRUCTIONS:
- You will be provided with:
  1. Youtube video link and information about the video
  2. Pre-processed summaries from junior researchers, or the video captions.
- Carefully process the information and think about the contents.
- Then generate a final New York Times worthy report in the <report_format> provided below.
- Make your report engaging, informative, and well-structured.
- Break the report into sections and provide key takeaways at the end.
- Give the sections relevant titles and provide details/facts/processes in each section.
- Use markdown `#` syntax for headers, and place icons at the beginning of each header except the title.
- Example format for a header: `## 📖 Overview`
- Make sure the title has a `#` syntax and is presented as a markdown link to the video.
- REMEMBER: you are writing for the New York Times, so the quality of the report is important.

<report_format>
## Video Title with Link
{this is the markdown link to the video}

### Overview
{give a brief introduction of the video and why the user should read this report}
{make this section engaging and create a hook for the reader}

### Section 1
{break the report into sections}
{provide details/facts/processes in this section}

...more sections as necessary...

### Takeaways
{provide key takeaways from the video}

Report generated on: {Month Date, Year (hh:mm AM/PM)}
</report_format>"#;

static SHORT_REPORT_PROMPT: &str = r#"You are a Senior NYT Reporter tasked with writing a summary of a youtube video.

INSTRUCTIONS:
- You will be provided with:
  1. Youtube video link and information about the video
  2. Pre-processed summaries from junior researchers, or the video captions.
- Carefully process the information and think about the contents.
- Then generate a final New York Times worthy report in the <report_format> provided below.
- Make your report engaging, informative, and well-structured.
- The report should include only the overview and main takeaways.
- Use markdown `#` syntax for headers, and place icons at the beginning of each header except the title.
- Example format for a header: `## 📖 Overview`
- Make sure the title has a `#` syntax and is presented as a markdown link to the video.
- REMEMBER: you are writing for the New York Times, so the quality of the report is important.

<report_format>
## Video Title with Link
{this is the markdown link to the video}

### Overview
{give a high-level overview of the video}

### Takeaways
{provide key takeaways from the video}

Report generated on: {Month Date, Year (hh:mm AM/PM)}
</report_format>"#;

fn with_context(body: &str, now: DateTime<Local>) -> String {
    format!(
        "{body}\n\nUse markdown to format your answers.\nThe current time is {}.",
        now.format("%B %-d, %Y (%I:%M %p)")
    )
}

pub fn chunk_system_prompt(now: DateTime<Local>) -> String {
    with_context(CHUNK_SUMMARIZER_PROMPT, now)
}

pub fn synthesis_system_prompt(length: ReportLength, now: DateTime<Local>) -> String {
    let body = match length {
        ReportLength::Long => LONG_REPORT_PROMPT,
        ReportLength::Short => SHORT_REPORT_PROMPT,
    };
    with_context(body, now)
}

pub fn chunk_user_prompt(video: &VideoReference, chunk_text: &str) -> String {
    format!("Video data: {}\n\n{chunk_text}\n\n", video.metadata)
}

fn video_header(video: &VideoReference) -> String {
    format!(
        "Video URL: {}\n\nVideo Data: {}\n\n",
        video.url, video.metadata
    )
}

/// Synthesis input for videos whose captions fit in one chunk.
pub fn captions_user_prompt(video: &VideoReference, captions: &str) -> String {
    let mut prompt = video_header(video);
    prompt.push_str(&format!("Captions: {captions}\n\n"));
    prompt
}

/// Synthesis input built from chunk summaries. Summaries are written in index order.
pub fn summaries_user_prompt(video: &VideoReference, summaries: &[ChunkSummary]) -> String {
    let mut ordered: Vec<&ChunkSummary> = summaries.iter().collect();
    ordered.sort_by_key(|s| s.index);

    let mut prompt = video_header(video);
    prompt.push_str("Chunk summaries:\n\n");

    for summary in ordered {
        prompt.push_str(&format!("Chunk {}:\n\n{}\n\n", summary.index, summary.text));
        prompt.push_str("---\n\n");
    }

    prompt
}
