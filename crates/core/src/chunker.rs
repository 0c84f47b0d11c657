use crate::{
    error::{DigestError, Result},
    types::Chunk,
};

/// Partition `words` into consecutive windows of `limit` words.
///
/// Every window but the last holds exactly `limit` words. Window text is the
/// words rejoined with single spaces, so original spacing is not preserved.
pub fn chunk<S: AsRef<str>>(words: &[S], limit: usize) -> Result<Vec<Chunk>> {
    if limit == 0 {
        return Err(DigestError::invalid_input("chunk limit must be positive"));
    }

    let chunks = words
        .chunks(limit)
        .enumerate()
        .map(|(i, window)| Chunk {
            index: i + 1,
            text: window
                .iter()
                .map(|word| word.as_ref())
                .collect::<Vec<&str>>()
                .join(" "),
            word_count: window.len(),
        })
        .collect();

    Ok(chunks)
}

/// Split `text` on whitespace and chunk the resulting words.
pub fn chunk_text(text: &str, limit: usize) -> Result<Vec<Chunk>> {
    let words: Vec<&str> = text.split_whitespace().collect();
    chunk(&words, limit)
}
