//! Markdown ingestion.
//!
//! Documents are split at headings, each section is packed line by line
//! into chunks of at most [`MAX_CHUNK_CHARS`] characters, and chunks are
//! kept only when they carry an `Answer:` line.
// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use crate::models::KbChunk;
use crate::{Error, Result};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Upper bound on chunk length, in characters.
pub const MAX_CHUNK_CHARS: usize = 500;

/// Chunks shorter than this are dropped.
pub const MIN_CHUNK_CHARS: usize = 50;

static ANSWER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s>*_-]*answer[*_]*\s*:[*_]*[ \t]*(.+?)[ \t]*$").expect("static regex: answer")
});

static EXPLANATION_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ims)^[\s>*_-]*explanation[*_]*\s*:[*_]*\s*(.+)\z").expect("static regex: explanation")
});

/// Counts from one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Markdown files read.
    pub files: usize,
    /// Chunks kept.
    pub chunks: usize,
    /// Chunks dropped for being too short.
    pub skipped_short: usize,
    /// Chunks dropped for lacking an answer.
    pub skipped_unanswerable: usize,
}

/// Splits markdown into chunks of at most [`MAX_CHUNK_CHARS`] characters.
///
/// A heading always starts a new chunk. Within a section lines are packed
/// greedily; a single over-long line is hard-split at whitespace.
#[must_use]
pub fn chunk_markdown(text: &str) -> Vec<String> {
    fn flush(buffer: &mut String, chunks: &mut Vec<String>) {
        let trimmed = buffer.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        buffer.clear();
    }

    let mut chunks = Vec::new();
    let mut buffer = String::new();

    for line in text.lines() {
        if line.trim_start().starts_with('#') {
            flush(&mut buffer, &mut chunks);
        }
        for piece in split_long_line(line.trim_end()) {
            let needed = piece.chars().count() + 1;
            if buffer.chars().count() + needed > MAX_CHUNK_CHARS {
                flush(&mut buffer, &mut chunks);
            }
            buffer.push_str(piece);
            buffer.push('\n');
        }
    }
    flush(&mut buffer, &mut chunks);
    chunks
}

/// Splits a line longer than the chunk limit at whitespace.
fn split_long_line(line: &str) -> Vec<&str> {
    let limit = MAX_CHUNK_CHARS - 1;
    let mut pieces = Vec::new();
    let mut rest = line;
    while rest.chars().count() > limit {
        let cut = rest.char_indices().nth(limit).map_or(rest.len(), |(i, _)| i);
        let split = rest[..cut].rfind(char::is_whitespace).filter(|&i| i > 0).unwrap_or(cut);
        pieces.push(rest[..split].trim_end());
        rest = rest[split..].trim_start();
    }
    pieces.push(rest);
    pieces
}

/// Extracts the answer and optional explanation from a chunk.
#[must_use]
pub fn parse_chunk(content: &str, source: &str) -> Option<KbChunk> {
    let answer = ANSWER_LINE.captures(content)?.get(1)?.as_str().trim().to_string();
    if answer.is_empty() {
        return None;
    }
    let explanation = EXPLANATION_BLOCK
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|text| !text.is_empty());

    Some(KbChunk {
        content: content.to_string(),
        answer,
        explanation,
        source: source.to_string(),
    })
}

/// The part of a chunk that states the question: everything before the
/// answer line, heading markers stripped. Falls back to the whole chunk.
#[must_use]
pub fn question_text(chunk: &KbChunk) -> String {
    let head = ANSWER_LINE
        .find(&chunk.content)
        .map_or(chunk.content.as_str(), |m| &chunk.content[..m.start()]);
    let question = head
        .lines()
        .map(|line| line.trim().trim_start_matches('#').trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if question.is_empty() {
        chunk.content.clone()
    } else {
        question
    }
}

/// Chunks one document, updating `stats`.
pub fn ingest_document(text: &str, source: &str, stats: &mut IngestStats) -> Vec<KbChunk> {
    let mut kept = Vec::new();
    for content in chunk_markdown(text) {
        if content.chars().count() < MIN_CHUNK_CHARS {
            stats.skipped_short += 1;
            continue;
        }
        match parse_chunk(&content, source) {
            Some(chunk) => kept.push(chunk),
            None => stats.skipped_unanswerable += 1,
        }
    }
    stats.chunks += kept.len();
    kept
}

/// Reads every `*.md` file directly inside `dir`, in name order.
///
/// # Errors
///
/// Returns an error if the directory or a file cannot be read.
pub fn ingest_dir(dir: &Path) -> Result<(Vec<KbChunk>, IngestStats)> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::OperationFailed {
        operation: "read_knowledge_dir".to_string(),
        cause: format!("{}: {e}", dir.display()),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("md")))
        .collect();
    files.sort();

    let mut stats = IngestStats::default();
    let mut chunks = Vec::new();
    for path in files {
        let text = std::fs::read_to_string(&path).map_err(|e| Error::OperationFailed {
            operation: "read_knowledge_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        let source = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
        chunks.extend(ingest_document(&text, &source, &mut stats));
        stats.files += 1;
    }

    tracing::info!(
        files = stats.files,
        chunks = stats.chunks,
        skipped_short = stats.skipped_short,
        skipped_unanswerable = stats.skipped_unanswerable,
        "Knowledge documents ingested"
    );
    Ok((chunks, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DOC: &str = "# Power rule\n\
        What is the derivative of x^n with respect to x?\n\
        **Answer:** n*x^(n-1)\n\
        Explanation: Bring the exponent down and reduce it by one.\n\
        \n\
        # Note\n\
        Short.\n\
        \n\
        # Chain rule overview\n\
        The chain rule composes derivatives of nested functions together.\n";

    #[test]
    fn test_headings_start_new_chunks() {
        let chunks = chunk_markdown(DOC);
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].starts_with("# Power rule"));
        assert!(chunks[1].starts_with("# Note"));
    }

    #[test]
    fn test_chunks_respect_limit() {
        let long_line = "word ".repeat(300);
        let text = format!("{long_line}\n{}", "x + 1\n".repeat(200));
        let chunks = chunk_markdown(&text);
        assert!(chunks.len() > 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_CHUNK_CHARS));
    }

    #[test]
    fn test_parse_chunk_markers() {
        let chunk = parse_chunk(&chunk_markdown(DOC)[0], "calculus.md").unwrap();
        assert_eq!(chunk.answer, "n*x^(n-1)");
        assert_eq!(
            chunk.explanation.as_deref(),
            Some("Bring the exponent down and reduce it by one.")
        );
        assert_eq!(chunk.source, "calculus.md");
        assert_eq!(
            question_text(&chunk),
            "Power rule What is the derivative of x^n with respect to x?"
        );
    }

    #[test]
    fn test_parse_chunk_without_answer() {
        assert!(parse_chunk("The chain rule composes derivatives.", "a.md").is_none());
        assert!(parse_chunk("Answer:   ", "a.md").is_none());
    }

    #[test]
    fn test_ingest_document_stats() {
        let mut stats = IngestStats::default();
        let chunks = ingest_document(DOC, "calculus.md", &mut stats);
        assert_eq!(chunks.len(), 1);
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.skipped_short, 1);
        assert_eq!(stats.skipped_unanswerable, 1);
    }

    #[test]
    fn test_ingest_dir_reads_markdown_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.md"), DOC).unwrap();
        std::fs::write(dir.path().join("a.MD"), DOC.replace("calculus", "x")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), DOC).unwrap();

        let (chunks, stats) = ingest_dir(dir.path()).unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].source, "a.MD");
    }

    #[test]
    fn test_ingest_missing_dir_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(ingest_dir(&dir.path().join("missing")).is_err());
    }
}
