//! Plain-text chunking on structural boundaries with character limits.

use std::mem::take;

use sibyl_core::Chunk;
use sibyl_core::config::ChunkingConfig;

/// Split document text into overlapping chunks of at most
/// `config.chunk_size` characters.
///
/// Splitting prefers structural boundaries (sentence enders and line
/// breaks) and falls back to hard character cuts for unbroken runs.
/// Consecutive chunks of the same source share `config.overlap`
/// characters so context survives chunk boundaries. Whitespace-only input
/// counts as empty and produces no chunks; any other input produces at
/// least one.
pub fn split(source: &str, text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    // Units must leave room for the overlap prefix carried into the next
    // chunk, so a unit never pushes an overlap-prefixed buffer past the
    // chunk size.
    let max_unit_chars = config.chunk_size.saturating_sub(config.overlap).max(1);
    let units = segment_units(text, max_unit_chars);

    assemble(source, &units, config)
}

/// Cut text into boundary-terminated units, hard-splitting any unit that
/// exceeds `max_unit_chars`. Concatenating the units reproduces the input
/// exactly.
fn segment_units(text: &str, max_unit_chars: usize) -> Vec<String> {
    let mut units = Vec::new();

    for piece in text.split_inclusive(is_boundary) {
        if piece.chars().count() <= max_unit_chars {
            units.push(piece.to_owned());
            continue;
        }

        let mut current = String::new();
        let mut current_chars = 0;
        for character in piece.chars() {
            current.push(character);
            current_chars += 1;
            if current_chars == max_unit_chars {
                units.push(take(&mut current));
                current_chars = 0;
            }
        }
        if !current.is_empty() {
            units.push(current);
        }
    }

    units
}

/// Characters that terminate a structural unit.
fn is_boundary(character: char) -> bool {
    matches!(character, '.' | '!' | '?' | '\n')
}

/// Greedily pack units into chunks, carrying the overlap tail of each
/// emitted chunk into the next one.
fn assemble(source: &str, units: &[String], config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0;

    for unit in units {
        let unit_chars = unit.chars().count();

        if buffer_chars > 0 && buffer_chars + unit_chars > config.chunk_size {
            let tail = overlap_tail(&buffer, config.overlap);
            let sequence_no = chunks.len();
            chunks.push(Chunk::new(take(&mut buffer), source.to_owned(), sequence_no));
            buffer_chars = tail.chars().count();
            buffer = tail;
        }

        buffer.push_str(unit);
        buffer_chars += unit_chars;
    }

    // A trailing buffer that is pure whitespace carries no content worth
    // retrieving.
    if !buffer.trim().is_empty() {
        let sequence_no = chunks.len();
        chunks.push(Chunk::new(buffer, source.to_owned(), sequence_no));
    }

    chunks
}

/// Last `overlap` characters of the buffer (the whole buffer if shorter).
fn overlap_tail(buffer: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }
    let total = buffer.chars().count();
    if total <= overlap {
        return buffer.to_owned();
    }
    buffer.chars().skip(total - overlap).collect()
}
