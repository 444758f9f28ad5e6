//! Splitting of long outbound messages at line boundaries.
//!
//! A message longer than the limit is cut between lines. Every part after
//! the first starts with [`CONTINUED_PREFIX`], every part before the last
//! ends with [`CONTINUES_SUFFIX`], and both markers count against the
//! limit. A line that cannot fit in one part is cut at char boundaries.
//!
//! The split is not lossless for blank lines: those that would open a part
//! are dropped, so no part starts with or consists only of blank lines.
//! Blank lines anywhere else are kept.

pub const CONTINUED_PREFIX: &str = "(continuación...)\n\n";
pub const CONTINUES_SUFFIX: &str = "\n\n(continúa...)";

fn marker_len() -> usize {
    CONTINUED_PREFIX.chars().count() + CONTINUES_SUFFIX.chars().count()
}

/// Split `text` into parts of at most `max_chars` characters, markers
/// included. Lengths are counted in chars, not bytes.
///
/// When `max_chars` leaves no room for a body next to both markers the
/// parts are emitted without markers.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let overhead = marker_len();
    let (budget, marked) = if max_chars > overhead {
        (max_chars - overhead, true)
    } else {
        (max_chars.max(1), false)
    };

    let mut bodies: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split('\n') {
        for piece in chunk_chars(line, budget) {
            let piece_len = piece.chars().count();
            let joined_len = if current.is_empty() {
                piece_len
            } else {
                current_len + 1 + piece_len
            };

            if joined_len > budget && !current.is_empty() {
                bodies.push(std::mem::take(&mut current));
                current_len = 0;
            }

            if !current.is_empty() {
                current.push('\n');
                current_len += 1;
            }
            current.push_str(piece);
            current_len += piece_len;
        }
    }
    if !current.is_empty() {
        bodies.push(current);
    }
    bodies.retain(|b| !b.trim().is_empty());

    if !marked {
        return bodies;
    }

    let last = bodies.len().saturating_sub(1);
    bodies
        .into_iter()
        .enumerate()
        .map(|(i, body)| {
            let mut part = String::new();
            if i > 0 {
                part.push_str(CONTINUED_PREFIX);
            }
            part.push_str(&body);
            if i < last {
                part.push_str(CONTINUES_SUFFIX);
            }
            part
        })
        .collect()
}

/// Cut `line` into pieces of at most `size` chars. An empty line yields one
/// empty piece.
fn chunk_chars(line: &str, size: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = line;
    while let Some((at, _)) = rest.char_indices().nth(size) {
        let (head, tail) = rest.split_at(at);
        pieces.push(head);
        rest = tail;
    }
    pieces.push(rest);
    pieces
}
