//! Splitting digest text for a length-limited transport.
//!
//! Lengths are counted in chars. No chunk is ever blank or longer than the
//! limit; lines stay intact unless a single line is longer than the limit.
//!
//! Whitespace-only runs that would land in a chunk of their own are dropped,
//! so blank lines falling on a chunk boundary do not survive a rejoin with
//! `\n`. Rejoining is lossless only away from such boundaries and from
//! hard-split points inside over-long lines.

/// Hard limit for one chat message.
pub const MESSAGE_LIMIT: usize = 4096;
/// Limit for media captions (part of the transport contract, not used for text).
pub const CAPTION_LIMIT: usize = 1024;
/// Visible separator between summaries coalesced into one message.
pub const DIVIDER: &str = "\n\n━━━━━━━━━━━━━━━━━━━━\n\n";

fn flush(chunks: &mut Vec<String>, current: Option<(String, usize)>) {
    if let Some((text, _)) = current {
        if !text.trim().is_empty() {
            chunks.push(text);
        }
    }
}

/// Split `text` into chunks of at most `max_len` chars on line boundaries.
/// Text that already fits comes back unchanged as a single chunk; empty
/// text yields no chunks.
pub fn split(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current: Option<(String, usize)> = None;
    for line in text.split('\n') {
        let len = line.chars().count();
        if len > max_len {
            flush(&mut chunks, current.take());
            let chars: Vec<char> = line.chars().collect();
            let mut pieces: Vec<String> = chars
                .chunks(max_len)
                .map(|piece| piece.iter().collect())
                .collect();
            // The tail piece may still share a chunk with the following lines.
            current = pieces.pop().map(|tail| {
                let n = tail.chars().count();
                (tail, n)
            });
            chunks.extend(pieces);
            continue;
        }
        current = match current.take() {
            None => Some((line.to_string(), len)),
            Some((mut buf, n)) if n + 1 + len <= max_len => {
                buf.push('\n');
                buf.push_str(line);
                Some((buf, n + 1 + len))
            }
            Some(full) => {
                flush(&mut chunks, Some(full));
                Some((line.to_string(), len))
            }
        };
    }
    flush(&mut chunks, current);
    chunks
}

/// One outbound message: its chunks (sent in order) and the indices of the
/// summaries it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chunks: Vec<String>,
    pub covers: Vec<usize>,
}

/// Coalesce all summaries into one message when the joined text fits,
/// otherwise send each summary on its own with an `i/N` header.
pub fn plan_messages(summaries: &[String], max_len: usize) -> Vec<OutboundMessage> {
    if summaries.is_empty() {
        return Vec::new();
    }
    let joined = summaries.join(DIVIDER);
    if joined.chars().count() <= max_len {
        return vec![OutboundMessage {
            chunks: split(&joined, max_len),
            covers: (0..summaries.len()).collect(),
        }];
    }

    let total = summaries.len();
    summaries
        .iter()
        .enumerate()
        .map(|(i, summary)| OutboundMessage {
            chunks: split(&format!("📄 {}/{}\n\n{}", i + 1, total, summary), max_len),
            covers: vec![i],
        })
        .collect()
}
