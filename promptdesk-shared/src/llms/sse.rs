//! Incremental decoder for `text/event-stream` bodies.

/// Splits a byte stream into SSE event payloads.
///
/// Chunks may end in the middle of a line or of a UTF-8 sequence; both are
/// carried over to the next call. Only `data:` fields are collected, and
/// multiple `data:` lines of one event are joined with `\n`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    buffer: String,
    data: Vec<String>,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds bytes and returns every event completed by them.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        self.decode_pending();

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            if let Some(event) = self.process_line(line.trim_end_matches(['\n', '\r'])) {
                events.push(event);
            }
        }
        events
    }

    /// Moves every complete UTF-8 sequence from `pending` into `buffer`.
    /// Invalid bytes become U+FFFD; an incomplete trailing sequence stays.
    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    let Some(invalid) = err.error_len() else {
                        let bytes: Vec<u8> = self.pending.drain(..valid).collect();
                        self.buffer.push_str(&String::from_utf8_lossy(&bytes));
                        return;
                    };
                    let bytes: Vec<u8> = self.pending.drain(..valid + invalid).collect();
                    self.buffer.push_str(&String::from_utf8_lossy(&bytes));
                }
            }
        }
    }

    /// Flushes an event left open when the body ended without a blank line.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim_end_matches('\r');
        if !rest.is_empty() {
            self.process_line(rest);
        }
        self.take_event()
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.take_event();
        }
        if let Some(value) = line.strip_prefix("data:") {
            self.data
                .push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        None
    }

    fn take_event(&mut self) -> Option<String> {
        if self.data.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.data).join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_events_on_blank_lines() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: one\n\ndata: two\n\n");
        assert_eq!(events, vec!["one", "two"]);
    }

    #[test]
    fn carries_partial_lines_and_crlf_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        assert!(decoder.push(b":1}\r").is_empty());
        assert_eq!(decoder.push(b"\n\r\n"), vec!["{\"a\":1}"]);
    }

    #[test]
    fn carries_split_utf8_sequences() {
        let text = "data: \u{43f}\u{440}\u{438}\n\n".as_bytes();
        // Split inside the first two-byte Cyrillic character.
        let (head, tail) = text.split_at(7);
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(head).is_empty());
        assert_eq!(decoder.push(tail), vec!["\u{43f}\u{440}\u{438}"]);
    }

    #[test]
    fn invalid_byte_does_not_corrupt_split_character() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: x\xFF\xD0").is_empty());
        assert_eq!(decoder.push(b"\x9F\n\n"), vec!["x\u{FFFD}\u{41f}"]);
    }

    #[test]
    fn ignores_comments_and_other_fields() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\nevent: message\nid: 7\ndata:x\n\n");
        assert_eq!(events, vec!["x"]);
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("[DONE]"));
        assert_eq!(decoder.finish(), None);
    }
}
