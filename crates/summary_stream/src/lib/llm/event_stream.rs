/// Incremental decoder for `text/event-stream` bodies.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across network chunks decode correctly. Only `data:`
/// fields are surfaced. Consecutive data lines form one event, joined with
/// `\n`, which is dispatched at the next blank line.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
    data: Option<String>,
}

impl EventStreamDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.drain(..=pos).collect::<Vec<_>>();
            events.extend(self.accept_line(&line));
        }
        events
    }

    /// Flushes a trailing line that was not newline terminated, along with an
    /// event that never saw its closing blank line
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        if let Some(event) = self.accept_line(&line) {
            return Some(event);
        }
        self.data.take()
    }

    fn accept_line(&mut self, line: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\n', '\r']);

        if line.is_empty() {
            return self.data.take();
        }

        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            match self.data {
                Some(ref mut data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_data_lines() {
        let mut decoder = EventStreamDecoder::default();
        let events = decoder.push(b"data: {\"a\":1}\n\ndata: [DONE]\n\n");
        assert_eq!(events, vec!["{\"a\":1}", "[DONE]"]);
    }

    #[test]
    fn test_ignores_comments_and_other_fields() {
        let mut decoder = EventStreamDecoder::default();
        let events = decoder.push(b": keep-alive\nevent: message\nid: 7\ndata:x\r\n\r\n");
        assert_eq!(events, vec!["x"]);
    }

    #[test]
    fn test_consecutive_data_lines_form_one_event() {
        let mut decoder = EventStreamDecoder::default();
        let events = decoder.push(b"data: first\ndata:second\r\ndata: third\n\ndata: next\n\n");
        assert_eq!(events, vec!["first\nsecond\nthird", "next"]);
    }

    #[test]
    fn test_blank_lines_without_data_dispatch_nothing() {
        let mut decoder = EventStreamDecoder::default();
        assert!(decoder.push(b"\n\n: ping\n\n").is_empty());
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_lines_split_across_chunks() {
        let mut decoder = EventStreamDecoder::default();
        assert!(decoder.push(b"data: hel").is_empty());
        assert!(decoder.push(b"lo\n").is_empty());
        assert_eq!(decoder.push(b"\ndata: wor"), vec!["hello"]);
        assert_eq!(decoder.finish(), Some("wor".to_string()));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_unterminated_event_flushed_on_finish() {
        let mut decoder = EventStreamDecoder::default();
        assert!(decoder.push(b"data: a\ndata: b\n").is_empty());
        assert_eq!(decoder.finish(), Some("a\nb".to_string()));
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let bytes = "data: caf\u{e9}\n\n".as_bytes();
        let (head, tail) = bytes.split_at(bytes.len() - 3);

        let mut decoder = EventStreamDecoder::default();
        assert!(decoder.push(head).is_empty());
        assert_eq!(decoder.push(tail), vec!["caf\u{e9}"]);
    }
}
