//! Server-Sent Events decoding
//!
//! Shared by the streaming LLM providers and the browser client reading run
//! events; kept free of any runtime so it builds for wasm.

/// Incremental SSE decoder
///
/// Buffers raw bytes and yields the `data` payload of every complete event.
/// Multi-line `data:` fields are joined with `\n`; comments and other
/// fields are skipped. Bytes are only decoded once a full line is
/// available, so multi-byte characters split across chunks survive.
///
/// ```
/// use agent_core::sse::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
/// assert!(decoder.push(b"data: {\"a\"").is_empty());
/// assert_eq!(decoder.push(b":1}\n\n"), vec!["{\"a\":1}"]);
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push bytes, returning payloads of events completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            self.line(line.trim_end_matches(['\n', '\r']), &mut payloads);
        }
        payloads
    }

    /// Flush an unterminated final event
    pub fn finish(&mut self) -> Vec<String> {
        let mut payloads = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let rest = String::from_utf8_lossy(&rest);
            for line in rest.lines() {
                self.line(line, &mut payloads);
            }
        }
        self.dispatch(&mut payloads);
        payloads
    }

    fn line(&mut self, line: &str, payloads: &mut Vec<String>) {
        if line.is_empty() {
            self.dispatch(payloads);
        } else if let Some(value) = line.strip_prefix("data:") {
            self.data.push(value.strip_prefix(' ').unwrap_or(value).to_owned());
        }
    }

    fn dispatch(&mut self, payloads: &mut Vec<String>) {
        if !self.data.is_empty() {
            payloads.push(self.data.join("\n"));
            self.data.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\n");
        assert_eq!(payloads, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn test_split_multibyte_character() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: café\n\n".as_bytes();
        let split = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;

        assert!(decoder.push(&bytes[..split]).is_empty());
        assert_eq!(decoder.push(&bytes[split..]), vec!["café"]);
    }

    #[test]
    fn test_comments_crlf_and_multiline_data() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.push(b": keep-alive\r\n\r\nevent: message\r\ndata: one\r\ndata: two\r\n\r\n");
        assert_eq!(payloads, vec!["one\ntwo"]);
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), vec!["[DONE]"]);
        assert!(decoder.finish().is_empty());
    }
}
