const DATA_PREFIX: &[u8] = b"data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Incremental splitter turning raw SSE bytes into `data:` payloads.
///
/// Bytes are buffered until a CR or LF arrives, so multi-byte UTF-8 sequences
/// split across chunks are decoded intact. Lines without the `data: ` prefix,
/// empty payloads, and the `[DONE]` sentinel are dropped.
#[derive(Debug, Default)]
pub struct SseLineSplitter {
    buffer: Vec<u8>,
}

impl SseLineSplitter {
    /// Feed arbitrary bytes and drain every payload completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut payloads = Vec::new();

        for &byte in bytes {
            if byte == b'\n' || byte == b'\r' {
                let line = std::mem::take(&mut self.buffer);
                if let Some(payload) = extract_payload(&line) {
                    payloads.push(payload);
                }
            } else {
                self.buffer.push(byte);
            }
        }

        payloads
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.is_empty()
    }
}

fn extract_payload(line: &[u8]) -> Option<String> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    if payload.is_empty() {
        return None;
    }

    let payload = String::from_utf8_lossy(payload);
    if payload.trim() == DONE_SENTINEL {
        return None;
    }
    Some(payload.into_owned())
}
