//! Incremental framing for `text/event-stream` bodies.
//!
//! Bytes arrive in arbitrary chunks. The framer buffers them, normalizes
//! CRLF line endings and yields one [`SseRecord`] per blank-line-terminated
//! record. It never fails: anything it cannot interpret is dropped.

const DATA_PREFIX: &str = "data:";
const EVENT_PREFIX: &str = "event:";

/// One complete record from an event stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseRecord {
    /// Value of the `event:` field, if present
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`
    pub data: String,
}

impl SseRecord {
    fn parse(text: &str) -> Option<Self> {
        let mut record = SseRecord::default();
        let mut data_lines = Vec::new();

        for line in text.split('\n') {
            if let Some(rest) = line.strip_prefix(DATA_PREFIX) {
                data_lines.push(strip_single_space(rest));
            } else if let Some(rest) = line.strip_prefix(EVENT_PREFIX) {
                record.event = Some(strip_single_space(rest).to_string());
            }
        }

        if data_lines.is_empty() {
            return None;
        }
        record.data = data_lines.join("\n");
        Some(record)
    }
}

fn strip_single_space(value: &str) -> &str {
    value.strip_prefix(' ').unwrap_or(value)
}

#[derive(Debug, Default)]
pub struct SseFramer {
    buffer: Vec<u8>,
    // Bytes before this offset are known not to start a blank line.
    scanned: usize,
}

impl SseFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every record it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseRecord> {
        self.append_normalized(chunk);

        let mut records = Vec::new();
        let mut start = self.scanned.min(self.buffer.len());
        while let Some(offset) = find_blank_line(&self.buffer[start..]) {
            let end = start + offset;
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let text = String::from_utf8_lossy(&raw[..end]);
            if let Some(record) = SseRecord::parse(&text) {
                records.push(record);
            }
            start = 0;
        }
        // Two bytes of overlap: a trailing `\n`, or `\n\r` whose `\r` the next
        // chunk may turn into half of a CRLF, must pair with what follows.
        self.scanned = self.buffer.len().saturating_sub(2);
        records
    }

    /// Bytes still waiting for a record terminator.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    // CRLF becomes LF as bytes arrive. A trailing `\r` may be the first half
    // of a CRLF split across chunks, so it stays in the buffer until the next
    // chunk decides it.
    fn append_normalized(&mut self, chunk: &[u8]) {
        let mut bytes = chunk.iter().peekable();
        if self.buffer.last() == Some(&b'\r') && bytes.peek() == Some(&&b'\n') {
            self.buffer.pop();
        }
        self.buffer.reserve(chunk.len());
        while let Some(&byte) = bytes.next() {
            if byte == b'\r' && bytes.peek() == Some(&&b'\n') {
                continue;
            }
            self.buffer.push(byte);
        }
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}
