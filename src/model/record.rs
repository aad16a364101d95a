//! A single raw message as found in the MBOX.

/// One message record, borrowed from the parser's buffer.
///
/// `raw` holds the exact bytes of the message: the `From ` separator line
/// (when present) followed by the header block and body, up to the next
/// separator or EOF. Nothing is unescaped or normalized.
#[derive(Debug, Clone, Copy)]
pub struct MessageRecord<'a> {
    /// Byte offset of the record inside the MBOX file.
    pub offset: u64,

    /// Sequential index within the MBOX (0, 1, 2, …).
    pub sequence: u64,

    /// Raw record bytes.
    pub raw: &'a [u8],
}

impl<'a> MessageRecord<'a> {
    pub fn new(offset: u64, sequence: u64, raw: &'a [u8]) -> Self {
        Self {
            offset,
            sequence,
            raw,
        }
    }

    /// The `From ` separator line including its line ending, if the record
    /// starts with one.
    ///
    /// Only bytes before the first separator of a file can lack one.
    pub fn separator(&self) -> Option<&'a [u8]> {
        let start = bom_len(self.raw);
        if !self.raw[start..].starts_with(b"From ") {
            return None;
        }
        let end = self
            .raw
            .iter()
            .position(|&b| b == b'\n')
            .map_or(self.raw.len(), |pos| pos + 1);
        Some(&self.raw[..end])
    }

    /// Header block and body, without the separator line.
    pub fn content(&self) -> &'a [u8] {
        match self.separator() {
            Some(sep) => &self.raw[sep.len()..],
            None => self.raw,
        }
    }

    /// The header block: content up to (not including) the first blank line.
    pub fn header_block(&self) -> &'a [u8] {
        let content = self.content();
        let mut pos = 0;
        while pos < content.len() {
            let end = content[pos..]
                .iter()
                .position(|&b| b == b'\n')
                .map_or(content.len(), |p| pos + p + 1);
            if is_blank_line(&content[pos..end]) {
                return &content[..pos];
            }
            pos = end;
        }
        content
    }

    /// Total byte length of the record.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

fn bom_len(bytes: &[u8]) -> usize {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        3
    } else {
        0
    }
}

/// A line is blank when it holds nothing but its line ending.
fn is_blank_line(line: &[u8]) -> bool {
    line == b"\n" || line == b"\r\n"
}
