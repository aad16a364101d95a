//! Streaming MBOX parser.
//!
//! Reads MBOX files line-by-line through a large buffer and hands out one
//! record at a time. Never loads the entire file into memory. Tolerant of
//! malformed input, and never drops or rewrites bytes: concatenating every
//! record yields the input file.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Result, SplitError};
use crate::model::record::MessageRecord;

/// Default size of the read buffer (1 MB for fast sequential reads on modern SSDs).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Progress is reported every 4 MB.
const PROGRESS_INTERVAL: u64 = 4 * 1024 * 1024;

/// Streaming MBOX parser.
///
/// Reads through the file sequentially, invoking a caller-supplied callback
/// for every record it finds. The parser is tolerant of:
///
/// - Mixed `\n` and `\r\n` line endings
/// - `From ` lines not preceded by a blank line (logs a warning)
/// - Data before the first `From ` line (emitted as its own record)
/// - Truncated messages at EOF
/// - NUL bytes and other binary content in the body
/// - UTF-8 BOM at the start of the file
pub struct MboxParser {
    path: PathBuf,
    file_size: u64,
    read_buffer_size: usize,
}

impl MboxParser {
    /// Create a parser for the given MBOX file.
    ///
    /// Verifies that the file exists and is a readable regular file, but
    /// does NOT validate that it is actually an MBOX.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SplitError::FileNotFound(path.clone())
            } else {
                SplitError::io(&path, e)
            }
        })?;
        if metadata.is_dir() {
            return Err(SplitError::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "is a directory"),
            ));
        }
        Ok(Self {
            path,
            file_size: metadata.len(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        })
    }

    /// Override the read buffer size (clamped to at least 4 KB).
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(4096);
        self
    }

    /// Size of the underlying file in bytes as reported by its metadata.
    ///
    /// Pipes and FIFOs report 0; the file is still read until EOF.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Path to the MBOX file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the full MBOX, calling `message_callback` for each record found.
    ///
    /// An error returned by the callback stops parsing and is returned as-is.
    /// `progress_callback` receives `(bytes_read, total)`, where `total` is
    /// the file size, or the bytes read so far when the size is unknown.
    ///
    /// Returns the number of records found.
    pub fn parse(
        &self,
        message_callback: &mut dyn FnMut(&MessageRecord<'_>) -> Result<()>,
        progress_callback: Option<&dyn Fn(u64, u64)>,
    ) -> Result<u64> {
        let file = File::open(&self.path).map_err(|e| SplitError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(self.read_buffer_size, file);

        let mut count: u64 = 0;
        let mut current_offset: u64 = 0;
        let mut message_buf: Vec<u8> = Vec::with_capacity(64 * 1024);
        let mut message_start: u64 = 0;
        let mut prev_line_was_empty = true;
        let mut first_line = true;
        let mut last_progress: u64 = 0;

        // Reusable line buffer
        let mut line_buf: Vec<u8> = Vec::with_capacity(4096);

        loop {
            line_buf.clear();
            let line_len = {
                let buf = reader
                    .fill_buf()
                    .map_err(|e| SplitError::io(&self.path, e))?;
                if buf.is_empty() {
                    break; // EOF
                }
                let consume_len = match memchr_newline(buf) {
                    Some(pos) => pos + 1,
                    None => buf.len(),
                };
                line_buf.extend_from_slice(&buf[..consume_len]);
                reader.consume(consume_len);
                consume_len as u64
            };

            // A line longer than the buffer arrives in pieces; only the
            // first piece can start a separator.
            let at_line_start = message_buf.last().is_none_or(|&b| b == b'\n');

            if at_line_start && is_mbox_separator(&line_buf, first_line) {
                if !first_line && !prev_line_was_empty {
                    warn!(
                        offset = current_offset,
                        "Found 'From ' separator without preceding blank line"
                    );
                }
                if !message_buf.is_empty() {
                    let record = MessageRecord::new(message_start, count, &message_buf);
                    message_callback(&record)?;
                    count += 1;
                }
                message_start = current_offset;
                message_buf.clear();
            } else if first_line {
                warn!("Data before the first 'From ' separator; keeping it as a record");
            }
            message_buf.extend_from_slice(&line_buf);

            if at_line_start {
                prev_line_was_empty = is_blank_line(&line_buf);
            }
            first_line = false;
            current_offset += line_len;

            if let Some(cb) = progress_callback {
                if current_offset - last_progress >= PROGRESS_INTERVAL {
                    cb(current_offset, self.file_size.max(current_offset));
                    last_progress = current_offset;
                }
            }
        }

        // Flush last message
        if !message_buf.is_empty() {
            let record = MessageRecord::new(message_start, count, &message_buf);
            message_callback(&record)?;
            count += 1;
        }

        if let Some(cb) = progress_callback {
            cb(current_offset, self.file_size.max(current_offset));
        }

        Ok(count)
    }
}

/// Fast newline search (equivalent to memchr for `\n`).
#[inline]
fn memchr_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

/// Check whether a line is an MBOX separator (`From ` at the start).
///
/// A UTF-8 BOM is only skipped on the first line of the file.
fn is_mbox_separator(line: &[u8], first_line: bool) -> bool {
    let line = if first_line && line.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &line[3..]
    } else {
        line
    };
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}
