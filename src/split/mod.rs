//! Splitting an MBOX into per-month mailboxes.
//!
//! Every record is routed by its `Date:` header to `mail-YYMM` inside the
//! output directory, or to `mail-broken` when no date can be derived. Records
//! are copied byte-for-byte, including their `From ` separator line, so each
//! output file is itself a valid MBOX.

pub mod output;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{Config, WriteMode};
use crate::error::Result;
use crate::model::key::DestinationKey;
use crate::parser::header;
use crate::parser::mbox::{MboxParser, DEFAULT_READ_BUFFER_SIZE};

use self::output::OutputSet;

/// Settings for one split run.
#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub output_dir: PathBuf,
    pub create_output_dir: bool,
    pub write_mode: WriteMode,
    pub max_open_files: usize,
    pub read_buffer_size: usize,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("split"),
            create_output_dir: true,
            write_mode: WriteMode::Reopen,
            max_open_files: 64,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl From<&Config> for SplitOptions {
    fn from(config: &Config) -> Self {
        Self {
            output_dir: config.split.output_dir.clone(),
            create_output_dir: config.split.create_output_dir,
            write_mode: config.split.write_mode,
            max_open_files: config.split.max_open_files,
            read_buffer_size: config.performance.read_buffer_size,
        }
    }
}

/// Per-destination counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestinationStats {
    pub messages: u64,
    pub bytes: u64,
}

/// What a split run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitSummary {
    /// Records read (and written).
    pub messages: u64,
    /// Bytes written across all destinations.
    pub bytes: u64,
    /// Counters per destination, months ascending, broken last.
    pub destinations: BTreeMap<DestinationKey, DestinationStats>,
}

impl SplitSummary {
    fn record(&mut self, key: DestinationKey, len: usize) {
        let len = len as u64;
        self.bytes += len;
        let stats = self.destinations.entry(key).or_default();
        stats.messages += 1;
        stats.bytes += len;
    }

    /// Number of messages routed to `mail-broken`.
    pub fn broken(&self) -> u64 {
        self.destinations
            .get(&DestinationKey::Broken)
            .map_or(0, |s| s.messages)
    }
}

/// Split `input` into per-month files under `options.output_dir`.
///
/// `on_message` is called once per record, before it is written, with the
/// 1-based running count and the chosen destination. `progress` receives
/// `(bytes_read, total)` as described on [`MboxParser::parse`].
///
/// A missing or unreadable input fails before anything is written. Any I/O
/// error while writing aborts the run; files written so far are left as is.
pub fn split_mbox(
    input: &Path,
    options: &SplitOptions,
    on_message: &mut dyn FnMut(u64, &DestinationKey),
    progress: Option<&dyn Fn(u64, u64)>,
) -> Result<SplitSummary> {
    let parser = MboxParser::new(input)?.with_read_buffer_size(options.read_buffer_size);
    let mut output = OutputSet::open(
        &options.output_dir,
        options.create_output_dir,
        options.write_mode,
        options.max_open_files,
    )?;

    info!(
        input = %input.display(),
        output = %output.dir().display(),
        size = parser.file_size(),
        mode = ?options.write_mode,
        "Splitting MBOX"
    );

    let mut summary = SplitSummary::default();

    parser.parse(
        &mut |record| {
            summary.messages += 1;
            let (key, reason) = header::destination_for(record);
            if let Some(reason) = reason {
                debug!(
                    offset = record.offset,
                    sequence = record.sequence,
                    reason = %reason,
                    "No usable date, routing to {}",
                    key
                );
            }
            on_message(summary.messages, &key);
            output.append(&key, record.raw)?;
            summary.record(key, record.len());
            Ok(())
        },
        progress,
    )?;

    output.finish()?;

    info!(
        messages = summary.messages,
        destinations = summary.destinations.len(),
        broken = summary.broken(),
        "Split complete"
    );

    Ok(summary)
}
