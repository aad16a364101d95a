//! Destination keys: which output mailbox a message belongs to.

use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset};

/// File name used for messages without a usable date.
pub const BROKEN_FILE_NAME: &str = "mail-broken";

/// Output mailbox a message is routed to.
///
/// Ordering puts months in calendar order and [`DestinationKey::Broken`]
/// last, which is the order summaries are printed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DestinationKey {
    /// A calendar month, as seen in the message's own time zone.
    Month { year: i32, month: u32 },
    /// The `Date:` header was missing or unparseable.
    Broken,
}

impl DestinationKey {
    /// Key for a parsed date. Uses the date's own offset, not UTC.
    pub fn from_date(date: &DateTime<FixedOffset>) -> Self {
        Self::Month {
            year: date.year(),
            month: date.month(),
        }
    }

    /// File name inside the output directory: `mail-YYMM` or `mail-broken`.
    pub fn file_name(&self) -> String {
        match self {
            Self::Month { year, month } => {
                format!("mail-{:02}{:02}", year.rem_euclid(100), month)
            }
            Self::Broken => BROKEN_FILE_NAME.to_string(),
        }
    }

    pub fn is_broken(&self) -> bool {
        matches!(self, Self::Broken)
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}
