//! Month keys, the `YYYY-MM` buckets entries are grouped and filtered by.

use std::{fmt::Display, str::FromStr};

use serde::{Serialize, Serializer};
use time::OffsetDateTime;

use crate::{Error, timezone::LEDGER_OFFSET};

/// A calendar month in the form `YYYY-MM`, e.g. "2024-01".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey(String);

impl MonthKey {
    /// The month that `date_time` falls in at the ledger's UTC+8 offset.
    pub fn from_date_time(date_time: OffsetDateTime) -> Self {
        let local = date_time.to_offset(LEDGER_OFFSET);

        Self(format!("{:04}-{:02}", local.year(), u8::from(local.month())))
    }

    /// The month key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MonthKey {
    type Err = Error;

    /// Parse a month filter, accepting exactly four digits, a dash and a month from 01 to 12.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let month = raw.trim();
        let bytes = month.as_bytes();

        let is_well_formed = bytes.len() == 7
            && bytes[..4].iter().all(u8::is_ascii_digit)
            && bytes[4] == b'-'
            && bytes[5..].iter().all(u8::is_ascii_digit);

        if !is_well_formed {
            return Err(Error::InvalidMonth);
        }

        match month[5..].parse::<u8>() {
            Ok(1..=12) => Ok(Self(month.to_owned())),
            _ => Err(Error::InvalidMonth),
        }
    }
}

impl Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for MonthKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}
