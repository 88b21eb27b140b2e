use crate::error::{DateRangeError, SearchError, TileCodeError};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// MGRS grid cell, e.g. `16QEJ`: UTM zone, latitude band, 100km square.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TileCode(String);

fn tile_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(0[1-9]|[1-5][0-9]|60)[C-HJ-NP-X][A-HJ-NP-Z][A-HJ-NP-V]$")
            .expect("Regex pattern should always compile")
    })
}

impl TileCode {
    pub fn new(code: &str) -> Result<Self, TileCodeError> {
        let code = code.trim().to_uppercase();
        if !tile_pattern().is_match(&code) {
            return Err(TileCodeError(code));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the directory downloads for this tile land in.
    pub fn dir_name(&self) -> String {
        format!("T{}", self.0)
    }
}

impl fmt::Display for TileCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TileCode {
    type Err = TileCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TileCode {
    type Error = TileCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<TileCode> for String {
    fn from(tile: TileCode) -> Self {
        tile.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    #[default]
    #[value(name = "l1c")]
    L1C,
    #[value(name = "l2a")]
    L2A,
}

impl ProductType {
    /// Processing level token as it appears in product names.
    pub fn level(&self) -> &'static str {
        match self {
            Self::L1C => "MSIL1C",
            Self::L2A => "MSIL2A",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Satellite {
    #[value(name = "s2a")]
    S2A,
    #[value(name = "s2b")]
    S2B,
    #[value(name = "s2c")]
    S2C,
}

impl Satellite {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::S2A => "S2A",
            Self::S2B => "S2B",
            Self::S2C => "S2C",
        }
    }
}

/// Inclusive range of acquisition dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// The one date a catalog search is issued for. Multi-day ranges are rejected.
    pub fn acquisition_date(&self) -> Result<NaiveDate, SearchError> {
        if self.start != self.end {
            return Err(SearchError::RangeUnsupported {
                start: self.start,
                end: self.end,
            });
        }
        Ok(self.start)
    }
}

/// A single catalog product, created by a search and consumed by one download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductDescriptor {
    pub id: String,
    pub name: String,
    pub tile: TileCode,
    pub origin_date: DateTime<Utc>,
}
