//! Imagery capture dates and dated tile references

use std::fmt;

use chrono::NaiveDate;

/// Capture date in the packed form used by the tile service.
///
/// Layout: `year (11 bits) << 9 | month (4 bits) << 5 | day (5 bits)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageDate(u32);

impl ImageDate {
    pub fn new(year: u32, month: u32, day: u32) -> Self {
        Self(((year & 0x7FF) << 9) | ((month & 0xF) << 5) | (day & 0x1F))
    }

    pub fn from_packed(packed: u32) -> Self {
        Self(packed & 0xF_FFFF)
    }

    pub fn packed(&self) -> u32 {
        self.0
    }

    pub fn year(&self) -> u32 {
        self.0 >> 9
    }

    pub fn month(&self) -> u32 {
        (self.0 >> 5) & 0xF
    }

    pub fn day(&self) -> u32 {
        self.0 & 0x1F
    }

    /// Lowercase hex form used in historical image URLs.
    pub fn hex(&self) -> String {
        format!("{:x}", self.0)
    }

    /// Calendar date, or `None` for placeholder values such as day 0.
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year() as i32, self.month(), self.day())
    }
}

impl From<NaiveDate> for ImageDate {
    fn from(date: NaiveDate) -> Self {
        use chrono::Datelike;
        Self::new(date.year() as u32, date.month(), date.day())
    }
}

impl fmt::Display for ImageDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year(), self.month(), self.day())
    }
}

/// A historical image available for one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedTile {
    pub date: ImageDate,
    pub epoch: u32,
    pub provider: u32,
    /// Absolute URL of the encrypted image asset.
    pub asset_url: String,
}
