use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Trailing window ending at (and including) an as-of date
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Label stored with derived rows, e.g. `7d` or `alltime`
    pub label: String,
    /// Length in days, `None` for an unbounded window
    pub days: Option<u32>,
}

impl TimeWindow {
    pub fn days(days: u32) -> Self {
        Self {
            label: format!("{}d", days),
            days: Some(days),
        }
    }

    pub fn all_time() -> Self {
        Self {
            label: "alltime".to_string(),
            days: None,
        }
    }

    /// Parses `Nd` or `alltime`
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_lowercase();
        if raw == "alltime" {
            return Some(Self::all_time());
        }
        let days: u32 = raw.strip_suffix('d')?.parse().ok()?;
        if days == 0 {
            return None;
        }
        Some(Self::days(days))
    }

    /// First day covered by the window ending at `asof`
    pub fn start(&self, asof: NaiveDate) -> Option<NaiveDate> {
        self.days
            .map(|d| asof - Duration::days(i64::from(d) - 1))
    }

    pub fn contains(&self, asof: NaiveDate, day: NaiveDate) -> bool {
        if day > asof {
            return false;
        }
        match self.start(asof) {
            Some(start) => day >= start,
            None => true,
        }
    }
}

/// Inclusive date filter used by the query surface and store reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from.map_or(true, |f| day >= f) && self.to.map_or(true, |t| day <= t)
    }
}
