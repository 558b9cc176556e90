use crate::error::InvalidTimeRange;
use anyhow::ensure;
use bytes::Bytes;
use std::collections::BTreeMap;


pub type Timestamp = u64;


/// Half-open `[min, max)` range of cell timestamps visible to a scan
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TimeRange {
    pub min: Timestamp,
    pub max: Timestamp
}


impl TimeRange {
    pub fn all_time() -> Self {
        Self {
            min: 0,
            max: Timestamp::MAX
        }
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        self.min <= ts && ts < self.max
    }
}


impl Default for TimeRange {
    fn default() -> Self {
        Self::all_time()
    }
}


#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Cell {
    pub row: Bytes,
    pub family: Bytes,
    pub qualifier: Bytes,
    pub timestamp: Timestamp,
    pub value: Bytes
}


impl Cell {
    pub fn new(
        row: impl Into<Bytes>,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        timestamp: Timestamp,
        value: impl Into<Bytes>
    ) -> Self
    {
        Self {
            row: row.into(),
            family: family.into(),
            qualifier: qualifier.into(),
            timestamp,
            value: value.into()
        }
    }
}


/// A read request against a single region.
///
/// Empty `start_row` / `stop_row` mean "unbounded" on that side.
/// For a forward scan `start_row` is the lower bound and `stop_row` the upper one.
/// Once `reversed` is set the roles swap: iteration begins at `start_row`
/// and walks down towards `stop_row`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Scan {
    start_row: Bytes,
    include_start_row: bool,
    stop_row: Bytes,
    include_stop_row: bool,
    time_range: TimeRange,
    reversed: bool,
    attributes: BTreeMap<String, Bytes>
}


impl Default for Scan {
    fn default() -> Self {
        Self::new(Bytes::new(), Bytes::new())
    }
}


impl Scan {
    pub fn new(start_row: impl Into<Bytes>, stop_row: impl Into<Bytes>) -> Self {
        Self {
            start_row: start_row.into(),
            include_start_row: true,
            stop_row: stop_row.into(),
            include_stop_row: false,
            time_range: TimeRange::all_time(),
            reversed: false,
            attributes: BTreeMap::new()
        }
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<Bytes>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn start_row(&self) -> &Bytes {
        &self.start_row
    }

    pub fn include_start_row(&self) -> bool {
        self.include_start_row
    }

    pub fn set_start_row(&mut self, row: impl Into<Bytes>, inclusive: bool) {
        self.start_row = row.into();
        self.include_start_row = inclusive;
    }

    pub fn stop_row(&self) -> &Bytes {
        &self.stop_row
    }

    pub fn include_stop_row(&self) -> bool {
        self.include_stop_row
    }

    pub fn set_stop_row(&mut self, row: impl Into<Bytes>, inclusive: bool) {
        self.stop_row = row.into();
        self.include_stop_row = inclusive;
    }

    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    pub fn set_time_range(&mut self, min: Timestamp, max: Timestamp) -> anyhow::Result<()> {
        ensure!(min <= max, InvalidTimeRange { min, max });
        self.time_range = TimeRange { min, max };
        Ok(())
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn set_reversed(&mut self, reversed: bool) {
        self.reversed = reversed
    }

    pub fn attribute(&self, name: &str) -> Option<&Bytes> {
        self.attributes.get(name)
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<Bytes>) {
        self.attributes.insert(name.to_string(), value.into());
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Bytes> {
        self.attributes.remove(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Bytes)> + '_ {
        self.attributes.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Whether the bounds are ordered in the direction of iteration.
    pub fn has_ordered_range(&self) -> bool {
        if self.start_row.is_empty() || self.stop_row.is_empty() {
            return true
        }
        if self.reversed {
            self.stop_row <= self.start_row
        } else {
            self.start_row <= self.stop_row
        }
    }

    pub fn contains_row(&self, row: &[u8]) -> bool {
        let (lower, include_lower, upper, include_upper) = if self.reversed {
            (&self.stop_row, self.include_stop_row, &self.start_row, self.include_start_row)
        } else {
            (&self.start_row, self.include_start_row, &self.stop_row, self.include_stop_row)
        };

        let above_lower = lower.is_empty() || if include_lower {
            row >= lower.as_ref()
        } else {
            row > lower.as_ref()
        };

        let below_upper = upper.is_empty() || if include_upper {
            row <= upper.as_ref()
        } else {
            row < upper.as_ref()
        };

        above_lower && below_upper
    }
}
