//! Panel store
//!
//! Holds the merged multi-series panel, one row per (store, department, week),
//! grouped into time-ordered segments. The panel is immutable once built and
//! hands out borrowed [`Segment`] views, so it can be shared read-only across
//! concurrently running segment pipelines.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Number of promotional markdown columns in the schema.
pub const MARKDOWN_COUNT: usize = 5;

/// Store category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreType {
    /// Type A
    A,
    /// Type B
    B,
    /// Type C
    C,
}

impl FromStr for StoreType {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            "C" | "c" => Ok(Self::C),
            other => Err(DataError::UnknownStoreType(other.to_string())),
        }
    }
}

/// Identifies one (store, department) segment of the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentKey {
    /// Store id
    pub store: u32,
    /// Department id
    pub department: u32,
}

impl SegmentKey {
    /// Create a new segment key.
    pub const fn new(store: u32, department: u32) -> Self {
        Self { store, department }
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store {} / dept {}", self.store, self.department)
    }
}

/// One weekly observation for a (store, department) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRow {
    /// Store id
    pub store: u32,
    /// Department id
    pub department: u32,
    /// Week the observation belongs to
    pub week: NaiveDate,
    /// Weekly sales for the department
    pub weekly_sales: f64,
    /// Whether the week contains a holiday
    pub is_holiday: bool,
    /// Average regional temperature
    pub temperature: f64,
    /// Regional fuel price
    pub fuel_price: f64,
    /// Promotional markdown amounts; absent values are stored as zero
    pub markdowns: [f64; MARKDOWN_COUNT],
    /// Consumer price index
    pub cpi: f64,
    /// Unemployment rate
    pub unemployment: f64,
    /// Store category
    pub store_type: StoreType,
    /// Store size
    pub store_size: u32,
}

impl PanelRow {
    /// Create a row with the given sales figure and all regressors zeroed.
    pub const fn new(store: u32, department: u32, week: NaiveDate, weekly_sales: f64) -> Self {
        Self {
            store,
            department,
            week,
            weekly_sales,
            is_holiday: false,
            temperature: 0.0,
            fuel_price: 0.0,
            markdowns: [0.0; MARKDOWN_COUNT],
            cpi: 0.0,
            unemployment: 0.0,
            store_type: StoreType::A,
            store_size: 0,
        }
    }

    /// Set the holiday flag.
    pub const fn with_holiday(mut self, is_holiday: bool) -> Self {
        self.is_holiday = is_holiday;
        self
    }

    /// Set temperature and fuel price.
    pub const fn with_weather(mut self, temperature: f64, fuel_price: f64) -> Self {
        self.temperature = temperature;
        self.fuel_price = fuel_price;
        self
    }

    /// Set the markdown amounts.
    pub const fn with_markdowns(mut self, markdowns: [f64; MARKDOWN_COUNT]) -> Self {
        self.markdowns = markdowns;
        self
    }

    /// Set CPI and unemployment.
    pub const fn with_macro(mut self, cpi: f64, unemployment: f64) -> Self {
        self.cpi = cpi;
        self.unemployment = unemployment;
        self
    }

    /// Set store metadata.
    pub const fn with_store(mut self, store_type: StoreType, store_size: u32) -> Self {
        self.store_type = store_type;
        self.store_size = store_size;
        self
    }

    /// Segment this row belongs to.
    pub const fn key(&self) -> SegmentKey {
        SegmentKey::new(self.store, self.department)
    }
}

/// Borrowed view of one segment: all rows of a (store, department) ordered by week.
#[derive(Debug, Clone, Copy)]
pub struct Segment<'a> {
    key: SegmentKey,
    rows: &'a [PanelRow],
}

impl<'a> Segment<'a> {
    /// Segment key.
    pub const fn key(&self) -> SegmentKey {
        self.key
    }

    /// Rows in ascending week order.
    pub const fn rows(&self) -> &'a [PanelRow] {
        self.rows
    }

    /// Number of weeks in the segment.
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the segment has no rows.
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Weekly sales as (week, value) pairs.
    pub fn sales_series(&self) -> Vec<(NaiveDate, f64)> {
        self.rows.iter().map(|r| (r.week, r.weekly_sales)).collect()
    }

    /// Weekly sales values only.
    pub fn sales(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.weekly_sales).collect()
    }
}

/// The merged panel, grouped by segment.
#[derive(Debug, Clone, Default)]
pub struct Panel {
    segments: BTreeMap<SegmentKey, Vec<PanelRow>>,
    row_count: usize,
}

impl Panel {
    /// Build a panel from rows in any order.
    ///
    /// Rows are grouped by (store, department) and sorted by week.
    ///
    /// # Errors
    /// Returns [`DataError::DuplicateRow`] if a (store, department, week) key repeats.
    pub fn from_rows(rows: impl IntoIterator<Item = PanelRow>) -> Result<Self> {
        let mut segments: BTreeMap<SegmentKey, Vec<PanelRow>> = BTreeMap::new();
        let mut row_count = 0;

        for row in rows {
            segments.entry(row.key()).or_default().push(row);
            row_count += 1;
        }

        for rows in segments.values_mut() {
            rows.sort_by_key(|r| r.week);
            if let Some(dup) = rows.windows(2).find(|w| w[0].week == w[1].week) {
                return Err(DataError::DuplicateRow {
                    store: dup[0].store,
                    department: dup[0].department,
                    week: dup[0].week,
                });
            }
        }

        tracing::debug!(rows = row_count, segments = segments.len(), "panel assembled");

        Ok(Self {
            segments,
            row_count,
        })
    }

    /// Total number of rows.
    pub const fn len(&self) -> usize {
        self.row_count
    }

    /// Whether the panel holds no rows.
    pub const fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// All segment keys in ascending order.
    pub fn keys(&self) -> Vec<SegmentKey> {
        self.segments.keys().copied().collect()
    }

    /// Look up one segment.
    pub fn segment(&self, key: SegmentKey) -> Option<Segment<'_>> {
        self.segments
            .get_key_value(&key)
            .map(|(key, rows)| Segment { key: *key, rows })
    }

    /// Iterate over all segments in key order.
    pub fn segments(&self) -> impl Iterator<Item = Segment<'_>> {
        self.segments
            .iter()
            .map(|(key, rows)| Segment { key: *key, rows })
    }

    /// Row count per segment.
    pub fn segment_lengths(&self) -> BTreeMap<SegmentKey, usize> {
        self.segments
            .iter()
            .map(|(key, rows)| (*key, rows.len()))
            .collect()
    }

    /// Keys of segments with exactly `length` weeks.
    pub fn keys_with_length(&self, length: usize) -> Vec<SegmentKey> {
        self.segments
            .iter()
            .filter(|(_, rows)| rows.len() == length)
            .map(|(key, _)| *key)
            .collect()
    }

    /// Most common segment length and how many segments have it.
    pub fn modal_length(&self) -> Option<(usize, usize)> {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for rows in self.segments.values() {
            *counts.entry(rows.len()).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
    }
}

/// Shuffle `keys` with a seeded generator and keep the first `n`.
///
/// The same seed always yields the same selection.
pub fn sample_keys(keys: &[SegmentKey], n: usize, seed: u64) -> Vec<SegmentKey> {
    let mut shuffled = keys.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);
    shuffled.truncate(n);
    shuffled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2010, 2, 5).unwrap() + chrono::Duration::weeks(offset)
    }

    #[test]
    fn test_from_rows_groups_and_sorts() {
        let rows = vec![
            PanelRow::new(1, 1, week(2), 30.0),
            PanelRow::new(2, 7, week(0), 5.0),
            PanelRow::new(1, 1, week(0), 10.0),
            PanelRow::new(1, 1, week(1), 20.0),
        ];
        let panel = Panel::from_rows(rows).unwrap();

        assert_eq!(panel.len(), 4);
        assert_eq!(panel.segment_count(), 2);

        let segment = panel.segment(SegmentKey::new(1, 1)).unwrap();
        assert_eq!(segment.sales(), vec![10.0, 20.0, 30.0]);
        assert!(segment.rows().windows(2).all(|w| w[0].week < w[1].week));
    }

    #[test]
    fn test_duplicate_week_rejected() {
        let rows = vec![
            PanelRow::new(3, 4, week(0), 1.0),
            PanelRow::new(3, 4, week(0), 2.0),
        ];
        let err = Panel::from_rows(rows).unwrap_err();
        assert!(matches!(
            err,
            DataError::DuplicateRow {
                store: 3,
                department: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_segment() {
        let panel = Panel::from_rows(vec![PanelRow::new(1, 1, week(0), 1.0)]).unwrap();
        assert!(panel.segment(SegmentKey::new(9, 9)).is_none());
    }

    #[test]
    fn test_lengths_and_modal_length() {
        let mut rows = Vec::new();
        for w in 0..5 {
            rows.push(PanelRow::new(1, 1, week(w), 1.0));
            rows.push(PanelRow::new(1, 2, week(w), 1.0));
        }
        rows.push(PanelRow::new(2, 1, week(0), 1.0));
        let panel = Panel::from_rows(rows).unwrap();

        assert_eq!(panel.segment_lengths()[&SegmentKey::new(2, 1)], 1);
        assert_eq!(
            panel.keys_with_length(5),
            vec![SegmentKey::new(1, 1), SegmentKey::new(1, 2)]
        );
        assert_eq!(panel.modal_length(), Some((5, 2)));
    }

    #[test]
    fn test_sample_keys_is_seeded() {
        let keys: Vec<_> = (1..=20).map(|d| SegmentKey::new(1, d)).collect();

        let a = sample_keys(&keys, 5, 42);
        let b = sample_keys(&keys, 5, 42);
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);

        let all = sample_keys(&keys, 100, 7);
        assert_eq!(all.len(), 20);
    }

    #[test]
    fn test_store_type_parse() {
        assert_eq!("A".parse::<StoreType>().unwrap(), StoreType::A);
        assert_eq!(" c ".parse::<StoreType>().unwrap(), StoreType::C);
        assert!("Z".parse::<StoreType>().is_err());
    }
}
