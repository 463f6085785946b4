use chrono::{Duration, NaiveDate};

use crate::fields;
use crate::models::{DatasetCollection, FilterSpec, Record};

pub const ALL_COUNTRIES: &str = "All";
pub const TEST_DATASET: &str = "Test_Sheet";
pub const WIDGET_SOURCE: &str = "Widget";
pub const WHATSAPP_SOURCE: &str = "Whatsapp";
pub const WIDGET_DATASETS: [&str; 4] = ["Master", "KSA_Widget", "UAE_Widget", "ZA_Widget"];
pub const WHATSAPP_DATASETS: [&str; 3] = ["KSA_Whatsapp", "UAE_Whatsapp", "ZA_Whatsapp"];

/// Rows a filter pass starts from. Missing dataset keys contribute nothing.
pub fn select_dataset<'a>(database: &'a DatasetCollection, spec: &FilterSpec) -> Vec<&'a Record> {
    let keys: Vec<String> = if spec.test_mode {
        vec![TEST_DATASET.to_string()]
    } else if spec.country == ALL_COUNTRIES {
        match spec.source.as_str() {
            WIDGET_SOURCE => WIDGET_DATASETS.iter().map(|key| key.to_string()).collect(),
            WHATSAPP_SOURCE => WHATSAPP_DATASETS.iter().map(|key| key.to_string()).collect(),
            _ => Vec::new(),
        }
    } else {
        vec![format!("{}_{}", spec.country, spec.source)]
    };

    keys.iter()
        .filter_map(|key| database.get(key))
        .flat_map(|dataset| dataset.data.iter())
        .collect()
}

pub fn in_range(record: &Record, start: NaiveDate, end: NaiveDate) -> bool {
    fields::record_date(record).is_some_and(|date| date >= start && date <= end)
}

/// Exact or prefix match on `Country`; rows without one read as `All`.
pub fn country_matches(record: &Record, country: &str) -> bool {
    if country == ALL_COUNTRIES {
        return true;
    }
    fields::text(record, fields::COUNTRY)
        .unwrap_or(ALL_COUNTRIES.into())
        .starts_with(country)
}

pub fn matches(record: &Record, spec: &FilterSpec) -> bool {
    in_range(record, spec.start_date, spec.end_date)
        && country_matches(record, &spec.country)
        && (!spec.csat_only_enabled || fields::csat_score(record).is_some())
}

pub fn apply<'a>(rows: &[&'a Record], spec: &FilterSpec) -> Vec<&'a Record> {
    rows.iter()
        .copied()
        .filter(|record| matches(record, spec))
        .collect()
}

/// The window of equal span ending the day before the current one starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonWindow {
    pub start: NaiveDate,
    pub end_exclusive: NaiveDate,
}

impl ComparisonWindow {
    pub fn preceding(start: NaiveDate, end: NaiveDate) -> Self {
        let span = (end - start).num_days();
        Self {
            start: start - Duration::days(span),
            end_exclusive: start,
        }
    }

    pub fn contains(&self, record: &Record) -> bool {
        fields::record_date(record)
            .is_some_and(|date| date >= self.start && date < self.end_exclusive)
    }
}

/// Previous-period rows. Checks the date window only; the country and
/// satisfaction-only predicates are not reapplied.
pub fn previous_period<'a>(rows: &[&'a Record], spec: &FilterSpec) -> Vec<&'a Record> {
    if !spec.compare_enabled {
        return Vec::new();
    }
    let window = ComparisonWindow::preceding(spec.start_date, spec.end_date);
    rows.iter()
        .copied()
        .filter(|record| window.contains(record))
        .collect()
}
