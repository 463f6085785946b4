use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::fields;
use crate::models::{ChartBundle, Record};

pub const SENTIMENT_ORDER: [&str; 3] = ["Negative", "Neutral", "Positive"];
pub const TOP_INTENTS: usize = 5;

/// Counts labels, keeping first-seen order so a stable sort breaks ties by it.
fn count_in_order<I>(labels: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = String>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for label in labels {
        match index.get(&label) {
            Some(&position) => counts[position].1 += 1,
            None => {
                index.insert(label.clone(), counts.len());
                counts.push((label, 1));
            }
        }
    }

    counts
}

fn ranked<I>(labels: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = String>,
{
    let mut counts = count_in_order(labels);
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

fn label_or(record: &Record, field: &str, default: &str) -> String {
    fields::text(record, field)
        .map(|value| value.into_owned())
        .unwrap_or_else(|| default.to_string())
}

pub fn aggregate(filtered: &[&Record], issue_counts: [usize; 6]) -> ChartBundle {
    let mut volume: BTreeMap<String, usize> = BTreeMap::new();
    let mut csat_buckets: BTreeMap<String, [usize; 5]> = SENTIMENT_ORDER
        .iter()
        .map(|sentiment| (sentiment.to_string(), [0; 5]))
        .collect();

    for record in filtered {
        if let Some(day) = fields::date_label(record) {
            *volume.entry(day).or_insert(0) += 1;
        }

        let sentiment = fields::text(record, fields::SENTIMENT);
        if let (Some(sentiment), Some(score)) = (sentiment, fields::csat_score(record)) {
            if let Some(bucket) = csat_buckets.get_mut(&*sentiment) {
                bucket[(score - 1) as usize] += 1;
            }
        }
    }

    let cat_counts: Map<String, Value> = count_in_order(
        filtered
            .iter()
            .map(|record| label_or(record, fields::PRIMARY_CATEGORY, "Uncategorized")),
    )
    .into_iter()
    .map(|(category, count)| (category, Value::from(count)))
    .collect();

    let mut intents = ranked(
        filtered
            .iter()
            .map(|record| label_or(record, fields::INTENT, "Unknown")),
    );
    intents.truncate(TOP_INTENTS);

    let (sorted_dates, vol_data): (Vec<String>, Vec<usize>) = volume.into_iter().unzip();

    ChartBundle {
        sorted_dates,
        vol_data,
        cat_counts,
        sorted_intents: intents,
        csat_buckets,
        sentiment_order: SENTIMENT_ORDER.iter().map(|s| s.to_string()).collect(),
        issues_landscape_counts: issue_counts,
    }
}

/// Recommendation ranking over negative-sentiment rows.
pub fn recommendations(filtered: &[&Record]) -> Vec<(String, usize)> {
    ranked(
        filtered
            .iter()
            .filter(|record| fields::equals_ignore_case(record, fields::SENTIMENT, "negative"))
            .filter_map(|record| fields::text(record, fields::RECOMMENDATION))
            .filter(|value| value != "null" && value != "empty")
            .map(|value| value.into_owned()),
    )
}
