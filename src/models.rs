use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One ticket row. Schemaless: field name to string, number or nothing.
pub type Record = Map<String, Value>;

/// Dataset keys in a collection, e.g. `KSA_Widget`.
pub type DatasetCollection = BTreeMap<String, Dataset>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub data: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(rename = "countryVal", alias = "country")]
    pub country: String,
    #[serde(rename = "sourceVal", alias = "source")]
    pub source: String,
    #[serde(rename = "startVal", alias = "startDate")]
    pub start_date: NaiveDate,
    #[serde(rename = "endVal", alias = "endDate")]
    pub end_date: NaiveDate,
    #[serde(rename = "isCompare", alias = "compareEnabled", default)]
    pub compare_enabled: bool,
    #[serde(rename = "isCsatOnly", alias = "csatOnlyEnabled", default)]
    pub csat_only_enabled: bool,
    #[serde(rename = "isTestMode", alias = "testMode", default)]
    pub test_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentPcts {
    #[serde(rename = "pPct")]
    pub positive: String,
    #[serde(rename = "nPct")]
    pub negative: String,
    #[serde(rename = "uPct")]
    pub neutral: String,
}

impl Default for SentimentPcts {
    fn default() -> Self {
        Self {
            positive: "0%".to_string(),
            negative: "0%".to_string(),
            neutral: "0%".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSnapshot {
    pub total: usize,
    pub prev_total: usize,
    pub escalated: usize,
    pub esc_rate: String,
    pub positive: usize,
    pub negative: usize,
    /// `total - positive - negative`, left unclamped.
    pub neutral: i64,
    pub sentiment_pcts: SentimentPcts,
    pub avg_msgs: String,
    pub avg_csat: String,
    pub csat_response_rate: String,
    pub bot_issue_count: usize,
    pub website_issue_count: usize,
    pub reason_not_buying_count: usize,
    pub angry_reason_count: usize,
    pub device_quality_count: usize,
    pub pricing_topic_count: usize,
    pub is_compare: bool,
}

impl KpiSnapshot {
    /// Issue counts in landscape chart order.
    pub fn issue_counts(&self) -> [usize; 6] {
        [
            self.bot_issue_count,
            self.website_issue_count,
            self.reason_not_buying_count,
            self.angry_reason_count,
            self.device_quality_count,
            self.pricing_topic_count,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartBundle {
    pub sorted_dates: Vec<String>,
    pub vol_data: Vec<usize>,
    /// Category counts in first-seen order.
    pub cat_counts: Map<String, Value>,
    pub sorted_intents: Vec<(String, usize)>,
    pub csat_buckets: BTreeMap<String, [usize; 5]>,
    pub sentiment_order: Vec<String>,
    pub issues_landscape_counts: [usize; 6],
}

/// Outbound message of one aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub filtered_data: Vec<Record>,
    pub kpi_data: KpiSnapshot,
    pub chart_data: ChartBundle,
    pub current_recommendations: Vec<(String, usize)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_spec_accepts_dashboard_and_descriptive_keys() {
        let dashboard: FilterSpec = serde_json::from_value(json!({
            "countryVal": "KSA",
            "sourceVal": "Widget",
            "startVal": "2024-01-02",
            "endVal": "2024-01-04",
            "isCompare": true
        }))
        .unwrap();
        let descriptive: FilterSpec = serde_json::from_value(json!({
            "country": "KSA",
            "source": "Widget",
            "startDate": "2024-01-02",
            "endDate": "2024-01-04",
            "compareEnabled": true
        }))
        .unwrap();

        assert_eq!(dashboard, descriptive);
        assert!(!dashboard.csat_only_enabled);
        assert!(!dashboard.test_mode);
    }

    #[test]
    fn dataset_collection_reads_data_lists() {
        let collection: DatasetCollection = serde_json::from_value(json!({
            "KSA_Widget": { "data": [{ "Country": "KSA" }] },
            "Master": { "name": "Master sheet", "data": [] }
        }))
        .unwrap();

        assert_eq!(collection["KSA_Widget"].data.len(), 1);
        assert_eq!(collection["Master"].name.as_deref(), Some("Master sheet"));
    }
}
