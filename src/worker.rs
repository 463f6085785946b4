//! Off-thread aggregation. One request message in, one response out; the
//! filter, KPI and chart passes never share state with the caller.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::charts;
use crate::error::WorkerError;
use crate::filters;
use crate::kpi;
use crate::models::{AggregationResult, DatasetCollection, FilterSpec, Record};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationRequest {
    /// Used as the selected rows when no `database` is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatasetCollection>,
    pub filter_params: FilterSpec,
}

pub type AggregationResponse = AggregationResult;

/// The whole pass: selection, filtering, comparison window, KPIs, charts and
/// recommendations. Pure and deterministic for a given request.
pub fn aggregate(request: &AggregationRequest) -> AggregationResponse {
    let spec = &request.filter_params;
    let processed: Vec<&Record> = match (&request.database, &request.raw_data) {
        (Some(database), _) => filters::select_dataset(database, spec),
        (None, Some(rows)) => rows.iter().collect(),
        (None, None) => Vec::new(),
    };

    let filtered = filters::apply(&processed, spec);
    let previous = filters::previous_period(&processed, spec);
    debug!(
        selected = processed.len(),
        filtered = filtered.len(),
        previous = previous.len(),
        "aggregation pass"
    );

    let kpi_data = kpi::compute(&filtered, previous.len(), spec.compare_enabled);
    let chart_data = charts::aggregate(&filtered, kpi_data.issue_counts());
    let current_recommendations = charts::recommendations(&filtered);

    AggregationResult {
        filtered_data: filtered.into_iter().cloned().collect(),
        kpi_data,
        chart_data,
        current_recommendations,
    }
}

type Envelope = (AggregationRequest, oneshot::Sender<AggregationResponse>);

/// Handle to a blocking aggregation thread fed through a channel.
#[derive(Clone)]
pub struct AggregationWorker {
    sender: mpsc::Sender<Envelope>,
}

impl AggregationWorker {
    /// Must be called from within a tokio runtime.
    pub fn spawn() -> Self {
        let (sender, mut receiver) = mpsc::channel::<Envelope>(8);
        tokio::task::spawn_blocking(move || {
            while let Some((request, reply)) = receiver.blocking_recv() {
                let _ = reply.send(aggregate(&request));
            }
            debug!("aggregation worker stopped");
        });
        Self { sender }
    }

    pub async fn submit(&self, request: AggregationRequest) -> Result<AggregationResponse, WorkerError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send((request, reply))
            .await
            .map_err(|_| WorkerError::Closed)?;
        response.await.map_err(|_| WorkerError::Dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> AggregationRequest {
        serde_json::from_value(json!({
            "database": {
                "KSA_Widget": { "data": [
                    { "First message date": "2024-01-01 09:00:00", "Country": "KSA", "Sentiment": "Positive", "C-sat": "5" },
                    { "First message date": "2024-01-02 09:00:00", "Country": "KSA", "Sentiment": "Negative", "C-sat": "2", "Recommendation": "Live agent" },
                    { "First message date": "2024-01-03 09:00:00", "Country": "KSA", "Sentiment": "Neutral", "Requested Agent": "Yes" },
                    { "First message date": "2024-01-04 09:00:00", "Country": "KSA-Jeddah", "Sentiment": "negative", "C-sat": "1", "Recommendation": "Live agent" },
                    { "First message date": "2024-01-05 09:00:00", "Country": "KSA", "Sentiment": "Positive" }
                ]}
            },
            "filterParams": {
                "countryVal": "KSA",
                "sourceVal": "Widget",
                "startVal": "2024-01-02",
                "endVal": "2024-01-04",
                "isCompare": true,
                "isCsatOnly": false,
                "isTestMode": false
            }
        }))
        .unwrap()
    }

    #[test]
    fn scenario_window_produces_full_message() {
        let response = aggregate(&request());

        assert_eq!(response.filtered_data.len(), 3);
        assert_eq!(response.kpi_data.total, 3);
        assert_eq!(response.kpi_data.prev_total, 1);
        assert_eq!(response.kpi_data.escalated, 1);
        assert_eq!(response.kpi_data.negative, 2);
        assert_eq!(
            response.current_recommendations,
            vec![("Live agent".to_string(), 2)]
        );
        assert_eq!(response.chart_data.csat_buckets["Negative"], [0, 1, 0, 0, 0]);
    }

    #[test]
    fn response_uses_dashboard_field_names() {
        let value = serde_json::to_value(aggregate(&request())).unwrap();
        let object = value.as_object().unwrap();
        let keys: Vec<&str> = object.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["filteredData", "kpiData", "chartData", "currentRecommendations"]
        );
        assert!(value["kpiData"]["sentimentPcts"]["pPct"].is_string());
        assert!(value["chartData"]["issuesLandscapeCounts"].is_array());
        assert_eq!(value["currentRecommendations"][0][0], "Live agent");
    }

    #[test]
    fn repeated_passes_are_byte_identical() {
        let request = request();
        let first = serde_json::to_string(&aggregate(&request)).unwrap();
        let second = serde_json::to_string(&aggregate(&request)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn raw_rows_are_used_without_a_database() {
        let mut request = request();
        let rows = request.database.take().unwrap().remove("KSA_Widget").unwrap().data;
        request.raw_data = Some(rows);

        assert_eq!(aggregate(&request).kpi_data.total, 3);
    }

    #[tokio::test]
    async fn worker_round_trips_a_request() {
        let worker = AggregationWorker::spawn();
        let response = worker.submit(request()).await.unwrap();
        assert_eq!(response, aggregate(&request()));
    }
}
