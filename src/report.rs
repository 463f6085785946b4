use std::fmt::Write;

use crate::charts::SENTIMENT_ORDER;
use crate::fields::ISSUE_FIELDS;
use crate::models::{AggregationResult, FilterSpec};

pub fn build_report(spec: &FilterSpec, result: &AggregationResult) -> String {
    let kpi = &result.kpi_data;
    let charts = &result.chart_data;
    let mut output = String::new();

    let _ = writeln!(output, "# Ticket Dashboard");
    let _ = writeln!(
        output,
        "Generated for {} / {} ({} to {}){}",
        spec.country,
        spec.source,
        spec.start_date,
        spec.end_date,
        if spec.csat_only_enabled {
            ", C-sat responses only"
        } else {
            ""
        }
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Tickets: {}", kpi.total);
    if kpi.is_compare {
        let _ = writeln!(output, "- Previous period: {}", kpi.prev_total);
    }
    let _ = writeln!(output, "- Escalated: {} ({})", kpi.escalated, kpi.esc_rate);
    let _ = writeln!(
        output,
        "- Sentiment: {} positive ({}), {} negative ({}), {} neutral ({})",
        kpi.positive,
        kpi.sentiment_pcts.positive,
        kpi.negative,
        kpi.sentiment_pcts.negative,
        kpi.neutral,
        kpi.sentiment_pcts.neutral
    );
    let _ = writeln!(output, "- Avg messages: {}", kpi.avg_msgs);
    let _ = writeln!(
        output,
        "- Avg C-sat: {} (response rate {})",
        kpi.avg_csat, kpi.csat_response_rate
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Issues");
    for (field, count) in ISSUE_FIELDS.iter().zip(charts.issues_landscape_counts) {
        let _ = writeln!(output, "- {field}: {count}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Daily Volume");
    if charts.sorted_dates.is_empty() {
        let _ = writeln!(output, "No tickets in this window.");
    } else {
        for (date, count) in charts.sorted_dates.iter().zip(&charts.vol_data) {
            let _ = writeln!(output, "- {date}: {count}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Intents");
    for (intent, count) in &charts.sorted_intents {
        let _ = writeln!(output, "- {intent}: {count}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## C-sat by Sentiment");
    let _ = writeln!(output, "| Sentiment | 1 | 2 | 3 | 4 | 5 |");
    let _ = writeln!(output, "|---|---|---|---|---|---|");
    for sentiment in SENTIMENT_ORDER {
        if let Some(bucket) = charts.csat_buckets.get(sentiment) {
            let cells: Vec<String> = bucket.iter().map(|count| count.to_string()).collect();
            let _ = writeln!(output, "| {} | {} |", sentiment, cells.join(" | "));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendations (negative tickets)");
    if result.current_recommendations.is_empty() {
        let _ = writeln!(output, "No recommendations recorded for this window.");
    } else {
        for (recommendation, count) in result.current_recommendations.iter().take(10) {
            let _ = writeln!(output, "- {recommendation} ({count})");
        }
    }

    output
}
