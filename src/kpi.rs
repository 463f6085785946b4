use crate::fields;
use crate::models::{KpiSnapshot, Record, SentimentPcts};

pub const NO_VALUE: &str = "-";

/// Fixed-decimal formatting with halves rounded up, as dashboards display it.
pub fn fixed(value: f64, decimals: usize) -> String {
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round() / factor;
    format!("{rounded:.decimals$}")
}

pub fn percent(part: f64, total: usize, decimals: usize) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    format!("{}%", fixed(part / total as f64 * 100.0, decimals))
}

fn mean_label(values: &[i64]) -> String {
    if values.is_empty() {
        return NO_VALUE.to_string();
    }
    let sum: i128 = values.iter().map(|&value| i128::from(value)).sum();
    fixed(sum as f64 / values.len() as f64, 1)
}

pub fn compute(filtered: &[&Record], prev_total: usize, is_compare: bool) -> KpiSnapshot {
    let total = filtered.len();

    let escalated = filtered
        .iter()
        .filter(|record| fields::equals_ignore_case(record, fields::REQUESTED_AGENT, "yes"))
        .count();
    let positive = filtered
        .iter()
        .filter(|record| fields::equals_ignore_case(record, fields::SENTIMENT, "positive"))
        .count();
    let negative = filtered
        .iter()
        .filter(|record| fields::equals_ignore_case(record, fields::SENTIMENT, "negative"))
        .count();
    let neutral = total as i64 - positive as i64 - negative as i64;

    let sentiment_pcts = if total > 0 {
        SentimentPcts {
            positive: percent(positive as f64, total, 0),
            negative: percent(negative as f64, total, 0),
            neutral: percent(neutral as f64, total, 0),
        }
    } else {
        SentimentPcts::default()
    };

    let message_counts: Vec<i64> = filtered
        .iter()
        .filter_map(|record| fields::int(record, fields::MESSAGE_COUNT))
        .collect();
    let csat_scores: Vec<i64> = filtered
        .iter()
        .filter_map(|record| fields::csat_score(record))
        .collect();

    let issues = fields::ISSUE_FIELDS.map(|field| {
        filtered
            .iter()
            .filter(|record| fields::is_meaningful(record, field))
            .count()
    });

    KpiSnapshot {
        total,
        prev_total,
        escalated,
        esc_rate: percent(escalated as f64, total, 1),
        positive,
        negative,
        neutral,
        sentiment_pcts,
        avg_msgs: mean_label(&message_counts),
        avg_csat: mean_label(&csat_scores),
        csat_response_rate: percent(csat_scores.len() as f64, total, 1),
        bot_issue_count: issues[0],
        website_issue_count: issues[1],
        reason_not_buying_count: issues[2],
        angry_reason_count: issues[3],
        device_quality_count: issues[4],
        pricing_topic_count: issues[5],
        is_compare,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: Vec<serde_json::Value>) -> Vec<Record> {
        values
            .into_iter()
            .map(|value| value.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn empty_input_uses_sentinels() {
        let kpi = compute(&[], 4, true);
        assert_eq!(kpi.total, 0);
        assert_eq!(kpi.prev_total, 4);
        assert_eq!(kpi.esc_rate, "0%");
        assert_eq!(kpi.sentiment_pcts, SentimentPcts::default());
        assert_eq!(kpi.avg_msgs, NO_VALUE);
        assert_eq!(kpi.avg_csat, NO_VALUE);
        assert_eq!(kpi.csat_response_rate, "0%");
        assert!(kpi.is_compare);
    }

    #[test]
    fn sentiment_and_escalation_are_case_insensitive() {
        let data = rows(vec![
            json!({ "Sentiment": "Positive", "Requested Agent": "YES" }),
            json!({ "Sentiment": "negative", "Requested Agent": "no" }),
            json!({ "Sentiment": "NEGATIVE" }),
            json!({ "Sentiment": "Mixed" }),
        ]);
        let refs: Vec<&Record> = data.iter().collect();
        let kpi = compute(&refs, 0, false);

        assert_eq!(kpi.escalated, 1);
        assert_eq!(kpi.esc_rate, "25.0%");
        assert_eq!(kpi.positive, 1);
        assert_eq!(kpi.negative, 2);
        assert_eq!(kpi.neutral, 1);
        assert_eq!(
            kpi.positive as i64 + kpi.negative as i64 + kpi.neutral,
            kpi.total as i64
        );
        assert_eq!(kpi.sentiment_pcts.positive, "25%");
        assert_eq!(kpi.sentiment_pcts.negative, "50%");
        assert_eq!(kpi.sentiment_pcts.neutral, "25%");
    }

    #[test]
    fn averages_skip_unparseable_values() {
        let data = rows(vec![
            json!({ "alhena_msgs": "4", "C-sat": "5" }),
            json!({ "alhena_msgs": 7, "C-sat": 2 }),
            json!({ "alhena_msgs": "many", "C-sat": "0" }),
            json!({}),
        ]);
        let refs: Vec<&Record> = data.iter().collect();
        let kpi = compute(&refs, 0, false);

        assert_eq!(kpi.avg_msgs, "5.5");
        assert_eq!(kpi.avg_csat, "3.5");
        assert_eq!(kpi.csat_response_rate, "50.0%");
    }

    #[test]
    fn huge_counts_do_not_overflow_the_average() {
        let data = rows(vec![
            json!({ "alhena_msgs": "9223372036854775807" }),
            json!({ "alhena_msgs": "9223372036854775807" }),
            json!({ "alhena_msgs": "5" }),
        ]);
        let refs: Vec<&Record> = data.iter().collect();
        let kpi = compute(&refs, 0, false);

        let average: f64 = kpi.avg_msgs.parse().unwrap();
        assert!(average > 6.0e18);
    }

    #[test]
    fn issue_counts_follow_field_order() {
        let data = rows(vec![
            json!({ "Bot category": "Loop", "pricing_category": "Discount" }),
            json!({ "Bot category": "na", "anger_category": "Late delivery" }),
        ]);
        let refs: Vec<&Record> = data.iter().collect();
        let kpi = compute(&refs, 0, false);
        assert_eq!(kpi.issue_counts(), [1, 0, 0, 1, 0, 1]);
    }

    #[test]
    fn halves_round_up_in_percentages() {
        assert_eq!(percent(1.0, 8, 0), "13%");
        assert_eq!(percent(2.0, 3, 1), "66.7%");
        assert_eq!(fixed(2.25, 1), "2.3");
    }

    // Positive and negative can exceed the total only through inconsistent
    // counting upstream; the neutral figure is reported as is.
    #[test]
    fn neutral_is_not_clamped() {
        assert_eq!(percent(-1.0, 4, 0), "-25%");
        let data = rows(vec![json!({ "Sentiment": "positive" })]);
        let refs: Vec<&Record> = data.iter().collect();
        let kpi = compute(&refs, 0, false);
        assert_eq!(kpi.neutral, 0);
    }
}
