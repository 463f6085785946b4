use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::IngestError;
use crate::models::Record;

pub fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Reads tickets from a `.csv` file or, for any other extension, a JSON array.
pub fn load_tickets(path: &Path) -> Result<Vec<Record>, IngestError> {
    let text = std::fs::read_to_string(path)?;
    let tickets = if is_csv(path) {
        parse_csv(&text)?
    } else {
        parse_json(&text)?
    };
    debug!(path = %path.display(), tickets = tickets.len(), "ticket file loaded");
    Ok(tickets)
}

pub fn parse_json(text: &str) -> Result<Vec<Record>, IngestError> {
    let Value::Array(items) = serde_json::from_str::<Value>(text)? else {
        return Err(IngestError::NotAnArray);
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(record) => Ok(record),
            _ => Err(IngestError::NotARecord { index }),
        })
        .collect()
}

/// Header row names the fields. Quoted cells may hold commas and newlines;
/// short rows simply omit the trailing fields.
pub fn parse_csv(text: &str) -> Result<Vec<Record>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();
    let mut tickets = Vec::new();

    for result in reader.records() {
        let row = result?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(header, value)| (header.to_string(), Value::String(value.to_string())))
            .collect();
        tickets.push(record);
    }

    Ok(tickets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn quoted_comma_stays_in_one_field() {
        let tickets = parse_csv("ticket_id,message\n1,\"hello, world\"\n").unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0]["message"], "hello, world");
        assert_eq!(tickets[0].len(), 2);
    }

    #[test]
    fn quoted_newline_stays_in_one_record() {
        let tickets =
            parse_csv("ticket_id,message\n1,\"line one\nline two\"\n2,plain\n").unwrap();
        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[0]["message"], "line one\nline two");
        assert_eq!(tickets[1]["ticket_id"], "2");
    }

    #[test]
    fn header_order_is_kept() {
        let tickets = parse_csv("zeta,alpha\n1,2\n").unwrap();
        let keys: Vec<&str> = tickets[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn json_must_be_an_array_of_objects() {
        assert_eq!(parse_json(r#"[{"ticket_id": 1}]"#).unwrap().len(), 1);
        assert!(matches!(
            parse_json(r#"{"ticket_id": 1}"#),
            Err(IngestError::NotAnArray)
        ));
        assert!(matches!(
            parse_json(r#"[{"ticket_id": 1}, 2]"#),
            Err(IngestError::NotARecord { index: 1 })
        ));
        assert!(matches!(parse_json("not json"), Err(IngestError::Json(_))));
    }

    #[test]
    fn extension_picks_the_parser() {
        let mut file = tempfile::Builder::new().suffix(".CSV").tempfile().unwrap();
        write!(file, "ticket_id,message\n7,\"a, b\"\n").unwrap();
        let tickets = load_tickets(file.path()).unwrap();
        assert_eq!(tickets[0]["message"], "a, b");

        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"[{{"ticket_id": 7}}]"#).unwrap();
        let tickets = load_tickets(file.path()).unwrap();
        assert_eq!(tickets[0]["ticket_id"], 7);
    }
}
