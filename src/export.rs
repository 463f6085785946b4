use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

pub fn render(results: &[Value], format: ExportFormat) -> anyhow::Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(results)?),
        ExportFormat::Csv => to_csv(results),
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Header from the first record's keys; every cell quoted.
pub fn to_csv(results: &[Value]) -> anyhow::Result<String> {
    let Some(Value::Object(first)) = results.first() else {
        return Ok(String::new());
    };
    let headers: Vec<&String> = first.keys().collect();

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());
    writer.write_record(headers.iter().map(|header| header.as_str()))?;

    for result in results {
        let row: Vec<String> = headers
            .iter()
            .map(|header| cell(result.get(header.as_str())))
            .collect();
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}
