//! Output formatting for tool responses
//!
//! Tools answer in markdown by default and JSON on request. Budget amounts
//! arrive from the API in cents; insight ratios as fractions.

use serde_json::{json, Value};

/// Format a cent amount as currency, with thousands separators.
pub fn format_currency(amount: &Value) -> String {
    format_currency_with(amount, "USD")
}

/// Format a cent amount in an explicit currency.
pub fn format_currency_with(amount: &Value, currency: &str) -> String {
    match numeric(amount) {
        Some(cents) => format!("{currency} {}", with_thousands(cents / 100.0, 2)),
        None => display(amount),
    }
}

/// Format a number with thousands separators.
pub fn format_number(value: &Value) -> String {
    match numeric(value) {
        Some(n) if n == n.trunc() => with_thousands(n, 0),
        Some(n) => with_thousands(n, 2),
        None if value.is_null() => "0".to_string(),
        None => display(value),
    }
}

/// Format a fraction as a percentage.
pub fn format_percentage(value: &Value) -> String {
    match numeric(value) {
        Some(n) => format!("{:.2}%", n * 100.0),
        None if value.is_null() => "0.00%".to_string(),
        None => display(value),
    }
}

/// Build a markdown table from JSON object rows.
///
/// `columns` pairs each row key with its display header, in order.
pub fn markdown_table(rows: &[Value], columns: &[(&str, &str)]) -> String {
    if rows.is_empty() {
        return "_No data_".to_string();
    }

    let header: Vec<&str> = columns.iter().map(|(_, h)| *h).collect();
    let mut lines = vec![
        format!("| {} |", header.join(" | ")),
        format!("| {} |", columns.iter().map(|_| "---").collect::<Vec<_>>().join(" | ")),
    ];
    for row in rows {
        let cells: Vec<String> =
            columns.iter().map(|(key, _)| display(row.get(*key).unwrap_or(&Value::Null))).collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }
    lines.join("\n")
}

/// Pagination metadata for locally windowed listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub total: usize,
    pub count: usize,
    pub offset: usize,
    pub has_more: bool,
}

impl PageInfo {
    pub fn to_json(&self) -> Value {
        json!({
            "total": self.total,
            "count": self.count,
            "offset": self.offset,
            "has_more": self.has_more,
        })
    }
}

/// Apply offset/limit windowing to an aggregated listing.
pub fn paginate_local(items: Vec<Value>, limit: usize, offset: usize) -> (Vec<Value>, PageInfo) {
    let total = items.len();
    let page: Vec<Value> = items.into_iter().skip(offset).take(limit).collect();
    let info = PageInfo {
        total,
        count: page.len(),
        offset,
        has_more: offset + limit < total,
    };
    (page, info)
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Render a JSON value as a bare cell string (no quotes around strings).
fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn with_thousands(n: f64, decimals: usize) -> String {
    let negative = n < 0.0;
    let formatted = format!("{:.*}", decimals, n.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (formatted, None),
    };

    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(&frac);
    }
    out
}
