//! Console text rendering of results: aligned grids for tables and 2-D
//! lists, summaries for large arrays, one-line summaries for collapsed
//! entries, and the preview/auto-expand decision.

use serde_json::Value;

use crate::messages::display_scalar;

/// Arrays with more elements than this render as a summary.
const SUMMARY_THRESHOLD: usize = 30;
const MAX_ROWS: usize = 50;
const MAX_COLS: usize = 20;
const MAX_CELL_WIDTH: usize = 30;

const RESULT_EXPAND_CHARS: usize = 240;
const RESULT_EXPAND_LINES: usize = 6;
const ERROR_EXPAND_CHARS: usize = 240;
const ERROR_EXPAND_LINES: usize = 3;
const PREVIEW_CHARS: usize = 320;
const PREVIEW_LINES: usize = 8;
const ELLIPSIS: &str = "...";

/// Full console rendering of a reply value.
pub fn format_result(value: &Value) -> String {
    match value {
        Value::Array(_) => format_array(value, 0),
        Value::Object(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        other => display_scalar(other),
    }
}

fn count_elements(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.iter().map(count_elements).sum(),
        _ => 1,
    }
}

fn shape_of(value: &Value) -> Vec<usize> {
    let mut shape = Vec::new();
    let mut cur = value;
    while let Value::Array(items) = cur {
        shape.push(items.len());
        match items.first() {
            Some(first) => cur = first,
            None => break,
        }
    }
    shape
}

fn flatten_numbers(value: &Value, out: &mut Vec<f64>) {
    match value {
        Value::Array(items) => items.iter().for_each(|v| flatten_numbers(v, out)),
        other => {
            if let Some(f) = other.as_f64().filter(|f| f.is_finite()) {
                out.push(f);
            }
        }
    }
}

fn is_record(value: &Value) -> bool {
    value.is_object()
}

fn mean_std(nums: &[f64]) -> (f64, f64) {
    let n = nums.len() as f64;
    let mean = nums.iter().sum::<f64>() / n;
    let variance = nums.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn min_max(nums: &[f64]) -> (f64, f64) {
    nums.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
}

fn truncate_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        _ => "object",
    }
}

fn table_summary(rows: &[Value]) -> String {
    let Some(first) = rows.first().and_then(Value::as_object) else {
        return "Empty table".to_string();
    };
    let columns: Vec<&String> = first.keys().collect();
    let names: Vec<&str> = columns.iter().map(|c| c.as_str()).collect();
    let mut summary = vec![
        format!(
            "Table Summary ({} rows, {} columns)",
            rows.len(),
            columns.len()
        ),
        format!("Columns: {}", names.join(", ")),
    ];

    for col in columns {
        let values: Vec<&Value> = rows
            .iter()
            .filter_map(|r| r.get(col.as_str()))
            .filter(|v| !v.is_null())
            .collect();
        let null_count = rows.len() - values.len();
        if values.is_empty() {
            summary.push(format!("  {}: all null/undefined", col));
            continue;
        }

        let mut types: Vec<&str> = Vec::new();
        for v in &values {
            let t = type_name(v);
            if !types.contains(&t) {
                types.push(t);
            }
        }
        let type_str = types.join("|");

        let nums: Vec<f64> = values
            .iter()
            .filter_map(|v| v.as_f64().filter(|f| f.is_finite()))
            .collect();
        if !nums.is_empty() {
            let (min, max) = min_max(&nums);
            let (mean, std) = mean_std(&nums);
            summary.push(format!(
                "  {} ({}): min={:.2}, max={:.2}, mean={:.2}, std={:.2}",
                col, type_str, min, max, mean, std
            ));
        } else {
            let mut unique: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            unique.sort();
            unique.dedup();
            let sample: Vec<String> = values
                .iter()
                .take(3)
                .map(|v| truncate_chars(&display_scalar(v), 20))
                .collect();
            summary.push(format!(
                "  {} ({}): {} unique values, sample: {}{}",
                col,
                type_str,
                unique.len(),
                sample.join(", "),
                if sample.len() < values.len() { "..." } else { "" }
            ));
        }

        if null_count > 0 {
            summary.push(format!(
                "    nulls: {}/{} ({:.1}%)",
                null_count,
                rows.len(),
                null_count as f64 / rows.len() as f64 * 100.0
            ));
        }
    }
    summary.join("\n")
}

fn matrix_summary(rows: &[Value]) -> String {
    if rows.is_empty() {
        return "Empty matrix".to_string();
    }
    let row_slices: Vec<&[Value]> = rows
        .iter()
        .map(|r| r.as_array().map(Vec::as_slice).unwrap_or(&[]))
        .collect();
    let n_rows = row_slices.len();
    let n_cols = row_slices[0].len();
    let mut summary = vec![format!("Matrix Summary ({} rows × {} columns)", n_rows, n_cols)];

    let all: Vec<&Value> = row_slices.iter().flat_map(|r| r.iter()).collect();
    let nums: Vec<f64> = all
        .iter()
        .filter_map(|v| v.as_f64().filter(|f| f.is_finite()))
        .collect();
    if !nums.is_empty() {
        let (min, max) = min_max(&nums);
        let (mean, std) = mean_std(&nums);
        summary.push(format!(
            "  Numeric stats: min={:.4}, max={:.4}, mean={:.4}, std={:.4}",
            min, max, mean, std
        ));
    }

    let null_count = all.iter().filter(|v| v.is_null()).count();
    let total = n_rows * n_cols;
    if null_count > 0 && total > 0 {
        summary.push(format!(
            "  Nulls: {}/{} ({:.1}%)",
            null_count,
            total,
            null_count as f64 / total as f64 * 100.0
        ));
    }

    let sample_rows = n_rows.min(3);
    let sample_cols = n_cols.min(5);
    if sample_rows < n_rows || sample_cols < n_cols {
        summary.push(format!("  Sample ({}×{}):", sample_rows, sample_cols));
        for row in row_slices.iter().take(sample_rows) {
            let cells: Vec<String> = row
                .iter()
                .take(sample_cols)
                .map(|v| truncate_chars(&display_scalar(v), 8))
                .collect();
            summary.push(format!(
                "    [{}{}]",
                cells.join(", "),
                if sample_cols < n_cols { "..." } else { "" }
            ));
        }
        if sample_rows < n_rows {
            summary.push("    ...".to_string());
        }
    }
    summary.join("\n")
}

fn array_summary(value: &Value, total: usize) -> String {
    let shape = shape_of(value);
    let mut nums = Vec::new();
    flatten_numbers(value, &mut nums);
    let (mean, std) = if nums.is_empty() {
        ("n/a".to_string(), "n/a".to_string())
    } else {
        let (m, s) = mean_std(&nums);
        (format!("{:.4}", m), format!("{:.4}", s))
    };
    let dims: Vec<String> = shape.iter().map(usize::to_string).collect();
    [
        format!("{}D array summary", shape.len()),
        format!("shape : {}", dims.join(" x ")),
        format!("size  : {}", total),
        format!("mean  : {}", mean),
        format!("std   : {}", std),
    ]
    .join("\n")
}

fn format_array(value: &Value, depth: usize) -> String {
    let indent = "  ".repeat(depth);
    let Value::Array(items) = value else {
        return format!("{}{}", indent, display_scalar(value));
    };

    let total = count_elements(value);
    if depth == 0 && total > SUMMARY_THRESHOLD {
        if !items.is_empty() && items.iter().all(is_record) {
            return table_summary(items);
        }
        if shape_of(value).len() == 2 && items.iter().all(Value::is_array) {
            return matrix_summary(items);
        }
        return array_summary(value, total);
    }

    if depth == 0 && !items.is_empty() && items.iter().all(is_record) {
        return grid(&record_rows(items), &indent);
    }

    if items.iter().all(|v| !v.is_array()) {
        let parts: Vec<String> = items.iter().map(join_part).collect();
        return format!("{}{}", indent, parts.join(" "));
    }

    let is_2d = items.iter().all(|row| {
        row.as_array()
            .is_some_and(|cells| cells.iter().all(|c| !c.is_array()))
    });
    if is_2d {
        let rows: Vec<Vec<String>> = items
            .iter()
            .map(|row| {
                row.as_array()
                    .map(|cells| cells.iter().map(grid_cell).collect())
                    .unwrap_or_default()
            })
            .collect();
        return grid(&rows, &indent);
    }

    items
        .iter()
        .map(|sub| format_array(sub, depth + 1))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn join_part(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => display_scalar(other),
    }
}

fn grid_cell(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        other => display_scalar(other),
    }
}

/// Header row plus one text row per record; nested values shown as
/// `[...]`/`{...}`, missing and null values empty.
fn record_rows(records: &[Value]) -> Vec<Vec<String>> {
    let headers = crate::classify::union_keys(records.iter().filter_map(Value::as_object));
    let mut rows = vec![headers.clone()];
    for rec in records {
        rows.push(
            headers
                .iter()
                .map(|h| match rec.get(h.as_str()) {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::Array(_)) => "[...]".to_string(),
                    Some(Value::Object(_)) => "{...}".to_string(),
                    Some(other) => display_scalar(other),
                })
                .collect(),
        );
    }
    rows
}

/// Left-aligned grid, two spaces between columns, with the truncation footer
/// when rows, columns or cells were cut.
fn grid(rows: &[Vec<String>], indent: &str) -> String {
    let original_rows = rows.len();
    let original_cols = rows.first().map_or(0, Vec::len);
    let rows_truncated = original_rows > MAX_ROWS;
    let cols_truncated = original_cols > MAX_COLS;

    let mut cell_truncated = false;
    let shown: Vec<Vec<String>> = rows
        .iter()
        .take(MAX_ROWS)
        .map(|row| {
            row.iter()
                .take(MAX_COLS)
                .map(|cell| {
                    if cell.chars().count() > MAX_CELL_WIDTH {
                        cell_truncated = true;
                        format!("{}...", truncate_chars(cell, MAX_CELL_WIDTH - 3))
                    } else {
                        cell.clone()
                    }
                })
                .collect()
        })
        .collect();

    let n_cols = shown.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..n_cols)
        .map(|c| {
            shown
                .iter()
                .filter_map(|r| r.get(c))
                .map(|s| s.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out: Vec<String> = shown
        .iter()
        .map(|row| {
            let line = row
                .iter()
                .enumerate()
                .map(|(c, cell)| format!("{:<width$}", cell, width = widths[c]))
                .collect::<Vec<_>>()
                .join("  ");
            format!("{}{}", indent, line.trim_end())
        })
        .collect();

    if rows_truncated || cols_truncated || cell_truncated {
        let mut parts = Vec::new();
        if rows_truncated || cols_truncated {
            parts.push(format!(
                "dims {}x{} of {}x{}",
                shown.len(),
                shown.first().map_or(0, Vec::len),
                original_rows,
                original_cols
            ));
        }
        if cell_truncated {
            parts.push("some cells truncated".to_string());
        }
        out.push(format!(
            "{}... (output truncated: {}) ...",
            indent,
            parts.join(", ")
        ));
    }
    out.join("\n")
}

/// One-line description used when an entry is collapsed.
pub fn summary_line(value: &Value) -> String {
    match value {
        Value::Array(items) if items.is_empty() => "Empty Array".to_string(),
        Value::Array(items) if items.iter().all(is_record) => {
            format!("Table ({} rows)", items.len())
        }
        Value::Array(items) => format!("Array({})", items.len()),
        Value::Null => "null".to_string(),
        Value::Object(map) if map.is_empty() => "Empty Object".to_string(),
        Value::Object(map) => format!("Object ({} properties)", map.len()),
        other => {
            let s = display_scalar(other);
            if s.chars().count() > 50 {
                format!("{}...", truncate_chars(&s, 50))
            } else {
                s
            }
        }
    }
}

/// Text shown for an entry before it is expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub text: String,
    pub truncated: bool,
}

fn fits(text: &str, max_chars: usize, max_lines: usize) -> bool {
    text.chars().count() <= max_chars && text.lines().count() <= max_lines
}

/// A result starts expanded when its rendering is short.
pub fn auto_expand_result(text: &str) -> bool {
    fits(text, RESULT_EXPAND_CHARS, RESULT_EXPAND_LINES)
}

/// An error starts expanded when its text is short.
pub fn auto_expand_error(text: &str) -> bool {
    fits(text, ERROR_EXPAND_CHARS, ERROR_EXPAND_LINES)
}

/// At most eight lines and 320 characters, ending in `...` when cut.
pub fn preview(text: &str) -> Preview {
    let lines: Vec<&str> = text.lines().collect();
    let mut truncated = lines.len() > PREVIEW_LINES;
    let mut body = lines
        .iter()
        .take(PREVIEW_LINES)
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    if truncated || body.chars().count() > PREVIEW_CHARS {
        truncated = true;
        let keep = PREVIEW_CHARS - ELLIPSIS.len();
        body = truncate_chars(&body, keep);
        body.push_str(ELLIPSIS);
    }
    Preview {
        text: body,
        truncated,
    }
}
