//! Data-shape classification: decides whether a decoded reply is shown as a
//! table, a numeric chart, an image or plain text, and extracts the
//! normalized structure for that view.
//!
//! Precedence is image, then numeric series, then table, then text. A list of
//! 3- or 4-element numeric rows nested one level deeper (`[[[r,g,b],..],..]`)
//! is a color image; a list of plain numeric rows is a grayscale image.

use serde_json::{Map, Value};

/// Shape category with its normalized data.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Table(Table),
    NumericSeries(Vec<f64>),
    MatrixImage(Image),
    Text(String),
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Table(_) => ShapeKind::Table,
            Shape::NumericSeries(_) => ShapeKind::NumericSeries,
            Shape::MatrixImage(_) => ShapeKind::MatrixImage,
            Shape::Text(_) => ShapeKind::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Table,
    NumericSeries,
    MatrixImage,
    Text,
}

/// Row-major table. `None` marks a value missing from that row.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<Value>>>,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cell text for display; missing and null values render empty.
    pub fn cell_text(&self, row: usize, col: usize) -> String {
        match self.rows.get(row).and_then(|r| r.get(col)) {
            Some(Some(Value::Null)) | Some(None) | None => String::new(),
            Some(Some(Value::String(s))) => s.clone(),
            Some(Some(other)) => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Image {
    Grayscale(GrayImage),
    Color(ColorImage),
}

impl Image {
    /// `(rows, cols)`; `cols` is the widest row.
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            Image::Grayscale(g) => (g.rows, g.cols),
            Image::Color(c) => (c.rows, c.cols),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrayImage {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<Vec<f64>>,
}

impl GrayImage {
    /// Map every value to 0..=255 by min/max normalization. A flat image maps
    /// to mid-gray. Short rows are padded with the minimum.
    pub fn levels(&self) -> Vec<Vec<u8>> {
        let (min, max) = self
            .values
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        let range = max - min;
        self.values
            .iter()
            .map(|row| {
                (0..self.cols)
                    .map(|c| {
                        let v = row.get(c).copied().unwrap_or(min);
                        if range > 0.0 {
                            (((v - min) / range) * 255.0).round() as u8
                        } else {
                            128
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorImage {
    pub rows: usize,
    pub cols: usize,
    pub pixels: Vec<Vec<Vec<f64>>>,
}

impl ColorImage {
    /// RGBA bytes with channels clamped to 0..=255; alpha defaults to opaque.
    pub fn rgba(&self) -> Vec<Vec<[u8; 4]>> {
        let channel = |v: f64| v.clamp(0.0, 255.0).round() as u8;
        self.pixels
            .iter()
            .map(|row| {
                (0..self.cols)
                    .map(|c| match row.get(c) {
                        Some(px) => [
                            channel(px[0]),
                            channel(px[1]),
                            channel(px[2]),
                            px.get(3).map_or(255, |a| channel(*a)),
                        ],
                        None => [0, 0, 0, 255],
                    })
                    .collect()
            })
            .collect()
    }
}

/// Classify a decoded value.
pub fn classify(value: &Value) -> Shape {
    if let Some(image) = color_image(value) {
        return Shape::MatrixImage(Image::Color(image));
    }
    if let Some(image) = gray_image(value) {
        return Shape::MatrixImage(Image::Grayscale(image));
    }
    if let Some(series) = numeric_series(value) {
        return Shape::NumericSeries(series);
    }
    if let Some(table) = table(value) {
        return Shape::Table(table);
    }
    Shape::Text(render_text(value))
}

fn finite(value: &Value) -> Option<f64> {
    value.as_f64().filter(|f| f.is_finite())
}

fn numeric_series(value: &Value) -> Option<Vec<f64>> {
    let items = value.as_array().filter(|a| !a.is_empty())?;
    items.iter().map(finite).collect()
}

fn gray_image(value: &Value) -> Option<GrayImage> {
    let rows = value.as_array().filter(|a| !a.is_empty())?;
    let values: Vec<Vec<f64>> = rows
        .iter()
        .map(|row| row.as_array()?.iter().map(finite).collect::<Option<Vec<_>>>())
        .collect::<Option<_>>()?;
    let cols = values.iter().map(Vec::len).max().unwrap_or(0);
    if cols == 0 {
        return None;
    }
    Some(GrayImage {
        rows: values.len(),
        cols,
        values,
    })
}

fn color_image(value: &Value) -> Option<ColorImage> {
    let rows = value.as_array().filter(|a| !a.is_empty())?;
    let pixels: Vec<Vec<Vec<f64>>> = rows
        .iter()
        .map(|row| {
            row.as_array()?
                .iter()
                .map(|px| {
                    let channels = px.as_array().filter(|c| c.len() == 3 || c.len() == 4)?;
                    channels.iter().map(finite).collect::<Option<Vec<_>>>()
                })
                .collect::<Option<Vec<_>>>()
        })
        .collect::<Option<_>>()?;
    let cols = pixels.iter().map(Vec::len).max().unwrap_or(0);
    if cols == 0 {
        return None;
    }
    Some(ColorImage {
        rows: pixels.len(),
        cols,
        pixels,
    })
}

/// Table extraction for record lists and column dictionaries.
pub fn table(value: &Value) -> Option<Table> {
    match value {
        Value::Array(items) => record_table(items),
        Value::Object(map) => column_table(map),
        _ => None,
    }
}

fn record_table(items: &[Value]) -> Option<Table> {
    if items.is_empty() {
        return None;
    }
    let records: Vec<&Map<String, Value>> =
        items.iter().map(Value::as_object).collect::<Option<_>>()?;
    let columns = union_keys(records.iter().copied());
    let rows = records
        .iter()
        .map(|rec| columns.iter().map(|c| rec.get(c).cloned()).collect())
        .collect();
    Some(Table { columns, rows })
}

fn column_table(map: &Map<String, Value>) -> Option<Table> {
    if map.is_empty() {
        return None;
    }
    let columns: Vec<&Vec<Value>> = map.values().map(Value::as_array).collect::<Option<_>>()?;
    let len = columns[0].len();
    if columns.iter().any(|c| c.len() != len) {
        return None;
    }
    let rows = (0..len)
        .map(|i| columns.iter().map(|c| Some(c[i].clone())).collect())
        .collect();
    Some(Table {
        columns: map.keys().cloned().collect(),
        rows,
    })
}

/// Union of record keys in first-seen order.
pub fn union_keys<'a>(records: impl IntoIterator<Item = &'a Map<String, Value>>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for rec in records {
        for key in rec.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// Best-effort text for the text view: objects pretty-printed, long arrays
/// cut to a five-item sample.
pub fn render_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(items) if items.is_empty() => "[]".to_string(),
        Value::Array(items) if items.len() <= 10 => pretty(value),
        Value::Array(items) => format!(
            "[{} items] {}...",
            items.len(),
            pretty(&Value::Array(items[..5].to_vec()))
        ),
        Value::Object(_) => pretty(value),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Whether a successful result is worth sending to the visualization sink:
/// plain scalars, empty lists and lists of nulls are not.
pub fn is_display_worthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => false,
        Value::Array(items) => !items.is_empty() && !items.iter().all(Value::is_null),
        Value::Object(_) => true,
    }
}
