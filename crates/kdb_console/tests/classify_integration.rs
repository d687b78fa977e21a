//! Shape classification, engine-error detection, request framing and text
//! formatting of reply values.

use kdb_console::classify::{classify, is_display_worthy, render_text, Image, Shape, ShapeKind};
use kdb_console::format::{
    auto_expand_error, auto_expand_result, format_result, preview, summary_line,
};
use kdb_console::messages::{engine_failure, frame_query, Outcome};
use kdb_console::PointerPosition;
use serde_json::{json, Value};

#[test]
fn records_classify_as_table_with_union_of_keys() {
    let value = json!([{"a": 1, "b": "x"}, {"a": 2, "c": true}]);
    let Shape::Table(table) = classify(&value) else {
        panic!("expected table");
    };
    assert_eq!(table.columns, vec!["a", "b", "c"]);
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.cell_text(0, 1), "x");
    assert_eq!(table.cell_text(1, 1), "");
    assert_eq!(table.cell_text(1, 2), "true");
}

#[test]
fn column_dictionary_classifies_as_table() {
    let value = json!({"sym": ["a", "b"], "px": [1.5, 2.5]});
    let Shape::Table(table) = classify(&value) else {
        panic!("expected table");
    };
    assert_eq!(table.columns, vec!["sym", "px"]);
    assert_eq!(table.rows[1], vec![Some(json!("b")), Some(json!(2.5))]);
}

#[test]
fn ragged_column_dictionary_is_text() {
    let value = json!({"a": [1, 2], "b": [1]});
    assert_eq!(classify(&value).kind(), ShapeKind::Text);
}

#[test]
fn numeric_list_is_series() {
    assert_eq!(
        classify(&json!([1, 2.5, -3])),
        Shape::NumericSeries(vec![1.0, 2.5, -3.0])
    );
    assert_eq!(classify(&json!([1, "a"])).kind(), ShapeKind::Text);
    assert_eq!(classify(&json!([1, null])).kind(), ShapeKind::Text);
}

#[test]
fn grayscale_matrix_keeps_its_dimensions() {
    let value = json!([[1, 2, 3], [4, 5, 6]]);
    let Shape::MatrixImage(image) = classify(&value) else {
        panic!("expected image");
    };
    assert!(matches!(image, Image::Grayscale(_)));
    assert_eq!(image.dimensions(), (2, 3));

    let ragged = json!([[1, 2, 3], [4]]);
    let Shape::MatrixImage(image) = classify(&ragged) else {
        panic!("expected image");
    };
    assert_eq!(image.dimensions(), (2, 3));
}

#[test]
fn grayscale_levels_span_the_full_range() {
    let Shape::MatrixImage(Image::Grayscale(gray)) = classify(&json!([[0, 2], [4, 6]])) else {
        panic!("expected grayscale");
    };
    assert_eq!(gray.levels(), vec![vec![0, 85], vec![170, 255]]);

    let Shape::MatrixImage(Image::Grayscale(flat)) = classify(&json!([[7, 7], [7, 7]])) else {
        panic!("expected grayscale");
    };
    assert_eq!(flat.levels(), vec![vec![128, 128], vec![128, 128]]);
}

#[test]
fn pixel_tuples_are_a_color_image() {
    let value = json!([[[255, 0, 0], [0, 255, 0, 128]], [[300, -5, 10], [1, 2, 3]]]);
    let Shape::MatrixImage(Image::Color(color)) = classify(&value) else {
        panic!("expected color image");
    };
    assert_eq!((color.rows, color.cols), (2, 2));
    let rgba = color.rgba();
    assert_eq!(rgba[0], vec![[255, 0, 0, 255], [0, 255, 0, 128]]);
    assert_eq!(rgba[1][0], [255, 0, 10, 255]);
}

#[test]
fn scalars_and_empties_are_text() {
    assert_eq!(classify(&json!(null)), Shape::Text("null".into()));
    assert_eq!(classify(&json!([])), Shape::Text("[]".into()));
    assert_eq!(classify(&json!("hello")), Shape::Text("hello".into()));
    assert_eq!(classify(&json!(42)), Shape::Text("42".into()));
}

#[test]
fn long_heterogeneous_lists_render_a_sample() {
    let mut items: Vec<Value> = (0..11).map(Value::from).collect();
    items.push(json!("x"));
    let text = render_text(&Value::Array(items));
    assert!(text.starts_with("[12 items] "), "{}", text);
    assert!(text.ends_with("..."));
}

#[test]
fn display_worthiness() {
    assert!(is_display_worthy(&json!([1, 2])));
    assert!(is_display_worthy(&json!({"a": 1})));
    assert!(!is_display_worthy(&json!(2)));
    assert!(!is_display_worthy(&json!("text")));
    assert!(!is_display_worthy(&json!([])));
    assert!(!is_display_worthy(&json!([null, null])));
}

#[test]
fn execution_error_is_detected_before_classification() {
    let reply = json!({"error": "ExecutionError", "msg": "type"});
    let failure = engine_failure(&reply).expect("should be an engine error");
    assert_eq!(failure.to_string(), "KDB+ Error: type");
    assert!(matches!(Outcome::from_value(reply), Outcome::Failure(_)));
}

#[test]
fn error_field_variants() {
    assert_eq!(
        engine_failure(&json!({"Error": "boom"})).unwrap().message,
        "boom"
    );
    assert_eq!(
        engine_failure(&json!({"error": "rank", "message": "bad rank"}))
            .unwrap()
            .message,
        "bad rank"
    );
    assert!(engine_failure(&json!({"error": false, "x": 1})).is_none());
    assert!(engine_failure(&json!({"error": "", "msg": ""})).is_none());
    assert!(engine_failure(&json!({"msg": "not an error"})).is_none());
    assert!(engine_failure(&json!([{"error": "x"}])).is_none());
    assert_eq!(
        Outcome::from_value(json!({"status": "ok"})),
        Outcome::Success(json!({"status": "ok"}))
    );
}

#[test]
fn requests_carry_six_decimal_pointer_context() {
    let framed = frame_query(PointerPosition { x: 0.5, y: 0.25 }, "  til 5 ");
    assert_eq!(framed, "mouseX:0.500000; mouseY:0.250000; til 5");
    let origin = frame_query(PointerPosition::default(), "1+1");
    assert_eq!(origin, "mouseX:0.000000; mouseY:0.000000; 1+1");
}

#[test]
fn pointer_coordinates_are_normalized_and_clamped() {
    let p = PointerPosition::normalize(50.0, 300.0, 200.0, 100.0);
    assert_eq!(p, PointerPosition { x: 0.25, y: 1.0 });
    let q = PointerPosition::normalize(-10.0, 5.0, 0.0, 10.0);
    assert_eq!(q, PointerPosition { x: 0.0, y: 0.5 });
}

#[test]
fn scalars_and_lists_format_plainly() {
    assert_eq!(format_result(&json!(2)), "2");
    assert_eq!(format_result(&json!("abc")), "abc");
    assert_eq!(format_result(&json!([1, 2, 3])), "1 2 3");
    assert_eq!(format_result(&json!({"a": 1})), "{\n  \"a\": 1\n}");
}

#[test]
fn two_dimensional_lists_format_as_grid() {
    assert_eq!(format_result(&json!([[1, 2], [3, 40]])), "1  2\n3  40");
}

#[test]
fn records_format_as_grid_with_header() {
    let value = json!([{"a": 1, "b": "x"}, {"a": 22, "c": [1, 2]}]);
    assert_eq!(format_result(&value), "a   b  c\n1   x\n22     [...]");
}

#[test]
fn wide_and_long_cells_report_truncation() {
    let long = "z".repeat(40);
    let text = format_result(&json!([[long, "b"]]));
    assert!(text.contains(&format!("{}...", "z".repeat(27))));
    assert!(text.ends_with("... (output truncated: some cells truncated) ..."));

    let wide: serde_json::Map<String, Value> =
        (0..25).map(|i| (format!("c{:02}", i), Value::from(i))).collect();
    let text = format_result(&json!([wide]));
    assert!(
        text.ends_with("... (output truncated: dims 2x20 of 2x25) ..."),
        "{}",
        text
    );
}

#[test]
fn large_values_render_summaries() {
    let records: Vec<Value> = (0..31).map(|i| json!({"v": i})).collect();
    let text = format_result(&Value::Array(records));
    assert!(text.starts_with("Table Summary (31 rows, 1 columns)"));
    assert!(text.contains("Columns: v"));

    let matrix: Vec<Vec<i32>> = (0..6).map(|r| (0..6).map(|c| r * 6 + c).collect()).collect();
    let text = format_result(&json!(matrix));
    assert!(text.starts_with("Matrix Summary (6 rows × 6 columns)"));
    assert!(text.contains("Sample (3×5):"));

    let series: Vec<i32> = (0..40).collect();
    let text = format_result(&json!(series));
    assert!(text.starts_with("1D array summary"));
    assert!(text.contains("shape : 40"));
    assert!(text.contains("mean  : 19.5000"));
}

#[test]
fn collapsed_summary_lines() {
    assert_eq!(summary_line(&json!([])), "Empty Array");
    assert_eq!(summary_line(&json!([{"a": 1}, {"a": 2}])), "Table (2 rows)");
    assert_eq!(summary_line(&json!([1, 2, 3])), "Array(3)");
    assert_eq!(summary_line(&json!(null)), "null");
    assert_eq!(summary_line(&json!({})), "Empty Object");
    assert_eq!(summary_line(&json!({"a": 1, "b": 2})), "Object (2 properties)");
    let long = "y".repeat(60);
    assert_eq!(summary_line(&json!(long)), format!("{}...", "y".repeat(50)));
}

#[test]
fn auto_expand_needs_both_limits() {
    assert!(auto_expand_result("2"));
    assert!(auto_expand_result(&vec!["x"; 6].join("\n")));
    assert!(!auto_expand_result(&vec!["x"; 7].join("\n")));
    assert!(!auto_expand_result(&"x".repeat(241)));

    assert!(auto_expand_error("KDB+ Error: type"));
    assert!(auto_expand_error(&vec!["e"; 3].join("\n")));
    assert!(!auto_expand_error(&vec!["e"; 4].join("\n")));
}

#[test]
fn previews_cut_long_text() {
    let short = preview("a\nb");
    assert_eq!(short.text, "a\nb");
    assert!(!short.truncated);

    let many_lines = (0..12).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
    let p = preview(&many_lines);
    assert!(p.truncated);
    assert!(p.text.ends_with("..."));
    assert!(p.text.starts_with("0\n1\n"));

    let p = preview(&"w".repeat(500));
    assert!(p.truncated);
    assert_eq!(p.text.chars().count(), 320);
}
