use extrasheet_model::{
    decode, encode, CellRef, CellValue, CfRuleId, Color, FileTree, Range, TextRotation,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn fixture() -> FileTree {
    let mut tree = FileTree::new();
    let mut put = |path: &str, body: &str| tree.insert(path, body.as_bytes().to_vec());

    put(
        "spreadsheet.json",
        r##"{
  "spreadsheetId": "1AbC",
  "properties": {"title": "Budget", "locale": "en_US", "timeZone": "Etc/GMT", "autoRecalc": "ON_CHANGE"},
  "sheets": [
    {"sheetId": 0, "title": "Sheet1", "index": 0, "folder": "Sheet1",
     "gridProperties": {"rowCount": 10, "columnCount": 5, "frozenRowCount": 1},
     "tabColor": "#FF0000"},
    {"sheetId": 7, "title": "Notes & Misc", "index": 1, "folder": "Notes_Misc",
     "gridProperties": {"rowCount": 2, "columnCount": 1}, "hidden": true}
  ]
}"##,
    );
    put(
        "named_ranges.json",
        r#"{"namedRanges": [{"namedRangeId": "nr1", "name": "Inputs", "sheet": "Sheet1", "range": "A2:B10"}]}"#,
    );
    let mut data = String::from("Item\tA\tB\tSum\tNote\n");
    for r in 2..=10 {
        data.push_str(&format!("row{r}\t{r}\t{}\t{}\t\n", r * 10, r * 11));
    }
    put("Sheet1/data.tsv", &data);
    put(
        "Sheet1/formula.json",
        r#"{"formulas": {"D2:D10": "=B2+C2"}, "arrayFormulas": {"E2:E3": "=TRANSPOSE(A1:B1)"}}"#,
    );
    put(
        "Sheet1/format.json",
        r##"{
  "formatRules": [
    {"range": "A1:E1", "format": {"textFormat": {"bold": true}, "backgroundColor": {"red": 0.8, "green": 0.8, "blue": 0.8}}},
    {"range": "D2:D10", "format": {"numberFormat": {"type": "NUMBER", "pattern": "#,##0"}, "textRotation": {"angle": 30}}}
  ],
  "conditionalFormats": [
    {"ruleIndex": 0, "ranges": ["B2:B10"],
     "booleanRule": {"condition": {"type": "NUMBER_GREATER", "values": [{"userEnteredValue": "50"}]},
                     "format": {"backgroundColor": "theme:ACCENT1"}}}
  ],
  "merges": ["A1:B1"],
  "notes": {"B2": "check this"},
  "textFormatRuns": {"A2": [{"format": {"bold": true}}, {"startIndex": 2, "format": {}}]}
}"##,
    );
    put(
        "Sheet1/dimensions.json",
        r#"{"columnMetadata": [{"range": "A", "pixelSize": 180}], "rowGroups": [{"range": "3:5", "depth": 1}]}"#,
    );
    put(
        "Sheet1/data_validation.json",
        r#"{"dataValidation": [{"cells": ["C2:C4"], "rule": {"condition": {"type": "ONE_OF_LIST", "values": [{"userEnteredValue": "x"}]}, "strict": true}}]}"#,
    );
    put(
        "Sheet1/charts.json",
        r#"{"charts": [{"chartId": 11, "spec": {"title": "Totals", "basicChart": {"chartType": "COLUMN"}}}]}"#,
    );
    put(
        "Sheet1/filters.json",
        r#"{"basicFilter": {"range": "A1:E10"}, "filterViews": [{"filterViewId": 3, "title": "Big", "range": "A1:E10", "criteria": {"1": {"hiddenValues": ["2"]}}}]}"#,
    );
    put(
        "Sheet1/protection.json",
        r#"{"protectedRanges": [{"protectedRangeId": 21, "namedRangeId": "nr1", "warningOnly": true}]}"#,
    );
    put("Notes_Misc/data.tsv", "'42\nline\\nbreak\n");
    tree
}

#[test]
fn decode_then_encode_then_decode_is_stable() {
    let files = fixture();
    let model = decode(&files).expect("fixture decodes");
    let again = decode(&encode(&model).expect("encodes")).expect("re-decodes");
    assert_eq!(again, model);
}

#[test]
fn decode_expands_and_normalizes() {
    let model = decode(&fixture()).unwrap();
    let sheet = &model.sheets[0];
    let cell = |a1: &str| CellRef::from_a1(a1).unwrap();

    assert_eq!(sheet.formula_at(cell("D7")), Some("=B7+C7"));
    assert_eq!(sheet.value_at(cell("B3")), &CellValue::Number(3.0));
    assert_eq!(sheet.data_extent.rows, 10);
    assert_eq!(sheet.data_extent.cols, 5);
    assert_eq!(
        sheet.array_range_at(cell("E3")),
        Some(Range::from_a1("E2:E3").unwrap())
    );

    let formats = sheet.resolved_formats();
    assert_eq!(formats[&cell("C1")].background_color, Some(Color::rgb(204, 204, 204)));
    assert_eq!(formats[&cell("D4")].text_rotation, Some(TextRotation::Angle(30)));

    assert_eq!(sheet.conditional_formats[0].id, Some(CfRuleId(0)));
    assert_eq!(sheet.column_metadata[&0].pixel_size, Some(180));
    assert_eq!(sheet.data_validation[0].cells.len(), 3);
    assert_eq!(model.named_ranges[0].sheet_id, 0);

    let notes = &model.sheets[1];
    assert_eq!(notes.value_at(cell("A1")), &CellValue::String("42".into()));
    assert_eq!(
        notes.value_at(cell("A2")),
        &CellValue::String("line\nbreak".into())
    );
}

#[test]
fn encode_compresses_formula_fills() {
    let model = decode(&fixture()).unwrap();
    let files = encode(&model).unwrap();
    let formula: serde_json::Value =
        serde_json::from_slice(files.get("Sheet1/formula.json").unwrap()).unwrap();
    assert_eq!(
        formula["formulas"],
        serde_json::json!({"D2:D10": "=B2+C2"})
    );
    assert_eq!(
        formula["arrayFormulas"],
        serde_json::json!({"E2:E3": "=TRANSPOSE(A1:B1)"})
    );

    // Colors given as channel dicts are written back in canonical form.
    let format: serde_json::Value =
        serde_json::from_slice(files.get("Sheet1/format.json").unwrap()).unwrap();
    assert_eq!(
        format["formatRules"][0]["format"]["backgroundColor"],
        serde_json::json!("#CCCCCC")
    );
}

#[test]
fn data_tsv_is_rewritten_byte_for_byte() {
    let files = fixture();
    let encoded = encode(&decode(&files).unwrap()).unwrap();
    assert_eq!(encoded.get("Sheet1/data.tsv"), files.get("Sheet1/data.tsv"));
    assert_eq!(
        encoded.get("Notes_Misc/data.tsv"),
        files.get("Notes_Misc/data.tsv")
    );
}

const GRID_ROWS: u32 = 12;
const GRID_COLS: u32 = 8;

fn column(col: u32) -> char {
    char::from(b'A' + col as u8)
}

fn a1(row: u32, col: u32, height: u32, width: u32) -> String {
    let (r1, c1) = (row + height - 1, col + width - 1);
    if height == 1 && width == 1 {
        format!("{}{}", column(col), row + 1)
    } else {
        format!("{}{}:{}{}", column(col), row + 1, column(c1), r1 + 1)
    }
}

fn field() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        (-1000i32..1000).prop_map(|n| n.to_string()),
        (-400i32..400).prop_map(|n| (f64::from(n) / 4.0).to_string()),
        any::<bool>().prop_map(|b| if b { "TRUE" } else { "FALSE" }.to_string()),
        "x[a-z]{0,5}",
    ]
}

/// A rectangle inside the grid: (row, col, height, width).
fn rect() -> impl Strategy<Value = (u32, u32, u32, u32)> {
    (0..GRID_ROWS - 3, 0..GRID_COLS - 3, 1u32..4, 1u32..4)
}

fn format_body(pick: u8) -> &'static str {
    match pick % 4 {
        0 => r#"{"textFormat": {"bold": true}}"#,
        1 => r#"{"textFormat": {"bold": false, "italic": true}}"#,
        2 => r##"{"backgroundColor": "#336699"}"##,
        _ => r#"{"numberFormat": {"type": "NUMBER", "pattern": "0.00"}}"#,
    }
}

prop_compose! {
    fn generated_folder()(
        data_rows in 1u32..7,
        data_cols in 2u32..5,
        fields in proptest::collection::vec(field(), 24),
        fill in proptest::option::of((1u32..6, 1u32..6)),
        block in any::<bool>(),
        formats in proptest::collection::vec((rect(), any::<u8>()), 0..4),
        rules in proptest::collection::vec((any::<bool>(), 0u8..100, rect()), 0..4),
        widths in proptest::collection::vec((0..GRID_COLS, 20u32..300, any::<bool>()), 0..3),
        group in proptest::option::of((1u32..5, 1u32..4, any::<bool>())),
        validation in proptest::option::of(rect()),
    ) -> FileTree {
        let mut tree = FileTree::new();
        let mut put = |path: &str, body: String| tree.insert(path, body.into_bytes());

        put(
            "spreadsheet.json",
            format!(
                r#"{{"spreadsheetId": "gen", "properties": {{"title": "Generated"}}, "sheets": [
                    {{"sheetId": 0, "title": "Sheet1", "index": 0, "folder": "Sheet1",
                      "gridProperties": {{"rowCount": {GRID_ROWS}, "columnCount": {GRID_COLS}}}}}]}}"#
            ),
        );

        let mut data = String::new();
        for row in 0..data_rows {
            let line: Vec<&str> = (0..data_cols)
                .map(|col| fields[(row * 4 + col) as usize].as_str())
                .collect();
            data.push_str(&line.join("\t"));
            data.push('\n');
        }
        put("Sheet1/data.tsv", data);

        // Column F is filled downward; G:H optionally hold a 2-D block.
        let mut formulas = Vec::new();
        if let Some((start, len)) = fill {
            let range = a1(start, 5, len, 1);
            formulas.push(format!(r#""{range}": "=A{}*2""#, start + 1));
        }
        if block {
            formulas.push(r#""G2:H5": "=$A$1+G1""#.to_string());
        }
        if !formulas.is_empty() {
            put(
                "Sheet1/formula.json",
                format!(r#"{{"formulas": {{{}}}}}"#, formulas.join(", ")),
            );
        }

        let format_rules: Vec<String> = formats
            .iter()
            .map(|&((r, c, h, w), pick)| {
                format!(r#"{{"range": "{}", "format": {}}}"#, a1(r, c, h, w), format_body(pick))
            })
            .collect();
        let conditional: Vec<String> = rules
            .iter()
            .enumerate()
            .map(|(i, &(indexed, threshold, (r, c, h, w)))| {
                let index = if indexed { format!(r#""ruleIndex": {i}, "#) } else { String::new() };
                format!(
                    r##"{{{index}"ranges": ["{}"], "booleanRule": {{"condition": {{"type": "NUMBER_GREATER", "values": [{{"userEnteredValue": "{threshold}"}}]}}, "format": {{"backgroundColor": "#FFEEEE"}}}}}}"##,
                    a1(r, c, h, w)
                )
            })
            .collect();
        if !format_rules.is_empty() || !conditional.is_empty() {
            put(
                "Sheet1/format.json",
                format!(
                    r#"{{"formatRules": [{}], "conditionalFormats": [{}]}}"#,
                    format_rules.join(", "),
                    conditional.join(", ")
                ),
            );
        }

        let metadata: Vec<String> = widths
            .iter()
            .map(|&(col, px, hidden)| {
                format!(r#"{{"range": "{}", "pixelSize": {px}, "hidden": {hidden}}}"#, column(col))
            })
            .collect();
        let groups: Vec<String> = group
            .iter()
            .map(|&(start, len, collapsed)| {
                format!(
                    r#"{{"range": "{}:{}", "depth": 1, "collapsed": {collapsed}}}"#,
                    start + 1,
                    start + len
                )
            })
            .collect();
        put(
            "Sheet1/dimensions.json",
            format!(
                r#"{{"columnMetadata": [{}], "rowGroups": [{}]}}"#,
                metadata.join(", "),
                groups.join(", ")
            ),
        );

        if let Some((r, c, h, w)) = validation {
            put(
                "Sheet1/data_validation.json",
                format!(
                    r#"{{"dataValidation": [{{"cells": ["{}"], "rule": {{"condition": {{"type": "NUMBER_GREATER", "values": [{{"userEnteredValue": "0"}}]}}, "strict": true}}}}]}}"#,
                    a1(r, c, h, w)
                ),
            );
        }
        tree
    }
}

proptest! {
    #[test]
    fn generated_models_survive_encode_and_decode(files in generated_folder()) {
        let model = decode(&files).expect("generated folder decodes");
        let encoded = encode(&model).expect("encodes");
        let again = decode(&encoded).expect("re-decodes");
        prop_assert_eq!(&again, &model);
        // Encoding is a fixed point once canonical.
        prop_assert_eq!(encode(&again).expect("encodes again"), encoded);
    }
}
