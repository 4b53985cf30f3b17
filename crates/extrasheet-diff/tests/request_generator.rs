mod common;

use common::{kinds, plan, rich_folder, Folder, DATA};
use extrasheet_diff::{Request, RequestError};
use pretty_assertions::assert_eq;
use serde_json::json;

const CONDITIONAL_FORMATS: [&str; 3] = [
    r##"{"ruleIndex": 0, "ranges": ["B2:B6"], "booleanRule": {"condition": {"type": "NUMBER_GREATER", "values": [{"userEnteredValue": "5"}]}, "format": {"backgroundColor": "#FF0000"}}}"##,
    r##"{"ruleIndex": 1, "ranges": ["C2:C6"], "booleanRule": {"condition": {"type": "NUMBER_LESS", "values": [{"userEnteredValue": "3"}]}, "format": {"backgroundColor": "#00FF00"}}}"##,
    r##"{"ruleIndex": 2, "ranges": ["A2:A6"], "booleanRule": {"condition": {"type": "TEXT_CONTAINS", "values": [{"userEnteredValue": "p"}]}, "format": {"backgroundColor": "#0000FF"}}}"##,
];

fn with_rules(folder: Folder, order: &[usize]) -> Folder {
    let rules: Vec<&str> = order.iter().map(|i| CONDITIONAL_FORMATS[*i]).collect();
    folder.put(
        "Sheet1/format.json",
        &format!(r#"{{"conditionalFormats": [{}]}}"#, rules.join(",")),
    )
}

#[test]
fn unchanged_folder_yields_an_empty_plan() {
    let folder = rich_folder();
    let plan = plan(&folder, &folder).unwrap();
    assert!(plan.is_empty());
    assert_eq!(plan.body(), json!({"requests": []}));
}

#[test]
fn single_cell_edit_is_one_update_cells_at_its_coordinates() {
    let manifest = r#"{"spreadsheetId": "s", "properties": {"title": "T"}, "sheets": [
        {"sheetId": 0, "title": "Sheet1", "index": 0, "folder": "Sheet1",
         "gridProperties": {"rowCount": 3, "columnCount": 2}}]}"#;
    let pristine = Folder::empty()
        .put("spreadsheet.json", manifest)
        .put("Sheet1/data.tsv", "a\t1\nb\t10\nc\t30\n");
    let current = pristine.clone().put("Sheet1/data.tsv", "a\t1\nb\t20\nc\t30\n");

    let plan = plan(&pristine, &current).unwrap();
    assert_eq!(
        plan.body(),
        json!({"requests": [{"updateCells": {
            "range": {"sheetId": 0, "startRowIndex": 1, "endRowIndex": 2,
                      "startColumnIndex": 1, "endColumnIndex": 2},
            "rows": [{"values": [{"userEnteredValue": {"numberValue": 20.0}}]}],
            "fields": "userEnteredValue"
        }}]})
    );
}

#[test]
fn adjacent_edits_share_one_rectangle() {
    let pristine = Folder::new();
    let current = pristine.clone().put(
        "Sheet1/data.tsv",
        &DATA
            .replacen("apple\t1\t2", "apple\t10\t20", 1)
            .replacen("pear\t3\t4", "pear\t30\t", 1),
    );
    let plan = plan(&pristine, &current).unwrap();
    assert_eq!(kinds(&plan), vec!["updateCells"]);
    let Request::UpdateCells { range, rows, .. } = &plan.requests[0] else {
        unreachable!()
    };
    assert_eq!(range.start_row_index, Some(1));
    assert_eq!(range.end_row_index, Some(3));
    assert_eq!(range.start_column_index, Some(1));
    assert_eq!(range.end_column_index, Some(3));
    // The cleared cell is sent as an empty CellData.
    assert_eq!(rows[1].values[1], json!({}));
}

#[test]
fn formula_column_is_written_once_and_filled_down() {
    let pristine = Folder::new();
    let current = pristine
        .clone()
        .put("Sheet1/formula.json", r#"{"formulas": {"D2:D6": "=C2*2"}}"#);

    let plan = plan(&pristine, &current).unwrap();
    assert_eq!(
        plan.body(),
        json!({"requests": [
            {"updateCells": {
                "range": {"sheetId": 0, "startRowIndex": 1, "endRowIndex": 2,
                          "startColumnIndex": 3, "endColumnIndex": 4},
                "rows": [{"values": [{"userEnteredValue": {"formulaValue": "=C2*2"}}]}],
                "fields": "userEnteredValue"
            }},
            {"autoFill": {
                "sourceAndDestination": {
                    "source": {"sheetId": 0, "startRowIndex": 1, "endRowIndex": 2,
                               "startColumnIndex": 3, "endColumnIndex": 4},
                    "dimension": "ROWS",
                    "fillLength": 4
                },
                "useAlternateSeries": false
            }}
        ]})
    );
}

#[test]
fn two_dimensional_formula_range_fills_across_then_down() {
    let manifest = common::MANIFEST.replace("\"columnCount\": 4", "\"columnCount\": 6");
    let pristine = Folder::new().put("spreadsheet.json", &manifest);
    let current = pristine
        .clone()
        .put("Sheet1/formula.json", r#"{"formulas": {"B8:C9": "=B2+1"}}"#);

    let plan = plan(&pristine, &current).unwrap();
    assert_eq!(kinds(&plan), vec!["updateCells", "autoFill", "autoFill"]);
    let Request::AutoFill {
        source_and_destination: across,
        ..
    } = &plan.requests[1]
    else {
        unreachable!()
    };
    assert_eq!(across.fill_length, 1);
    let Request::AutoFill {
        source_and_destination: down,
        ..
    } = &plan.requests[2]
    else {
        unreachable!()
    };
    assert_eq!(down.fill_length, 1);
    assert_eq!(down.source.start_column_index, Some(1));
    assert_eq!(down.source.end_column_index, Some(3));
}

#[test]
fn conditional_format_deletions_run_from_the_back() {
    let pristine = with_rules(Folder::new(), &[0, 1, 2]);
    let current = with_rules(Folder::new(), &[1]);

    let plan = plan(&pristine, &current).unwrap();
    assert_eq!(
        plan.body()["requests"],
        json!([
            {"deleteConditionalFormatRule": {"index": 2, "sheetId": 0}},
            {"deleteConditionalFormatRule": {"index": 0, "sheetId": 0}}
        ])
    );
}

#[test]
fn conditional_format_reorder_moves_rules_into_place() {
    let pristine = with_rules(Folder::new(), &[0, 1, 2]);
    let current = with_rules(Folder::new(), &[2, 0, 1]);

    let plan = plan(&pristine, &current).unwrap();
    assert_eq!(
        plan.body()["requests"],
        json!([{"updateConditionalFormatRule": {"index": 2, "sheetId": 0, "newIndex": 0}}])
    );
}

#[test]
fn snapshot_rules_without_an_index_are_stable() {
    let unindexed = CONDITIONAL_FORMATS[0].replace(r#""ruleIndex": 0, "#, "");
    let snapshot = Folder::new().put(
        "Sheet1/format.json",
        &format!(
            r#"{{"conditionalFormats": [{}, {}]}}"#,
            CONDITIONAL_FORMATS[1], unindexed
        ),
    );
    assert!(plan(&snapshot, &snapshot).unwrap().is_empty());

    // Dropping the unindexed rule deletes it at its live position only.
    let current = with_rules(Folder::new(), &[1]);
    let plan = plan(&snapshot, &current).unwrap();
    assert_eq!(
        plan.body()["requests"],
        json!([{"deleteConditionalFormatRule": {"index": 1, "sheetId": 0}}])
    );
}

#[test]
fn new_conditional_format_is_inserted_at_its_position() {
    let pristine = with_rules(Folder::new(), &[0, 2]);
    let new_rule = CONDITIONAL_FORMATS[1].replace(r#""ruleIndex": 1, "#, "");
    let current = Folder::new().put(
        "Sheet1/format.json",
        &format!(
            r#"{{"conditionalFormats": [{}, {}, {}]}}"#,
            CONDITIONAL_FORMATS[0], new_rule, CONDITIONAL_FORMATS[2]
        ),
    );

    let plan = plan(&pristine, &current).unwrap();
    assert_eq!(kinds(&plan), vec!["addConditionalFormatRule"]);
    let Request::AddConditionalFormatRule { index, rule } = &plan.requests[0] else {
        unreachable!()
    };
    assert_eq!(*index, 1);
    assert_eq!(
        rule["ranges"],
        json!([{"sheetId": 0, "startRowIndex": 1, "endRowIndex": 6,
                "startColumnIndex": 2, "endColumnIndex": 3}])
    );
}

#[test]
fn unsupported_validation_condition_is_rejected_with_its_range() {
    let pristine = Folder::new();
    let current = pristine.clone().put(
        "Sheet1/data_validation.json",
        r#"{"dataValidation": [{"cells": ["A2:A6"], "rule": {"condition": {"type": "TEXT_STARTS_WITH", "values": [{"userEnteredValue": "a"}]}}}]}"#,
    );
    let err = plan(&pristine, &current).unwrap_err();
    assert!(matches!(err, RequestError::UnsupportedValidation { .. }));
    assert_eq!(
        err.to_string(),
        "Sheet1!A2:A6: data validation condition TEXT_STARTS_WITH is not supported"
    );
}

#[test]
fn error_values_cannot_be_written() {
    let pristine = Folder::new();
    let current = pristine
        .clone()
        .put("Sheet1/data.tsv", &DATA.replacen("pear\t3", "pear\t#N/A", 1));
    match plan(&pristine, &current) {
        Err(RequestError::ErrorValue { sheet, cell, .. }) => {
            assert_eq!(sheet, "Sheet1");
            assert_eq!(cell.to_string(), "B3");
        }
        other => panic!("expected an error value rejection, got {other:?}"),
    }
}

#[test]
fn chart_update_keeps_its_id_and_removal_deletes_the_object() {
    let pristine = rich_folder();
    let edited = pristine.clone().put(
        "Sheet1/charts.json",
        r#"{"charts": [{"chartId": 11, "spec": {"title": "Totals", "basicChart": {"chartType": "BAR"}}}]}"#,
    );
    let plan_edit = plan(&pristine, &edited).unwrap();
    assert_eq!(
        plan_edit.body()["requests"],
        json!([{"updateChartSpec": {"chartId": 11,
                 "spec": {"title": "Totals", "basicChart": {"chartType": "BAR"}}}}])
    );

    let removed = pristine.clone().without("Sheet1/charts.json");
    let plan_remove = plan(&pristine, &removed).unwrap();
    assert_eq!(
        plan_remove.body()["requests"],
        json!([{"deleteEmbeddedObject": {"objectId": 11}}])
    );
}

#[test]
fn phases_follow_dependency_order() {
    let pristine_manifest = r#"{"spreadsheetId": "1AbC", "properties": {"title": "Budget", "locale": "en_US"}, "sheets": [
        {"sheetId": 0, "title": "Sheet1", "index": 0, "folder": "Sheet1",
         "gridProperties": {"rowCount": 10, "columnCount": 4}},
        {"sheetId": 5, "title": "Old", "index": 1, "folder": "Old",
         "gridProperties": {"rowCount": 3, "columnCount": 3}}]}"#;
    let current_manifest = r#"{"spreadsheetId": "1AbC", "properties": {"title": "Budget 2025", "locale": "en_US"}, "sheets": [
        {"sheetId": 0, "title": "Sheet1", "index": 0, "folder": "Sheet1",
         "gridProperties": {"rowCount": 10, "columnCount": 4}},
        {"title": "New", "index": 1, "folder": "New",
         "gridProperties": {"rowCount": 3, "columnCount": 3}}]}"#;

    let pristine = rich_folder().put("spreadsheet.json", pristine_manifest);
    let current = rich_folder()
        .put("spreadsheet.json", current_manifest)
        .put("New/data.tsv", "x\n")
        .without("Sheet1/charts.json");

    let plan = plan(&pristine, &current).unwrap();
    assert_eq!(
        kinds(&plan),
        vec![
            "updateSpreadsheetProperties",
            "addSheet",
            "updateCells",
            "deleteEmbeddedObject",
            "deleteSheet",
        ]
    );
    let body = plan.body();
    assert_eq!(body["requests"][0]["updateSpreadsheetProperties"]["fields"], "title");
    assert_eq!(body["requests"][1]["addSheet"]["properties"]["sheetId"], 6);
    assert_eq!(body["requests"][1]["addSheet"]["properties"]["title"], "New");
    assert_eq!(body["requests"][2]["updateCells"]["range"]["sheetId"], 6);
    assert_eq!(body["requests"][4]["deleteSheet"]["sheetId"], 5);
}

#[test]
fn generated_plans_never_contain_structural_requests() {
    let pristine = rich_folder();
    let current = rich_folder()
        .put(
            "Sheet1/dimensions.json",
            r#"{"columnMetadata": [{"range": "A:B", "pixelSize": 200}], "rowGroups": [{"range": "2:4", "depth": 1, "collapsed": true}]}"#,
        )
        .put(
            "Sheet1/data.tsv",
            &DATA.replacen("kiwi", "kiwi fruit", 1),
        );
    let plan = plan(&pristine, &current).unwrap();
    assert!(!plan.is_empty());
    assert!(plan.requests.iter().all(|r| !r.is_structural()));
    assert_eq!(
        kinds(&plan),
        vec![
            "updateCells",
            "updateDimensionProperties",
            "updateDimensionGroup",
        ]
    );
}
