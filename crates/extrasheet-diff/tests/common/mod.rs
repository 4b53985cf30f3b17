#![allow(dead_code)]

use extrasheet_diff::{DiffEngine, DiffError, DiffResult, RequestError, RequestGenerator, RequestPlan};
use extrasheet_model::{decode, FileTree, Spreadsheet};

pub const MANIFEST: &str = r#"{
  "spreadsheetId": "1AbC",
  "properties": {"title": "Budget", "locale": "en_US"},
  "sheets": [
    {"sheetId": 0, "title": "Sheet1", "index": 0, "folder": "Sheet1",
     "gridProperties": {"rowCount": 10, "columnCount": 4}}
  ]
}"#;

/// Item, quantity, price; the `Total` column is empty.
pub const DATA: &str = "Item\tQty\tPrice\tTotal\n\
apple\t1\t2\t\n\
pear\t3\t4\t\n\
plum\t5\t6\t\n\
fig\t7\t8\t\n\
kiwi\t9\t10\t\n";

/// A folder image under construction.
#[derive(Clone)]
pub struct Folder {
    tree: FileTree,
}

impl Folder {
    pub fn new() -> Self {
        Self::empty().put("spreadsheet.json", MANIFEST).put("Sheet1/data.tsv", DATA)
    }

    pub fn empty() -> Self {
        Self {
            tree: FileTree::new(),
        }
    }

    pub fn put(mut self, path: &str, body: &str) -> Self {
        self.tree.insert(path, body.as_bytes().to_vec());
        self
    }

    pub fn without(mut self, path: &str) -> Self {
        self.tree.remove(path);
        self
    }

    pub fn tree(&self) -> &FileTree {
        &self.tree
    }

    pub fn decode(&self) -> Spreadsheet {
        decode(&self.tree).expect("fixture decodes")
    }
}

pub fn diff(pristine: &Folder, current: &Folder) -> Result<DiffResult, DiffError> {
    DiffEngine::new(pristine.decode()).diff(&current.decode())
}

pub fn plan(pristine: &Folder, current: &Folder) -> Result<RequestPlan, RequestError> {
    let (pristine, current) = (pristine.decode(), current.decode());
    let diff = DiffEngine::new(pristine.clone())
        .diff(&current)
        .expect("diff succeeds");
    RequestGenerator::new(&pristine, &current).generate(&diff)
}

pub fn kinds(plan: &RequestPlan) -> Vec<&'static str> {
    plan.requests.iter().map(|r| r.kind()).collect()
}

/// Several feature layers at once, for "nothing changed" checks.
pub fn rich_folder() -> Folder {
    Folder::new()
        .put(
            "named_ranges.json",
            r#"{"namedRanges": [{"namedRangeId": "nr1", "name": "Prices", "sheet": "Sheet1", "range": "C2:C6"}]}"#,
        )
        .put(
            "Sheet1/formula.json",
            r#"{"formulas": {"D2:D6": "=B2*C2"}}"#,
        )
        .put(
            "Sheet1/format.json",
            r##"{
  "formatRules": [
    {"range": "A1:D1", "format": {"textFormat": {"bold": true}}},
    {"range": "C2:D6", "format": {"numberFormat": {"type": "CURRENCY", "pattern": "$#,##0.00"}}}
  ],
  "conditionalFormats": [
    {"ruleIndex": 0, "ranges": ["D2:D6"],
     "booleanRule": {"condition": {"type": "NUMBER_GREATER", "values": [{"userEnteredValue": "20"}]},
                     "format": {"backgroundColor": "#FFEEEE"}}}
  ],
  "merges": ["A8:B8"],
  "notes": {"A2": "seasonal"}
}"##,
        )
        .put(
            "Sheet1/dimensions.json",
            r#"{"columnMetadata": [{"range": "A", "pixelSize": 160}], "rowGroups": [{"range": "2:4", "depth": 1}]}"#,
        )
        .put(
            "Sheet1/data_validation.json",
            r#"{"dataValidation": [{"cells": ["B2:B6"], "rule": {"condition": {"type": "NUMBER_GREATER", "values": [{"userEnteredValue": "0"}]}, "strict": true}}]}"#,
        )
        .put(
            "Sheet1/charts.json",
            r#"{"charts": [{"chartId": 11, "spec": {"title": "Totals", "basicChart": {"chartType": "COLUMN"}}}]}"#,
        )
        .put(
            "Sheet1/filters.json",
            r#"{"basicFilter": {"range": "A1:D6"}, "filterViews": [{"filterViewId": 3, "title": "Cheap", "range": "A1:D6"}]}"#,
        )
        .put(
            "Sheet1/protection.json",
            r#"{"protectedRanges": [{"protectedRangeId": 21, "namedRangeId": "nr1", "warningOnly": true}]}"#,
        )
}
