//! Typed `batchUpdate` requests.
//!
//! Each variant serializes to the single-key object the Sheets API expects,
//! e.g. `{"updateCells": {...}}`. Bodies of objects the model keeps opaque
//! (chart specs, filter criteria) are plain JSON.

use serde::Serialize;
use serde_json::Value as JsonValue;

use extrasheet_model::{DimensionRange, GridRange};

/// One row of an `updateCells` body.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RowData {
    pub values: Vec<JsonValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAndDestination {
    pub source: GridRange,
    pub dimension: extrasheet_model::Dimension,
    pub fill_length: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    UpdateSpreadsheetProperties {
        properties: JsonValue,
        fields: String,
    },
    AddSheet {
        properties: JsonValue,
    },
    UpdateSheetProperties {
        properties: JsonValue,
        fields: String,
    },
    DeleteSheet {
        sheet_id: u32,
    },
    UpdateCells {
        range: GridRange,
        rows: Vec<RowData>,
        fields: String,
    },
    AutoFill {
        source_and_destination: SourceAndDestination,
        use_alternate_series: bool,
    },
    RepeatCell {
        range: GridRange,
        cell: JsonValue,
        fields: String,
    },
    MergeCells {
        range: GridRange,
        merge_type: String,
    },
    UnmergeCells {
        range: GridRange,
    },
    AddConditionalFormatRule {
        rule: JsonValue,
        index: usize,
    },
    UpdateConditionalFormatRule {
        index: usize,
        sheet_id: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        rule: Option<JsonValue>,
        #[serde(skip_serializing_if = "Option::is_none")]
        new_index: Option<usize>,
    },
    DeleteConditionalFormatRule {
        index: usize,
        sheet_id: u32,
    },
    UpdateDimensionProperties {
        range: DimensionRange,
        properties: JsonValue,
        fields: String,
    },
    AddDimensionGroup {
        range: DimensionRange,
    },
    UpdateDimensionGroup {
        dimension_group: JsonValue,
        fields: String,
    },
    DeleteDimensionGroup {
        range: DimensionRange,
    },
    SetDataValidation {
        range: GridRange,
        #[serde(skip_serializing_if = "Option::is_none")]
        rule: Option<JsonValue>,
    },
    AddChart {
        chart: JsonValue,
    },
    UpdateChartSpec {
        chart_id: i64,
        spec: JsonValue,
    },
    UpdateEmbeddedObjectPosition {
        object_id: i64,
        new_position: JsonValue,
        fields: String,
    },
    DeleteEmbeddedObject {
        object_id: i64,
    },
    AddTable {
        table: JsonValue,
    },
    UpdateTable {
        table: JsonValue,
        fields: String,
    },
    DeleteTable {
        table_id: String,
    },
    SetBasicFilter {
        filter: JsonValue,
    },
    ClearBasicFilter {
        sheet_id: u32,
    },
    AddFilterView {
        filter: JsonValue,
    },
    UpdateFilterView {
        filter: JsonValue,
        fields: String,
    },
    DeleteFilterView {
        filter_id: i64,
    },
    AddBanding {
        banded_range: JsonValue,
    },
    UpdateBanding {
        banded_range: JsonValue,
        fields: String,
    },
    DeleteBanding {
        banded_range_id: i64,
    },
    AddSlicer {
        slicer: JsonValue,
    },
    UpdateSlicerSpec {
        slicer_id: i64,
        spec: JsonValue,
        fields: String,
    },
    AddProtectedRange {
        protected_range: JsonValue,
    },
    UpdateProtectedRange {
        protected_range: JsonValue,
        fields: String,
    },
    DeleteProtectedRange {
        protected_range_id: i64,
    },
    AddNamedRange {
        named_range: JsonValue,
    },
    UpdateNamedRange {
        named_range: JsonValue,
        fields: String,
    },
    DeleteNamedRange {
        named_range_id: String,
    },
    // Structural requests are accepted for pass-through; the generator never
    // produces them.
    InsertDimension {
        range: DimensionRange,
        inherit_from_before: bool,
    },
    DeleteDimension {
        range: DimensionRange,
    },
    MoveDimension {
        source: DimensionRange,
        destination_index: u32,
    },
}

impl Request {
    /// The request's key in the `batchUpdate` body.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::UpdateSpreadsheetProperties { .. } => "updateSpreadsheetProperties",
            Request::AddSheet { .. } => "addSheet",
            Request::UpdateSheetProperties { .. } => "updateSheetProperties",
            Request::DeleteSheet { .. } => "deleteSheet",
            Request::UpdateCells { .. } => "updateCells",
            Request::AutoFill { .. } => "autoFill",
            Request::RepeatCell { .. } => "repeatCell",
            Request::MergeCells { .. } => "mergeCells",
            Request::UnmergeCells { .. } => "unmergeCells",
            Request::AddConditionalFormatRule { .. } => "addConditionalFormatRule",
            Request::UpdateConditionalFormatRule { .. } => "updateConditionalFormatRule",
            Request::DeleteConditionalFormatRule { .. } => "deleteConditionalFormatRule",
            Request::UpdateDimensionProperties { .. } => "updateDimensionProperties",
            Request::AddDimensionGroup { .. } => "addDimensionGroup",
            Request::UpdateDimensionGroup { .. } => "updateDimensionGroup",
            Request::DeleteDimensionGroup { .. } => "deleteDimensionGroup",
            Request::SetDataValidation { .. } => "setDataValidation",
            Request::AddChart { .. } => "addChart",
            Request::UpdateChartSpec { .. } => "updateChartSpec",
            Request::UpdateEmbeddedObjectPosition { .. } => "updateEmbeddedObjectPosition",
            Request::DeleteEmbeddedObject { .. } => "deleteEmbeddedObject",
            Request::AddTable { .. } => "addTable",
            Request::UpdateTable { .. } => "updateTable",
            Request::DeleteTable { .. } => "deleteTable",
            Request::SetBasicFilter { .. } => "setBasicFilter",
            Request::ClearBasicFilter { .. } => "clearBasicFilter",
            Request::AddFilterView { .. } => "addFilterView",
            Request::UpdateFilterView { .. } => "updateFilterView",
            Request::DeleteFilterView { .. } => "deleteFilterView",
            Request::AddBanding { .. } => "addBanding",
            Request::UpdateBanding { .. } => "updateBanding",
            Request::DeleteBanding { .. } => "deleteBanding",
            Request::AddSlicer { .. } => "addSlicer",
            Request::UpdateSlicerSpec { .. } => "updateSlicerSpec",
            Request::AddProtectedRange { .. } => "addProtectedRange",
            Request::UpdateProtectedRange { .. } => "updateProtectedRange",
            Request::DeleteProtectedRange { .. } => "deleteProtectedRange",
            Request::AddNamedRange { .. } => "addNamedRange",
            Request::UpdateNamedRange { .. } => "updateNamedRange",
            Request::DeleteNamedRange { .. } => "deleteNamedRange",
            Request::InsertDimension { .. } => "insertDimension",
            Request::DeleteDimension { .. } => "deleteDimension",
            Request::MoveDimension { .. } => "moveDimension",
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Request::InsertDimension { .. }
                | Request::DeleteDimension { .. }
                | Request::MoveDimension { .. }
        )
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}
