//! Sheet objects with their own identity: charts, pivot tables, tables,
//! filters, banding, slicers, protected ranges and named ranges.
//!
//! Every entity keeps the fields it does not model in `extra` so a decode /
//! encode cycle never drops data. Ranges are A1 strings on disk and become
//! `GridRange`s only in [`to_wire`](Chart::to_wire) output.

use core::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::{CellRef, GridRange, Range};

type Extra = BTreeMap<String, JsonValue>;

/// Identity of an entity that the remote assigns on creation.
pub trait Entity: Clone + PartialEq {
    type Id: Ord + Clone + fmt::Debug + fmt::Display;

    /// Human-readable kind used in diagnostics (`"chart"`, `"filter view"`).
    const KIND: &'static str;

    /// `None` when the entity was added locally and has no remote id yet.
    fn id(&self) -> Option<Self::Id>;
}

fn to_value(value: &impl Serialize) -> JsonValue {
    serde_json::to_value(value).unwrap_or_else(|_| json!({}))
}

fn set_grid_range(obj: &mut JsonValue, key: &str, range: Range, sheet_id: u32) {
    obj[key] = json!(range.to_grid_range(sheet_id));
}

fn default_position(sheet_id: u32) -> JsonValue {
    json!({
        "overlayPosition": {
            "anchorCell": {"sheetId": sheet_id, "rowIndex": 0, "columnIndex": 0}
        }
    })
}

/// An embedded chart. `spec` and `position` are passed through verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_id: Option<i64>,
    pub spec: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<JsonValue>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Entity for Chart {
    type Id = i64;
    const KIND: &'static str = "chart";

    fn id(&self) -> Option<i64> {
        self.chart_id
    }
}

impl Chart {
    /// `EmbeddedChart` for `addChart`; charts without a position are anchored at A1.
    pub fn to_wire(&self, sheet_id: u32) -> JsonValue {
        let mut value = to_value(self);
        if self.position.is_none() {
            value["position"] = default_position(sheet_id);
        }
        value
    }
}

/// A pivot table, identified by the cell it is anchored at.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotTable {
    pub anchor_cell: CellRef,
    pub pivot_table: JsonValue,
}

impl Entity for PivotTable {
    type Id = CellRef;
    const KIND: &'static str = "pivot table";

    fn id(&self) -> Option<CellRef> {
        Some(self.anchor_cell)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    pub name: String,
    pub range: Range,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Entity for Table {
    type Id = String;
    const KIND: &'static str = "table";

    fn id(&self) -> Option<String> {
        self.table_id.clone()
    }
}

impl Table {
    pub fn to_wire(&self, sheet_id: u32) -> JsonValue {
        let mut value = to_value(self);
        set_grid_range(&mut value, "range", self.range, sheet_id);
        value
    }
}

/// The single basic filter a sheet may carry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BasicFilter {
    pub range: Range,
    #[serde(flatten)]
    pub extra: Extra,
}

impl BasicFilter {
    pub fn to_wire(&self, sheet_id: u32) -> JsonValue {
        let mut value = to_value(self);
        set_grid_range(&mut value, "range", self.range, sheet_id);
        value
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_view_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub range: Range,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Entity for FilterView {
    type Id = i64;
    const KIND: &'static str = "filter view";

    fn id(&self) -> Option<i64> {
        self.filter_view_id
    }
}

impl FilterView {
    pub fn to_wire(&self, sheet_id: u32) -> JsonValue {
        let mut value = to_value(self);
        set_grid_range(&mut value, "range", self.range, sheet_id);
        value
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandedRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banded_range_id: Option<i64>,
    pub range: Range,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Entity for BandedRange {
    type Id = i64;
    const KIND: &'static str = "banded range";

    fn id(&self) -> Option<i64> {
        self.banded_range_id
    }
}

impl BandedRange {
    pub fn to_wire(&self, sheet_id: u32) -> JsonValue {
        let mut value = to_value(self);
        set_grid_range(&mut value, "range", self.range, sheet_id);
        value
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slicer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slicer_id: Option<i64>,
    pub spec: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<JsonValue>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Entity for Slicer {
    type Id = i64;
    const KIND: &'static str = "slicer";

    fn id(&self) -> Option<i64> {
        self.slicer_id
    }
}

impl Slicer {
    pub fn to_wire(&self, sheet_id: u32) -> JsonValue {
        let mut value = to_value(self);
        if self.position.is_none() {
            value["position"] = default_position(sheet_id);
        }
        value
    }
}

/// A protected region: an explicit range, a named range, or (neither) the
/// whole sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectedRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protected_range_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub named_range_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unprotected_ranges: Vec<Range>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Entity for ProtectedRange {
    type Id = i64;
    const KIND: &'static str = "protected range";

    fn id(&self) -> Option<i64> {
        self.protected_range_id
    }
}

impl ProtectedRange {
    pub fn to_wire(&self, sheet_id: u32) -> JsonValue {
        let mut value = to_value(self);
        match (self.range, &self.named_range_id) {
            (Some(range), _) => set_grid_range(&mut value, "range", range, sheet_id),
            (None, None) => value["range"] = json!(GridRange::whole_sheet(sheet_id)),
            (None, Some(_)) => {}
        }
        if !self.unprotected_ranges.is_empty() {
            value["unprotectedRanges"] = self
                .unprotected_ranges
                .iter()
                .map(|r| json!(r.to_grid_range(sheet_id)))
                .collect();
        }
        value
    }
}

/// A named range, resolved to the sheet it points into.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedRange {
    pub named_range_id: Option<String>,
    pub name: String,
    pub sheet_id: u32,
    pub range: Range,
}

impl Entity for NamedRange {
    type Id = String;
    const KIND: &'static str = "named range";

    fn id(&self) -> Option<String> {
        self.named_range_id.clone()
    }
}

impl NamedRange {
    pub fn to_wire(&self) -> JsonValue {
        let mut value = json!({
            "name": self.name,
            "range": self.range.to_grid_range(self.sheet_id),
        });
        if let Some(id) = &self.named_range_id {
            value["namedRangeId"] = json!(id);
        }
        value
    }
}

/// On-disk form of a named range: the sheet is referenced by title.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedRangeEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub named_range_id: Option<String>,
    pub name: String,
    pub sheet: String,
    pub range: Range,
}
