use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::{
    resolve_formats, BandedRange, BasicFilter, CellFormat, CfRuleId, CellRef, CellValue, Chart, Color,
    ConditionalFormatRule, DataValidationGroup, DimensionGroup, DimensionProps, FilterView,
    FormatRule, NamedRange, PivotTable, ProtectedRange, Range, Slicer, Table, TextFormatRun,
};

/// Document-level properties from the manifest.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetProperties {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_recalc: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridProperties {
    pub row_count: u32,
    pub column_count: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub frozen_row_count: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub frozen_column_count: u32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hide_gridlines: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

/// One entry of the manifest's `sheets` array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    /// `None` for a sheet created locally since the last fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<u32>,
    pub title: String,
    pub index: u32,
    /// Folder (relative to the spreadsheet folder) holding the sheet's files.
    pub folder: String,
    pub grid_properties: GridProperties,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_color: Option<Color>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub right_to_left: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

impl SpreadsheetProperties {
    /// `SpreadsheetProperties` body for `updateSpreadsheetProperties`.
    pub fn to_wire(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or_else(|_| json!({}))
    }

    pub fn changed_fields(&self, other: &Self) -> Vec<&'static str> {
        [
            ("title", self.title != other.title),
            ("locale", self.locale != other.locale),
            ("timeZone", self.time_zone != other.time_zone),
            ("autoRecalc", self.auto_recalc != other.auto_recalc),
        ]
        .into_iter()
        .filter_map(|(field, changed)| changed.then_some(field))
        .collect()
    }
}

impl SheetProperties {
    /// `SheetProperties` body for `addSheet` / `updateSheetProperties`.
    ///
    /// The folder is a local concept and is never sent.
    pub fn to_wire(&self, sheet_id: u32) -> JsonValue {
        let mut value = serde_json::to_value(self).unwrap_or_else(|_| json!({}));
        if let Some(obj) = value.as_object_mut() {
            obj.remove("folder");
            obj.insert("sheetId".to_string(), json!(sheet_id));
            obj.insert("hidden".to_string(), json!(self.hidden));
            obj.insert("rightToLeft".to_string(), json!(self.right_to_left));
            if let Some(color) = self.tab_color {
                obj.remove("tabColor");
                obj.insert("tabColorStyle".to_string(), color.to_wire());
            }
            let grid = &self.grid_properties;
            obj.insert(
                "gridProperties".to_string(),
                json!({
                    "rowCount": grid.row_count,
                    "columnCount": grid.column_count,
                    "frozenRowCount": grid.frozen_row_count,
                    "frozenColumnCount": grid.frozen_column_count,
                    "hideGridlines": grid.hide_gridlines,
                }),
            );
        }
        value
    }

    /// Field mask entries (relative to `SheetProperties`) whose values differ
    /// between `self` and `other`.
    pub fn changed_fields(&self, other: &Self) -> Vec<&'static str> {
        let (a, b) = (&self.grid_properties, &other.grid_properties);
        [
            ("title", self.title != other.title),
            ("index", self.index != other.index),
            ("hidden", self.hidden != other.hidden),
            ("tabColorStyle", self.tab_color != other.tab_color),
            ("rightToLeft", self.right_to_left != other.right_to_left),
            (
                "gridProperties.frozenRowCount",
                a.frozen_row_count != b.frozen_row_count,
            ),
            (
                "gridProperties.frozenColumnCount",
                a.frozen_column_count != b.frozen_column_count,
            ),
            (
                "gridProperties.hideGridlines",
                a.hide_gridlines != b.hide_gridlines,
            ),
        ]
        .into_iter()
        .filter_map(|(field, changed)| changed.then_some(field))
        .collect()
    }
}

/// A data-source formula; stored for fidelity, never pushed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceFormula {
    pub data_source_id: String,
    pub formula: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

/// Rows and columns occupied by `data.tsv` (line count, widest line).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DataExtent {
    pub rows: u32,
    pub cols: u32,
}

impl DataExtent {
    pub fn covering(&self, cell: CellRef) -> Self {
        Self {
            rows: self.rows.max(cell.row + 1),
            cols: self.cols.max(cell.col + 1),
        }
    }
}

/// One sheet with every layer expanded to its per-cell / per-entity form.
#[derive(Clone, Debug, PartialEq)]
pub struct Sheet {
    pub properties: SheetProperties,
    pub data_extent: DataExtent,
    pub values: BTreeMap<CellRef, CellValue>,
    pub formulas: BTreeMap<CellRef, String>,
    pub array_formulas: BTreeMap<Range, String>,
    pub data_source_formulas: BTreeMap<CellRef, DataSourceFormula>,
    pub format_rules: Vec<FormatRule>,
    pub conditional_formats: Vec<ConditionalFormatRule>,
    pub merges: BTreeSet<Range>,
    pub notes: BTreeMap<CellRef, String>,
    pub text_runs: BTreeMap<CellRef, Vec<TextFormatRun>>,
    pub row_metadata: BTreeMap<u32, DimensionProps>,
    pub column_metadata: BTreeMap<u32, DimensionProps>,
    pub row_groups: Vec<DimensionGroup>,
    pub column_groups: Vec<DimensionGroup>,
    pub data_validation: Vec<DataValidationGroup>,
    pub charts: Vec<Chart>,
    pub pivot_tables: Vec<PivotTable>,
    pub tables: Vec<Table>,
    pub basic_filter: Option<BasicFilter>,
    pub filter_views: Vec<FilterView>,
    pub banded_ranges: Vec<BandedRange>,
    pub slicers: Vec<Slicer>,
    pub protected_ranges: Vec<ProtectedRange>,
}

impl Sheet {
    /// An empty sheet with the given properties.
    pub fn new(properties: SheetProperties) -> Self {
        Self {
            properties,
            data_extent: DataExtent::default(),
            values: BTreeMap::new(),
            formulas: BTreeMap::new(),
            array_formulas: BTreeMap::new(),
            data_source_formulas: BTreeMap::new(),
            format_rules: Vec::new(),
            conditional_formats: Vec::new(),
            merges: BTreeSet::new(),
            notes: BTreeMap::new(),
            text_runs: BTreeMap::new(),
            row_metadata: BTreeMap::new(),
            column_metadata: BTreeMap::new(),
            row_groups: Vec::new(),
            column_groups: Vec::new(),
            data_validation: Vec::new(),
            charts: Vec::new(),
            pivot_tables: Vec::new(),
            tables: Vec::new(),
            basic_filter: None,
            filter_views: Vec::new(),
            banded_ranges: Vec::new(),
            slicers: Vec::new(),
            protected_ranges: Vec::new(),
        }
    }

    pub fn id(&self) -> Option<u32> {
        self.properties.sheet_id
    }

    pub fn title(&self) -> &str {
        &self.properties.title
    }

    pub fn value_at(&self, cell: CellRef) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.values.get(&cell).unwrap_or(&EMPTY)
    }

    pub fn formula_at(&self, cell: CellRef) -> Option<&str> {
        self.formulas.get(&cell).map(String::as_str)
    }

    /// The array formula range covering `cell`, if any.
    pub fn array_range_at(&self, cell: CellRef) -> Option<Range> {
        self.array_formulas
            .keys()
            .copied()
            .find(|range| range.contains(cell))
    }

    /// Surrogate of every conditional format rule, in list order. Rules
    /// without a `ruleIndex` get ids past the largest index in use.
    pub fn conditional_format_ids(&self) -> Vec<CfRuleId> {
        let mut next = self
            .conditional_formats
            .iter()
            .filter_map(|rule| rule.id)
            .map(|id| id.0 + 1)
            .max()
            .unwrap_or(0);
        self.conditional_formats
            .iter()
            .map(|rule| {
                rule.id.unwrap_or_else(|| {
                    let id = CfRuleId(next);
                    next += 1;
                    id
                })
            })
            .collect()
    }

    /// Per-cell fold of the format rule list.
    pub fn resolved_formats(&self) -> BTreeMap<CellRef, CellFormat> {
        resolve_formats(&self.format_rules)
    }

    /// Manifest grid size.
    pub fn grid_shape(&self) -> (u32, u32) {
        let grid = &self.properties.grid_properties;
        (grid.row_count, grid.column_count)
    }

    /// Smallest extent holding every non-empty value and the recorded extent.
    pub fn occupied_extent(&self) -> DataExtent {
        self.values
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .fold(self.data_extent, |extent, (cell, _)| extent.covering(*cell))
    }
}

/// A whole spreadsheet: manifest, sheets in manifest order, named ranges.
#[derive(Clone, Debug, PartialEq)]
pub struct Spreadsheet {
    pub spreadsheet_id: String,
    pub properties: SpreadsheetProperties,
    pub sheets: Vec<Sheet>,
    pub named_ranges: Vec<NamedRange>,
}

impl Spreadsheet {
    pub fn sheet_by_id(&self, sheet_id: u32) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.id() == Some(sheet_id))
    }

    pub fn sheet_by_title(&self, title: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.title() == title)
    }
}
