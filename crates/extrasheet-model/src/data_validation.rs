use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::{BooleanCondition, CellRef, Range};

/// A data validation rule, shared by every cell of its group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataValidationRule {
    pub condition: BooleanCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_custom_ui: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

impl DataValidationRule {
    pub fn to_wire(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or_else(|_| JsonValue::Object(JsonMap::new()))
    }
}

/// Cells sharing one validation rule. Not rectangular in general.
#[derive(Clone, Debug, PartialEq)]
pub struct DataValidationGroup {
    pub cells: BTreeSet<CellRef>,
    pub rule: DataValidationRule,
}

/// On-disk entry of `data_validation.json`.
///
/// `cells` is written as individual addresses; ranges are accepted on read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataValidationEntry {
    pub cells: Vec<Range>,
    pub rule: DataValidationRule,
}

impl DataValidationEntry {
    pub fn into_group(self) -> DataValidationGroup {
        DataValidationGroup {
            cells: self.cells.iter().flat_map(|r| r.cells()).collect(),
            rule: self.rule,
        }
    }

    pub fn from_group(group: &DataValidationGroup) -> Self {
        Self {
            cells: group.cells.iter().copied().map(Range::cell).collect(),
            rule: group.rule.clone(),
        }
    }
}

/// Per-cell view of a sheet's validation groups.
///
/// Fails with the first cell claimed by two groups.
pub fn validation_by_cell(
    groups: &[DataValidationGroup],
) -> Result<BTreeMap<CellRef, &DataValidationRule>, CellRef> {
    let mut out = BTreeMap::new();
    for group in groups {
        for &cell in &group.cells {
            if out.insert(cell, &group.rule).is_some() {
                return Err(cell);
            }
        }
    }
    Ok(out)
}
