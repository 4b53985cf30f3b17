//! Presentation layers: formats, merges, conditional formats, dimensions and
//! data validation.

use std::collections::{BTreeMap, BTreeSet};

use extrasheet_model::{
    cover_rectangles, dimensions::group_runs, validation_by_cell, CellFormat, CellRef, CfRuleId,
    ConditionalFormatRule, DataValidationRule, Dimension, DimensionGroup, DimensionProps,
    DimensionSpan, Range, Sheet,
};

use super::DiffError;

/// Cells of `range` resolve to `format` after the push. A default `format`
/// means "clear formatting".
#[derive(Clone, Debug, PartialEq)]
pub struct FormatChange {
    pub range: Range,
    pub format: CellFormat,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeChanges {
    pub added: Vec<Range>,
    pub removed: Vec<Range>,
}

impl MergeChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Conditional format changes, keyed by load-time surrogate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConditionalFormatChanges {
    pub removed: Vec<CfRuleId>,
    pub updated: Vec<(CfRuleId, ConditionalFormatRule)>,
    /// New rules with their final position in the sheet's rule list.
    pub added: Vec<(usize, ConditionalFormatRule)>,
    /// Final order of surviving rules, when it differs from the pristine order.
    pub reordered: Option<Vec<CfRuleId>>,
}

impl ConditionalFormatChanges {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
            && self.updated.is_empty()
            && self.added.is_empty()
            && self.reordered.is_none()
    }

    pub fn len(&self) -> usize {
        self.removed.len()
            + self.updated.len()
            + self.added.len()
            + usize::from(self.reordered.is_some())
    }
}

/// A run of rows or columns that ends up with `props`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DimensionChange {
    pub span: DimensionSpan,
    pub props: DimensionProps,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupChanges {
    pub added: Vec<DimensionGroup>,
    /// Same span, different collapsed state or depth.
    pub updated: Vec<DimensionGroup>,
    pub removed: Vec<DimensionGroup>,
}

impl GroupChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }
}

/// Cells of `range` end up validated by `rule` (`None` clears validation).
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationChange {
    pub range: Range,
    pub rule: Option<DataValidationRule>,
}

pub(crate) fn diff_formats(old: &Sheet, new: &Sheet) -> Vec<FormatChange> {
    let before = old.resolved_formats();
    let after = new.resolved_formats();
    let default = CellFormat::default();

    let cells: BTreeSet<CellRef> = before.keys().chain(after.keys()).copied().collect();
    let changed: BTreeMap<CellRef, CellFormat> = cells
        .into_iter()
        .filter_map(|cell| {
            let a = before.get(&cell).unwrap_or(&default);
            let b = after.get(&cell).unwrap_or(&default);
            (a != b).then(|| (cell, b.clone()))
        })
        .collect();

    cover_rectangles(&changed)
        .into_iter()
        .map(|(range, format)| FormatChange { range, format })
        .collect()
}

pub(crate) fn diff_merges(old: &Sheet, new: &Sheet) -> MergeChanges {
    MergeChanges {
        added: new.merges.difference(&old.merges).copied().collect(),
        removed: old.merges.difference(&new.merges).copied().collect(),
    }
}

pub(crate) fn diff_conditional_formats(
    old: &Sheet,
    new: &Sheet,
) -> Result<ConditionalFormatChanges, DiffError> {
    let before: Vec<(CfRuleId, &ConditionalFormatRule)> = old
        .conditional_format_ids()
        .into_iter()
        .zip(&old.conditional_formats)
        .collect();
    // Only rules that carried a `ruleIndex` can be referred to by one.
    let lookup: BTreeMap<CfRuleId, &ConditionalFormatRule> = before
        .iter()
        .filter(|(_, rule)| rule.id.is_some())
        .copied()
        .collect();
    let mut unindexed: Vec<(CfRuleId, &ConditionalFormatRule)> = before
        .iter()
        .filter(|(_, rule)| rule.id.is_none())
        .copied()
        .collect();

    let mut changes = ConditionalFormatChanges::default();
    let mut survivors = Vec::new();
    for (position, rule) in new.conditional_formats.iter().enumerate() {
        let Some(id) = rule.id else {
            // An unindexed snapshot rule survives while its content is unchanged.
            match unindexed
                .iter()
                .position(|(_, old_rule)| old_rule.same_content(rule))
            {
                Some(i) => survivors.push(unindexed.remove(i).0),
                None => changes.added.push((position, rule.clone())),
            }
            continue;
        };
        let Some(old_rule) = lookup.get(&id) else {
            return Err(DiffError::UnresolvedEntity {
                sheet: new.title().to_string(),
                kind: "conditional format rule",
                id: id.to_string(),
            });
        };
        if !old_rule.same_content(rule) {
            changes.updated.push((id, rule.clone()));
        }
        survivors.push(id);
    }

    for (id, _) in &before {
        if !survivors.contains(id) {
            changes.removed.push(*id);
        }
    }

    let pristine_order: Vec<CfRuleId> = before
        .iter()
        .map(|(id, _)| *id)
        .filter(|id| survivors.contains(id))
        .collect();
    if pristine_order != survivors {
        changes.reordered = Some(survivors);
    }
    Ok(changes)
}

pub(crate) fn diff_dimension_metadata(
    dimension: Dimension,
    old: &BTreeMap<u32, DimensionProps>,
    new: &BTreeMap<u32, DimensionProps>,
) -> Vec<DimensionChange> {
    let indices: BTreeSet<u32> = old.keys().chain(new.keys()).copied().collect();
    let changed: BTreeMap<u32, DimensionProps> = indices
        .into_iter()
        .filter_map(|i| {
            let a = old.get(&i).copied().unwrap_or_default();
            let b = new.get(&i).copied().unwrap_or_default();
            (a != b).then_some((i, b))
        })
        .collect();
    group_runs(dimension, &changed)
        .into_iter()
        .map(|(span, props)| DimensionChange { span, props })
        .collect()
}

pub(crate) fn diff_groups(old: &[DimensionGroup], new: &[DimensionGroup]) -> GroupChanges {
    let before: BTreeMap<DimensionSpan, &DimensionGroup> = old.iter().map(|g| (g.span, g)).collect();
    let after: BTreeMap<DimensionSpan, &DimensionGroup> = new.iter().map(|g| (g.span, g)).collect();

    let mut changes = GroupChanges::default();
    for (span, group) in &after {
        match before.get(span) {
            None => changes.added.push(**group),
            Some(old) if old != group => changes.updated.push(**group),
            Some(_) => {}
        }
    }
    for (span, group) in &before {
        if !after.contains_key(span) {
            changes.removed.push(**group);
        }
    }
    changes
}

pub(crate) fn diff_validation(old: &Sheet, new: &Sheet) -> Result<Vec<ValidationChange>, DiffError> {
    let before = validation_by_cell(&old.data_validation).map_err(|cell| {
        DiffError::OverlappingValidation {
            sheet: old.title().to_string(),
            cell,
        }
    })?;
    let after = validation_by_cell(&new.data_validation).map_err(|cell| {
        DiffError::OverlappingValidation {
            sheet: new.title().to_string(),
            cell,
        }
    })?;

    let cells: BTreeSet<CellRef> = before.keys().chain(after.keys()).copied().collect();
    let changed: BTreeMap<CellRef, Option<DataValidationRule>> = cells
        .into_iter()
        .filter_map(|cell| {
            let a = before.get(&cell).copied();
            let b = after.get(&cell).copied();
            (a != b).then(|| (cell, b.cloned()))
        })
        .collect();

    Ok(cover_rectangles(&changed)
        .into_iter()
        .map(|(range, rule)| ValidationChange { range, rule })
        .collect())
}
