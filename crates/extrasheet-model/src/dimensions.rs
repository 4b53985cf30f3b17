use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::{A1ParseError, Dimension, DimensionSpan};

/// Default row height in pixels.
pub const DEFAULT_ROW_HEIGHT: u32 = 21;
/// Default column width in pixels.
pub const DEFAULT_COLUMN_WIDTH: u32 = 100;

/// Non-default properties of one row or column.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DimensionProps {
    pub pixel_size: Option<u32>,
    pub hidden: Option<bool>,
}

impl DimensionProps {
    pub fn is_default(&self) -> bool {
        self.pixel_size.is_none() && !self.hidden.unwrap_or(false)
    }

    /// `DimensionProperties` body and its field mask. Unset properties are
    /// sent as their defaults so that clearing a height or unhiding works.
    pub fn to_wire(&self, dimension: Dimension) -> (JsonValue, &'static str) {
        let default_size = match dimension {
            Dimension::Rows => DEFAULT_ROW_HEIGHT,
            Dimension::Columns => DEFAULT_COLUMN_WIDTH,
        };
        (
            json!({
                "pixelSize": self.pixel_size.unwrap_or(default_size),
                "hiddenByUser": self.hidden.unwrap_or(false),
            }),
            "pixelSize,hiddenByUser",
        )
    }
}

/// On-disk `rowMetadata` / `columnMetadata` entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionEntry {
    pub range: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

/// On-disk `rowGroups` / `columnGroups` entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DimensionGroupEntry {
    pub range: String,
    pub depth: u32,
    #[serde(default)]
    pub collapsed: bool,
}

/// A row or column group, identified by its span.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DimensionGroup {
    pub span: DimensionSpan,
    pub depth: u32,
    pub collapsed: bool,
}

/// Layout of `dimensions.json`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionsFile {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub row_metadata: Vec<DimensionEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column_metadata: Vec<DimensionEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub row_groups: Vec<DimensionGroupEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column_groups: Vec<DimensionGroupEntry>,
}

impl DimensionsFile {
    pub fn is_empty(&self) -> bool {
        self.row_metadata.is_empty()
            && self.column_metadata.is_empty()
            && self.row_groups.is_empty()
            && self.column_groups.is_empty()
    }
}

/// Expand span entries into per-index properties. Later entries win.
pub fn expand_metadata(
    dimension: Dimension,
    entries: &[DimensionEntry],
) -> Result<BTreeMap<u32, DimensionProps>, (usize, A1ParseError)> {
    let mut out = BTreeMap::new();
    for (i, entry) in entries.iter().enumerate() {
        let span = DimensionSpan::parse(dimension, &entry.range).map_err(|e| (i, e))?;
        // `hidden: false` is the same as leaving it out.
        let props = DimensionProps {
            pixel_size: entry.pixel_size,
            hidden: entry.hidden.filter(|&hidden| hidden),
        };
        for index in span.indices() {
            out.insert(index, props);
        }
    }
    out.retain(|_, p: &mut DimensionProps| !p.is_default());
    Ok(out)
}

/// Group consecutive indices with identical properties into spans.
pub fn group_runs(
    dimension: Dimension,
    props: &BTreeMap<u32, DimensionProps>,
) -> Vec<(DimensionSpan, DimensionProps)> {
    let mut out: Vec<(DimensionSpan, DimensionProps)> = Vec::new();
    for (&index, &p) in props {
        match out.last_mut() {
            Some((span, last)) if span.end == index && *last == p => span.end += 1,
            _ => out.push((DimensionSpan::new(dimension, index, index + 1), p)),
        }
    }
    out
}

pub fn compress_metadata(
    dimension: Dimension,
    props: &BTreeMap<u32, DimensionProps>,
) -> Vec<DimensionEntry> {
    group_runs(dimension, props)
        .into_iter()
        .map(|(span, p)| DimensionEntry {
            range: span.to_string(),
            pixel_size: p.pixel_size,
            hidden: p.hidden,
        })
        .collect()
}

pub fn parse_groups(
    dimension: Dimension,
    entries: &[DimensionGroupEntry],
) -> Result<Vec<DimensionGroup>, (usize, A1ParseError)> {
    let mut out = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            Ok(DimensionGroup {
                span: DimensionSpan::parse(dimension, &entry.range).map_err(|e| (i, e))?,
                depth: entry.depth,
                collapsed: entry.collapsed,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    out.sort();
    Ok(out)
}

pub fn group_entries(groups: &[DimensionGroup]) -> Vec<DimensionGroupEntry> {
    groups
        .iter()
        .map(|g| DimensionGroupEntry {
            range: g.span.to_string(),
            depth: g.depth,
            collapsed: g.collapsed,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn metadata_runs_roundtrip() {
        let entries = vec![
            DimensionEntry {
                range: "A:C".into(),
                pixel_size: Some(150),
                hidden: None,
            },
            DimensionEntry {
                range: "E".into(),
                pixel_size: None,
                hidden: Some(true),
            },
        ];
        let props = expand_metadata(Dimension::Columns, &entries).unwrap();
        assert_eq!(props.len(), 4);
        assert_eq!(props[&1].pixel_size, Some(150));
        assert_eq!(compress_metadata(Dimension::Columns, &props), entries);
    }

    #[test]
    fn default_entries_are_dropped() {
        let entries = vec![DimensionEntry {
            range: "3".into(),
            pixel_size: None,
            hidden: Some(false),
        }];
        assert!(expand_metadata(Dimension::Rows, &entries).unwrap().is_empty());
    }

    #[test]
    fn explicit_visible_equals_unset() {
        let sized = |hidden| DimensionEntry {
            range: "A".into(),
            pixel_size: Some(160),
            hidden,
        };
        assert_eq!(
            expand_metadata(Dimension::Columns, &[sized(Some(false))]).unwrap(),
            expand_metadata(Dimension::Columns, &[sized(None)]).unwrap()
        );
    }

    #[test]
    fn bad_spans_report_their_entry() {
        let entries = vec![DimensionGroupEntry {
            range: "B:C".into(),
            depth: 1,
            collapsed: false,
        }];
        assert_eq!(parse_groups(Dimension::Rows, &entries).unwrap_err().0, 0);
    }

    #[test]
    fn cleared_properties_go_out_as_defaults() {
        let (body, fields) = DimensionProps::default().to_wire(Dimension::Rows);
        assert_eq!(body, json!({"pixelSize": 21, "hiddenByUser": false}));
        assert_eq!(fields, "pixelSize,hiddenByUser");
    }
}
