use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::{CellRef, Color, Range};

/// Horizontal alignment of cell content.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HorizontalAlignment {
    Left,
    Center,
    Right,
}

/// Vertical alignment of cell content.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerticalAlignment {
    Top,
    Middle,
    Bottom,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WrapStrategy {
    OverflowCell,
    LegacyWrap,
    Clip,
    Wrap,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TextDirection {
    LeftToRight,
    RightToLeft,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HyperlinkDisplayType {
    Linked,
    PlainText,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NumberFormatType {
    Text,
    Number,
    Percent,
    Currency,
    Date,
    Time,
    DateTime,
    Scientific,
}

/// Number format; replaced as a whole by later rules.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NumberFormat {
    #[serde(rename = "type")]
    pub kind: NumberFormatType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BorderStyle {
    None,
    Dotted,
    Dashed,
    Solid,
    SolidMedium,
    SolidThick,
    Double,
}

/// One border side; a leaf of the cascade.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Border {
    pub style: BorderStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Borders {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<Border>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<Border>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Border>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Border>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Padding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<u32>,
}

/// Either an angle in degrees or vertically stacked text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextRotation {
    Angle(i32),
    Vertical(bool),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub uri: String,
}

/// Font properties. Each field cascades on its own.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextFormat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreground_color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
}

impl TextFormat {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply every property set in `patch` on top of `self`.
    pub fn overlay(&mut self, patch: &TextFormat) {
        overlay_opt(&mut self.foreground_color, &patch.foreground_color);
        overlay_opt(&mut self.font_family, &patch.font_family);
        overlay_opt(&mut self.font_size, &patch.font_size);
        overlay_opt(&mut self.bold, &patch.bold);
        overlay_opt(&mut self.italic, &patch.italic);
        overlay_opt(&mut self.strikethrough, &patch.strikethrough);
        overlay_opt(&mut self.underline, &patch.underline);
        overlay_opt(&mut self.link, &patch.link);
    }

    /// Wire shape (`TextFormat` with `foregroundColorStyle`).
    pub fn to_wire(&self) -> JsonValue {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let (Some(obj), Some(color)) = (value.as_object_mut(), self.foreground_color) {
            obj.remove("foregroundColor");
            obj.insert("foregroundColorStyle".to_string(), color.to_wire());
        }
        value
    }
}

/// A partial or resolved cell format.
///
/// Every property is optional: in a [`FormatRule`] an absent property means
/// "inherit", in a resolved format it means "default". Unknown properties are
/// carried in `extra` and cascade by top-level key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellFormat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_format: Option<NumberFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borders: Option<Borders>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<Padding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_alignment: Option<HorizontalAlignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_alignment: Option<VerticalAlignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_strategy: Option<WrapStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_direction: Option<TextDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hyperlink_display_type: Option<HyperlinkDisplayType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_rotation: Option<TextRotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_format: Option<TextFormat>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

impl CellFormat {
    /// True when no property is set (the default format).
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply every leaf property set in `patch` on top of `self`.
    pub fn overlay(&mut self, patch: &CellFormat) {
        overlay_opt(&mut self.number_format, &patch.number_format);
        overlay_opt(&mut self.background_color, &patch.background_color);
        if let Some(p) = &patch.borders {
            let b = self.borders.get_or_insert_with(Borders::default);
            overlay_opt(&mut b.top, &p.top);
            overlay_opt(&mut b.bottom, &p.bottom);
            overlay_opt(&mut b.left, &p.left);
            overlay_opt(&mut b.right, &p.right);
        }
        if let Some(p) = &patch.padding {
            let pad = self.padding.get_or_insert_with(Padding::default);
            overlay_opt(&mut pad.top, &p.top);
            overlay_opt(&mut pad.right, &p.right);
            overlay_opt(&mut pad.bottom, &p.bottom);
            overlay_opt(&mut pad.left, &p.left);
        }
        overlay_opt(&mut self.horizontal_alignment, &patch.horizontal_alignment);
        overlay_opt(&mut self.vertical_alignment, &patch.vertical_alignment);
        overlay_opt(&mut self.wrap_strategy, &patch.wrap_strategy);
        overlay_opt(&mut self.text_direction, &patch.text_direction);
        overlay_opt(&mut self.hyperlink_display_type, &patch.hyperlink_display_type);
        overlay_opt(&mut self.text_rotation, &patch.text_rotation);
        if let Some(p) = &patch.text_format {
            self.text_format
                .get_or_insert_with(TextFormat::default)
                .overlay(p);
        }
        for (key, value) in &patch.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    /// The `userEnteredFormat` body sent to the remote. Colors are the only
    /// fields whose wire shape differs from the on-disk one.
    pub fn to_wire(&self) -> JsonValue {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        let Some(obj) = value.as_object_mut() else {
            return value;
        };
        if let Some(color) = self.background_color {
            obj.remove("backgroundColor");
            obj.insert("backgroundColorStyle".to_string(), color.to_wire());
        }
        if let Some(borders) = &self.borders {
            let mut sides = JsonMap::new();
            for (name, side) in [
                ("top", &borders.top),
                ("bottom", &borders.bottom),
                ("left", &borders.left),
                ("right", &borders.right),
            ] {
                if let Some(border) = side {
                    sides.insert(name.to_string(), border_to_wire(border));
                }
            }
            obj.insert("borders".to_string(), JsonValue::Object(sides));
        }
        if let Some(text_format) = &self.text_format {
            obj.insert("textFormat".to_string(), text_format.to_wire());
        }
        value
    }
}

fn border_to_wire(border: &Border) -> JsonValue {
    let mut value = serde_json::to_value(border).unwrap_or_default();
    if let (Some(obj), Some(color)) = (value.as_object_mut(), border.color) {
        obj.remove("color");
        obj.insert("colorStyle".to_string(), color.to_wire());
    }
    value
}

fn overlay_opt<T: Clone>(base: &mut Option<T>, patch: &Option<T>) {
    if let Some(v) = patch {
        *base = Some(v.clone());
    }
}

/// One entry of a sheet's ordered format rule list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormatRule {
    pub range: Range,
    pub format: CellFormat,
}

/// Fold `rules` in order into a per-cell format. Cells whose resolution is
/// the default format are omitted.
pub fn resolve_formats(rules: &[FormatRule]) -> BTreeMap<CellRef, CellFormat> {
    let mut resolved: BTreeMap<CellRef, CellFormat> = BTreeMap::new();
    for rule in rules {
        for cell in rule.range.cells() {
            resolved.entry(cell).or_default().overlay(&rule.format);
        }
    }
    resolved.retain(|_, format| !format.is_empty());
    resolved
}

/// A run of rich text inside one cell, starting at a character offset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextFormatRun {
    #[serde(default)]
    pub start_index: u32,
    #[serde(default)]
    pub format: TextFormat,
}

impl TextFormatRun {
    pub fn to_wire(&self) -> JsonValue {
        let mut obj = JsonMap::new();
        if self.start_index != 0 {
            obj.insert("startIndex".to_string(), self.start_index.into());
        }
        obj.insert("format".to_string(), self.format.to_wire());
        JsonValue::Object(obj)
    }
}
