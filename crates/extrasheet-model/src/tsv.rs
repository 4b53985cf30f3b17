//! `data.tsv`: one line per row, tab-separated, backslash escapes.

use std::collections::BTreeMap;

use crate::{CellRef, CellValue, DataExtent};

/// Escape a field so it contains no tab, newline or carriage return.
pub fn escape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for ch in field.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse of [`escape_field`]. Unknown escapes are kept literally.
pub fn unescape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Parse `data.tsv` into typed values and its extent.
pub fn parse(text: &str) -> (BTreeMap<CellRef, CellValue>, DataExtent) {
    let mut values = BTreeMap::new();
    let mut extent = DataExtent::default();
    let body = text.strip_suffix('\n').unwrap_or(text);
    if text.is_empty() {
        return (values, extent);
    }
    for (row, line) in body.split('\n').enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let mut width = 0u32;
        for (col, field) in line.split('\t').enumerate() {
            width = col as u32 + 1;
            let value = CellValue::from_tsv_field(&unescape_field(field));
            if !value.is_empty() {
                values.insert(CellRef::new(row as u32, col as u32), value);
            }
        }
        extent.rows = row as u32 + 1;
        extent.cols = extent.cols.max(width);
    }
    (values, extent)
}

/// Render values as `data.tsv`, every line padded to `extent.cols` fields.
pub fn render(values: &BTreeMap<CellRef, CellValue>, extent: DataExtent) -> String {
    let mut out = String::new();
    if extent.cols == 0 {
        return out;
    }
    for row in 0..extent.rows {
        for col in 0..extent.cols {
            if col > 0 {
                out.push('\t');
            }
            if let Some(value) = values.get(&CellRef::new(row, col)) {
                out.push_str(&escape_field(&value.to_tsv_field()));
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn parses_typed_grid() {
        let (values, extent) = parse("Name\tQty\nApple\t10\n\t\n");
        assert_eq!(extent, DataExtent { rows: 3, cols: 2 });
        assert_eq!(values[&CellRef::new(1, 1)], CellValue::Number(10.0));
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn ragged_lines_take_the_widest_extent() {
        let (_, extent) = parse("a\nb\tc\td\n");
        assert_eq!(extent, DataExtent { rows: 2, cols: 3 });
    }

    #[test]
    fn empty_file_is_an_empty_grid() {
        let (values, extent) = parse("");
        assert!(values.is_empty());
        assert_eq!(extent, DataExtent::default());
    }

    #[test]
    fn render_pads_to_the_extent() {
        let (values, _) = parse("x\n");
        let text = render(&values, DataExtent { rows: 2, cols: 3 });
        assert_eq!(text, "x\t\t\n\t\t\n");
        assert_eq!(parse(&text).1, DataExtent { rows: 2, cols: 3 });
    }

    #[test]
    fn control_characters_are_escaped() {
        let raw = "line1\nline2\twith tab\\ and \r";
        let escaped = escape_field(raw);
        assert!(!escaped.contains(['\n', '\t', '\r']));
        assert_eq!(unescape_field(&escaped), raw);
    }

    proptest! {
        #[test]
        fn escape_roundtrips(s in "\\PC*") {
            prop_assert_eq!(unescape_field(&escape_field(&s)), s);
        }
    }
}
