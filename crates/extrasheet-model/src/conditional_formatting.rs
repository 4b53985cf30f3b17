use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::{CellFormat, Color, Range};

/// Load-time identity of a conditional format rule.
///
/// Rule order on the remote is positional, so a rule is identified by the
/// `ruleIndex` it carried when the folder was last fetched. The generator maps
/// it back to a live index when building requests.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CfRuleId(pub u32);

impl fmt::Display for CfRuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule#{}", self.0)
    }
}

/// One value operand of a boolean condition.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_entered_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_date: Option<String>,
}

impl ConditionValue {
    pub fn user_entered(value: impl Into<String>) -> Self {
        Self {
            user_entered_value: Some(value.into()),
            relative_date: None,
        }
    }
}

/// A condition such as `NUMBER_GREATER [100]` or `CUSTOM_FORMULA ["=A1>0"]`.
///
/// The condition type is kept as written so types the remote adds later
/// still round-trip; support is checked when requests are built.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BooleanCondition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ConditionValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BooleanRule {
    pub condition: BooleanCondition,
    #[serde(default)]
    pub format: CellFormat,
}

/// A color stop of a gradient rule.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterpolationPoint {
    pub color: Color,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl InterpolationPoint {
    fn to_wire(&self) -> JsonValue {
        let mut value = json!({ "colorStyle": self.color.to_wire(), "type": self.kind });
        if let Some(v) = &self.value {
            value["value"] = json!(v);
        }
        value
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GradientRule {
    pub minpoint: InterpolationPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub midpoint: Option<InterpolationPoint>,
    pub maxpoint: InterpolationPoint,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CfRuleKind {
    Boolean(BooleanRule),
    Gradient(GradientRule),
}

/// A conditional format rule as held in the model.
#[derive(Clone, Debug, PartialEq)]
pub struct ConditionalFormatRule {
    /// `None` for rules added locally since the last fetch.
    pub id: Option<CfRuleId>,
    pub ranges: Vec<Range>,
    pub kind: CfRuleKind,
}

impl ConditionalFormatRule {
    /// Equality ignoring identity: same ranges, same rule body.
    pub fn same_content(&self, other: &Self) -> bool {
        self.ranges == other.ranges && self.kind == other.kind
    }

    /// The `ConditionalFormatRule` wire shape for `sheet_id`.
    pub fn to_wire(&self, sheet_id: u32) -> JsonValue {
        let ranges: Vec<JsonValue> = self
            .ranges
            .iter()
            .map(|r| json!(r.to_grid_range(sheet_id)))
            .collect();
        match &self.kind {
            CfRuleKind::Boolean(rule) => json!({
                "ranges": ranges,
                "booleanRule": {
                    "condition": rule.condition,
                    "format": rule.format.to_wire(),
                },
            }),
            CfRuleKind::Gradient(rule) => {
                let mut gradient = json!({
                    "minpoint": rule.minpoint.to_wire(),
                    "maxpoint": rule.maxpoint.to_wire(),
                });
                if let Some(mid) = &rule.midpoint {
                    gradient["midpoint"] = mid.to_wire();
                }
                json!({ "ranges": ranges, "gradientRule": gradient })
            }
        }
    }
}

/// On-disk entry of `format.json` `conditionalFormats`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalFormatEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_index: Option<u32>,
    pub ranges: Vec<Range>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean_rule: Option<BooleanRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient_rule: Option<GradientRule>,
}

impl ConditionalFormatEntry {
    /// Convert into the model form; exactly one rule kind must be present.
    pub fn into_rule(self) -> Result<ConditionalFormatRule, &'static str> {
        let kind = match (self.boolean_rule, self.gradient_rule) {
            (Some(b), None) => CfRuleKind::Boolean(b),
            (None, Some(g)) => CfRuleKind::Gradient(g),
            (Some(_), Some(_)) => return Err("both booleanRule and gradientRule are set"),
            (None, None) => return Err("one of booleanRule or gradientRule is required"),
        };
        if self.ranges.is_empty() {
            return Err("ranges must not be empty");
        }
        Ok(ConditionalFormatRule {
            id: self.rule_index.map(CfRuleId),
            ranges: self.ranges,
            kind,
        })
    }

    pub fn from_rule(rule: &ConditionalFormatRule) -> Self {
        let (boolean_rule, gradient_rule) = match &rule.kind {
            CfRuleKind::Boolean(b) => (Some(b.clone()), None),
            CfRuleKind::Gradient(g) => (None, Some(g.clone())),
        };
        Self {
            rule_index: rule.id.map(|id| id.0),
            ranges: rule.ranges.clone(),
            boolean_rule,
            gradient_rule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn entries_without_index_are_new_rules() {
        let entry: ConditionalFormatEntry = serde_json::from_value(json!({
            "ranges": ["A1:A10"],
            "booleanRule": {
                "condition": {"type": "NUMBER_GREATER", "values": [{"userEnteredValue": "5"}]},
                "format": {"textFormat": {"bold": true}}
            }
        }))
        .unwrap();
        let rule = entry.into_rule().unwrap();
        assert_eq!(rule.id, None);

        let indexed: ConditionalFormatEntry = serde_json::from_value(json!({
            "ruleIndex": 3,
            "ranges": ["B1"],
            "gradientRule": {
                "minpoint": {"color": "#FFFFFF", "type": "MIN"},
                "maxpoint": {"color": "#00FF00", "type": "MAX"}
            }
        }))
        .unwrap();
        assert_eq!(indexed.into_rule().unwrap().id, Some(CfRuleId(3)));
    }

    #[test]
    fn rule_kind_must_be_unambiguous() {
        let entry = ConditionalFormatEntry {
            rule_index: None,
            ranges: vec![Range::from_a1("A1").unwrap()],
            boolean_rule: None,
            gradient_rule: None,
        };
        assert!(entry.into_rule().is_err());
    }

    #[test]
    fn wire_shape_uses_grid_ranges() {
        let rule = ConditionalFormatRule {
            id: Some(CfRuleId(0)),
            ranges: vec![Range::from_a1("B2:B3").unwrap()],
            kind: CfRuleKind::Gradient(GradientRule {
                minpoint: InterpolationPoint {
                    color: Color::white(),
                    kind: "MIN".into(),
                    value: None,
                },
                midpoint: None,
                maxpoint: InterpolationPoint {
                    color: Color::black(),
                    kind: "NUMBER".into(),
                    value: Some("10".into()),
                },
            }),
        };
        let wire = rule.to_wire(4);
        assert_eq!(
            wire["ranges"][0],
            json!({"sheetId": 4, "startRowIndex": 1, "endRowIndex": 3, "startColumnIndex": 1, "endColumnIndex": 2})
        );
        assert_eq!(wire["gradientRule"]["maxpoint"]["value"], json!("10"));
        assert_eq!(
            wire["gradientRule"]["minpoint"]["colorStyle"],
            json!({"rgbColor": {"red": 1.0, "green": 1.0, "blue": 1.0}})
        );
    }
}
