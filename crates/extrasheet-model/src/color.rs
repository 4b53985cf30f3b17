use core::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value as JsonValue};

/// Theme color slots understood by the remote.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThemeColor {
    Text,
    Background,
    Accent1,
    Accent2,
    Accent3,
    Accent4,
    Accent5,
    Accent6,
    Link,
}

impl ThemeColor {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeColor::Text => "TEXT",
            ThemeColor::Background => "BACKGROUND",
            ThemeColor::Accent1 => "ACCENT1",
            ThemeColor::Accent2 => "ACCENT2",
            ThemeColor::Accent3 => "ACCENT3",
            ThemeColor::Accent4 => "ACCENT4",
            ThemeColor::Accent5 => "ACCENT5",
            ThemeColor::Accent6 => "ACCENT6",
            ThemeColor::Link => "LINK",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "TEXT" => ThemeColor::Text,
            "BACKGROUND" => ThemeColor::Background,
            "ACCENT1" => ThemeColor::Accent1,
            "ACCENT2" => ThemeColor::Accent2,
            "ACCENT3" => ThemeColor::Accent3,
            "ACCENT4" => ThemeColor::Accent4,
            "ACCENT5" => ThemeColor::Accent5,
            "ACCENT6" => ThemeColor::Accent6,
            "LINK" => ThemeColor::Link,
            _ => return None,
        })
    }
}

/// A color, in exactly one canonical representation.
///
/// Serialized on disk as `#RRGGBB` (or `#RRGGBBAA` when not opaque) and
/// `theme:ACCENT1`. The remote's `{red, green, blue}` float form is accepted on
/// input and normalized; it is produced again only by [`Color::to_wire`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Color {
    Rgb {
        red: u8,
        green: u8,
        blue: u8,
        alpha: u8,
    },
    Theme(ThemeColor),
}

impl Color {
    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Color::Rgb {
            red,
            green,
            blue,
            alpha: 0xFF,
        }
    }

    pub const fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    pub const fn white() -> Self {
        Self::rgb(0xFF, 0xFF, 0xFF)
    }

    fn to_hex(self) -> String {
        match self {
            Color::Rgb {
                red,
                green,
                blue,
                alpha: 0xFF,
            } => format!("#{red:02X}{green:02X}{blue:02X}"),
            Color::Rgb {
                red,
                green,
                blue,
                alpha,
            } => format!("#{red:02X}{green:02X}{blue:02X}{alpha:02X}"),
            Color::Theme(theme) => format!("theme:{}", theme.as_str()),
        }
    }

    /// Build a color from the remote's float channels (`0.0..=1.0`, missing = 0).
    pub fn from_unit_channels(
        red: Option<f64>,
        green: Option<f64>,
        blue: Option<f64>,
        alpha: Option<f64>,
    ) -> Result<Self, ColorParseError> {
        let channel = |name: &'static str, v: Option<f64>, default: f64| {
            let v = v.unwrap_or(default);
            if !(0.0..=1.0).contains(&v) || !v.is_finite() {
                return Err(ColorParseError::ChannelOutOfRange { channel: name, value: v });
            }
            Ok((v * 255.0).round() as u8)
        };
        Ok(Color::Rgb {
            red: channel("red", red, 0.0)?,
            green: channel("green", green, 0.0)?,
            blue: channel("blue", blue, 0.0)?,
            alpha: channel("alpha", alpha, 1.0)?,
        })
    }

    /// The `ColorStyle` shape the remote expects in requests.
    pub fn to_wire(self) -> JsonValue {
        match self {
            Color::Rgb {
                red,
                green,
                blue,
                alpha,
            } => {
                let unit = |c: u8| f64::from(c) / 255.0;
                let mut rgb = json!({
                    "red": unit(red),
                    "green": unit(green),
                    "blue": unit(blue),
                });
                if alpha != 0xFF {
                    rgb["alpha"] = json!(unit(alpha));
                }
                json!({ "rgbColor": rgb })
            }
            Color::Theme(theme) => json!({ "themeColor": theme.as_str() }),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(theme) = s.strip_prefix("theme:") {
            return ThemeColor::parse(theme)
                .map(Color::Theme)
                .ok_or_else(|| ColorParseError::UnknownTheme(theme.to_string()));
        }
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| ColorParseError::NotCanonical(s.to_string()))?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ColorParseError::NotCanonical(s.to_string()));
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
        let parsed = (|| -> Result<Color, std::num::ParseIntError> {
            Ok(Color::Rgb {
                red: byte(0)?,
                green: byte(2)?,
                blue: byte(4)?,
                alpha: if hex.len() == 8 { byte(6)? } else { 0xFF },
            })
        })();
        parsed.map_err(|_| ColorParseError::NotCanonical(s.to_string()))
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Text(String),
            Channels {
                red: Option<f64>,
                green: Option<f64>,
                blue: Option<f64>,
                alpha: Option<f64>,
            },
        }

        match Helper::deserialize(deserializer)? {
            Helper::Text(s) => s.parse().map_err(D::Error::custom),
            Helper::Channels {
                red,
                green,
                blue,
                alpha,
            } => Color::from_unit_channels(red, green, blue, alpha).map_err(D::Error::custom),
        }
    }
}

/// Errors produced while normalizing a color.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ColorParseError {
    #[error("color {0:?} is not in canonical form (expected #RRGGBB, #RRGGBBAA or theme:NAME)")]
    NotCanonical(String),
    #[error("unknown theme color {0:?}")]
    UnknownTheme(String),
    #[error("color channel {channel} = {value} is outside 0..=1")]
    ChannelOutOfRange { channel: &'static str, value: f64 },
}
