use ratatui::style::Color;
use serde::{Deserialize, Deserializer};

use super::ThemeName;

/// Colours the editor draws with. One palette per [`ThemeName`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub accent: Color,
    pub text: Color,
    pub muted: Color,
    pub error: Color,
    pub success: Color,
    pub drag: Color,
    pub selection_bg: Color,
}

impl Palette {
    pub fn for_theme(theme: ThemeName) -> Self {
        match theme {
            ThemeName::Dark => Self {
                accent: Color::Rgb(99, 60, 255),
                text: Color::White,
                muted: Color::Gray,
                error: Color::Rgb(255, 57, 57),
                success: Color::Green,
                drag: Color::Yellow,
                selection_bg: Color::Rgb(40, 32, 72),
            },
            ThemeName::Light => Self {
                accent: Color::Rgb(99, 60, 255),
                text: Color::Black,
                muted: Color::DarkGray,
                error: Color::Red,
                success: Color::Rgb(0, 128, 0),
                drag: Color::Rgb(190, 120, 0),
                selection_bg: Color::Rgb(239, 235, 255),
            },
            ThemeName::HighContrast => Self {
                accent: Color::Cyan,
                text: Color::White,
                muted: Color::White,
                error: Color::LightRed,
                success: Color::LightGreen,
                drag: Color::LightYellow,
                selection_bg: Color::Blue,
            },
            ThemeName::Solarized => Self {
                accent: Color::Rgb(38, 139, 210),
                text: Color::Rgb(147, 161, 161),
                muted: Color::Rgb(88, 110, 117),
                error: Color::Rgb(220, 50, 47),
                success: Color::Rgb(133, 153, 0),
                drag: Color::Rgb(181, 137, 0),
                selection_bg: Color::Rgb(7, 54, 66),
            },
        }
    }
}

/// Accepts any string for `theme`; names outside the registry fall back to dark.
pub(super) fn lenient<'de, D>(deserializer: D) -> Result<ThemeName, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.parse().unwrap_or_else(|_| {
        tracing::warn!(theme = %raw, "unknown theme in config, falling back to dark");
        ThemeName::Dark
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_theme_has_a_distinct_palette() {
        let palettes: Vec<_> = ThemeName::iter().map(Palette::for_theme).collect();
        for (i, a) in palettes.iter().enumerate() {
            for b in &palettes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
