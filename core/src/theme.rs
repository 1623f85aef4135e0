// core/src/theme.rs
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! themes {
    ($($variant:ident => $name:literal, $label:literal;)+) => {
        /// Widget themes accepted by the `data-theme` attribute.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Theme {
            $(#[serde(rename = $name)] $variant,)+
        }

        impl Theme {
            pub const ALL: &'static [Theme] = &[$(Theme::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Theme::$variant => $name,)+
                }
            }

            pub fn label(&self) -> &'static str {
                match self {
                    $(Theme::$variant => $label,)+
                }
            }
        }
    };
}

themes! {
    Light => "light", "GitHub Light";
    LightHighContrast => "light_high_contrast", "GitHub Light High Contrast";
    LightProtanopia => "light_protanopia", "GitHub Light Protanopia & Deuteranopia";
    LightTritanopia => "light_tritanopia", "GitHub Light Tritanopia";
    Dark => "dark", "GitHub Dark";
    DarkHighContrast => "dark_high_contrast", "GitHub Dark High Contrast";
    DarkProtanopia => "dark_protanopia", "GitHub Dark Protanopia & Deuteranopia";
    DarkTritanopia => "dark_tritanopia", "GitHub Dark Tritanopia";
    DarkDimmed => "dark_dimmed", "GitHub Dark Dimmed";
    PreferredColorScheme => "preferred_color_scheme", "Preferred color scheme";
    TransparentDark => "transparent_dark", "Transparent Dark";
    NoborderLight => "noborder_light", "NoBorder Light";
    NoborderDark => "noborder_dark", "NoBorder Dark";
    NoborderGray => "noborder_gray", "NoBorder Gray";
    Cobalt => "cobalt", "Cobalt";
    PurpleDark => "purple_dark", "Purple Dark";
}

impl Default for Theme {
    fn default() -> Self {
        Theme::PreferredColorScheme
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_");
        Theme::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| ConfigError::UnknownTheme(s.to_string()))
    }
}

/// Settings taken straight from toggles, with no derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectConfig {
    pub theme: Theme,
    pub reactions_enabled: bool,
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            reactions_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_theme() {
        assert_eq!("dark_dimmed".parse::<Theme>(), Ok(Theme::DarkDimmed));
        assert_eq!("noborder-gray".parse::<Theme>(), Ok(Theme::NoborderGray));
        assert!("solarized".parse::<Theme>().is_err());
    }

    #[test]
    fn test_theme_names_unique() {
        let mut names: Vec<_> = Theme::ALL.iter().map(|t| t.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Theme::ALL.len());
    }

    #[test]
    fn test_defaults() {
        let direct = DirectConfig::default();
        assert_eq!(direct.theme, Theme::PreferredColorScheme);
        assert!(direct.reactions_enabled);
    }
}
