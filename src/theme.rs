//! Color themes, selectable with `--theme`.

use ratatui::style::Color;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    /// Muted modern palette
    #[default]
    Nord,
    /// White on blue
    DosBlue,
    /// Amber on black
    AmberCrt,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nord" => Ok(Theme::Nord),
            "dos" | "dosblue" | "dos-blue" => Ok(Theme::DosBlue),
            "amber" | "ambercrt" | "amber-crt" => Ok(Theme::AmberCrt),
            _ => Err(format!(
                "unknown theme '{s}' (available: nord, dos-blue, amber-crt)"
            )),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Theme::Nord => "nord",
            Theme::DosBlue => "dos-blue",
            Theme::AmberCrt => "amber-crt",
        };
        f.write_str(name)
    }
}

impl Theme {
    pub fn colors(&self) -> ColorScheme {
        match self {
            Theme::Nord => ColorScheme::nord(),
            Theme::DosBlue => ColorScheme::dos_blue(),
            Theme::AmberCrt => ColorScheme::amber_crt(),
        }
    }
}

/// Colors for the tree view of state-transition payloads.
#[derive(Debug, Clone, Copy)]
pub struct JsonPalette {
    pub key: Color,
    pub string: Color,
    pub number: Color,
    pub boolean: Color,
    pub null: Color,
    /// Expand markers and container labels
    pub structure: Color,
}

#[derive(Debug, Clone, Copy)]
pub struct ColorScheme {
    pub background: Color,
    pub text: Color,
    pub text_dim: Color,
    /// Active tab, focused overlay border
    pub accent: Color,
    pub border: Color,
    pub selection_bg: Color,
    pub selection_fg: Color,
    pub success: Color,
    pub failure: Color,
    pub pending: Color,
    /// Kind badge for message-type transactions
    pub message: Color,
    pub toast: Color,
    pub json: JsonPalette,
}

impl ColorScheme {
    pub fn nord() -> Self {
        Self {
            background: Color::Reset,
            text: Color::White,
            text_dim: Color::Gray,
            accent: Color::Cyan,
            border: Color::DarkGray,
            selection_bg: Color::Rgb(59, 66, 82),
            selection_fg: Color::White,
            success: Color::Green,
            failure: Color::Red,
            pending: Color::Yellow,
            message: Color::Magenta,
            toast: Color::Green,
            json: JsonPalette {
                key: Color::Cyan,
                string: Color::Green,
                number: Color::Yellow,
                boolean: Color::Magenta,
                null: Color::Blue,
                structure: Color::Gray,
            },
        }
    }

    pub fn dos_blue() -> Self {
        Self {
            background: Color::Blue,
            text: Color::White,
            text_dim: Color::LightBlue,
            accent: Color::Yellow,
            border: Color::Cyan,
            selection_bg: Color::Cyan,
            selection_fg: Color::Black,
            success: Color::LightGreen,
            failure: Color::LightRed,
            pending: Color::Yellow,
            message: Color::LightMagenta,
            toast: Color::LightGreen,
            json: JsonPalette {
                key: Color::Yellow,
                string: Color::LightGreen,
                number: Color::LightCyan,
                boolean: Color::LightMagenta,
                null: Color::Gray,
                structure: Color::White,
            },
        }
    }

    pub fn amber_crt() -> Self {
        let amber = Color::Rgb(255, 176, 0);
        let amber_bright = Color::Rgb(255, 200, 100);
        let amber_dim = Color::Rgb(180, 120, 0);

        Self {
            background: Color::Black,
            text: amber,
            text_dim: amber_dim,
            accent: amber_bright,
            border: amber_dim,
            selection_bg: amber,
            selection_fg: Color::Black,
            success: Color::Rgb(100, 255, 100),
            failure: Color::Red,
            pending: amber_bright,
            message: Color::Rgb(255, 100, 255),
            toast: Color::Rgb(100, 255, 100),
            json: JsonPalette {
                key: amber_bright,
                string: amber,
                number: amber,
                boolean: amber_bright,
                null: amber_dim,
                structure: amber_dim,
            },
        }
    }

    /// Color for an execution status; `None` is pending.
    pub fn status(&self, status: Option<bool>) -> Color {
        match status {
            Some(true) => self.success,
            Some(false) => self.failure,
            None => self.pending,
        }
    }
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::nord()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("nord".parse::<Theme>(), Ok(Theme::Nord));
        assert_eq!("NORD".parse::<Theme>(), Ok(Theme::Nord));
        assert_eq!("dos".parse::<Theme>(), Ok(Theme::DosBlue));
        assert_eq!("amber-crt".parse::<Theme>(), Ok(Theme::AmberCrt));
        assert!("solarized".parse::<Theme>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for t in [Theme::Nord, Theme::DosBlue, Theme::AmberCrt] {
            assert_eq!(t.to_string().parse::<Theme>(), Ok(t));
        }
    }

    #[test]
    fn status_colors_are_distinct() {
        let c = ColorScheme::nord();
        assert_ne!(c.status(Some(true)), c.status(Some(false)));
        assert_ne!(c.status(None), c.status(Some(true)));
    }
}
