use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// Style per kind of CLI message
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub error: Style,
    pub warn: Style,
    /// Field labels and secondary text
    pub label: Style,
    /// Company and student names
    pub accent: Style,
}

impl Theme {
    /// Colors follow `console`'s terminal detection (CLICOLOR, CLICOLOR_FORCE)
    /// and are always off under `NO_COLOR`
    pub fn detect() -> Self {
        if console::colors_enabled() && std::env::var_os("NO_COLOR").is_none() {
            Self::colored()
        } else {
            Self::plain()
        }
    }

    fn colored() -> Self {
        Self {
            header: Style::new().cyan().bold(),
            success: Style::new().green().bold(),
            error: Style::new().red().bold(),
            warn: Style::new().yellow().bold(),
            label: Style::new().dimmed(),
            accent: Style::new().magenta().bold(),
        }
    }

    fn plain() -> Self {
        let none = Style::new();
        Self {
            header: none,
            success: none,
            error: none,
            warn: none,
            label: none,
            accent: none,
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
