use owo_colors::Style;
use std::sync::OnceLock;

use crate::symbol::Classification;

static THEME: OnceLock<Theme> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub error: Style,
    pub warn: Style,
    pub info: Style,
    pub dim: Style,
    pub muted: Style,
    pub nonterminal: Style,
    pub terminal: Style,
    pub other_symbol: Style,
}

impl Theme {
    pub fn detect() -> Self {
        if !console::Term::stdout().is_term() {
            return Self::plain();
        }
        Self::colored()
    }

    pub fn colored() -> Self {
        Self {
            header: Style::new().cyan().bold(),
            success: Style::new().green().bold(),
            error: Style::new().red().bold(),
            warn: Style::new().yellow().bold(),
            info: Style::new().magenta(),
            dim: Style::new().white().dimmed(),
            muted: Style::new().bright_black(),
            nonterminal: Style::new().blue().bold(),
            terminal: Style::new().green(),
            other_symbol: Style::new().magenta(),
        }
    }

    pub fn plain() -> Self {
        Self {
            header: Style::new(),
            success: Style::new(),
            error: Style::new(),
            warn: Style::new(),
            info: Style::new(),
            dim: Style::new(),
            muted: Style::new(),
            nonterminal: Style::new(),
            terminal: Style::new(),
            other_symbol: Style::new(),
        }
    }

    /// Style for a symbol name of the given classification
    pub fn symbol(&self, classification: Classification) -> Style {
        match classification {
            Classification::Nonterminal => self.nonterminal.clone(),
            Classification::Terminal => self.terminal.clone(),
            Classification::Mode | Classification::Channel => self.other_symbol.clone(),
            _ => self.muted.clone(),
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
