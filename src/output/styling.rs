//! Terminal tones shared by the banner, the phase spinner and the summary.

use std::fmt::Display;

use console::{Style, StyledObject};

use crate::harvest::BuildCounts;

/// What a piece of terminal text means, rather than which color it gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Tool name in the banner
    Brand,
    /// Section titles and their emoji
    Heading,
    /// Labels, versions and secondary figures
    Muted,
    /// Job names and list bullets
    Name,
    /// A running phase, partial records or a hint worth typing
    Pending,
    /// A finished phase or a run without problems
    Done,
    Failed,
}

impl Tone {
    pub fn style(self) -> Style {
        let style = Style::new();
        match self {
            Self::Brand => style.magenta().bold(),
            Self::Heading => style.bright(),
            Self::Muted => style.dim(),
            Self::Name => style.cyan(),
            Self::Pending => style.yellow().bright(),
            Self::Done => style.green().bright(),
            Self::Failed => style.red().bright(),
        }
    }

    pub fn paint(self, text: impl Display) -> StyledObject<String> {
        self.style().apply_to(text.to_string())
    }
}

/// Tone and wording of a run's status; failures outrank partial records.
pub fn run_status(counts: &BuildCounts) -> (Tone, String) {
    if counts.failed > 0 {
        (Tone::Failed, format!("{} failed", counts.failed))
    } else if counts.partial > 0 {
        (Tone::Pending, format!("{} partial", counts.partial))
    } else {
        (Tone::Done, "all good".to_string())
    }
}
