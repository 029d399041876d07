pub(crate) mod color;
pub(crate) mod duration;
pub(crate) mod log;
pub(crate) mod outcome;
pub(crate) mod stats;

use self::{outcome::OutcomeFormatter, stats::StatsFormatter};
use crate::options::{OutputMode, StatsFormat};
use supports_color::Stream;

/// Detects whether a terminal supports color, and gives details about that
/// support. It takes into account the `NO_COLOR` environment variable.
fn supports_color() -> bool {
    supports_color::on(Stream::Stdout).is_some()
}

pub(crate) fn get_stats_formatter(
    format: &StatsFormat,
    mode: &OutputMode,
) -> Box<dyn StatsFormatter> {
    match format {
        StatsFormat::Compact => Box::new(stats::Compact::new(mode.clone())),
        StatsFormat::Detailed => Box::new(stats::Detailed::new(mode.clone())),
        StatsFormat::Json => Box::new(stats::Json::new()),
        StatsFormat::Markdown => Box::new(stats::Markdown::new()),
        StatsFormat::Raw => Box::new(stats::Raw::new()),
    }
}

/// Create an outcome formatter based on the given output mode
///
/// Falls back to plain output if the terminal does not support color.
pub(crate) fn get_outcome_formatter(mode: &OutputMode) -> Box<dyn OutcomeFormatter> {
    if !supports_color() {
        return Box::new(outcome::PlainFormatter);
    }
    match mode {
        OutputMode::Plain => Box::new(outcome::PlainFormatter),
        OutputMode::Color => Box::new(outcome::ColorFormatter),
        OutputMode::Emoji => Box::new(outcome::EmojiFormatter),
    }
}
