use std::fmt;

/// Wrapper around an elapsed [`std::time::Duration`] for compact formatting.
///
/// Sub-second durations are shown in milliseconds, everything else is
/// rounded down to whole seconds.
///
/// # Examples
///
/// ```ignore
/// let duration = Duration::from_secs(61);
/// assert_eq!(duration.to_string(), "1m 1s");
/// ```
pub(crate) struct Duration {
    elapsed: std::time::Duration,
}

impl Duration {
    /// Create a new `Duration` from the given number of seconds.
    #[cfg(test)]
    pub(crate) const fn from_secs(elapsed: u64) -> Self {
        Self {
            elapsed: std::time::Duration::from_secs(elapsed),
        }
    }
}

impl From<std::time::Duration> for Duration {
    fn from(elapsed: std::time::Duration) -> Self {
        Self { elapsed }
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.elapsed.as_secs();
        if secs == 0 {
            return write!(f, "{}ms", self.elapsed.as_millis());
        }

        let days = secs / 86400;
        let hours = (secs % 86400) / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if days > 0 {
            write!(f, "{days}d {hours}h {minutes}m {seconds}s")
        } else if hours > 0 {
            write!(f, "{hours}h {minutes}m {seconds}s")
        } else if minutes > 0 {
            write!(f, "{minutes}m {seconds}s")
        } else {
            write!(f, "{seconds}s")
        }
    }
}
