//! Nice QWick output formatting.

use std::fmt;

use log;

const QWICK_BANNER_LENGTH: usize = 103;

/// Logs a warning to the `qwick-output` logger.
macro_rules! qwick_warn {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::warn!(target: "qwick-output", $fmt, $($($arg)*)?); }
}

/// Logs a main output line to the `qwick-output` logger.
macro_rules! qwick_output {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::info!(target: "qwick-output", $fmt, $($($arg)*)?); }
}

pub(crate) use {qwick_output, qwick_warn};

/// Logs a nicely formatted section title to the `qwick-output` logger.
pub(crate) fn log_title(title: &str) {
    let length = title.chars().count().max(QWICK_BANNER_LENGTH - 6);
    let bar = "─".repeat(length);
    qwick_output!("┌──{bar}──┐");
    qwick_output!("│§ {title:^length$} §│");
    qwick_output!("└──{bar}──┘");
}

/// Logs a nicely formatted subtitle to the `qwick-output` logger.
pub(crate) fn log_subtitle(subtitle: &str) {
    let length = subtitle.chars().count();
    let bar = "═".repeat(length);
    qwick_output!("{}", subtitle);
    qwick_output!("{}", bar);
}

/// Turns a boolean into a string of `yes` or `no`.
pub(crate) fn nice_bool(b: bool) -> String {
    if b {
        "yes".to_string()
    } else {
        "no".to_string()
    }
}

/// A trait for logging `QWick` outputs nicely.
pub(crate) trait QWickOutput: fmt::Debug + fmt::Display {
    /// Logs display output nicely.
    fn log_output_display(&self) {
        let lines = self.to_string();
        lines.lines().for_each(|line| {
            qwick_output!("{line}");
        })
    }
}

// Blanket implementation
impl<T> QWickOutput for T where T: fmt::Debug + fmt::Display {}
