//! Color and styling helpers for CLI output.
//!
//! Semantic Color Theme:
//!   - Success:   green   (succeeded tasks, clean checks)
//!   - Warning:   yellow  (high severity, skipped tasks)
//!   - Error:     red     (critical severity, failed tasks, cycles)
//!   - Info:      cyan    (node and task ids)
//!   - Muted:     dimmed  (field labels, low severity, cancelled tasks)
//!   - Emphasis:  bold    (section headers)

use crate::executor::TaskStatus;
use crate::impact::Severity;
use colored::Colorize;

use super::OutputConfig;

/// Apply semantic "success" color (green) to text.
pub fn success(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.green().to_string()
}

/// Apply semantic "error" color (red) to text.
pub fn error(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.red().to_string()
}

/// Apply semantic "warning" color (yellow) to text.
pub fn warning(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.yellow().to_string()
}

/// Apply semantic "info" color (cyan) to text.
pub fn info(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.cyan().to_string()
}

/// Muted text for labels.
pub(crate) fn dimmed(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.dimmed().to_string()
}

/// Bold text for section headers.
pub(crate) fn bold(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.bold().to_string()
}

/// Severity label, padded to a fixed width before coloring.
pub(crate) fn colorize_severity(severity: Severity, config: &OutputConfig) -> String {
    let text = format!("{:<8}", severity.to_string());
    if !config.use_colors {
        return text;
    }
    match severity {
        Severity::Critical => text.red().bold().to_string(),
        Severity::High => text.yellow().to_string(),
        Severity::Medium => text,
        Severity::Low => text.dimmed().to_string(),
    }
}

/// Task status label, padded to a fixed width before coloring.
pub(crate) fn colorize_status(status: TaskStatus, config: &OutputConfig) -> String {
    let text = format!("{:<9}", status.to_string());
    if !config.use_colors {
        return text;
    }
    match status {
        TaskStatus::Succeeded => text.green().to_string(),
        TaskStatus::Failed => text.red().bold().to_string(),
        TaskStatus::Skipped => text.yellow().to_string(),
        TaskStatus::Cancelled => text.dimmed().to_string(),
        TaskStatus::Pending | TaskStatus::Ready | TaskStatus::Running => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_config_leaves_text_untouched() {
        let config = OutputConfig { use_colors: false };
        assert_eq!(success("ok", &config), "ok");
        assert_eq!(colorize_severity(Severity::High, &config), "high    ");
        assert_eq!(colorize_status(TaskStatus::Failed, &config), "failed   ");
    }
}
