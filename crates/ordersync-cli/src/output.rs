//! Terminal output for operator commands
//!
//! Every command prints through an [`OutputFormatter`] so `--json` switches
//! the whole CLI to machine-readable output.

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }

    pub fn is_json(self) -> bool {
        self == OutputFormat::Json
    }
}

/// Sink for CLI messages
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    /// A labelled value, e.g. one counter of a sync report
    fn field(&self, label: &str, value: &dyn std::fmt::Display);
    fn print_json(&self, value: &serde_json::Value);
}

/// Human-readable output with check marks and aligned fields
pub struct HumanFormatter;

/// Width labels are padded to in human output
const LABEL_WIDTH: usize = 18;

pub(crate) fn render_field(label: &str, value: &dyn std::fmt::Display) -> String {
    format!("  {:<width$}{}", format!("{label}:"), value, width = LABEL_WIDTH)
}

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {message}");
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {message}");
    }
    fn info(&self, message: &str) {
        println!("  {message}");
    }
    fn field(&self, label: &str, value: &dyn std::fmt::Display) {
        println!("{}", render_field(label, value));
    }
    fn print_json(&self, _value: &serde_json::Value) {}
}

/// JSON output; progress text and fields are suppressed
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", serde_json::json!({"success": true, "message": message}));
    }
    fn error(&self, message: &str) {
        eprintln!("{}", serde_json::json!({"success": false, "error": message}));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", serde_json::json!({"level": "warning", "message": message}));
    }
    fn info(&self, _message: &str) {}
    fn field(&self, _label: &str, _value: &dyn std::fmt::Display) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flag() {
        assert_eq!(OutputFormat::from_flag(true), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flag(false), OutputFormat::Human);
        assert!(OutputFormat::Json.is_json());
        assert!(!OutputFormat::Human.is_json());
    }

    #[test]
    fn test_render_field_aligns_values() {
        assert_eq!(render_field("Updated", &3), "  Updated:          3");
        assert_eq!(
            render_field("Unmapped statuses", &0),
            "  Unmapped statuses:0"
        );
    }
}
