//! Configuration module for the order sync engine.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{normalize_status_text, OrderStatus};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration.
///
/// Missing sections fall back to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub courier: CourierConfig,
    pub status_mapping: StatusMappingConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

/// Scheduling and pass behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between invoice-only quick passes.
    pub quick_interval_secs: u64,
    /// Seconds between full remote diffs.
    pub full_interval_secs: u64,
    /// Milliseconds a burst of remote change notifications is coalesced for.
    pub debounce_ms: u64,
    /// Whether orders confirmed gone remotely may be deleted locally.
    pub auto_delete: bool,
}

/// Courier HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// Partner name recorded on orders, e.g. `alwaseet`.
    pub partner: String,
    /// Base URL of the courier merchant API.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// One courier status text and the normalized status it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMappingEntry {
    pub text: String,
    pub status: OrderStatus,
}

/// Courier status text lookup tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusMappingConfig {
    /// Exact (normalized) status texts and their statuses.
    pub entries: Vec<StatusMappingEntry>,
    /// Invoice status texts meaning the merchant received the invoice.
    pub invoice_received: Vec<String>,
}

/// Local order database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the SQLite database file.
    pub database_path: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `pretty` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/ordersync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("ordersync")
            .join("config.yaml")
    }
}

impl SyncConfig {
    pub fn quick_interval(&self) -> Duration {
        Duration::from_secs(self.quick_interval_secs)
    }

    pub fn full_interval(&self) -> Duration {
        Duration::from_secs(self.full_interval_secs)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl CourierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            quick_interval_secs: 120,
            full_interval_secs: 900,
            debounce_ms: 300,
            auto_delete: true,
        }
    }
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            partner: "alwaseet".to_string(),
            base_url: "https://api.alwaseet-iq.net".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Status texts shipped with the default configuration.
const DEFAULT_STATUS_TEXTS: &[(&str, OrderStatus)] = &[
    ("قيد التجهيز", OrderStatus::Processing),
    ("فعال", OrderStatus::Processing),
    ("تم الاستلام من قبل المندوب", OrderStatus::Shipped),
    ("في موقع فرز بغداد", OrderStatus::Shipped),
    ("قيد التوصيل الى الزبون (في عهدة المندوب)", OrderStatus::Delivery),
    ("تم التسليم للزبون", OrderStatus::Delivered),
    ("تم تسليم الفاتورة", OrderStatus::Delivered),
    ("الغاء الطلب", OrderStatus::Cancelled),
    ("رفض الطلب", OrderStatus::Returned),
    ("تم الارجاع الى التاجر", OrderStatus::Returned),
    ("pending", OrderStatus::Pending),
    ("processing", OrderStatus::Processing),
    ("picked up", OrderStatus::Shipped),
    ("out for delivery", OrderStatus::Delivery),
    ("delivered", OrderStatus::Delivered),
    ("cancelled", OrderStatus::Cancelled),
    ("returned to merchant", OrderStatus::Returned),
];

/// Invoice status texts shipped with the default configuration.
const DEFAULT_INVOICE_RECEIVED: &[&str] = &["تم الاستلام من قبل التاجر", "received"];

impl Default for StatusMappingConfig {
    fn default() -> Self {
        Self {
            entries: DEFAULT_STATUS_TEXTS
                .iter()
                .map(|(text, status)| StatusMappingEntry {
                    text: (*text).to_string(),
                    status: *status,
                })
                .collect(),
            invoice_received: DEFAULT_INVOICE_RECEIVED
                .iter()
                .map(|text| (*text).to_string())
                .collect(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("ordersync");
        Self {
            database_path: data_dir.join("orders.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.quick_interval_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["pretty", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.quick_interval_secs == 0 {
            errors.push(ValidationError::new(
                "sync.quick_interval_secs",
                "must be greater than 0",
            ));
        }
        if self.sync.full_interval_secs == 0 {
            errors.push(ValidationError::new(
                "sync.full_interval_secs",
                "must be greater than 0",
            ));
        }
        if self.sync.full_interval_secs != 0
            && self.sync.full_interval_secs < self.sync.quick_interval_secs
        {
            errors.push(ValidationError::new(
                "sync.full_interval_secs",
                format!(
                    "full interval ({}) must not be shorter than quick interval ({})",
                    self.sync.full_interval_secs, self.sync.quick_interval_secs
                ),
            ));
        }
        if self.sync.debounce_ms == 0 {
            errors.push(ValidationError::new("sync.debounce_ms", "must be greater than 0"));
        }

        // --- courier ---
        if self.courier.partner.trim().is_empty() {
            errors.push(ValidationError::new("courier.partner", "must not be empty"));
        } else if self.courier.partner.trim().eq_ignore_ascii_case("local") {
            errors.push(ValidationError::new(
                "courier.partner",
                "\"local\" is reserved for orders that are never shipped",
            ));
        }
        if !self.courier.base_url.starts_with("http://") && !self.courier.base_url.starts_with("https://") {
            errors.push(ValidationError::new(
                "courier.base_url",
                format!("must be an http(s) URL, got {:?}", self.courier.base_url),
            ));
        }
        if self.courier.timeout_secs == 0 {
            errors.push(ValidationError::new("courier.timeout_secs", "must be greater than 0"));
        }

        // --- status_mapping ---
        let mut seen = HashSet::new();
        for (index, entry) in self.status_mapping.entries.iter().enumerate() {
            let normalized = normalize_status_text(&entry.text);
            if normalized.is_empty() {
                errors.push(ValidationError::new(
                    format!("status_mapping.entries[{index}].text"),
                    "must not be empty",
                ));
            } else if !seen.insert(normalized) {
                errors.push(ValidationError::new(
                    format!("status_mapping.entries[{index}].text"),
                    format!("duplicate status text {:?}", entry.text),
                ));
            }
        }
        if self.status_mapping.invoice_received.is_empty() {
            errors.push(ValidationError::new(
                "status_mapping.invoice_received",
                "must list at least one invoice status text",
            ));
        }
        if self
            .status_mapping
            .invoice_received
            .iter()
            .any(|text| text.trim().is_empty())
        {
            errors.push(ValidationError::new(
                "status_mapping.invoice_received",
                "must not contain empty texts",
            ));
        }

        // --- store ---
        if self.store.database_path.as_os_str().is_empty() {
            errors.push(ValidationError::new("store.database_path", "must not be empty"));
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::new(
                "logging.level",
                format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError::new(
                "logging.format",
                format!(
                    "invalid format '{}', expected one of: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            ));
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use ordersync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .sync_quick_interval_secs(60)
///     .courier_base_url("http://localhost:8080")
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_quick_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.quick_interval_secs = seconds;
        self
    }

    pub fn sync_full_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.full_interval_secs = seconds;
        self
    }

    pub fn sync_debounce_ms(mut self, millis: u64) -> Self {
        self.config.sync.debounce_ms = millis;
        self
    }

    pub fn sync_auto_delete(mut self, enabled: bool) -> Self {
        self.config.sync.auto_delete = enabled;
        self
    }

    // --- courier ---

    pub fn courier_partner(mut self, partner: impl Into<String>) -> Self {
        self.config.courier.partner = partner.into();
        self
    }

    pub fn courier_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.courier.base_url = url.into();
        self
    }

    pub fn courier_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.courier.timeout_secs = seconds;
        self
    }

    // --- status_mapping ---

    /// Adds (or overrides) one status text mapping.
    pub fn status_mapping_entry(mut self, text: impl Into<String>, status: OrderStatus) -> Self {
        let text = text.into();
        let key = normalize_status_text(&text);
        self.config
            .status_mapping
            .entries
            .retain(|entry| normalize_status_text(&entry.text) != key);
        self.config
            .status_mapping
            .entries
            .push(StatusMappingEntry { text, status });
        self
    }

    pub fn status_mapping_invoice_received(mut self, texts: Vec<String>) -> Self {
        self.config.status_mapping.invoice_received = texts;
        self
    }

    // --- store ---

    pub fn store_database_path(mut self, path: PathBuf) -> Self {
        self.config.store.database_path = path;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
