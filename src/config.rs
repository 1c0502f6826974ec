use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// GitHub access settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubSettings {
    /// Repository owner (e.g., "my-org")
    pub owner: String,

    /// Repository name
    pub repo: String,

    /// Bearer token; the GITHUB_TOKEN environment variable takes precedence
    pub token: Option<String>,

    /// Identity token matched against feedback authors and bodies
    pub bot_needle: String,

    /// Page size for the pull request list
    pub per_page: u32,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            token: None,
            bot_needle: "qodo".to_string(),
            per_page: 30,
        }
    }
}

/// Display settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Show line numbers in the diff view
    pub show_line_numbers: bool,

    /// Enable syntax highlighting
    pub syntax_highlighting: bool,

    /// Minimum brightness for syntax colors (0-255)
    pub min_brightness: u8,

    /// Syntax highlighting theme name
    pub theme: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_line_numbers: true,
            syntax_highlighting: true,
            min_brightness: 180,
            theme: "base16-eighties.dark".to_string(),
        }
    }
}

/// Navigation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationSettings {
    /// Number of lines to scroll with Page Up/Down
    pub scroll_lines: usize,

    /// Width of the file tree panel; adjusted in the UI and saved on exit
    pub panel_width: u16,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            scroll_lines: 15,
            panel_width: 45,
        }
    }
}

/// Alerting thresholds for the simulated asset monitor
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSettings {
    pub temperature_celsius: f64,
    pub pressure_bar: f64,
    pub vibration_mm_s: f64,
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        Self {
            temperature_celsius: 90.0,
            pressure_bar: 120.0,
            vibration_mm_s: 5.0,
        }
    }
}

/// Asset monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub thresholds: ThresholdSettings,

    /// Seconds between synthetic readings
    pub read_interval_seconds: u64,

    /// Master switch for alert evaluation
    pub alerts_enabled: bool,

    /// File that alert records are appended to, one JSON object per line
    pub alerts_file: PathBuf,

    /// Minimum seconds between two emitted alerts
    pub debounce_seconds: u64,

    /// Maximum absolute jitter applied to the temperature reading
    pub max_jitter: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            thresholds: ThresholdSettings::default(),
            read_interval_seconds: 2,
            alerts_enabled: true,
            alerts_file: PathBuf::from("alerts.log"),
            debounce_seconds: 5,
            max_jitter: 1.0,
        }
    }
}

/// Alerts dashboard settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsSettings {
    /// Endpoint returning the latest alert records
    pub url: String,

    /// Seconds between polls
    pub poll_interval_seconds: u64,
}

impl Default for AlertsSettings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080/api/alerts".to_string(),
            poll_interval_seconds: 5,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GithubSettings,
    pub display: DisplaySettings,
    pub navigation: NavigationSettings,
    pub monitor: MonitorSettings,
    pub alerts: AlertsSettings,
}

impl Config {
    /// Get the config file path (~/.config/kanshi/config.toml)
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("kanshi").join("config.toml"))
    }

    /// Load configuration from file, or return defaults if not found
    pub fn load() -> Self {
        let path = match Self::config_path() {
            Some(p) => p,
            None => return Self::default(),
        };
        Self::load_from(&path)
    }

    fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Persist the configuration (token and panel width live here)
    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };
        self.save_to(&path);
    }

    fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(serialized) = toml::to_string_pretty(self) {
            if let Err(e) = fs::write(path, serialized) {
                log::warn!("failed to write config {}: {}", path.display(), e);
            }
        }
    }

    /// Token resolution: environment first, then config
    pub fn resolve_token(&self) -> Option<String> {
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            if !token.is_empty() {
                return Some(token);
            }
        }
        self.github.token.clone()
    }
}
