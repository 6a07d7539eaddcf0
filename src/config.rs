use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GithubConfig,
    pub theme: Theme,
    pub settings: Settings,
}

/// OAuth app registration and API endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// OAuth app client id
    pub client_id: String,
    /// Scope requested on the authorize redirect
    pub scope: String,
    /// Where GitHub sends the browser back with `?code=`
    pub redirect_uri: String,
    /// Token-exchange relay, called as `{relay_url}/authenticate/{code}`
    pub relay_url: String,
    pub api_base: String,
    pub authorize_url: String,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Page size requested from list/search endpoints, clamped to 1..=100
    pub per_page: u32,
    /// Upper bound on pages fetched per search (release listings always run to the end)
    pub max_pages: u32,
    /// User search only fires once the query has at least this many chars
    pub min_user_query_len: usize,
    /// API request timeout in seconds
    pub api_timeout: u64,
    /// Drop pages that belong to a fetch superseded by a newer edit
    pub discard_stale_responses: bool,
    /// Override for where the persisted state and logs live
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub border: String,
    pub border_active: String,
    pub selected_bg: String,
    pub text: String,
    pub text_muted: String,
    pub highlight: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            client_id: "9aa654ac32dd532c5560".to_string(),
            scope: "user".to_string(),
            redirect_uri: "http://localhost:3000/".to_string(),
            relay_url: "https://release-finder-github.herokuapp.com".to_string(),
            api_base: "https://api.github.com".to_string(),
            authorize_url: "https://github.com/login/oauth/authorize".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            per_page: 100,
            max_pages: 10,          // search API stops at 1000 results; release listings are unbounded
            min_user_query_len: 2,
            api_timeout: 30,
            discard_stale_responses: true,
            data_dir: None,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            // One Dark color scheme
            border: "#5c6370".to_string(),           // Gray
            border_active: "#61afef".to_string(),    // Blue
            selected_bg: "#2c323c".to_string(),      // Dark gray
            text: "#abb2bf".to_string(),             // Light gray
            text_muted: "#5c6370".to_string(),       // Muted gray
            highlight: "#61afef".to_string(),        // Blue
        }
    }
}

impl Config {
    /// Load from an explicit path, or search the usual locations
    pub fn load(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            return match Self::read(path) {
                Some(config) => config,
                None => {
                    tracing::warn!(path = %path.display(), "config unreadable, using defaults");
                    Config::default()
                }
            };
        }

        // 1. XDG path (~/.config/release-finder/config.toml)
        if let Some(home_dir) = dirs::home_dir() {
            let xdg_path = home_dir.join(".config").join("release-finder").join("config.toml");
            if let Some(config) = Self::read(&xdg_path) {
                return config;
            }
        }

        // 2. Platform-specific config dir (~/Library/Application Support/ on macOS)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("release-finder").join("config.toml");
            if let Some(config) = Self::read(&config_path) {
                return config;
            }
        }

        // 3. ~/.release-finder.toml
        if let Some(home_dir) = dirs::home_dir() {
            if let Some(config) = Self::read(&home_dir.join(".release-finder.toml")) {
                return config;
            }
        }

        Config::default()
    }

    fn read(path: &Path) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        match toml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "invalid config file");
                None
            }
        }
    }

    /// Directory holding the persisted state and log files
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.settings
            .data_dir
            .clone()
            .or_else(|| dirs::data_local_dir().map(|d| d.join("release-finder")))
    }
}

impl Theme {
    pub fn parse_color(&self, hex: &str) -> ratatui::style::Color {
        // Parse hex color string (e.g., "#61afef")
        let channel = |range: std::ops::Range<usize>| hex.get(range).and_then(|h| u8::from_str_radix(h, 16).ok());
        if hex.starts_with('#') && hex.len() == 7 {
            if let (Some(r), Some(g), Some(b)) = (channel(1..3), channel(3..5), channel(5..7)) {
                return ratatui::style::Color::Rgb(r, g, b);
            }
        }
        // Fallback to white if parsing fails
        ratatui::style::Color::White
    }
}
