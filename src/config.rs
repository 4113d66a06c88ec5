//! Per-language server configuration
//!
//! Maps a language name to the server binary that handles it, the
//! arguments it is launched with, and the optional client-capabilities
//! JSON sent at initialize. Loaded from a JSON file when given one,
//! otherwise a built-in table of common servers is used.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// One language server definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server binary, resolved through PATH.
    pub command: String,

    /// Launch arguments as a single string, split on single spaces.
    /// There is no quoting convention; arguments containing spaces
    /// cannot be represented.
    #[serde(default)]
    pub args: String,

    /// Language id sent with `textDocument/didOpen`.
    pub language_id: String,

    /// Client capabilities JSON sent at initialize; the built-in default
    /// capabilities are used when absent.
    #[serde(default)]
    pub settings: Option<Value>,
}

impl ServerConfig {
    fn new(command: &str, args: &str, language_id: &str) -> Self {
        Self {
            command: command.to_string(),
            args: args.to_string(),
            language_id: language_id.to_string(),
            settings: None,
        }
    }

    /// The launch argument vector.
    pub fn argv(&self) -> Vec<String> {
        split_args(&self.args)
    }
}

/// Split an argument string on single spaces. Empty segments (from
/// leading, trailing, or doubled spaces) are dropped.
pub fn split_args(args: &str) -> Vec<String> {
    args.split(' ')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Seconds before an unanswered request times out and its callback
    /// fires with an error.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Language name -> server definition.
    #[serde(default)]
    pub servers: HashMap<String, ServerConfig>,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        let mut servers = HashMap::new();
        servers.insert("c".to_string(), ServerConfig::new("clangd", "", "c"));
        servers.insert("cpp".to_string(), ServerConfig::new("clangd", "", "cpp"));
        servers.insert(
            "rust".to_string(),
            ServerConfig::new("rust-analyzer", "", "rust"),
        );
        servers.insert("go".to_string(), ServerConfig::new("gopls", "", "go"));
        servers.insert(
            "python".to_string(),
            ServerConfig::new("pyright-langserver", "--stdio", "python"),
        );
        servers.insert(
            "typescript".to_string(),
            ServerConfig::new("typescript-language-server", "--stdio", "typescript"),
        );
        servers.insert(
            "javascript".to_string(),
            ServerConfig::new("typescript-language-server", "--stdio", "javascript"),
        );

        Self {
            request_timeout_secs: default_timeout_secs(),
            servers,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn server_for_language(&self, language: &str) -> Option<&ServerConfig> {
        self.servers.get(language)
    }

    /// Detect the language of a file from its extension.
    pub fn detect_language(path: &Path) -> Option<&'static str> {
        match path.extension()?.to_str()? {
            "c" | "h" => Some("c"),
            "cc" | "cpp" | "cxx" | "hpp" | "hh" => Some("cpp"),
            "rs" => Some("rust"),
            "go" => Some("go"),
            "py" => Some("python"),
            "ts" | "tsx" => Some("typescript"),
            "js" | "jsx" => Some("javascript"),
            _ => None,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_split_args() {
        assert!(split_args("").is_empty());
        assert_eq!(split_args("--stdio"), vec!["--stdio"]);
        assert_eq!(
            split_args("--log-level verbose"),
            vec!["--log-level", "verbose"]
        );
        assert_eq!(split_args("  a  b "), vec!["a", "b"]);
    }

    #[test]
    fn test_default_servers() {
        let config = Config::default();
        assert_eq!(config.server_for_language("c").unwrap().command, "clangd");
        assert_eq!(
            config.server_for_language("rust").unwrap().command,
            "rust-analyzer"
        );
        assert_eq!(
            config.server_for_language("python").unwrap().argv(),
            vec!["--stdio"]
        );
        assert!(config.server_for_language("cobol").is_none());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(Config::detect_language(Path::new("main.c")), Some("c"));
        assert_eq!(Config::detect_language(Path::new("lib.rs")), Some("rust"));
        assert_eq!(
            Config::detect_language(Path::new("a/b/app.tsx")),
            Some("typescript")
        );
        assert_eq!(Config::detect_language(Path::new("README.md")), None);
        assert_eq!(Config::detect_language(Path::new("Makefile")), None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "request_timeout_secs": 5,
                "servers": {{
                    "zig": {{
                        "command": "zls",
                        "language_id": "zig",
                        "settings": {{"textDocument": {{}}}}
                    }}
                }}
            }}"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        let server = config.server_for_language("zig").unwrap();
        assert_eq!(server.command, "zls");
        assert!(server.argv().is_empty());
        assert!(server.settings.is_some());
    }
}
