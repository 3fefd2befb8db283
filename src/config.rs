//! Configuration management for commentator-rs.
//!
//! Everything is resolved from environment variables (with `.env` support
//! handled in main), matching the variable names the game server has always
//! recognized. Parsing never fails the process: invalid values fall back
//! to defaults with a warning.

use std::path::PathBuf;

use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

#[derive(Debug, Clone)]
pub struct DashScopeConfig {
    /// Vendor credential. Empty means the AI endpoints answer 503.
    pub api_key: String,
    /// OpenAI-compatible API root (chat completions + speech synthesis).
    pub base_url: String,
}

impl Default for DashScopeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub model: String,
    pub voice: String,
    /// Speech-rate multiplier, 1.0 is normal speed.
    pub speech_rate: f32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            model: "cosyvoice-v3-flash".into(),
            voice: "longanzhi_v3".into(),
            speech_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Prebuilt game bundle directory served with SPA fallback.
    pub static_dir: PathBuf,
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 18000,
            static_dir: PathBuf::from("dist"),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub dashscope: DashScopeConfig,
    pub tts: TtsConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Self {
        let dashscope = DashScopeConfig {
            api_key: env_or("DASHSCOPE_API_KEY", ""),
            base_url: env_or("DASHSCOPE_BASE_URL", DEFAULT_BASE_URL),
        };

        let tts_defaults = TtsConfig::default();
        let tts = TtsConfig {
            model: env_or("COSYVOICE_MODEL", &tts_defaults.model),
            voice: env_or("COSYVOICE_VOICE", &tts_defaults.voice),
            speech_rate: env_parse_or("COSYVOICE_SPEECH_RATE", tts_defaults.speech_rate),
        };

        let server_defaults = ServerConfig::default();
        let server = ServerConfig {
            host: env_or("HOST", &server_defaults.host),
            port: env_parse_or("PORT", server_defaults.port),
            static_dir: PathBuf::from(env_or("STATIC_DIR", "dist")),
            debug: env_or("DEBUG", "false").eq_ignore_ascii_case("true"),
        };

        Self {
            dashscope,
            tts,
            server,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => default.to_string(),
    }
}

fn env_parse_or<T: std::str::FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(value) => match value.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("Invalid {key}={value:?}, using default {default}");
                default
            }
        },
        Err(_) => default,
    }
}
