use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    dotenv().ok(); // Load .env file if present
    Config {
        bind_addr: get_env_or_default("BIND_ADDR", "0.0.0.0:5000"),
        store_backend: get_env_or_default("STORE_BACKEND", "mongo")
            .parse()
            .unwrap_or_else(|e| panic!("{e}")),
        mongo_uri: get_env_or_default("MONGO_URI", "mongodb://localhost:27017"),
        mongo_db_name: get_env_or_default("MONGO_DB_NAME", "quaero"),
        jwt_secret: get_env("JWT_SECRET"),
        search_api_url: get_env_or_default("SEARCH_API_URL", "https://api.duckduckgo.com/"),
        gemini_api_key: env::var("GEMINI_API_KEY").ok(),
        gemini_base_url: get_env_or_default(
            "GEMINI_BASE_URL",
            "https://generativelanguage.googleapis.com",
        ),
        gemini_model: get_env_or_default("GEMINI_MODEL", "gemini-1.5-flash"),
        outbound_timeout: env::var("OUTBOUND_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs),
    }
});

pub struct Config {
    pub bind_addr: String,
    pub store_backend: StoreBackend,
    pub mongo_uri: String,
    pub mongo_db_name: String,
    pub jwt_secret: String,
    /// Instant-answer JSON endpoint of the search provider.
    pub search_api_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    /// Applies to both outbound clients. `None` keeps the HTTP client default.
    pub outbound_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!(
                "Unknown store backend '{other}', expected 'mongo' or 'memory'"
            )),
        }
    }
}

fn get_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("Missing required environment variable: {key}"))
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
