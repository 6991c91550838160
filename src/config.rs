use std::env;

use tracing::info;

pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
}

impl Config {
    pub fn load() -> Self {
        let _ = dotenv::dotenv();
        Self {
            database_url: var_or("DATABASE_URL", "sqlite://hostelhub.db?mode=rwc"),
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:8080"),
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_owned()
    })
}
