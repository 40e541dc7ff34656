use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub backend_url: Url,
    pub backend_timeout_secs: u64,
    pub timer_tick_ms: u64,
    pub header_offset_px: u32,
    pub max_text_len: usize,
    pub session_idle_timeout_secs: u64,
    pub session_sweep_interval_secs: u64,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            backend_url: parse_backend_url(&get_env("BACKEND_URL")?)?,
            backend_timeout_secs: get_env_parse_or("BACKEND_TIMEOUT_SECS", 30)?,
            timer_tick_ms: get_env_parse_or("TIMER_TICK_MS", 1000)?,
            header_offset_px: get_env_parse_or("HEADER_OFFSET_PX", 80)?,
            max_text_len: get_env_parse_or("PLAYER_MAX_TEXT_LEN", 4000)?,
            session_idle_timeout_secs: get_env_parse_or("SESSION_IDLE_TIMEOUT_SECS", 1800)?,
            session_sweep_interval_secs: get_env_parse_or("SESSION_SWEEP_INTERVAL_SECS", 60)?,
        })
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn timer_tick(&self) -> Duration {
        Duration::from_millis(self.timer_tick_ms.max(1))
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs.max(1))
    }
}

pub fn parse_backend_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::Config(format!("Invalid value for BACKEND_URL: {}", e)))?;
    if url.cannot_be_a_base() {
        return Err(Error::Config(format!(
            "BACKEND_URL must be an absolute http(s) URL, got {}",
            raw
        )));
    }
    Ok(url)
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
