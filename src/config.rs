use std::{env, fmt::Display, str::FromStr};

use anyhow::{Context, bail};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub storage_bucket: String,
    pub bind_addr: String,
    pub session_idle_minutes: i64,
    pub comment_views: usize,
}

impl Config {
    /// Reads the environment, after loading `.env` if one exists.
    pub fn load() -> anyhow::Result<Self> {
        if dotenv::dotenv().is_err() {
            info!("no .env file, using process environment only");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            supabase_url: required(&lookup, "SUPABASE_URL")?,
            supabase_anon_key: required(&lookup, "SUPABASE_ANON_KEY")?,
            storage_bucket: optional(&lookup, "STORAGE_BUCKET", "images".to_owned())?,
            bind_addr: optional(&lookup, "BIND_ADDR", "0.0.0.0:8080".to_owned())?,
            session_idle_minutes: optional(&lookup, "SESSION_IDLE_MINUTES", 5)?,
            comment_views: optional(&lookup, "COMMENT_VIEWS", 1024)?,
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<String> {
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
        _ => bail!("{key} must be set"),
    }
}

fn optional<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("invalid {key} value {value:?}")),
        None => {
            warn!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_fill_optional_values() {
        let config = Config::from_lookup(lookup(&[
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
        ]))
        .unwrap();

        assert_eq!(config.storage_bucket, "images");
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.session_idle_minutes, 5);
        assert_eq!(config.comment_views, 1024);
    }

    #[test]
    fn missing_required_value_is_an_error() {
        let err = Config::from_lookup(lookup(&[("SUPABASE_URL", "https://abc.supabase.co")]))
            .unwrap_err();
        assert!(err.to_string().contains("SUPABASE_ANON_KEY"));
    }

    #[test]
    fn malformed_number_is_an_error() {
        let err = Config::from_lookup(lookup(&[
            ("SUPABASE_URL", "https://abc.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("COMMENT_VIEWS", "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("COMMENT_VIEWS"));
    }
}
