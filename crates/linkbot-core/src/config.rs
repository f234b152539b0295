use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Telegram refuses `getUpdates` limits outside 1..=100.
pub const MAX_BATCH_SIZE: usize = 100;

/// Typed configuration for the bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub telegram_api_url: Option<String>,

    // Storage
    pub storage_path: PathBuf,

    // Consumer loop
    pub batch_size: usize,
    pub idle_delay: Duration,
    pub error_delay: Duration,

    // Outbound throttling
    pub throttle_global: Duration,
    pub throttle_per_chat: Duration,
}

impl Config {
    /// Load from the process environment, after applying `.env` if present.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_bot_token = lookup("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let telegram_api_url = lookup("TELEGRAM_API_URL").and_then(non_empty);

        let storage_path = lookup("LINKBOT_STORAGE_PATH")
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("storage/users"));

        let batch_size = parse_usize(lookup("LINKBOT_BATCH_SIZE"))
            .unwrap_or(MAX_BATCH_SIZE)
            .clamp(1, MAX_BATCH_SIZE);

        let idle_delay =
            Duration::from_millis(parse_u64(lookup("LINKBOT_IDLE_DELAY_MS")).unwrap_or(1000));
        let error_delay =
            Duration::from_millis(parse_u64(lookup("LINKBOT_ERROR_DELAY_MS")).unwrap_or(1000));

        let throttle_global =
            Duration::from_millis(parse_u64(lookup("LINKBOT_THROTTLE_GLOBAL_MS")).unwrap_or(40));
        let throttle_per_chat = Duration::from_millis(
            parse_u64(lookup("LINKBOT_THROTTLE_PER_CHAT_MS")).unwrap_or(1050),
        );

        Ok(Self {
            telegram_bot_token,
            telegram_api_url,
            storage_path,
            batch_size,
            idle_delay,
            error_delay,
            throttle_global,
            throttle_per_chat,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_u64(v: Option<String>) -> Option<u64> {
    v.and_then(|s| s.trim().parse::<u64>().ok())
}

fn parse_usize(v: Option<String>) -> Option<usize> {
    v.and_then(|s| s.trim().parse::<usize>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn token_is_required() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_lookup(lookup_from(&[("TELEGRAM_BOT_TOKEN", "  ")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn defaults_apply() {
        let cfg = Config::from_lookup(lookup_from(&[("TELEGRAM_BOT_TOKEN", "t")])).unwrap();
        assert_eq!(cfg.storage_path, PathBuf::from("storage/users"));
        assert_eq!(cfg.batch_size, 100);
        assert_eq!(cfg.idle_delay, Duration::from_secs(1));
        assert_eq!(cfg.error_delay, Duration::from_secs(1));
        assert!(cfg.telegram_api_url.is_none());
    }

    #[test]
    fn batch_size_is_clamped() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("LINKBOT_BATCH_SIZE", "500"),
        ]))
        .unwrap();
        assert_eq!(cfg.batch_size, MAX_BATCH_SIZE);

        let cfg = Config::from_lookup(lookup_from(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("LINKBOT_BATCH_SIZE", "0"),
        ]))
        .unwrap();
        assert_eq!(cfg.batch_size, 1);
    }

    #[test]
    fn dotenv_strips_quotes_and_comments() {
        let parsed = parse_dotenv("# comment\nA=1\nB = \"two\"\n\nC='3'\nnot a pair\n=x\n");
        assert_eq!(
            parsed,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "two".to_string()),
                ("C".to_string(), "3".to_string()),
            ]
        );
    }
}
