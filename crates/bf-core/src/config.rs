use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    aggregator::AggregatorSettings, cache::CacheSettings, catalog::QueryCatalog, errors::Error,
    search::SearchSettings, Result,
};

pub const DEFAULT_YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Typed configuration for the bot and the search core.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub api_keys: Vec<String>,
    pub channels_file: PathBuf,
    pub youtube_api_base: String,

    // Accepted query values
    pub base_levels: Vec<String>,
    pub base_types: Vec<String>,

    // Aggregation
    pub max_links_per_request: usize,
    pub avoid_repeats: bool,
    pub request_timeout: Duration,

    // Cache
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,

    // Quota / search
    pub quota_limit: u64,
    pub search_window_days: u32,
    pub max_videos_per_channel: u32,
    pub links_per_video: usize,
    pub filter_titles: bool,

    // Command surface
    pub command_cooldown: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        // Required
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;
        let api_keys = parse_csv(get("API_KEYS"));
        if api_keys.is_empty() {
            return Err(Error::Config(
                "API_KEYS must contain at least one API key".to_string(),
            ));
        }

        let channels_file = PathBuf::from(get("CHANNELS_FILE").unwrap_or("channels.txt".into()));
        let youtube_api_base = get("YOUTUBE_API_BASE")
            .unwrap_or_else(|| DEFAULT_YOUTUBE_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let base_levels = or_default_csv(get("BASE_LEVELS"), &["TH15", "TH16", "TH17"]);
        let base_types = or_default_csv(get("BASE_TYPES"), &["CWL", "War", "Legend"]);

        let max_links_per_request: usize = parse_num(&get, "MAX_LINKS_PER_REQUEST")?.unwrap_or(3);
        if max_links_per_request == 0 {
            return Err(Error::Config(
                "MAX_LINKS_PER_REQUEST must be at least 1".to_string(),
            ));
        }
        let avoid_repeats = get("AVOID_REPEATS").map(|s| truthy(&s)).unwrap_or(true);
        let request_timeout =
            Duration::from_secs(parse_num::<u64>(&get, "REQUEST_TIMEOUT_SECS")?.unwrap_or(60));

        let cache_ttl = Duration::from_secs(parse_num::<u64>(&get, "CACHE_TTL_SECS")?.unwrap_or(3600));
        let cache_max_entries: usize = parse_num(&get, "CACHE_MAX_ENTRIES")?.unwrap_or(100);

        let quota_limit: u64 = parse_num(&get, "QUOTA_LIMIT")?.unwrap_or(10_000);
        let search_window_days: u32 = parse_num(&get, "SEARCH_WINDOW_DAYS")?.unwrap_or(4);
        // search.list accepts 0..=50; zero would make every search pointless.
        let max_videos_per_channel = parse_num::<u32>(&get, "MAX_VIDEOS_PER_CHANNEL")?
            .unwrap_or(5)
            .clamp(1, 50);
        let links_per_video: usize = parse_num(&get, "LINKS_PER_VIDEO")?.unwrap_or(2);
        if links_per_video == 0 {
            return Err(Error::Config("LINKS_PER_VIDEO must be at least 1".to_string()));
        }
        let filter_titles = get("FILTER_TITLES").map(|s| truthy(&s)).unwrap_or(true);

        let command_cooldown =
            Duration::from_secs(parse_num::<u64>(&get, "COMMAND_COOLDOWN_SECS")?.unwrap_or(600));

        Ok(Self {
            telegram_bot_token,
            api_keys,
            channels_file,
            youtube_api_base,
            base_levels,
            base_types,
            max_links_per_request,
            avoid_repeats,
            request_timeout,
            cache_ttl,
            cache_max_entries,
            quota_limit,
            search_window_days,
            max_videos_per_channel,
            links_per_video,
            filter_titles,
            command_cooldown,
        })
    }

    pub fn catalog(&self) -> QueryCatalog {
        QueryCatalog::new(self.base_levels.clone(), self.base_types.clone())
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: self.cache_ttl,
            max_entries: self.cache_max_entries,
        }
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            window: chrono::Duration::days(i64::from(self.search_window_days)),
            max_videos: self.max_videos_per_channel,
            links_per_video: self.links_per_video,
            filter_titles: self.filter_titles,
        }
    }

    pub fn aggregator_settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            request_timeout: self.request_timeout,
            avoid_repeats: self.avoid_repeats,
        }
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

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
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        &val[1..val.len() - 1]
    } else {
        val
    }
}

fn truthy(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_num<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw:?}"))),
    }
}

fn parse_csv(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn or_default_csv(v: Option<String>, defaults: &[&str]) -> Vec<String> {
    let parsed = parse_csv(v);
    if parsed.is_empty() {
        defaults.iter().map(|s| s.to_string()).collect()
    } else {
        parsed
    }
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

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let cfg = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "tok"),
            ("API_KEYS", " k1 , ,k2 "),
        ]))
        .unwrap();

        assert_eq!(cfg.api_keys, vec!["k1", "k2"]);
        assert_eq!(cfg.base_levels, vec!["TH15", "TH16", "TH17"]);
        assert_eq!(cfg.base_types, vec!["CWL", "War", "Legend"]);
        assert_eq!(cfg.max_links_per_request, 3);
        assert_eq!(cfg.cache_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.cache_max_entries, 100);
        assert_eq!(cfg.quota_limit, 10_000);
        assert_eq!(cfg.links_per_video, 2);
        assert_eq!(cfg.command_cooldown, Duration::from_secs(600));
        assert_eq!(cfg.youtube_api_base, DEFAULT_YOUTUBE_API_BASE);
    }

    #[test]
    fn missing_keys_is_a_config_error() {
        let err = Config::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "tok"), ("API_KEYS", " , ")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::from_lookup(lookup(&[("API_KEYS", "k1")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "tok"),
            ("API_KEYS", "k1"),
            ("CACHE_TTL_SECS", "an hour"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("CACHE_TTL_SECS"));
    }

    #[test]
    fn zero_counts_are_rejected() {
        for key in ["MAX_LINKS_PER_REQUEST", "LINKS_PER_VIDEO"] {
            let err = Config::from_lookup(lookup(&[
                ("TELEGRAM_BOT_TOKEN", "tok"),
                ("API_KEYS", "k1"),
                (key, "0"),
            ]))
            .unwrap_err();
            assert!(matches!(&err, Error::Config(msg) if msg.contains(key)), "{err}");
        }
    }

    #[test]
    fn overrides_and_clamping() {
        let cfg = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "tok"),
            ("API_KEYS", "k1"),
            ("MAX_VIDEOS_PER_CHANNEL", "500"),
            ("FILTER_TITLES", "off"),
            ("BASE_LEVELS", "TH14,TH15"),
            ("YOUTUBE_API_BASE", "http://localhost:9000/"),
        ]))
        .unwrap();

        assert_eq!(cfg.max_videos_per_channel, 50);
        assert!(!cfg.filter_titles);
        assert_eq!(cfg.base_levels, vec!["TH14", "TH15"]);
        assert_eq!(cfg.youtube_api_base, "http://localhost:9000");
    }

    #[test]
    fn quotes_are_stripped_from_dotenv_values() {
        assert_eq!(strip_quotes("\"abc\""), "abc");
        assert_eq!(strip_quotes("'abc'"), "abc");
        assert_eq!(strip_quotes("\"abc"), "\"abc");
    }
}
