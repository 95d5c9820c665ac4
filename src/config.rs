use std::collections::{BTreeMap, HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::ConfigError;

const CACHE_DIR: &str = "matchday_miner";
const DB_FILE: &str = "miner.sqlite";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Tabular,
    Queued,
    Null,
}

impl FromStr for SinkKind {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "tabular" | "table" | "df" => Ok(SinkKind::Tabular),
            "queued" | "sql" | "queue" => Ok(SinkKind::Queued),
            "null" | "none" | "dry" => Ok(SinkKind::Null),
            other => Err(ConfigError::Invalid(format!("unknown sink kind {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub request_timeout_secs: u64,
    pub retry_tries: u32,
    pub retry_delay_secs: u64,
    pub retry_backoff: u32,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            retry_tries: 4,
            retry_delay_secs: 2,
            retry_backoff: 2,
            user_agent: "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:66.0) Gecko/20100101 Firefox/66.0"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    pub multithreading: bool,
    pub num_of_threads: usize,
    /// Tournament slug to primary-source unique tournament id. Empty keeps every tournament.
    pub tournaments: BTreeMap<String, u64>,
    /// Player name to secondary-source id, consulted before any search.
    pub alias: HashMap<String, u64>,
    /// Primary-source team name to feed team name.
    pub team_alias: HashMap<String, String>,
    /// Tournament slug to feed league code.
    pub feed_leagues: BTreeMap<String, String>,
    pub sink: SinkKind,
    pub database_path: Option<PathBuf>,
    pub reference_timezone: String,
    pub log_level: String,
    pub http: HttpConfig,
    pub search_max_pages: usize,
    pub ratings_limit: usize,
    pub reconcile_inline: bool,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            multithreading: false,
            num_of_threads: host_parallelism(),
            tournaments: default_tournaments(),
            alias: default_alias(),
            team_alias: default_team_alias(),
            feed_leagues: default_feed_leagues(),
            sink: SinkKind::default(),
            database_path: None,
            reference_timezone: "Europe/Budapest".to_string(),
            log_level: "info".to_string(),
            http: HttpConfig::default(),
            search_max_pages: 3,
            ratings_limit: 4,
            reconcile_inline: false,
        }
    }
}

impl MinerConfig {
    /// Loads `.env`, then the optional TOML file, then `MINER_*` overrides, and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = env_parsed::<BoolFlag>("MINER_MULTITHREADING")? {
            self.multithreading = value.0;
        }
        if let Some(value) = env_parsed::<usize>("MINER_NUM_OF_THREADS")? {
            self.num_of_threads = value;
        }
        if let Some(value) = env_parsed::<SinkKind>("MINER_SINK")? {
            self.sink = value;
        }
        if let Some(value) = env_string("MINER_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(value));
        }
        if let Some(value) = env_string("MINER_TIMEZONE") {
            self.reference_timezone = value;
        }
        if let Some(value) = env_parsed::<usize>("MINER_RATINGS_LIMIT")? {
            self.ratings_limit = value;
        }
        if let Some(value) = env_parsed::<BoolFlag>("MINER_RECONCILE_INLINE")? {
            self.reconcile_inline = value.0;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_of_threads == 0 {
            return Err(ConfigError::Invalid(
                "num_of_threads must be at least 1".to_string(),
            ));
        }
        if self.http.retry_tries == 0 {
            return Err(ConfigError::Invalid(
                "http.retry_tries must be at least 1".to_string(),
            ));
        }
        if self.search_max_pages == 0 {
            return Err(ConfigError::Invalid(
                "search_max_pages must be at least 1".to_string(),
            ));
        }
        self.reference_tz()?;
        Ok(())
    }

    pub fn reference_tz(&self) -> Result<Tz, ConfigError> {
        self.reference_timezone.parse::<Tz>().map_err(|_| {
            ConfigError::Invalid(format!(
                "unknown reference timezone {:?}",
                self.reference_timezone
            ))
        })
    }

    pub fn tournament_ids(&self) -> HashSet<u64> {
        self.tournaments.values().copied().collect()
    }

    pub fn feed_code_for(&self, tournament_id: u64) -> Option<&str> {
        let slug = self
            .tournaments
            .iter()
            .find(|(_, id)| **id == tournament_id)
            .map(|(slug, _)| slug)?;
        self.feed_leagues.get(slug).map(String::as_str)
    }

    pub fn resolved_db_path(&self) -> Option<PathBuf> {
        self.database_path.clone().or_else(default_db_path)
    }

    /// Sink for runs whose records update rows already in the store.
    ///
    /// The configured tabular sink becomes the queued one. A tabular sink asked for
    /// explicitly is rejected, the null sink stays available for dry runs.
    pub fn store_run_sink(&self, requested: Option<SinkKind>) -> Result<SinkKind, ConfigError> {
        match requested.unwrap_or(self.sink) {
            SinkKind::Tabular if requested.is_some() => Err(ConfigError::Invalid(
                "ratings and feed runs update the store, use the queued or null sink".to_string(),
            )),
            SinkKind::Null => Ok(SinkKind::Null),
            SinkKind::Tabular | SinkKind::Queued => Ok(SinkKind::Queued),
        }
    }

    /// Worker count to use, `None` when the run is sequential.
    pub fn worker_threads(&self) -> Option<usize> {
        self.multithreading.then_some(self.num_of_threads.max(1))
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn host_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

struct BoolFlag(bool);

impl FromStr for BoolFlag {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Ok(BoolFlag(true)),
            "" | "0" | "false" | "off" | "no" => Ok(BoolFlag(false)),
            _ => Err(()),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parsed<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    let Some(raw) = env_string(key) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidEnv {
            key: key.to_string(),
            value: raw,
        })
}

fn default_tournaments() -> BTreeMap<String, u64> {
    [
        ("premier-league", 17),
        ("laliga", 8),
        ("bundesliga", 35),
        ("serie-a", 23),
        ("ligue-1", 34),
    ]
    .into_iter()
    .map(|(slug, id)| (slug.to_string(), id))
    .collect()
}

fn default_feed_leagues() -> BTreeMap<String, String> {
    [
        ("premier-league", "E0"),
        ("laliga", "SP1"),
        ("bundesliga", "D1"),
        ("serie-a", "I1"),
        ("ligue-1", "F1"),
    ]
    .into_iter()
    .map(|(slug, code)| (slug.to_string(), code.to_string()))
    .collect()
}

fn default_alias() -> HashMap<String, u64> {
    [
        ("Samuel Radlinger-Sahin", 193272),
        ("Tomáš Vaclík", 204120),
        ("Bryan Salvatierra", 246785),
        ("Clinton N'Jie", 212273),
        ("Pierre Lees Melou", 230020),
        ("Nicolas N'Koulou", 188829),
        ("Jóhann Guðmundsson", 191076),
        ("Igniatius Ganago", 241130),
        ("Heung-Min Son", 200104),
        ("Rúnar Alex", 222562),
    ]
    .into_iter()
    .map(|(name, id)| (name.to_string(), id))
    .collect()
}

fn default_team_alias() -> HashMap<String, String> {
    [
        ("Wolverhampton", "Wolves"),
        ("PSG", "Paris SG"),
        ("Bremen", "Werder Bremen"),
        ("Fortuna", "Fortuna Dusseldorf"),
        ("1. FC Köln", "FC Koln"),
        ("Mainz 05", "Mainz"),
        ("Athletic", "Ath Bilbao"),
        ("Real Sociedad", "Sociedad"),
        ("ACR Messina", "Messina"),
        ("Robur Siena", "Siena"),
        ("Bayern M.", "Bayern Munich"),
        ("Deportivo La Coruña", "La Coruna"),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to.to_string()))
    .collect()
}
