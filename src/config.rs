// src/config.rs
//! Process configuration: required secrets from the environment, tunables with
//! env overrides, and an optional TOML file for keyword/entity/feed lists.
//!
//! Everything is resolved once in `main` into a single [`AppConfig`] that is
//! passed by reference into the pipeline. No component reads the environment
//! after startup.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_CHANNEL: &str = "TELEGRAM_CHANNEL_ID";
pub const ENV_GEMINI_KEY: &str = "GEMINI_API_KEY";
pub const ENV_CONFIG_PATH: &str = "EGX_CONFIG_PATH";
pub const ENV_SIMILARITY_THRESHOLD: &str = "EGX_SIMILARITY_THRESHOLD";
pub const ENV_HISTORY_PATH: &str = "EGX_HISTORY_PATH";
pub const ENV_HISTORY_CAP: &str = "EGX_HISTORY_CAP";
pub const ENV_VALUATION_PATH: &str = "EGX_VALUATION_CACHE_PATH";
pub const ENV_DIGEST_PATH: &str = "EGX_DIGEST_PATH";
pub const ENV_REQUIRE_VALUATION: &str = "EGX_REQUIRE_VALUATION";
pub const ENV_CYCLE_INTERVAL: &str = "EGX_CYCLE_INTERVAL_SECS";
pub const ENV_DELIVERY_PAUSE: &str = "EGX_DELIVERY_PAUSE_SECS";

pub const DEFAULT_CONFIG_PATH: &str = "config/egx.toml";
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.75;
pub const DEFAULT_HISTORY_CAP: usize = 500;
pub const DEFAULT_CYCLE_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_DELIVERY_PAUSE_SECS: u64 = 5;

/// Feed entries considered per source per cycle.
pub const MAX_FEED_ITEMS: usize = 5;
/// Pulse-page items delivered per cycle.
pub const MAX_PULSE_DELIVERIES: usize = 3;

const DEFAULT_FEEDS: &[(&str, &str)] = &[
    ("ArabFinance/2", "https://www.arabfinance.com/ar/rss/rssbycat/2"),
    ("ArabFinance/3", "https://www.arabfinance.com/ar/rss/rssbycat/3"),
    ("Mubasher", "http://feeds.mubasher.info/ar/EGX/news"),
];
const DEFAULT_PULSE_URL: &str = "https://www.mubasher.info/news/eg/pulse/stocks";
const DEFAULT_PULSE_ORIGIN: &str = "https://www.mubasher.info";

const DEFAULT_KEYWORDS: &[&str] = &[
    "سهم",
    "أسهم",
    "بورصة",
    "ارباح",
    "أرباح",
    "خسائر",
    "نتائج أعمال",
    "زيادة رأس مال",
    "توزيع كوبون",
    "استحواذ",
    "اندماج",
    "اكتتاب",
    "القوائم المالية",
    "مجلس إدارة",
    "إفصاح",
    "تداول",
    "البورصة المصرية",
    "egx",
    "كوبون",
    "جمعية عمومية",
    "هيئة الرقابة المالية",
    "موازنة",
];

const DEFAULT_POSITIVE: &[&str] = &[
    "أرباح",
    "ارباح",
    "نمو",
    "زيادة",
    "ارتفاع",
    "توزيع",
    "استحواذ",
    "توسع",
    "صفقة",
    "تعاقد",
];

const DEFAULT_NEGATIVE: &[&str] = &[
    "خسائر",
    "خسارة",
    "تراجع",
    "انخفاض",
    "هبوط",
    "غرامة",
    "إيقاف",
    "شطب",
    "تعثر",
];

/// Built-in alias table for widely covered EGX names. The valuation cache
/// contributes more aliases at cycle start (see `EntityResolver`).
const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("البنك التجاري الدولي", "COMI"),
    ("التجاري الدولي", "COMI"),
    ("cib", "COMI"),
    ("هيرميس", "HRHO"),
    ("اي اف جي", "HRHO"),
    ("efg", "HRHO"),
    ("السويدي اليكتريك", "SWDY"),
    ("السويدي", "SWDY"),
    ("طلعت مصطفى", "TMGH"),
    ("الشرقية للدخان", "EAST"),
    ("ايسترن كومباني", "EAST"),
    ("فوري", "FWRY"),
    ("ابو قير للأسمدة", "ABUK"),
    ("أبو قير", "ABUK"),
    ("مصر لصناعة الأسمدة", "MFPC"),
    ("موبكو", "MFPC"),
    ("العز الدخيلة", "IRAX"),
    ("حديد عز", "ESRS"),
    ("جهينة", "JUFO"),
    ("ادفا", "EFIH"),
    ("اي فاينانس", "EFIH"),
    ("اوراسكوم كونستراكشون", "ORAS"),
    ("اوراسكوم للتنمية", "ORHD"),
    ("بالم هيلز", "PHDC"),
    ("مدينة نصر للاسكان", "MNHD"),
    ("القلعة", "CCAP"),
    ("النساجون الشرقيون", "ORWE"),
];

/// Resolved process configuration. Constructed once, passed by reference.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_token: String,
    pub telegram_channel_id: String,
    pub gemini_api_key: Option<String>,

    pub feeds: Vec<FeedSpec>,
    pub pulse_url: String,
    pub pulse_origin: String,

    pub keywords: Vec<String>,
    pub positive_keywords: Vec<String>,
    pub negative_keywords: Vec<String>,
    pub entity_aliases: Vec<(String, String)>,

    pub similarity_threshold: f64,
    pub history_path: PathBuf,
    pub history_cap: usize,
    pub valuation_cache_path: PathBuf,
    pub digest_path: PathBuf,
    /// When true, items whose tickers have no valuation entry are skipped
    /// instead of delivered in degraded form.
    pub require_valuation: bool,

    pub cycle_interval_secs: u64,
    pub delivery_pause_secs: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FeedSpec {
    pub name: String,
    pub url: String,
}

impl AppConfig {
    /// Build the configuration from the environment, layering the optional
    /// TOML file on top of built-in defaults. Missing Telegram credentials
    /// are fatal; a missing Gemini key only disables model analysis.
    pub fn from_env() -> Result<Self> {
        let telegram_token = require_env(ENV_TELEGRAM_TOKEN)?;
        let telegram_channel_id = require_env(ENV_TELEGRAM_CHANNEL)?;
        let gemini_api_key = std::env::var(ENV_GEMINI_KEY)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let file = load_file_config()?;

        let feeds = match file.sources.as_ref().and_then(|s| s.feeds.clone()) {
            Some(f) if !f.is_empty() => f,
            _ => DEFAULT_FEEDS
                .iter()
                .map(|(name, url)| FeedSpec {
                    name: (*name).to_string(),
                    url: (*url).to_string(),
                })
                .collect(),
        };
        let pulse_url = file
            .sources
            .as_ref()
            .and_then(|s| s.pulse_url.clone())
            .unwrap_or_else(|| DEFAULT_PULSE_URL.to_string());
        let pulse_origin = file
            .sources
            .as_ref()
            .and_then(|s| s.pulse_origin.clone())
            .unwrap_or_else(|| DEFAULT_PULSE_ORIGIN.to_string());

        let keywords = list_or_default(
            file.relevance.as_ref().and_then(|r| r.keywords.clone()),
            DEFAULT_KEYWORDS,
        );
        let positive_keywords = list_or_default(
            file.polarity.as_ref().and_then(|p| p.positive.clone()),
            DEFAULT_POSITIVE,
        );
        let negative_keywords = list_or_default(
            file.polarity.as_ref().and_then(|p| p.negative.clone()),
            DEFAULT_NEGATIVE,
        );

        let mut entity_aliases: Vec<(String, String)> = DEFAULT_ALIASES
            .iter()
            .map(|(a, t)| ((*a).to_string(), (*t).to_string()))
            .collect();
        if let Some(extra) = file.entities {
            for (alias, ticker) in extra {
                entity_aliases.push((alias, ticker));
            }
        }

        let similarity_threshold =
            parse_threshold_env(std::env::var(ENV_SIMILARITY_THRESHOLD).ok())
                .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);

        let history_cap = std::env::var(ENV_HISTORY_CAP)
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_HISTORY_CAP);

        Ok(Self {
            telegram_token,
            telegram_channel_id,
            gemini_api_key,
            feeds,
            pulse_url,
            pulse_origin,
            keywords,
            positive_keywords,
            negative_keywords,
            entity_aliases,
            similarity_threshold,
            history_path: env_path(ENV_HISTORY_PATH, "sent_news.json"),
            history_cap,
            valuation_cache_path: env_path(ENV_VALUATION_PATH, "valuation_cache.json"),
            digest_path: env_path(ENV_DIGEST_PATH, "valuation_digest.json"),
            require_valuation: env_flag(ENV_REQUIRE_VALUATION),
            cycle_interval_secs: env_u64(ENV_CYCLE_INTERVAL, DEFAULT_CYCLE_INTERVAL_SECS),
            delivery_pause_secs: env_u64(ENV_DELIVERY_PAUSE, DEFAULT_DELIVERY_PAUSE_SECS),
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    let v = std::env::var(name)
        .map_err(|_| anyhow!("required environment variable {name} is not set"))?;
    let v = v.trim().to_string();
    if v.is_empty() {
        return Err(anyhow!("required environment variable {name} is empty"));
    }
    Ok(v)
}

fn env_path(name: &str, default: &str) -> PathBuf {
    std::env::var(name)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name).unwrap_or_default().trim(),
        "1" | "true" | "yes"
    )
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

// parse optional float env and clamp to <0.0..=1.0>
pub(crate) fn parse_threshold_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .map(|v| v.clamp(0.0, 1.0))
}

fn list_or_default(list: Option<Vec<String>>, default: &[&str]) -> Vec<String> {
    match list {
        Some(v) if !v.is_empty() => v
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => default.iter().map(|s| (*s).to_string()).collect(),
    }
}

/* ----------------------------
Optional TOML overrides
---------------------------- */

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    sources: Option<SourcesSection>,
    #[serde(default)]
    relevance: Option<RelevanceSection>,
    #[serde(default)]
    polarity: Option<PolaritySection>,
    /// `[entities]` table: alias = "TICKER"
    #[serde(default)]
    entities: Option<HashMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
struct SourcesSection {
    #[serde(default)]
    feeds: Option<Vec<FeedSpec>>,
    #[serde(default)]
    pulse_url: Option<String>,
    #[serde(default)]
    pulse_origin: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RelevanceSection {
    #[serde(default)]
    keywords: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct PolaritySection {
    #[serde(default)]
    positive: Option<Vec<String>>,
    #[serde(default)]
    negative: Option<Vec<String>>,
}

/// Load the optional TOML file. An explicitly configured path must exist and
/// parse; the default path is best-effort.
fn load_file_config() -> Result<FileConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(p);
        return parse_file_config(&path)
            .with_context(|| format!("loading config from {}", path.display()));
    }
    let default = Path::new(DEFAULT_CONFIG_PATH);
    if default.exists() {
        return parse_file_config(default)
            .with_context(|| format!("loading config from {}", default.display()));
    }
    Ok(FileConfig::default())
}

fn parse_file_config(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)?;
    let cfg: FileConfig = toml::from_str(&content)?;
    Ok(cfg)
}
