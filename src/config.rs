use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::classifier::{onnx, openai};
use crate::db::models::Platform;
use crate::sources::quora::{QuoraConfig, DEFAULT_KEYWORDS};
use crate::sources::reddit::{self, RedditConfig};
use crate::sources::twitter::{self, TwitterConfig};

pub const DEFAULT_SUBREDDITS: &[&str] = &[
    "news",
    "worldnews",
    "politics",
    "all",
    "pakistan",
    "AskReddit",
    "memes",
    "funny",
];

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
pub struct Config {
    pub db_path: String,
    /// Connectors `scrape` and `run` use when no --source is given.
    pub sources: Vec<Platform>,

    pub reddit_client_id: String,
    pub reddit_client_secret: String,
    pub reddit_user_agent: String,
    pub reddit_subreddits: Vec<String>,
    pub reddit_per_community_limit: usize,
    pub reddit_total_limit: usize,

    pub quora_keywords: Vec<String>,
    pub quora_max_pages: usize,
    pub quora_max_answers: usize,
    /// Chromium binary (auto-detected when unset).
    pub chrome_path: Option<String>,

    pub twitter_bearer_token: String,
    pub twitter_query: String,
    pub twitter_duration: Duration,

    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    /// Minimum spacing between completion calls across all workers.
    pub label_delay: Duration,
    pub label_concurrency: usize,

    /// Directory containing the trained classifier (model.onnx + tokenizer.json).
    pub model_dir: PathBuf,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default except credentials, which are checked by
    /// the `require_*` methods only when a command needs them.
    pub fn load() -> Result<Self> {
        let sources = match env::var("HATEWATCH_SOURCES") {
            Ok(raw) => parse_platforms(&raw)?,
            Err(_) => vec![Platform::Reddit, Platform::Quora, Platform::Twitter],
        };

        let quora_keywords = list_var("QUORA_KEYWORDS")
            .unwrap_or_else(|| DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect());

        let twitter_query = env::var("TWITTER_QUERY")
            .ok()
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| twitter::build_query(&quora_keywords));

        let log_format = match env::var("HATEWATCH_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            // "pretty" or unset
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            db_path: env::var("HATEWATCH_DB_PATH").unwrap_or_else(|_| "./hatewatch.db".to_string()),
            sources,

            reddit_client_id: env::var("REDDIT_CLIENT_ID").unwrap_or_default(),
            reddit_client_secret: env::var("REDDIT_CLIENT_SECRET").unwrap_or_default(),
            reddit_user_agent: env::var("REDDIT_USER_AGENT")
                .unwrap_or_else(|_| crate::sources::USER_AGENT.to_string()),
            reddit_subreddits: list_var("REDDIT_SUBREDDITS")
                .unwrap_or_else(|| DEFAULT_SUBREDDITS.iter().map(|s| s.to_string()).collect()),
            reddit_per_community_limit: parse_var("REDDIT_PER_COMMUNITY_LIMIT", 200)?,
            reddit_total_limit: parse_var("REDDIT_TOTAL_LIMIT", 10_000)?,

            quora_keywords,
            quora_max_pages: parse_var("QUORA_MAX_PAGES", 2)?,
            quora_max_answers: parse_var("QUORA_MAX_ANSWERS", 3)?,
            chrome_path: env::var("CHROME_PATH").ok().filter(|p| !p.is_empty()),

            twitter_bearer_token: env::var("TWITTER_BEARER_TOKEN").unwrap_or_default(),
            twitter_query,
            twitter_duration: minutes_var("TWITTER_DURATION_MINUTES", 10)?,

            llm_api_key: env::var("LLM_API_KEY").unwrap_or_default(),
            llm_base_url: env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| openai::DEFAULT_BASE_URL.to_string()),
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| openai::DEFAULT_MODEL.to_string()),
            label_delay: Duration::from_millis(parse_var("LABEL_DELAY_MS", 300)?),
            label_concurrency: parse_var("LABEL_CONCURRENCY", 4)?,

            model_dir: env::var("HATEWATCH_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| onnx::default_model_dir()),
            log_format,
        })
    }

    /// Check that Reddit app credentials are configured.
    pub fn require_reddit(&self) -> Result<()> {
        if self.reddit_client_id.is_empty() || self.reddit_client_secret.is_empty() {
            anyhow::bail!(
                "REDDIT_CLIENT_ID and REDDIT_CLIENT_SECRET must be set to scrape Reddit.\n\
                 Create a \"script\" app at https://www.reddit.com/prefs/apps and add both to .env.\n\
                 Or drop reddit from HATEWATCH_SOURCES."
            );
        }
        Ok(())
    }

    /// Check that a Twitter/X API bearer token is configured.
    pub fn require_twitter(&self) -> Result<()> {
        if self.twitter_bearer_token.is_empty() {
            anyhow::bail!(
                "TWITTER_BEARER_TOKEN not set. Add it to your .env file,\n\
                 or drop twitter from HATEWATCH_SOURCES."
            );
        }
        Ok(())
    }

    /// Check that the completion API key is configured.
    /// Call this before labeling.
    pub fn require_llm(&self) -> Result<()> {
        if self.llm_api_key.is_empty() {
            anyhow::bail!(
                "LLM_API_KEY not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    /// Check that the trained classifier is where we expect it.
    pub fn require_model(&self) -> Result<()> {
        if !onnx::model_files_present(&self.model_dir) {
            anyhow::bail!(
                "Classifier files not found in {}\n\
                 Expected {} and {}. Set HATEWATCH_MODEL_DIR to the exported model directory.",
                self.model_dir.display(),
                onnx::MODEL_FILE,
                onnx::TOKENIZER_FILE
            );
        }
        Ok(())
    }

    pub fn reddit(&self) -> RedditConfig {
        RedditConfig {
            client_id: self.reddit_client_id.clone(),
            client_secret: self.reddit_client_secret.clone(),
            user_agent: self.reddit_user_agent.clone(),
            communities: self.reddit_subreddits.clone(),
            per_community_limit: self.reddit_per_community_limit,
            total_limit: self.reddit_total_limit,
            auth_url: reddit::DEFAULT_AUTH_URL.to_string(),
            api_url: reddit::DEFAULT_API_URL.to_string(),
        }
    }

    pub fn quora(&self) -> QuoraConfig {
        QuoraConfig {
            keywords: self.quora_keywords.clone(),
            max_pages: self.quora_max_pages,
            max_answers: self.quora_max_answers,
            chrome_path: self.chrome_path.clone(),
            ..QuoraConfig::default()
        }
    }

    pub fn twitter(&self) -> TwitterConfig {
        TwitterConfig::new(
            self.twitter_bearer_token.clone(),
            self.twitter_query.clone(),
            self.twitter_duration,
        )
    }
}

/// Parse a comma-separated platform list ("reddit,quora").
pub fn parse_platforms(raw: &str) -> Result<Vec<Platform>> {
    let mut platforms = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let platform = Platform::parse(name)
            .with_context(|| format!("Unknown source {name:?} (expected reddit, quora or twitter)"))?;
        if !platforms.contains(&platform) {
            platforms.push(platform);
        }
    }
    Ok(platforms)
}

/// A comma-separated list variable. Unset or empty means "use the default".
fn list_var(name: &str) -> Option<Vec<String>> {
    let raw = env::var(name).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!items.is_empty()).then_some(items)
}

/// A duration given in whole minutes. Values too large to represent are an error.
fn minutes_var(name: &str, default: u64) -> Result<Duration> {
    let minutes: u64 = parse_var(name, default)?;
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .with_context(|| format!("{name} is too large, got {minutes} minutes"))
}

/// A numeric variable with a default. Set-but-unparseable is an error.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a number, got {raw:?}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_platforms() {
        assert_eq!(
            parse_platforms("reddit, twitter").unwrap(),
            vec![Platform::Reddit, Platform::Twitter]
        );
        assert_eq!(parse_platforms("x,twitter").unwrap(), vec![Platform::Twitter]);
        assert!(parse_platforms("").unwrap().is_empty());
        assert!(parse_platforms("reddit,myspace").is_err());
    }

    // Each test uses its own variable name so parallel tests don't race.

    #[test]
    fn test_parse_var_default_and_override() {
        assert_eq!(parse_var("HATEWATCH_TEST_UNSET_NUMBER", 42usize).unwrap(), 42);

        env::set_var("HATEWATCH_TEST_SET_NUMBER", " 17 ");
        assert_eq!(parse_var("HATEWATCH_TEST_SET_NUMBER", 42usize).unwrap(), 17);
        env::remove_var("HATEWATCH_TEST_SET_NUMBER");
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("HATEWATCH_TEST_BAD_NUMBER", "lots");
        let err = parse_var("HATEWATCH_TEST_BAD_NUMBER", 1u64).unwrap_err();
        assert!(err.to_string().contains("HATEWATCH_TEST_BAD_NUMBER"));
        env::remove_var("HATEWATCH_TEST_BAD_NUMBER");
    }

    #[test]
    fn test_minutes_var() {
        assert_eq!(
            minutes_var("HATEWATCH_TEST_UNSET_MINUTES", 10).unwrap(),
            Duration::from_secs(600)
        );

        env::set_var("HATEWATCH_TEST_HUGE_MINUTES", u64::MAX.to_string());
        let err = minutes_var("HATEWATCH_TEST_HUGE_MINUTES", 10).unwrap_err();
        assert!(err.to_string().contains("too large"));
        env::remove_var("HATEWATCH_TEST_HUGE_MINUTES");
    }

    #[test]
    fn test_list_var() {
        env::set_var("HATEWATCH_TEST_LIST", "news, ,funny,");
        assert_eq!(
            list_var("HATEWATCH_TEST_LIST"),
            Some(vec!["news".to_string(), "funny".to_string()])
        );
        env::set_var("HATEWATCH_TEST_LIST", " , ");
        assert_eq!(list_var("HATEWATCH_TEST_LIST"), None);
        env::remove_var("HATEWATCH_TEST_LIST");
    }
}
