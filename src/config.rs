use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://export.arxiv.org/api/query";
pub const MAX_TAGS: usize = 5;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    pub categories: Vec<String>,
    pub page_size: usize,
    pub max_pages: u32,
    pub request_delay: Duration,
    pub retries: u32,
    pub timeout: Duration
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            base_url: String::from(DEFAULT_BASE_URL),
            categories: vec![
                String::from("cs.AI"),
                String::from("cs.LG"),
                String::from("cs.CL"),
                String::from("cs.CV"),
                String::from("cs.NE")
            ],
            page_size: 50,
            max_pages: 10,
            request_delay: Duration::from_secs(3),
            retries: 2,
            timeout: Duration::from_secs(30)
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub language: String
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            program: String::from("claude"),
            args: vec![String::from("-p")],
            timeout: Duration::from_secs(120),
            language: String::from("English")
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub private_flag: Option<String>,
    // arguments for a version probe run before publishing. empty skips it.
    pub check_args: Vec<String>,
    // variable that must hold the access token. `None` skips the check.
    pub token_env: Option<String>,
    pub tags: Vec<String>,
    pub output_dir: PathBuf
}

impl Default for PublishConfig {
    fn default() -> Self {
        PublishConfig {
            program: String::from("npx"),
            args: vec![String::from("qiita"), String::from("publish")],
            timeout: Duration::from_secs(60),
            private_flag: None,
            check_args: vec![String::from("qiita"), String::from("--version")],
            token_env: Some(String::from("QIITA_TOKEN")),
            tags: vec![
                String::from("AI"),
                String::from("MachineLearning"),
                String::from("arXiv"),
                String::from("Paper")
            ],
            output_dir: PathBuf::from("public")
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub fetch: FetchConfig,
    pub generator: GeneratorConfig,
    pub publish: PublishConfig
}

impl Config {
    // variables that are unset keep their default value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        let fetch = &mut config.fetch;
        if let Some(base_url) = lookup("ARXIV_BASE_URL") {
            fetch.base_url = base_url;
        }
        if let Some(categories) = get_words(&lookup, "ARXIV_CATEGORIES")? {
            fetch.categories = categories;
        }
        fetch.page_size = get_positive(&lookup, "ARXIV_PAGE_SIZE", fetch.page_size)?;
        fetch.max_pages = get_positive(&lookup, "ARXIV_MAX_PAGES", fetch.max_pages)?;
        fetch.request_delay = Duration::from_secs(
            get_number(&lookup, "ARXIV_DELAY_SECS", fetch.request_delay.as_secs())?
        );
        fetch.retries = get_number(&lookup, "ARXIV_RETRIES", fetch.retries)?;
        fetch.timeout = Duration::from_secs(
            get_positive(&lookup, "ARXIV_TIMEOUT_SECS", fetch.timeout.as_secs())?
        );

        let generator = &mut config.generator;
        if let Some(program) = lookup("GENERATOR_CMD") {
            generator.program = program;
        }
        if let Some(args) = lookup("GENERATOR_ARGS") {
            generator.args = args.split_whitespace().map(String::from).collect();
        }
        generator.timeout = Duration::from_secs(
            get_positive(&lookup, "GENERATOR_TIMEOUT_SECS", generator.timeout.as_secs())?
        );
        if let Some(language) = lookup("SUMMARY_LANGUAGE") {
            generator.language = language;
        }

        let publish = &mut config.publish;
        if let Some(program) = lookup("PUBLISH_CMD") {
            publish.program = program;
        }
        if let Some(args) = lookup("PUBLISH_ARGS") {
            publish.args = args.split_whitespace().map(String::from).collect();
        }
        publish.timeout = Duration::from_secs(
            get_positive(&lookup, "PUBLISH_TIMEOUT_SECS", publish.timeout.as_secs())?
        );
        publish.private_flag = lookup("PUBLISH_PRIVATE_FLAG").filter(|flag| !flag.trim().is_empty());
        if let Some(args) = lookup("PUBLISH_CHECK_ARGS") {
            publish.check_args = args.split_whitespace().map(String::from).collect();
        }
        if let Some(var) = lookup("PUBLISH_TOKEN_ENV") {
            publish.token_env = Some(var.trim().to_string()).filter(|var| !var.is_empty());
        }
        if let Some(tags) = get_words(&lookup, "PUBLISH_TAGS")? {
            if tags.len() > MAX_TAGS {
                return Err(ConfigError::Invalid {
                    key: String::from("PUBLISH_TAGS"),
                    value: tags.join(" "),
                    reason: format!("at most {} tags are allowed", MAX_TAGS)
                });
            }
            publish.tags = tags;
        }
        if let Some(dir) = lookup("OUTPUT_DIR") {
            publish.output_dir = PathBuf::from(dir);
        }

        Ok(config)
    }
}

fn get_words<F>(lookup: &F, key: &str) -> Result<Option<Vec<String>>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let words = raw.split_whitespace()
        .map(String::from)
        .collect::<Vec<_>>();
    if words.is_empty() {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
            reason: String::from("must not be empty")
        });
    }
    Ok(Some(words))
}

fn get_number<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string()
        })
    }
}

fn get_positive<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + From<u8>,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let var = get_number(lookup, key, default)?;
    if var <= T::from(0) {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            value: lookup(key).unwrap_or_default(),
            reason: String::from("must be positive")
        });
    }
    Ok(var)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.fetch.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.fetch.categories.len(), 5);
        assert_eq!(config.fetch.request_delay, Duration::from_secs(3));
        assert_eq!(config.generator.program, "claude");
        assert_eq!(config.publish.output_dir, PathBuf::from("public"));
        assert!(config.publish.private_flag.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("ARXIV_CATEGORIES", "cs.RO  stat.ML"),
            ("ARXIV_PAGE_SIZE", "20"),
            ("ARXIV_DELAY_SECS", "0"),
            ("GENERATOR_ARGS", "--print --model haiku"),
            ("PUBLISH_TAGS", "AI arXiv"),
            ("OUTPUT_DIR", "/tmp/articles")
        ])).unwrap();
        assert_eq!(config.fetch.categories, vec!["cs.RO", "stat.ML"]);
        assert_eq!(config.fetch.page_size, 20);
        assert_eq!(config.fetch.request_delay, Duration::ZERO);
        assert_eq!(config.generator.args, vec!["--print", "--model", "haiku"]);
        assert_eq!(config.publish.tags, vec!["AI", "arXiv"]);
        assert_eq!(config.publish.output_dir, PathBuf::from("/tmp/articles"));
    }

    #[test]
    fn test_publish_preflight_settings() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.publish.check_args, vec!["qiita", "--version"]);
        assert_eq!(config.publish.token_env.as_deref(), Some("QIITA_TOKEN"));

        let config = Config::from_lookup(lookup_from(&[
            ("PUBLISH_CHECK_ARGS", ""),
            ("PUBLISH_TOKEN_ENV", " ")
        ])).unwrap();
        assert!(config.publish.check_args.is_empty());
        assert!(config.publish.token_env.is_none());
    }

    #[test]
    fn test_rejects_invalid_numbers() {
        let err = Config::from_lookup(lookup_from(&[("ARXIV_PAGE_SIZE", "lots")])).unwrap_err();
        assert!(err.to_string().contains("ARXIV_PAGE_SIZE"));

        let err = Config::from_lookup(lookup_from(&[("ARXIV_MAX_PAGES", "0")])).unwrap_err();
        assert!(err.to_string().contains("must be positive"));
    }

    #[test]
    fn test_rejects_too_many_tags() {
        let result = Config::from_lookup(lookup_from(&[("PUBLISH_TAGS", "a b c d e f")]));
        assert!(result.is_err());
    }
}
