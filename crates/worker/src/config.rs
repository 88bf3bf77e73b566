use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use promptline_core::error::CoreError;
use promptline_core::text::DEFAULT_CHUNK_SIZE_WORDS;
use promptline_core::timeline::{DEFAULT_FRAME_INTERVAL_SECS, DEFAULT_NARRATION_WPM};
use promptline_core::types::{
    FilterConfig, DEFAULT_MIN_QUALITY_SCORE, DEFAULT_SIMILARITY_THRESHOLD,
};
use promptline_llm::provider::{LlmSettings, Provider, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use promptline_llm::retry::RetryConfig;
use promptline_pipeline::runner::{PipelineSettings, DEFAULT_VISUAL_STYLE};

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Narrative text to convert.
    pub input: PathBuf,
    /// Final JSON document.
    pub output: PathBuf,
    pub pipeline: PipelineSettings,
    pub llm: LlmSettings,
    pub retry: RetryConfig,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                        |
    /// |----------------------------|--------------------------------|
    /// | `PROMPTLINE_INPUT`         | required                       |
    /// | `PROMPTLINE_OUTPUT`        | `<input stem>.prompts.json`    |
    /// | `FRAME_INTERVAL_SECS`      | `6.0` (3 to 30)                |
    /// | `NARRATION_WPM`            | `150` (100 to 200)             |
    /// | `CHUNK_SIZE_WORDS`         | `1000`                         |
    /// | `VISUAL_STYLE`             | `historical illustration`      |
    /// | `DENSE_MODE`               | `false`                        |
    /// | `DEDUP_ENABLED`            | `true`                         |
    /// | `DEDUP_THRESHOLD`          | `0.85`                         |
    /// | `QUALITY_FILTER_ENABLED`   | `true`                         |
    /// | `MIN_QUALITY_SCORE`        | `0.5`                          |
    /// | `ENHANCEMENT_ENABLED`      | `true`                         |
    /// | `LLM_PROVIDER`             | `openrouter`                   |
    /// | `LLM_API_KEY`              | required                       |
    /// | `LLM_BASE_URL`             | provider public API            |
    /// | `LLM_MODEL`                | provider default               |
    /// | `LLM_MAX_TOKENS`           | `4000`                         |
    /// | `LLM_TEMPERATURE`          | `0.7`                          |
    /// | `LLM_REQUESTS_PER_MINUTE`  | provider default               |
    /// | `RETRY_MAX_ATTEMPTS`       | `5`                            |
    /// | `RETRY_INITIAL_DELAY_SECS` | `1`                            |
    /// | `RETRY_MAX_DELAY_SECS`     | `60`                           |
    /// | `RETRY_MULTIPLIER`         | `2.0`                          |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let input = PathBuf::from(env.required("PROMPTLINE_INPUT")?);
        let output = env
            .string("PROMPTLINE_OUTPUT")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_output_path(&input));

        let filters = FilterConfig {
            dedup_enabled: env.parse("DEDUP_ENABLED", true)?,
            similarity_threshold: env.parse("DEDUP_THRESHOLD", DEFAULT_SIMILARITY_THRESHOLD)?,
            quality_enabled: env.parse("QUALITY_FILTER_ENABLED", true)?,
            min_quality_score: env.parse("MIN_QUALITY_SCORE", DEFAULT_MIN_QUALITY_SCORE)?,
            enhancement_enabled: env.parse("ENHANCEMENT_ENABLED", true)?,
        };

        let pipeline = PipelineSettings {
            narration_wpm: env.parse("NARRATION_WPM", DEFAULT_NARRATION_WPM)?,
            frame_interval_seconds: env.parse("FRAME_INTERVAL_SECS", DEFAULT_FRAME_INTERVAL_SECS)?,
            chunk_size: env.parse("CHUNK_SIZE_WORDS", DEFAULT_CHUNK_SIZE_WORDS)?,
            visual_style: env
                .string("VISUAL_STYLE")
                .unwrap_or_else(|| DEFAULT_VISUAL_STYLE.to_string()),
            dense_mode: env.parse("DENSE_MODE", false)?,
            filters,
        };
        pipeline.validate()?;

        let provider: Provider = env.parse("LLM_PROVIDER", Provider::OpenRouter)?;
        let mut llm = LlmSettings::new(provider, env.required("LLM_API_KEY")?);
        if let Some(base_url) = env.string("LLM_BASE_URL") {
            llm.base_url = base_url;
        }
        if let Some(model) = env.string("LLM_MODEL") {
            llm.model = model;
        }
        llm.max_tokens = env.parse("LLM_MAX_TOKENS", DEFAULT_MAX_TOKENS)?;
        llm.temperature = env.parse("LLM_TEMPERATURE", DEFAULT_TEMPERATURE)?;
        llm.requests_per_minute =
            env.parse("LLM_REQUESTS_PER_MINUTE", provider.default_requests_per_minute())?;

        let retry = RetryConfig {
            max_attempts: env.parse("RETRY_MAX_ATTEMPTS", 5)?,
            initial_delay: env.seconds("RETRY_INITIAL_DELAY_SECS", 1.0)?,
            max_delay: env.seconds("RETRY_MAX_DELAY_SECS", 60.0)?,
            multiplier: env.parse("RETRY_MULTIPLIER", 2.0)?,
        };
        if retry.max_attempts == 0 {
            return Err(CoreError::Validation("RETRY_MAX_ATTEMPTS must be at least 1".into()));
        }
        if !(retry.multiplier >= 1.0) {
            return Err(CoreError::Validation(format!(
                "RETRY_MULTIPLIER must be at least 1.0, got {}",
                retry.multiplier
            )));
        }

        Ok(Self {
            input,
            output,
            pipeline,
            llm,
            retry,
        })
    }
}

/// `book.txt` becomes `book.prompts.json` next to it.
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("prompts.json")
}

// ---- private helpers ----

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Non-empty, trimmed value of `key`.
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, CoreError> {
        self.string(key).ok_or_else(|| {
            CoreError::Validation(format!("{key} environment variable is required"))
        })
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, CoreError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.string(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|e| CoreError::Validation(format!("{key}: invalid value '{raw}': {e}"))),
        }
    }

    fn seconds(&self, key: &str, default: f64) -> Result<Duration, CoreError> {
        let secs: f64 = self.parse(key, default)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            CoreError::Validation(format!("{key} must be a non-negative number of seconds"))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<WorkerConfig, CoreError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|key| map.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] =
        [("PROMPTLINE_INPUT", "texts/book.txt"), ("LLM_API_KEY", "k")];

    // -- defaults ------------------------------------------------------------

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = load(&REQUIRED).unwrap();
        assert_eq!(config.output, PathBuf::from("texts/book.prompts.json"));
        assert_eq!(config.pipeline, PipelineSettings::default());
        assert_eq!(config.llm.provider, Provider::OpenRouter);
        assert_eq!(config.llm.requests_per_minute, 20);
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn missing_required_vars_fail() {
        assert_matches!(
            load(&[("LLM_API_KEY", "k")]),
            Err(CoreError::Validation(msg)) if msg.contains("PROMPTLINE_INPUT")
        );
        assert_matches!(
            load(&[("PROMPTLINE_INPUT", "a.txt")]),
            Err(CoreError::Validation(msg)) if msg.contains("LLM_API_KEY")
        );
    }

    // -- overrides -----------------------------------------------------------

    #[test]
    fn overrides_are_parsed() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("PROMPTLINE_OUTPUT", "out/run.json"),
            ("FRAME_INTERVAL_SECS", "4.5"),
            ("DEDUP_ENABLED", "false"),
            ("MIN_QUALITY_SCORE", "0.65"),
            ("LLM_PROVIDER", "anthropic"),
            ("LLM_MODEL", "claude-custom"),
            ("LLM_BASE_URL", "http://localhost:4000/v1"),
            ("RETRY_INITIAL_DELAY_SECS", "0.5"),
        ]);
        let config = load(&vars).unwrap();
        assert_eq!(config.output, PathBuf::from("out/run.json"));
        assert_eq!(config.pipeline.frame_interval_seconds, 4.5);
        assert!(!config.pipeline.filters.dedup_enabled);
        assert_eq!(config.pipeline.filters.min_quality_score, 0.65);
        assert_eq!(config.llm.provider, Provider::Anthropic);
        assert_eq!(config.llm.model, "claude-custom");
        assert_eq!(config.llm.endpoint(), "http://localhost:4000/v1/messages");
        assert_eq!(config.llm.requests_per_minute, 10);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(500));
    }

    // -- validation ----------------------------------------------------------

    #[test]
    fn out_of_range_values_are_rejected() {
        for (key, value) in [
            ("FRAME_INTERVAL_SECS", "2"),
            ("NARRATION_WPM", "250"),
            ("DEDUP_THRESHOLD", "1.5"),
            ("CHUNK_SIZE_WORDS", "0"),
            ("LLM_PROVIDER", "cohere"),
            ("RETRY_MAX_ATTEMPTS", "0"),
            ("RETRY_MULTIPLIER", "0.5"),
            ("RETRY_MAX_DELAY_SECS", "-1"),
            ("DENSE_MODE", "yes please"),
        ] {
            let mut vars = REQUIRED.to_vec();
            vars.push((key, value));
            assert_matches!(load(&vars), Err(CoreError::Validation(_)), "{key}={value}");
        }
    }

    #[test]
    fn default_output_sits_next_to_input() {
        assert_eq!(
            default_output_path(Path::new("a/b.txt")),
            PathBuf::from("a/b.prompts.json")
        );
        assert_eq!(
            default_output_path(Path::new("story")),
            PathBuf::from("story.prompts.json")
        );
    }
}
