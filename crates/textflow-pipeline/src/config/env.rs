use std::str::FromStr;

use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Some(limit) = env_parse("TEXTFLOW_HISTORY_LIMIT") {
            self.engine.history_limit = limit;
        }
        if let Some(size) = env_parse("TEXTFLOW_BATCH_SIZE") {
            self.engine.batch_size = size;
        }
        if let Some(ms) = env_parse("TEXTFLOW_BATCH_DELAY_MS") {
            self.engine.batch_delay_ms = ms;
        }
        if let Some(ms) = env_parse("TEXTFLOW_RETRY_BASE_MS") {
            self.engine.retry_base_ms = ms;
        }
        if let Some(ms) = env_parse("TEXTFLOW_RETRY_MAX_MS") {
            self.engine.retry_max_ms = ms;
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(parsed) = v.trim().parse() {
        Some(parsed)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}
