//! `WorkerConfig`: every runtime knob named in the env table (spec.md §6),
//! with the same documented defaults. Mirrors the teacher's env-driven
//! `aivcs_core::config` idiom: typed fields, a `Default` impl, and a
//! `from_env` constructor that never panics on a missing var.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub lock_duration_ms: u64,
    pub lock_renew_ms: u64,
    pub rate_limit_per_min: u32,
    pub agent_model: String,
    pub self_heal_model: String,
    pub max_api_calls: u32,
    pub max_calls_per_step: u32,
    pub headless: bool,
    pub vnc_port_range: (u16, u16),
    pub port_max_age_minutes: u64,
    pub artifacts_base_path: PathBuf,
    pub default_timeout_ms: u64,
    pub planner_endpoint: Option<String>,
    pub planner_api_key: Option<String>,
    pub generator_endpoint: Option<String>,
    pub generator_api_key: Option<String>,
    pub json_logs: bool,
    pub surreal_backend: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            lock_duration_ms: 300_000,
            lock_renew_ms: 60_000,
            rate_limit_per_min: 5,
            agent_model: "claude-sonnet".to_string(),
            self_heal_model: "claude-sonnet".to_string(),
            max_api_calls: 100,
            max_calls_per_step: 20,
            headless: true,
            vnc_port_range: (5901, 5910),
            port_max_age_minutes: 60,
            artifacts_base_path: PathBuf::from("./artifacts"),
            default_timeout_ms: 300_000,
            planner_endpoint: None,
            planner_api_key: None,
            generator_endpoint: None,
            generator_api_key: None,
            json_logs: false,
            surreal_backend: false,
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_string(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env_string(key).as_deref() {
        Some("1") | Some("true") | Some("TRUE") => true,
        Some("0") | Some("false") | Some("FALSE") => false,
        _ => default,
    }
}

impl WorkerConfig {
    /// Reads the env table (spec.md §6), falling back to `Default` for any
    /// unset or unparsable variable.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            concurrency: env_or("WORKER_CONCURRENCY", default.concurrency),
            lock_duration_ms: env_or("WORKER_LOCK_DURATION_MS", default.lock_duration_ms),
            lock_renew_ms: env_or("WORKER_LOCK_RENEW_MS", default.lock_renew_ms),
            rate_limit_per_min: env_or("WORKER_RATE_LIMIT_PER_MIN", default.rate_limit_per_min),
            agent_model: env_string("AGENT_MODEL").unwrap_or(default.agent_model),
            self_heal_model: env_string("SELF_HEAL_MODEL").unwrap_or(default.self_heal_model),
            max_api_calls: env_or("AGENT_MAX_API_CALLS", default.max_api_calls),
            max_calls_per_step: env_or("AGENT_MAX_CALLS_PER_STEP", default.max_calls_per_step),
            headless: env_bool("SANDBOX_HEADLESS", default.headless),
            vnc_port_range: (
                env_or("VNC_PORT_START", default.vnc_port_range.0),
                env_or("VNC_PORT_END", default.vnc_port_range.1),
            ),
            port_max_age_minutes: env_or("PORT_MAX_AGE_MINUTES", default.port_max_age_minutes),
            artifacts_base_path: env_string("ARTIFACTS_BASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.artifacts_base_path),
            default_timeout_ms: env_or("RUN_DEFAULT_TIMEOUT_MS", default.default_timeout_ms),
            planner_endpoint: env_string("PLANNER_ENDPOINT"),
            planner_api_key: env_string("PLANNER_API_KEY"),
            generator_endpoint: env_string("GENERATOR_ENDPOINT"),
            generator_api_key: env_string("GENERATOR_API_KEY"),
            json_logs: env_bool("LOG_JSON", default.json_logs),
            surreal_backend: env_bool("SURREAL_BACKEND", default.surreal_backend),
        }
    }

    pub fn agent_budgets(&self) -> dt_agent::Budgets {
        dt_agent::Budgets {
            max_api_calls: self.max_api_calls,
            max_calls_per_step: self.max_calls_per_step,
        }
    }

    pub fn consume_config(&self) -> dt_queue::ConsumeConfig {
        dt_queue::ConsumeConfig {
            concurrency: self.concurrency,
            lock_duration_ms: self.lock_duration_ms,
            lock_renew_ms: self.lock_renew_ms,
            rate_limit_per_min: self.rate_limit_per_min,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = WorkerConfig::default();
        assert_eq!(config.rate_limit_per_min, 5);
        assert_eq!(config.lock_duration_ms, 300_000);
        assert_eq!(config.vnc_port_range, (5901, 5910));
        assert!(config.headless);
    }
}
