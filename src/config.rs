//! Runtime configuration loading from environment variables.
//!
//! All configuration values are loaded from `PRELOAD_CORE_*` environment
//! variables with sensible defaults. Invalid values fall back to defaults
//! without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `PRELOAD_CORE_WORKER_NAME` | `preload-worker` | Preload worker thread name |
//! | `PRELOAD_CORE_DISPATCH_BATCH` | 64 | Max events per `dispatch_pending()` |
//! | `PRELOAD_CORE_LOG_LEVEL` | `info` | Tracing filter directive |
//! | `PRELOAD_CORE_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `PRELOAD_CORE_LOG_FILE` | unset | Log file instead of stderr |

use std::path::PathBuf;

use serde::Serialize;

use crate::scheduler::SchedulerConfig;
use crate::staged::WorkerConfig;
use crate::telemetry::{LogConfig, LogFormat};

/// Effective runtime configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub worker_thread_name: String,
    pub dispatch_batch: usize,
    pub log_level: String,
    pub log_format: &'static str,
    pub log_file: Option<PathBuf>,
}

/// All runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub worker: WorkerConfig,
    pub scheduler: SchedulerConfig,
    pub log: LogConfig,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Read a non-empty string env var, returning `default` otherwise.
fn parse_string(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => val.trim().to_string(),
        _ => default.to_string(),
    }
}

fn load_worker_config() -> WorkerConfig {
    WorkerConfig { thread_name: parse_string("PRELOAD_CORE_WORKER_NAME", "preload-worker") }
}

fn load_scheduler_config() -> SchedulerConfig {
    let dispatch_batch = parse_usize("PRELOAD_CORE_DISPATCH_BATCH", 64);
    let dispatch_batch = dispatch_batch.max(1);
    SchedulerConfig { dispatch_batch }
}

fn load_log_config() -> LogConfig {
    let format = parse_string("PRELOAD_CORE_LOG_FORMAT", "json")
        .parse::<LogFormat>()
        .unwrap_or_default();
    let output_path = std::env::var_os("PRELOAD_CORE_LOG_FILE")
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);
    LogConfig {
        format,
        level: parse_string("PRELOAD_CORE_LOG_LEVEL", "info"),
        output_path,
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    EnvConfig {
        worker: load_worker_config(),
        scheduler: load_scheduler_config(),
        log: load_log_config(),
    }
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            worker_thread_name: self.worker.thread_name.clone(),
            dispatch_batch: self.scheduler.dispatch_batch,
            log_level: self.log.level.clone(),
            log_format: match self.log.format {
                LogFormat::Json => "json",
                LogFormat::Pretty => "pretty",
            },
            log_file: self.log.output_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid cross-test pollution.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "PRELOAD_CORE_WORKER_NAME",
        "PRELOAD_CORE_DISPATCH_BATCH",
        "PRELOAD_CORE_LOG_LEVEL",
        "PRELOAD_CORE_LOG_FORMAT",
        "PRELOAD_CORE_LOG_FILE",
    ];

    fn clear_env_vars() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn test_defaults_are_sensible() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let cfg = load();
        assert_eq!(cfg.worker.thread_name, "preload-worker");
        assert_eq!(cfg.scheduler.dispatch_batch, 64);
        assert_eq!(cfg.log.level, "info");
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert!(cfg.log.output_path.is_none());
    }

    #[test]
    fn test_env_vars_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("PRELOAD_CORE_WORKER_NAME", "playlist-preload");
        std::env::set_var("PRELOAD_CORE_DISPATCH_BATCH", "8");
        std::env::set_var("PRELOAD_CORE_LOG_LEVEL", "preload_core=debug");
        std::env::set_var("PRELOAD_CORE_LOG_FORMAT", "pretty");
        std::env::set_var("PRELOAD_CORE_LOG_FILE", "/tmp/preload.log");
        let cfg = load();
        assert_eq!(cfg.worker.thread_name, "playlist-preload");
        assert_eq!(cfg.scheduler.dispatch_batch, 8);
        assert_eq!(cfg.log.level, "preload_core=debug");
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        assert_eq!(cfg.log.output_path, Some(PathBuf::from("/tmp/preload.log")));
        clear_env_vars();
    }

    #[test]
    fn test_invalid_env_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("PRELOAD_CORE_DISPATCH_BATCH", "lots");
        std::env::set_var("PRELOAD_CORE_LOG_FORMAT", "xml");
        std::env::set_var("PRELOAD_CORE_WORKER_NAME", "   ");
        let cfg = load();
        assert_eq!(cfg.scheduler.dispatch_batch, 64);
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert_eq!(cfg.worker.thread_name, "preload-worker");
        clear_env_vars();
    }

    #[test]
    fn test_dispatch_batch_floor() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("PRELOAD_CORE_DISPATCH_BATCH", "0");
        let cfg = load();
        assert_eq!(cfg.scheduler.dispatch_batch, 1, "dispatch batch must have floor");
        clear_env_vars();
    }

    #[test]
    fn test_effective_config_serializes() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let eff = load().effective_config();
        let json = serde_json::to_value(&eff).unwrap();
        assert_eq!(json["worker_thread_name"], "preload-worker");
        assert_eq!(json["dispatch_batch"], 64);
        assert_eq!(json["log_format"], "json");
        assert!(json["log_file"].is_null());
    }
}
