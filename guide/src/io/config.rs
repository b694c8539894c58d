//! Agent configuration stored as TOML (default `guide.toml`).

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::core::bucket::BucketConfig;
use crate::core::validator::MAX_PLAN_STEPS;
use crate::io::model::Role;
use crate::io::search::SearchOptions;

/// Agent configuration (TOML).
///
/// Missing fields default to the values the agent ships with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct GuideConfig {
    pub scheduler: SchedulerConfig,
    pub cycle: CycleConfig,
    pub search: SearchOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Sliding window length for every bucket.
    pub window_ms: u64,
    /// Wall-clock budget for one scheduled request.
    pub max_wait_ms: u64,
    /// Pause between passes over the bucket list.
    pub retry_delay_ms: u64,
    pub roles: RoleBuckets,
}

/// Ordered bucket lists per role, preferred model first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RoleBuckets {
    pub planner: Vec<BucketConfig>,
    pub executor: Vec<BucketConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CycleConfig {
    /// Planner rounds that may issue tool calls before the cycle fails.
    pub max_tool_loops: u32,
    /// Steps kept from one validated plan.
    pub max_plan_steps: usize,
    /// Snapshot elements rendered into a prompt.
    pub snapshot_prompt_limit: usize,
    /// Pause after reinjecting the surface, before the single retry.
    pub surface_retry_delay_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_wait_ms: 2_000,
            retry_delay_ms: 400,
            roles: RoleBuckets::default(),
        }
    }
}

impl Default for RoleBuckets {
    fn default() -> Self {
        Self {
            planner: vec![
                BucketConfig::new("planner_primary", "gemini-2.5-pro", 5),
                BucketConfig::new("planner_fallback_1", "gemini-2.5-flash", 10),
                BucketConfig::new("planner_fallback_2", "gemini-2.0-flash", 15),
            ],
            executor: vec![
                BucketConfig::new("executor_primary", "gemini-2.0-flash-lite", 30),
                BucketConfig::new("executor_fallback", "gemini-2.0-flash", 15),
            ],
        }
    }
}

impl RoleBuckets {
    pub fn buckets(&self, role: Role) -> &[BucketConfig] {
        match role {
            Role::Planner => &self.planner,
            Role::Executor => &self.executor,
        }
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            max_tool_loops: 2,
            max_plan_steps: MAX_PLAN_STEPS,
            snapshot_prompt_limit: 50,
            surface_retry_delay_ms: 100,
        }
    }
}

impl SchedulerConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_ms == 0 {
            bail!("scheduler.window_ms must be > 0");
        }
        if self.max_wait_ms == 0 {
            bail!("scheduler.max_wait_ms must be > 0");
        }
        if self.retry_delay_ms == 0 {
            bail!("scheduler.retry_delay_ms must be > 0");
        }
        let mut keys = HashSet::new();
        for role in Role::ALL {
            let buckets = self.roles.buckets(role);
            if buckets.is_empty() {
                return Err(anyhow!(
                    "scheduler.roles.{} must list at least one bucket",
                    role.as_str()
                ));
            }
            for bucket in buckets {
                if bucket.key.trim().is_empty() || bucket.model.trim().is_empty() {
                    bail!(
                        "scheduler.roles.{}: bucket key and model must be non-empty",
                        role.as_str()
                    );
                }
                if bucket.rpm == 0 {
                    bail!("bucket {} must allow at least one request", bucket.key);
                }
                if !keys.insert(bucket.key.as_str()) {
                    bail!("duplicate bucket key {}", bucket.key);
                }
            }
        }
        Ok(())
    }
}

impl CycleConfig {
    pub fn surface_retry_delay(&self) -> Duration {
        Duration::from_millis(self.surface_retry_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_tool_loops == 0 {
            bail!("cycle.max_tool_loops must be > 0");
        }
        if self.max_plan_steps == 0 {
            bail!("cycle.max_plan_steps must be > 0");
        }
        if self.snapshot_prompt_limit == 0 {
            bail!("cycle.snapshot_prompt_limit must be > 0");
        }
        Ok(())
    }
}

impl GuideConfig {
    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        self.cycle.validate()?;
        self.search.validate()?;
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `GuideConfig::default()`.
pub fn load_config(path: &Path) -> Result<GuideConfig> {
    if !path.exists() {
        let cfg = GuideConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: GuideConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &GuideConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::search::TimeRange;

    #[test]
    fn defaults_are_valid() {
        let cfg = GuideConfig::default();
        cfg.validate().expect("valid defaults");
        assert_eq!(cfg.scheduler.roles.planner.len(), 3);
        assert_eq!(cfg.scheduler.roles.executor[0].model, "gemini-2.0-flash-lite");
        assert_eq!(cfg.cycle.max_tool_loops, 2);
        assert_eq!(cfg.search.time_range, TimeRange::Year);
    }

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, GuideConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("guide.toml");
        let mut cfg = GuideConfig::default();
        cfg.cycle.max_tool_loops = 4;
        cfg.scheduler.roles.executor = vec![BucketConfig::new("only", "small-model", 2)];
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("guide.toml");
        fs::write(&path, "[scheduler]\nmax_wait_ms = 5000\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.scheduler.max_wait_ms, 5_000);
        assert_eq!(cfg.scheduler.window_ms, 60_000);
        assert_eq!(cfg.scheduler.roles, RoleBuckets::default());
    }

    #[test]
    fn rejects_duplicate_keys_and_zero_caps() {
        let mut cfg = GuideConfig::default();
        cfg.scheduler.roles.executor[0].key = "planner_primary".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate bucket key"));

        let mut cfg = GuideConfig::default();
        cfg.scheduler.roles.planner[1].rpm = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = GuideConfig::default();
        cfg.scheduler.roles.planner.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_cycle_bounds() {
        let mut cfg = GuideConfig::default();
        cfg.cycle.max_tool_loops = 0;
        assert!(cfg.validate().is_err());
    }
}
