//! Engine configuration and per-run allocation options.

use std::collections::BTreeSet;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Upper bound for candidates fetched per page.
pub const MAX_CHUNK_SIZE: usize = 50;

/// Environment variable prefix for [`WmsConfig::from_env`].
pub const ENV_PREFIX: &str = "RACKWMS_";

/// Deployment-wide settings of the fulfillment engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WmsConfig {
    /// Default page size for candidate streaming.
    pub allocation_chunk_size: usize,
    /// Transport task types that do not block allocation of a moving load.
    pub non_blocking_task_types: BTreeSet<String>,
    /// Accept picks that push a line's delivered quantity past its requirement.
    pub allow_over_delivery: bool,
    /// Default for skipping unit loads in offline laneways.
    pub skip_offline_laneways: bool,
}

impl Default for WmsConfig {
    fn default() -> Self {
        Self {
            allocation_chunk_size: 20,
            non_blocking_task_types: ["relocation", "housekeeping"]
                .into_iter()
                .map(String::from)
                .collect(),
            allow_over_delivery: false,
            skip_offline_laneways: true,
        }
    }
}

impl WmsConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let cfg: Self = serde_json::from_str(json).context("invalid warehouse configuration")?;
        Ok(cfg.normalized())
    }

    /// Read `RACKWMS_*` variables on top of the defaults.
    ///
    /// - `RACKWMS_ALLOCATION_CHUNK_SIZE` (integer)
    /// - `RACKWMS_NON_BLOCKING_TASK_TYPES` (comma separated)
    /// - `RACKWMS_ALLOW_OVER_DELIVERY` (bool)
    /// - `RACKWMS_SKIP_OFFLINE_LANEWAYS` (bool)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));
        let mut cfg = Self::default();

        if let Some(v) = var("ALLOCATION_CHUNK_SIZE") {
            cfg.allocation_chunk_size = v
                .trim()
                .parse()
                .with_context(|| {
                    format!("{ENV_PREFIX}ALLOCATION_CHUNK_SIZE: not an integer: {v:?}")
                })?;
        }
        if let Some(v) = var("NON_BLOCKING_TASK_TYPES") {
            cfg.non_blocking_task_types = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = var("ALLOW_OVER_DELIVERY") {
            cfg.allow_over_delivery = parse_bool(&v)
                .with_context(|| format!("{ENV_PREFIX}ALLOW_OVER_DELIVERY: not a bool: {v:?}"))?;
        }
        if let Some(v) = var("SKIP_OFFLINE_LANEWAYS") {
            cfg.skip_offline_laneways = parse_bool(&v)
                .with_context(|| format!("{ENV_PREFIX}SKIP_OFFLINE_LANEWAYS: not a bool: {v:?}"))?;
        }

        Ok(cfg.normalized())
    }

    fn normalized(mut self) -> Self {
        self.allocation_chunk_size = clamp_chunk_size(self.allocation_chunk_size);
        self
    }
}

fn parse_bool(v: &str) -> anyhow::Result<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("unrecognized boolean {other:?}"),
    }
}

pub fn clamp_chunk_size(size: usize) -> usize {
    size.clamp(1, MAX_CHUNK_SIZE)
}

/// Options of one allocation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationOptions {
    /// Storage areas to draw from; empty means all areas.
    pub areas: BTreeSet<String>,
    /// Unit load codes evaluated first, bypassing area and offline checks.
    pub include_unit_loads: Vec<String>,
    /// Unit load codes never allocated in this run (wins over `include`).
    pub exclude_unit_loads: BTreeSet<String>,
    pub skip_offline_laneways: bool,
    /// Candidates per page; clamped to `1..=MAX_CHUNK_SIZE`.
    pub chunk_size: usize,
}

impl AllocationOptions {
    pub fn from_config(cfg: &WmsConfig) -> Self {
        Self {
            areas: BTreeSet::new(),
            include_unit_loads: Vec::new(),
            exclude_unit_loads: BTreeSet::new(),
            skip_offline_laneways: cfg.skip_offline_laneways,
            chunk_size: cfg.allocation_chunk_size,
        }
    }

    pub fn areas<I, S>(mut self, areas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.areas = areas.into_iter().map(Into::into).collect();
        self
    }

    pub fn include(mut self, code: impl Into<String>) -> Self {
        self.include_unit_loads.push(code.into());
        self
    }

    pub fn exclude(mut self, code: impl Into<String>) -> Self {
        self.exclude_unit_loads.insert(code.into());
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn skip_offline_laneways(mut self, skip: bool) -> Self {
        self.skip_offline_laneways = skip;
        self
    }

    pub fn effective_chunk_size(&self) -> usize {
        clamp_chunk_size(self.chunk_size)
    }
}

impl Default for AllocationOptions {
    fn default() -> Self {
        Self::from_config(&WmsConfig::default())
    }
}
