//! Core data models for the kubelet metrics agent
//!
//! The summary types mirror the kubelet `/stats/summary` payload. Every
//! field is optional: the kubelet omits whatever it could not measure, and
//! the flattening engine skips absent fields instead of failing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::collections::BTreeMap;

/// A raw statistic. Any JSON number is accepted and passed through as is.
pub type Reading = Number;

/// One parsed summary payload for a single node at one scrape instant
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryDocument {
    pub node: Option<NodeStats>,
    pub pods: Option<Vec<PodStats>>,
}

/// Node-level statistics
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStats {
    pub node_name: Option<String>,
    pub system_containers: Option<Vec<ContainerStats>>,
    pub start_time: Option<DateTime<Utc>>,
    pub cpu: Option<CpuStats>,
    pub memory: Option<MemoryStats>,
    pub network: Option<NetworkStats>,
    pub fs: Option<FsStats>,
    pub runtime: Option<RuntimeStats>,
    pub rlimit: Option<RlimitStats>,
}

/// Container runtime statistics reported on the node
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStats {
    pub image_fs: Option<FsStats>,
}

/// Identity of a pod (`name`, `namespace`, `uid`, ...)
pub type PodReference = BTreeMap<String, String>;

/// Pod-level statistics
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStats {
    pub pod_ref: Option<PodReference>,
    pub start_time: Option<DateTime<Utc>>,
    pub containers: Option<Vec<ContainerStats>>,
    pub cpu: Option<CpuStats>,
    pub memory: Option<MemoryStats>,
    pub network: Option<NetworkStats>,
    #[serde(rename = "volume")]
    pub volumes: Option<Vec<VolumeStats>>,
    #[serde(rename = "ephemeral-storage")]
    pub ephemeral_storage: Option<FsStats>,
}

/// Statistics of a pod container or a node system container.
/// System containers never report `rootfs` or `logs`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStats {
    pub name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub cpu: Option<CpuStats>,
    pub memory: Option<MemoryStats>,
    pub rootfs: Option<FsStats>,
    pub logs: Option<FsStats>,
}

/// Filesystem statistics of a pod volume
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VolumeStats {
    pub name: Option<String>,
    #[serde(flatten)]
    pub fs: FsStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuStats {
    pub time: Option<DateTime<Utc>>,
    pub usage_nano_cores: Option<Reading>,
    pub usage_core_nano_seconds: Option<Reading>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub time: Option<DateTime<Utc>>,
    pub available_bytes: Option<Reading>,
    pub usage_bytes: Option<Reading>,
    pub working_set_bytes: Option<Reading>,
    pub rss_bytes: Option<Reading>,
    pub page_faults: Option<Reading>,
    pub major_page_faults: Option<Reading>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub time: Option<DateTime<Utc>>,
    pub interfaces: Option<Vec<InterfaceStats>>,
}

/// Counters of a single network interface
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceStats {
    pub name: Option<String>,
    pub rx_bytes: Option<Reading>,
    pub rx_errors: Option<Reading>,
    pub tx_bytes: Option<Reading>,
    pub tx_errors: Option<Reading>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsStats {
    pub time: Option<DateTime<Utc>>,
    pub available_bytes: Option<Reading>,
    pub capacity_bytes: Option<Reading>,
    pub used_bytes: Option<Reading>,
    pub inodes_free: Option<Reading>,
    pub inodes: Option<Reading>,
    pub inodes_used: Option<Reading>,
}

/// Process limits on the node
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RlimitStats {
    pub time: Option<DateTime<Utc>>,
    pub maxpid: Option<Reading>,
    pub curproc: Option<Reading>,
}

/// A label or metric value attached to an event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LabelValue {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl LabelValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LabelValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LabelValue::Text(_) => None,
            LabelValue::Unsigned(v) => Some(*v as f64),
            LabelValue::Signed(v) => Some(*v as f64),
            LabelValue::Float(v) => Some(*v),
        }
    }
}

impl From<&str> for LabelValue {
    fn from(value: &str) -> Self {
        LabelValue::Text(value.to_string())
    }
}

impl From<String> for LabelValue {
    fn from(value: String) -> Self {
        LabelValue::Text(value)
    }
}

impl From<u64> for LabelValue {
    fn from(value: u64) -> Self {
        LabelValue::Unsigned(value)
    }
}

impl From<f64> for LabelValue {
    fn from(value: f64) -> Self {
        LabelValue::Float(value)
    }
}

impl From<Reading> for LabelValue {
    fn from(value: Reading) -> Self {
        if let Some(v) = value.as_u64() {
            LabelValue::Unsigned(v)
        } else if let Some(v) = value.as_i64() {
            LabelValue::Signed(v)
        } else {
            // Without arbitrary precision every number fits an f64
            LabelValue::Float(value.as_f64().unwrap_or(f64::NAN))
        }
    }
}

/// Immutable label set.
///
/// Extending a label set produces a new one, so sibling branches of the
/// summary tree never see each other's labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Labels(BTreeMap<String, LabelValue>);

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of this set with `key` set to `value`
    pub fn with(&self, key: impl Into<String>, value: impl Into<LabelValue>) -> Self {
        let mut next = self.0.clone();
        next.insert(key.into(), value.into());
        Self(next)
    }

    /// Like [`Labels::with`], but leaves the set untouched when `value` is absent
    pub fn with_opt(&self, key: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self.clone(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&LabelValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One flattened, timestamped metric reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricEvent {
    pub tag: String,
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    /// Identity labels plus the reading under `value`
    #[serde(rename = "record")]
    pub labels: Labels,
}

impl MetricEvent {
    pub fn value(&self) -> Option<&LabelValue> {
        self.labels.get("value")
    }
}
