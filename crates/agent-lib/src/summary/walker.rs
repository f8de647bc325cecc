//! Per sub-document emitters
//!
//! Every walker is a no-op when its sub-document is absent and emits one
//! event per present field. Readings use the sub-document's own `time`
//! when the kubelet provides it, the scrape instant otherwise.

use super::fields::{Field, FS_FIELDS, INTERFACE_FIELDS, MEMORY_FIELDS, RLIMIT_FIELDS};
use super::{normalize_field_name, ScrapeContext};
use crate::models::{
    CpuStats, FsStats, LabelValue, Labels, MemoryStats, MetricEvent, NetworkStats, Reading,
    RlimitStats,
};
use chrono::{DateTime, Utc};

/// Emit `<stem>.uptime`, the seconds elapsed between `start_time` and the scrape
pub fn uptime(
    ctx: &ScrapeContext<'_>,
    stem: &str,
    start_time: Option<DateTime<Utc>>,
    labels: &Labels,
    out: &mut Vec<MetricEvent>,
) {
    let Some(start_time) = start_time else {
        return;
    };

    let elapsed = ctx.scraped_at - start_time;
    let uptime_secs = match elapsed.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        // Microseconds overflow after roughly 292k years
        None => elapsed.num_milliseconds() as f64 / 1_000.0,
    };
    out.push(ctx.event(&format!("{stem}.uptime"), ctx.scraped_at, labels, uptime_secs));
}

/// Emit `<stem>.cpu.usage_rate` and `<stem>.cpu.usage`
pub fn cpu(
    ctx: &ScrapeContext<'_>,
    stem: &str,
    cpu: Option<&CpuStats>,
    labels: &Labels,
    out: &mut Vec<MetricEvent>,
) {
    let Some(cpu) = cpu else {
        return;
    };
    let time = cpu.time.unwrap_or(ctx.scraped_at);

    // Both tags are derived from usageNanoCores; `usage` is not the
    // cumulative usageCoreNanoSeconds counter. Existing consumers depend on
    // this pairing, so it is kept as is.
    if let Some(nano_cores) = &cpu.usage_nano_cores {
        out.push(ctx.event(
            &format!("{stem}.cpu.usage_rate"),
            time,
            labels,
            nano_cores_to_rate(nano_cores),
        ));
        out.push(ctx.event(&format!("{stem}.cpu.usage"), time, labels, nano_cores.clone()));
    }
}

/// Integer readings divide like integers, fractional ones keep their fraction
fn nano_cores_to_rate(nano_cores: &Reading) -> LabelValue {
    if let Some(v) = nano_cores.as_u64() {
        LabelValue::Unsigned(v / 1_000_000)
    } else if let Some(v) = nano_cores.as_i64() {
        LabelValue::Signed(v / 1_000_000)
    } else {
        LabelValue::Float(nano_cores.as_f64().unwrap_or(f64::NAN) / 1_000_000.0)
    }
}

/// Emit `<stem>.memory.<field>` for every present memory field
pub fn memory(
    ctx: &ScrapeContext<'_>,
    stem: &str,
    memory: Option<&MemoryStats>,
    labels: &Labels,
    out: &mut Vec<MetricEvent>,
) {
    let Some(memory) = memory else {
        return;
    };
    let time = memory.time.unwrap_or(ctx.scraped_at);

    emit_fields(ctx, &format!("{stem}.memory"), memory, MEMORY_FIELDS, time, labels, out);
}

/// Emit `<stem>.network.<field>` for every field of every interface,
/// labeled with the interface name
pub fn network(
    ctx: &ScrapeContext<'_>,
    stem: &str,
    network: Option<&NetworkStats>,
    labels: &Labels,
    out: &mut Vec<MetricEvent>,
) {
    let Some(network) = network else {
        return;
    };
    let time = network.time.unwrap_or(ctx.scraped_at);
    let prefix = format!("{stem}.network");

    for interface in network.interfaces.iter().flatten() {
        let labels = labels.with_opt("interface", interface.name.as_deref());
        emit_fields(ctx, &prefix, interface, INTERFACE_FIELDS, time, &labels, out);
    }
}

/// Emit `<stem>.<field>` for every present filesystem field
pub fn filesystem(
    ctx: &ScrapeContext<'_>,
    stem: &str,
    fs: Option<&FsStats>,
    labels: &Labels,
    out: &mut Vec<MetricEvent>,
) {
    let Some(fs) = fs else {
        return;
    };
    let time = fs.time.unwrap_or(ctx.scraped_at);

    emit_fields(ctx, stem, fs, FS_FIELDS, time, labels, out);
}

/// Emit the node process limits.
///
/// The tag is always `node.runtime.imagefs.<field>` and the only identity
/// label is the node name, whatever entity is being walked.
pub fn rlimit(
    ctx: &ScrapeContext<'_>,
    node_name: &str,
    rlimit: Option<&RlimitStats>,
    out: &mut Vec<MetricEvent>,
) {
    let Some(rlimit) = rlimit else {
        return;
    };
    let time = rlimit.time.unwrap_or(ctx.scraped_at);
    let labels = Labels::new().with("node", node_name);

    emit_fields(ctx, "node.runtime.imagefs", rlimit, RLIMIT_FIELDS, time, &labels, out);
}

fn emit_fields<T>(
    ctx: &ScrapeContext<'_>,
    prefix: &str,
    stats: &T,
    fields: &[Field<T>],
    time: DateTime<Utc>,
    labels: &Labels,
    out: &mut Vec<MetricEvent>,
) {
    for (key, get) in fields {
        if let Some(value) = get(stats) {
            let segment = format!("{prefix}.{}", normalize_field_name(key));
            out.push(ctx.event(&segment, time, labels, value));
        }
    }
}
