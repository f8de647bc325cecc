//! Top-level summary walk
//!
//! Drives the walkers over a [`SummaryDocument`] in document order: all
//! node metrics first, then each pod followed by its volumes and containers.

use super::{walker, ScrapeContext};
use crate::models::{ContainerStats, Labels, MetricEvent, NodeStats, PodStats, SummaryDocument};

/// Flatten a summary document into metric events
pub fn flatten(doc: &SummaryDocument, ctx: &ScrapeContext<'_>) -> Vec<MetricEvent> {
    let mut out = Vec::new();

    let node_name = doc
        .node
        .as_ref()
        .and_then(|node| node.node_name.as_deref())
        .unwrap_or(ctx.fallback_node);

    if let Some(node) = &doc.node {
        walk_node(ctx, node, node_name, &mut out);
    }

    for pod in doc.pods.iter().flatten() {
        walk_pod(ctx, pod, node_name, &mut out);
    }

    out
}

fn walk_node(ctx: &ScrapeContext<'_>, node: &NodeStats, node_name: &str, out: &mut Vec<MetricEvent>) {
    let stem = "node";
    let labels = Labels::new().with("node", node_name);

    walker::uptime(ctx, stem, node.start_time, &labels, out);
    walker::cpu(ctx, stem, node.cpu.as_ref(), &labels, out);
    walker::memory(ctx, stem, node.memory.as_ref(), &labels, out);
    walker::network(ctx, stem, node.network.as_ref(), &labels, out);
    walker::filesystem(ctx, "node.fs", node.fs.as_ref(), &labels, out);
    walker::filesystem(
        ctx,
        "node.imagefs",
        node.runtime.as_ref().and_then(|runtime| runtime.image_fs.as_ref()),
        &labels,
        out,
    );
    walker::rlimit(ctx, node_name, node.rlimit.as_ref(), out);

    for container in node.system_containers.iter().flatten() {
        walk_system_container(ctx, container, &labels, out);
    }
}

fn walk_system_container(
    ctx: &ScrapeContext<'_>,
    container: &ContainerStats,
    node_labels: &Labels,
    out: &mut Vec<MetricEvent>,
) {
    let stem = "sys-container";
    let labels = node_labels.with_opt("name", container.name.as_deref());

    walker::uptime(ctx, stem, container.start_time, &labels, out);
    walker::cpu(ctx, stem, container.cpu.as_ref(), &labels, out);
    walker::memory(ctx, stem, container.memory.as_ref(), &labels, out);
}

fn walk_pod(ctx: &ScrapeContext<'_>, pod: &PodStats, node_name: &str, out: &mut Vec<MetricEvent>) {
    let stem = "pod";
    let labels = pod_labels(pod, node_name);

    walker::uptime(ctx, stem, pod.start_time, &labels, out);
    walker::cpu(ctx, stem, pod.cpu.as_ref(), &labels, out);
    walker::memory(ctx, stem, pod.memory.as_ref(), &labels, out);
    walker::network(ctx, stem, pod.network.as_ref(), &labels, out);
    walker::filesystem(ctx, "pod.ephemeral-storage", pod.ephemeral_storage.as_ref(), &labels, out);

    for volume in pod.volumes.iter().flatten() {
        let volume_labels = labels.with_opt("name", volume.name.as_deref());
        walker::filesystem(ctx, "pod.volume", Some(&volume.fs), &volume_labels, out);
    }

    for container in pod.containers.iter().flatten() {
        walk_container(ctx, container, &labels, out);
    }
}

fn walk_container(
    ctx: &ScrapeContext<'_>,
    container: &ContainerStats,
    pod_labels: &Labels,
    out: &mut Vec<MetricEvent>,
) {
    let stem = "container";
    let labels = pod_labels.with_opt("container-name", container.name.as_deref());

    walker::uptime(ctx, stem, container.start_time, &labels, out);
    walker::cpu(ctx, stem, container.cpu.as_ref(), &labels, out);
    walker::memory(ctx, stem, container.memory.as_ref(), &labels, out);
    walker::filesystem(ctx, "container.rootfs", container.rootfs.as_ref(), &labels, out);
    walker::filesystem(ctx, "container.logs", container.logs.as_ref(), &labels, out);
}

/// `node` plus every pod reference field prefixed with `pod-`
fn pod_labels(pod: &PodStats, node_name: &str) -> Labels {
    pod.pod_ref
        .iter()
        .flatten()
        .fold(Labels::new(), |labels, (key, value)| {
            labels.with(format!("pod-{key}"), value.as_str())
        })
        .with("node", node_name)
}
