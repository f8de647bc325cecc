//! Tests for summary flattening
//!
//! These tests run the full walk over kubelet summary payloads shaped like
//! the ones a real node returns.

#[cfg(test)]
mod fixture_tests {
    use crate::models::{LabelValue, MetricEvent, SummaryDocument};
    use crate::summary::{flatten, ScrapeContext, TagTemplate};
    use chrono::{DateTime, TimeZone, Utc};

    const SUMMARY: &str = r#"{
  "node": {
    "nodeName": "worker-1",
    "systemContainers": [
      {
        "name": "kubelet",
        "startTime": "2023-01-01T00:00:00Z",
        "cpu": {"time": "2023-01-01T01:00:00Z", "usageNanoCores": 30000000, "usageCoreNanoSeconds": 123456789},
        "memory": {"time": "2023-01-01T01:00:00Z", "usageBytes": 52428800, "workingSetBytes": 41943040}
      },
      {
        "name": "runtime",
        "startTime": "2023-01-01T00:00:00Z",
        "memory": {"time": "2023-01-01T01:00:00Z", "rssBytes": 1048576}
      }
    ],
    "startTime": "2023-01-01T00:00:00Z",
    "cpu": {"time": "2023-01-01T00:00:00Z", "usageNanoCores": 2000000, "usageCoreNanoSeconds": 987654321},
    "memory": {
      "time": "2023-01-01T00:00:00Z",
      "availableBytes": 4096,
      "usageBytes": 8192,
      "workingSetBytes": 2048,
      "rssBytes": 1024,
      "pageFaults": 11,
      "majorPageFaults": 1
    },
    "network": {
      "time": "2023-01-01T00:00:00Z",
      "name": "eth0",
      "rxBytes": 1,
      "interfaces": [
        {"name": "eth0", "rxBytes": 100, "rxErrors": 0, "txBytes": 200, "txErrors": 0},
        {"name": "cni0", "txBytes": 5}
      ]
    },
    "fs": {"time": "2023-01-01T00:00:00Z", "availableBytes": 10, "capacityBytes": 20, "usedBytes": 10, "inodesFree": 3, "inodes": 5, "inodesUsed": 2},
    "runtime": {
      "imageFs": {"time": "2023-01-01T00:00:00Z", "availableBytes": 30, "capacityBytes": 60}
    },
    "rlimit": {"time": "2023-01-01T00:00:00Z", "maxpid": 4194304, "curproc": 700}
  },
  "pods": [
    {
      "podRef": {"name": "web-0", "namespace": "default", "uid": "0f2c"},
      "startTime": "2023-01-01T00:30:00Z",
      "containers": [
        {
          "name": "app",
          "startTime": "2023-01-01T00:31:00Z",
          "cpu": {"time": "2023-01-01T01:00:00Z", "usageNanoCores": 5000000},
          "memory": {"time": "2023-01-01T01:00:00Z", "workingSetBytes": 4096},
          "rootfs": {"time": "2023-01-01T01:00:00Z", "usedBytes": 12},
          "logs": {"time": "2023-01-01T01:00:00Z", "usedBytes": 34}
        },
        {
          "name": "sidecar",
          "startTime": "2023-01-01T00:31:00Z"
        }
      ],
      "cpu": {"time": "2023-01-01T01:00:00Z", "usageNanoCores": 5000000},
      "network": {
        "time": "2023-01-01T01:00:00Z",
        "interfaces": [{"name": "eth0", "rxBytes": 7}]
      },
      "volume": [
        {"time": "2023-01-01T01:00:00Z", "name": "v1", "availableBytes": 100, "pvcRef": {"name": "data"}},
        {"time": "2023-01-01T01:00:00Z", "name": "v2", "availableBytes": 200}
      ],
      "ephemeral-storage": {"time": "2023-01-01T01:00:00Z", "usedBytes": 46}
    },
    {
      "podRef": {"name": "batch-1", "namespace": "jobs", "uid": "9a1b"},
      "startTime": "2023-01-01T00:45:00Z"
    }
  ]
}"#;

    fn scraped_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 2, 0, 0).unwrap()
    }

    fn walk(json: &str) -> Vec<MetricEvent> {
        let doc: SummaryDocument = serde_json::from_str(json).unwrap();
        let tag = TagTemplate::parse("*");
        let ctx = ScrapeContext::new(scraped_at(), &tag, "configured-node");
        flatten(&doc, &ctx)
    }

    fn tagged<'a>(events: &'a [MetricEvent], tag: &str) -> Vec<&'a MetricEvent> {
        events.iter().filter(|e| e.tag == tag).collect()
    }

    fn label<'a>(event: &'a MetricEvent, key: &str) -> Option<&'a str> {
        event.labels.get(key).and_then(LabelValue::as_str)
    }

    #[test]
    fn test_node_cpu_events() {
        let events = walk(SUMMARY);

        let rate = tagged(&events, "node.cpu.usage_rate");
        let usage = tagged(&events, "node.cpu.usage");
        assert_eq!(rate.len(), 1);
        assert_eq!(usage.len(), 1);

        let expected_time = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(rate[0].value(), Some(&LabelValue::Unsigned(2)));
        assert_eq!(usage[0].value(), Some(&LabelValue::Unsigned(2_000_000)));
        assert_eq!(rate[0].timestamp, expected_time);
        assert_eq!(usage[0].timestamp, expected_time);

        let keys: Vec<_> = rate[0].labels.keys().collect();
        assert_eq!(keys, ["node", "value"]);
        assert_eq!(label(rate[0], "node"), Some("worker-1"));
    }

    #[test]
    fn test_node_uptime_uses_scrape_instant() {
        let events = walk(SUMMARY);

        let uptime = tagged(&events, "node.uptime");
        assert_eq!(uptime.len(), 1);
        assert_eq!(uptime[0].timestamp, scraped_at());
        assert_eq!(uptime[0].value(), Some(&LabelValue::Float(7200.0)));
    }

    #[test]
    fn test_node_memory_fields() {
        let events = walk(SUMMARY);

        let tags: Vec<_> = events
            .iter()
            .filter(|e| e.tag.starts_with("node.memory."))
            .map(|e| e.tag.as_str())
            .collect();
        assert_eq!(
            tags,
            [
                "node.memory.available_bytes",
                "node.memory.usage_bytes",
                "node.memory.working_set_bytes",
                "node.memory.rss_bytes",
                "node.memory.page_faults",
                "node.memory.major_page_faults",
            ]
        );
    }

    #[test]
    fn test_node_network_only_reads_interfaces() {
        let events = walk(SUMMARY);

        let network: Vec<_> = events
            .iter()
            .filter(|e| e.tag.starts_with("node.network."))
            .map(|e| (e.tag.as_str(), label(e, "interface"), e.value().and_then(LabelValue::as_f64)))
            .collect();
        assert_eq!(
            network,
            [
                ("node.network.rx_bytes", Some("eth0"), Some(100.0)),
                ("node.network.rx_errors", Some("eth0"), Some(0.0)),
                ("node.network.tx_bytes", Some("eth0"), Some(200.0)),
                ("node.network.tx_errors", Some("eth0"), Some(0.0)),
                ("node.network.tx_bytes", Some("cni0"), Some(5.0)),
            ]
        );
    }

    #[test]
    fn test_node_filesystems_and_rlimit() {
        let events = walk(SUMMARY);

        assert_eq!(tagged(&events, "node.fs.inodes_free").len(), 1);
        assert_eq!(tagged(&events, "node.imagefs.available_bytes").len(), 1);
        assert_eq!(tagged(&events, "node.imagefs.capacity_bytes").len(), 1);
        assert!(tagged(&events, "node.imagefs.used_bytes").is_empty());

        let maxpid = tagged(&events, "node.runtime.imagefs.maxpid");
        assert_eq!(maxpid.len(), 1);
        assert_eq!(maxpid[0].value(), Some(&LabelValue::Unsigned(4_194_304)));
        assert_eq!(tagged(&events, "node.runtime.imagefs.curproc").len(), 1);
    }

    #[test]
    fn test_system_containers() {
        let events = walk(SUMMARY);

        let uptimes = tagged(&events, "sys-container.uptime");
        let names: Vec<_> = uptimes.iter().map(|e| label(e, "name")).collect();
        assert_eq!(names, [Some("kubelet"), Some("runtime")]);

        assert_eq!(tagged(&events, "sys-container.cpu.usage").len(), 1);
        let rss = tagged(&events, "sys-container.memory.rss_bytes");
        assert_eq!(rss.len(), 1);
        assert_eq!(label(rss[0], "name"), Some("runtime"));
        assert_eq!(label(rss[0], "node"), Some("worker-1"));

        assert!(!events.iter().any(|e| e.tag.starts_with("sys-container.network")));
        assert!(!events.iter().any(|e| e.tag.starts_with("sys-container.rootfs")));
    }

    #[test]
    fn test_node_events_precede_pod_events() {
        let events = walk(SUMMARY);

        let last_node = events
            .iter()
            .rposition(|e| e.tag.starts_with("node.") || e.tag.starts_with("sys-container."))
            .unwrap();
        let first_pod = events
            .iter()
            .position(|e| e.tag.starts_with("pod.") || e.tag.starts_with("container."))
            .unwrap();
        assert!(last_node < first_pod);
    }

    #[test]
    fn test_pod_labels() {
        let events = walk(SUMMARY);

        let uptimes = tagged(&events, "pod.uptime");
        assert_eq!(uptimes.len(), 2);

        let keys: Vec<_> = uptimes[0].labels.keys().collect();
        assert_eq!(keys, ["node", "pod-name", "pod-namespace", "pod-uid", "value"]);
        assert_eq!(label(uptimes[0], "pod-name"), Some("web-0"));
        assert_eq!(label(uptimes[1], "pod-name"), Some("batch-1"));
        assert_eq!(label(uptimes[1], "pod-namespace"), Some("jobs"));
    }

    #[test]
    fn test_pod_volumes_differ_only_by_name() {
        let events = walk(SUMMARY);

        let volumes = tagged(&events, "pod.volume.available_bytes");
        assert_eq!(volumes.len(), 2);
        assert_eq!(label(volumes[0], "name"), Some("v1"));
        assert_eq!(label(volumes[1], "name"), Some("v2"));

        for key in ["node", "pod-name", "pod-namespace", "pod-uid"] {
            assert_eq!(volumes[0].labels.get(key), volumes[1].labels.get(key));
        }
        let keys: Vec<_> = volumes[0].labels.keys().collect();
        let other: Vec<_> = volumes[1].labels.keys().collect();
        assert_eq!(keys, other);
    }

    #[test]
    fn test_pod_network_and_ephemeral_storage() {
        let events = walk(SUMMARY);

        let rx = tagged(&events, "pod.network.rx_bytes");
        assert_eq!(rx.len(), 1);
        assert_eq!(label(rx[0], "interface"), Some("eth0"));
        assert_eq!(label(rx[0], "pod-name"), Some("web-0"));

        assert_eq!(tagged(&events, "pod.ephemeral-storage.used_bytes").len(), 1);
        assert!(tagged(&events, "pod.memory.working_set_bytes").is_empty());
    }

    #[test]
    fn test_container_events() {
        let events = walk(SUMMARY);

        let uptimes = tagged(&events, "container.uptime");
        let names: Vec<_> = uptimes.iter().map(|e| label(e, "container-name")).collect();
        assert_eq!(names, [Some("app"), Some("sidecar")]);

        let rootfs = tagged(&events, "container.rootfs.used_bytes");
        assert_eq!(rootfs.len(), 1);
        assert_eq!(label(rootfs[0], "pod-name"), Some("web-0"));
        assert_eq!(label(rootfs[0], "node"), Some("worker-1"));
        assert_eq!(tagged(&events, "container.logs.used_bytes").len(), 1);

        // The sidecar reports no usage, so only its uptime shows up
        assert!(events
            .iter()
            .filter(|e| label(e, "container-name") == Some("sidecar"))
            .all(|e| e.tag == "container.uptime"));
    }

    #[test]
    fn test_container_labels_do_not_leak_between_siblings() {
        let events = walk(SUMMARY);

        let pod_events = tagged(&events, "pod.uptime");
        assert!(pod_events.iter().all(|e| !e.labels.contains_key("container-name")));
        assert!(pod_events.iter().all(|e| !e.labels.contains_key("name")));
        assert!(tagged(&events, "pod.ephemeral-storage.used_bytes")
            .iter()
            .all(|e| !e.labels.contains_key("name")));
    }

    #[test]
    fn test_empty_document() {
        assert!(walk("{}").is_empty());
    }

    #[test]
    fn test_missing_network_emits_no_network_events() {
        let events = walk(r#"{"node": {"nodeName": "n1", "cpu": {"time": "2023-01-01T00:00:00Z", "usageNanoCores": 1}}}"#);

        assert!(!events.iter().any(|e| e.tag.contains(".network.")));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_missing_runtime_is_skipped() {
        let events = walk(r#"{"node": {"nodeName": "n1", "fs": {"usedBytes": 1}}}"#);

        let tags: Vec<_> = events.iter().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, ["node.fs.used_bytes"]);
        assert_eq!(events[0].timestamp, scraped_at());
    }

    #[test]
    fn test_pods_without_node_use_configured_name() {
        let events = walk(r#"{"pods": [{"podRef": {"name": "p"}, "startTime": "2023-01-01T01:00:00Z"}]}"#);

        assert_eq!(events.len(), 1);
        assert_eq!(label(&events[0], "node"), Some("configured-node"));
        assert_eq!(label(&events[0], "pod-name"), Some("p"));
    }

    #[test]
    fn test_wildcard_tag_applies_to_all_events() {
        let doc: SummaryDocument = serde_json::from_str(SUMMARY).unwrap();
        let tag = TagTemplate::parse("kubernetes.metrics.*");
        let ctx = ScrapeContext::new(scraped_at(), &tag, "configured-node");

        let events = flatten(&doc, &ctx);

        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.tag.starts_with("kubernetes.metrics.")));
        assert!(events
            .iter()
            .any(|e| e.tag == "kubernetes.metrics.node.cpu.usage"));
    }

    #[test]
    fn test_literal_tag_applies_to_all_events() {
        let doc: SummaryDocument = serde_json::from_str(SUMMARY).unwrap();
        let tag = TagTemplate::parse("kubelet");
        let ctx = ScrapeContext::new(scraped_at(), &tag, "configured-node");

        let events = flatten(&doc, &ctx);

        assert!(events.iter().all(|e| e.tag == "kubelet"));
    }

    #[test]
    fn test_every_event_carries_node_and_value() {
        let events = walk(SUMMARY);

        assert!(events
            .iter()
            .all(|e| e.labels.contains_key("node") && e.labels.contains_key("value")));
    }
}
