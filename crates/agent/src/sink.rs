//! Stdout sink for routed events
//!
//! Writes one JSON object per line: `{"tag": ..., "time": ..., "record": {...}}`.

use anyhow::{Context, Result};
use kubelet_metrics_lib::MetricEvent;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Drain `events` into `out` until every sender is gone, returning the number of lines written
pub async fn write_json_lines<W>(mut events: mpsc::Receiver<MetricEvent>, mut out: W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;

    while let Some(event) = events.recv().await {
        let mut line = serde_json::to_vec(&event).context("Failed to serialize event")?;
        line.push(b'\n');
        out.write_all(&line).await.context("Failed to write event")?;
        written += 1;
    }

    out.flush().await.context("Failed to flush events")?;
    Ok(written)
}
