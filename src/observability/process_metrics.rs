use std::time::Duration;

use anyhow::{anyhow, Result};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::time::sleep;

use crate::helpers::time::now_i64;
use crate::observability::metrics::Metrics;

const REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Samples cpu/memory/uptime of this process into the gauges until cancelled.
pub async fn collect_process_metrics(metrics: Metrics, is_metrics_enabled: bool) -> Result<()> {
    if !is_metrics_enabled {
        return Ok(());
    }
    let mut sys = System::new();
    let pid = sysinfo::get_current_pid().map_err(|e| anyhow!("current pid unavailable: {}", e))?;

    let start_time_unix = now_i64();
    metrics.process_start_time.set(start_time_unix);

    loop {
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            false,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );

        if let Some(process) = sys.process(pid) {
            metrics.process_cpu_usage.set(process.cpu_usage().into());
            metrics.process_memory_usage.set(process.memory() as i64);
        }
        metrics.process_uptime.set(now_i64() - start_time_unix);

        sleep(REFRESH_INTERVAL).await;
    }
}
