//! Periscope probe - publishes host topology snapshots to the collector.
//!
//! The heavy lifting (process/container/kubernetes observation) is done by
//! dedicated reporters; this binary wires the data path: build a snapshot,
//! hand it to the publisher, let the sender loop deal with the network.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use time::OffsetDateTime;
use tokio::time::interval;
use tracing::{error, info};

use periscope_probe::{AppClient, ProbeConfig, ReportPublisher};
use periscope_report::report::{attrs, topologies};
use periscope_report::{Node, Report};

fn host_snapshot(probe_id: &str, started: Instant) -> Report {
    let now = OffsetDateTime::now_utc();
    let hostname = gethostname::gethostname().to_string_lossy().to_string();

    let mut report = Report::new();
    let hosts = report.topology_mut(topologies::HOST);
    hosts.label = "Host".to_string();
    hosts.label_plural = "Hosts".to_string();
    hosts.add_node(
        Node::new(&hostname, topologies::HOST)
            .with_latest(attrs::HOST_NAME, now, &hostname)
            .with_latest(attrs::OS, now, std::env::consts::OS)
            .with_latest(
                attrs::UPTIME_SECONDS,
                now,
                &started.elapsed().as_secs().to_string(),
            )
            .with_latest(attrs::CONTROL_PROBE_ID, now, probe_id),
    );
    report
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let config = ProbeConfig::load()
        .await
        .context("failed to load probe config")?;
    info!(
        "Periscope probe {} starting, collector {}",
        config.probe_id, config.collector.base_url
    );

    let client = Arc::new(AppClient::new(config.clone()).context("failed to create app client")?);
    let publisher = ReportPublisher::new(client.clone(), config.publish.interval());

    let started = Instant::now();
    let mut ticker = interval(config.publish.interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = host_snapshot(&config.probe_id, started);
                if let Err(e) = publisher.publish(report) {
                    error!("publish failed: {e}");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    publisher.stop();
    client.stop();
    Ok(())
}
