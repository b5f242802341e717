//! HTTP client for one collector ("app").
//!
//! The client owns a connection profile (base URL, insecure flag, auth
//! token, probe identity) and attaches the auth and identity headers to
//! every call. A background task re-resolves the collector host on a fixed
//! cadence; when the address set changes (multi-instance collectors behind
//! a DNS name), the connection pool is rebuilt so new requests reach the
//! new instances. Pool readers always see either the old or the new pool.

use std::collections::BTreeSet;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::{AUTHORIZATION, CONTENT_ENCODING};
use reqwest::{StatusCode, Url};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use periscope_report::codec::{self, CodecError, GZIP_ENCODING};
use periscope_report::xfer::{self, Details};
use periscope_report::Report;

use crate::config::ProbeConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RESOLVE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid client configuration: {0}")]
    Config(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("collector responded with status {0}")]
    BadStatus(StatusCode),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("client is stopped")]
    Closed,
}

pub struct AppClient {
    config: ProbeConfig,
    report_url: Url,
    details_url: Url,
    pool: Arc<Mutex<reqwest::Client>>,
    closed: Arc<AtomicBool>,
    resolver: Mutex<Option<JoinHandle<()>>>,
}

impl AppClient {
    /// Create a client for the collector at `config.collector.base_url` and
    /// start the background address watcher.
    pub fn new(config: ProbeConfig) -> Result<Self, ClientError> {
        let base: Url = config
            .collector
            .base_url
            .parse()
            .map_err(|e| ClientError::Config(format!("unparsable base URL: {e}")))?;
        let report_url = base
            .join(xfer::REPORT_PATH)
            .map_err(|e| ClientError::Config(format!("bad report path: {e}")))?;
        let details_url = base
            .join(xfer::DETAILS_PATH)
            .map_err(|e| ClientError::Config(format!("bad details path: {e}")))?;

        let pool = Arc::new(Mutex::new(build_pool(config.collector.insecure)?));
        let closed = Arc::new(AtomicBool::new(false));

        let insecure = config.collector.insecure;
        let lookup_target = resolve_target(&config.collector.host, &base);
        let resolver = tokio::spawn(watch_addresses(
            lookup_target,
            RESOLVE_INTERVAL,
            pool.clone(),
            closed.clone(),
            |target: String| async move {
                let addrs: Vec<SocketAddr> = tokio::net::lookup_host(target).await?.collect();
                Ok(addrs)
            },
            move || build_pool(insecure),
        ));

        Ok(Self {
            config,
            report_url,
            details_url,
            pool,
            closed,
            resolver: Mutex::new(Some(resolver)),
        })
    }

    /// Encode (and optionally compress) a report and POST it to the
    /// collector. Errors are returned to the caller; retry policy belongs
    /// to the publisher, not here.
    pub async fn publish(&self, report: &Report) -> Result<(), ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }

        let compress = self.config.publish.compression;
        let body = if compress {
            codec::encode_gzip(report)?
        } else {
            codec::encode(report)?
        };

        let client = self.pool.lock().clone();
        let mut request = client
            .post(self.report_url.clone())
            .header(AUTHORIZATION, xfer::authorization_value(&self.config.token))
            .header(xfer::PROBE_ID_HEADER, &self.config.probe_id)
            .body(body);
        if compress {
            request = request.header(CONTENT_ENCODING, GZIP_ENCODING);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ClientError::BadStatus(response.status()));
        }
        Ok(())
    }

    /// Fetch the collector's identity and version from the details
    /// endpoint. Independent of the report channel.
    pub async fn details(&self) -> Result<Details, ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }

        let client = self.pool.lock().clone();
        let response = client
            .get(self.details_url.clone())
            .header(AUTHORIZATION, xfer::authorization_value(&self.config.token))
            .header(xfer::PROBE_ID_HEADER, &self.config.probe_id)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::BadStatus(response.status()));
        }
        Ok(response.json::<Details>().await?)
    }

    /// Stop the address watcher and mark the client closed. Safe to call
    /// more than once; publishes after the first call fail with
    /// [`ClientError::Closed`]. In-flight requests are not interrupted.
    pub fn stop(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.resolver.lock().take() {
            handle.abort();
        }
        info!("app client stopped");
    }
}

fn build_pool(insecure: bool) -> Result<reqwest::Client, ClientError> {
    Ok(reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .danger_accept_invalid_certs(insecure)
        .build()?)
}

/// Host:port string handed to the resolver. A bare hostname gets the
/// scheme's default port appended.
fn resolve_target(host: &str, base: &Url) -> String {
    if host.contains(':') {
        host.to_string()
    } else {
        let port = if base.scheme() == "https" { 443 } else { 80 };
        format!("{host}:{port}")
    }
}

/// Watch the collector address set and swap the connection pool when it
/// changes. `lookup` and `rebuild` are seams; production wires them to
/// DNS resolution and [`build_pool`].
async fn watch_addresses<L, F, B>(
    target: String,
    cadence: Duration,
    pool: Arc<Mutex<reqwest::Client>>,
    closed: Arc<AtomicBool>,
    mut lookup: L,
    mut rebuild: B,
) where
    L: FnMut(String) -> F + Send,
    F: Future<Output = io::Result<Vec<SocketAddr>>> + Send,
    B: FnMut() -> Result<reqwest::Client, ClientError> + Send,
{
    let mut known: Option<BTreeSet<SocketAddr>> = None;
    let mut ticker = tokio::time::interval(cadence);
    loop {
        ticker.tick().await;
        if closed.load(Ordering::SeqCst) {
            return;
        }
        let resolved: BTreeSet<SocketAddr> = match lookup(target.clone()).await {
            Ok(addrs) => addrs.into_iter().collect(),
            Err(e) => {
                debug!("address resolution for {target} failed: {e}");
                continue;
            }
        };
        let changed = known.as_ref().is_some_and(|prev| *prev != resolved);
        if changed {
            info!("collector address set changed, rebuilding connection pool");
            match rebuild() {
                Ok(client) => *pool.lock() = client,
                Err(e) => warn!("connection pool rebuild failed: {e}"),
            }
        }
        known = Some(resolved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProbeConfig;

    fn config(base_url: &str) -> ProbeConfig {
        let mut config = ProbeConfig::default();
        config.collector.base_url = base_url.to_string();
        config.collector.host = "127.0.0.1:1".to_string();
        config
    }

    #[tokio::test]
    async fn rejects_unparsable_base_url() {
        match AppClient::new(config("not a url")) {
            Err(ClientError::Config(_)) => {}
            Err(e) => panic!("expected config error, got {e:?}"),
            Ok(_) => panic!("expected config error, got a client"),
        }
    }

    #[tokio::test]
    async fn publish_after_stop_fails_closed() {
        let client = AppClient::new(config("http://127.0.0.1:1")).unwrap();
        client.stop();
        client.stop(); // idempotent
        match client.publish(&Report::new()).await {
            Err(ClientError::Closed) => {}
            other => panic!("expected closed error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn address_set_change_swaps_the_pool_exactly_once() {
        use std::sync::atomic::AtomicUsize;

        let a: SocketAddr = "10.0.0.1:4040".parse().unwrap();
        let b: SocketAddr = "10.0.0.2:4040".parse().unwrap();
        // Scripted resolutions; the last set repeats once the script runs out.
        let script = Arc::new(Mutex::new(vec![vec![a], vec![a], vec![a, b], vec![a, b]]));
        let rebuilds = Arc::new(AtomicUsize::new(0));

        let pool = Arc::new(Mutex::new(build_pool(false).unwrap()));
        let closed = Arc::new(AtomicBool::new(false));
        let lookup = {
            let script = script.clone();
            move |_target: String| {
                let next = {
                    let mut script = script.lock();
                    if script.len() > 1 {
                        script.remove(0)
                    } else {
                        script[0].clone()
                    }
                };
                async move { Ok(next) }
            }
        };
        let rebuild = {
            let rebuilds = rebuilds.clone();
            move || {
                rebuilds.fetch_add(1, Ordering::SeqCst);
                build_pool(false)
            }
        };

        let watcher = tokio::spawn(watch_addresses(
            "collector:80".to_string(),
            Duration::from_millis(5),
            pool,
            closed.clone(),
            lookup,
            rebuild,
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        closed.store(true, Ordering::SeqCst);
        let _ = watcher.await;

        // One rebuild for the [a] -> [a, b] transition; repeats of the
        // same set leave the pool alone.
        assert_eq!(rebuilds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn resolve_target_appends_default_port() {
        let http: Url = "http://collector".parse().unwrap();
        let https: Url = "https://collector".parse().unwrap();
        assert_eq!(resolve_target("collector", &http), "collector:80");
        assert_eq!(resolve_target("collector", &https), "collector:443");
        assert_eq!(resolve_target("collector:4040", &http), "collector:4040");
    }
}
