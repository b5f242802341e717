//! Single-slot report publisher.
//!
//! Producers may generate reports faster than the network accepts them.
//! The publisher decouples the two with a one-element slot: `publish`
//! overwrites whatever is buffered (freshness beats completeness for a
//! live-topology view), and a dedicated loop performs at most one
//! in-flight transport publish at a time. Transport failures are logged
//! here and never surfaced to the producer - a probe with an unreachable
//! collector keeps running.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{watch, Notify};
use tokio::time::MissedTickBehavior;
use tracing::debug;

use periscope_report::Report;

use crate::appclient::{AppClient, ClientError};

/// Transport seam the sender loop drives. [`AppClient`] is the production
/// implementation; tests substitute recording or failing senders.
pub trait ReportSender: Send + Sync + 'static {
    fn send(&self, report: Report) -> impl Future<Output = Result<(), ClientError>> + Send;
}

impl ReportSender for AppClient {
    fn send(&self, report: Report) -> impl Future<Output = Result<(), ClientError>> + Send {
        async move { self.publish(&report).await }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PublishError {
    #[error("publisher is stopped")]
    Closed,
}

pub struct ReportPublisher {
    slot: Arc<Mutex<Option<Report>>>,
    wakeup: Arc<Notify>,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
}

impl ReportPublisher {
    /// Start the sender loop. It wakes on `interval` or on new data and
    /// hands the freshest buffered report to `sender`, sequentially.
    pub fn new<S: ReportSender>(sender: Arc<S>, interval: Duration) -> Self {
        let slot: Arc<Mutex<Option<Report>>> = Arc::new(Mutex::new(None));
        let wakeup = Arc::new(Notify::new());
        let (shutdown, mut stop_rx) = watch::channel(false);

        {
            let slot = slot.clone();
            let wakeup = wakeup.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = wakeup.notified() => {}
                        _ = stop_rx.changed() => break,
                    }
                    let buffered = take_slot(&slot);
                    if let Some(report) = buffered {
                        // Failures here include the expected transient loss
                        // while the transport is still spinning up.
                        if let Err(e) = sender.send(report).await {
                            debug!("report publish dropped: {e}");
                        }
                    }
                }
                debug!("report sender loop stopped");
            });
        }

        Self {
            slot,
            wakeup,
            shutdown,
            closed: AtomicBool::new(false),
        }
    }

    /// Buffer a report for the next send cycle, dropping any older unsent
    /// one. Never blocks on the network and never returns transport errors.
    pub fn publish(&self, report: Report) -> Result<(), PublishError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PublishError::Closed);
        }
        *self.slot.lock() = Some(report);
        self.wakeup.notify_one();
        Ok(())
    }

    /// Shut the sender loop down. Idempotent.
    pub fn stop(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.shutdown.send(true);
        }
    }
}

fn take_slot(slot: &Mutex<Option<Report>>) -> Option<Report> {
    slot.lock().take()
}
