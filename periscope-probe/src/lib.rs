//! Periscope probe library: the report transport client and the
//! single-slot report publisher that feeds it.

pub mod appclient;
pub mod config;
pub mod publisher;

pub use appclient::{AppClient, ClientError};
pub use config::ProbeConfig;
pub use publisher::{PublishError, ReportPublisher, ReportSender};
