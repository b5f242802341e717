//! Shared data path types for Periscope probes and the collector.
//!
//! - [`report`]: the mergeable topology snapshot model
//! - [`codec`]: binary wire encoding with optional gzip
//! - [`xfer`]: probe/app transfer types and header constants

pub mod codec;
pub mod report;
pub mod xfer;

pub use report::{
    Control, ControlActivation, LatestEntry, Node, Nodes, Report, Topology,
};
