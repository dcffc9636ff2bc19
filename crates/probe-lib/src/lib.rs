//! Discovery and monitoring library for Mesos-style clusters
//!
//! This crate provides the probe's core:
//! - Leader tracking across a multi-master cluster with vendor-specific
//!   authentication (Apache Mesos, DC/OS)
//! - A sharded discovery pipeline that partitions the agent fleet, polls
//!   per-agent statistics in parallel workers, and derives usage rates from
//!   consecutive-cycle counter diffs
//! - A typed entity repository fed through a metric metadata store, so
//!   alternate metric sources plug in without touching workers
//! - The logical entity graph (nodes, containers, apps) handed to the
//!   upstream boundary adapter

pub mod client;
pub mod cluster;
pub mod config;
pub mod discovery;
pub mod dto;
pub mod error;
pub mod health;
pub mod leader;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod repository;

pub use config::{MesosVendor, TargetConfig};
pub use discovery::{DiscoveryExecutor, DiscoveryResult, PartitionStrategy, RawStatsCache};
pub use error::{Error, Result};
pub use health::{ComponentStatus, HealthRegistry};
pub use leader::LeaderTracker;
pub use observability::{ProbeLogger, ProbeMetrics};
