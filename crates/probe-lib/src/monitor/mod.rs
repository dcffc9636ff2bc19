//! Metric collection from agent statistics
//!
//! The default monitor pulls `/monitor/statistics.json` from one agent,
//! matches executors to tasks, derives usage rates against the previous
//! cycle's counters, and writes the results into the agent's entity
//! repository through the metadata store's setters. Alternate metric
//! sources implement [`Monitor`] and register their own setters.

mod store;

pub use store::{DefaultMetricSetter, MetricDef, MetricSetter, MetricsMetadataStore};

use crate::client::RestClientFactory;
use crate::cluster::{ResourceUse, Task};
use crate::discovery::RawStatsCache;
use crate::error::Error;
use crate::models::{Executor, Statistics};
use crate::repository::{EntityRepository, MetricKind, ResourceType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// MHz ascribed to one nominal core when reporting capacities.
pub const CPU_CAPACITY_MHZ_PER_CORE: f64 = 2000.0;
/// MHz ascribed to one nominal core when reporting usage. Differs from the
/// capacity multiplier on purpose; both values are part of the upstream
/// contract and must not be unified without operator review.
pub const CPU_USED_MHZ_PER_CORE: f64 = 1000.0;
pub const KB_PER_MB: f64 = 1024.0;
pub const BYTES_PER_KB: f64 = 1024.0;
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Fetches metric values for one agent's repository.
#[async_trait]
pub trait Monitor: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Populate the repository's metric maps. Per-agent faults are returned
    /// for the cycle error report; the repository is always left usable.
    async fn monitor(
        &self,
        repository: &mut EntityRepository,
        stats_cache: &RawStatsCache,
        metrics_store: &MetricsMetadataStore,
        now: DateTime<Utc>,
    ) -> Vec<Error>;
}

/// Fraction of one wall-clock second the task spent on CPU since the
/// previous cycle. Zero on the first cycle, on counter regression (task
/// restart), and on a non-positive wall-clock delta.
pub fn cpu_fraction(
    previous: Option<&(Statistics, DateTime<Utc>)>,
    current: &Statistics,
    now: DateTime<Utc>,
) -> f64 {
    let Some((prev, last_time)) = previous else {
        return 0.0;
    };
    let prev_secs = prev.cpus_system_time_secs + prev.cpus_user_time_secs;
    let cur_secs = current.cpus_system_time_secs + current.cpus_user_time_secs;
    let diff_secs = (cur_secs - prev_secs).max(0.0);

    let elapsed = (now - *last_time).num_milliseconds() as f64 / 1000.0;
    if elapsed <= 0.0 {
        return 0.0;
    }
    diff_secs / elapsed
}

/// Resolve an executor to a task: first by `source`, then by scanning for a
/// matching `executor_id`.
fn find_task_id(
    tasks: &HashMap<String, Task>,
    source: &str,
    executor_id: &str,
) -> Option<String> {
    if tasks.contains_key(source) {
        return Some(source.to_string());
    }
    tasks
        .values()
        .find(|t| !executor_id.is_empty() && t.executor_id == executor_id)
        .map(|t| t.id.clone())
}

/// Default metric source backed by the agent REST API.
pub struct DefaultMesosMonitor {
    factory: Arc<dyn RestClientFactory>,
    token: Option<String>,
}

impl DefaultMesosMonitor {
    pub fn new(factory: Arc<dyn RestClientFactory>, token: Option<String>) -> Self {
        Self { factory, token }
    }

    /// Fold executor counters into the repository's agent and tasks,
    /// deriving per-task usage and accumulating node usage.
    fn fold_executor_stats(
        &self,
        repository: &mut EntityRepository,
        executors: &[Executor],
        stats_cache: &RawStatsCache,
        now: DateTime<Utc>,
    ) {
        let agent_id = repository.agent.id.clone();
        let agent_cpu_units = repository.agent.resources.cpu_units;
        let mut node_use = ResourceUse::default();

        for executor in executors {
            let Some(task_id) =
                find_task_id(&repository.agent.tasks, &executor.source, &executor.executor_id)
            else {
                // downgraded: not a cycle error, the executor is just skipped
                let err = Error::UnknownExecutor {
                    agent_id: agent_id.clone(),
                    executor_id: executor.executor_id.clone(),
                    source_id: executor.source.clone(),
                };
                debug!(error = %err, "skipping executor");
                continue;
            };

            let current = executor.statistics;
            let previous = stats_cache.previous(&agent_id, &task_id);
            let fraction = cpu_fraction(previous.as_ref(), &current, now);
            let used_cpu_mhz = fraction * agent_cpu_units * CPU_USED_MHZ_PER_CORE;
            let used_mem_kb = current.mem_rss_bytes / BYTES_PER_KB;

            node_use.cpu_mhz += used_cpu_mhz;
            node_use.mem_kb += used_mem_kb;

            let task = repository
                .agent
                .tasks
                .get_mut(&task_id)
                .expect("task id was just resolved");
            // saved for the next cycle's rate derivation
            task.raw_statistics = current;
            task.use_stats = ResourceUse {
                cpu_mhz: used_cpu_mhz,
                mem_kb: used_mem_kb,
            };
            // the stats limits are more current than the state document
            task.resources.cpu_units = current.cpus_limit;
            task.resources.mem_mb = current.mem_limit_bytes / BYTES_PER_MB;
        }

        repository.agent.use_stats = node_use;
    }

    fn set_node_metrics(&self, repository: &mut EntityRepository, store: &MetricsMetadataStore) {
        let agent = &repository.agent;
        let values = [
            (
                ResourceType::Cpu,
                MetricKind::Capacity,
                agent.resources.cpu_units * CPU_CAPACITY_MHZ_PER_CORE,
            ),
            (
                ResourceType::Mem,
                MetricKind::Capacity,
                agent.resources.mem_mb * KB_PER_MB,
            ),
            (
                ResourceType::CpuProvisioned,
                MetricKind::Capacity,
                agent.resources.cpu_units * CPU_CAPACITY_MHZ_PER_CORE,
            ),
            (
                ResourceType::CpuProvisioned,
                MetricKind::Used,
                agent.used_resources.cpu_units * CPU_CAPACITY_MHZ_PER_CORE,
            ),
            (
                ResourceType::MemProvisioned,
                MetricKind::Capacity,
                agent.resources.mem_mb * KB_PER_MB,
            ),
            (
                ResourceType::MemProvisioned,
                MetricKind::Used,
                agent.used_resources.mem_mb * KB_PER_MB,
            ),
            (ResourceType::Cpu, MetricKind::Used, agent.use_stats.cpu_mhz),
            (ResourceType::Mem, MetricKind::Used, agent.use_stats.mem_kb),
        ];

        let node = repository.node_mut();
        for (resource, kind, value) in values {
            store.set_value(node, resource, kind, value);
        }
    }

    fn set_container_metrics(
        &self,
        repository: &mut EntityRepository,
        store: &MetricsMetadataStore,
    ) {
        let per_task: HashMap<String, [(ResourceType, MetricKind, f64); 6]> = repository
            .agent
            .tasks
            .values()
            .map(|task| {
                (
                    task.id.clone(),
                    [
                        (
                            ResourceType::Cpu,
                            MetricKind::Capacity,
                            task.resources.cpu_units * CPU_CAPACITY_MHZ_PER_CORE,
                        ),
                        (
                            ResourceType::Mem,
                            MetricKind::Capacity,
                            task.resources.mem_mb * KB_PER_MB,
                        ),
                        (ResourceType::Cpu, MetricKind::Used, task.use_stats.cpu_mhz),
                        (ResourceType::Mem, MetricKind::Used, task.use_stats.mem_kb),
                        (
                            ResourceType::CpuProvisioned,
                            MetricKind::Used,
                            task.resources.cpu_units * CPU_CAPACITY_MHZ_PER_CORE,
                        ),
                        (
                            ResourceType::MemProvisioned,
                            MetricKind::Used,
                            task.resources.mem_mb * KB_PER_MB,
                        ),
                    ],
                )
            })
            .collect();

        for container in repository.containers_mut() {
            if let Some(values) = per_task.get(&container.task_id) {
                for (resource, kind, value) in values {
                    store.set_value(container, *resource, *kind, *value);
                }
            }
        }
    }

    fn set_app_metrics(&self, repository: &mut EntityRepository, store: &MetricsMetadataStore) {
        let per_task: HashMap<String, ResourceUse> = repository
            .agent
            .tasks
            .values()
            .map(|task| (task.id.clone(), task.use_stats))
            .collect();

        for app in repository.apps_mut() {
            if let Some(use_stats) = per_task.get(&app.task_id) {
                store.set_value(app, ResourceType::Cpu, MetricKind::Used, use_stats.cpu_mhz);
                store.set_value(app, ResourceType::Mem, MetricKind::Used, use_stats.mem_kb);
            }
        }
    }
}

#[async_trait]
impl Monitor for DefaultMesosMonitor {
    fn source_name(&self) -> &'static str {
        "DEFAULT_MESOS"
    }

    async fn monitor(
        &self,
        repository: &mut EntityRepository,
        stats_cache: &RawStatsCache,
        metrics_store: &MetricsMetadataStore,
        now: DateTime<Utc>,
    ) -> Vec<Error> {
        let mut errors = Vec::new();

        let client = self.factory.agent_client(
            &repository.agent.ip,
            &repository.agent.port,
            self.token.clone(),
        );
        let executors = match client.get_stats().await {
            Ok(executors) => {
                if executors.is_empty() {
                    // downgraded: usage stays zero, capacities still populate
                    let err = Error::MissingStats(repository.agent.id.clone());
                    debug!(error = %err, "agent returned no executors");
                }
                executors
            }
            Err(err) => {
                errors.push(err);
                Vec::new()
            }
        };

        self.fold_executor_stats(repository, &executors, stats_cache, now);
        self.set_node_metrics(repository, metrics_store);
        self.set_container_metrics(repository, metrics_store);
        self.set_app_metrics(repository, metrics_store);

        errors
    }
}
