//! Discovery worker
//!
//! One worker per partition group, stateless between cycles. Agents within a
//! group are processed sequentially; the group is the unit that bounds
//! simultaneous HTTP connections. A worker always returns a report for every
//! agent in its group so the orchestrator can see per-agent liveness even
//! when every poll failed.

use super::builders;
use super::stats_cache::RawStatsCache;
use crate::cluster::Agent;
use crate::dto::EntityDto;
use crate::error::Error;
use crate::models::Statistics;
use crate::monitor::{MetricsMetadataStore, Monitor};
use crate::repository::EntityRepository;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Outcome of processing one agent.
pub struct AgentReport {
    pub agent_id: String,
    pub entities: Vec<EntityDto>,
    pub errors: Vec<Error>,
    /// This cycle's raw counters per task, handed back for the stats cache.
    pub raw_stats: HashMap<String, Statistics>,
}

pub struct WorkerResponse {
    pub reports: Vec<AgentReport>,
}

pub struct DiscoveryWorker {
    name: String,
    group: Vec<Agent>,
    monitor: Arc<dyn Monitor>,
    stats_cache: Arc<RawStatsCache>,
    metrics_store: Arc<MetricsMetadataStore>,
}

impl DiscoveryWorker {
    pub fn new(
        name: impl Into<String>,
        group: Vec<Agent>,
        monitor: Arc<dyn Monitor>,
        stats_cache: Arc<RawStatsCache>,
        metrics_store: Arc<MetricsMetadataStore>,
    ) -> Self {
        Self {
            name: name.into(),
            group,
            monitor,
            stats_cache,
            metrics_store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process every agent in the group and fold the results into one
    /// response.
    pub async fn do_work(&self) -> WorkerResponse {
        let mut reports = Vec::with_capacity(self.group.len());
        for agent in &self.group {
            debug!(worker = %self.name, agent_id = %agent.id, "processing agent");
            reports.push(self.process_agent(agent).await);
        }
        WorkerResponse { reports }
    }

    async fn process_agent(&self, agent: &Agent) -> AgentReport {
        let mut repository = EntityRepository::new(agent.clone());

        let errors = self
            .monitor
            .monitor(
                &mut repository,
                &self.stats_cache,
                &self.metrics_store,
                Utc::now(),
            )
            .await;

        let entities = builders::build_all(&repository);
        let raw_stats = repository
            .agent
            .tasks
            .values()
            .map(|task| (task.id.clone(), task.raw_statistics))
            .collect();

        debug!(
            worker = %self.name,
            agent_id = %agent.id,
            entities = entities.len(),
            errors = errors.len(),
            "agent processed"
        );

        AgentReport {
            agent_id: agent.id.clone(),
            entities,
            errors,
            raw_stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Task;
    use crate::dto::EntityKind;
    use crate::models::TASK_RUNNING;
    use async_trait::async_trait;
    use chrono::DateTime;

    /// Monitor stub that touches nothing; caps and usage stay absent.
    struct NullMonitor {
        fail_agents: Vec<String>,
    }

    #[async_trait]
    impl Monitor for NullMonitor {
        fn source_name(&self) -> &'static str {
            "NULL"
        }

        async fn monitor(
            &self,
            repository: &mut EntityRepository,
            _stats_cache: &RawStatsCache,
            _metrics_store: &MetricsMetadataStore,
            _now: DateTime<Utc>,
        ) -> Vec<Error> {
            if self.fail_agents.contains(&repository.agent.id) {
                vec![Error::Protocol {
                    status: 0,
                    message: "timed out".to_string(),
                }]
            } else {
                Vec::new()
            }
        }
    }

    fn agent(id: &str, running_tasks: &[&str]) -> Agent {
        let mut agent = Agent {
            id: id.to_string(),
            ip: format!("10.0.0.{}", id.len()),
            port: "5051".to_string(),
            ..Default::default()
        };
        for task_id in running_tasks {
            agent.tasks.insert(
                task_id.to_string(),
                Task {
                    id: task_id.to_string(),
                    name: task_id.to_string(),
                    agent_id: id.to_string(),
                    state: TASK_RUNNING.to_string(),
                    ..Default::default()
                },
            );
        }
        agent
    }

    fn worker_for(group: Vec<Agent>, fail_agents: Vec<String>) -> DiscoveryWorker {
        DiscoveryWorker::new(
            "worker-0",
            group,
            Arc::new(NullMonitor { fail_agents }),
            Arc::new(RawStatsCache::new()),
            Arc::new(MetricsMetadataStore::new()),
        )
    }

    #[tokio::test]
    async fn reports_every_agent_in_group() {
        let worker = worker_for(vec![agent("a1", &["t1"]), agent("a2", &[])], vec![]);
        let response = worker.do_work().await;

        assert_eq!(response.reports.len(), 2);
        let report = &response.reports[0];
        assert_eq!(report.agent_id, "a1");
        // node + container + app for the running task
        assert_eq!(report.entities.len(), 3);
        assert!(report.raw_stats.contains_key("t1"));

        // agent with no tasks still emits its node
        let empty = &response.reports[1];
        assert_eq!(empty.entities.len(), 1);
        assert_eq!(empty.entities[0].kind, EntityKind::VirtualMachine);
    }

    #[tokio::test]
    async fn failed_agent_still_produces_entities_and_error() {
        let worker = worker_for(
            vec![agent("a1", &["t1"]), agent("a2", &["t2"])],
            vec!["a2".to_string()],
        );
        let response = worker.do_work().await;

        let failed = response
            .reports
            .iter()
            .find(|r| r.agent_id == "a2")
            .unwrap();
        assert_eq!(failed.errors.len(), 1);
        assert_eq!(failed.entities.len(), 3);
    }
}
