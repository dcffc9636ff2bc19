//! Discovery pipeline
//!
//! One cycle: refresh the leader and its state document, parse the cluster
//! snapshot, partition the agent fleet, fan out one worker per group, merge
//! the worker responses into a single entity graph plus a per-agent error
//! report, and finally replace the raw-stats baseline for the next cycle.

mod builders;
mod partition;
mod stats_cache;
mod worker;

pub use builders::{build_all, build_app_entities, build_container_entities, build_node_entity};
pub use partition::{PartitionStrategy, DEFAULT_WORKER_COUNT};
pub use stats_cache::{CycleCounters, RawStatsCache};
pub use worker::{AgentReport, DiscoveryWorker, WorkerResponse};

use crate::client::RestClientFactory;
use crate::cluster::{Agent, ClusterSnapshot};
use crate::config::TargetConfig;
use crate::dto::EntityDto;
use crate::error::{Error, Result};
use crate::leader::LeaderTracker;
use crate::monitor::{DefaultMesosMonitor, MetricsMetadataStore, Monitor};
use std::sync::Arc;
use tracing::{error, info};

/// One agent's failure, keyed for the cycle report.
#[derive(Debug)]
pub struct AgentError {
    pub agent_id: String,
    pub error: Error,
}

/// Everything one cycle produced for the boundary adapter.
pub struct DiscoveryResult {
    pub entities: Vec<EntityDto>,
    pub errors: Vec<AgentError>,
}

/// Drives the per-cycle discovery pipeline against one target.
pub struct DiscoveryExecutor {
    config: TargetConfig,
    factory: Arc<dyn RestClientFactory>,
    leader: LeaderTracker,
    stats_cache: Arc<RawStatsCache>,
    metrics_store: Arc<MetricsMetadataStore>,
    strategy: PartitionStrategy,
}

impl DiscoveryExecutor {
    pub fn new(
        config: TargetConfig,
        factory: Arc<dyn RestClientFactory>,
        strategy: PartitionStrategy,
    ) -> Result<Self> {
        config.validate()?;
        let leader = LeaderTracker::new(config.clone(), factory.clone())?;
        Ok(Self {
            config,
            factory,
            leader,
            stats_cache: Arc::new(RawStatsCache::new()),
            metrics_store: Arc::new(MetricsMetadataStore::new()),
            strategy,
        })
    }

    /// Validate the target by authenticating against the leader.
    pub async fn validate_target(&mut self) -> Result<()> {
        self.leader.refresh_login().await
    }

    pub fn leader(&self) -> &LeaderTracker {
        &self.leader
    }

    /// Run one discovery cycle.
    pub async fn discover(&mut self) -> Result<DiscoveryResult> {
        let state = self.leader.refresh_state().await?;

        // A parse failure aborts the cycle before the stats baseline is
        // touched, so the next cycle still diffs against good counters.
        let snapshot = ClusterSnapshot::from_state(&state, self.config.cluster_scope())?;
        info!(
            agents = snapshot.agents.len(),
            frameworks = snapshot.frameworks.len(),
            tasks = snapshot.tasks.len(),
            running = snapshot.running_task_count(),
            "parsed cluster snapshot"
        );

        let token = self.leader.token();
        let mut agents: Vec<Agent> = snapshot.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        let groups = self.strategy.split(agents);

        let mut handles = Vec::with_capacity(groups.len());
        for (index, group) in groups.into_iter().enumerate() {
            let monitor: Arc<dyn Monitor> =
                Arc::new(DefaultMesosMonitor::new(self.factory.clone(), token.clone()));
            let worker = DiscoveryWorker::new(
                format!("discovery-worker-{index}"),
                group,
                monitor,
                self.stats_cache.clone(),
                self.metrics_store.clone(),
            );
            handles.push(tokio::spawn(async move { worker.do_work().await }));
        }

        // Seed counters with zeroed entries for every known task so agents
        // whose worker died keep a (zero) baseline, then overwrite with what
        // the workers actually observed.
        let mut counters = CycleCounters::new();
        for agent in snapshot.agents.values() {
            counters.insert(
                agent.id.clone(),
                agent
                    .tasks
                    .values()
                    .map(|t| (t.id.clone(), t.raw_statistics))
                    .collect(),
            );
        }

        let mut entities = Vec::new();
        let mut errors = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(response) => {
                    for report in response.reports {
                        counters.insert(report.agent_id.clone(), report.raw_stats);
                        entities.extend(report.entities);
                        errors.extend(report.errors.into_iter().map(|err| AgentError {
                            agent_id: report.agent_id.clone(),
                            error: err,
                        }));
                    }
                }
                Err(join_err) => {
                    error!(error = %join_err, "discovery worker task failed");
                }
            }
        }

        self.stats_cache.refresh(counters);

        info!(
            entities = entities.len(),
            errors = errors.len(),
            "discovery cycle complete"
        );
        Ok(DiscoveryResult { entities, errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{AgentRestClient, MasterConf, MasterRestClient};
    use crate::config::MesosVendor;
    use crate::dto::EntityKind;
    use crate::models::{Executor, StateResponse, Statistics};
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn two_agent_state() -> StateResponse {
        serde_json::from_str(
            r#"{
            "id": "master-1",
            "leader": "master@10.0.0.5:5050",
            "leader_info": {"hostname": "10.0.0.5", "port": 5050},
            "slaves": [
                {"id": "a1", "pid": "slave(1)@10.0.0.1:5051",
                 "resources": {"cpus": 1.0, "mem": 2048.0}},
                {"id": "a2", "pid": "slave(1)@10.0.0.2:5051",
                 "resources": {"cpus": 2.0, "mem": 4096.0}}
            ],
            "frameworks": [{"id": "fw-1", "name": "marathon", "tasks": [
                {"id": "t1", "name": "web", "framework_id": "fw-1",
                 "slave_id": "a1", "state": "TASK_RUNNING",
                 "resources": {"cpus": 1.0, "mem": 512.0}}
            ]}]
        }"#,
        )
        .unwrap()
    }

    fn stats_for_t1() -> Vec<Executor> {
        vec![Executor {
            executor_id: "t1".to_string(),
            source: "t1".to_string(),
            statistics: Statistics {
                cpus_limit: 1.0,
                mem_limit_bytes: 536_870_912.0,
                mem_rss_bytes: 104_857_600.0,
                cpus_system_time_secs: 10.0,
                cpus_user_time_secs: 20.0,
                ..Default::default()
            },
            ..Default::default()
        }]
    }

    struct MockMaster;

    #[async_trait]
    impl MasterRestClient for MockMaster {
        async fn login(&mut self) -> crate::error::Result<String> {
            Ok(String::new())
        }

        async fn get_state(&self) -> crate::error::Result<StateResponse> {
            Ok(two_agent_state())
        }

        fn token(&self) -> Option<&str> {
            None
        }
    }

    struct MockAgent {
        reply: Option<Vec<Executor>>,
    }

    #[async_trait]
    impl AgentRestClient for MockAgent {
        async fn get_stats(&self) -> crate::error::Result<Vec<Executor>> {
            match &self.reply {
                Some(executors) => Ok(executors.clone()),
                None => Err(Error::Protocol {
                    status: 0,
                    message: "timed out".to_string(),
                }),
            }
        }
    }

    /// Mock cluster: master always answers; agents scripted by IP.
    struct MockClusterFactory {
        agent_replies: HashMap<String, Option<Vec<Executor>>>,
    }

    impl RestClientFactory for MockClusterFactory {
        fn master_client(&self, _conf: MasterConf) -> Box<dyn MasterRestClient> {
            Box::new(MockMaster)
        }

        fn agent_client(
            &self,
            ip: &str,
            _port: &str,
            _token: Option<String>,
        ) -> Box<dyn AgentRestClient> {
            Box::new(MockAgent {
                reply: self.agent_replies.get(ip).cloned().flatten(),
            })
        }
    }

    fn executor_with(
        agent_replies: HashMap<String, Option<Vec<Executor>>>,
    ) -> DiscoveryExecutor {
        let config = TargetConfig {
            vendor: MesosVendor::Apache,
            master_ip_port: "10.0.0.5:5050".to_string(),
            username: String::new(),
            password: String::new(),
        };
        DiscoveryExecutor::new(
            config,
            Arc::new(MockClusterFactory { agent_replies }),
            PartitionStrategy::default(),
        )
        .unwrap()
    }

    fn count_kind(result: &DiscoveryResult, kind: EntityKind) -> usize {
        result.entities.iter().filter(|e| e.kind == kind).count()
    }

    #[tokio::test]
    async fn cycle_emits_one_node_per_agent_and_entities_per_running_task() {
        let replies = HashMap::from([
            ("10.0.0.1".to_string(), Some(stats_for_t1())),
            ("10.0.0.2".to_string(), Some(Vec::new())),
        ]);
        let mut executor = executor_with(replies);

        let result = executor.discover().await.unwrap();

        assert_eq!(count_kind(&result, EntityKind::VirtualMachine), 2);
        assert_eq!(count_kind(&result, EntityKind::Container), 1);
        assert_eq!(count_kind(&result, EntityKind::Application), 1);
        assert!(result.errors.is_empty());

        let container = result
            .entities
            .iter()
            .find(|e| e.kind == EntityKind::Container)
            .unwrap();
        assert_eq!(container.id, "POD-t1");
        // hosted on an emitted node
        let provider = container.provider.as_ref().unwrap();
        assert!(result
            .entities
            .iter()
            .any(|e| e.kind == EntityKind::VirtualMachine && e.id == provider.id));

        // the stats baseline was refreshed for the next cycle
        let (previous, _) = executor.stats_cache.previous("a1", "t1").unwrap();
        assert_eq!(previous.cpus_system_time_secs, 10.0);
    }

    #[tokio::test]
    async fn unreachable_agent_is_reported_without_failing_the_cycle() {
        let replies = HashMap::from([
            ("10.0.0.1".to_string(), Some(stats_for_t1())),
            ("10.0.0.2".to_string(), None),
        ]);
        let mut executor = executor_with(replies);

        let result = executor.discover().await.unwrap();

        assert_eq!(count_kind(&result, EntityKind::VirtualMachine), 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].agent_id, "a2");
    }
}
