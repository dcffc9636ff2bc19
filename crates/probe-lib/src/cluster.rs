//! Typed cluster model parsed from a master state document
//!
//! Agents, frameworks and tasks reference each other by id. The snapshot
//! holds three id-indexed collections plus a per-agent task back-link map
//! that is rebuilt every cycle; nothing here outlives the cycle.

use crate::error::{Error, Result};
use crate::models::{Resources, StateResponse, Statistics};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Usage values derived from agent statistics, in the probe's units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceUse {
    pub cpu_mhz: f64,
    pub mem_kb: f64,
}

/// One agent (node) with its declared capacities and per-cycle task map.
#[derive(Debug, Clone, Default)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub pid: String,
    /// Parsed from the pid string, not from `hostname`.
    pub ip: String,
    pub port: String,
    pub cluster_scope: String,
    pub resources: Resources,
    pub used_resources: Resources,
    pub tasks: HashMap<String, Task>,
    /// Accumulated from task usage during monitoring.
    pub use_stats: ResourceUse,
}

#[derive(Debug, Clone, Default)]
pub struct Framework {
    pub id: String,
    pub name: String,
    pub hostname: String,
    pub active: bool,
    pub role: String,
    pub task_ids: Vec<String>,
}

/// One task, holding an id reference to its agent only.
#[derive(Debug, Clone, Default)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub framework_id: String,
    pub agent_id: String,
    pub executor_id: String,
    pub state: String,
    pub resources: Resources,
    /// Raw counters read from the agent, kept for the next cycle's diff.
    pub raw_statistics: Statistics,
    pub use_stats: ResourceUse,
}

/// Cluster topology for one discovery cycle.
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    pub master_id: String,
    pub leader: String,
    pub cluster_name: String,
    pub cluster_scope: String,
    pub agents: HashMap<String, Agent>,
    pub frameworks: HashMap<String, Framework>,
    pub tasks: HashMap<String, Task>,
}

/// Extract `ip` and `port` from a pid string of the form `name(n)@ip:port`.
pub fn parse_pid_address(pid: &str) -> Option<(String, String)> {
    let (_, addr) = pid.split_once('@')?;
    let (ip, port) = addr.split_once(':')?;
    if ip.is_empty() {
        return None;
    }
    Some((ip.to_string(), port.to_string()))
}

impl ClusterSnapshot {
    /// Translate a decoded state document into the typed model, resolving all
    /// task-to-agent cross references.
    pub fn from_state(state: &StateResponse, cluster_scope: &str) -> Result<Self> {
        let agent_infos = match &state.agents {
            Some(agents) if !agents.is_empty() => agents,
            _ => {
                return Err(Error::Parse(
                    "state document contains no agents".to_string(),
                ))
            }
        };

        let mut snapshot = ClusterSnapshot {
            master_id: state.id.clone(),
            leader: state.leader.clone(),
            cluster_name: state.cluster_name.clone(),
            cluster_scope: cluster_scope.to_string(),
            ..Default::default()
        };

        for info in agent_infos {
            let (ip, port) = parse_pid_address(&info.pid).unwrap_or_else(|| {
                warn!(agent_id = %info.id, pid = %info.pid, "unparseable agent pid");
                (String::new(), String::new())
            });
            snapshot.agents.insert(
                info.id.clone(),
                Agent {
                    id: info.id.clone(),
                    name: info.hostname.clone(),
                    pid: info.pid.clone(),
                    ip,
                    port,
                    cluster_scope: cluster_scope.to_string(),
                    resources: info.resources.clone(),
                    used_resources: info.used_resources.clone(),
                    tasks: HashMap::new(),
                    use_stats: ResourceUse::default(),
                },
            );
        }

        let framework_infos = match &state.frameworks {
            Some(frameworks) => frameworks,
            None => {
                warn!("state document has no frameworks, only agents will be visible");
                return Ok(snapshot);
            }
        };

        for fw in framework_infos {
            let mut framework = Framework {
                id: fw.id.clone(),
                name: fw.name.clone(),
                hostname: fw.hostname.clone(),
                active: fw.active,
                role: fw.role.clone(),
                task_ids: Vec::new(),
            };

            let task_infos = match &fw.tasks {
                Some(tasks) => tasks,
                None => {
                    debug!(framework = %fw.name, "no tasks defined for framework");
                    snapshot.frameworks.insert(framework.id.clone(), framework);
                    continue;
                }
            };

            for info in task_infos {
                let task = Task {
                    id: info.id.clone(),
                    name: info.name.clone(),
                    framework_id: info.framework_id.clone(),
                    agent_id: info.slave_id.clone(),
                    executor_id: info.executor_id.clone(),
                    state: info.state.clone(),
                    resources: info.resources.clone(),
                    raw_statistics: Statistics::default(),
                    use_stats: ResourceUse::default(),
                };
                framework.task_ids.push(task.id.clone());
                snapshot.tasks.insert(task.id.clone(), task.clone());

                match snapshot.agents.get_mut(&info.slave_id) {
                    Some(agent) => {
                        agent.tasks.insert(task.id.clone(), task);
                    }
                    None => {
                        warn!(
                            agent_id = %info.slave_id,
                            task = %info.name,
                            "cannot find agent for task"
                        );
                    }
                }
            }
            snapshot.frameworks.insert(framework.id.clone(), framework);
        }

        Ok(snapshot)
    }

    /// Count of tasks in the running state across the whole cluster.
    pub fn running_task_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.state == crate::models::TASK_RUNNING)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StateResponse;

    fn two_agent_state() -> StateResponse {
        serde_json::from_str(
            r#"{
            "id": "master-1",
            "leader": "master@10.0.0.5:5050",
            "cluster": "",
            "slaves": [
                {"id": "a1", "pid": "slave(1)@10.0.0.1:5051", "hostname": "node-1",
                 "resources": {"cpus": 4.0, "mem": 2048.0, "disk": 1000.0}},
                {"id": "a2", "pid": "slave(1)@10.0.0.2:5051", "hostname": "node-2",
                 "resources": {"cpus": 2.0, "mem": 1024.0, "disk": 500.0}}
            ],
            "frameworks": [
                {"id": "fw-1", "name": "marathon", "tasks": [
                    {"id": "t1", "name": "web", "framework_id": "fw-1",
                     "slave_id": "a1", "state": "TASK_RUNNING",
                     "resources": {"cpus": 1.0, "mem": 512.0}},
                    {"id": "t2", "name": "batch", "framework_id": "fw-1",
                     "slave_id": "a2", "state": "TASK_FINISHED",
                     "resources": {"cpus": 0.5, "mem": 128.0}}
                ]}
            ]
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn parses_pid_addresses() {
        assert_eq!(
            parse_pid_address("slave(1)@10.10.174.92:5051"),
            Some(("10.10.174.92".to_string(), "5051".to_string()))
        );
        assert_eq!(parse_pid_address("garbage"), None);
        assert_eq!(parse_pid_address("slave(1)@nohost"), None);
    }

    #[test]
    fn builds_snapshot_with_back_links() {
        let snapshot =
            ClusterSnapshot::from_state(&two_agent_state(), "10.0.0.5:5050").unwrap();

        assert_eq!(snapshot.agents.len(), 2);
        assert_eq!(snapshot.tasks.len(), 2);
        assert_eq!(snapshot.running_task_count(), 1);

        let a1 = &snapshot.agents["a1"];
        assert_eq!(a1.ip, "10.0.0.1");
        assert_eq!(a1.port, "5051");
        assert_eq!(a1.cluster_scope, "10.0.0.5:5050");
        assert!(a1.tasks.contains_key("t1"));

        // every task's agent back-link resolves
        for task in snapshot.tasks.values() {
            let agent = &snapshot.agents[&task.agent_id];
            assert!(agent.tasks.contains_key(&task.id));
        }
    }

    #[test]
    fn rejects_state_without_agents() {
        let state: StateResponse = serde_json::from_str(r#"{"id": "m"}"#).unwrap();
        assert!(matches!(
            ClusterSnapshot::from_state(&state, "scope"),
            Err(Error::Parse(_))
        ));

        let empty: StateResponse =
            serde_json::from_str(r#"{"id": "m", "slaves": []}"#).unwrap();
        assert!(ClusterSnapshot::from_state(&empty, "scope").is_err());
    }

    #[test]
    fn missing_frameworks_is_non_fatal() {
        let state: StateResponse = serde_json::from_str(
            r#"{"id": "m", "slaves": [{"id": "a1", "pid": "slave(1)@10.0.0.1:5051"}]}"#,
        )
        .unwrap();
        let snapshot = ClusterSnapshot::from_state(&state, "scope").unwrap();
        assert_eq!(snapshot.agents.len(), 1);
        assert!(snapshot.frameworks.is_empty());
        assert!(snapshot.tasks.is_empty());
    }

    #[test]
    fn task_with_unknown_agent_stays_global_only() {
        let state: StateResponse = serde_json::from_str(
            r#"{
            "id": "m",
            "slaves": [{"id": "a1", "pid": "slave(1)@10.0.0.1:5051"}],
            "frameworks": [{"id": "fw-1", "tasks": [
                {"id": "t9", "name": "orphan", "slave_id": "ghost",
                 "state": "TASK_RUNNING"}
            ]}]
        }"#,
        )
        .unwrap();

        let snapshot = ClusterSnapshot::from_state(&state, "scope").unwrap();
        assert!(snapshot.tasks.contains_key("t9"));
        assert!(snapshot.agents["a1"].tasks.is_empty());
    }
}
