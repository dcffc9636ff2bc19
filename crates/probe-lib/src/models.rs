//! Wire types for the Mesos master and agent REST APIs
//!
//! These structs mirror the JSON documents served by the master `state`
//! endpoint and the agent `monitor/statistics` endpoint. Field presence
//! varies across Mesos versions, so everything non-structural defaults.

use serde::{Deserialize, Serialize};

/// Task state literal for tasks that are materialized as containers/apps.
pub const TASK_RUNNING: &str = "TASK_RUNNING";

/// Master `state` document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub leader: String,
    #[serde(default)]
    pub leader_info: LeaderInfo,
    #[serde(default)]
    pub version: String,
    #[serde(default, rename = "cluster")]
    pub cluster_name: String,
    #[serde(rename = "slaves")]
    pub agents: Option<Vec<AgentInfo>>,
    pub frameworks: Option<Vec<FrameworkInfo>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaderInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub pid: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub hostname: String,
}

/// Agent entry in the master state document. The network address lives in
/// `pid` (`slave(1)@10.0.0.1:5051`), not in `hostname`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub pid: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub resources: Resources,
    #[serde(default)]
    pub used_resources: Resources,
    #[serde(default)]
    pub offered_resources: Resources,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameworkInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pid: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub resources: Resources,
    pub tasks: Option<Vec<TaskInfo>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskInfo {
    #[serde(default)]
    pub framework_id: String,
    #[serde(default)]
    pub slave_id: String,
    #[serde(default)]
    pub executor_id: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub resources: Resources,
    #[serde(default)]
    pub state: String,
    pub container: Option<ContainerSpec>,
    pub discovery: Option<DiscoverySpec>,
}

/// Declared resource quantities. Units follow the master convention:
/// nominal cores, megabytes, megabytes, port-range string.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Resources {
    #[serde(default, rename = "cpus")]
    pub cpu_units: f64,
    #[serde(default, rename = "mem")]
    pub mem_mb: f64,
    #[serde(default, rename = "disk")]
    pub disk_mb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerSpec {
    pub docker: Option<DockerSpec>,
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DockerSpec {
    #[serde(default)]
    pub force_pull_image: bool,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default, rename = "portMappings")]
    pub port_mappings: Vec<PortMapping>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PortMapping {
    #[serde(default, rename = "containerPort")]
    pub container_port: u32,
    #[serde(default, rename = "hostPort")]
    pub host_port: u32,
    #[serde(default, rename = "servicePort")]
    pub service_port: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoverySpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ports: DiscoveryPorts,
    #[serde(default)]
    pub visibility: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoveryPorts {
    #[serde(default)]
    pub ports: Vec<PortInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortInfo {
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub protocol: String,
}

/// One executor entry from the agent `monitor/statistics` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Executor {
    #[serde(default)]
    pub executor_id: String,
    #[serde(default)]
    pub framework_id: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub statistics: Statistics,
}

/// Raw per-executor counters. CPU time is cumulative since executor start,
/// so usage rates require differencing against the previous cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct Statistics {
    #[serde(default)]
    pub cpus_limit: f64,
    #[serde(default)]
    pub mem_limit_bytes: f64,
    #[serde(default)]
    pub mem_rss_bytes: f64,
    #[serde(default)]
    pub cpus_system_time_secs: f64,
    #[serde(default)]
    pub cpus_user_time_secs: f64,
    #[serde(default)]
    pub disk_limit_bytes: f64,
    #[serde(default)]
    pub disk_used_bytes: f64,
}

/// DC/OS login response body.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_document_deserializes() {
        let doc = r#"{
            "id": "master-1",
            "leader": "master@10.0.0.5:5050",
            "leader_info": {"id": "master-1", "pid": "master@10.0.0.5:5050",
                            "port": 5050, "hostname": "10.0.0.5"},
            "cluster": "demo",
            "slaves": [{
                "id": "a1",
                "pid": "slave(1)@10.0.0.1:5051",
                "hostname": "node-1",
                "resources": {"cpus": 4.0, "mem": 14861.0, "disk": 35164.0,
                              "ports": "[31000-32000]"},
                "used_resources": {"cpus": 1.0, "mem": 512.0, "disk": 0.0},
                "active": true,
                "version": "1.4.0"
            }],
            "frameworks": [{
                "id": "fw-1", "name": "marathon", "active": true, "role": "*",
                "tasks": [{
                    "framework_id": "fw-1", "slave_id": "a1", "executor_id": "",
                    "id": "t1", "name": "web",
                    "resources": {"cpus": 1.0, "mem": 512.0, "disk": 0.0},
                    "state": "TASK_RUNNING"
                }]
            }]
        }"#;

        let state: StateResponse = serde_json::from_str(doc).unwrap();
        assert_eq!(state.leader_info.hostname, "10.0.0.5");
        assert_eq!(state.cluster_name, "demo");

        let agents = state.agents.unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].resources.cpu_units, 4.0);
        assert_eq!(agents[0].resources.ports.as_deref(), Some("[31000-32000]"));

        let frameworks = state.frameworks.unwrap();
        let tasks = frameworks[0].tasks.as_ref().unwrap();
        assert_eq!(tasks[0].state, TASK_RUNNING);
    }

    #[test]
    fn state_without_agents_keeps_field_none() {
        let state: StateResponse = serde_json::from_str(r#"{"id": "m"}"#).unwrap();
        assert!(state.agents.is_none());
        assert!(state.frameworks.is_none());
    }

    #[test]
    fn agent_stats_deserialize() {
        let doc = r#"[{
            "executor_id": "t1",
            "framework_id": "fw-1",
            "source": "t1",
            "statistics": {
                "cpus_limit": 1.1,
                "mem_limit_bytes": 536870912,
                "mem_rss_bytes": 104857600,
                "cpus_system_time_secs": 10.5,
                "cpus_user_time_secs": 20.25,
                "disk_limit_bytes": 0,
                "disk_used_bytes": 0
            }
        }]"#;

        let executors: Vec<Executor> = serde_json::from_str(doc).unwrap();
        assert_eq!(executors.len(), 1);
        let stats = &executors[0].statistics;
        assert_eq!(stats.mem_rss_bytes, 104_857_600.0);
        assert_eq!(stats.cpus_system_time_secs, 10.5);
    }

    #[test]
    fn missing_statistics_fields_default_to_zero() {
        let executors: Vec<Executor> =
            serde_json::from_str(r#"[{"executor_id": "e1", "statistics": {}}]"#).unwrap();
        assert_eq!(executors[0].statistics, Statistics::default());
    }
}
