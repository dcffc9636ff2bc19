//! Per-agent entity repository
//!
//! Each discovery worker builds one repository per agent: a node entity for
//! the agent itself plus a container entity and an app entity for every task
//! associated with it. Entities carry a metric map keyed by
//! `(resource, metric kind)`; metric writes go through the metadata store's
//! setters so alternate collectors can feed the same repository.
//!
//! Repositories live exactly one cycle.

use crate::cluster::Agent;
use std::collections::HashMap;

pub const CONTAINER_ID_PREFIX: &str = "POD-";
pub const APP_ID_PREFIX: &str = "APP-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Node,
    Container,
    App,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Cpu,
    Mem,
    Disk,
    CpuProvisioned,
    MemProvisioned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Capacity,
    Used,
    Peak,
    Average,
}

/// Values for the metrics of one entity. Absent entries are absent, not
/// zero; readers decide how to default.
#[derive(Debug, Clone, Default)]
pub struct MetricMap {
    values: HashMap<(ResourceType, MetricKind), f64>,
}

impl MetricMap {
    pub fn set(&mut self, resource: ResourceType, kind: MetricKind, value: f64) {
        self.values.insert((resource, kind), value);
    }

    pub fn get(&self, resource: ResourceType, kind: MetricKind) -> Option<f64> {
        self.values.get(&(resource, kind)).copied()
    }

    /// Value with a zero default, for DTO assembly.
    pub fn get_or_zero(&self, resource: ResourceType, kind: MetricKind) -> f64 {
        self.get(resource, kind).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Uniform write surface for metric setters.
pub trait RepositoryEntity {
    fn id(&self) -> &str;
    fn entity_type(&self) -> EntityType;
    fn metrics(&self) -> &MetricMap;
    fn metrics_mut(&mut self) -> &mut MetricMap;
}

macro_rules! repository_entity {
    ($name:ident, $etype:expr) => {
        impl RepositoryEntity for $name {
            fn id(&self) -> &str {
                &self.id
            }
            fn entity_type(&self) -> EntityType {
                $etype
            }
            fn metrics(&self) -> &MetricMap {
                &self.metrics
            }
            fn metrics_mut(&mut self) -> &mut MetricMap {
                &mut self.metrics
            }
        }
    };
}

/// The agent itself, id equal to the agent id.
#[derive(Debug, Clone)]
pub struct NodeEntity {
    pub id: String,
    pub metrics: MetricMap,
}

/// Runtime artifact hosting one task, id `POD-<taskId>`.
#[derive(Debug, Clone)]
pub struct ContainerEntity {
    pub id: String,
    pub task_id: String,
    pub metrics: MetricMap,
}

/// Workload running in a container, id `APP-<taskId>`.
#[derive(Debug, Clone)]
pub struct AppEntity {
    pub id: String,
    pub task_id: String,
    pub metrics: MetricMap,
}

repository_entity!(NodeEntity, EntityType::Node);
repository_entity!(ContainerEntity, EntityType::Container);
repository_entity!(AppEntity, EntityType::App);

pub fn container_entity_id(task_id: &str) -> String {
    format!("{CONTAINER_ID_PREFIX}{task_id}")
}

pub fn app_entity_id(task_id: &str) -> String {
    format!("{APP_ID_PREFIX}{task_id}")
}

/// All entities of one agent for one cycle.
pub struct EntityRepository {
    /// Worker-local copy of the agent, including its task map; monitoring
    /// folds raw stats and derived usage into it.
    pub agent: Agent,
    node: NodeEntity,
    containers: HashMap<String, ContainerEntity>,
    apps: HashMap<String, AppEntity>,
}

impl EntityRepository {
    /// Scaffold the repository: one node entity plus container and app
    /// entities for every task currently on the agent. Task state is not
    /// consulted here; non-running tasks are filtered at emit time.
    pub fn new(agent: Agent) -> Self {
        let node = NodeEntity {
            id: agent.id.clone(),
            metrics: MetricMap::default(),
        };
        let mut containers = HashMap::new();
        let mut apps = HashMap::new();
        for task_id in agent.tasks.keys() {
            let container = ContainerEntity {
                id: container_entity_id(task_id),
                task_id: task_id.clone(),
                metrics: MetricMap::default(),
            };
            containers.insert(container.id.clone(), container);

            let app = AppEntity {
                id: app_entity_id(task_id),
                task_id: task_id.clone(),
                metrics: MetricMap::default(),
            };
            apps.insert(app.id.clone(), app);
        }
        Self {
            agent,
            node,
            containers,
            apps,
        }
    }

    pub fn node(&self) -> &NodeEntity {
        &self.node
    }

    pub fn node_mut(&mut self) -> &mut NodeEntity {
        &mut self.node
    }

    pub fn containers(&self) -> impl Iterator<Item = &ContainerEntity> {
        self.containers.values()
    }

    pub fn containers_mut(&mut self) -> impl Iterator<Item = &mut ContainerEntity> {
        self.containers.values_mut()
    }

    pub fn apps(&self) -> impl Iterator<Item = &AppEntity> {
        self.apps.values()
    }

    pub fn apps_mut(&mut self) -> impl Iterator<Item = &mut AppEntity> {
        self.apps.values_mut()
    }

    pub fn container_for_task(&self, task_id: &str) -> Option<&ContainerEntity> {
        self.containers.get(&container_entity_id(task_id))
    }

    pub fn app_for_task(&self, task_id: &str) -> Option<&AppEntity> {
        self.apps.get(&app_entity_id(task_id))
    }
}
