//! Entity DTO assembly
//!
//! Translates a populated per-agent repository into the emitted entity
//! graph: one node, plus a container and an app per running task. Tasks in
//! any other state were scaffolded for stats bookkeeping only and are
//! filtered here.

use crate::dto::{
    Commodity, CommodityKind, EntityDto, EntityKind, EntityProperty, Provider,
    ReconciliationHint, IP_ADDRESS_PROPERTY, PROXY_VM_IP_PROPERTY,
};
use crate::models::TASK_RUNNING;
use crate::repository::{
    container_entity_id, EntityRepository, MetricKind, MetricMap, ResourceType,
};
use tracing::debug;

const APP_DISPLAY_PREFIX: &str = "APP-";

fn capacity_and_used(
    metrics: &MetricMap,
    kind: CommodityKind,
    resource: ResourceType,
) -> Commodity {
    Commodity::new(kind)
        .with_capacity(metrics.get_or_zero(resource, MetricKind::Capacity))
        .with_used(metrics.get_or_zero(resource, MetricKind::Used))
}

fn used_only(metrics: &MetricMap, kind: CommodityKind, resource: ResourceType) -> Commodity {
    Commodity::new(kind).with_used(metrics.get_or_zero(resource, MetricKind::Used))
}

/// The node entity representing the agent, stitched to the real machine by
/// its IP and patched into the server's inventory on reconciliation.
pub fn build_node_entity(repository: &EntityRepository) -> EntityDto {
    let agent = &repository.agent;
    let metrics = &repository.node().metrics;

    let mut dto = EntityDto::new(EntityKind::VirtualMachine, &agent.id, &agent.ip);
    dto.sold = vec![
        capacity_and_used(metrics, CommodityKind::MemProvisioned, ResourceType::MemProvisioned),
        capacity_and_used(metrics, CommodityKind::CpuProvisioned, ResourceType::CpuProvisioned),
        capacity_and_used(metrics, CommodityKind::VMem, ResourceType::Mem),
        capacity_and_used(metrics, CommodityKind::VCpu, ResourceType::Cpu),
        Commodity::new(CommodityKind::Cluster).with_key(&agent.cluster_scope),
    ];
    dto.properties = vec![EntityProperty::in_default_namespace(
        PROXY_VM_IP_PROPERTY,
        &agent.ip,
    )];
    dto.reconciliation = Some(ReconciliationHint {
        matching_property: PROXY_VM_IP_PROPERTY.to_string(),
        patched_commodities: vec![
            CommodityKind::CpuProvisioned,
            CommodityKind::MemProvisioned,
            CommodityKind::Cluster,
            CommodityKind::VCpu,
            CommodityKind::VMem,
            CommodityKind::VmpmAccess,
        ],
    });
    dto
}

/// Container entities for the agent's running tasks, hosted on the node.
pub fn build_container_entities(repository: &EntityRepository) -> Vec<EntityDto> {
    let agent = &repository.agent;
    let mut result = Vec::new();

    for container in repository.containers() {
        let Some(task) = agent.tasks.get(&container.task_id) else {
            continue;
        };
        if task.state != TASK_RUNNING {
            debug!(task = %task.id, state = %task.state, "skipping non-running task");
            continue;
        }

        let metrics = &container.metrics;
        let mut dto = EntityDto::new(EntityKind::Container, &container.id, &task.name);
        dto.sold = vec![
            capacity_and_used(metrics, CommodityKind::VMem, ResourceType::Mem),
            capacity_and_used(metrics, CommodityKind::VCpu, ResourceType::Cpu),
            Commodity::new(CommodityKind::Application).with_key(&task.id),
        ];
        dto.bought = vec![
            used_only(metrics, CommodityKind::MemProvisioned, ResourceType::MemProvisioned),
            used_only(metrics, CommodityKind::CpuProvisioned, ResourceType::CpuProvisioned),
            used_only(metrics, CommodityKind::VMem, ResourceType::Mem),
            used_only(metrics, CommodityKind::VCpu, ResourceType::Cpu),
            Commodity::new(CommodityKind::Cluster).with_key(&agent.cluster_scope),
        ];
        dto.provider = Some(Provider {
            kind: EntityKind::VirtualMachine,
            id: task.agent_id.clone(),
        });
        dto.properties = vec![EntityProperty::in_default_namespace(
            IP_ADDRESS_PROPERTY,
            &agent.ip,
        )];
        result.push(dto);
    }
    result
}

/// App entities for the agent's running tasks, hosted on their containers.
pub fn build_app_entities(repository: &EntityRepository) -> Vec<EntityDto> {
    let agent = &repository.agent;
    let mut result = Vec::new();

    for app in repository.apps() {
        let Some(task) = agent.tasks.get(&app.task_id) else {
            continue;
        };
        if task.state != TASK_RUNNING {
            continue;
        }

        let id = format!("{APP_DISPLAY_PREFIX}{}-{}", task.name, task.id);
        let display_name = format!("{APP_DISPLAY_PREFIX}{}", task.name);
        let metrics = &app.metrics;

        let mut dto = EntityDto::new(EntityKind::Application, id, display_name);
        dto.sold = vec![Commodity::new(CommodityKind::Transaction).with_key(&task.name)];
        dto.bought = vec![
            used_only(metrics, CommodityKind::VMem, ResourceType::Mem),
            used_only(metrics, CommodityKind::VCpu, ResourceType::Cpu),
            Commodity::new(CommodityKind::Application).with_key(&task.id),
        ];
        dto.provider = Some(Provider {
            kind: EntityKind::Container,
            id: container_entity_id(&task.id),
        });
        result.push(dto);
    }
    result
}

/// All DTOs for one agent: node, containers, apps.
pub fn build_all(repository: &EntityRepository) -> Vec<EntityDto> {
    let mut entities = vec![build_node_entity(repository)];
    entities.extend(build_container_entities(repository));
    entities.extend(build_app_entities(repository));
    entities
}
