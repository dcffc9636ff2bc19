//! Metric metadata store
//!
//! A process-wide, read-only table binding `(entity type, resource, metric
//! kind)` triples to setter capabilities. Collectors iterate the registered
//! definitions and write through the setters instead of hard-coding
//! per-field assignments, so adding a new metric source is a registration,
//! not a worker change.

use crate::repository::{EntityType, MetricKind, RepositoryEntity, ResourceType};
use std::collections::HashMap;
use tracing::{error, warn};

/// Capability that writes one metric value into an entity.
pub trait MetricSetter: Send + Sync {
    fn set(&self, entity: &mut dyn RepositoryEntity, value: f64);
}

/// Setter that writes through the entity's metric map after verifying the
/// entity's declared type. A mismatch is logged and the write dropped.
pub struct DefaultMetricSetter {
    entity_type: EntityType,
    resource: ResourceType,
    kind: MetricKind,
}

impl DefaultMetricSetter {
    pub fn new(entity_type: EntityType, resource: ResourceType, kind: MetricKind) -> Self {
        Self {
            entity_type,
            resource,
            kind,
        }
    }
}

impl MetricSetter for DefaultMetricSetter {
    fn set(&self, entity: &mut dyn RepositoryEntity, value: f64) {
        if entity.entity_type() != self.entity_type {
            error!(
                entity_id = %entity.id(),
                actual = ?entity.entity_type(),
                required = ?self.entity_type,
                "metric setter applied to wrong entity type, dropping write"
            );
            return;
        }
        entity.metrics_mut().set(self.resource, self.kind, value);
    }
}

/// Metadata for one metric a collector must populate.
pub struct MetricDef {
    pub entity_type: EntityType,
    pub resource: ResourceType,
    pub kind: MetricKind,
    setter: Box<dyn MetricSetter>,
}

impl MetricDef {
    pub fn new(
        entity_type: EntityType,
        resource: ResourceType,
        kind: MetricKind,
        setter: Box<dyn MetricSetter>,
    ) -> Self {
        Self {
            entity_type,
            resource,
            kind,
            setter,
        }
    }
}

const ENTITY_TYPES: [EntityType; 3] = [EntityType::Node, EntityType::Container, EntityType::App];
const RESOURCE_TYPES: [ResourceType; 4] = [
    ResourceType::Cpu,
    ResourceType::Mem,
    ResourceType::CpuProvisioned,
    ResourceType::MemProvisioned,
];
const METRIC_KINDS: [MetricKind; 2] = [MetricKind::Capacity, MetricKind::Used];

/// Immutable after construction; safe to share across workers without
/// synchronization.
pub struct MetricsMetadataStore {
    defs: HashMap<(EntityType, ResourceType, MetricKind), MetricDef>,
}

impl MetricsMetadataStore {
    /// Populate the full cross-product of default metric definitions.
    pub fn new() -> Self {
        let mut store = Self {
            defs: HashMap::new(),
        };
        for entity_type in ENTITY_TYPES {
            for resource in RESOURCE_TYPES {
                for kind in METRIC_KINDS {
                    store.register(MetricDef::new(
                        entity_type,
                        resource,
                        kind,
                        Box::new(DefaultMetricSetter::new(entity_type, resource, kind)),
                    ));
                }
            }
        }
        store
    }

    /// Register (or replace) a metric definition. Alternate collector
    /// sources publish their setters here.
    pub fn register(&mut self, def: MetricDef) {
        self.defs
            .insert((def.entity_type, def.resource, def.kind), def);
    }

    pub fn get(
        &self,
        entity_type: EntityType,
        resource: ResourceType,
        kind: MetricKind,
    ) -> Option<&MetricDef> {
        self.defs.get(&(entity_type, resource, kind))
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Write one metric value through the registered setter for the
    /// entity's type. Returns false when no definition is registered.
    pub fn set_value(
        &self,
        entity: &mut dyn RepositoryEntity,
        resource: ResourceType,
        kind: MetricKind,
        value: f64,
    ) -> bool {
        match self.get(entity.entity_type(), resource, kind) {
            Some(def) => {
                def.setter.set(entity, value);
                true
            }
            None => {
                warn!(
                    entity_id = %entity.id(),
                    entity_type = ?entity.entity_type(),
                    resource = ?resource,
                    kind = ?kind,
                    "no metric definition registered"
                );
                false
            }
        }
    }
}

impl Default for MetricsMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}
