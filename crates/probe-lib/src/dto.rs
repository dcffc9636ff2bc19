//! Logical output entities
//!
//! The probe emits a graph of nodes, containers and apps with commodity
//! values and structural links. A boundary adapter owned by the upstream
//! session serializes these into the server's DTO format; nothing in this
//! module depends on that encoding.

use serde::Serialize;

pub const DEFAULT_NAMESPACE: &str = "DEFAULT";
/// Node IP property used for proxy-VM stitching. A dedicated property name
/// keeps the server's own IP record intact during reconciliation.
pub const PROXY_VM_IP_PROPERTY: &str = "Proxy_VM_IP";
pub const IP_ADDRESS_PROPERTY: &str = "ipAddress";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityKind {
    VirtualMachine,
    Container,
    Application,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommodityKind {
    VCpu,
    VMem,
    CpuProvisioned,
    MemProvisioned,
    Cluster,
    Application,
    Transaction,
    VmpmAccess,
}

/// One commodity sold or bought by an entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Commodity {
    pub kind: CommodityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<f64>,
}

impl Commodity {
    pub fn new(kind: CommodityKind) -> Self {
        Self {
            kind,
            key: None,
            capacity: None,
            used: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_used(mut self, used: f64) -> Self {
        self.used = Some(used);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityProperty {
    pub namespace: String,
    pub name: String,
    pub value: String,
}

impl EntityProperty {
    pub fn in_default_namespace(name: &str, value: impl Into<String>) -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// Hosting link to another emitted entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provider {
    pub kind: EntityKind,
    pub id: String,
}

/// Tells the upstream server which sold commodities to patch when merging
/// this proxy entity with its own inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationHint {
    pub matching_property: String,
    pub patched_commodities: Vec<CommodityKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDto {
    pub kind: EntityKind,
    pub id: String,
    pub display_name: String,
    pub sold: Vec<Commodity>,
    pub bought: Vec<Commodity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    pub properties: Vec<EntityProperty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<ReconciliationHint>,
}

impl EntityDto {
    pub fn new(kind: EntityKind, id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            display_name: display_name.into(),
            sold: Vec::new(),
            bought: Vec::new(),
            provider: None,
            properties: Vec::new(),
            reconciliation: None,
        }
    }

    pub fn sold_commodity(&self, kind: CommodityKind) -> Option<&Commodity> {
        self.sold.iter().find(|c| c.kind == kind)
    }

    pub fn bought_commodity(&self, kind: CommodityKind) -> Option<&Commodity> {
        self.bought.iter().find(|c| c.kind == kind)
    }
}
