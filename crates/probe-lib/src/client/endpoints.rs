//! Vendor endpoint stores
//!
//! All vendor differences between Apache Mesos and DC/OS are confined to
//! these path tables. Clients index the store by logical endpoint name and
//! never branch on vendor at call sites.

use crate::config::MesosVendor;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MasterEndpointName {
    Login,
    State,
    Frameworks,
    Tasks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentEndpointName {
    Stats,
}

/// REST paths for one vendor's masters and agents.
#[derive(Debug, Clone)]
pub struct EndpointStore {
    master: HashMap<MasterEndpointName, &'static str>,
    agent: HashMap<AgentEndpointName, &'static str>,
}

impl EndpointStore {
    /// Apache Mesos paths. There is no login endpoint.
    pub fn apache() -> Self {
        let master = HashMap::from([
            (MasterEndpointName::State, "/state"),
            (MasterEndpointName::Frameworks, "/frameworks"),
            (MasterEndpointName::Tasks, "/tasks"),
        ]);
        let agent = HashMap::from([(AgentEndpointName::Stats, "/monitor/statistics.json")]);
        Self { master, agent }
    }

    /// DC/OS paths: mesos endpoints behind the `/mesos` gateway prefix plus
    /// the ACS login endpoint.
    pub fn dcos() -> Self {
        let master = HashMap::from([
            (MasterEndpointName::Login, "/acs/api/v1/auth/login"),
            (MasterEndpointName::State, "/mesos/state"),
            (MasterEndpointName::Frameworks, "/mesos/frameworks"),
            (MasterEndpointName::Tasks, "/mesos/tasks"),
        ]);
        let agent = HashMap::from([(AgentEndpointName::Stats, "/monitor/statistics.json")]);
        Self { master, agent }
    }

    pub fn for_vendor(vendor: MesosVendor) -> Self {
        match vendor {
            MesosVendor::Apache => Self::apache(),
            MesosVendor::Dcos => Self::dcos(),
        }
    }

    pub fn master_path(&self, name: MasterEndpointName) -> Option<&'static str> {
        self.master.get(&name).copied()
    }

    pub fn agent_path(&self, name: AgentEndpointName) -> Option<&'static str> {
        self.agent.get(&name).copied()
    }
}
