//! Mesos master leader tracking
//!
//! Given the unordered master list from the target configuration, finds the
//! live leader, authenticates against it, and keeps a single "current
//! leader" client for downstream work. A single reachable non-leader master
//! is enough to learn the leader's identity from its state document, so the
//! tracker converges in one extra hop on leader change instead of rescanning
//! the whole list.
//!
//! The tracker lives for the process lifetime and is driven only from the
//! orchestrator's task; no internal synchronization is required.

use crate::client::{MasterConf, MasterRestClient, RestClientFactory};
use crate::config::TargetConfig;
use crate::error::{Error, Result};
use crate::models::StateResponse;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One master endpoint known to the tracker.
#[derive(Debug, Clone)]
pub struct MasterEndpoint {
    pub ip: String,
    pub port: String,
    /// Session token from the last successful login against this master.
    pub token: Option<String>,
}

impl MasterEndpoint {
    fn key(&self) -> String {
        if self.port.is_empty() {
            self.ip.clone()
        } else {
            format!("{}:{}", self.ip, self.port)
        }
    }
}

struct CurrentLeader {
    endpoint: MasterEndpoint,
    client: Box<dyn MasterRestClient>,
}

/// Tracks the live leader among the configured master endpoints.
pub struct LeaderTracker {
    config: TargetConfig,
    factory: Arc<dyn RestClientFactory>,
    /// Keyed by `ip:port`; BTreeMap so elections probe in a stable order.
    endpoints: BTreeMap<String, MasterEndpoint>,
    current: Option<CurrentLeader>,
    last_state: Option<StateResponse>,
}

impl LeaderTracker {
    pub fn new(config: TargetConfig, factory: Arc<dyn RestClientFactory>) -> Result<Self> {
        config.validate()?;
        let mut endpoints = BTreeMap::new();
        for addr in config.master_addresses() {
            let endpoint = MasterEndpoint {
                ip: addr.ip,
                port: addr.port,
                token: None,
            };
            endpoints.insert(endpoint.key(), endpoint);
        }
        if endpoints.is_empty() {
            return Err(Error::Config("no master endpoints configured".to_string()));
        }
        Ok(Self {
            config,
            factory,
            endpoints,
            current: None,
            last_state: None,
        })
    }

    /// The endpoint currently believed to be the leader.
    pub fn current_leader(&self) -> Option<&MasterEndpoint> {
        self.current.as_ref().map(|c| &c.endpoint)
    }

    /// Session token of the current leader's client, shared with agent
    /// clients for the duration of a cycle.
    pub fn token(&self) -> Option<String> {
        self.current
            .as_ref()
            .and_then(|c| c.client.token().map(str::to_string))
    }

    pub fn last_state(&self) -> Option<&StateResponse> {
        self.last_state.as_ref()
    }

    /// Re-authenticate against the current leader, electing a new one when
    /// there is none or the login is rejected.
    pub async fn refresh_login(&mut self) -> Result<()> {
        if let Some(current) = self.current.as_mut() {
            match current.client.login().await {
                Ok(token) => {
                    current.endpoint.token = Some(token.clone());
                    let key = current.endpoint.key();
                    if let Some(entry) = self.endpoints.get_mut(&key) {
                        entry.token = Some(token);
                    }
                    return Ok(());
                }
                Err(err) => {
                    warn!(leader = %current.endpoint.ip, error = %err,
                          "login against current leader failed, re-electing");
                }
            }
        }
        self.elect().await.map(|_| ())
    }

    /// Fetch the cluster state from the current leader, following a leader
    /// change reported by the document and falling back to a full election
    /// when the leader is gone.
    pub async fn refresh_state(&mut self) -> Result<StateResponse> {
        let (current_ip, result) = match self.current.as_mut() {
            Some(current) => (current.endpoint.ip.clone(), current.client.get_state().await),
            None => return self.elect().await,
        };

        match result {
            Ok(state) => {
                let reported = state.leader_info.hostname.clone();
                if !reported.is_empty() && reported != current_ip {
                    info!(from = %current_ip, to = %reported, "master leader changed");
                    let port = self.reported_port(&state, &current_ip);
                    let token = self.token();
                    self.switch_to(&reported, &port, token);
                }
                self.last_state = Some(state.clone());
                Ok(state)
            }
            Err(err) => {
                warn!(leader = %current_ip, error = %err,
                      "state fetch from current leader failed, re-electing");
                self.elect().await
            }
        }
    }

    /// Probe the endpoint list in order until one master yields a state
    /// document, then trust that document's leader identity.
    async fn elect(&mut self) -> Result<StateResponse> {
        let keys: Vec<String> = self.endpoints.keys().cloned().collect();
        info!(endpoints = keys.len(), "electing mesos leader");

        for key in keys {
            let endpoint = self.endpoints[&key].clone();
            let mut client = self.factory.master_client(self.master_conf(&endpoint));

            let token = match client.login().await {
                Ok(token) => token,
                Err(err) => {
                    debug!(endpoint = %key, error = %err, "login failed, trying next master");
                    continue;
                }
            };

            let state = match client.get_state().await {
                Ok(state) => state,
                Err(err) => {
                    debug!(endpoint = %key, error = %err, "state failed, trying next master");
                    continue;
                }
            };

            let token = (!token.is_empty()).then_some(token);
            let reported = state.leader_info.hostname.clone();
            if reported.is_empty() || reported == endpoint.ip {
                // Some single-master deployments omit leader_info; the probed
                // endpoint itself is the leader.
                let mut endpoint = endpoint;
                endpoint.token = token;
                if let Some(entry) = self.endpoints.get_mut(&key) {
                    entry.token = endpoint.token.clone();
                }
                info!(leader = %endpoint.ip, "detected mesos leader");
                self.current = Some(CurrentLeader { endpoint, client });
            } else {
                let port = self.reported_port(&state, &endpoint.ip);
                info!(probed = %endpoint.ip, leader = %reported, "redirected to mesos leader");
                self.switch_to(&reported, &port, token);
            }
            self.last_state = Some(state.clone());
            return Ok(state);
        }

        Err(Error::LeaderUnavailable(
            self.config.master_ip_port.clone(),
        ))
    }

    /// Port for a leader reported in a state document; the probed endpoint's
    /// port when the document carries none.
    fn reported_port(&self, state: &StateResponse, probed_ip: &str) -> String {
        if state.leader_info.port > 0 {
            state.leader_info.port.to_string()
        } else {
            self.endpoints
                .values()
                .find(|e| e.ip == probed_ip)
                .map(|e| e.port.clone())
                .unwrap_or_default()
        }
    }

    /// Make `ip:port` the current leader, inserting a bare endpoint entry
    /// when it is not in the configured list, and build a fresh client that
    /// carries the session token.
    fn switch_to(&mut self, ip: &str, port: &str, token: Option<String>) {
        let endpoint = MasterEndpoint {
            ip: ip.to_string(),
            port: port.to_string(),
            token: token.clone(),
        };
        let key = endpoint.key();
        self.endpoints
            .entry(key)
            .and_modify(|e| e.token = token.clone())
            .or_insert_with(|| endpoint.clone());

        let client = self.factory.master_client(self.master_conf(&endpoint));
        self.current = Some(CurrentLeader { endpoint, client });
    }

    fn master_conf(&self, endpoint: &MasterEndpoint) -> MasterConf {
        MasterConf {
            vendor: self.config.vendor,
            ip: endpoint.ip.clone(),
            port: endpoint.port.clone(),
            username: self.config.username.clone(),
            password: self.config.password.clone(),
            token: endpoint.token.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{AgentRestClient, MasterConf};
    use crate::config::MesosVendor;
    use crate::models::LeaderInfo;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn state_reporting(hostname: &str, port: u16) -> StateResponse {
        StateResponse {
            id: "master".to_string(),
            leader_info: LeaderInfo {
                hostname: hostname.to_string(),
                port,
                ..Default::default()
            },
            agents: Some(vec![Default::default()]),
            ..Default::default()
        }
    }

    /// Scripted master: login outcome plus a queue of state outcomes
    /// (None stands in for a transport failure).
    struct MasterScript {
        login_ok: bool,
        states: Mutex<Vec<Option<StateResponse>>>,
    }

    impl MasterScript {
        fn ok(states: Vec<Option<StateResponse>>) -> Arc<Self> {
            Arc::new(Self {
                login_ok: true,
                states: Mutex::new(states),
            })
        }

        fn unreachable() -> Arc<Self> {
            Arc::new(Self {
                login_ok: false,
                states: Mutex::new(vec![]),
            })
        }
    }

    struct MockMaster {
        script: Arc<MasterScript>,
        token: Option<String>,
    }

    #[async_trait]
    impl MasterRestClient for MockMaster {
        async fn login(&mut self) -> Result<String> {
            if self.script.login_ok {
                self.token = Some("session-token".to_string());
                Ok("session-token".to_string())
            } else {
                Err(Error::Auth("login rejected".to_string()))
            }
        }

        async fn get_state(&self) -> Result<StateResponse> {
            let mut states = self.script.states.lock().unwrap();
            if states.is_empty() {
                return Err(Error::Protocol {
                    status: 503,
                    message: "unreachable".to_string(),
                });
            }
            match states.remove(0) {
                Some(state) => Ok(state),
                None => Err(Error::Protocol {
                    status: 503,
                    message: "unreachable".to_string(),
                }),
            }
        }

        fn token(&self) -> Option<&str> {
            self.token.as_deref()
        }
    }

    struct MockFactory {
        masters: HashMap<String, Arc<MasterScript>>,
    }

    impl RestClientFactory for MockFactory {
        fn master_client(&self, conf: MasterConf) -> Box<dyn MasterRestClient> {
            let script = self
                .masters
                .get(&conf.ip)
                .cloned()
                .unwrap_or_else(MasterScript::unreachable);
            Box::new(MockMaster {
                script,
                token: conf.token,
            })
        }

        fn agent_client(
            &self,
            _ip: &str,
            _port: &str,
            _token: Option<String>,
        ) -> Box<dyn AgentRestClient> {
            unimplemented!("leader tests never touch agents")
        }
    }

    fn tracker_with(
        masters: HashMap<String, Arc<MasterScript>>,
        list: &str,
    ) -> LeaderTracker {
        let config = TargetConfig {
            vendor: MesosVendor::Dcos,
            master_ip_port: list.to_string(),
            username: "joe".to_string(),
            password: "pw".to_string(),
        };
        LeaderTracker::new(config, Arc::new(MockFactory { masters })).unwrap()
    }

    #[tokio::test]
    async fn election_follows_reported_leader_past_dead_master() {
        // m1 unreachable; m2 answers but names m3 as leader; m3 is live.
        let masters = HashMap::from([
            ("10.0.0.1".to_string(), MasterScript::unreachable()),
            (
                "10.0.0.2".to_string(),
                MasterScript::ok(vec![Some(state_reporting("10.0.0.3", 5050))]),
            ),
            (
                "10.0.0.3".to_string(),
                MasterScript::ok(vec![Some(state_reporting("10.0.0.3", 5050))]),
            ),
        ]);
        let mut tracker =
            tracker_with(masters, "10.0.0.1:5050,10.0.0.2:5050,10.0.0.3:5050");

        tracker.refresh_state().await.unwrap();

        assert_eq!(tracker.current_leader().unwrap().ip, "10.0.0.3");
        // the fresh client against m3 carries the session token
        assert_eq!(tracker.token().as_deref(), Some("session-token"));
    }

    #[tokio::test]
    async fn empty_leader_hostname_adopts_probed_endpoint() {
        let masters = HashMap::from([(
            "10.0.0.1".to_string(),
            MasterScript::ok(vec![Some(state_reporting("", 0))]),
        )]);
        let mut tracker = tracker_with(masters, "10.0.0.1:5050");

        tracker.refresh_state().await.unwrap();
        assert_eq!(tracker.current_leader().unwrap().ip, "10.0.0.1");
    }

    #[tokio::test]
    async fn leader_change_is_followed_between_cycles() {
        // Cycle N: m1 reports itself. Cycle N+1: m1 reports m3.
        let masters = HashMap::from([
            (
                "10.0.0.1".to_string(),
                MasterScript::ok(vec![
                    Some(state_reporting("10.0.0.1", 5050)),
                    Some(state_reporting("10.0.0.3", 5050)),
                ]),
            ),
            (
                "10.0.0.3".to_string(),
                MasterScript::ok(vec![Some(state_reporting("10.0.0.3", 5050))]),
            ),
        ]);
        let mut tracker = tracker_with(masters, "10.0.0.1:5050,10.0.0.2:5050");

        tracker.refresh_state().await.unwrap();
        assert_eq!(tracker.current_leader().unwrap().ip, "10.0.0.1");

        tracker.refresh_state().await.unwrap();
        assert_eq!(tracker.current_leader().unwrap().ip, "10.0.0.3");
        // m3 was not configured; it was inserted into the endpoint map
        assert!(tracker.endpoints.contains_key("10.0.0.3:5050"));
    }

    #[tokio::test]
    async fn exhausted_endpoints_report_leader_unavailable() {
        let masters = HashMap::from([
            ("10.0.0.1".to_string(), MasterScript::unreachable()),
            ("10.0.0.2".to_string(), MasterScript::unreachable()),
        ]);
        let mut tracker = tracker_with(masters, "10.0.0.1:5050,10.0.0.2:5050");

        let err = tracker.refresh_state().await.unwrap_err();
        assert!(matches!(err, Error::LeaderUnavailable(_)));
    }

    #[tokio::test]
    async fn failed_state_fetch_triggers_re_election() {
        // m1 serves one state then dies; m2 takes over.
        let masters = HashMap::from([
            (
                "10.0.0.1".to_string(),
                MasterScript::ok(vec![Some(state_reporting("10.0.0.1", 5050)), None]),
            ),
            (
                "10.0.0.2".to_string(),
                MasterScript::ok(vec![Some(state_reporting("10.0.0.2", 5050))]),
            ),
        ]);
        let mut tracker = tracker_with(masters, "10.0.0.1:5050,10.0.0.2:5050");

        tracker.refresh_state().await.unwrap();
        assert_eq!(tracker.current_leader().unwrap().ip, "10.0.0.1");

        tracker.refresh_state().await.unwrap();
        assert_eq!(tracker.current_leader().unwrap().ip, "10.0.0.2");
    }

    #[tokio::test]
    async fn refresh_login_elects_when_no_current_leader() {
        let masters = HashMap::from([(
            "10.0.0.1".to_string(),
            MasterScript::ok(vec![Some(state_reporting("10.0.0.1", 5050))]),
        )]);
        let mut tracker = tracker_with(masters, "10.0.0.1:5050");

        tracker.refresh_login().await.unwrap();
        assert!(tracker.current_leader().is_some());
        assert!(tracker.last_state().is_some());
    }
}
