//! Two-cycle raw statistics cache
//!
//! CPU usage is exposed by agents only as monotonically increasing
//! system/user seconds, so rates need the previous cycle's counters and
//! timestamp. Exactly two cycles are ever retained: the map is replaced
//! wholesale at the end of each successful cycle, which also evicts agents
//! and tasks that disappeared.
//!
//! Single writer (the orchestrator, after all workers complete), many
//! readers (workers during the cycle); the two never overlap.

use crate::models::Statistics;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// Per-agent, per-task raw counters as of one cycle.
pub type CycleCounters = HashMap<String, HashMap<String, Statistics>>;

#[derive(Default)]
struct CacheState {
    last_cycle: Option<DateTime<Utc>>,
    node_stats: CycleCounters,
}

#[derive(Default)]
pub struct RawStatsCache {
    inner: RwLock<CacheState>,
}

impl RawStatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The previous cycle's counters for a task, with the cycle timestamp.
    /// `None` on the first cycle or when the agent/task is new.
    pub fn previous(&self, agent_id: &str, task_id: &str) -> Option<(Statistics, DateTime<Utc>)> {
        let state = self.inner.read().expect("stats cache lock poisoned");
        let at = state.last_cycle?;
        let stats = state.node_stats.get(agent_id)?.get(task_id)?;
        Some((*stats, at))
    }

    pub fn last_cycle_time(&self) -> Option<DateTime<Utc>> {
        self.inner.read().expect("stats cache lock poisoned").last_cycle
    }

    /// Replace the whole cache with this cycle's counters, stamped now.
    pub fn refresh(&self, counters: CycleCounters) {
        self.refresh_at(Utc::now(), counters);
    }

    pub(crate) fn refresh_at(&self, at: DateTime<Utc>, counters: CycleCounters) {
        let mut state = self.inner.write().expect("stats cache lock poisoned");
        state.last_cycle = Some(at);
        state.node_stats = counters;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn counters_for(agent_id: &str, task_id: &str, system_secs: f64) -> CycleCounters {
        let stats = Statistics {
            cpus_system_time_secs: system_secs,
            ..Default::default()
        };
        HashMap::from([(
            agent_id.to_string(),
            HashMap::from([(task_id.to_string(), stats)]),
        )])
    }

    #[test]
    fn empty_cache_has_no_previous_counters() {
        let cache = RawStatsCache::new();
        assert!(cache.previous("a1", "t1").is_none());
        assert!(cache.last_cycle_time().is_none());
    }

    #[test]
    fn refresh_stores_counters_with_timestamp() {
        let cache = RawStatsCache::new();
        cache.refresh(counters_for("a1", "t1", 10.0));

        let (stats, at) = cache.previous("a1", "t1").unwrap();
        assert_eq!(stats.cpus_system_time_secs, 10.0);
        assert_eq!(cache.last_cycle_time(), Some(at));
        assert!(cache.previous("a1", "t2").is_none());
        assert!(cache.previous("a2", "t1").is_none());
    }

    #[test]
    fn refresh_evicts_vanished_agents() {
        let cache = RawStatsCache::new();
        cache.refresh(counters_for("a1", "t1", 10.0));
        cache.refresh(counters_for("a2", "t9", 3.0));

        assert!(cache.previous("a1", "t1").is_none());
        assert!(cache.previous("a2", "t9").is_some());
    }

    #[test]
    fn cycle_timestamp_is_monotonic() {
        let cache = RawStatsCache::new();
        let first = Utc::now() - Duration::seconds(30);
        cache.refresh_at(first, CycleCounters::new());
        cache.refresh(CycleCounters::new());
        assert!(cache.last_cycle_time().unwrap() >= first);
    }
}
