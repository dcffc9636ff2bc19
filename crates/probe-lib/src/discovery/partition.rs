//! Agent fleet partitioning
//!
//! Splits the agent list into groups, one discovery worker per group. The
//! group is the unit of HTTP fan-out: agents within a group are polled
//! sequentially, groups run in parallel.

/// Workers used when no strategy is configured.
pub const DEFAULT_WORKER_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionStrategy {
    /// One group per agent: maximum parallelism, maximum fan-out.
    OnePerAgent,
    /// Groups of at most this many agents.
    FixedAgentsPerGroup(usize),
    /// Exactly `min(N, count)` groups; any remainder joins the first group.
    FixedWorkerCount(usize),
}

impl Default for PartitionStrategy {
    fn default() -> Self {
        PartitionStrategy::FixedWorkerCount(DEFAULT_WORKER_COUNT)
    }
}

impl PartitionStrategy {
    /// Partition `items` into non-empty groups. Deterministic for a given
    /// input order; the union of the groups is exactly the input.
    pub fn split<T>(&self, items: Vec<T>) -> Vec<Vec<T>> {
        if items.is_empty() {
            return Vec::new();
        }
        match *self {
            PartitionStrategy::OnePerAgent => items.into_iter().map(|item| vec![item]).collect(),
            PartitionStrategy::FixedAgentsPerGroup(size) => {
                let size = size.max(1);
                let mut groups = Vec::new();
                let mut current = Vec::with_capacity(size);
                for item in items {
                    current.push(item);
                    if current.len() == size {
                        groups.push(std::mem::take(&mut current));
                    }
                }
                if !current.is_empty() {
                    groups.push(current);
                }
                groups
            }
            PartitionStrategy::FixedWorkerCount(count) => {
                let group_count = count.max(1).min(items.len());
                let base_size = items.len() / group_count;
                let mut items = items.into_iter();

                let mut groups: Vec<Vec<T>> = (0..group_count)
                    .map(|_| items.by_ref().take(base_size).collect())
                    .collect();
                // remainder joins the first group
                groups[0].extend(items);
                groups
            }
        }
    }
}
