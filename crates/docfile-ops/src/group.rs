//! Batch group ids.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::progress::OperationClass;

static GROUP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Id of a deferred batch group on the data client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchGroupId(String);

impl BatchGroupId {
    /// Mint a process-unique id for one operation class of one cycle.
    ///
    /// The millisecond timestamp keeps ids readable in server logs; the
    /// sequence number keeps ids minted within the same millisecond apart.
    pub fn mint(prefix: &str, class: OperationClass) -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let sequence = GROUP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self(format!("{prefix}_{}_{millis}_{sequence}", class.group_tag()))
    }

    /// Change-set id of the request at `index` within this group.
    pub fn change_set(&self, index: usize) -> String {
        format!("{}_{index}", self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
