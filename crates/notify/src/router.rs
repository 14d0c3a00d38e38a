use std::collections::BTreeMap;

/// Assignee display name → Discord channel id.
#[derive(Debug, Clone, Default)]
pub struct ChannelRouter {
    channels: BTreeMap<String, String>,
}

impl ChannelRouter {
    pub fn new(channels: BTreeMap<String, String>) -> Self {
        Self { channels }
    }

    /// Exact-match lookup. Unknown assignees have no route.
    pub fn route(&self, assignee: &str) -> Option<&str> {
        self.channels.get(assignee).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
