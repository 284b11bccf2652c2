//! Address construction under the configured topic root.

/// Inbound configuration commands.
pub const SETTINGS_SET: &str = "settings/set";
/// Inbound live-state commands.
pub const STATE_SET: &str = "state/set";
/// Outbound configuration aggregate.
pub const SETTINGS: &str = "settings";
/// Outbound live-state aggregate.
pub const STATE: &str = "state";
/// Outbound status token.
pub const STATUS: &str = "status";

/// Which command an inbound address carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTopic {
    Settings,
    State,
}

/// Builds `<root>/<suffix>` addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicResolver {
    root: String,
}

impl TopicResolver {
    /// Trailing slashes on `root` are dropped.
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        Self {
            root: root.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Joins `suffix` onto the root with exactly one separator.
    pub fn resolve(&self, suffix: &str) -> String {
        format!("{}/{}", self.root, suffix.trim_start_matches('/'))
    }

    /// Inbound configuration commands.
    pub fn settings_set(&self) -> String {
        self.resolve(SETTINGS_SET)
    }

    /// Inbound live-state commands.
    pub fn state_set(&self) -> String {
        self.resolve(STATE_SET)
    }

    /// Outbound configuration document.
    pub fn settings(&self) -> String {
        self.resolve(SETTINGS)
    }

    /// Outbound live-state document.
    pub fn state(&self) -> String {
        self.resolve(STATE)
    }

    /// Status token, shared with the last will.
    pub fn status(&self) -> String {
        self.resolve(STATUS)
    }

    /// Maps an inbound address back to the command it carries.
    pub fn command_for(&self, topic: &str) -> Option<CommandTopic> {
        let suffix = topic.strip_prefix(&self.root)?.strip_prefix('/')?;
        match suffix {
            SETTINGS_SET => Some(CommandTopic::Settings),
            STATE_SET => Some(CommandTopic::State),
            _ => None,
        }
    }
}
