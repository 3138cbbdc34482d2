//! Client configuration.

use carelink_core::{Error, Result};
use carelink_recurrence::OneTimeMatch;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Settings shared by every collection mounted on a connection.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use carelink_client::ClientConfig;
///
/// let config = ClientConfig::from_json(r#"{"journal_page_size": 50}"#).unwrap();
/// assert_eq!(config.journal_page_size, 50);
/// assert_eq!(config.channel_prefix, "carelink");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Rows per journal page.
    pub journal_page_size: usize,
    /// First segment of every channel name.
    pub channel_prefix: String,
    /// How one-time tasks match a day.
    pub one_time_match: OneTimeMatch,
    /// Queue change events while a snapshot is loading and replay them on
    /// top of it. When off, events are merged into the stale collection and
    /// then overwritten by the snapshot.
    pub buffer_during_load: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            journal_page_size: 20,
            channel_prefix: "carelink".to_string(),
            one_time_match: OneTimeMatch::SameWeekday,
            buffer_during_load: true,
        }
    }
}

impl ClientConfig {
    /// Parses a JSON config document, filling omitted fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ClientConfig =
            serde_json::from_str(json).map_err(|e| Error::invalid_record(format!("client config: {}", e)))?;
        config.validate()?;
        debug!(?config, "client config loaded");
        Ok(config)
    }

    /// Checks values the type system can't.
    pub fn validate(&self) -> Result<()> {
        if self.journal_page_size == 0 {
            return Err(Error::invalid_record("journal_page_size must be at least 1"));
        }
        if self.channel_prefix.is_empty() || self.channel_prefix.contains(':') {
            return Err(Error::invalid_record(
                "channel_prefix must be non-empty and must not contain ':'",
            ));
        }
        Ok(())
    }
}
