//! Change-stream payloads.
//!
//! The remote store delivers `{eventType, new, old}` notifications whose row
//! shape depends on the table. `RawChange` is that payload as received;
//! `ChangeEvent<E>` is the typed form the reconciliation engine matches on.

use crate::entity::{Entity, EntityId};
use crate::error::{Error, Result};
use alloc::format;
use alloc::string::String;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of row change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A change notification as delivered by the transport.
///
/// `new` carries the full row for INSERT/UPDATE. `old` carries at least the
/// primary key for DELETE. Absent images are sent as `{}` by some
/// transports; both forms are treated as missing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawChange {
    #[serde(rename = "eventType")]
    pub event_type: ChangeKind,
    pub table: String,
    #[serde(default)]
    pub new: Option<Value>,
    #[serde(default)]
    pub old: Option<Value>,
}

impl RawChange {
    /// Builds an INSERT notification for a row.
    pub fn insert(table: impl Into<String>, row: Value) -> Self {
        Self {
            event_type: ChangeKind::Insert,
            table: table.into(),
            new: Some(row),
            old: None,
        }
    }

    /// Builds an UPDATE notification for a row.
    pub fn update(table: impl Into<String>, row: Value, old: Option<Value>) -> Self {
        Self {
            event_type: ChangeKind::Update,
            table: table.into(),
            new: Some(row),
            old,
        }
    }

    /// Builds a DELETE notification from the removed row (or its key).
    pub fn delete(table: impl Into<String>, old: Value) -> Self {
        Self {
            event_type: ChangeKind::Delete,
            table: table.into(),
            new: None,
            old: Some(old),
        }
    }

    fn new_image(&self) -> Option<&Value> {
        self.new.as_ref().filter(|v| !is_empty_image(v))
    }

    fn old_image(&self) -> Option<&Value> {
        self.old.as_ref().filter(|v| !is_empty_image(v))
    }

    /// Decodes this payload into a typed event for entity `E`.
    pub fn decode<E: Entity>(&self) -> Result<ChangeEvent<E>> {
        if self.table != E::TABLE {
            return Err(Error::decode(
                E::TABLE,
                format!("change for table {} routed to {}", self.table, E::TABLE),
            ));
        }
        match self.event_type {
            ChangeKind::Insert => self.decode_new::<E>().map(ChangeEvent::Insert),
            ChangeKind::Update => self.decode_new::<E>().map(ChangeEvent::Update),
            ChangeKind::Delete => {
                let old = self
                    .old_image()
                    .ok_or_else(|| Error::decode(E::TABLE, "DELETE without old row"))?;
                let id = old
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::decode(E::TABLE, "DELETE old row without id"))?;
                Ok(ChangeEvent::Delete(EntityId::from(id)))
            }
        }
    }

    fn decode_new<E: Entity>(&self) -> Result<E> {
        let row = self
            .new_image()
            .ok_or_else(|| Error::decode(E::TABLE, format!("{:?} without new row", self.event_type)))?;
        decode_row(row)
    }
}

/// Decodes one row into an entity, attributing failures to `E`'s table.
pub fn decode_row<E: Entity>(row: &Value) -> Result<E> {
    E::deserialize(row).map_err(|e| Error::decode(E::TABLE, format!("{}", e)))
}

fn is_empty_image(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// A typed change to one entity.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeEvent<E> {
    Insert(E),
    Update(E),
    Delete(EntityId),
}

impl<E: Entity> ChangeEvent<E> {
    /// Returns the id of the entity this event is about.
    pub fn id(&self) -> &EntityId {
        match self {
            ChangeEvent::Insert(e) | ChangeEvent::Update(e) => e.id(),
            ChangeEvent::Delete(id) => id,
        }
    }

    /// Returns the kind of change.
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Insert(_) => ChangeKind::Insert,
            ChangeEvent::Update(_) => ChangeKind::Update,
            ChangeEvent::Delete(_) => ChangeKind::Delete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Alert;
    use serde_json::json;

    fn alert_row(id: &str) -> Value {
        json!({
            "id": id,
            "household_id": "h1",
            "kind": "fall",
            "message": "Possible fall",
            "created_at": "2024-05-06T08:00:00Z",
            "updated_at": "2024-05-06T08:00:00Z"
        })
    }

    #[test]
    fn test_decode_insert() {
        let raw = RawChange::insert("alerts", alert_row("a1"));
        let event = raw.decode::<Alert>().unwrap();
        assert_eq!(event.kind(), ChangeKind::Insert);
        assert_eq!(event.id().as_str(), "a1");
    }

    #[test]
    fn test_decode_delete_uses_old_key() {
        let raw: RawChange = serde_json::from_value(json!({
            "eventType": "DELETE",
            "table": "alerts",
            "new": {},
            "old": { "id": "a9" }
        }))
        .unwrap();
        assert_eq!(
            raw.decode::<Alert>().unwrap(),
            ChangeEvent::Delete(EntityId::from("a9"))
        );
    }

    #[test]
    fn test_decode_update_with_empty_new_fails() {
        let raw: RawChange = serde_json::from_value(json!({
            "eventType": "UPDATE",
            "table": "alerts",
            "new": {},
            "old": {}
        }))
        .unwrap();
        assert!(matches!(raw.decode::<Alert>(), Err(Error::Decode { .. })));
    }

    #[test]
    fn test_decode_rejects_other_table() {
        let raw = RawChange::insert("care_tasks", alert_row("a1"));
        assert!(raw.decode::<Alert>().is_err());
    }

    #[test]
    fn test_decode_malformed_row() {
        let raw = RawChange::insert("alerts", json!({ "id": "a1" }));
        let err = raw.decode::<Alert>().unwrap_err();
        assert!(matches!(err, Error::Decode { ref table, .. } if table == "alerts"));
    }
}
