//! Household collections without a recurrence concept.
//!
//! These share the entity envelope and merge rules with care tasks; they only
//! differ in the membership predicate and display order applied to them.

use crate::entity::{impl_entity, EntityId, HouseholdId};
use alloc::string::String;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A location fix reported by the patient's device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationLog {
    pub id: EntityId,
    pub household_id: HouseholdId,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy_m: Option<f64>,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(LocationLog, "location_logs");

/// A geofence around a place the patient is expected to be.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SafeZone {
    pub id: EntityId,
    pub household_id: HouseholdId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
    #[serde(default = "default_active")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(SafeZone, "safe_zones");

impl SafeZone {
    /// Returns true if the point lies inside the zone.
    ///
    /// Uses an equirectangular approximation, which is accurate to well
    /// under a metre at geofence scale.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        const EARTH_RADIUS_M: f64 = 6_371_000.0;
        let to_rad = core::f64::consts::PI / 180.0;
        let mean_lat = (self.latitude + latitude) / 2.0 * to_rad;
        let dx = (longitude - self.longitude) * to_rad * cos_approx(mean_lat);
        let dy = (latitude - self.latitude) * to_rad;
        let dist_sq = (dx * dx + dy * dy) * EARTH_RADIUS_M * EARTH_RADIUS_M;
        dist_sq <= self.radius_m * self.radius_m
    }
}

// Taylor series for cos on [-pi/2, pi/2], enough for latitude scaling without libm.
fn cos_approx(x: f64) -> f64 {
    let x2 = x * x;
    1.0 - x2 / 2.0 + x2 * x2 / 24.0 - x2 * x2 * x2 / 720.0 + x2 * x2 * x2 * x2 / 40320.0
}

/// Something that needs a caregiver's attention.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: EntityId,
    pub household_id: HouseholdId,
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub acknowledged_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Alert, "alerts");

/// The patient's daily check-in. At most one per household per day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: EntityId,
    pub household_id: HouseholdId,
    pub date: NaiveDate,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(CheckIn, "check_ins");

impl CheckIn {
    /// Conflict target for upserts.
    pub const CONFLICT_KEY: &'static str = "household_id,date";
}

/// Upsert payload for a check-in.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckInDraft {
    pub household_id: HouseholdId,
    pub date: NaiveDate,
    pub mood: Option<String>,
    pub note: Option<String>,
}

/// A free-form journal entry written by a caregiver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: EntityId,
    pub household_id: HouseholdId,
    #[serde(default)]
    pub author: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(JournalEntry, "journal_entries");

/// Insert payload for a journal entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JournalDraft {
    pub household_id: HouseholdId,
    pub author: Option<String>,
    pub content: String,
}

fn default_active() -> bool {
    true
}
