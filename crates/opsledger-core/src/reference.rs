//! Create requests for reference data.
//!
//! Clock times arrive as `HH:MM` or `HH:MM:SS` strings and are checked by
//! [`crate::validation`] before anything is stored.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTenant {
    pub name: String,
    #[serde(default = "default_active")]
    pub status: String,
}

fn default_active() -> String {
    "ACTIVE".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLocation {
    pub tenant_id: i64,
    pub name: String,
    pub timezone: String,
    pub currency_code: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Replaces a location's whole weekly schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationHoursInput {
    pub tenant_id: i64,
    /// Shared by every weekday row; 05:00 when omitted.
    #[serde(default)]
    pub business_day_cutover_local: Option<String>,
    pub days: Vec<DayHoursInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayHoursInput {
    pub day_of_week: i64,
    #[serde(default)]
    pub open_local: Option<String>,
    #[serde(default)]
    pub close_local: Option<String>,
    #[serde(default)]
    pub is_closed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHoursException {
    pub tenant_id: i64,
    pub date_local: NaiveDate,
    #[serde(default)]
    pub open_local: Option<String>,
    #[serde(default)]
    pub close_local: Option<String>,
    #[serde(default)]
    pub is_closed: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSourceSystem {
    pub tenant_id: i64,
    #[serde(rename = "type")]
    pub system_type: String,
    #[serde(default)]
    pub provider: Option<String>,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    pub tenant_id: i64,
    pub item_name: String,
    #[serde(default = "default_item_type")]
    pub item_type: String,
    #[serde(default)]
    pub base_uom: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_item_type() -> String {
    "MENU_ITEM".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItemExternalKey {
    pub tenant_id: i64,
    pub item_id: i64,
    pub source_system_id: i64,
    pub external_item_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChannelMapping {
    pub tenant_id: i64,
    #[serde(default)]
    pub provider: Option<String>,
    pub source_channel_code: String,
    #[serde(default)]
    pub source_channel_name: Option<String>,
    pub normalized_channel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEmployee {
    pub tenant_id: i64,
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub external_key: Option<String>,
    pub full_name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}
