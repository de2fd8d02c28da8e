use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use veg_utils::ids::underscore_whitespace;

/// A taxon, unique by exact scientific name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Species {
    pub id: String,
    pub scientific_name: String,
    pub common_name: String,
    pub growth_form: String,
    pub family: Option<String>,
}

impl Species {
    /// "Shorea robusta" -> "species_Shorea_robusta"
    pub fn id_for(scientific_name: &str) -> String {
        format!("species_{}", underscore_whitespace(scientific_name))
    }
}

/// A single observation line: one tree, or one herb/floor cover reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesRecord {
    pub id: String,
    pub species_id: String,
    pub plot_id: String,
    pub quadrant_id: Option<String>,
    pub subplot_id: Option<String>,
    pub tree_id: Option<String>,
    /// Height in metres
    pub height: Option<f64>,
    /// Girth at breast height, cm
    pub gbh: Option<f64>,
    pub total_gbh: Option<f64>,
    pub cover_percentage: Option<f64>,
    /// Average height in cm
    pub avg_height: Option<f64>,
    pub stems: Option<u32>,
    pub condition: Option<String>,
    pub notes: Option<String>,
    pub timestamp: DateTime<Utc>,
}
