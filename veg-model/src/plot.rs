use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fixed-size ground survey unit (commonly 10x10 m), e.g. "P01".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plot {
    pub id: String,
    pub plot_id: String,
    pub location_name: String,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Elevation in metres
    pub elevation: Option<f64>,
    /// e.g. "10x10m"
    pub size: Option<String>,
    pub habitat_type: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plot {
    pub fn id_for(plot_id: &str) -> String {
        format!("plot_{}", plot_id)
    }

    /// A plot as first seen in survey data.
    pub fn new(plot_id: &str, location_name: &str, at: DateTime<Utc>) -> Plot {
        Plot {
            id: Plot::id_for(plot_id),
            plot_id: plot_id.to_string(),
            location_name: location_name.to_string(),
            description: Some(format!("Plot {} data", plot_id)),
            latitude: None,
            longitude: None,
            elevation: None,
            size: None,
            habitat_type: None,
            notes: None,
            created_at: at,
            updated_at: at,
        }
    }
}

/// One quarter of a plot, labelled Q1-Q4 in practice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quadrant {
    pub id: String,
    pub plot_id: String,
    pub quadrant_id: String,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quadrant {
    pub fn id_for(plot_id: &str, quadrant_id: &str) -> String {
        format!("quad_{}_{}", plot_id, quadrant_id)
    }

    pub fn new(plot_id: &str, quadrant_id: &str, at: DateTime<Utc>) -> Quadrant {
        Quadrant {
            id: Quadrant::id_for(plot_id, quadrant_id),
            plot_id: plot_id.to_string(),
            quadrant_id: quadrant_id.to_string(),
            description: Some(format!("{} quadrant of {}", quadrant_id, plot_id)),
            notes: None,
            created_at: at,
            updated_at: at,
        }
    }
}

/// A nested herb/floor sampling unit, SP1-SP4.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subplot {
    pub id: String,
    pub plot_id: String,
    pub quadrant_id: String,
    pub subplot_id: String,
    /// Herb, Grass, Litter, Bare Soil, Shrub, Tree, ...
    pub layer_type: String,
    pub species_category: Option<String>,
    pub cover_percentage: Option<f64>,
    /// Average height in cm
    pub avg_height: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subplot {
    pub fn id_for(plot_id: &str, subplot_id: &str) -> String {
        format!("subplot_{}_{}", plot_id, subplot_id)
    }
}

/// Quadrant a herb/floor subplot is filed under.
///
/// SP1 and SP2 map to Q1; everything else, including ids without a
/// readable number, maps to Q2. Q3 and Q4 are never produced.
pub fn quadrant_for_subplot(subplot_id: &str) -> &'static str {
    let number = subplot_id.replacen("SP", "", 1);
    match leading_integer(&number) {
        Some(n) if n <= 2 => "Q1",
        _ => "Q2",
    }
}

fn leading_integer(s: &str) -> Option<i64> {
    let t = s.trim_start();
    let sign_len = usize::from(t.starts_with('-') || t.starts_with('+'));
    let digits = t[sign_len..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    t[..sign_len + digits].parse().ok()
}
