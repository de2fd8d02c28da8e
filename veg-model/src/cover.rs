use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Ground/canopy cover category for a herb/floor layer observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverType {
    Herb,
    Grass,
    Shrub,
    Tree,
    Litter,
    BareSoil,
    Other,
}

impl CoverType {
    /// Every cover type in reporting order. Ties between buckets are
    /// resolved by this order.
    pub const ALL: [CoverType; 7] = [
        CoverType::Herb,
        CoverType::Grass,
        CoverType::Shrub,
        CoverType::Tree,
        CoverType::Litter,
        CoverType::BareSoil,
        CoverType::Other,
    ];

    /// Classify free-text layer type by case-insensitive substring,
    /// checked in the order herb, grass, shrub, tree, litter, bare/soil.
    pub fn from_layer_type(layer_type: &str) -> CoverType {
        let lowered = layer_type.to_lowercase();
        if lowered.contains("herb") {
            CoverType::Herb
        } else if lowered.contains("grass") {
            CoverType::Grass
        } else if lowered.contains("shrub") {
            CoverType::Shrub
        } else if lowered.contains("tree") {
            CoverType::Tree
        } else if lowered.contains("litter") {
            CoverType::Litter
        } else if lowered.contains("bare") || lowered.contains("soil") {
            CoverType::BareSoil
        } else {
            CoverType::Other
        }
    }

    /// Storage key, e.g. "bare_soil".
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverType::Herb => "herb",
            CoverType::Grass => "grass",
            CoverType::Shrub => "shrub",
            CoverType::Tree => "tree",
            CoverType::Litter => "litter",
            CoverType::BareSoil => "bare_soil",
            CoverType::Other => "other",
        }
    }

    /// Display label, e.g. "Bare Soil".
    pub fn label(&self) -> &'static str {
        match self {
            CoverType::Herb => "Herb",
            CoverType::Grass => "Grass",
            CoverType::Shrub => "Shrub",
            CoverType::Tree => "Tree",
            CoverType::Litter => "Litter",
            CoverType::BareSoil => "Bare Soil",
            CoverType::Other => "Other",
        }
    }

    /// Chart colour for composition output.
    pub fn color(&self) -> &'static str {
        match self {
            CoverType::Herb => "#8BC34A",
            CoverType::Grass => "#4CAF50",
            CoverType::Shrub => "#795548",
            CoverType::Tree => "#388E3C",
            CoverType::Litter => "#5D4037",
            CoverType::BareSoil => "#FFC107",
            CoverType::Other => "#9E9E9E",
        }
    }
}

impl fmt::Display for CoverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CoverType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CoverType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown cover type '{}'", s))
    }
}

/// One cover observation from a herb/floor survey line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanopyCoverData {
    pub id: String,
    pub plot_id: String,
    pub quadrant_id: String,
    pub subplot_id: String,
    pub cover_type: CoverType,
    pub species_name: Option<String>,
    pub cover_percentage: f64,
    pub measurement_date: DateTime<Utc>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::CoverType;

    #[test]
    fn test_layer_type_classification() {
        assert_eq!(CoverType::from_layer_type("Bare Ground"), CoverType::BareSoil);
        assert_eq!(CoverType::from_layer_type("Tall Grass"), CoverType::Grass);
        assert_eq!(CoverType::from_layer_type("Moss"), CoverType::Other);
        assert_eq!(CoverType::from_layer_type("HERB"), CoverType::Herb);
        assert_eq!(CoverType::from_layer_type("Exposed soil"), CoverType::BareSoil);
        assert_eq!(CoverType::from_layer_type("Leaf Litter"), CoverType::Litter);
        assert_eq!(CoverType::from_layer_type(""), CoverType::Other);
    }

    #[test]
    fn test_classification_precedence() {
        // herb is checked before grass, tree before litter
        assert_eq!(CoverType::from_layer_type("Herb/Grass mix"), CoverType::Herb);
        assert_eq!(CoverType::from_layer_type("Tree litter"), CoverType::Tree);
        assert_eq!(CoverType::from_layer_type("Shrub on bare soil"), CoverType::Shrub);
    }

    #[test]
    fn test_storage_key_round_trip() {
        for t in CoverType::ALL {
            assert_eq!(t.as_str().parse::<CoverType>().unwrap(), t);
        }
        assert!("moss".parse::<CoverType>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&CoverType::BareSoil).unwrap();
        assert_eq!(json, "\"bare_soil\"");
    }
}
