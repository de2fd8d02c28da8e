//! Turn woody and herb/floor survey sheets into plots, quadrants, subplots,
//! species, records and cover observations.
//!
//! Each sheet produces a [`VegetationBundle`]; bundles from both sheets are
//! combined with [`VegetationBundle::merge`]. Entity identity is decided by
//! the survey keys (plot id, plot+quadrant, plot+subplot, scientific name)
//! and the first occurrence of a key wins.

use crate::{
    cover::{CanopyCoverData, CoverType},
    csv_text::{parse_csv_text, CsvRow},
    plot::{quadrant_for_subplot, Plot, Quadrant, Subplot},
    species::{Species, SpeciesRecord},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

const STEM_COLUMNS: [&str; 6] = [
    "GBH_Stem1_cm",
    "GBH_Stem2_cm",
    "GBH_Stem3_cm",
    "GBH_Stem4_cm",
    "GBH_Stem5_cm",
    "GBH_Stem6_cm",
];

/// One line of the woody vegetation sheet.
#[derive(Debug, Clone, Copy)]
pub struct WoodyRow<'a> {
    pub plot_id: &'a str,
    pub location_name: &'a str,
    pub quad_id: &'a str,
    pub species_scientific: &'a str,
    pub growth_form: &'a str,
    pub tree_id: &'a str,
    pub height_m: &'a str,
    pub condition: &'a str,
    pub gbh_stems: [&'a str; 6],
    pub remarks: &'a str,
    pub total_gbh_cm: &'a str,
}

impl<'a> From<&'a CsvRow> for WoodyRow<'a> {
    fn from(row: &'a CsvRow) -> Self {
        WoodyRow {
            plot_id: row.get("Plot_ID"),
            location_name: row.get("Location_Name"),
            quad_id: row.get("Quad_ID"),
            species_scientific: row.get("Species_Scientific"),
            growth_form: row.get("Growth_Form"),
            tree_id: row.get("Tree_ID"),
            height_m: row.get("Height_m"),
            condition: row.get("Condition"),
            gbh_stems: STEM_COLUMNS.map(|c| row.get(c)),
            remarks: row.get("Remarks"),
            total_gbh_cm: row.get("Total_GBH_cm"),
        }
    }
}

/// One line of the herb/floor vegetation sheet.
#[derive(Debug, Clone, Copy)]
pub struct HerbFloorRow<'a> {
    pub plot_id: &'a str,
    pub location_name: &'a str,
    pub subplot_id: &'a str,
    pub layer_type: &'a str,
    pub species_or_category: &'a str,
    pub count_or_cover: &'a str,
    pub avg_height_cm: &'a str,
    pub notes: &'a str,
}

impl<'a> From<&'a CsvRow> for HerbFloorRow<'a> {
    fn from(row: &'a CsvRow) -> Self {
        HerbFloorRow {
            plot_id: row.get("Plot_ID"),
            location_name: row.get("Location_Name"),
            subplot_id: row.get("Subplot_ID"),
            layer_type: row.get("Layer_Type"),
            species_or_category: row.get("Species_or_Category"),
            count_or_cover: row.get("Count_or_Cover%"),
            avg_height_cm: row.get("Avg_Height_cm"),
            notes: row.get("Notes"),
        }
    }
}

/// Parse the leading decimal number of `s`, ignoring anything after it.
///
/// "12.5cm" -> 12.5, " -3e2x" -> -300, "abc" -> None.
pub fn lenient_float(s: &str) -> Option<f64> {
    let t = s.trim_start();
    let bytes = t.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    if t[end..].starts_with("Infinity") {
        return t[..end + "Infinity".len()].parse().ok();
    }
    let int_digits = count_digits(&bytes[end..]);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits = count_digits(&bytes[exp_end..]);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }
    t[..end].parse().ok()
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// An optional measurement: unreadable, zero and NaN readings are absent.
pub fn parse_measurement(s: &str) -> Option<f64> {
    lenient_float(s).filter(|v| *v != 0.0 && !v.is_nan())
}

/// Number of stem girth columns holding a positive reading.
pub fn stem_count(stems: &[&str]) -> Option<u32> {
    let count = stems
        .iter()
        .filter_map(|s| lenient_float(s))
        .filter(|v| *v > 0.0)
        .count() as u32;
    (count > 0).then_some(count)
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn generated_id(prefix: &str, plot_id: &str, key: &str) -> String {
    format!("{}_{}_{}_{}", prefix, plot_id, key, Uuid::new_v4().simple())
}

/// Entities extracted from one or more survey sheets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VegetationBundle {
    pub plots: Vec<Plot>,
    pub quadrants: Vec<Quadrant>,
    pub subplots: Vec<Subplot>,
    pub species: Vec<Species>,
    pub records: Vec<SpeciesRecord>,
    pub canopy_cover: Vec<CanopyCoverData>,
}

impl VegetationBundle {
    /// Combine two bundles. Plots, quadrants, subplots and species keep
    /// their first occurrence (self before other); records and cover
    /// observations are concatenated.
    pub fn merge(self, other: VegetationBundle) -> VegetationBundle {
        VegetationBundle {
            plots: dedup_by_key(self.plots, other.plots, |p| p.plot_id.clone()),
            quadrants: dedup_by_key(self.quadrants, other.quadrants, |q| q.id.clone()),
            subplots: dedup_by_key(self.subplots, other.subplots, |s| s.id.clone()),
            species: dedup_by_key(self.species, other.species, |s| {
                s.scientific_name.clone()
            }),
            records: [self.records, other.records].concat(),
            canopy_cover: [self.canopy_cover, other.canopy_cover].concat(),
        }
    }

    /// Number of entities that count as project data points.
    pub fn data_points(&self) -> usize {
        self.records.len() + self.canopy_cover.len()
    }
}

fn dedup_by_key<T, F>(first: Vec<T>, second: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> String,
{
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|item| seen.insert(key(item)))
        .collect()
}

/// Tracks first sightings of plots and species while walking a sheet.
#[derive(Default)]
struct Seen {
    plots: HashSet<String>,
    keys: HashSet<String>,
    species: HashSet<String>,
}

impl Seen {
    fn plot(&mut self, plot_id: &str) -> bool {
        !plot_id.is_empty() && self.plots.insert(plot_id.to_string())
    }

    fn nested(&mut self, plot_id: &str, child_id: &str) -> bool {
        !plot_id.is_empty()
            && !child_id.is_empty()
            && self.keys.insert(format!("{}_{}", plot_id, child_id))
    }

    fn species(&mut self, name: &str) -> bool {
        !name.is_empty() && self.species.insert(name.to_string())
    }
}

/// Build plots, quadrants, species and tree records from woody rows.
pub fn process_woody_rows(rows: &[CsvRow], at: DateTime<Utc>) -> VegetationBundle {
    let mut bundle = VegetationBundle::default();
    let mut seen = Seen::default();

    for row in rows.iter().map(WoodyRow::from) {
        if seen.plot(row.plot_id) {
            bundle.plots.push(Plot::new(row.plot_id, row.location_name, at));
        }
        if seen.nested(row.plot_id, row.quad_id) {
            bundle.quadrants.push(Quadrant::new(row.plot_id, row.quad_id, at));
        }
        if seen.species(row.species_scientific) {
            bundle.species.push(Species {
                id: Species::id_for(row.species_scientific),
                scientific_name: row.species_scientific.to_string(),
                common_name: row.species_scientific.to_string(),
                growth_form: row.growth_form.to_string(),
                family: None,
            });
        }

        let total_gbh = parse_measurement(row.total_gbh_cm);
        bundle.records.push(SpeciesRecord {
            id: generated_id("record", row.plot_id, row.tree_id),
            species_id: Species::id_for(row.species_scientific),
            plot_id: row.plot_id.to_string(),
            quadrant_id: non_empty(row.quad_id),
            subplot_id: None,
            tree_id: non_empty(row.tree_id),
            height: parse_measurement(row.height_m),
            gbh: total_gbh,
            total_gbh,
            cover_percentage: None,
            avg_height: None,
            stems: stem_count(&row.gbh_stems),
            condition: non_empty(row.condition),
            notes: non_empty(row.remarks),
            timestamp: at,
        });
    }

    log::debug!(
        "woody: {} rows -> {} plots, {} quadrants, {} species",
        rows.len(),
        bundle.plots.len(),
        bundle.quadrants.len(),
        bundle.species.len()
    );
    bundle
}

/// Build plots, subplots, species, cover records and cover observations
/// from herb/floor rows.
pub fn process_herb_floor_rows(rows: &[CsvRow], at: DateTime<Utc>) -> VegetationBundle {
    let mut bundle = VegetationBundle::default();
    let mut seen = Seen::default();

    for row in rows.iter().map(HerbFloorRow::from) {
        let quadrant_id = quadrant_for_subplot(row.subplot_id);

        if seen.plot(row.plot_id) {
            bundle.plots.push(Plot::new(row.plot_id, row.location_name, at));
        }
        if seen.nested(row.plot_id, row.subplot_id) {
            bundle.subplots.push(Subplot {
                id: Subplot::id_for(row.plot_id, row.subplot_id),
                plot_id: row.plot_id.to_string(),
                quadrant_id: quadrant_id.to_string(),
                subplot_id: row.subplot_id.to_string(),
                layer_type: row.layer_type.to_string(),
                species_category: non_empty(row.species_or_category),
                cover_percentage: parse_measurement(row.count_or_cover),
                avg_height: parse_measurement(row.avg_height_cm),
                notes: non_empty(row.notes),
                created_at: at,
                updated_at: at,
            });
        }
        if seen.species(row.species_or_category) {
            bundle.species.push(Species {
                id: Species::id_for(row.species_or_category),
                scientific_name: row.species_or_category.to_string(),
                common_name: row.species_or_category.to_string(),
                growth_form: "Herb".to_string(),
                family: None,
            });
        }

        let cover_percentage = parse_measurement(row.count_or_cover).unwrap_or(0.0);
        bundle.records.push(SpeciesRecord {
            id: generated_id("record", row.plot_id, row.subplot_id),
            species_id: Species::id_for(row.species_or_category),
            plot_id: row.plot_id.to_string(),
            quadrant_id: Some(quadrant_id.to_string()),
            subplot_id: non_empty(row.subplot_id),
            tree_id: None,
            height: None,
            gbh: None,
            total_gbh: None,
            cover_percentage: Some(cover_percentage),
            avg_height: parse_measurement(row.avg_height_cm),
            stems: None,
            condition: None,
            notes: non_empty(row.notes),
            timestamp: at,
        });
        bundle.canopy_cover.push(CanopyCoverData {
            id: generated_id("cover", row.plot_id, row.subplot_id),
            plot_id: row.plot_id.to_string(),
            quadrant_id: quadrant_id.to_string(),
            subplot_id: row.subplot_id.to_string(),
            cover_type: CoverType::from_layer_type(row.layer_type),
            species_name: non_empty(row.species_or_category),
            cover_percentage,
            measurement_date: at,
            notes: non_empty(row.notes),
        });
    }

    log::debug!(
        "herb/floor: {} rows -> {} plots, {} subplots, {} cover observations",
        rows.len(),
        bundle.plots.len(),
        bundle.subplots.len(),
        bundle.canopy_cover.len()
    );
    bundle
}

/// Parse both survey sheets and combine them, woody first.
pub fn import_vegetation(woody_csv: &str, herb_floor_csv: &str, at: DateTime<Utc>) -> VegetationBundle {
    let woody = process_woody_rows(&parse_csv_text(woody_csv), at);
    let herb_floor = process_herb_floor_rows(&parse_csv_text(herb_floor_csv), at);
    let bundle = woody.merge(herb_floor);
    log::info!(
        "imported {} plots, {} species, {} records, {} cover observations",
        bundle.plots.len(),
        bundle.species.len(),
        bundle.records.len(),
        bundle.canopy_cover.len()
    );
    bundle
}
