//! Row mapping between SQLite tables and the domain types.
//!
//! Each `*_COLUMNS` list matches the field order read by the
//! corresponding `*_from_row` function.

use rusqlite::{types::Type, Row};
use serde::Serialize;
use std::str::FromStr;
use veg_model::{
    cover::CanopyCoverData,
    photo::CanopyPhotoAnalysis,
    plot::{Plot, Quadrant, Subplot},
    project::Project,
    species::{Species, SpeciesRecord},
};

/// Stored row counts for one project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCounts {
    pub plots: u32,
    pub species: u32,
    pub records: u32,
    pub cover_observations: u32,
}

impl ProjectCounts {
    pub fn data_points(&self) -> u32 {
        self.records + self.cover_observations
    }
}

/// A plot with what was recorded in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotDetails {
    #[serde(flatten)]
    pub plot: Plot,
    pub quadrants: Vec<Quadrant>,
    pub records: Vec<SpeciesRecord>,
}

fn parse_text<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn parse_json_list(row: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) const PROJECT_COLUMNS: &str = "id, name, description, status, tools, data_sources, \
     progress, plot_count, species_count, record_count, total_data_points, last_synced, \
     created_at, updated_at";

pub(crate) fn project_from_row(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        status: parse_text(row, 3)?,
        tools: parse_json_list(row, 4)?,
        data_sources: parse_json_list(row, 5)?,
        progress: row.get(6)?,
        plot_count: row.get(7)?,
        species_count: row.get(8)?,
        record_count: row.get(9)?,
        total_data_points: row.get(10)?,
        last_synced: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

pub(crate) const PLOT_COLUMNS: &str = "id, plot_id, location_name, description, latitude, \
     longitude, elevation, size, habitat_type, notes, created_at, updated_at";

pub(crate) fn plot_from_row(row: &Row) -> rusqlite::Result<Plot> {
    Ok(Plot {
        id: row.get(0)?,
        plot_id: row.get(1)?,
        location_name: row.get(2)?,
        description: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        elevation: row.get(6)?,
        size: row.get(7)?,
        habitat_type: row.get(8)?,
        notes: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

pub(crate) const QUADRANT_COLUMNS: &str =
    "id, plot_id, quadrant_id, description, notes, created_at, updated_at";

pub(crate) fn quadrant_from_row(row: &Row) -> rusqlite::Result<Quadrant> {
    Ok(Quadrant {
        id: row.get(0)?,
        plot_id: row.get(1)?,
        quadrant_id: row.get(2)?,
        description: row.get(3)?,
        notes: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub(crate) const SUBPLOT_COLUMNS: &str = "id, plot_id, quadrant_id, subplot_id, layer_type, \
     species_category, cover_percentage, avg_height, notes, created_at, updated_at";

pub(crate) fn subplot_from_row(row: &Row) -> rusqlite::Result<Subplot> {
    Ok(Subplot {
        id: row.get(0)?,
        plot_id: row.get(1)?,
        quadrant_id: row.get(2)?,
        subplot_id: row.get(3)?,
        layer_type: row.get(4)?,
        species_category: row.get(5)?,
        cover_percentage: row.get(6)?,
        avg_height: row.get(7)?,
        notes: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub(crate) const SPECIES_COLUMNS: &str = "id, scientific_name, common_name, growth_form, family";

pub(crate) fn species_from_row(row: &Row) -> rusqlite::Result<Species> {
    Ok(Species {
        id: row.get(0)?,
        scientific_name: row.get(1)?,
        common_name: row.get(2)?,
        growth_form: row.get(3)?,
        family: row.get(4)?,
    })
}

pub(crate) const RECORD_COLUMNS: &str = "id, species_id, plot_id, quadrant_id, subplot_id, \
     tree_id, height, gbh, total_gbh, cover_percentage, avg_height, stems, condition, notes, \
     timestamp";

pub(crate) fn record_from_row(row: &Row) -> rusqlite::Result<SpeciesRecord> {
    Ok(SpeciesRecord {
        id: row.get(0)?,
        species_id: row.get(1)?,
        plot_id: row.get(2)?,
        quadrant_id: row.get(3)?,
        subplot_id: row.get(4)?,
        tree_id: row.get(5)?,
        height: row.get(6)?,
        gbh: row.get(7)?,
        total_gbh: row.get(8)?,
        cover_percentage: row.get(9)?,
        avg_height: row.get(10)?,
        stems: row.get(11)?,
        condition: row.get(12)?,
        notes: row.get(13)?,
        timestamp: row.get(14)?,
    })
}

pub(crate) const COVER_COLUMNS: &str = "id, plot_id, quadrant_id, subplot_id, cover_type, \
     species_name, cover_percentage, measurement_date, notes";

pub(crate) fn cover_from_row(row: &Row) -> rusqlite::Result<CanopyCoverData> {
    Ok(CanopyCoverData {
        id: row.get(0)?,
        plot_id: row.get(1)?,
        quadrant_id: row.get(2)?,
        subplot_id: row.get(3)?,
        cover_type: parse_text(row, 4)?,
        species_name: row.get(5)?,
        cover_percentage: row.get(6)?,
        measurement_date: row.get(7)?,
        notes: row.get(8)?,
    })
}

pub(crate) const ANALYSIS_COLUMNS: &str = "id, plot_id, quadrant_id, subplot_id, \
     image_file_name, image_url, canopy_cover_percentage, estimated_lai, gap_fraction, \
     mask_image_url, segmented_image_url, notes, analysis_date, created_at, updated_at";

pub(crate) fn analysis_from_row(row: &Row) -> rusqlite::Result<CanopyPhotoAnalysis> {
    Ok(CanopyPhotoAnalysis {
        id: row.get(0)?,
        plot_id: row.get(1)?,
        quadrant_id: row.get(2)?,
        subplot_id: row.get(3)?,
        image_file_name: row.get(4)?,
        image_url: row.get(5)?,
        canopy_cover_percentage: row.get(6)?,
        estimated_lai: row.get(7)?,
        gap_fraction: row.get(8)?,
        mask_image_url: row.get(9)?,
        segmented_image_url: row.get(10)?,
        notes: row.get(11)?,
        analysis_date: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}
