//! Writing imported survey data into the store.
//!
//! A [`VegetationBundle`] is committed in one transaction. Plots,
//! quadrants, subplots and species already stored for the project are left
//! untouched (first sighting wins); records and cover observations are
//! always appended. Project metadata is refreshed after the commit.

use crate::Database;
use anyhow::bail;
use rusqlite::{params, Connection};
use veg_model::{
    cover::CanopyCoverData,
    error::VegError,
    import::VegetationBundle,
    plot::{Plot, Quadrant, Subplot},
    project::FIELD_DATA_SOURCE,
    species::{Species, SpeciesRecord},
};
use veg_utils::dates::now;

/// How an insert treats a row whose key is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnConflict {
    Fail,
    Ignore,
}

impl OnConflict {
    fn verb(self) -> &'static str {
        match self {
            OnConflict::Fail => "INSERT",
            OnConflict::Ignore => "INSERT OR IGNORE",
        }
    }
}

pub(crate) fn insert_plot(conn: &Connection, project_id: &str, p: &Plot, on_conflict: OnConflict) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            "{} INTO plots (project_id, id, plot_id, location_name, description, latitude,
                longitude, elevation, size, habitat_type, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            on_conflict.verb()
        ),
        params![
            project_id,
            p.id,
            p.plot_id,
            p.location_name,
            p.description,
            p.latitude,
            p.longitude,
            p.elevation,
            p.size,
            p.habitat_type,
            p.notes,
            p.created_at,
            p.updated_at
        ],
    )
}

pub(crate) fn insert_quadrant(conn: &Connection, project_id: &str, q: &Quadrant, on_conflict: OnConflict) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            "{} INTO quadrants (project_id, id, plot_id, quadrant_id, description, notes,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            on_conflict.verb()
        ),
        params![project_id, q.id, q.plot_id, q.quadrant_id, q.description, q.notes, q.created_at, q.updated_at],
    )
}

pub(crate) fn insert_subplot(conn: &Connection, project_id: &str, s: &Subplot, on_conflict: OnConflict) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            "{} INTO subplots (project_id, id, plot_id, quadrant_id, subplot_id, layer_type,
                species_category, cover_percentage, avg_height, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            on_conflict.verb()
        ),
        params![
            project_id,
            s.id,
            s.plot_id,
            s.quadrant_id,
            s.subplot_id,
            s.layer_type,
            s.species_category,
            s.cover_percentage,
            s.avg_height,
            s.notes,
            s.created_at,
            s.updated_at
        ],
    )
}

pub(crate) fn insert_species(conn: &Connection, project_id: &str, s: &Species, on_conflict: OnConflict) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            "{} INTO species (project_id, id, scientific_name, common_name, growth_form, family)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            on_conflict.verb()
        ),
        params![project_id, s.id, s.scientific_name, s.common_name, s.growth_form, s.family],
    )
}

pub(crate) fn insert_record(conn: &Connection, project_id: &str, r: &SpeciesRecord) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO records (project_id, id, species_id, plot_id, quadrant_id, subplot_id,
            tree_id, height, gbh, total_gbh, cover_percentage, avg_height, stems, condition,
            notes, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            project_id,
            r.id,
            r.species_id,
            r.plot_id,
            r.quadrant_id,
            r.subplot_id,
            r.tree_id,
            r.height,
            r.gbh,
            r.total_gbh,
            r.cover_percentage,
            r.avg_height,
            r.stems,
            r.condition,
            r.notes,
            r.timestamp
        ],
    )
}

pub(crate) fn insert_cover(conn: &Connection, project_id: &str, c: &CanopyCoverData) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO canopy_cover (project_id, id, plot_id, quadrant_id, subplot_id, cover_type,
            species_name, cover_percentage, measurement_date, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            project_id,
            c.id,
            c.plot_id,
            c.quadrant_id,
            c.subplot_id,
            c.cover_type.as_str(),
            c.species_name,
            c.cover_percentage,
            c.measurement_date,
            c.notes
        ],
    )
}

/// Rows actually written by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub plots: usize,
    pub quadrants: usize,
    pub subplots: usize,
    pub species: usize,
    pub records: usize,
    pub cover_observations: usize,
}

impl Database {
    /// Commit an imported bundle into a project and refresh the project's
    /// metadata.
    ///
    /// Fails with [`VegError::ProjectNotFound`] when the project is not
    /// stored; nothing is written in that case.
    pub fn import_bundle(&self, project_id: &str, bundle: &VegetationBundle) -> anyhow::Result<ImportSummary> {
        if self.get_project(project_id)?.is_none() {
            bail!(VegError::ProjectNotFound(project_id.to_string()));
        }

        let mut summary = ImportSummary::default();
        {
            let mut conn = self.conn.borrow_mut();
            let tx = conn.transaction()?;
            for p in &bundle.plots {
                summary.plots += insert_plot(&tx, project_id, p, OnConflict::Ignore)?;
            }
            for q in &bundle.quadrants {
                summary.quadrants += insert_quadrant(&tx, project_id, q, OnConflict::Ignore)?;
            }
            for s in &bundle.subplots {
                summary.subplots += insert_subplot(&tx, project_id, s, OnConflict::Ignore)?;
            }
            for s in &bundle.species {
                summary.species += insert_species(&tx, project_id, s, OnConflict::Ignore)?;
            }
            for r in &bundle.records {
                summary.records += insert_record(&tx, project_id, r)?;
            }
            for c in &bundle.canopy_cover {
                summary.cover_observations += insert_cover(&tx, project_id, c)?;
            }
            tx.commit()?;
        }
        log::info!(
            "loader: imported into {}: {} plots, {} species, {} records, {} cover observations",
            project_id,
            summary.plots,
            summary.species,
            summary.records,
            summary.cover_observations
        );

        self.refresh_project_metadata(project_id, Some(FIELD_DATA_SOURCE))?;
        Ok(summary)
    }

    /// Recompute a project's counts from the stored rows and stamp it as
    /// synced, optionally recording a data source.
    pub fn refresh_project_metadata(&self, project_id: &str, data_source: Option<&str>) -> anyhow::Result<()> {
        let Some(mut project) = self.get_project(project_id)? else {
            bail!(VegError::ProjectNotFound(project_id.to_string()));
        };
        let counts = self.project_counts(project_id)?;
        if let Some(source) = data_source {
            project.add_data_source(source);
        }
        let at = now();
        project.plot_count = counts.plots;
        project.species_count = counts.species;
        project.record_count = counts.records;
        project.total_data_points = counts.data_points();
        project.last_synced = Some(at);
        project.updated_at = at;
        self.update_project(&project)?;
        log::debug!("loader: refreshed metadata for {}: {:?}", project_id, counts);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veg_model::{import::import_vegetation, project::DEFAULT_PROJECT_ID};

    static WOODY: &str = include_str!("../../fixtures/woody_vegetation.csv");
    static HERB_FLOOR: &str = include_str!("../../fixtures/herb_floor_vegetation.csv");

    fn seeded() -> Database {
        let db = Database::new().unwrap();
        db.ensure_default_project().unwrap();
        db
    }

    #[test]
    fn import_writes_every_entity() {
        let db = seeded();
        let bundle = import_vegetation(WOODY, HERB_FLOOR, now());
        let summary = db.import_bundle(DEFAULT_PROJECT_ID, &bundle).unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                plots: 2,
                quadrants: 5,
                subplots: 6,
                species: 9,
                records: 13,
                cover_observations: 7,
            }
        );
        assert_eq!(db.get_plots(DEFAULT_PROJECT_ID).unwrap().len(), 2);
        assert_eq!(db.get_canopy_cover(DEFAULT_PROJECT_ID, None).unwrap().len(), 7);
    }

    #[test]
    fn import_refreshes_project_metadata() {
        let db = seeded();
        let bundle = import_vegetation(WOODY, HERB_FLOOR, now());
        db.import_bundle(DEFAULT_PROJECT_ID, &bundle).unwrap();

        let project = db.get_project(DEFAULT_PROJECT_ID).unwrap().unwrap();
        assert_eq!(project.plot_count, 2);
        assert_eq!(project.species_count, 9);
        assert_eq!(project.record_count, 13);
        assert_eq!(project.total_data_points, 20);
        assert_eq!(project.data_sources, vec!["Field Data".to_string()]);
        assert!(project.last_synced.is_some());
    }

    #[test]
    fn reimport_keeps_entities_and_appends_records() {
        let db = seeded();
        db.import_bundle(DEFAULT_PROJECT_ID, &import_vegetation(WOODY, HERB_FLOOR, now()))
            .unwrap();
        let second = db
            .import_bundle(DEFAULT_PROJECT_ID, &import_vegetation(WOODY, HERB_FLOOR, now()))
            .unwrap();
        assert_eq!(second.plots, 0);
        assert_eq!(second.species, 0);
        assert_eq!(second.records, 13);

        let project = db.get_project(DEFAULT_PROJECT_ID).unwrap().unwrap();
        assert_eq!(project.plot_count, 2);
        assert_eq!(project.record_count, 26);
        assert_eq!(project.data_sources.len(), 1);
    }

    #[test]
    fn import_into_missing_project_fails() {
        let db = Database::new().unwrap();
        let bundle = import_vegetation(WOODY, HERB_FLOOR, now());
        let err = db.import_bundle("proj_404", &bundle).unwrap_err();
        match err.downcast_ref::<VegError>() {
            Some(VegError::ProjectNotFound(id)) => assert_eq!(id, "proj_404"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(db.get_plots("proj_404").unwrap().is_empty());
    }
}
