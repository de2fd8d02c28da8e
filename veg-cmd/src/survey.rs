//! Project, plot and survey-statistics commands.

use anyhow::bail;
use log::info;
use serde_json::{json, Value};
use veg_data::{
    cover::{
        analyze_across_plots, analyze_subplots, comparative_rows, composition, cover_summary as summarise,
        dominant_cover_type,
    },
    species::{abundance_by_plot, common_species, composition_by_plot, rare_species, richness},
};
use veg_db::Database;
use veg_model::{error::VegError, import::import_vegetation, plot::Plot, source::read_csv_file};
use veg_utils::dates::now;

fn require_project(db: &Database, project_id: &str) -> anyhow::Result<()> {
    if db.get_project(project_id)?.is_none() {
        bail!(VegError::ProjectNotFound(project_id.to_string()));
    }
    Ok(())
}

pub fn init_project(db: &Database) -> anyhow::Result<Value> {
    let project = db.ensure_default_project()?;
    info!("Using project {} ({})", project.id, project.name);
    Ok(serde_json::to_value(project)?)
}

pub fn list_projects(db: &Database) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(db.get_all_projects()?)?)
}

/// Read both survey sheets and commit them into `project_id`.
///
/// A missing sheet is treated as empty; at least one is required.
pub async fn import(
    db: &Database,
    project_id: &str,
    woody: Option<&str>,
    herb_floor: Option<&str>,
) -> anyhow::Result<Value> {
    if woody.is_none() && herb_floor.is_none() {
        bail!("nothing to import: pass --woody and/or --herb-floor");
    }
    require_project(db, project_id)?;

    let woody_csv = match woody {
        Some(path) => read_csv_file(path).await?,
        None => String::new(),
    };
    let herb_floor_csv = match herb_floor {
        Some(path) => read_csv_file(path).await?,
        None => String::new(),
    };

    let bundle = import_vegetation(&woody_csv, &herb_floor_csv, now());
    let summary = db.import_bundle(project_id, &bundle)?;
    Ok(json!({
        "imported": summary,
        "dataPoints": bundle.data_points(),
        "project": db.get_project(project_id)?,
    }))
}

pub fn list_plots(db: &Database, project_id: &str) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(db.get_plots(project_id)?)?)
}

pub fn plot_details(db: &Database, project_id: &str, plot_id: &str) -> anyhow::Result<Value> {
    match db.get_plot_details(project_id, plot_id)? {
        Some(details) => Ok(serde_json::to_value(details)?),
        None => bail!("plot {} not found in {}", plot_id, project_id),
    }
}

pub fn add_plot(db: &Database, project_id: &str, plot: Plot) -> anyhow::Result<Value> {
    require_project(db, project_id)?;
    if db.get_plot(project_id, &plot.plot_id)?.is_some() {
        bail!("plot {} already exists in {}", plot.plot_id, project_id);
    }
    db.add_plot(project_id, &plot)?;
    db.refresh_project_metadata(project_id, None)?;
    Ok(serde_json::to_value(plot)?)
}

pub fn delete_plot(db: &Database, project_id: &str, plot_id: &str) -> anyhow::Result<Value> {
    let deleted = db.delete_plot(project_id, plot_id)?;
    if deleted {
        db.refresh_project_metadata(project_id, None)?;
    }
    Ok(json!({ "plotId": plot_id, "deleted": deleted }))
}

fn plot_ids(db: &Database, project_id: &str, requested: &[String]) -> anyhow::Result<Vec<String>> {
    if !requested.is_empty() {
        return Ok(requested.to_vec());
    }
    Ok(db
        .get_plots(project_id)?
        .into_iter()
        .map(|p| p.plot_id)
        .collect())
}

/// Plot-level cover results with their dominant type and pie slices, plus
/// the bar-chart rows across all of them.
pub fn cover(db: &Database, project_id: &str, plots: &[String]) -> anyhow::Result<Value> {
    let data = db.get_canopy_cover(project_id, None)?;
    let results = analyze_across_plots(&data, &plot_ids(db, project_id, plots)?);
    let plots: Vec<Value> = results
        .iter()
        .map(|r| {
            json!({
                "analysis": r,
                "dominant": dominant_cover_type(r),
                "composition": composition(r),
            })
        })
        .collect();
    Ok(json!({
        "plots": plots,
        "comparative": comparative_rows(&results),
    }))
}

pub fn subplots(db: &Database, project_id: &str, plot_id: &str, quadrant_id: &str) -> anyhow::Result<Value> {
    let data = db.get_canopy_cover(project_id, Some(plot_id))?;
    Ok(serde_json::to_value(analyze_subplots(&data, plot_id, quadrant_id))?)
}

pub fn cover_summary(db: &Database, project_id: &str) -> anyhow::Result<Value> {
    let data = db.get_canopy_cover(project_id, None)?;
    let results = analyze_across_plots(&data, &plot_ids(db, project_id, &[])?);
    Ok(serde_json::to_value(summarise(&results))?)
}

pub fn species(
    db: &Database,
    project_id: &str,
    plot_id: Option<&str>,
    common_threshold: usize,
    rare_threshold: usize,
) -> anyhow::Result<Value> {
    let records = db.get_records(project_id, None)?;
    let species = db.get_species(project_id)?;

    let plots: Vec<Value> = plot_ids(db, project_id, &plot_id.map(|p| vec![p.to_string()]).unwrap_or_default())?
        .iter()
        .map(|plot| {
            json!({
                "plotId": plot,
                "richness": richness(&records, plot, None, None),
                "abundance": abundance_by_plot(&records, &species, plot),
            })
        })
        .collect();

    Ok(json!({
        "totalSpecies": species.len(),
        "plots": plots,
        "common": common_species(&records, &species, common_threshold),
        "rare": rare_species(&records, &species, rare_threshold),
        "composition": composition_by_plot(&records, &species),
    }))
}
