//! Canopy photo commands: analysis, upload and stored results.

use log::{info, warn};
use serde_json::{json, Value};
use veg_data::photo_stats::canopy_statistics;
use veg_db::Database;
use veg_model::{
    client::{CanopyAnalysisClient, ClientConfig},
    photo::{file_name_of, parse_image_filename, AnalysisResults},
};

/// Plot and quadrant for a photo: explicit ids win, the rest is inferred
/// from the file name.
fn locate(image: &str, plot_id: Option<String>, quadrant_id: Option<String>) -> (String, String) {
    let (inferred_plot, inferred_quadrant) = parse_image_filename(file_name_of(image).unwrap_or(image));
    (
        plot_id.unwrap_or(inferred_plot),
        quadrant_id.unwrap_or(inferred_quadrant),
    )
}

pub async fn analyze_photo(
    db: &Database,
    config: &ClientConfig,
    image: &str,
    plot_id: Option<String>,
    quadrant_id: Option<String>,
) -> anyhow::Result<Value> {
    let client = CanopyAnalysisClient::new(config.clone())?;
    let (plot_id, quadrant_id) = locate(image, plot_id, quadrant_id);
    let result = client
        .analyze_canopy_photo(db, image, &plot_id, &quadrant_id)
        .await;
    Ok(serde_json::to_value(result)?)
}

/// Analyse photos one after another and summarise the batch.
pub async fn analyze_photos(db: &Database, config: &ClientConfig, images: &[String]) -> anyhow::Result<Value> {
    let client = CanopyAnalysisClient::new(config.clone())?;
    let photos: Vec<(String, String, String)> = images
        .iter()
        .map(|image| {
            let (plot_id, quadrant_id) = locate(image, None, None);
            (image.clone(), plot_id, quadrant_id)
        })
        .collect();

    let results = client.process_multiple(db, &photos).await;
    let mocked = results.iter().filter(|r| !r.persisted).count();
    if mocked > 0 {
        warn!("{} of {} photos were not stored", mocked, results.len());
    }

    let mut session = AnalysisResults::new();
    session.extend(results.iter().map(|r| r.analysis.clone()));
    info!("Analysed {} photos", session.len());

    Ok(json!({
        "results": results,
        "statistics": canopy_statistics(session.as_slice()),
    }))
}

pub async fn upload_image(
    config: &ClientConfig,
    project_id: &str,
    image: &str,
    plot_id: &str,
    quadrant_id: &str,
) -> anyhow::Result<Value> {
    let client = CanopyAnalysisClient::new(config.clone())?;
    let upload = client
        .upload_image(project_id, image, plot_id, quadrant_id)
        .await?;
    Ok(serde_json::to_value(upload)?)
}

pub fn list_analyses(db: &Database, plot_id: Option<&str>) -> anyhow::Result<Value> {
    let analyses = db.get_analyses(plot_id)?;
    Ok(json!({
        "statistics": canopy_statistics(&analyses),
        "analyses": analyses,
    }))
}

/// Delete a stored analysis and report statistics over the ones left.
pub fn delete_analysis(db: &Database, id: &str) -> anyhow::Result<Value> {
    let mut session = AnalysisResults::new();
    session.extend(db.get_analyses(None)?);
    let deleted = db.delete_analysis(id)?;
    if deleted {
        session.remove(id);
    }
    Ok(json!({
        "id": id,
        "deleted": deleted,
        "remaining": session.len(),
        "statistics": canopy_statistics(session.as_slice()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use veg_model::{error::VegError, photo::CanopyPhotoAnalysis};
    use veg_utils::dates::now;

    fn unreachable() -> ClientConfig {
        ClientConfig {
            api_base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn explicit_ids_override_file_name() {
        assert_eq!(
            locate("photos/plot-3_quad2.jpg", None, None),
            ("P03".to_string(), "Q2".to_string())
        );
        assert_eq!(
            locate("photos/plot-3_quad2.jpg", Some("P09".to_string()), None),
            ("P09".to_string(), "Q2".to_string())
        );
    }

    #[tokio::test]
    async fn analyze_photo_falls_back_to_mock() {
        let db = Database::new().unwrap();
        let out = analyze_photo(&db, &unreachable(), "/no/such/p03_q2.jpg", None, None)
            .await
            .unwrap();
        assert_eq!(out["source"]["kind"], "mock");
        assert_eq!(out["persisted"], false);
        assert_eq!(out["analysis"]["plotId"], "P03");
        assert!(out["mask"].as_str().unwrap().contains("Plot-3_Q2"));
        let cover = out["analysis"]["canopyCoverPercentage"].as_f64().unwrap();
        assert!((10.0..=90.0).contains(&cover));
        // mock results are not stored
        assert!(db.get_analyses(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn analyze_photos_reports_statistics() {
        let db = Database::new().unwrap();
        let images = vec!["/no/such/plot1_q1.jpg".to_string(), "/no/such/plot2_q3.jpg".to_string()];
        let out = analyze_photos(&db, &unreachable(), &images).await.unwrap();
        assert_eq!(out["results"].as_array().unwrap().len(), 2);
        assert_eq!(out["results"][1]["analysis"]["quadrantId"], "Q3");
        assert_eq!(out["statistics"]["totalAnalyses"], 2);
    }

    #[tokio::test]
    async fn upload_surfaces_errors() {
        let err = upload_image(&unreachable(), "proj_1", "/no/such/photo.jpg", "P01", "Q1")
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<VegError>(), Some(VegError::Io { .. })));
    }

    #[test]
    fn list_and_delete_analyses() {
        let db = Database::new().unwrap();
        let at = now();
        db.save_analysis(&CanopyPhotoAnalysis {
            id: "P01_Q1_1".to_string(),
            plot_id: "P01".to_string(),
            quadrant_id: "Q1".to_string(),
            subplot_id: None,
            image_file_name: "p1.jpg".to_string(),
            image_url: "p1.jpg".to_string(),
            canopy_cover_percentage: 42.0,
            estimated_lai: 2.5,
            gap_fraction: 0.58,
            mask_image_url: None,
            segmented_image_url: None,
            notes: None,
            analysis_date: at,
            created_at: at,
            updated_at: at,
        })
        .unwrap();

        let out = list_analyses(&db, Some("P01")).unwrap();
        assert_eq!(out["statistics"]["avgCanopyCover"], 42.0);
        assert_eq!(out["analyses"][0]["estimatedLAI"], 2.5);
        assert_eq!(list_analyses(&db, Some("P02")).unwrap()["statistics"]["totalAnalyses"], 0);

        let out = delete_analysis(&db, "P01_Q1_1").unwrap();
        assert_eq!(out["deleted"], true);
        assert_eq!(out["remaining"], 0);
        assert_eq!(out["statistics"]["totalAnalyses"], 0);
        assert_eq!(delete_analysis(&db, "P01_Q1_1").unwrap()["deleted"], false);
    }

    #[test]
    fn delete_analysis_recomputes_statistics() {
        let db = Database::new().unwrap();
        let at = now();
        for (id, cover) in [("P01_Q1_1", 40.0), ("P01_Q2_2", 60.0), ("P02_Q1_3", 80.0)] {
            db.save_analysis(&CanopyPhotoAnalysis {
                id: id.to_string(),
                plot_id: id[..3].to_string(),
                quadrant_id: id[4..6].to_string(),
                subplot_id: None,
                image_file_name: format!("{}.jpg", id),
                image_url: format!("{}.jpg", id),
                canopy_cover_percentage: cover,
                estimated_lai: 2.0,
                gap_fraction: 0.5,
                mask_image_url: None,
                segmented_image_url: None,
                notes: None,
                analysis_date: at,
                created_at: at,
                updated_at: at,
            })
            .unwrap();
        }

        let out = delete_analysis(&db, "P02_Q1_3").unwrap();
        assert_eq!(out["remaining"], 2);
        assert_eq!(out["statistics"]["avgCanopyCover"], 50.0);
        assert_eq!(db.get_analyses(None).unwrap().len(), 2);
    }
}
