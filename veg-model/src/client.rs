//! HTTP client for the canopy photo analysis service.
//!
//! A photo is posted as multipart form data together with its plot and
//! quadrant ids. The service answers with metrics and two base64-encoded
//! images. When the service cannot be used the client substitutes
//! synthetic metrics so callers always get a result.

use crate::{
    error::{Result, VegError},
    photo::{
        content_type_for_extension, file_name_of, mock_image_paths, CanopyAnalysisStore,
        CanopyPhotoAnalysis, ImageUpload,
    },
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rand::Rng;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;
use veg_utils::{dates::epoch_millis, numbers::round_to};

const ANALYZE_IMAGE_PATH: &str = "/api/v2/canopy-analysis/image";
const UPLOAD_IMAGE_PATH: &str = "/api/v1/images/upload";
const DEFAULT_FILE_NAME: &str = "canopy_image.jpg";
const SUCCESS_NOTE: &str = "Analysis completed successfully";

/// Where the analysis service lives and how long to wait for it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api_base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Metrics block of a service response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisMetrics {
    pub canopy_cover_percent: Option<f64>,
    pub estimated_lai: Option<f64>,
    pub gap_fraction: Option<f64>,
}

/// Base64 image block of a service response.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisImages {
    pub binary_mask: String,
    pub analysis_image: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisResponse {
    pub analysis_results: Option<AnalysisMetrics>,
    pub images: Option<AnalysisImages>,
}

/// Result of asking the service to analyse a photo.
#[derive(Debug)]
pub enum ServiceOutcome {
    Available(AnalysisResponse),
    Unavailable { reason: String },
}

/// An image produced by an analysis: decoded bytes, or a path for
/// placeholder images.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageResource {
    Inline { mime: String, bytes: Vec<u8> },
    Path(String),
}

impl ImageResource {
    /// Data URL for inline images, the path otherwise.
    pub fn url(&self) -> String {
        match self {
            ImageResource::Inline { mime, bytes } => {
                format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
            }
            ImageResource::Path(path) => path.clone(),
        }
    }
}

impl Serialize for ImageResource {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.url())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AnalysisSource {
    Service,
    Mock { reason: String },
}

/// What [`CanopyAnalysisClient::analyze_canopy_photo`] hands back.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanopyAnalysisResult {
    pub analysis: CanopyPhotoAnalysis,
    pub mask: ImageResource,
    pub segmented: ImageResource,
    pub source: AnalysisSource,
    /// Whether the analysis reached the store
    pub persisted: bool,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file_path: String,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    detail: Option<String>,
}

pub struct CanopyAnalysisClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl CanopyAnalysisClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    /// Read photo bytes from a local path or an `http(s)` URL.
    ///
    /// Remote URLs get a `t=<millis>` parameter so intermediate caches
    /// are bypassed.
    pub async fn fetch_image(&self, image_url: &str) -> Result<Vec<u8>> {
        if !is_remote(image_url) {
            return tokio::fs::read(image_url).await.map_err(|source| VegError::Io {
                path: image_url.to_string(),
                source,
            });
        }
        let url = with_cache_buster(image_url, epoch_millis(&Utc::now()));
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(VegError::Fetch {
                path: image_url.to_string(),
                status: status.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// POST a photo to the analysis endpoint. Never fails: every problem
    /// becomes [`ServiceOutcome::Unavailable`].
    pub async fn request_analysis(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        plot_id: &str,
        quadrant_id: &str,
    ) -> ServiceOutcome {
        let unavailable = |reason: String| ServiceOutcome::Unavailable { reason };

        let part = match Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type_for_extension(file_name))
        {
            Ok(part) => part,
            Err(e) => return unavailable(e.to_string()),
        };
        let form = Form::new()
            .part("file", part)
            .text("plot_id", plot_id.to_string())
            .text("quadrant_id", quadrant_id.to_string());

        let url = self.endpoint(ANALYZE_IMAGE_PATH);
        debug!("POST {} plot={} quadrant={}", url, plot_id, quadrant_id);
        let response = match self
            .client
            .post(&url)
            .query(&[("plot_id", plot_id), ("quadrant_id", quadrant_id)])
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return unavailable(format!("request failed: {}", e)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return unavailable(format!("API call failed with status {}: {}", status.as_u16(), body));
        }
        match response.json::<AnalysisResponse>().await {
            Ok(body) => ServiceOutcome::Available(body),
            Err(e) => unavailable(format!("undecodable response: {}", e)),
        }
    }

    /// Analyse one photo for a plot quadrant.
    ///
    /// Service results are saved through `store`; a failed save is logged
    /// and reported through [`CanopyAnalysisResult::persisted`]. When the
    /// service cannot be used a synthetic result is returned instead and
    /// nothing is saved.
    pub async fn analyze_canopy_photo(
        &self,
        store: &dyn CanopyAnalysisStore,
        image_url: &str,
        plot_id: &str,
        quadrant_id: &str,
    ) -> CanopyAnalysisResult {
        info!("Analysing {} for {} {}", image_url, plot_id, quadrant_id);
        let file_name = file_name_of(image_url).unwrap_or(DEFAULT_FILE_NAME);

        let outcome = match self.fetch_image(image_url).await {
            Ok(bytes) => {
                debug!("Fetched {} bytes from {}", bytes.len(), image_url);
                self.request_analysis(bytes, file_name, plot_id, quadrant_id)
                    .await
            }
            Err(e) => ServiceOutcome::Unavailable {
                reason: e.to_string(),
            },
        };

        let at = Utc::now();
        let interpreted = match outcome {
            ServiceOutcome::Available(response) => interpret_response(response),
            ServiceOutcome::Unavailable { reason } => Err(reason),
        };
        match interpreted {
            Ok(service) => {
                let mut result =
                    service.into_result(image_url, file_name, plot_id, quadrant_id, at);
                result.persisted = match store.save_canopy_analysis(&result.analysis) {
                    Ok(()) => {
                        info!("Saved canopy analysis {}", result.analysis.id);
                        true
                    }
                    Err(e) => {
                        error!("Failed to save canopy analysis {}: {:#}", result.analysis.id, e);
                        false
                    }
                };
                result
            }
            Err(reason) => {
                warn!("Canopy analysis service unavailable, using mock data: {}", reason);
                mock_analysis(&mut rand::rng(), image_url, plot_id, quadrant_id, reason, at)
            }
        }
    }

    /// Analyse several photos one after another.
    pub async fn process_multiple(
        &self,
        store: &dyn CanopyAnalysisStore,
        photos: &[(String, String, String)],
    ) -> Vec<CanopyAnalysisResult> {
        let mut results = Vec::with_capacity(photos.len());
        for (image_url, plot_id, quadrant_id) in photos {
            results.push(
                self.analyze_canopy_photo(store, image_url, plot_id, quadrant_id)
                    .await,
            );
        }
        results
    }

    /// Store a photo on the backend and describe where it went.
    pub async fn upload_image(
        &self,
        project_id: &str,
        image_path: &str,
        plot_id: &str,
        quadrant_id: &str,
    ) -> Result<ImageUpload> {
        let bytes = self.fetch_image(image_path).await?;
        let file_name = file_name_of(image_path).unwrap_or(DEFAULT_FILE_NAME).to_string();
        let mime_type = content_type_for_extension(&file_name);
        let size = bytes.len() as u64;

        let part = Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str(mime_type)?;
        let form = Form::new()
            .part("file", part)
            .text("plot_id", plot_id.to_string())
            .text("quadrant_id", quadrant_id.to_string());

        let response = self
            .client
            .post(self.endpoint(UPLOAD_IMAGE_PATH))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("").to_string();
            let detail = response
                .json::<ErrorDetail>()
                .await
                .ok()
                .and_then(|d| d.detail)
                .unwrap_or(reason);
            return Err(VegError::Upload {
                status: status.as_u16(),
                detail,
            });
        }

        let body: UploadResponse = response.json().await?;
        let uploaded_at = Utc::now();
        info!("Uploaded {} to {}", file_name, body.file_path);
        Ok(ImageUpload {
            id: format!("img_{}_{}", epoch_millis(&uploaded_at), uuid::Uuid::new_v4().simple()),
            project_id: project_id.to_string(),
            plot_id: plot_id.to_string(),
            quadrant_id: quadrant_id.to_string(),
            original_file_name: file_name,
            file_path: body.file_path,
            size,
            mime_type: mime_type.to_string(),
            uploaded_at,
        })
    }
}

fn is_remote(image_url: &str) -> bool {
    image_url.starts_with("http://") || image_url.starts_with("https://")
}

fn with_cache_buster(url: &str, millis: i64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}t={}", url, separator, millis)
}

/// Usable parts of a service response.
#[derive(Debug)]
pub struct ServiceAnalysis {
    pub canopy_cover_percentage: f64,
    pub estimated_lai: f64,
    pub gap_fraction: f64,
    pub mask: ImageResource,
    pub segmented: ImageResource,
}

impl ServiceAnalysis {
    fn into_result(
        self,
        image_url: &str,
        file_name: &str,
        plot_id: &str,
        quadrant_id: &str,
        at: DateTime<Utc>,
    ) -> CanopyAnalysisResult {
        let analysis = CanopyPhotoAnalysis {
            id: format!("{}_{}_{}", plot_id, quadrant_id, epoch_millis(&at)),
            plot_id: plot_id.to_string(),
            quadrant_id: quadrant_id.to_string(),
            subplot_id: None,
            image_file_name: file_name.to_string(),
            image_url: image_url.to_string(),
            canopy_cover_percentage: self.canopy_cover_percentage,
            estimated_lai: self.estimated_lai,
            gap_fraction: self.gap_fraction,
            mask_image_url: Some(self.mask.url()),
            segmented_image_url: Some(self.segmented.url()),
            notes: Some(SUCCESS_NOTE.to_string()),
            analysis_date: at,
            created_at: at,
            updated_at: at,
        };
        CanopyAnalysisResult {
            analysis,
            mask: self.mask,
            segmented: self.segmented,
            source: AnalysisSource::Service,
            persisted: false,
        }
    }
}

/// Check a service response and decode its images.
///
/// Missing metrics count as 0; missing or undecodable images make the
/// response unusable.
pub fn interpret_response(response: AnalysisResponse) -> std::result::Result<ServiceAnalysis, String> {
    let images = response
        .images
        .ok_or_else(|| "No images returned from analysis".to_string())?;
    let decode = |name: &str, data: &str| {
        STANDARD
            .decode(data.trim())
            .map(|bytes| ImageResource::Inline {
                mime: "image/jpeg".to_string(),
                bytes,
            })
            .map_err(|e| format!("invalid base64 in {}: {}", name, e))
    };
    let mask = decode("binary_mask", &images.binary_mask)?;
    let segmented = decode("analysis_image", &images.analysis_image)?;
    let metrics = response.analysis_results.unwrap_or_default();
    Ok(ServiceAnalysis {
        canopy_cover_percentage: metrics.canopy_cover_percent.unwrap_or(0.0),
        estimated_lai: metrics.estimated_lai.unwrap_or(0.0),
        gap_fraction: metrics.gap_fraction.unwrap_or(0.0),
        mask,
        segmented,
    })
}

/// Synthetic analysis: cover in [10, 90] %, LAI in [0.5, 8.0], gap
/// fraction in [0.1, 0.9], placeholder image paths.
pub fn mock_analysis<R: Rng + ?Sized>(
    rng: &mut R,
    image_url: &str,
    plot_id: &str,
    quadrant_id: &str,
    reason: String,
    at: DateTime<Utc>,
) -> CanopyAnalysisResult {
    let canopy_cover_percentage = round_to(rng.random_range(10.0..=90.0), 2);
    let estimated_lai = round_to(rng.random_range(0.5..=8.0), 2);
    let gap_fraction = round_to(rng.random_range(0.1..=0.9), 3);
    let (mask_path, segmented_path) = mock_image_paths(plot_id, quadrant_id);

    let analysis = CanopyPhotoAnalysis {
        id: format!("{}_{}_{}", plot_id, quadrant_id, epoch_millis(&at)),
        plot_id: plot_id.to_string(),
        quadrant_id: quadrant_id.to_string(),
        subplot_id: None,
        image_file_name: file_name_of(image_url)
            .unwrap_or(DEFAULT_FILE_NAME)
            .to_string(),
        image_url: image_url.to_string(),
        canopy_cover_percentage,
        estimated_lai,
        gap_fraction,
        mask_image_url: Some(mask_path.clone()),
        segmented_image_url: Some(segmented_path.clone()),
        notes: Some(format!("Mock analysis: {}", reason)),
        analysis_date: at,
        created_at: at,
        updated_at: at,
    };
    CanopyAnalysisResult {
        analysis,
        mask: ImageResource::Path(mask_path),
        segmented: ImageResource::Path(segmented_path),
        source: AnalysisSource::Mock { reason },
        persisted: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::cell::RefCell;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        task::JoinHandle,
    };

    const SERVICE_BODY: &str = r#"{"analysis_results":{"canopy_cover_percent":63.2,"estimated_lai":3.1,"gap_fraction":0.368},
        "images":{"binary_mask":"AAEC","analysis_image":"/9j/"}}"#;

    #[derive(Default)]
    struct RecordingStore {
        saved: RefCell<Vec<CanopyPhotoAnalysis>>,
        fail: bool,
    }

    impl CanopyAnalysisStore for RecordingStore {
        fn save_canopy_analysis(&self, analysis: &CanopyPhotoAnalysis) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("store offline");
            }
            self.saved.borrow_mut().push(analysis.clone());
            Ok(())
        }
    }

    fn unreachable_client() -> CanopyAnalysisClient {
        CanopyAnalysisClient::new(ClientConfig {
            api_base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    /// Client for a service on the loopback interface.
    fn local_client(api_base_url: String) -> CanopyAnalysisClient {
        let config = ClientConfig {
            api_base_url,
            timeout: Duration::from_secs(5),
        };
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(config.timeout)
            .build()
            .unwrap();
        CanopyAnalysisClient { client, config }
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let body_len = buf.len() - end - 4;
                let complete = match head.lines().find_map(|l| l.strip_prefix("content-length:")) {
                    Some(len) => body_len >= len.trim().parse::<usize>().unwrap(),
                    None => buf.ends_with(b"--\r\n") || buf.ends_with(b"0\r\n\r\n"),
                };
                if complete {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Answer one request with `body` and hand back the raw request.
    async fn serve_once(body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request
        });
        (base, handle)
    }

    fn temp_photo() -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("veg-model-{}.jpg", uuid::Uuid::new_v4()));
        std::fs::write(&path, [0xFFu8, 0xD8, 0xFF]).unwrap();
        path
    }

    fn assert_mock_ranges(result: &CanopyAnalysisResult) {
        let a = &result.analysis;
        assert!((10.0..=90.0).contains(&a.canopy_cover_percentage));
        assert!((0.5..=8.0).contains(&a.estimated_lai));
        assert!((0.1..=0.9).contains(&a.gap_fraction));
    }

    #[test]
    fn test_mock_analysis_ranges_and_paths() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let result = mock_analysis(
                &mut rng,
                "photos/p03.jpg",
                "P03",
                "Q2",
                "offline".to_string(),
                Utc::now(),
            );
            assert_mock_ranges(&result);
            let a = &result.analysis;
            assert_eq!(round_to(a.canopy_cover_percentage, 2), a.canopy_cover_percentage);
            assert_eq!(round_to(a.gap_fraction, 3), a.gap_fraction);
            assert_eq!(result.mask.url(), "/processed/Plot-3_Q2_mask.png");
            assert_eq!(result.segmented.url(), "/processed/Plot-3_Q2_segmented.png");
            assert_eq!(
                result.source,
                AnalysisSource::Mock {
                    reason: "offline".to_string()
                }
            );
        }
    }

    #[test]
    fn test_interpret_response() {
        let response: AnalysisResponse = serde_json::from_str(
            r#"{"analysis_results":{"canopy_cover_percent":63.2,"estimated_lai":3.1},
                "images":{"binary_mask":"AAEC","analysis_image":"/9j/"}}"#,
        )
        .unwrap();
        let analysis = interpret_response(response).unwrap();
        assert_eq!(analysis.canopy_cover_percentage, 63.2);
        assert_eq!(analysis.estimated_lai, 3.1);
        assert_eq!(analysis.gap_fraction, 0.0);
        assert_eq!(
            analysis.mask,
            ImageResource::Inline {
                mime: "image/jpeg".to_string(),
                bytes: vec![0, 1, 2]
            }
        );
        assert_eq!(analysis.mask.url(), "data:image/jpeg;base64,AAEC");
    }

    #[test]
    fn test_interpret_response_rejects_missing_or_bad_images() {
        let no_images: AnalysisResponse =
            serde_json::from_str(r#"{"analysis_results":{"canopy_cover_percent":50}}"#).unwrap();
        assert!(interpret_response(no_images).is_err());

        let bad_base64: AnalysisResponse = serde_json::from_str(
            r#"{"images":{"binary_mask":"not base64!","analysis_image":"AAEC"}}"#,
        )
        .unwrap();
        assert!(interpret_response(bad_base64).is_err());
    }

    #[test]
    fn test_service_result_metadata() {
        let analysis = interpret_response(AnalysisResponse {
            analysis_results: None,
            images: Some(AnalysisImages {
                binary_mask: "AAEC".to_string(),
                analysis_image: "AAEC".to_string(),
            }),
        })
        .unwrap();
        let at = Utc::now();
        let result = analysis.into_result("http://h/p.jpg", "p.jpg", "P01", "Q3", at);
        assert_eq!(result.analysis.id, format!("P01_Q3_{}", at.timestamp_millis()));
        assert_eq!(result.analysis.notes.as_deref(), Some(SUCCESS_NOTE));
        assert_eq!(result.source, AnalysisSource::Service);
        assert!(result
            .analysis
            .mask_image_url
            .as_deref()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_cache_buster() {
        assert_eq!(with_cache_buster("http://h/a.jpg", 5), "http://h/a.jpg?t=5");
        assert_eq!(with_cache_buster("http://h/a.jpg?x=1", 5), "http://h/a.jpg?x=1&t=5");
    }

    #[tokio::test]
    async fn test_missing_photo_falls_back_to_mock() {
        let client = unreachable_client();
        let store = RecordingStore::default();
        let result = client
            .analyze_canopy_photo(&store, "/definitely/not/here.jpg", "P03", "Q2")
            .await;
        assert_mock_ranges(&result);
        assert!(matches!(result.source, AnalysisSource::Mock { .. }));
        assert!(!result.persisted);
        assert!(store.saved.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_service_falls_back_to_mock() {
        let path = temp_photo();
        let client = unreachable_client();
        let store = RecordingStore::default();
        let result = client
            .analyze_canopy_photo(&store, path.to_str().unwrap(), "P03", "Q2")
            .await;
        std::fs::remove_file(&path).ok();

        assert_mock_ranges(&result);
        assert!(result.mask.url().contains("Plot-3_Q2"));
        assert!(result.segmented.url().contains("Plot-3_Q2"));
        assert!(!result.persisted);
        assert!(store.saved.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_service_result_is_saved() {
        let (base, server) = serve_once(SERVICE_BODY).await;
        let client = local_client(base);
        let store = RecordingStore::default();
        let path = temp_photo();
        let result = client
            .analyze_canopy_photo(&store, path.to_str().unwrap(), "P03", "Q2")
            .await;
        std::fs::remove_file(&path).ok();
        let request = server.await.unwrap();

        assert_eq!(result.source, AnalysisSource::Service);
        assert!(result.persisted);
        assert_eq!(result.analysis.canopy_cover_percentage, 63.2);
        assert_eq!(result.analysis.estimated_lai, 3.1);
        assert_eq!(result.analysis.gap_fraction, 0.368);
        assert_eq!(result.mask.url(), "data:image/jpeg;base64,AAEC");
        let saved = store.saved.borrow();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, result.analysis.id);
        assert_eq!(saved[0].plot_id, "P03");

        let request_line = request.lines().next().unwrap();
        assert!(request_line.starts_with("POST /api/v2/canopy-analysis/image?"));
        assert!(request_line.contains("plot_id=P03"));
        assert!(request_line.contains("quadrant_id=Q2"));
        assert!(request.contains("name=\"plot_id\"\r\n\r\nP03\r\n"));
        assert!(request.contains("name=\"quadrant_id\"\r\n\r\nQ2\r\n"));
        assert!(request.contains("name=\"file\"; filename=\""));
        assert!(request.contains("image/jpeg"));
    }

    #[tokio::test]
    async fn test_service_result_survives_failed_save() {
        let (base, server) = serve_once(SERVICE_BODY).await;
        let client = local_client(base);
        let store = RecordingStore {
            fail: true,
            ..Default::default()
        };
        let path = temp_photo();
        let result = client
            .analyze_canopy_photo(&store, path.to_str().unwrap(), "P01", "Q1")
            .await;
        std::fs::remove_file(&path).ok();
        server.await.unwrap();

        assert_eq!(result.source, AnalysisSource::Service);
        assert!(!result.persisted);
        assert_eq!(result.analysis.canopy_cover_percentage, 63.2);
        assert!(store.saved.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_process_multiple_keeps_order() {
        let client = unreachable_client();
        let store = RecordingStore::default();
        let photos = vec![
            ("/missing/a.jpg".to_string(), "P01".to_string(), "Q1".to_string()),
            ("/missing/b.jpg".to_string(), "P02".to_string(), "Q4".to_string()),
        ];
        let results = client.process_multiple(&store, &photos).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].analysis.plot_id, "P01");
        assert_eq!(results[1].analysis.quadrant_id, "Q4");
        assert_eq!(results[1].analysis.image_file_name, "b.jpg");
    }

    #[tokio::test]
    async fn test_upload_of_missing_file_is_an_error() {
        let client = unreachable_client();
        let err = client
            .upload_image("proj_1", "/missing/a.jpg", "P01", "Q1")
            .await
            .unwrap_err();
        assert!(matches!(err, VegError::Io { .. }));
    }
}
