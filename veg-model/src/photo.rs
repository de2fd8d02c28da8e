//! Canopy photo analysis records and the naming rules shared by the
//! analysis client and the store.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Outcome of analysing one hemispherical canopy photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanopyPhotoAnalysis {
    pub id: String,
    pub plot_id: String,
    pub quadrant_id: String,
    pub subplot_id: Option<String>,
    pub image_file_name: String,
    pub image_url: String,
    pub canopy_cover_percentage: f64,
    #[serde(rename = "estimatedLAI")]
    pub estimated_lai: f64,
    pub gap_fraction: f64,
    /// Data URL or path of the binary canopy mask
    pub mask_image_url: Option<String>,
    /// Data URL or path of the segmented overlay
    pub segmented_image_url: Option<String>,
    pub notes: Option<String>,
    pub analysis_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A photo stored by the image upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpload {
    pub id: String,
    pub project_id: String,
    pub plot_id: String,
    pub quadrant_id: String,
    pub original_file_name: String,
    /// Path assigned by the backend
    pub file_path: String,
    pub size: u64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Guess a Content-Type from a file extension.
pub fn content_type_for_extension(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Last path segment of a file path or URL, without any query string.
pub fn file_name_of(path_or_url: &str) -> Option<&str> {
    let path = path_or_url.split(['?', '#']).next().unwrap_or("");
    path.rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
}

/// Persistence hook used by the analysis client.
pub trait CanopyAnalysisStore {
    fn save_canopy_analysis(&self, analysis: &CanopyPhotoAnalysis) -> anyhow::Result<()>;
}

static PLOT_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"P0*").expect("valid regex"));

/// Base name of processed images: ("P03", "Q2") -> "Plot-3_Q2".
///
/// Every `P` in the plot id is removed together with the zeros that
/// directly follow it.
pub fn processed_image_base_name(plot_id: &str, quadrant_id: &str) -> String {
    let number = PLOT_PREFIX_RE.replace_all(plot_id, "");
    format!("Plot-{}_{}", number, quadrant_id)
}

/// Placeholder (mask, segmented) paths used when no service result exists.
pub fn mock_image_paths(plot_id: &str, quadrant_id: &str) -> (String, String) {
    let base = processed_image_base_name(plot_id, quadrant_id);
    (
        format!("/processed/{}_mask.png", base),
        format!("/processed/{}_segmented.png", base),
    )
}

static PLOT_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)plot[-_]?(\d+)").expect("valid regex"),
        Regex::new(r"p(\d+)").expect("valid regex"),
        Regex::new(r"(\d+)").expect("valid regex"),
    ]
});

static QUADRANT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)quadrant(\d+)|quad(\d+)|q(\d+)|(center)|subp?lot[-_]?(\d+)")
        .expect("valid regex")
});

/// Infer (plot id, quadrant id) from a photo file name.
///
/// Plot: `plot-1`, `plot_1`, `p02` or the first run of digits, padded to
/// two digits; `P01` when nothing matches. Quadrant: `quadrantN`,
/// `quadN`, `qN` or `subplotN` give `QN`, `center` gives `Q1`; `Q1`
/// otherwise.
pub fn parse_image_filename(filename: &str) -> (String, String) {
    let plot_number = PLOT_PATTERNS
        .iter()
        .find_map(|re| re.captures(filename).and_then(|c| c.get(1)))
        .map(|m| format!("{:0>2}", m.as_str()))
        .unwrap_or_else(|| "01".to_string());

    let quadrant_id = first_quadrant_match(filename).unwrap_or_else(|| "Q1".to_string());
    (format!("P{}", plot_number), quadrant_id)
}

fn first_quadrant_match(filename: &str) -> Option<String> {
    // alternatives are tried in priority order, not by position in the name
    let caps: Vec<_> = QUADRANT_RE.captures_iter(filename).collect();
    for group in [1, 2, 3, 4, 5] {
        if let Some(m) = caps.iter().find_map(|c| c.get(group)) {
            return Some(if group == 4 {
                "Q1".to_string()
            } else {
                format!("Q{}", m.as_str())
            });
        }
    }
    None
}

/// Analyses held for display during a session.
#[derive(Debug, Clone, Default)]
pub struct AnalysisResults {
    results: Vec<CanopyPhotoAnalysis>,
}

impl AnalysisResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, analysis: CanopyPhotoAnalysis) {
        self.results.push(analysis);
    }

    pub fn remove(&mut self, id: &str) -> Option<CanopyPhotoAnalysis> {
        let index = self.results.iter().position(|a| a.id == id)?;
        Some(self.results.remove(index))
    }

    pub fn as_slice(&self) -> &[CanopyPhotoAnalysis] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl Extend<CanopyPhotoAnalysis> for AnalysisResults {
    fn extend<I: IntoIterator<Item = CanopyPhotoAnalysis>>(&mut self, iter: I) {
        self.results.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(id: &str) -> CanopyPhotoAnalysis {
        let at = Utc::now();
        CanopyPhotoAnalysis {
            id: id.to_string(),
            plot_id: "P01".to_string(),
            quadrant_id: "Q1".to_string(),
            subplot_id: None,
            image_file_name: "a.jpg".to_string(),
            image_url: "a.jpg".to_string(),
            canopy_cover_percentage: 50.0,
            estimated_lai: 2.0,
            gap_fraction: 0.5,
            mask_image_url: None,
            segmented_image_url: None,
            notes: None,
            analysis_date: at,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_processed_image_base_name() {
        assert_eq!(processed_image_base_name("P03", "Q2"), "Plot-3_Q2");
        assert_eq!(processed_image_base_name("P10", "Q1"), "Plot-10_Q1");
        assert_eq!(processed_image_base_name("P001", "Q4"), "Plot-1_Q4");
        assert_eq!(processed_image_base_name("X7", "Q1"), "Plot-X7_Q1");
    }

    #[test]
    fn test_mock_image_paths() {
        let (mask, segmented) = mock_image_paths("P03", "Q2");
        assert_eq!(mask, "/processed/Plot-3_Q2_mask.png");
        assert_eq!(segmented, "/processed/Plot-3_Q2_segmented.png");
    }

    #[test]
    fn test_parse_image_filename() {
        assert_eq!(
            parse_image_filename("Plot-3_quadrant2.jpg"),
            ("P03".to_string(), "Q2".to_string())
        );
        assert_eq!(
            parse_image_filename("p12_q4.png"),
            ("P12".to_string(), "Q4".to_string())
        );
        assert_eq!(
            parse_image_filename("center.jpg"),
            ("P01".to_string(), "Q1".to_string())
        );
        // "subplot3" also satisfies the plot pattern
        assert_eq!(
            parse_image_filename("IMG_0042_subplot3.jpg"),
            ("P03".to_string(), "Q3".to_string())
        );
        assert_eq!(
            parse_image_filename("img_7.jpg"),
            ("P07".to_string(), "Q1".to_string())
        );
        assert_eq!(
            parse_image_filename("canopy.jpg"),
            ("P01".to_string(), "Q1".to_string())
        );
    }

    #[test]
    fn test_quadrant_pattern_priority() {
        // quadN wins over a bare qN appearing earlier in the name
        let (_, quadrant) = parse_image_filename("q9_quad3.jpg");
        assert_eq!(quadrant, "Q3");
    }

    #[test]
    fn test_file_name_of() {
        assert_eq!(file_name_of("http://host/img/P01_Q1.jpg?t=1"), Some("P01_Q1.jpg"));
        assert_eq!(file_name_of("photos/center.JPG"), Some("center.JPG"));
        assert_eq!(file_name_of("http://host/"), None);
        assert_eq!(content_type_for_extension("center.JPG"), "image/jpeg");
        assert_eq!(content_type_for_extension("notes"), "application/octet-stream");
    }

    #[test]
    fn test_analysis_serializes_lai_name() {
        let json = serde_json::to_value(analysis("x")).unwrap();
        assert_eq!(json["estimatedLAI"], 2.0);
        assert_eq!(json["canopyCoverPercentage"], 50.0);
    }

    #[test]
    fn test_analysis_results_remove() {
        let mut results = AnalysisResults::new();
        results.push(analysis("a"));
        results.push(analysis("b"));
        assert_eq!(results.remove("a").map(|a| a.id), Some("a".to_string()));
        assert!(results.remove("a").is_none());
        assert_eq!(results.len(), 1);
        assert_eq!(results.as_slice()[0].id, "b");
    }
}
