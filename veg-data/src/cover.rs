//! Cover-type roll-ups and diversity statistics for plots, quadrants and
//! subplots.
//!
//! Every function here is pure and total: empty input gives zero-valued
//! results, never an error.

use serde::Serialize;
use veg_model::cover::{CanopyCoverData, CoverType};
use veg_utils::numbers::{mean, round_to};

/// Plot, quadrant or subplot selection. A subplot scope must also name
/// its quadrant; one without a quadrant matches no observations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverScope {
    pub plot_id: String,
    pub quadrant_id: Option<String>,
    pub subplot_id: Option<String>,
}

impl CoverScope {
    pub fn plot(plot_id: &str) -> Self {
        CoverScope {
            plot_id: plot_id.to_string(),
            quadrant_id: None,
            subplot_id: None,
        }
    }

    pub fn quadrant(plot_id: &str, quadrant_id: &str) -> Self {
        CoverScope::new(plot_id, Some(quadrant_id), None)
    }

    pub fn subplot(plot_id: &str, quadrant_id: &str, subplot_id: &str) -> Self {
        CoverScope::new(plot_id, Some(quadrant_id), Some(subplot_id))
    }

    /// Empty ids count as not given.
    pub fn new(plot_id: &str, quadrant_id: Option<&str>, subplot_id: Option<&str>) -> Self {
        let given = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(str::to_string);
        CoverScope {
            plot_id: plot_id.to_string(),
            quadrant_id: given(quadrant_id),
            subplot_id: given(subplot_id),
        }
    }

    pub fn matches(&self, item: &CanopyCoverData) -> bool {
        if item.plot_id != self.plot_id {
            return false;
        }
        match (&self.quadrant_id, &self.subplot_id) {
            (Some(q), Some(s)) => item.quadrant_id == *q && item.subplot_id == *s,
            (None, Some(_)) => false,
            (Some(q), None) => item.quadrant_id == *q,
            (None, None) => true,
        }
    }

    /// `<plot>_<quadrant|all>_<subplot|all>`
    pub fn id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.plot_id,
            self.quadrant_id.as_deref().unwrap_or("all"),
            self.subplot_id.as_deref().unwrap_or("all")
        )
    }
}

/// Summed cover percentage per cover type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverBuckets {
    pub herb: f64,
    pub grass: f64,
    pub shrub: f64,
    pub tree: f64,
    pub litter: f64,
    pub bare_soil: f64,
    pub other: f64,
}

impl CoverBuckets {
    pub fn get(&self, cover_type: CoverType) -> f64 {
        match cover_type {
            CoverType::Herb => self.herb,
            CoverType::Grass => self.grass,
            CoverType::Shrub => self.shrub,
            CoverType::Tree => self.tree,
            CoverType::Litter => self.litter,
            CoverType::BareSoil => self.bare_soil,
            CoverType::Other => self.other,
        }
    }

    pub fn add(&mut self, cover_type: CoverType, value: f64) {
        let bucket = match cover_type {
            CoverType::Herb => &mut self.herb,
            CoverType::Grass => &mut self.grass,
            CoverType::Shrub => &mut self.shrub,
            CoverType::Tree => &mut self.tree,
            CoverType::Litter => &mut self.litter,
            CoverType::BareSoil => &mut self.bare_soil,
            CoverType::Other => &mut self.other,
        };
        *bucket += value;
    }

    pub fn total(&self) -> f64 {
        CoverType::ALL.iter().map(|t| self.get(*t)).sum()
    }

    /// Largest bucket; the earliest type wins a tie.
    pub fn max(&self) -> (CoverType, f64) {
        CoverType::ALL
            .iter()
            .skip(1)
            .fold((CoverType::Herb, self.herb), |best, t| {
                let value = self.get(*t);
                if value > best.1 {
                    (*t, value)
                } else {
                    best
                }
            })
    }
}

/// Cover statistics for one scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanopyCoverAnalysisResult {
    pub id: String,
    #[serde(flatten)]
    pub scope: CoverScope,
    pub total_cover_percentage: f64,
    pub cover: CoverBuckets,
    pub diversity_index: f64,
    pub evenness: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DominantCover {
    pub cover_type: CoverType,
    /// Share of the scope total, 2 decimals
    pub percentage: f64,
}

/// Averages over a set of plot-level results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverSummary {
    pub total_plots: usize,
    pub avg_total_cover: f64,
    pub avg_cover: CoverBuckets,
    pub avg_diversity_index: f64,
    pub avg_evenness: f64,
    /// None when there are no results
    pub dominant_cover_type: Option<CoverType>,
}

/// One pie-chart slice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionSlice {
    pub name: &'static str,
    pub value: f64,
    pub color: &'static str,
}

/// One bar-chart row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparativeRow {
    pub name: String,
    #[serde(flatten)]
    pub cover: CoverBuckets,
}

/// Shannon-Wiener index H' over the entries' shares of their total cover.
pub fn diversity_index(entries: &[&CanopyCoverData]) -> f64 {
    let total: f64 = entries.iter().map(|e| e.cover_percentage).sum();
    if entries.is_empty() || total == 0.0 {
        return 0.0;
    }
    entries
        .iter()
        .map(|e| e.cover_percentage / total)
        .filter(|p| *p > 0.0)
        .map(|p| -p * p.ln())
        .sum()
}

/// Pielou evenness H' / ln(S); 1 for a single entry, 0 for none.
pub fn evenness(diversity: f64, entry_count: usize) -> f64 {
    match entry_count {
        0 => 0.0,
        1 => 1.0,
        n => {
            let max_diversity = (n as f64).ln();
            if max_diversity > 0.0 {
                diversity / max_diversity
            } else {
                0.0
            }
        }
    }
}

/// Sum cover by type over the observations inside `scope`.
pub fn aggregate_by_scope(data: &[CanopyCoverData], scope: &CoverScope) -> CanopyCoverAnalysisResult {
    let entries: Vec<&CanopyCoverData> = data.iter().filter(|d| scope.matches(d)).collect();

    let mut cover = CoverBuckets::default();
    for entry in &entries {
        cover.add(entry.cover_type, entry.cover_percentage);
    }
    let diversity = diversity_index(&entries);

    CanopyCoverAnalysisResult {
        id: scope.id(),
        scope: scope.clone(),
        total_cover_percentage: cover.total(),
        cover,
        diversity_index: diversity,
        evenness: evenness(diversity, entries.len()),
    }
}

/// One plot-level result per plot id, in the order given.
pub fn analyze_across_plots(data: &[CanopyCoverData], plot_ids: &[String]) -> Vec<CanopyCoverAnalysisResult> {
    plot_ids
        .iter()
        .map(|plot_id| aggregate_by_scope(data, &CoverScope::plot(plot_id)))
        .collect()
}

pub fn dominant_cover_type(result: &CanopyCoverAnalysisResult) -> DominantCover {
    let (cover_type, value) = result.cover.max();
    let percentage = if result.total_cover_percentage > 0.0 {
        round_to(value / result.total_cover_percentage * 100.0, 2)
    } else {
        0.0
    };
    DominantCover {
        cover_type,
        percentage,
    }
}

/// Means across results (2 decimals) and the type with the largest
/// summed cover.
pub fn cover_summary(results: &[CanopyCoverAnalysisResult]) -> CoverSummary {
    let avg = |f: &dyn Fn(&CanopyCoverAnalysisResult) -> f64| {
        round_to(mean(&results.iter().map(f).collect::<Vec<f64>>()), 2)
    };

    let mut sums = CoverBuckets::default();
    for result in results {
        for t in CoverType::ALL {
            sums.add(t, result.cover.get(t));
        }
    }

    CoverSummary {
        total_plots: results.len(),
        avg_total_cover: avg(&|r| r.total_cover_percentage),
        avg_cover: CoverBuckets {
            herb: avg(&|r| r.cover.herb),
            grass: avg(&|r| r.cover.grass),
            shrub: avg(&|r| r.cover.shrub),
            tree: avg(&|r| r.cover.tree),
            litter: avg(&|r| r.cover.litter),
            bare_soil: avg(&|r| r.cover.bare_soil),
            other: avg(&|r| r.cover.other),
        },
        avg_diversity_index: avg(&|r| r.diversity_index),
        avg_evenness: avg(&|r| r.evenness),
        dominant_cover_type: (!results.is_empty()).then(|| sums.max().0),
    }
}

/// One subplot-level result per distinct subplot in a quadrant, in order
/// of first appearance.
pub fn analyze_subplots(
    data: &[CanopyCoverData],
    plot_id: &str,
    quadrant_id: &str,
) -> Vec<CanopyCoverAnalysisResult> {
    let mut subplots: Vec<&str> = Vec::new();
    for item in data
        .iter()
        .filter(|d| d.plot_id == plot_id && d.quadrant_id == quadrant_id)
    {
        if !subplots.contains(&item.subplot_id.as_str()) {
            subplots.push(&item.subplot_id);
        }
    }
    log::debug!("{} {}: {} subplots", plot_id, quadrant_id, subplots.len());

    subplots
        .into_iter()
        .map(|subplot_id| {
            aggregate_by_scope(data, &CoverScope::subplot(plot_id, quadrant_id, subplot_id))
        })
        .collect()
}

/// Non-empty buckets as labelled, coloured slices.
pub fn composition(result: &CanopyCoverAnalysisResult) -> Vec<CompositionSlice> {
    CoverType::ALL
        .iter()
        .filter(|t| result.cover.get(**t) > 0.0)
        .map(|t| CompositionSlice {
            name: t.label(),
            value: result.cover.get(*t),
            color: t.color(),
        })
        .collect()
}

pub fn comparative_rows(results: &[CanopyCoverAnalysisResult]) -> Vec<ComparativeRow> {
    results
        .iter()
        .map(|r| ComparativeRow {
            name: r.scope.plot_id.clone(),
            cover: r.cover,
        })
        .collect()
}
