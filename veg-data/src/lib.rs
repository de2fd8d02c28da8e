//! Statistics over field-survey data.
//!
//! This crate turns imported observations into the summaries shown to
//! users: canopy cover roll-ups, species richness and abundance, and photo
//! analysis statistics.

pub mod cover;

/// Richness, abundance and composition of recorded species.
pub mod species {
    use serde::Serialize;
    use std::collections::BTreeMap;
    use veg_model::species::{Species, SpeciesRecord};

    pub const COMMON_THRESHOLD: usize = 5;
    pub const RARE_THRESHOLD: usize = 2;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct SpeciesAbundance {
        pub species: Species,
        pub count: usize,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SpeciesComposition {
        pub species: Species,
        pub plot_counts: BTreeMap<String, usize>,
    }

    /// Record count per species id, in order of first appearance.
    fn counts<'a>(records: impl Iterator<Item = &'a SpeciesRecord>) -> Vec<(&'a str, usize)> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for record in records {
            match counts.iter_mut().find(|(id, _)| *id == record.species_id) {
                Some((_, n)) => *n += 1,
                None => counts.push((record.species_id.as_str(), 1)),
            }
        }
        counts
    }

    fn lookup<'a>(species: &'a [Species], id: &str) -> Option<&'a Species> {
        species.iter().find(|s| s.id == id)
    }

    /// Distinct species among records in a plot, optionally narrowed to a
    /// quadrant and then a subplot. A subplot without its quadrant matches
    /// no records, as with [`crate::cover::CoverScope`].
    pub fn richness(
        records: &[SpeciesRecord],
        plot_id: &str,
        quadrant_id: Option<&str>,
        subplot_id: Option<&str>,
    ) -> usize {
        let in_scope = records.iter().filter(|r| {
            if r.plot_id != plot_id {
                return false;
            }
            match (quadrant_id, subplot_id) {
                (Some(q), Some(s)) => {
                    r.quadrant_id.as_deref() == Some(q) && r.subplot_id.as_deref() == Some(s)
                }
                (None, Some(_)) => false,
                (Some(q), None) => r.quadrant_id.as_deref() == Some(q),
                (None, None) => true,
            }
        });
        counts(in_scope).len()
    }

    /// Records per species in a plot. Species missing from `species` are
    /// left out.
    pub fn abundance_by_plot(
        records: &[SpeciesRecord],
        species: &[Species],
        plot_id: &str,
    ) -> Vec<SpeciesAbundance> {
        counts(records.iter().filter(|r| r.plot_id == plot_id))
            .into_iter()
            .filter_map(|(id, count)| {
                lookup(species, id).map(|s| SpeciesAbundance {
                    species: s.clone(),
                    count,
                })
            })
            .collect()
    }

    fn by_count<F>(records: &[SpeciesRecord], species: &[Species], keep: F) -> Vec<Species>
    where
        F: Fn(usize) -> bool,
    {
        counts(records.iter())
            .into_iter()
            .filter(|(_, count)| keep(*count))
            .filter_map(|(id, _)| lookup(species, id).cloned())
            .collect()
    }

    /// Species with at least `threshold` records.
    pub fn common_species(records: &[SpeciesRecord], species: &[Species], threshold: usize) -> Vec<Species> {
        by_count(records, species, |n| n >= threshold)
    }

    /// Species with at most `threshold` records.
    pub fn rare_species(records: &[SpeciesRecord], species: &[Species], threshold: usize) -> Vec<Species> {
        by_count(records, species, |n| n <= threshold)
    }

    /// Per species, how many records fall in each plot.
    pub fn composition_by_plot(records: &[SpeciesRecord], species: &[Species]) -> Vec<SpeciesComposition> {
        let mut composition: Vec<SpeciesComposition> = Vec::new();
        for record in records {
            let index = match composition
                .iter()
                .position(|c| c.species.id == record.species_id)
            {
                Some(index) => index,
                None => match lookup(species, &record.species_id) {
                    Some(s) => {
                        composition.push(SpeciesComposition {
                            species: s.clone(),
                            plot_counts: BTreeMap::new(),
                        });
                        composition.len() - 1
                    }
                    None => continue,
                },
            };
            *composition[index]
                .plot_counts
                .entry(record.plot_id.clone())
                .or_insert(0) += 1;
        }
        composition
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::Utc;
        use veg_model::import::import_vegetation;

        static WOODY: &str = include_str!("../../fixtures/woody_vegetation.csv");
        static HERB_FLOOR: &str = include_str!("../../fixtures/herb_floor_vegetation.csv");

        #[test]
        fn test_richness_by_scope() {
            let bundle = import_vegetation(WOODY, HERB_FLOOR, Utc::now());
            // 3 woody + 5 herb/floor species in P01
            assert_eq!(richness(&bundle.records, "P01", None, None), 8);
            // Shorea (woody) plus Ageratum, Imperata, Leaf litter (SP1-SP2)
            assert_eq!(richness(&bundle.records, "P01", Some("Q1"), None), 4);
            assert_eq!(richness(&bundle.records, "P01", Some("Q1"), Some("SP1")), 2);
            assert_eq!(richness(&bundle.records, "P01", Some("Q3"), Some("SP1")), 0);
            assert_eq!(richness(&bundle.records, "P99", None, None), 0);
        }

        #[test]
        fn test_richness_subplot_needs_quadrant() {
            let bundle = import_vegetation(WOODY, HERB_FLOOR, Utc::now());
            assert_eq!(richness(&bundle.records, "P01", Some("Q1"), Some("SP1")), 2);
            assert_eq!(richness(&bundle.records, "P01", None, Some("SP1")), 0);
        }

        #[test]
        fn test_abundance_by_plot() {
            let bundle = import_vegetation(WOODY, HERB_FLOOR, Utc::now());
            let abundance = abundance_by_plot(&bundle.records, &bundle.species, "P01");
            assert_eq!(abundance[0].species.scientific_name, "Shorea robusta");
            assert_eq!(abundance[0].count, 2);
            assert_eq!(abundance.iter().map(|a| a.count).sum::<usize>(), 9);
        }

        #[test]
        fn test_common_and_rare_species() {
            let bundle = import_vegetation(WOODY, HERB_FLOOR, Utc::now());
            let common = common_species(&bundle.records, &bundle.species, 3);
            assert_eq!(common.len(), 1);
            assert_eq!(common[0].scientific_name, "Shorea robusta");
            assert!(common_species(&bundle.records, &bundle.species, COMMON_THRESHOLD).is_empty());

            let rare = rare_species(&bundle.records, &bundle.species, RARE_THRESHOLD);
            assert_eq!(rare.len(), 8);
            assert!(rare.iter().all(|s| s.scientific_name != "Shorea robusta"));
        }

        #[test]
        fn test_composition_by_plot() {
            let bundle = import_vegetation(WOODY, HERB_FLOOR, Utc::now());
            let composition = composition_by_plot(&bundle.records, &bundle.species);
            assert_eq!(composition.len(), 9);
            let shorea = &composition[0];
            assert_eq!(shorea.plot_counts.get("P01"), Some(&2));
            assert_eq!(shorea.plot_counts.get("P02"), Some(&1));
        }

        #[test]
        fn test_unknown_species_are_skipped() {
            let bundle = import_vegetation(WOODY, "", Utc::now());
            let abundance = abundance_by_plot(&bundle.records, &[], "P01");
            assert!(abundance.is_empty());
            assert!(composition_by_plot(&bundle.records, &[]).is_empty());
        }
    }
}

/// Summary statistics over canopy photo analyses.
pub mod photo_stats {
    use serde::Serialize;
    use veg_model::photo::CanopyPhotoAnalysis;
    use veg_utils::numbers::{mean, round_to};

    #[derive(Debug, Clone, Default, PartialEq, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CanopyStatistics {
        pub total_analyses: usize,
        pub avg_canopy_cover: f64,
        #[serde(rename = "avgLAI")]
        pub avg_lai: f64,
        pub min_canopy_cover: f64,
        pub max_canopy_cover: f64,
    }

    pub fn canopy_statistics(analyses: &[CanopyPhotoAnalysis]) -> CanopyStatistics {
        if analyses.is_empty() {
            return CanopyStatistics::default();
        }
        let covers: Vec<f64> = analyses.iter().map(|a| a.canopy_cover_percentage).collect();
        let lai: Vec<f64> = analyses.iter().map(|a| a.estimated_lai).collect();
        CanopyStatistics {
            total_analyses: analyses.len(),
            avg_canopy_cover: round_to(mean(&covers), 2),
            avg_lai: round_to(mean(&lai), 2),
            min_canopy_cover: round_to(covers.iter().copied().fold(f64::INFINITY, f64::min), 2),
            max_canopy_cover: round_to(covers.iter().copied().fold(f64::NEG_INFINITY, f64::max), 2),
        }
    }

}
