use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Data source name attached to a project by a CSV field-data import.
pub const FIELD_DATA_SOURCE: &str = "Field Data";

pub const DEFAULT_PROJECT_ID: &str = "proj_1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Completed,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProjectStatus::Active),
            "completed" => Ok(ProjectStatus::Completed),
            "archived" => Ok(ProjectStatus::Archived),
            other => Err(format!("unknown project status '{}'", other)),
        }
    }
}

/// A survey project and the aggregate counts refreshed after each import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub tools: Vec<String>,
    pub data_sources: Vec<String>,
    pub progress: u8,
    pub plot_count: u32,
    pub species_count: u32,
    pub record_count: u32,
    pub total_data_points: u32,
    pub last_synced: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(id: &str, name: &str, description: &str, at: DateTime<Utc>) -> Project {
        Project {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            status: ProjectStatus::Active,
            tools: Vec::new(),
            data_sources: Vec::new(),
            progress: 0,
            plot_count: 0,
            species_count: 0,
            record_count: 0,
            total_data_points: 0,
            last_synced: None,
            created_at: at,
            updated_at: at,
        }
    }

    /// Add a data source name if not already present.
    pub fn add_data_source(&mut self, source: &str) {
        if !self.data_sources.iter().any(|s| s == source) {
            self.data_sources.push(source.to_string());
        }
    }
}

/// Project created when the store holds none.
pub fn default_project(at: DateTime<Utc>) -> Project {
    let mut project = Project::new(
        DEFAULT_PROJECT_ID,
        "Default Vegetation Analysis",
        "Default project for vegetation field data analysis",
        at,
    );
    project.tools = ["Plot Visualizer", "Species Analysis", "Canopy Analysis"]
        .iter()
        .map(|t| t.to_string())
        .collect();
    project.progress = 10;
    project
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_project() {
        let p = default_project(Utc::now());
        assert_eq!(p.id, "proj_1");
        assert_eq!(p.status, ProjectStatus::Active);
        assert_eq!(p.tools.len(), 3);
        assert_eq!(p.progress, 10);
        assert!(p.data_sources.is_empty());
    }

    #[test]
    fn test_data_sources_are_a_set() {
        let mut p = default_project(Utc::now());
        p.add_data_source(FIELD_DATA_SOURCE);
        p.add_data_source(FIELD_DATA_SOURCE);
        assert_eq!(p.data_sources, vec!["Field Data".to_string()]);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("archived".parse::<ProjectStatus>(), Ok(ProjectStatus::Archived));
        assert!("paused".parse::<ProjectStatus>().is_err());
    }
}
