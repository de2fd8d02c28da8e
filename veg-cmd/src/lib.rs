//! Command implementations for the veg CLI.
//!
//! Provides subcommands for managing survey projects, importing field
//! sheets, summarising canopy cover and species, and analysing canopy
//! photos. Every command prints its result as JSON on stdout.

use clap::Subcommand;
use veg_db::Database;
use veg_model::{client::ClientConfig, project::DEFAULT_PROJECT_ID};

pub mod photo;
pub mod survey;

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite file, or `:memory:`
    pub db_path: String,
    pub client: ClientConfig,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the default project if no project exists yet
    InitProject,

    /// List all projects
    Projects,

    /// Import woody and herb/floor survey sheets (local paths or URLs)
    Import {
        /// Woody vegetation CSV
        #[arg(short = 'w', long)]
        woody: Option<String>,

        /// Herb/floor vegetation CSV
        #[arg(short = 'f', long)]
        herb_floor: Option<String>,

        #[arg(short, long, default_value = DEFAULT_PROJECT_ID)]
        project: String,
    },

    /// List plots of a project, or show one plot with its quadrants and
    /// records
    Plots {
        #[arg(short, long, default_value = DEFAULT_PROJECT_ID)]
        project: String,

        #[arg(long)]
        plot_id: Option<String>,
    },

    /// Add a plot by hand
    AddPlot {
        #[arg(short, long, default_value = DEFAULT_PROJECT_ID)]
        project: String,

        /// Survey plot id, e.g. P03
        #[arg(long)]
        plot_id: String,

        #[arg(long, default_value = "")]
        location: String,

        #[arg(long)]
        latitude: Option<f64>,

        #[arg(long)]
        longitude: Option<f64>,

        /// Elevation in metres
        #[arg(long)]
        elevation: Option<f64>,

        /// e.g. 10x10m
        #[arg(long)]
        size: Option<String>,

        #[arg(long)]
        habitat: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a plot and everything recorded in it
    DeletePlot {
        #[arg(short, long, default_value = DEFAULT_PROJECT_ID)]
        project: String,

        #[arg(long)]
        plot_id: String,
    },

    /// Canopy cover per plot (all plots when none are given)
    Cover {
        #[arg(short, long, default_value = DEFAULT_PROJECT_ID)]
        project: String,

        /// Plot ids to analyse
        #[arg(long = "plot")]
        plots: Vec<String>,
    },

    /// Canopy cover per subplot of one quadrant
    Subplots {
        #[arg(short, long, default_value = DEFAULT_PROJECT_ID)]
        project: String,

        #[arg(long)]
        plot_id: String,

        #[arg(long, default_value = "Q1")]
        quadrant_id: String,
    },

    /// Averages of plot-level canopy cover across a project
    CoverSummary {
        #[arg(short, long, default_value = DEFAULT_PROJECT_ID)]
        project: String,
    },

    /// Species richness, abundance and composition
    Species {
        #[arg(short, long, default_value = DEFAULT_PROJECT_ID)]
        project: String,

        /// Restrict richness and abundance to one plot
        #[arg(long)]
        plot_id: Option<String>,

        #[arg(long, default_value_t = veg_data::species::COMMON_THRESHOLD)]
        common_threshold: usize,

        #[arg(long, default_value_t = veg_data::species::RARE_THRESHOLD)]
        rare_threshold: usize,
    },

    /// Analyse one canopy photo
    AnalyzePhoto {
        /// Local path or URL of the photo
        image: String,

        /// Plot id; inferred from the file name when omitted
        #[arg(long)]
        plot_id: Option<String>,

        /// Quadrant id; inferred from the file name when omitted
        #[arg(long)]
        quadrant_id: Option<String>,
    },

    /// Analyse several canopy photos, inferring plot and quadrant from
    /// each file name
    AnalyzePhotos {
        #[arg(required = true)]
        images: Vec<String>,
    },

    /// Upload a photo to the analysis backend
    UploadImage {
        image: String,

        #[arg(short, long, default_value = DEFAULT_PROJECT_ID)]
        project: String,

        #[arg(long)]
        plot_id: String,

        #[arg(long)]
        quadrant_id: String,
    },

    /// List stored photo analyses with summary statistics
    Analyses {
        #[arg(long)]
        plot_id: Option<String>,
    },

    /// Delete a stored photo analysis
    DeleteAnalysis {
        id: String,
    },
}

/// Open the store, run one command and print its JSON result.
pub async fn run(command: Command, settings: &Settings) -> anyhow::Result<()> {
    let db = Database::open(&settings.db_path)?;
    let output = execute(command, &db, &settings.client).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Run one command against an open store.
pub async fn execute(
    command: Command,
    db: &Database,
    client: &ClientConfig,
) -> anyhow::Result<serde_json::Value> {
    match command {
        Command::InitProject => survey::init_project(db),
        Command::Projects => survey::list_projects(db),
        Command::Import {
            woody,
            herb_floor,
            project,
        } => survey::import(db, &project, woody.as_deref(), herb_floor.as_deref()).await,
        Command::Plots { project, plot_id } => match plot_id {
            Some(plot_id) => survey::plot_details(db, &project, &plot_id),
            None => survey::list_plots(db, &project),
        },
        Command::AddPlot {
            project,
            plot_id,
            location,
            latitude,
            longitude,
            elevation,
            size,
            habitat,
            notes,
        } => {
            let mut plot = veg_model::plot::Plot::new(&plot_id, &location, veg_utils::dates::now());
            plot.latitude = latitude;
            plot.longitude = longitude;
            plot.elevation = elevation;
            plot.size = size;
            plot.habitat_type = habitat;
            plot.notes = notes;
            survey::add_plot(db, &project, plot)
        }
        Command::DeletePlot { project, plot_id } => survey::delete_plot(db, &project, &plot_id),
        Command::Cover { project, plots } => survey::cover(db, &project, &plots),
        Command::Subplots {
            project,
            plot_id,
            quadrant_id,
        } => survey::subplots(db, &project, &plot_id, &quadrant_id),
        Command::CoverSummary { project } => survey::cover_summary(db, &project),
        Command::Species {
            project,
            plot_id,
            common_threshold,
            rare_threshold,
        } => survey::species(
            db,
            &project,
            plot_id.as_deref(),
            common_threshold,
            rare_threshold,
        ),
        Command::AnalyzePhoto {
            image,
            plot_id,
            quadrant_id,
        } => photo::analyze_photo(db, client, &image, plot_id, quadrant_id).await,
        Command::AnalyzePhotos { images } => photo::analyze_photos(db, client, &images).await,
        Command::UploadImage {
            image,
            project,
            plot_id,
            quadrant_id,
        } => photo::upload_image(client, &project, &image, &plot_id, &quadrant_id).await,
        Command::Analyses { plot_id } => photo::list_analyses(db, plot_id.as_deref()),
        Command::DeleteAnalysis { id } => photo::delete_analysis(db, &id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::time::Duration;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: Command,
    }

    fn parse(args: &[&str]) -> Command {
        TestCli::try_parse_from(std::iter::once("veg-cli").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    fn offline() -> ClientConfig {
        ClientConfig {
            api_base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn subcommands_use_default_project() {
        match parse(&["cover", "--plot", "P01", "--plot", "P02"]) {
            Command::Cover { project, plots } => {
                assert_eq!(project, DEFAULT_PROJECT_ID);
                assert_eq!(plots, vec!["P01", "P02"]);
            }
            _ => panic!("expected cover"),
        }
        match parse(&["species"]) {
            Command::Species {
                common_threshold,
                rare_threshold,
                ..
            } => assert_eq!((common_threshold, rare_threshold), (5, 2)),
            _ => panic!("expected species"),
        }
        assert!(TestCli::try_parse_from(["veg-cli", "analyze-photos"]).is_err());
    }

    #[tokio::test]
    async fn commands_share_one_store() {
        let db = Database::new().unwrap();
        let config = offline();
        let woody = concat!(env!("CARGO_MANIFEST_DIR"), "/../fixtures/woody_vegetation.csv");

        execute(parse(&["init-project"]), &db, &config).await.unwrap();
        execute(parse(&["import", "--woody", woody]), &db, &config)
            .await
            .unwrap();
        execute(
            parse(&["add-plot", "--plot-id", "P03", "--location", "Valley Floor", "--latitude", "27.6"]),
            &db,
            &config,
        )
        .await
        .unwrap();

        let plots = execute(parse(&["plots"]), &db, &config).await.unwrap();
        assert_eq!(plots.as_array().unwrap().len(), 3);
        assert_eq!(plots[2]["latitude"], 27.6);

        let projects = execute(parse(&["projects"]), &db, &config).await.unwrap();
        assert_eq!(projects[0]["plotCount"], 3);
        assert_eq!(projects[0]["recordCount"], 6);
    }
}
