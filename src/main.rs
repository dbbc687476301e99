//! # Study Scout CLI (`scout`)
//!
//! The `scout` binary is the primary interface for Study Scout. It provides
//! commands for finding learning resources, inspecting the course catalog,
//! and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! scout --config ./config/scout.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scout find "<query>"` | Find resources for a learning question |
//! | `scout find --image <path>` | Find resources for an image of course content |
//! | `scout courses` | List the courses visible in the platform catalog |
//! | `scout serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! # Text query
//! scout find "How do process scheduling algorithms work?"
//!
//! # Image plus text, with full result details
//! scout find "explain this diagram" --image assets/orthogonal.png --verbose
//!
//! # Start the server on the configured bind address
//! scout serve --config ./config/scout.toml
//! ```
//!
//! Credentials come from the environment: `SCOUT_LMS_TOKEN` for the platform
//! bearer token, `SCOUT_ORACLE_KEY` for the classifier API key. `find` exits
//! non-zero when no resources are found, for automation friendliness.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use study_scout::catalog::{CatalogSource, LmsCatalog};
use study_scout::config;
use study_scout::models::Findings;
use study_scout::oracle::{GeminiOracle, Oracle};
use study_scout::pipeline::Pipeline;
use study_scout::server;

/// Study Scout CLI — find learning resources in a course-management
/// platform from a free-text question or an image.
#[derive(Parser)]
#[command(
    name = "scout",
    about = "Study Scout — a course-aware learning resource finder for LMS platforms",
    version,
    long_about = "Study Scout routes a learning question (or an image of educational content) \
    through a course → module → item resolution pipeline over a course-management platform, \
    returning the most relevant resources as one ranked list."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Built-in defaults are used when the file does not exist.
    #[arg(long, global = true, default_value = "./config/scout.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Find learning resources for a question and/or an image.
    ///
    /// At least one of the query or `--image` must be given. Prints each
    /// resource's title and URL; `--verbose` adds type, course, module,
    /// and relevance score.
    Find {
        /// The learning question to search for.
        query: Option<String>,

        /// Path to an image of educational content to analyze.
        #[arg(long)]
        image: Option<PathBuf>,

        /// Print type, course, module, and relevance for each result.
        #[arg(short, long)]
        verbose: bool,
    },

    /// List the courses visible in the platform catalog.
    Courses,

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// `/resources` endpoint.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Arc::new(config::load_or_default(&cli.config)?);

    match cli.command {
        Commands::Find {
            query,
            image,
            verbose,
        } => {
            let query = query.unwrap_or_default();
            if query.trim().is_empty() && image.is_none() {
                anyhow::bail!("provide a query, an --image, or both");
            }
            if let Some(path) = &image {
                if !path.exists() {
                    anyhow::bail!("image file does not exist: {}", path.display());
                }
            }

            let catalog: Arc<dyn CatalogSource> = Arc::new(LmsCatalog::new(&cfg.catalog)?);
            let oracle: Arc<dyn Oracle> = Arc::new(GeminiOracle::new(&cfg.oracle)?);
            let pipeline = Pipeline::new(catalog, oracle, Arc::clone(&cfg));

            let findings = pipeline.find_resources(&query, image.as_deref()).await?;
            match findings {
                Findings::Resources(resources) => {
                    println!("Found {} resources:", resources.len());
                    for (i, resource) in resources.iter().enumerate() {
                        println!("\n{}. {}", i + 1, resource.title);
                        let url = if resource.url.is_empty() {
                            "No URL"
                        } else {
                            resource.url.as_str()
                        };
                        println!("   URL: {}", url);
                        if verbose {
                            println!("   Type: {}", resource.resource_type);
                            println!("   Course: {}", resource.course);
                            println!("   Module: {}", resource.module);
                            println!("   Relevance: {:.2}", resource.relevance_score);
                        }
                    }
                }
                Findings::Empty(record) => {
                    eprintln!("{}", record.error);
                    if let Some(course) = &record.course {
                        eprintln!("  course: {}", course);
                    }
                    if let Some(details) = &record.details {
                        eprintln!("  details: {}", details);
                    }
                    std::process::exit(1);
                }
            }
        }

        Commands::Courses => {
            let catalog = LmsCatalog::new(&cfg.catalog)?;
            let courses = catalog.list_courses().await?;
            if courses.is_empty() {
                println!("No courses visible.");
            } else {
                println!("{:<10} NAME", "ID");
                for course in courses.iter() {
                    println!("{:<10} {}", course.id, course.name);
                }
            }
        }

        Commands::Serve => {
            let catalog: Arc<dyn CatalogSource> = Arc::new(LmsCatalog::new(&cfg.catalog)?);
            let oracle: Arc<dyn Oracle> = Arc::new(GeminiOracle::new(&cfg.oracle)?);
            let pipeline = Arc::new(Pipeline::new(catalog, oracle, Arc::clone(&cfg)));
            server::run_server(&cfg, pipeline).await?;
        }
    }

    Ok(())
}
