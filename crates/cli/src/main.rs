use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::Dataset;
use engine::{evaluate_holdout, EngineConfig, HoldoutConfig, HoldoutReport, RankingMetrics, Recommender};
use sources::Recommendation;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// HybridRecs - Yelp-style business recommendation engine
#[derive(Parser)]
#[command(name = "hybrid-recs")]
#[command(
    about = "Business recommendations from review content, collaborative filtering and SVD",
    long_about = None
)]
struct Cli {
    /// Directory with the processed CSV files
    #[arg(short, long, default_value = "data/processed")]
    data_dir: PathBuf,

    /// JSON file overriding the engine defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root directory of the computation cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Use the test subsample (<data-dir>/test) and the test cache generation
    #[arg(long, env = "TESTING")]
    testing: bool,

    /// Recompute every cached stage and overwrite the stored results
    #[arg(long)]
    force_recompute: bool,

    /// Do not read or write the cache
    #[arg(long)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Businesses similar to a business, by review content
    Content {
        /// Business ID (defaults to the first business)
        #[arg(long)]
        id: Option<String>,

        /// Number of recommendations to return
        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Businesses for a user, by similar users' ratings
    Cf {
        /// User ID (defaults to the first user)
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        top_n: Option<usize>,

        /// Number of similar users to consult
        #[arg(long)]
        neighbors: Option<usize>,
    },

    /// Businesses for a user, by latent factors
    Svd {
        /// User ID (defaults to the first user)
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        top_n: Option<usize>,

        /// Number of latent factors
        #[arg(long)]
        n_factors: Option<usize>,
    },

    /// Leave-last-out evaluation of the collaborative recommenders
    Evaluate {
        /// Cut-off for the ranking metrics
        #[arg(long, default_value = "10")]
        k: usize,

        #[arg(long)]
        neighbors: Option<usize>,

        #[arg(long)]
        n_factors: Option<usize>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete the cached results of the selected generation
    ClearCache,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    let data_dir = if cli.testing {
        cli.data_dir.join("test")
    } else {
        cli.data_dir.clone()
    };

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Content { id, top_n } => {
            let recommender = build_recommender(load_dataset(&data_dir)?, &config, cli.testing)?;
            handle_content(&recommender, id, top_n.unwrap_or(config.top_n))?
        }
        Commands::Cf { id, top_n, neighbors } => {
            let recommender = build_recommender(load_dataset(&data_dir)?, &config, cli.testing)?;
            handle_cf(
                &recommender,
                id,
                top_n.unwrap_or(config.top_n),
                neighbors.unwrap_or(config.num_neighbors),
            )?
        }
        Commands::Svd { id, top_n, n_factors } => {
            let recommender = build_recommender(load_dataset(&data_dir)?, &config, cli.testing)?;
            handle_svd(
                &recommender,
                id,
                top_n.unwrap_or(config.top_n),
                n_factors.unwrap_or(config.svd.n_factors),
            )?
        }
        Commands::Evaluate {
            k,
            neighbors,
            n_factors,
            json,
        } => {
            let holdout = HoldoutConfig {
                k,
                num_neighbors: neighbors.unwrap_or(config.num_neighbors),
                svd: config
                    .svd
                    .clone()
                    .with_n_factors(n_factors.unwrap_or(config.svd.n_factors)),
            };
            handle_evaluate(&load_dataset(&data_dir)?, &holdout, json)?
        }
        Commands::ClearCache => handle_clear_cache(&config, cli.testing)?,
    }

    Ok(())
}

/// Engine defaults, then the config file, then command-line flags
fn build_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &cli.cache_dir {
        config = config.with_cache_dir(dir);
    }
    if cli.force_recompute {
        config = config.with_force_recompute(true);
    }
    if cli.no_cache {
        config = config.with_cache_enabled(false);
    }
    Ok(config)
}

fn load_dataset(data_dir: &Path) -> Result<Dataset> {
    println!("Loading processed dataset from {}...", data_dir.display());
    let start = Instant::now();
    let dataset = Dataset::load_from_dir(data_dir)
        .with_context(|| format!("Failed to load dataset from {}", data_dir.display()))?;
    println!("{} Loaded dataset in {:?}", "✓".green(), start.elapsed());
    Ok(dataset)
}

fn build_recommender(dataset: Dataset, config: &EngineConfig, testing: bool) -> Result<Recommender> {
    let backend = config.cache.backend(testing);
    Recommender::new(dataset, config.clone(), backend).context("Failed to initialize recommender")
}

/// Handle the 'content' command
fn handle_content(recommender: &Recommender, id: Option<String>, top_n: usize) -> Result<()> {
    let dataset = recommender.dataset();
    let business_id = match id {
        Some(id) => id,
        None => {
            let first = dataset
                .businesses
                .first()
                .ok_or_else(|| anyhow!("The dataset has no businesses"))?;
            println!("No business id provided. Using default: {}", first.id);
            first.id.clone()
        }
    };

    println!("Building item profiles using content-based filtering...");
    let recommendations = recommender.recommend_content_scored(&business_id, top_n)?;

    let title = format!(
        "Content-based recommendations for business '{}':",
        business_display_name(dataset, &business_id)
    );
    print_recommendations(dataset, &title, &recommendations);
    Ok(())
}

/// Handle the 'cf' command
fn handle_cf(
    recommender: &Recommender,
    id: Option<String>,
    top_n: usize,
    num_neighbors: usize,
) -> Result<()> {
    let user_id = resolve_user(recommender, id)?;

    println!("Generating collaborative filtering recommendations...");
    let recommendations = recommender.recommend_cf_scored(&user_id, top_n, num_neighbors)?;

    let title = format!(
        "Collaborative filtering recommendations for user '{}':",
        user_display_name(recommender.dataset(), &user_id)
    );
    print_recommendations(recommender.dataset(), &title, &recommendations);
    Ok(())
}

/// Handle the 'svd' command
fn handle_svd(
    recommender: &Recommender,
    id: Option<String>,
    top_n: usize,
    n_factors: usize,
) -> Result<()> {
    let user_id = resolve_user(recommender, id)?;

    println!("Generating matrix factorization (SVD) recommendations...");
    let recommendations = recommender.recommend_svd_scored(&user_id, top_n, n_factors)?;

    let title = format!(
        "Matrix factorization (SVD, {} factors) recommendations for user '{}':",
        n_factors,
        user_display_name(recommender.dataset(), &user_id)
    );
    print_recommendations(recommender.dataset(), &title, &recommendations);
    Ok(())
}

/// Handle the 'evaluate' command
fn handle_evaluate(dataset: &Dataset, config: &HoldoutConfig, json: bool) -> Result<()> {
    println!("Evaluating on a leave-last-out split...");
    let report = evaluate_holdout(&dataset.ratings, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Handle the 'clear-cache' command
fn handle_clear_cache(config: &EngineConfig, testing: bool) -> Result<()> {
    match config.cache.backend(testing) {
        cache::CacheBackend::Disk(disk) => {
            let removed = disk.clear().context("Failed to clear cache")?;
            println!(
                "{} Removed {} cached results from {}",
                "✓".green(),
                removed,
                disk.generation_dir().display()
            );
        }
        cache::CacheBackend::Disabled => println!("Cache is disabled, nothing to clear"),
    }
    Ok(())
}

/// The requested user, or the first user of the interaction matrix
fn resolve_user(recommender: &Recommender, id: Option<String>) -> Result<String> {
    match id {
        Some(id) => Ok(id),
        None => {
            let first = recommender
                .matrix()
                .user_ids()
                .first()
                .ok_or_else(|| anyhow!("The dataset has no ratings"))?;
            println!("No user id provided. Using default: {}", first);
            Ok(first.clone())
        }
    }
}

fn business_display_name<'a>(dataset: &'a Dataset, business_id: &str) -> &'a str {
    dataset.business_name(business_id).unwrap_or("Unknown")
}

fn user_display_name<'a>(dataset: &'a Dataset, user_id: &str) -> &'a str {
    dataset.user_name(user_id).unwrap_or("Unknown")
}

/// Helper function to format and print recommendations
fn print_recommendations(dataset: &Dataset, title: &str, recommendations: &[Recommendation]) {
    println!("{}", title.bold().blue());
    if recommendations.is_empty() {
        println!("  {}", "No recommendations".yellow());
        return;
    }
    for (rank, rec) in recommendations.iter().enumerate() {
        println!(
            "{}. {} ({}) - Score: {:.3}",
            (rank + 1).to_string().green(),
            business_display_name(dataset, &rec.item_id),
            rec.item_id.dimmed(),
            rec.score
        );
    }
}

fn print_report(report: &HoldoutReport) {
    println!(
        "{}",
        format!(
            "Hold-out evaluation @{} over {} users",
            report.k, report.users_evaluated
        )
        .bold()
        .blue()
    );
    print_metrics("Collaborative filtering", &report.neighborhood);
    print_metrics("Matrix factorization", &report.latent_factor);
    match report.latent_factor_rmse {
        Some(rmse) => println!("{}SVD RMSE on held-out ratings: {:.4}", "• ".cyan(), rmse),
        None => println!("{}SVD RMSE: no held-out item left in training", "• ".cyan()),
    }
}

fn print_metrics(name: &str, metrics: &RankingMetrics) {
    println!(
        "{}{}: precision {:.4}, recall {:.4}, F1 {:.4}, NDCG {:.4}",
        "• ".green(),
        name,
        metrics.precision,
        metrics.recall,
        metrics.f1,
        metrics.ndcg
    );
}
