mod search;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use trendscout_core::Platform;

#[derive(Debug, Parser)]
#[command(name = "trendscout-cli")]
#[command(about = "Trendscout operator command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Run one search synchronously and print the ranked result
    Search {
        /// Identity subject of the user to run the search as
        #[arg(long)]
        user: String,
        /// Page name or profile URL to search
        #[arg(long)]
        keyword: String,
        /// FACEBOOK, INSTAGRAM or TIKTOK (case-insensitive)
        #[arg(long)]
        platform: Platform,
        /// Result cap passed to the content source (1-100, default 20)
        #[arg(long)]
        max_results: Option<u32>,
    },
    /// Show a user's quota for the current period
    Quota {
        /// Identity subject of the user
        #[arg(long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = trendscout_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let pool_config = trendscout_db::PoolConfig::from_app_config(&config);
    let pool = trendscout_db::connect_pool(&config.database_url, pool_config).await?;

    match cli.command {
        Commands::Migrate => {
            let applied = trendscout_db::run_migrations(&pool).await?;
            println!("migrations applied: {applied}");
        }
        Commands::Search {
            user,
            keyword,
            platform,
            max_results,
        } => {
            search::run_search(pool, &config, &user, keyword, platform, max_results).await?;
        }
        Commands::Quota { user } => {
            search::show_quota(pool, &user).await?;
        }
    }

    Ok(())
}
