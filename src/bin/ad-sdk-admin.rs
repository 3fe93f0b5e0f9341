use ad_sdk::config::Config;
use ad_sdk::storage;
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ad-sdk-admin")]
#[command(about = "Ad SDK maintenance CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the ads of a package
    List {
        /// Package name of the client application
        package_name: String,
    },
    /// Print click, view and completed view totals
    Summary,
    /// Delete every ad of every package
    Purge {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let storage = storage::open(&config.database).await?;

    match cli.command {
        Commands::List { package_name } => {
            let ads = storage.list(&package_name).await?;
            if ads.is_empty() {
                println!("No ads found for package '{}'.", package_name);
            } else {
                println!(
                    "{:<26} {:<24} {:<6} {:<20} {:>7} {:>7} {:>9}",
                    "ID", "Name", "Type", "Location", "Clicks", "Views", "Completed"
                );
                println!("{}", "-".repeat(105));
                for ad in ads {
                    println!(
                        "{:<26} {:<24} {:<6} {:<20} {:>7} {:>7} {:>9}",
                        ad.id,
                        ad.name,
                        ad.ad_type,
                        ad.ad_location,
                        ad.click_count,
                        ad.view_count,
                        ad.completed_view_count
                    );
                }
            }
        }
        Commands::Summary => {
            let summary = storage.summary().await?;
            println!("Total clicks:          {}", summary.total_clicks);
            println!("Total views:           {}", summary.total_views);
            println!("Total completed views: {}", summary.total_completed_views);
        }
        Commands::Purge { yes } => {
            if !yes {
                println!("⚠ Refusing to delete every ad without --yes");
                return Ok(());
            }
            let deleted = storage.delete_all().await?;
            println!("✓ Deleted {} ads", deleted);
        }
    }

    Ok(())
}
