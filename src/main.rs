mod browser;
mod db;
mod document;
mod error;
mod extract;
mod report;
mod settings;
#[cfg(test)]
mod testing;
mod traversal;

use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use browser::ChromeDocument;
use settings::Settings;
use db::SqliteSink;
use traversal::{RunContext, Traversal};

#[derive(Parser)]
#[command(name = "qcor_scraper", about = "QCOR drill-down report scraper")]
struct Cli {
    /// SQLite database file (overrides settings)
    #[arg(long, global = true, env = "QCOR_DB_PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the provider table
    Init {
        /// Delete any existing database first
        #[arg(long)]
        fresh: bool,
    },
    /// Open the report, walk every provider and store it
    Run {
        /// Reporting year for both the begin and end year controls
        #[arg(short, long, env = "QCOR_YEAR")]
        year: Option<String>,
        /// Report entry URL
        #[arg(long, env = "QCOR_REPORT_URL")]
        url: Option<String>,
        /// Delete any existing database first
        #[arg(long)]
        fresh: bool,
        /// Show the browser window
        #[arg(long)]
        headful: bool,
    },
    /// Show stored record counts
    Stats,
    /// Print stored records as JSON lines
    Export {
        /// Max records to print
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    let result = match cli.command {
        Commands::Init { fresh } => {
            if fresh {
                db::remove_existing(&settings.db_path)?;
            }
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            println!("Database ready at {}", settings.db_path.display());
            Ok(())
        }
        Commands::Run {
            year,
            url,
            fresh,
            headful,
        } => {
            if let Some(year) = year {
                settings.year = year;
            }
            if let Some(url) = url {
                settings.report_url = url;
            }
            if headful {
                settings.headless = false;
            }
            if fresh {
                db::remove_existing(&settings.db_path)?;
            }
            run(&settings).await
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Records:          {}", s.total);
            println!("Unparsed address: {}", s.unparsed_address);
            if !s.by_state.is_empty() {
                println!("\n--- By state ---");
                for (state, n) in &s.by_state {
                    println!("  {}: {}", state, n);
                }
            }
            Ok(())
        }
        Commands::Export { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let records = db::fetch_records(&conn, limit)?;
            let mut out = std::io::stdout().lock();
            for r in &records {
                serde_json::to_writer(&mut out, r)?;
                writeln!(out)?;
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run(settings: &Settings) -> anyhow::Result<()> {
    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;

    info!("Scraping {} for year {}", settings.report_url, settings.year);
    let mut document = ChromeDocument::launch(settings.headless)
        .await
        .context("Failed to launch browser")?;
    if let Err(e) = document
        .open_report(&settings.report_url, &settings.year, settings.settle_timeout())
        .await
    {
        document.shutdown().await;
        return Err(e).context("Report never reached a navigable state");
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));

    let mut traversal = Traversal::new(RunContext {
        document,
        sink: SqliteSink::new(conn),
        layout: settings.layout(),
        retry: settings.retry_policy(),
        settle_timeout: settings.settle_timeout(),
    })
    .with_progress(pb);

    let outcome = traversal.run().await;
    debug!("Final cursor: {:?}", traversal.cursor());
    traversal.into_context().document.shutdown().await;
    let summary = outcome?;

    println!(
        "Done: {} records saved from {} leaves in {} groups ({} skipped).",
        summary.persisted,
        summary.leaves,
        summary.groups,
        summary.skipped.len()
    );
    for s in &summary.skipped {
        println!(
            "  skipped row {} (group {}, subgroup {}, leaf {})",
            s.row, s.level1_order, s.level2_order, s.level3_order
        );
    }
    Ok(())
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
