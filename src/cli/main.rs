use anyhow::Context;
use clap::{Parser, Subcommand};
use rt_archive::{
    config::{Config, IngestSettings},
    ingest::{self, IngestConfig},
    search::{CancelSignal, SearchConfigBuilder, SearchService, SortOrder, TicketQuery},
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "rt-archive-cli")]
#[command(about = "Build and query an RT archive", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build index.json and the search index from exported tickets
    Index {
        /// Directory or .zip of <id>.json ticket documents
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Output directory (defaults to the data directory)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Name of the search index directory
        #[arg(long)]
        index_name: Option<String>,

        /// Search indexing batch size
        #[arg(short, long)]
        batch: Option<usize>,

        /// Number of ticket files to read at once
        #[arg(short, long)]
        parallel_read: Option<usize>,
    },

    /// Search the index
    Search {
        /// Search index directory
        #[arg(short, long)]
        index: Option<PathBuf>,

        /// Number of hits to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,

        /// Sort ascending by id
        #[arg(short, long)]
        ascending: bool,

        /// Query words
        #[arg(value_name = "QUERY")]
        query: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("rt_archive={}", config.observability.log_level).into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Index {
            data,
            out,
            index_name,
            batch,
            parallel_read,
        } => {
            let defaults = &config.ingest;
            let data_path = data.unwrap_or_else(|| defaults.data_path.clone());
            let settings = IngestSettings {
                out_dir: out.unwrap_or_else(|| output_dir(&data_path, defaults)),
                data_path,
                index_name: index_name.unwrap_or_else(|| defaults.index_name.clone()),
                batch_size: batch.unwrap_or(defaults.batch_size),
                parallel_reads: parallel_read.unwrap_or(defaults.parallel_reads),
            };
            let ingest_config =
                IngestConfig::from_settings(&settings, config.search.writer_heap_size);

            println!("outputs:");
            println!(" {}", ingest_config.manifest_path().display());
            println!(" {}", ingest_config.index_path().display());

            let report = ingest::run(&ingest_config).await?;
            println!(
                "tickets: {} (indexed {}, skipped {}) in {:.1?}",
                report.tickets, report.indexed, report.skipped, report.took
            );
        }

        Commands::Search {
            index,
            limit,
            ascending,
            query,
        } => {
            let text = if query.is_empty() {
                "status:open".to_string()
            } else {
                query.join(" ")
            };
            let order = if ascending {
                SortOrder::Ascending
            } else {
                SortOrder::Descending
            };

            let service = SearchService::open(
                SearchConfigBuilder::new()
                    .index_path(index.unwrap_or_else(|| config.search.index_path.clone()))
                    .search_timeout(std::time::Duration::from_secs(
                        config.search.search_timeout_secs,
                    ))
                    .build(),
            )?;

            let query = TicketQuery::new(&text)
                .with_order(order)
                .with_limit(limit)
                .with_highlight(true);
            let response = service.search(&query, CancelSignal::new()).await?;

            for hit in &response.hits {
                let subject = hit
                    .highlight
                    .as_ref()
                    .map(|h| h.render_ansi())
                    .unwrap_or_else(|| hit.subject.clone());
                println!("{}\t{}\t({})", hit.id, subject, hit.status);
            }
            println!(
                "{} of {} matches in {:.1?}",
                response.hits.len(),
                response.total_hits,
                response.took
            );
        }
    }

    Ok(())
}

/// Outputs go next to the data unless configured otherwise; a zipped export
/// writes beside the archive.
fn output_dir(data_path: &std::path::Path, defaults: &IngestSettings) -> PathBuf {
    if defaults.out_dir != defaults.data_path {
        return defaults.out_dir.clone();
    }
    if data_path.is_dir() {
        data_path.to_path_buf()
    } else {
        data_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
