mod config;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use config::Config;
use logging::LogArgs;
use unionindex_pipeline::{Pipeline, PipelineConfig};
use unionindex_project::LineMetadataParserFactory;
use unionindex_store::mongo::{MongoRecordStore, MongoWatermarkStore};
use unionindex_transport::HttpSearchBackend;

#[derive(Debug, Parser)]
#[command(name = "unionindex", about = "Bibliographic full-text search indexing pipeline")]
struct Cli {
    #[clap(flatten)]
    logging: LogArgs,

    /// Path to the YAML configuration file.
    #[arg(long, short = 'c', default_value = "unionindex.yaml", global = true)]
    config: PathBuf,

    /// Run projection and merge but skip the transport POST and watermark
    /// write (spec §3).
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Index new/changed/deleted individual records for one or all sources.
    UpdateIndividualRecords {
        #[arg(long)]
        source_id: Option<String>,
        #[arg(long)]
        single_id: Option<String>,
        #[arg(long)]
        from_date: Option<String>,
        #[arg(long)]
        no_commit: bool,
    },
    /// Rebuild merged ("union") documents for deduplicated record groups.
    UpdateMergedRecords {
        #[arg(long)]
        source_id: Option<String>,
        #[arg(long)]
        single_id: Option<String>,
        #[arg(long)]
        from_date: Option<String>,
        #[arg(long)]
        no_commit: bool,
        /// Remove this source's members from existing merged groups instead
        /// of folding them in.
        #[arg(long)]
        delete: bool,
    },
    /// Delete every document belonging to one data source.
    DeleteDataSource {
        source_id: String,
    },
    /// Ask the search backend to optimize its index.
    OptimizeIndex,
    /// Tally the distinct values of one field across a source's live records.
    CountValues {
        source_id: String,
        field: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.logging);

    let config = Config::load(&cli.config)?;

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo.uri).await?;
    let database = mongo_client.database(&config.mongo.database);
    let store = Arc::new(MongoRecordStore::new(database.clone()));
    let watermarks = Arc::new(MongoWatermarkStore::new(database));

    let backend: Arc<dyn unionindex_transport::SearchBackend> =
        if config.solr.background_update {
            let direct = Arc::new(HttpSearchBackend::new(config.solr.clone())?);
            Arc::new(unionindex_transport::BackgroundTransport::spawn(direct))
        } else {
            Arc::new(HttpSearchBackend::new(config.solr.clone())?)
        };

    let pipeline_config = PipelineConfig {
        data_sources: config.data_sources,
        format_sets: config.format_sets,
        hierarchical_facets: config.hierarchical_facets,
        merged_fields: config
            .merged_fields
            .unwrap_or_else(unionindex_core::settings::default_merged_fields),
        geocoding_field: config.geocoding_field,
        buffer: unionindex_buffer::BufferConfig {
            max_update_records: config.solr.max_update_records,
            max_update_size_bytes: config.solr.max_update_size_bytes(),
            commit_interval: config.solr.max_commit_interval,
        },
        allow_unbounded_dedup_pass: config.allow_unbounded_dedup_pass,
    };

    let pipeline = Pipeline::new(
        store,
        watermarks,
        backend,
        Arc::new(LineMetadataParserFactory),
        std::collections::HashMap::new(),
        pipeline_config,
    )?;

    let no_commit_override = cli.dry_run;

    match cli.command {
        Command::UpdateIndividualRecords { source_id, single_id, from_date, no_commit } => {
            pipeline
                .update_individual_records(
                    from_date.as_deref(),
                    source_id.as_deref(),
                    single_id.as_deref(),
                    no_commit || no_commit_override,
                )
                .await?;
        }
        Command::UpdateMergedRecords { source_id, single_id, from_date, no_commit, delete } => {
            pipeline
                .update_merged_records(
                    from_date.as_deref(),
                    source_id.as_deref(),
                    single_id.as_deref(),
                    no_commit || no_commit_override,
                    delete,
                )
                .await?;
        }
        Command::DeleteDataSource { source_id } => {
            if cli.dry_run {
                tracing::warn!("--dry-run has no effect on delete-data-source; skipping");
            } else {
                pipeline.delete_data_source(&source_id).await?;
            }
        }
        Command::OptimizeIndex => {
            if cli.dry_run {
                tracing::warn!("--dry-run has no effect on optimize-index; skipping");
            } else {
                pipeline.optimize_index().await?;
            }
        }
        Command::CountValues { source_id, field } => {
            let counts = pipeline.count_values(&source_id, &field).await?;
            for (value, count) in counts {
                println!("{count}\t{value}");
            }
        }
    }

    Ok(())
}
