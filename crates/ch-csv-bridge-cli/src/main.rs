//! ch-csv-bridge CLI - move data between ClickHouse tables and CSV files.

use ch_csv_bridge::{Bridge, BridgeError, Config, TransferResult, TransferStatus};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

/// Exit code after Ctrl-C (128 + SIGINT).
const INTERRUPTED_EXIT_CODE: u8 = 130;

#[derive(Parser)]
#[command(name = "ch-csv-bridge")]
#[command(about = "Move data between ClickHouse tables and CSV files")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "bridge.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Test the ClickHouse connection
    HealthCheck,

    /// List tables in the configured database
    Tables,

    /// Show the columns of a table
    Describe {
        /// Table name
        table: String,
    },

    /// Show the first rows of a table
    Preview {
        /// Table name
        table: String,

        /// Comma-separated columns to show [default: all]
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Maximum rows to show [default: transfer.preview_limit]
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Export a table to a CSV file
    Export {
        /// Table name
        table: String,

        /// Comma-separated columns to export, in output order [default: all]
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Output file [default: <output_dir>/<table>_export.csv]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override rows per batch
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Import a CSV file into a table.
    ///
    /// Rows are appended: importing the same file twice duplicates its rows.
    /// A missing table is created from the file header with every column
    /// typed Nullable(String).
    Import {
        /// CSV file with a header line
        file: PathBuf,

        /// Destination table
        #[arg(short, long)]
        table: String,

        /// Comma-separated header columns to load [default: all]
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Override rows per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Override the per-batch failed-row fraction that aborts the import
        #[arg(long)]
        max_error_fraction: Option<f64>,

        /// Fail instead of creating a missing table
        #[arg(long)]
        no_create: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tokio::select! {
        result = run() => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}", e.format_detailed());
                ExitCode::from(e.exit_code())
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nInterrupted. Rows already written are kept.");
            ExitCode::from(INTERRUPTED_EXIT_CODE)
        }
    }
}

async fn run() -> Result<(), BridgeError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| BridgeError::Config(e.to_string()))?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::HealthCheck => {
            let bridge = Bridge::clickhouse(config.transfer.clone());
            let result = bridge.test_connection(&config.connection).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  ClickHouse {}:{}/{}: {} ({}ms)",
                    config.connection.host,
                    config.connection.port,
                    config.connection.database,
                    if result.connected { "OK" } else { "FAILED" },
                    result.latency_ms
                );
                if let Some(ref err) = result.error {
                    println!("    Error: {}", err);
                }
            }

            if !result.connected {
                return Err(BridgeError::Connection(
                    result
                        .error
                        .unwrap_or_else(|| "health check failed".to_string()),
                ));
            }
        }

        Commands::Tables => {
            let bridge = Bridge::clickhouse(config.transfer.clone());
            let tables = bridge.list_tables(&config.connection).await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&tables)?);
            } else {
                for table in &tables {
                    println!("{}", table);
                }
            }
        }

        Commands::Describe { table } => {
            let bridge = Bridge::clickhouse(config.transfer.clone());
            let schema = bridge.describe_table(&config.connection, &table).await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&schema)?);
            } else {
                let width = schema
                    .columns
                    .iter()
                    .map(|c| c.name.len())
                    .max()
                    .unwrap_or(0);
                println!("{}:", schema.name);
                for col in &schema.columns {
                    println!("  {:width$}  {}", col.name, col.type_name, width = width);
                }
            }
        }

        Commands::Preview {
            table,
            columns,
            limit,
        } => {
            if let Some(limit) = limit {
                config.transfer.preview_limit = limit;
            }
            let bridge = Bridge::clickhouse(config.transfer.clone());
            let preview = bridge
                .preview(&config.connection, &table, &columns)
                .await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&preview)?);
            } else {
                let coercer = bridge.coercer();
                let names: Vec<&str> = preview.columns.iter().map(|c| c.name.as_str()).collect();
                println!("{}", names.join("\t"));
                for row in &preview.rows {
                    let cells: Vec<String> = row
                        .iter()
                        .zip(&preview.columns)
                        .map(|(v, c)| coercer.to_text(v, &c.native))
                        .collect();
                    println!("{}", cells.join("\t"));
                }
                println!("({} rows)", preview.rows.len());
            }
        }

        Commands::Export {
            table,
            columns,
            output,
            batch_size,
        } => {
            if let Some(n) = batch_size {
                config.transfer.batch_size = n;
            }
            config.validate()?;
            let bridge = Bridge::clickhouse(config.transfer.clone());
            let result = bridge
                .export_to_file(&config.connection, &table, &columns, output.as_deref())
                .await?;
            report(&result, cli.output_json)?;
        }

        Commands::Import {
            file,
            table,
            columns,
            batch_size,
            max_error_fraction,
            no_create,
        } => {
            if let Some(n) = batch_size {
                config.transfer.batch_size = n;
            }
            if let Some(f) = max_error_fraction {
                config.transfer.max_error_fraction = f;
            }
            if no_create {
                config.transfer.create_if_missing = false;
            }
            config.validate()?;
            let bridge = Bridge::clickhouse(config.transfer.clone());
            let result = bridge
                .import_from_file(&config.connection, &file, &table, &columns)
                .await?;
            report(&result, cli.output_json)?;

            if let Some(cause) = result.abort_cause() {
                return Err(cause);
            }
        }
    }

    Ok(())
}

fn report(result: &TransferResult, as_json: bool) -> Result<(), BridgeError> {
    if as_json {
        println!("{}", result.to_json()?);
        return Ok(());
    }

    let status = match result.status {
        TransferStatus::Success => "Transfer completed!",
        TransferStatus::Partial => "Transfer completed with skipped rows.",
        TransferStatus::Failure => "Transfer aborted.",
    };
    println!("\n{}", status);
    if let Some(ref dest) = result.destination {
        println!("  Destination: {}", dest);
    }
    println!("  Rows: {}", result.rows_processed);
    println!("  Duration: {:.2}s", result.duration_ms as f64 / 1000.0);
    if result.table_created {
        println!("  Table created from file header");
    }
    if !result.errors.is_empty() {
        println!("  Row errors: {}", result.errors.len());
        for err in result.errors.iter().take(20) {
            println!("    {}", err);
        }
        if result.errors.len() > 20 {
            println!("    ... and {} more", result.errors.len() - 20);
        }
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout stays parseable with --output-json.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
