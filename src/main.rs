//! `apptheory-synth`: synthesize an app file into a CloudFormation template.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use apptheory_constructs::config::{load_config, synthesize_file, ConfigWatcher};
use apptheory_constructs::dns::to_route53_record_name;
use apptheory_constructs::observability::{init_logging, LogFormat};
use apptheory_constructs::Template;

#[derive(Parser)]
#[command(name = "apptheory-synth")]
#[command(about = "Synthesize AppTheory constructs into CloudFormation", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize an app file
    Synth {
        #[arg(short, long)]
        config: PathBuf,

        /// Write the template here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,

        /// Keep running and resynthesize whenever the file changes
        #[arg(long)]
        watch: bool,
    },
    /// Check an app file and every construct in it, without writing a template
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the Route53 record name of a domain relative to its zone
    RecordName { fqdn: String, zone: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Commands::Synth {
            config,
            out,
            compact,
            watch,
        } => {
            let template = synthesize_file(&config)?;
            emit(&template, out.as_deref(), compact)?;
            if watch {
                watch_and_emit(&config, out.as_deref(), compact).await?;
            }
        }
        Commands::Validate { config } => {
            let app = load_config(&config)?;
            app.synthesize()?;
            println!(
                "{}: {} constructs OK",
                config.display(),
                app.constructs.len()
            );
        }
        Commands::RecordName { fqdn, zone } => {
            println!("{}", to_route53_record_name(&fqdn, &zone));
        }
    }

    Ok(())
}

fn emit(
    template: &Template,
    out: Option<&Path>,
    compact: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = if compact {
        template.to_json()?
    } else {
        template.to_json_pretty()?
    };
    match out {
        Some(path) => {
            fs::write(path, format!("{json}\n"))?;
            tracing::info!(path = %path.display(), "Template written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn watch_and_emit(
    config: &Path,
    out: Option<&Path>,
    compact: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (watcher, mut updates) = ConfigWatcher::new(config);
    let _watcher = watcher.run()?;

    loop {
        tokio::select! {
            Some(template) = updates.recv() => {
                if let Err(e) = emit(&template, out, compact) {
                    tracing::error!(error = %e, "Failed to write template");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }
    Ok(())
}
