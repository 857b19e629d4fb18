mod commands;
mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stratus")]
#[command(about = "Plan and apply AWS resources from JSON or YAML configuration", long_about = None)]
struct Cli {
    /// Raise the log level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the schema of every type, or of one type
    Schema {
        /// Resource or data source type (e.g. aws_acm_certificate)
        #[arg(value_name = "TYPE")]
        type_name: Option<String>,
    },
    /// Validate a configuration file against a type's schema
    Validate {
        #[arg(value_name = "TYPE")]
        type_name: String,
        /// JSON or YAML file with the resource arguments
        file: PathBuf,
    },
    /// Show the changes applying a configuration would make
    Plan {
        /// Resource address (TYPE.NAME)
        address: String,
        file: PathBuf,
    },
    /// Create or update a resource to match its configuration
    Apply {
        /// Resource address (TYPE.NAME)
        address: String,
        file: PathBuf,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Re-read a managed resource and update its state
    Refresh {
        /// Resource address (TYPE.NAME)
        address: String,
    },
    /// Bring an existing remote object under management
    Import {
        /// Resource address (TYPE.NAME)
        address: String,
        /// Remote identifier (e.g. certificate ARN, bucket name)
        id: String,
    },
    /// Delete a managed resource
    Destroy {
        /// Resource address (TYPE.NAME)
        address: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Read a data source
    Data {
        #[arg(value_name = "TYPE")]
        type_name: String,
        /// JSON or YAML file with the data source arguments
        file: Option<PathBuf>,
    },
    /// Inspect the local state file
    #[command(subcommand)]
    State(StateCommands),
    /// Print version information
    Version,
}

#[derive(Subcommand)]
enum StateCommands {
    /// List managed resource addresses
    List,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_root = std::env::current_dir()?;

    match cli.command {
        Commands::Version => {
            println!("stratus {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Schema { type_name } => {
            commands::schema::handle(type_name.as_deref())?;
        }
        Commands::Validate { type_name, file } => {
            commands::validate::handle(&type_name, &file)?;
        }
        Commands::Plan { address, file } => {
            commands::plan::handle(&project_root, &address, &file).await?;
        }
        Commands::Apply { address, file, yes } => {
            commands::apply::handle(&project_root, &address, &file, yes).await?;
        }
        Commands::Refresh { address } => {
            commands::refresh::handle(&project_root, &address).await?;
        }
        Commands::Import { address, id } => {
            commands::import::handle(&project_root, &address, &id).await?;
        }
        Commands::Destroy { address, yes } => {
            commands::destroy::handle(&project_root, &address, yes).await?;
        }
        Commands::Data { type_name, file } => {
            commands::data::handle(&type_name, file.as_deref()).await?;
        }
        Commands::State(StateCommands::List) => {
            commands::state::handle_list(&project_root).await?;
        }
    }

    Ok(())
}
