use clap::{ArgGroup, Parser, Subcommand};
use kbtrain_core::Config;
use std::path::PathBuf;

mod commands;
mod render;

use commands::Session;

#[derive(Parser)]
#[command(name = "kbtrain")]
#[command(about = "Select, import and train an agent's knowledge sources", long_about = None)]
struct Cli {
    /// Agent to work on (defaults to service.agent_id, then the last agent used)
    #[arg(long, global = true)]
    agent: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List knowledge sources with their selection and training state
    Sources {
        /// Fetch the list from the service before printing
        #[arg(long)]
        refresh: bool,
    },
    /// Print a source's tree with selection markers
    Show { source: u64 },
    /// Change the selection of a source or one of its nodes
    #[command(group(ArgGroup::new("mode").required(true).args(["on", "off", "toggle"])))]
    Select {
        source: u64,
        /// Node to edit; the whole source when omitted
        #[arg(long)]
        node: Option<u64>,
        #[arg(long)]
        on: bool,
        #[arg(long)]
        off: bool,
        #[arg(long)]
        toggle: bool,
    },
    /// Print the part of a source's tree matching a query
    Filter { source: u64, query: String },
    /// Mark or unmark sources for the next train-all run
    Mark {
        #[arg(required = true)]
        sources: Vec<u64>,
        /// Remove the sources from the working set instead
        #[arg(long)]
        unmark: bool,
    },
    /// Train one source
    Train {
        source: u64,
        /// Only train the selected URLs and documents
        #[arg(long)]
        selected: bool,
    },
    /// Train several sources (the marked ones when none are given)
    TrainAll { sources: Vec<u64> },
    /// Remove sources from the knowledge base
    Remove {
        #[arg(required = true)]
        sources: Vec<u64>,
    },
    /// Import sources from a JSON catalog
    Import {
        catalog: PathBuf,
        /// Restrict a source to the given URL (`<source>=<url>`, repeatable)
        #[arg(long, value_name = "SOURCE=URL")]
        accept: Vec<String>,
    },
    /// Print the effective configuration
    Config,
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let config = Config::load()?;
    init_tracing(&config);

    if let Commands::Config = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let mut session = Session::open(config, cli.agent.as_deref())?;
    tracing::debug!(agent_id = %session.agent_id(), "Session opened");

    match cli.command {
        Commands::Sources { refresh } => session.sources(refresh).await,
        Commands::Show { source } => session.show(source),
        Commands::Select {
            source,
            node,
            on,
            off: _,
            toggle,
        } => session.select(source, node, on, toggle),
        Commands::Filter { source, query } => session.filter(source, &query),
        Commands::Mark { sources, unmark } => session.mark(&sources, !unmark),
        Commands::Train { source, selected } => session.train(source, selected).await,
        Commands::TrainAll { sources } => session.train_all(sources).await,
        Commands::Remove { sources } => session.remove(&sources).await,
        Commands::Import { catalog, accept } => session.import(&catalog, &accept).await,
        Commands::Config => Ok(()),
    }
}
