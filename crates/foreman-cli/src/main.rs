mod config;
mod run_cmd;
mod serve_cmd;
mod templates_cmd;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use foreman_core::Config;

#[derive(Parser)]
#[command(name = "foreman", about = "Multi-agent work orchestrator")]
struct Cli {
    /// Log level (overrides ORCHESTRATOR_LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a workflow TOML file without executing it
    Validate {
        /// Path to the workflow file
        file: String,
    },
    /// Execute a workflow TOML file with the built-in agents
    Run {
        /// Path to the workflow file
        file: String,
        /// Maximum number of steps to run in parallel
        #[arg(long, default_value_t = 5)]
        max_parallel: usize,
        /// Workflow inputs as key=value pairs
        #[arg(long = "input", value_name = "KEY=VALUE")]
        inputs: Vec<String>,
        /// Print the full execution result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the built-in task templates
    Templates,
    /// Serve the HTTP status/submit API (requires the API adapter flag)
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1:7430")]
        addr: String,
    },
    /// Write a foreman config file with current defaults
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let env_config = Config::from_env();

    init_tracing(cli.log_level.as_deref().unwrap_or(&env_config.log_level));

    match cli.command {
        Commands::Validate { file } => run_cmd::validate(&file),
        Commands::Run {
            file,
            max_parallel,
            inputs,
            json,
        } => run_cmd::run(&file, max_parallel, &inputs, json).await,
        Commands::Templates => {
            templates_cmd::list();
            Ok(())
        }
        Commands::Serve { addr } => serve_cmd::serve(&addr, &env_config).await,
        Commands::Init { force } => config::init(force),
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "foreman", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Initialize the tracing subscriber once, honoring the resolved log level.
fn init_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
