mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::simulate::Health;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cfn-signaler",
    about = "Poll an instance until it converges, then signal its CloudFormation stack",
    version,
    propagate_version = true
)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve as the AWS Lambda handler (configuration from the environment)
    Lambda,

    /// Handle one event payload against real AWS and print the result
    Invoke {
        /// JSON payload file
        #[arg(long)]
        event: PathBuf,

        /// YAML deployment config (default: environment variables)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show how a payload would be classified, without touching AWS
    Classify {
        /// JSON payload file
        #[arg(long)]
        event: PathBuf,

        #[arg(long, env = "StackName")]
        stack_name: String,

        #[arg(long = "logical-id", env = "LogicalResourceId")]
        logical_id: String,
    },

    /// Run ticks against in-memory adapters with scripted health results
    Simulate {
        /// Attempts at which the cycle gives up
        #[arg(long, default_value = "3")]
        threshold: u32,

        /// Health per tick, comma separated
        #[arg(long, value_enum, value_delimiter = ',', required = true)]
        health: Vec<Health>,
    },

    /// Parse a counter token and show its fields
    Token {
        /// e.g. enabled_increment_2_success
        token: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Lambda | Commands::Invoke { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Lambda => cmd::lambda::run(),
        Commands::Invoke { event, config } => cmd::invoke::run(&event, config.as_deref()),
        Commands::Classify {
            event,
            stack_name,
            logical_id,
        } => cmd::classify::run(&event, &stack_name, &logical_id, cli.json),
        Commands::Simulate { threshold, health } => {
            cmd::simulate::run(threshold, &health, cli.json)
        }
        Commands::Token { token } => cmd::token::run(&token, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
