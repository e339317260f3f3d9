use std::path::PathBuf;

use clap::{Parser, Subcommand};
use otpgate::{chat, config::AppConfig};
use schemars::schema_for;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Output JSON schema of config
    Schema,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Some(Commands::Config {
        command: ConfigCommands::Schema,
    }) = cli.command
    {
        let schema = schema_for!(AppConfig);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let config = std::fs::File::open(&cli.config)?;
    let config: AppConfig = serde_yaml::from_reader(config)?;
    let app = config.build()?;

    let forwarder = app.forwarder.clone();
    tokio::spawn(forwarder.run());

    let mut dispatcher = chat::dispatcher(app.bot, app.panel);
    dispatcher.dispatch().await;

    Ok(())
}
