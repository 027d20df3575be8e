use crate::demo::{run_demo, run_quote, run_score, DemoArgs, RecordArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use sales_pipeline::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Sales Pipeline Orchestrator",
    about = "Score discovery calls, price proposals and drive deals from discovery to kickoff",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score a discovery record read from a JSON file
    Score(RecordArgs),
    /// Price a discovery record read from a JSON file
    Quote(RecordArgs),
    /// Walk a sample deal through every stage against sandbox providers
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Score(args) => run_score(args),
        Command::Quote(args) => run_quote(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
