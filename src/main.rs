//! doc-check - run documentation code snippets against a live script server
//!
//! Extracts the runnable snippets from code files and Markdown pages,
//! submits them to the server, and exits non-zero when any file fails.

use clap::Parser;
use doccheck::{cli, commands::RunArgs, common::logging};

#[derive(Parser)]
#[command(name = "doc-check", about = "Run documentation code snippets against a script server")]
#[command(version, long_about = None)]
struct Cli {
    #[command(flatten)]
    args: RunArgs,
}

#[tokio::main]
async fn main() {
    logging::init_cli();

    let cli = Cli::parse();

    if let Err(e) = cli::dispatch(cli.args).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
