use anyhow::Result;
use clap::Parser;

use webview::{cli::ServerCli, commands};

fn main() -> Result<()> {
    commands::run_server(ServerCli::parse())
}
