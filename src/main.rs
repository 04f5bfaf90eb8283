use anyhow::Result;
use clap::Parser;

use webview::{cli::Cli, commands};

fn main() -> Result<()> {
    commands::run(Cli::parse())
}
