use anyhow::Result;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

use dumph::ExtraField;

mod commands;

#[derive(Parser)]
#[command(name = "dumph")]
#[command(about = "Dump the dependency forest of a Phabricator task query as CSV or HTML")]
#[command(version)]
struct Cli {
    /// Saved query key ("all", "open", "assigned", or a custom query's key)
    query: String,

    /// Extra output column, as "Field Name:dot.separated.path" into the task record
    extras: Vec<ExtraField>,

    /// Output format (csv, html); defaults to the config file's, then csv
    #[arg(long, short)]
    format: Option<String>,

    /// Follow dependencies of dependencies, not only those of the query results
    #[arg(long, short)]
    recursive: bool,

    /// File with the stylesheet and script embedded in html output
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Phabricator host (overrides the config file and ~/.arcrc)
    #[arg(long)]
    host: Option<String>,

    /// Config file (default: ~/.config/dumph/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v, -vv)
    #[arg(long, short, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    dumph::logging::init(cli.verbose);

    let format = cli
        .format
        .map(|f| f.parse().map_err(|e: String| anyhow::anyhow!(e)))
        .transpose()?;

    commands::dump::run(commands::dump::DumpOptions {
        query: cli.query,
        extras: cli.extras,
        format,
        recursive: cli.recursive,
        assets: cli.assets,
        host: cli.host,
        config: cli.config,
    })
}
