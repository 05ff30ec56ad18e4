extern crate chrono;
extern crate clap;
extern crate env_logger;
extern crate fs2;
extern crate indicatif;
#[macro_use]
extern crate log;
extern crate mail_parser;
extern crate thiserror;

mod args;
mod classify;
mod collect;
mod datetime;
mod error;
mod execute;
mod route;
mod store;
mod template;
mod utils;

use args::Args;
use clap::Parser;
use store::FsStore;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.log_level())
        .format_timestamp(None)
        .parse_default_env()
        .init();
    do_main(&args)
}

fn do_main(args: &Args) -> anyhow::Result<()> {
    let mut store = FsStore::new();
    execute::archive_all(args, &mut store)?;
    Ok(())
}
