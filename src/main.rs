mod cli;
mod database;
mod error;
mod ingest;
mod launcher;
mod query;
mod utils;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, Level};

use crate::cli::{commands, Args, Command, TagCommand};
use crate::utils::config::Settings;

fn main() {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let settings = Settings::resolve(&args.overrides())?;
    debug!("Software dir: {:?}", settings.software_dir);
    debug!("DB: {:?}", settings.db_path);

    let store = || commands::open_store(&settings);

    match args.command {
        Command::Init => commands::init(&settings),
        Command::Scan => commands::scan(&settings, &store()?),
        Command::List { search, tags, desc, json } => {
            let view = cli::view_params(search, tags, desc);
            commands::list(&settings, &store()?, &view, json)
        }
        Command::Show { id } => commands::show(&store()?, id),
        Command::Add { file } => commands::add(&settings, &store()?, &file),
        Command::Edit { id, name, description } => {
            commands::edit(&store()?, id, name.as_deref(), description.as_deref())
        }
        Command::Launch { id } => commands::launch(&settings, &store()?, id),
        Command::Tags => commands::list_tags(&store()?),
        Command::Tag(TagCommand::Add { name }) => commands::add_tag(&store()?, &name),
        Command::Tag(TagCommand::Delete { name }) => commands::delete_tag(&store()?, &name),
        Command::Tag(TagCommand::Set { id, tags }) => commands::set_tags(&store()?, id, tags),
    }
}
