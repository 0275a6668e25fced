pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::query::filter::{SortOrder, ViewParams};
use crate::utils::config::Overrides;

#[derive(Parser, Debug)]
#[command(author, version, about = "Catalog and launch portable software on a removable drive", long_about = None)]
pub struct Args {
    /// Drive root; defaults to the executable's directory
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[arg(long, global = true)]
    pub software_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the catalog and write softshelf.env
    Init,
    /// Track new files and folders in the software directory
    Scan,
    /// Rescan and list entries
    List {
        #[arg(short, long)]
        search: Option<String>,
        /// Show entries carrying any of these tags
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        json: bool,
    },
    Show {
        id: i64,
    },
    /// Copy a file into the software directory and track it
    Add {
        file: PathBuf,
    },
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Launch {
        id: i64,
    },
    /// List all tags
    Tags,
    #[command(subcommand)]
    Tag(TagCommand),
}

#[derive(Subcommand, Debug)]
pub enum TagCommand {
    Add { name: String },
    Delete { name: String },
    /// Replace an entry's tags with the given set
    Set { id: i64, tags: Vec<String> },
}

impl Args {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            root: self.root.clone(),
            software_dir: self.software_dir.clone(),
            db_path: self.db_path.clone(),
        }
    }
}

pub fn view_params(search: Option<String>, tags: Vec<String>, desc: bool) -> ViewParams {
    let order = if desc { SortOrder::Descending } else { SortOrder::Ascending };
    let mut view = ViewParams::new().with_order(order);
    if let Some(search) = search {
        view = view.with_search(search);
    }
    tags.into_iter().fold(view, ViewParams::with_tag)
}
