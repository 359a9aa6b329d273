use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Log more (same as RUST_LOG=debug)
    #[clap(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the HTTP server
    Serve {
        /// Address to bind, overrides `server.listen` from config.yaml
        #[clap(short, long)]
        listen: Option<String>,
    },

    /// Embed and store highlights from a CSV file
    Import {
        /// CSV with Highlight, Book Title, Book Author and Tags columns
        file: String,
    },

    /// Semantic search over stored highlights
    Search {
        /// What to look for
        prompt: String,

        /// Maximum number of results
        #[clap(short, long)]
        limit: Option<usize>,

        /// Comma separated tags; a highlight must share at least one
        #[clap(short, long)]
        tags: Option<String>,
    },

    /// List stored highlights
    List {
        #[clap(long, default_value = "0")]
        skip: usize,

        #[clap(short, long, default_value = "10")]
        limit: usize,
    },

    /// Print the number of stored highlights
    Count,

    /// Delete every stored highlight
    Clear {
        /// Auto confirm
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },
}
