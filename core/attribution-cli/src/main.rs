//! attribution-tracker: command-line host for the embed attribution tracker.
//!
//! Plays the part of the embedding page so the engine can be driven from
//! scripts and fixtures.
//!
//! ## Subcommands
//!
//! - `resolve`: Resolve and persist attribution for one visit, print it
//! - `augment`: Rewrite embed URLs with the resolved attribution
//! - `relay`: Run the frame handshake over JSON lines on stdin/stdout

mod logging;
mod page;
mod relay;

use clap::{Parser, Subcommand};

use page::{PageArgs, StorageArgs};

#[derive(Parser)]
#[command(name = "attribution-tracker")]
#[command(about = "Marketing attribution resolver and embed relay")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    storage: StorageArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve attribution for a page visit and print the record as JSON
    Resolve {
        #[command(flatten)]
        page: PageArgs,
    },

    /// Print embed URLs rewritten with the resolved attribution
    Augment {
        #[command(flatten)]
        page: PageArgs,

        /// Embed URLs discovered on the page
        #[arg(value_name = "EMBED_URL", required = true)]
        embeds: Vec<String>,
    },

    /// Relay frame messages read from stdin (one JSON object per line)
    Relay {
        #[command(flatten)]
        page: PageArgs,

        /// Embed URL discovered on the page (repeatable)
        #[arg(long = "embed", value_name = "EMBED_URL")]
        embeds: Vec<String>,

        /// Print the outbound event queue as a final JSON line
        #[arg(long)]
        dump_data_layer: bool,
    },
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Resolve { page } => page::resolve(page, &cli.storage),
        Commands::Augment { page, embeds } => page::augment(page, &cli.storage, embeds),
        Commands::Relay {
            page,
            embeds,
            dump_data_layer,
        } => relay::run(page, &cli.storage, embeds, *dump_data_layer),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "attribution-tracker failed");
        std::process::exit(1);
    }
}
