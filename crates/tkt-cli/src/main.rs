//! tkt - Hierarchical ticket store
//!
//! Tickets live in .tkt/tickets.jsonl; nest them with `move` and `adopt`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tkt_core::TicketId;

mod commands;

#[derive(Parser)]
#[command(name = "tkt")]
#[command(about = "Hierarchical ticket store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new tkt store in the current directory
    Init,

    /// Create a new root ticket
    Create {
        /// Ticket title
        title: String,

        /// Mark as completed right away
        #[arg(long)]
        done: bool,
    },

    /// List root tickets
    List {
        /// List every ticket, not just roots
        #[arg(short, long)]
        all: bool,
    },

    /// Show a ticket and its children
    Show {
        /// Ticket ID
        id: TicketId,
    },

    /// Change a ticket's title
    Title {
        /// Ticket ID
        id: TicketId,

        /// New title
        title: String,
    },

    /// Mark a ticket completed
    Done {
        /// Ticket ID
        id: TicketId,
    },

    /// Mark a ticket not completed
    Reopen {
        /// Ticket ID
        id: TicketId,
    },

    /// Delete a ticket (children are left in place)
    Rm {
        /// Ticket ID
        id: TicketId,
    },

    /// Put a ticket under a new parent
    Move {
        /// Ticket to move
        child: TicketId,

        /// New parent
        parent: TicketId,
    },

    /// Put several tickets under one parent, all or nothing
    Adopt {
        /// New parent
        parent: TicketId,

        /// Tickets to move
        #[arg(required = true)]
        children: Vec<TicketId>,
    },

    /// Make a ticket a root
    Detach {
        /// Ticket ID
        id: TicketId,
    },

    /// Show the tree below a ticket, or the whole forest
    Tree {
        /// Ticket ID
        id: Option<TicketId>,
    },

    /// Report dangling parents and cycles
    Check,

    /// Show configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Print the config file path
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => commands::init(),
        Commands::Create { title, done } => commands::create(&title, done, cli.json),
        Commands::List { all } => commands::list(all, cli.json),
        Commands::Show { id } => commands::show(id, cli.json),
        Commands::Title { id, title } => commands::title(id, &title, cli.json),
        Commands::Done { id } => commands::set_completion(id, true, cli.json),
        Commands::Reopen { id } => commands::set_completion(id, false, cli.json),
        Commands::Rm { id } => commands::remove(id, cli.json),
        Commands::Move { child, parent } => commands::move_ticket(child, parent, cli.json),
        Commands::Adopt { parent, children } => commands::adopt(parent, children, cli.json),
        Commands::Detach { id } => commands::detach(id, cli.json),
        Commands::Tree { id } => commands::tree(id, cli.json),
        Commands::Check => commands::check(cli.json),
        Commands::Config { command } => match command {
            Some(ConfigCommands::Path) => commands::config_path(),
            Some(ConfigCommands::Show) | None => commands::config_show(cli.json),
        },
    }
}
