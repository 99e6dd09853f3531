//! CLI command implementations

use anyhow::{Result, bail};
use colored::Colorize;
use tabled::{Table, Tabled, settings::Style};
use tkt_core::{Config, JsonlBackend, Ticket, TicketId, TicketNode, TicketStore};

#[derive(Tabled)]
struct TicketRow {
    #[tabled(rename = "ID")]
    id: TicketId,
    #[tabled(rename = "Done")]
    done: &'static str,
    #[tabled(rename = "Parent")]
    parent: String,
    #[tabled(rename = "Title")]
    title: String,
}

impl From<&Ticket> for TicketRow {
    fn from(ticket: &Ticket) -> Self {
        Self {
            id: ticket.id,
            done: if ticket.is_completed { "x" } else { "" },
            parent: ticket
                .parent_id
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string()),
            title: ticket.title.clone(),
        }
    }
}

fn styled_title(ticket: &Ticket) -> colored::ColoredString {
    if ticket.is_completed {
        ticket.title.dimmed()
    } else {
        ticket.title.normal()
    }
}

fn print_ticket(ticket: &Ticket, json: bool, verb: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(ticket)?);
    } else {
        println!("{} {} {}", "✓".green(), verb, ticket.id.to_string().cyan());
    }
    Ok(())
}

pub fn init() -> Result<()> {
    let backend = JsonlBackend::init(&std::env::current_dir()?)?;
    println!(
        "{} Initialized tkt in {}",
        "✓".green(),
        backend.dir().display()
    );
    Ok(())
}

pub fn create(title: &str, done: bool, json: bool) -> Result<()> {
    let store = TicketStore::discover()?;
    let ticket = store.create_ticket(title, Some(done))?;

    if json {
        println!("{}", serde_json::to_string(&ticket)?);
    } else {
        println!("{} Created ticket: {}", "✓".green(), ticket.id.to_string().cyan());
        println!("  Title: {}", ticket.title);
    }
    Ok(())
}

pub fn list(all: bool, json: bool) -> Result<()> {
    let store = TicketStore::discover()?;
    let tickets = if all {
        store.list_all()?
    } else {
        store.list_root_tickets()?
    };

    if json {
        println!("{}", serde_json::to_string(&tickets)?);
    } else if tickets.is_empty() {
        println!("No tickets found");
    } else {
        let rows: Vec<TicketRow> = tickets.iter().map(TicketRow::from).collect();
        println!("{}", Table::new(rows).with(Style::rounded()));
    }
    Ok(())
}

pub fn show(id: TicketId, json: bool) -> Result<()> {
    let store = TicketStore::discover()?;
    let (ticket, children) = store.get_with_children(id)?;

    if json {
        let mut value = serde_json::to_value(&ticket)?;
        value["children"] = serde_json::to_value(&children)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let local = |t: chrono::DateTime<chrono::Utc>| {
        t.with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string()
    };

    println!("{} {}", ticket.id.to_string().cyan().bold(), ticket.title.bold());
    println!();
    println!("Completed: {}", if ticket.is_completed { "yes" } else { "no" });
    match ticket.parent_id {
        Some(parent) if store.get_ticket(parent).is_ok() => println!("Parent:    {}", parent),
        Some(parent) => println!("Parent:    {} {}", parent, "(deleted)".red()),
        None => println!("Parent:    -"),
    }
    println!("Created:   {}", local(ticket.created_at));
    println!("Updated:   {}", local(ticket.updated_at));

    if !children.is_empty() {
        println!();
        println!("{}", "Children:".bold());
        for child in &children {
            println!("  {} {}", child.id.to_string().cyan(), styled_title(child));
        }
    }
    Ok(())
}

pub fn title(id: TicketId, title: &str, json: bool) -> Result<()> {
    let store = TicketStore::discover()?;
    let ticket = store.update_title(id, title)?;
    print_ticket(&ticket, json, "Renamed")
}

pub fn set_completion(id: TicketId, done: bool, json: bool) -> Result<()> {
    let store = TicketStore::discover()?;
    let ticket = store.set_completion(id, done)?;
    print_ticket(&ticket, json, if done { "Completed" } else { "Reopened" })
}

pub fn remove(id: TicketId, json: bool) -> Result<()> {
    let store = TicketStore::discover()?;
    let deletion = store.delete_ticket(id)?;

    if json {
        println!("{}", serde_json::to_string(&deletion)?);
        return Ok(());
    }

    println!("{} Deleted {}", "✓".green(), id.to_string().cyan());
    if !deletion.orphaned.is_empty() {
        let ids: Vec<String> = deletion.orphaned.iter().map(|c| c.to_string()).collect();
        println!(
            "  {} children still point at {}: {}",
            "!".yellow(),
            id,
            ids.join(", ")
        );
        println!("  Use 'tkt detach <id>' or 'tkt move <id> <parent>' to re-home them.");
    }
    Ok(())
}

pub fn move_ticket(child: TicketId, parent: TicketId, json: bool) -> Result<()> {
    let store = TicketStore::discover()?;
    let ticket = store.reparent(child, parent)?;

    if json {
        println!("{}", serde_json::to_string(&ticket)?);
    } else {
        println!("{} {} is now under {}", "✓".green(), child, parent);
    }
    Ok(())
}

pub fn adopt(parent: TicketId, children: Vec<TicketId>, json: bool) -> Result<()> {
    let store = TicketStore::discover()?;
    let count = children.len();
    let (ticket, children) = store.reparent_many_with_children(parent, children)?;

    if json {
        let mut value = serde_json::to_value(&ticket)?;
        value["children"] = serde_json::to_value(&children)?;
        println!("{}", serde_json::to_string(&value)?);
    } else {
        println!("{} Moved {} ticket(s) under {}", "✓".green(), count, parent);
    }
    Ok(())
}

pub fn detach(id: TicketId, json: bool) -> Result<()> {
    let store = TicketStore::discover()?;
    let ticket = store.clear_parent(id)?;
    print_ticket(&ticket, json, "Detached")
}

fn render_tree(root: &TicketNode, out: &mut Vec<String>) {
    // (node, prefix, last sibling, top level)
    let mut stack = vec![(root, String::new(), true, true)];
    while let Some((node, prefix, last, top)) = stack.pop() {
        let branch = match (top, last) {
            (true, _) => "",
            (false, true) => "└── ",
            (false, false) => "├── ",
        };
        let mark = if node.ticket.is_completed { "[x]" } else { "[ ]" };
        out.push(format!(
            "{}{}{} {} {}",
            prefix,
            branch,
            node.ticket.id.to_string().cyan(),
            mark,
            styled_title(&node.ticket)
        ));

        let child_prefix = match (top, last) {
            (true, _) => prefix,
            (false, true) => format!("{prefix}    "),
            (false, false) => format!("{prefix}│   "),
        };
        let count = node.children.len();
        for (i, child) in node.children.iter().enumerate().rev() {
            stack.push((child, child_prefix.clone(), i + 1 == count, false));
        }
    }
}

pub fn tree(id: Option<TicketId>, json: bool) -> Result<()> {
    let store = TicketStore::discover()?;

    let (trees, orphans) = match id {
        Some(id) => (vec![store.subtree(id)?], Vec::new()),
        None => {
            let roots = store
                .list_root_tickets()?
                .iter()
                .map(|t| store.subtree(t.id))
                .collect::<tkt_core::Result<Vec<_>>>()?;
            let orphans = store
                .orphans()?
                .iter()
                .map(|t| store.subtree(t.id))
                .collect::<tkt_core::Result<Vec<_>>>()?;
            (roots, orphans)
        }
    };

    if json {
        println!(
            "{}",
            serde_json::to_string(&serde_json::json!({ "trees": trees, "orphans": orphans }))?
        );
        return Ok(());
    }

    if trees.is_empty() && orphans.is_empty() {
        println!("No tickets found");
        return Ok(());
    }

    let mut lines = Vec::new();
    for node in &trees {
        render_tree(node, &mut lines);
    }
    if !orphans.is_empty() {
        lines.push(String::new());
        lines.push(format!("{}", "Orphaned (parent deleted):".yellow()));
        for node in &orphans {
            render_tree(node, &mut lines);
        }
    }
    println!("{}", lines.join("\n"));
    Ok(())
}

pub fn check(json: bool) -> Result<()> {
    let store = TicketStore::discover()?;
    let report = store.check()?;

    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!(
            "{} tickets, {} roots",
            report.tickets,
            report.roots
        );
        for dangling in &report.dangling {
            println!(
                "{} {} points at missing parent {}",
                "!".yellow(),
                dangling.child.to_string().cyan(),
                dangling.missing_parent
            );
        }
        for cycle in &report.cycles {
            let ids: Vec<String> = cycle.iter().map(|id| id.to_string()).collect();
            println!("{} cycle through {}", "✗".red(), ids.join(" -> "));
        }
        if report.is_consistent() {
            println!("{} Tree is consistent", "✓".green());
        }
    }

    if !report.is_consistent() {
        bail!(
            "{} dangling parent(s), {} cycle(s)",
            report.dangling.len(),
            report.cycles.len()
        );
    }
    Ok(())
}

pub fn config_show(json: bool) -> Result<()> {
    let backend = JsonlBackend::discover()?;
    let config = Config::load(&backend.config_path())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!("{}", "Current configuration:".bold());
        println!();
        println!("max_title_length = {}", config.max_title_length);
        println!();
        println!("[api]");
        println!("host = {:?}", config.api.host);
        println!("port = {}", config.api.port);
        println!();
        println!("[storage]");
        println!("backend = \"{}\"", config.storage.backend);
    }
    Ok(())
}

pub fn config_path() -> Result<()> {
    let backend = JsonlBackend::discover()?;
    println!("{}", backend.config_path().display());
    Ok(())
}
