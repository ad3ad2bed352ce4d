//! Document listing and management commands.

use console::style;
use url::Url;

use doctag::config::Settings;
use doctag::models::DocumentStatus;
use doctag::open::{resolve_open_action, OpenAction};

use super::super::helpers::{document_row, open_store};

/// List documents, optionally filtered.
pub async fn cmd_list(settings: &Settings, search: Option<&str>, json: bool) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let documents = match search {
        Some(query) => store.search(query)?,
        None => store.documents()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&documents)?);
        return Ok(());
    }

    if documents.is_empty() {
        println!("{} No documents found", style("!").yellow());
        return Ok(());
    }

    println!("\n{}", style("Documents").bold());
    println!("{}", "-".repeat(100));
    println!("{:<36} {:<24} {:<10} Tags", "ID", "Title", "Status");
    println!("{}", "-".repeat(100));
    for doc in &documents {
        println!("{}", document_row(doc));
    }
    println!("\n{} document(s)", documents.len());

    Ok(())
}

/// Delete a document and any tags only it used.
pub async fn cmd_delete(settings: &Settings, doc_id: &str) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    if store.delete_document(doc_id)? {
        println!("{} Deleted document {}", style("✓").green(), doc_id);
    } else {
        println!("{} Document '{}' not found", style("!").yellow(), doc_id);
    }
    Ok(())
}

/// Move a document to another status.
pub async fn cmd_status(settings: &Settings, doc_id: &str, status: &str) -> anyhow::Result<()> {
    let Some(status) = DocumentStatus::from_str(status) else {
        anyhow::bail!(
            "Unknown status '{}' (expected processing, processed or error)",
            status
        );
    };

    let store = open_store(settings)?;
    if store.set_status(doc_id, status)? {
        println!(
            "{} {} is now {}",
            style("✓").green(),
            doc_id,
            style(status.as_str()).cyan()
        );
    } else {
        println!(
            "{} Nothing to change for '{}' (unknown id or already {})",
            style("!").yellow(),
            doc_id,
            status.as_str()
        );
    }
    Ok(())
}

/// Show how a document's original would be opened.
pub async fn cmd_open(
    settings: &Settings,
    doc_id: &str,
    base_url: Option<&str>,
) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let Some(doc) = store.get_document(doc_id)? else {
        println!("{} Document '{}' not found", style("✗").red(), doc_id);
        return Ok(());
    };

    let base = match base_url {
        Some(raw) => Url::parse(raw)?,
        None => settings.base_url.clone(),
    };

    match resolve_open_action(&doc, &base) {
        Ok(OpenAction::Inline(url)) => {
            println!("{} Preview: {}", style("→").cyan(), url);
        }
        Ok(OpenAction::Download { url, filename }) => {
            println!(
                "{} Download {} from {}",
                style("↓").cyan(),
                style(filename).bold(),
                url
            );
        }
        Err(e) => println!("{} {}", style("✗").red(), e),
    }
    Ok(())
}
