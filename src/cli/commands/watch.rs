//! Watch command: follow the store until Ctrl-C.

use std::time::Duration;

use console::style;

use doctag::config::Settings;
use doctag::view::SnapshotView;

use super::super::helpers::{document_row, open_store, tag_names};

/// Print the documents and tag catalog, then every change, until interrupted.
pub async fn cmd_watch(settings: &Settings, interval: Option<u64>) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let poll = interval
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(settings.poll_interval);

    let mut documents = SnapshotView::documents(store.clone(), Some(poll))?;
    let mut tags = SnapshotView::tags(store.clone(), Some(poll))?;

    println!(
        "{} Watching {} (refresh every {}s, Ctrl-C to stop)",
        style("→").cyan(),
        settings.state_dir().display(),
        poll.as_secs()
    );
    print_documents(&documents.current());
    println!("  Tags: {}", tag_names(&tags.current()));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\n{} Stopped", style("!").yellow());
                break;
            }
            changed = documents.changed() => {
                let Some(docs) = changed else { break };
                println!("\n{} Documents changed", style("↻").cyan());
                print_documents(&docs);
            }
            changed = tags.changed() => {
                let Some(catalog) = changed else { break };
                println!("\n{} Tags changed", style("↻").cyan());
                println!("  Tags: {}", tag_names(&catalog));
            }
        }
    }

    Ok(())
}

fn print_documents(documents: &[doctag::models::ProcessedDocument]) {
    if documents.is_empty() {
        println!("  (no documents)");
        return;
    }
    for doc in documents {
        println!("  {}", document_row(doc));
    }
}
