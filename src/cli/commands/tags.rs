//! Tag catalog commands.

use console::style;
use serde::Serialize;

use doctag::config::Settings;
use doctag::models::{Tag, TagCategory};

use super::super::helpers::{open_store, truncate};

#[derive(Serialize)]
struct TagUsage<'a> {
    #[serde(flatten)]
    tag: &'a Tag,
    documents: usize,
}

/// List catalog tags with how many documents use each.
pub async fn cmd_tags_list(
    settings: &Settings,
    category: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let tags = match category {
        None | Some("all") => store.tags()?,
        Some(raw) => {
            let Some(category) = TagCategory::from_str(raw) else {
                anyhow::bail!(
                    "Unknown category '{}' (expected entity, theme, keyword or all)",
                    raw
                );
            };
            store.tags_by_category(category)?
        }
    };
    let counts = store.usage_counts()?;

    if json {
        let rows: Vec<TagUsage> = tags
            .iter()
            .map(|tag| TagUsage {
                tag,
                documents: counts.get(&tag.id).copied().unwrap_or(0),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if tags.is_empty() {
        println!("{} No tags found", style("!").yellow());
        return Ok(());
    }

    println!("\n{}", style("Tags").bold());
    println!("{}", "-".repeat(80));
    println!(
        "{:<36} {:<20} {:<8} {:>6} Docs",
        "ID", "Name", "Category", "Conf"
    );
    println!("{}", "-".repeat(80));
    for tag in &tags {
        println!(
            "{:<36} {:<20} {:<8} {:>5.0}% {}",
            tag.id,
            truncate(&tag.name, 19),
            tag.category.as_str(),
            tag.confidence * 100.0,
            counts.get(&tag.id).copied().unwrap_or(0)
        );
    }

    Ok(())
}

/// Rename a tag in the catalog and on every document.
pub async fn cmd_tags_rename(settings: &Settings, tag_id: &str, name: &str) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let old = store.get_tag(tag_id)?;

    if store.edit_tag(tag_id, name)? {
        let old_name = old.map(|t| t.name).unwrap_or_default();
        println!(
            "{} Renamed '{}' → '{}'",
            style("✓").green(),
            style(old_name).yellow(),
            style(name.trim()).green()
        );
    } else {
        println!("{} Tag '{}' not found", style("!").yellow(), tag_id);
    }
    Ok(())
}

/// Delete a tag and strip it from every document.
pub async fn cmd_tags_delete(settings: &Settings, tag_id: &str) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    if store.delete_tag(tag_id)? {
        println!("{} Deleted tag {}", style("✓").green(), tag_id);
    } else {
        println!("{} Tag '{}' not found", style("!").yellow(), tag_id);
    }
    Ok(())
}
