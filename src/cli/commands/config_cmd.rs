//! Config command.

use console::style;

use doctag::config::Settings;

/// Print the effective settings. The API key is never shown in full.
pub async fn cmd_config(settings: &Settings) -> anyhow::Result<()> {
    let llm = &settings.llm;

    println!("\n{}", style("Configuration").bold());
    println!("{}", "-".repeat(60));
    println!(
        "{:<20} {}",
        "Config file:",
        settings
            .config_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!("{:<20} {}", "Data directory:", settings.data_dir.display());
    println!("{:<20} {}", "Base URL:", settings.base_url);
    println!("{:<20} {}s", "Poll interval:", settings.poll_interval.as_secs());
    println!("{:<20} {}", "Archive originals:", settings.archive_originals);

    println!("\n{}", style("AI service").bold());
    println!("{}", "-".repeat(60));
    println!("{:<20} {}", "Enabled:", llm.enabled);
    println!("{:<20} {}", "Endpoint:", llm.endpoint);
    println!(
        "{:<20} {}",
        "API key:",
        llm.redacted_api_key()
            .unwrap_or_else(|| style("(not set)").yellow().to_string())
    );
    println!("{:<20} {}", "Tag model:", llm.tag_model);
    println!("{:<20} {}", "Summary model:", llm.summary_model);
    println!("{:<20} {}", "Max content chars:", llm.max_content_chars);
    println!("{:<20} {}s", "Timeout:", llm.timeout_secs);

    Ok(())
}
