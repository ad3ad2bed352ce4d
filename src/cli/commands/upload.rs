//! Upload command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use console::style;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};

use doctag::config::Settings;
use doctag::extract::Artifact;
use doctag::llm::TagGenerator;
use doctag::pipeline::{join_upload, NoticeLevel, PipelineError, UploadPipeline};

use super::super::helpers::{open_store, tag_names};

/// Upload files through the pipeline. Files are processed concurrently; one
/// failing does not stop the others.
pub async fn cmd_upload(
    settings: &Settings,
    files: &[PathBuf],
    media_type: Option<&str>,
    offline: bool,
    no_archive: bool,
    json: bool,
) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let generator = if offline {
        TagGenerator::offline(settings.llm.clone())
    } else {
        TagGenerator::from_config(settings.llm.clone())
    };
    if generator.is_offline() {
        println!(
            "{} AI service not in use; keyword tags and a placeholder summary will be applied",
            style("!").yellow()
        );
    }

    let mut pipeline = UploadPipeline::new(store, generator);
    if settings.archive_originals && !no_archive {
        pipeline = pipeline.with_archive_dir(settings.files_dir());
    }
    let pipeline = Arc::new(pipeline);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Processing {} file(s)...", files.len()));

    // Spawned so an interrupted terminal does not leave a half-finished upload
    let uploads = files.iter().map(|file| {
        let pipeline = Arc::clone(&pipeline);
        async move {
            let artifact = Artifact::from_path(file, media_type)
                .await
                .map_err(PipelineError::from)?;
            join_upload(pipeline.spawn_process(artifact)).await
        }
    });
    let results = join_all(uploads).await;
    pb.finish_and_clear();

    let mut failed = 0;
    let mut stored = Vec::new();
    for (file, result) in files.iter().zip(results) {
        match result {
            Ok(report) => {
                for notice in &report.notices {
                    let marker = match notice.level {
                        NoticeLevel::Info => style("i").cyan(),
                        NoticeLevel::Warning => style("!").yellow(),
                    };
                    println!("{} {}", marker, notice.message);
                }
                stored.push(report.document);
            }
            Err(e) => {
                failed += 1;
                println!("{} {}: {}", style("✗").red(), file.display(), e);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&stored)?);
    } else {
        for doc in &stored {
            println!(
                "{} Stored {} as {}",
                style("✓").green(),
                style(&doc.title).bold(),
                doc.id
            );
            println!("  Tags:    {}", tag_names(&doc.tags));
            println!("  Summary: {}", doc.summary);
            if let Some(ref path) = doc.file_path {
                println!("  File:    {}", path);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} upload(s) failed", failed, files.len());
    }
    Ok(())
}
