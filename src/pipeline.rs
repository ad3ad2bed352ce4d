//! Upload pipeline: artifact -> text -> tags and summary -> stored document.
//!
//! Extraction failures abort the upload before anything is stored. Generation
//! never fails (fallbacks apply) and archiving the original is best effort;
//! both report what happened through [`Notice`]s on the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::extract::{Artifact, ExtractError, ExtractionMethod, ExtractorRegistry};
use crate::llm::{CallOutcome, TagGenerator};
use crate::models::{NewDocument, ProcessedDocument};
use crate::store::{DocumentStore, StoreError};
use crate::utils::{document_type_for_mime, sanitize_filename};

/// URL path prefix recorded in `filePath` for archived originals.
pub const FILES_PREFIX: &str = "/files";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Upload task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// User-facing message about a degraded step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub document: ProcessedDocument,
    pub notices: Vec<Notice>,
}

pub struct UploadPipeline {
    extractors: ExtractorRegistry,
    generator: TagGenerator,
    store: Arc<DocumentStore>,
    /// `<data_dir>/files` when originals are kept.
    archive_dir: Option<PathBuf>,
}

impl UploadPipeline {
    pub fn new(store: Arc<DocumentStore>, generator: TagGenerator) -> Self {
        Self {
            extractors: ExtractorRegistry::default(),
            generator,
            store,
            archive_dir: None,
        }
    }

    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = extractors;
        self
    }

    /// Keep a copy of each original under `dir/<key>/<name>`.
    pub fn with_archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = Some(dir.into());
        self
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Run the pipeline for one artifact.
    ///
    /// Dropping the future before it completes stores nothing.
    pub async fn process(&self, artifact: Artifact) -> Result<UploadReport, PipelineError> {
        info!("Processing upload {} ({})", artifact.name, artifact.media_type);
        let mut notices = Vec::new();

        let extracted = self.extractors.extract(&artifact).await?;
        if extracted.method == ExtractionMethod::Placeholder {
            notices.push(Notice::info(format!(
                "Content of {} is not parsed; tags are based on its name",
                artifact.name
            )));
        }
        debug!("Extracted {} chars from {}", extracted.text.chars().count(), artifact.name);

        let generated = self.generator.generate(&extracted.text).await;
        if let CallOutcome::FallbackApplied { reason } = &generated.tags_outcome {
            notices.push(Notice::warning(format!(
                "AI tagging unavailable ({}); keyword tags applied",
                reason
            )));
        }
        if let CallOutcome::FallbackApplied { reason } = &generated.summary_outcome {
            notices.push(Notice::warning(format!(
                "AI summary unavailable ({}); placeholder summary used",
                reason
            )));
        }

        let mut new = NewDocument::new(
            artifact.name.clone(),
            document_type_for_mime(&artifact.media_type),
            generated.summary,
        );

        let archived = match &self.archive_dir {
            Some(dir) => match archive_original(dir, &artifact).await {
                Ok(archived) => Some(archived),
                Err(e) => {
                    warn!("Failed to archive {}: {}", artifact.name, e);
                    notices.push(Notice::warning(format!(
                        "Original of {} could not be kept: {}",
                        artifact.name, e
                    )));
                    None
                }
            },
            None => None,
        };
        if let Some(archived) = &archived {
            new = new.with_file_path(archived.file_path.clone());
        }

        let document = match self.store.add_document(new, generated.tags) {
            Ok(document) => document,
            Err(e) => {
                if let Some(archived) = archived {
                    archived.discard().await;
                }
                return Err(e.into());
            }
        };

        info!(
            "Stored {} as {} with {} tags",
            document.title,
            document.id,
            document.tags.len()
        );
        Ok(UploadReport { document, notices })
    }

    /// Run the pipeline on a detached task; it finishes even if the handle is dropped.
    pub fn spawn_process(
        self: &Arc<Self>,
        artifact: Artifact,
    ) -> JoinHandle<Result<UploadReport, PipelineError>> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move { pipeline.process(artifact).await })
    }
}

struct Archived {
    dir: PathBuf,
    file_path: String,
}

impl Archived {
    async fn discard(self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.dir).await {
            warn!("Failed to remove archived copy {}: {}", self.dir.display(), e);
        }
    }
}

async fn archive_original(root: &Path, artifact: &Artifact) -> Result<Archived, ExtractError> {
    let bytes = artifact.read_bytes().await?;
    let key = uuid::Uuid::new_v4().simple().to_string();
    let name = sanitize_filename(&artifact.name);
    let dir = root.join(&key);

    let io_err = |source| ExtractError::Read {
        name: artifact.name.clone(),
        source,
    };
    tokio::fs::create_dir_all(&dir).await.map_err(io_err)?;
    tokio::fs::write(dir.join(&name), &bytes).await.map_err(io_err)?;

    Ok(Archived {
        dir,
        file_path: format!("{}/{}/{}", FILES_PREFIX, key, name),
    })
}

/// Await a spawned upload, folding task failures into [`PipelineError`].
pub async fn join_upload(
    handle: JoinHandle<Result<UploadReport, PipelineError>>,
) -> Result<UploadReport, PipelineError> {
    handle
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))?
}
