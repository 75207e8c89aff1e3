use crate::extractor::{ContentExtractor, Extraction, ExtractionIssue, FileContentExtractor};
use crate::figures::{FigureCorrelator, FigureDetector, OrderBasedPairing};
use crate::models::{Document, DocumentMetadata, IngestionOptions, ROOT_FOLDER};
use crate::IngestError;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Regular files under `root`, recursively, in file-name order.
pub fn discover_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(error) => {
                warn!(%error, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// Containing folder relative to `root`, or `root` for top-level files.
pub fn folder_name(root: &Path, file: &Path) -> String {
    let relative = file
        .parent()
        .and_then(|parent| parent.strip_prefix(root).ok())
        .map(|relative| relative.to_string_lossy().to_string())
        .unwrap_or_default();

    if relative.is_empty() || relative == "." {
        ROOT_FOLDER.to_string()
    } else {
        relative
    }
}

pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Default)]
pub struct IngestionReport {
    pub documents: Vec<Document>,
    /// Files of a type that carries no extractable text.
    pub skipped_files: Vec<SkippedFile>,
    /// Files whose extraction failed outright.
    pub failed_files: Vec<SkippedFile>,
    /// Files that produced no text.
    pub empty_files: Vec<PathBuf>,
    /// Recoverable page and image problems, per file.
    pub issues: Vec<(PathBuf, ExtractionIssue)>,
}

/// Walks a folder tree and turns every readable file into a [`Document`].
pub struct DocumentBuilder<E = FileContentExtractor, C = OrderBasedPairing> {
    extractor: E,
    detector: FigureDetector,
    correlator: C,
    keep_empty_documents: bool,
}

impl DocumentBuilder {
    pub fn from_options(options: &IngestionOptions) -> Result<Self, IngestError> {
        Ok(Self {
            extractor: FileContentExtractor::new(&options.image_output_dir),
            detector: FigureDetector::new()?,
            correlator: OrderBasedPairing,
            keep_empty_documents: options.keep_empty_documents,
        })
    }
}

impl<E, C> DocumentBuilder<E, C>
where
    E: ContentExtractor,
    C: FigureCorrelator,
{
    pub fn new(extractor: E, correlator: C) -> Result<Self, IngestError> {
        Ok(Self {
            extractor,
            detector: FigureDetector::new()?,
            correlator,
            keep_empty_documents: false,
        })
    }

    pub fn keep_empty_documents(mut self, keep: bool) -> Self {
        self.keep_empty_documents = keep;
        self
    }

    pub fn build(&self, root: &Path) -> Result<IngestionReport, IngestError> {
        if !root.is_dir() {
            return Err(IngestError::InvalidArgument(format!(
                "not a directory: {}",
                root.display()
            )));
        }

        let mut report = IngestionReport::default();

        for path in discover_files(root) {
            info!(path = %path.display(), "processing file");

            let (text, image_paths) = match self.extractor.extract(&path) {
                Extraction::Content(content) => {
                    report
                        .issues
                        .extend(content.issues.into_iter().map(|issue| (path.clone(), issue)));
                    (content.text, content.image_paths)
                }
                Extraction::Unsupported(kind) => {
                    report.skipped_files.push(SkippedFile {
                        path,
                        reason: format!("unsupported file type {kind:?}"),
                    });
                    continue;
                }
                Extraction::Failed { reason } => {
                    report.failed_files.push(SkippedFile {
                        path: path.clone(),
                        reason,
                    });
                    (String::new(), Vec::new())
                }
            };

            if text.is_empty() {
                report.empty_files.push(path.clone());
                if !self.keep_empty_documents {
                    continue;
                }
            }

            let Some(filename) = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
            else {
                report.failed_files.push(SkippedFile {
                    reason: IngestError::MissingFileName(path.display().to_string()).to_string(),
                    path,
                });
                continue;
            };
            let titles = self.detector.detect(&text);
            let figures = self.correlator.correlate(&titles, &image_paths);

            report.documents.push(Document {
                content: text,
                metadata: DocumentMetadata {
                    filename,
                    file_path: Some(path.to_string_lossy().to_string()),
                },
                folder_name: folder_name(root, &path),
                figures,
                content_vector: None,
            });
        }

        info!(
            documents = report.documents.len(),
            skipped = report.skipped_files.len(),
            failed = report.failed_files.len(),
            issues = report.issues.len(),
            "ingestion finished"
        );

        Ok(report)
    }
}
