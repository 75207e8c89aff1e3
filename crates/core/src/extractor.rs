use crate::{docx, pdf};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Docx,
    /// Raster images and CAD drawings: recognized, but no text to extract.
    Drawing,
    Other,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => Self::Pdf,
            Some("docx") => Self::Docx,
            Some("jpg" | "jpeg" | "png" | "dwg" | "dxf") => Self::Drawing,
            _ => Self::Other,
        }
    }
}

/// A recoverable problem met while extracting one file.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionIssue {
    PageText { page: u32, reason: String },
    ImageDecode { page: u32, index: usize, reason: String },
    ImageConversion { image: PathBuf, reason: String },
}

impl fmt::Display for ExtractionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageText { page, reason } => write!(f, "page {page} text: {reason}"),
            Self::ImageDecode {
                page,
                index,
                reason,
            } => write!(f, "page {page} image {index}: {reason}"),
            Self::ImageConversion { image, reason } => {
                write!(f, "converting {}: {reason}", image.display())
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedContent {
    pub text: String,
    /// Saved PNG files, page by page and in-page order.
    pub image_paths: Vec<PathBuf>,
    pub issues: Vec<ExtractionIssue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Content(ExtractedContent),
    Unsupported(FileKind),
    Failed { reason: String },
}

impl Extraction {
    pub fn into_parts(self) -> (String, Vec<PathBuf>) {
        match self {
            Self::Content(content) => (content.text, content.image_paths),
            Self::Unsupported(_) | Self::Failed { .. } => (String::new(), Vec::new()),
        }
    }
}

pub trait ContentExtractor {
    fn extract(&self, path: &Path) -> Extraction;
}

/// Dispatches on file extension. PDF images are written to `image_output_dir`.
#[derive(Debug, Clone)]
pub struct FileContentExtractor {
    image_output_dir: PathBuf,
}

impl FileContentExtractor {
    pub fn new(image_output_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_output_dir: image_output_dir.into(),
        }
    }
}

impl ContentExtractor for FileContentExtractor {
    fn extract(&self, path: &Path) -> Extraction {
        let kind = FileKind::from_path(path);
        let extracted = match kind {
            FileKind::Pdf => pdf::extract_pdf(path, &self.image_output_dir),
            FileKind::Docx => docx::extract_docx_text(path).map(|text| ExtractedContent {
                text,
                ..Default::default()
            }),
            FileKind::Drawing => {
                info!(path = %path.display(), "no text extraction for drawing or image file");
                return Extraction::Unsupported(kind);
            }
            FileKind::Other => {
                info!(path = %path.display(), "skipping unsupported file type");
                return Extraction::Unsupported(kind);
            }
        };

        match extracted {
            Ok(content) => {
                for issue in &content.issues {
                    warn!(path = %path.display(), %issue, "partial extraction");
                }
                Extraction::Content(content)
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "extraction failed");
                Extraction::Failed {
                    reason: error.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_kind_is_case_insensitive() {
        assert_eq!(FileKind::from_path(Path::new("A/B.PDF")), FileKind::Pdf);
        assert_eq!(FileKind::from_path(Path::new("notes.Docx")), FileKind::Docx);
        assert_eq!(FileKind::from_path(Path::new("plan.DWG")), FileKind::Drawing);
        assert_eq!(FileKind::from_path(Path::new("photo.jpeg")), FileKind::Drawing);
        assert_eq!(FileKind::from_path(Path::new("README")), FileKind::Other);
        assert_eq!(FileKind::from_path(Path::new("sheet.xlsx")), FileKind::Other);
    }

    #[test]
    fn drawings_and_unknown_files_are_unsupported_not_failed(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let extractor = FileContentExtractor::new(dir.path().join("images"));
        let drawing = dir.path().join("layout.dxf");
        let other = dir.path().join("data.csv");
        std::fs::write(&drawing, b"0\nSECTION")?;
        std::fs::write(&other, b"a,b")?;

        assert_eq!(
            extractor.extract(&drawing),
            Extraction::Unsupported(FileKind::Drawing)
        );
        assert_eq!(extractor.extract(&other), Extraction::Unsupported(FileKind::Other));
        assert_eq!(extractor.extract(&other).into_parts(), (String::new(), Vec::new()));
        Ok(())
    }

    #[test]
    fn broken_pdf_degrades_to_failed() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\n%broken")?;

        let extraction = FileContentExtractor::new(dir.path().join("images")).extract(&path);
        assert!(matches!(extraction, Extraction::Failed { .. }));
        assert_eq!(extraction.into_parts(), (String::new(), Vec::new()));
        Ok(())
    }
}
