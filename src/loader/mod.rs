// Document loading
// Turns a source file into ordered pages of raw text

#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{RagError, Result};

/// Raw text of one physical page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub text: String,
    pub metadata: PageMetadata,
}

/// Where a page came from. Page numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub source: PathBuf,
    pub page: u32,
}

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

impl DocumentKind {
    /// Detect the document format from the file extension
    #[inline]
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("pdf") => Ok(Self::Pdf),
            Some("txt" | "md" | "markdown") => Ok(Self::Text),
            _ => Err(RagError::Document(format!(
                "Unsupported document type: {}",
                path.display()
            ))),
        }
    }
}

/// Load a document as an ordered list of pages.
///
/// Fails before touching anything else when the file does not exist.
#[inline]
pub fn load_document(path: &Path) -> Result<Vec<Page>> {
    if !path.is_file() {
        return Err(RagError::Document(format!(
            "File '{}' not found",
            path.display()
        )));
    }

    let pages = match DocumentKind::from_path(path)? {
        DocumentKind::Pdf => load_pdf(path)?,
        DocumentKind::Text => load_text(path)?,
    };

    info!("Loaded {} pages from {}", pages.len(), path.display());
    Ok(pages)
}

fn load_pdf(path: &Path) -> Result<Vec<Page>> {
    let document = lopdf::Document::load(path).map_err(|e| {
        RagError::Document(format!("Failed to parse PDF {}: {}", path.display(), e))
    })?;

    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    debug!("PDF {} has {} pages", path.display(), page_numbers.len());

    let pages = page_numbers
        .into_iter()
        .map(|page| {
            let text = document.extract_text(&[page]).unwrap_or_else(|e| {
                warn!(
                    "Could not extract text from page {} of {}: {}",
                    page,
                    path.display(),
                    e
                );
                String::new()
            });

            Page {
                text,
                metadata: PageMetadata {
                    source: path.to_path_buf(),
                    page,
                },
            }
        })
        .collect();

    Ok(pages)
}

fn load_text(path: &Path) -> Result<Vec<Page>> {
    let text = fs::read_to_string(path)?;
    Ok(vec![Page {
        text,
        metadata: PageMetadata {
            source: path.to_path_buf(),
            page: 1,
        },
    }])
}
