//! Document loading.
//!
//! Documents are represented as a collection of pages. PDFs are read with
//! `lopdf`, one [`Page`] per PDF page, keeping the page number as provenance
//! for the chunks cut from it.

use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A single page of extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// File name of the source document.
    pub source: String,
    /// 1-indexed page number.
    pub number: u32,
    /// Text content of the page.
    pub content: String,
}

impl Page {
    /// Create a new page.
    pub fn new(source: impl Into<String>, number: u32, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            number,
            content: content.into(),
        }
    }

    /// Number of characters in the page.
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}

/// A document consisting of one or more pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Document name (file name).
    pub name: String,
    /// Original file path (if loaded from file).
    pub path: Option<PathBuf>,
    /// Pages in the document.
    pub pages: Vec<Page>,
}

impl Document {
    /// Create a new document with given name and pages.
    pub fn new(name: impl Into<String>, pages: Vec<Page>) -> Self {
        Self {
            name: name.into(),
            path: None,
            pages,
        }
    }

    /// Create a single-page document from raw text.
    pub fn from_text(name: impl Into<String>, content: impl Into<String>) -> Self {
        let name = name.into();
        let pages = vec![Page::new(name.clone(), 1, content)];
        Self::new(name, pages)
    }

    /// Load a PDF, one page record per PDF page.
    ///
    /// Pages whose text cannot be extracted are skipped with a warning.
    pub fn from_pdf(path: &Path) -> Result<Self> {
        let name = file_name(path);

        let pdf = lopdf::Document::load(path).map_err(|e| RagError::Pdf {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut pages = Vec::new();
        for number in pdf.get_pages().keys().copied() {
            match pdf.extract_text(&[number]) {
                Ok(text) if !text.trim().is_empty() => {
                    pages.push(Page::new(name.clone(), number, text));
                }
                Ok(_) => debug!(document = %name, page = number, "page has no text"),
                Err(e) => warn!(document = %name, page = number, error = %e, "failed to extract page text"),
            }
        }

        Ok(Self {
            name,
            path: Some(path.to_path_buf()),
            pages,
        })
    }

    /// Get total number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Get total character count across all pages.
    pub fn total_chars(&self) -> usize {
        self.pages.iter().map(|p| p.char_count()).sum()
    }
}

/// List the PDF files directly inside `dir`, sorted by file name.
///
/// Subdirectories are not searched.
pub fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RagError::DocumentsNotFound(dir.to_path_buf()));
    }

    let entries = std::fs::read_dir(dir).map_err(|e| RagError::io(dir, e))?;

    let mut pdfs = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| RagError::io(dir, e))?.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            pdfs.push(path);
        }
    }

    pdfs.sort();
    Ok(pdfs)
}

/// Load every PDF in a directory.
///
/// Unreadable or text-less PDFs produce a warning and contribute no pages;
/// they do not abort the load.
pub fn load_documents(dir: &Path) -> Result<Vec<Document>> {
    let mut documents = Vec::new();

    for path in list_pdfs(dir)? {
        match Document::from_pdf(&path) {
            Ok(doc) => {
                if doc.pages.is_empty() {
                    warn!(path = %path.display(), "no text extracted from PDF");
                } else {
                    debug!(document = %doc.name, pages = doc.page_count(), "loaded PDF");
                }
                documents.push(doc);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable PDF"),
        }
    }

    Ok(documents)
}

/// Flatten documents into their page records, in document order.
pub fn all_pages(documents: &[Document]) -> Vec<Page> {
    documents.iter().flat_map(|d| d.pages.iter().cloned()).collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string()
}
