//! Services the batch engine consumes: folder enumeration and document I/O.
//!
//! The traits let an embedding shell substitute its own storage; the local
//! implementations work on the file system.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::document::Document;
use crate::error::{ConverterError, Result};

/// Folder and file existence and enumeration.
pub trait FileSystemService {
    fn folder_exists(&self, path: &Path) -> bool;

    fn file_exists(&self, path: &Path) -> bool;

    /// Immediate subfolders of `path`, sorted by name.
    fn subfolders(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Files directly inside `path` with the given extension (no dot),
    /// sorted by name.
    fn files(&self, path: &Path, extension: &str) -> Result<Vec<PathBuf>>;

    /// Copy `from` over `to`, creating `to`'s folder if needed.
    fn copy_file(&self, from: &Path, to: &Path) -> Result<()>;
}

/// Document load and save.
pub trait DocumentService {
    fn load(&self, path: &Path) -> Result<Document>;

    fn save(&self, document: &Document, path: &Path) -> Result<()>;
}

/// [`FileSystemService`] over the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    fn entries(&self, path: &Path) -> Result<Vec<walkdir::DirEntry>> {
        if !path.is_dir() {
            return Err(ConverterError::FolderNotFound {
                path: path.to_path_buf(),
            });
        }
        let mut entries = Vec::new();
        for entry in WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| ConverterError::FileReadError {
                path: path.to_path_buf(),
                source: e.into(),
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

impl FileSystemService for LocalFileSystem {
    fn folder_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn subfolders(&self, path: &Path) -> Result<Vec<PathBuf>> {
        Ok(self
            .entries(path)?
            .into_iter()
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| entry.into_path())
            .collect())
    }

    fn files(&self, path: &Path, extension: &str) -> Result<Vec<PathBuf>> {
        Ok(self
            .entries(path)?
            .into_iter()
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
                    .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
            .collect())
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        if !from.is_file() {
            return Err(ConverterError::FileNotFound {
                path: from.to_path_buf(),
            });
        }
        if let Some(folder) = to.parent() {
            fs::create_dir_all(folder).map_err(|e| ConverterError::FileWriteError {
                path: folder.to_path_buf(),
                source: e,
            })?;
        }
        fs::copy(from, to).map_err(|e| ConverterError::FileWriteError {
            path: to.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
}

/// [`DocumentService`] reading and writing indented XML files.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlDocumentService;

impl DocumentService for XmlDocumentService {
    fn load(&self, path: &Path) -> Result<Document> {
        Document::load(path)
    }

    fn save(&self, document: &Document, path: &Path) -> Result<()> {
        document.save(path)
    }
}
