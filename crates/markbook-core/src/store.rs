use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{MarkbookError, Result};

pub const ASSIGNMENTS_DIR: &str = "assignments";
pub const INDEX_FILE: &str = "assignments-index.json";
pub const WHITELIST_FILE: &str = "whitelist.json";
pub const REQUEST_LOG_FILE: &str = "logs/requests.jsonl";

/// Store-relative location of one assignment document.
#[must_use]
pub fn document_rel_path(subject: &str, name: &str) -> String {
    format!("/{subject}/{name}.json")
}

/// The authoritative primary store: a two-level tree under
/// `<root>/assignments`, one directory per subject, one `.json` file per
/// assignment. The index is derived from this tree, never the other way
/// around.
#[derive(Debug, Clone)]
pub struct AssignmentStore {
    root: PathBuf,
}

impl AssignmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn initialize(&self) -> Result<()> {
        fs::create_dir_all(self.assignments_dir())?;
        fs::create_dir_all(self.root.join("logs"))?;
        Ok(())
    }

    #[must_use]
    pub fn assignments_dir(&self) -> PathBuf {
        self.root.join(ASSIGNMENTS_DIR)
    }

    /// Subject directories, sorted. Files at the top level are ignored; a
    /// missing assignments tree reads as empty rather than failing.
    pub fn list_subjects(&self) -> Result<Vec<String>> {
        let dir = self.assignments_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(MarkbookError::from(err)),
        };
        let mut subjects = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                subjects.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        subjects.sort();
        Ok(subjects)
    }

    /// Document file names (`*.json`) within one subject directory, sorted.
    pub fn list_documents(&self, subject: &str) -> Result<Vec<String>> {
        let dir = self.subject_dir(subject)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(MarkbookError::from(err)),
        };
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type()?.is_file() && name.ends_with(".json") {
                files.push(name);
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn read_document(&self, subject: &str, file_name: &str) -> Result<String> {
        let path = self.document_file(subject, file_name)?;
        if !path.exists() {
            return Err(MarkbookError::NotFound(document_rel_path(
                subject,
                file_name.trim_end_matches(".json"),
            )));
        }
        self.ensure_path_within_root(&path)?;
        Ok(fs::read_to_string(path)?)
    }

    pub fn write_document(&self, subject: &str, file_name: &str, content: &str) -> Result<()> {
        let path = self.document_file(subject, file_name)?;
        self.write_atomic(&path, content)
    }

    pub fn delete_document(&self, subject: &str, file_name: &str) -> Result<()> {
        let path = self.document_file(subject, file_name)?;
        if !path.exists() {
            return Err(MarkbookError::NotFound(document_rel_path(
                subject,
                file_name.trim_end_matches(".json"),
            )));
        }
        self.ensure_path_within_root(&path)?;
        fs::remove_file(path)?;
        Ok(())
    }

    /// Resolve a store-relative entry path (`/<Subject>/<Name>.json`) as
    /// recorded in the index back to bytes.
    pub fn read_relative(&self, rel_path: &str) -> Result<String> {
        let mut components = rel_path.trim_start_matches('/').splitn(2, '/');
        let subject = components.next().unwrap_or_default();
        let file_name = components.next().unwrap_or_default();
        if subject.is_empty() || file_name.is_empty() || file_name.contains('/') {
            return Err(MarkbookError::Validation(format!(
                "malformed store path: {rel_path}"
            )));
        }
        self.read_document(subject, file_name)
    }

    /// Read a root-level artifact (snapshot, whitelist). `None` when absent.
    pub fn read_root_file(&self, rel: &str) -> Result<Option<String>> {
        let path = self.root_file(rel)?;
        if !path.exists() {
            return Ok(None);
        }
        self.ensure_path_within_root(&path)?;
        Ok(Some(fs::read_to_string(path)?))
    }

    pub fn write_root_file(&self, rel: &str, content: &str) -> Result<()> {
        let path = self.root_file(rel)?;
        self.write_atomic(&path, content)
    }

    pub fn append_root_file(&self, rel: &str, content: &str) -> Result<()> {
        let path = self.root_file(rel)?;
        self.ensure_path_within_root(&path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }

    fn subject_dir(&self, subject: &str) -> Result<PathBuf> {
        ensure_component(subject)?;
        Ok(self.assignments_dir().join(subject))
    }

    fn document_file(&self, subject: &str, file_name: &str) -> Result<PathBuf> {
        ensure_component(file_name)?;
        Ok(self.subject_dir(subject)?.join(file_name))
    }

    fn root_file(&self, rel: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for part in rel.split('/') {
            ensure_component(part)?;
            path.push(part);
        }
        Ok(path)
    }

    fn write_atomic(&self, path: &Path, content: &str) -> Result<()> {
        self.ensure_path_within_root(path)?;
        let parent = path.parent().ok_or_else(|| {
            MarkbookError::Validation(format!("target has no parent: {}", path.display()))
        })?;
        fs::create_dir_all(parent)?;

        let file_name = path
            .file_name()
            .and_then(|x| x.to_str())
            .ok_or_else(|| {
                MarkbookError::Validation(format!("invalid target filename: {}", path.display()))
            })?;
        let tmp_name = format!(".{file_name}.markbook.tmp.{}", uuid::Uuid::new_v4().simple());
        let tmp_path = parent.join(tmp_name);
        self.ensure_path_within_root(&tmp_path)?;

        {
            let mut tmp = fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&tmp_path)?;
            tmp.write_all(content.as_bytes())?;
            tmp.sync_all()?;
        }

        if let Err(err) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(MarkbookError::from(err));
        }

        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
        Ok(())
    }

    fn ensure_path_within_root(&self, path: &Path) -> Result<()> {
        let root = self.canonical_root()?;
        let mut probe = path.to_path_buf();
        while !probe.exists() {
            if !probe.pop() {
                return Err(MarkbookError::SecurityViolation(format!(
                    "path has no existing ancestor: {}",
                    path.display()
                )));
            }
        }

        let probe_canonical = fs::canonicalize(&probe)?;
        if !probe_canonical.starts_with(&root) {
            return Err(MarkbookError::SecurityViolation(format!(
                "path escapes store root: {}",
                path.display()
            )));
        }
        Ok(())
    }

    fn canonical_root(&self) -> Result<PathBuf> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)?;
        }
        Ok(fs::canonicalize(&self.root)?)
    }
}

/// Subject and file labels become single path components; anything that
/// could change directory depth is rejected before touching the filesystem.
fn ensure_component(label: &str) -> Result<()> {
    if label.is_empty() {
        return Err(MarkbookError::Validation("empty path component".to_string()));
    }
    if label == "." || label == ".." || label.contains('/') || label.contains('\\') {
        return Err(MarkbookError::SecurityViolation(format!(
            "path component is not a plain name: {label}"
        )));
    }
    Ok(())
}
