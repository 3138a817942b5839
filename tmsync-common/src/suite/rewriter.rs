//! Locate, extract and rename tests inside one suite file.

use super::model::{BlockId, SuiteModel, TestCaseBlock, line_content, starts_block};
use crate::errors::SourceError;
use crate::ident;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of [`SuiteFile::assign_identifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignOutcome {
    /// The name was rewritten and the file saved.
    Assigned { new_name: String },
    /// The name already carries a marker; nothing was written.
    AlreadyMarked,
}

/// One suite file loaded for reading and rewriting.
///
/// All mutation happens in memory; [`SuiteFile::persist`] writes the whole
/// file back in a single atomic replace.
#[derive(Debug, Clone)]
pub struct SuiteFile {
    path: PathBuf,
    model: SuiteModel,
}

impl SuiteFile {
    /// Load and parse the suite at `path`.
    ///
    /// Missing files, directories, non-UTF-8 content and unrecognized
    /// section headers are all errors; callers must filter paths first.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| SourceError::io(path, e))?;
        Self::from_source(path, &text)
    }

    /// Parse already-loaded text as if it were read from `path`.
    pub fn from_source(path: impl AsRef<Path>, text: &str) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let model = SuiteModel::parse(&path, text)?;
        Ok(Self { path, model })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn model(&self) -> &SuiteModel {
        &self.model
    }

    /// Declared names of every test, in file order.
    pub fn test_names(&self) -> Vec<String> {
        self.model
            .test_cases()
            .map(|(_, test)| test.name.value.clone())
            .collect()
    }

    /// Find a test by its exact declared name. First match wins.
    pub fn locate_test(&self, name: &str) -> Option<&TestCaseBlock> {
        self.find(name).map(|(_, test)| test)
    }

    fn find(&self, name: &str) -> Option<(BlockId, &TestCaseBlock)> {
        self.model
            .test_cases()
            .find(|(_, test)| test.name.value == name)
    }

    /// Verbatim text of the named test, header line through its last line.
    pub fn extract_source_span(&self, name: &str) -> Option<String> {
        let test = self.locate_test(name)?;
        let lines = self.model.lines();
        let end = test
            .end_line
            .unwrap_or_else(|| scan_block_end(lines, test.start_line));
        Some(lines[test.start_line - 1..end].concat())
    }

    /// Append `identifier` to the named test's declared name and save.
    ///
    /// A name that already carries a marker is left untouched so repeated
    /// reconciliation passes never stack markers.
    pub fn assign_identifier(
        &mut self,
        name: &str,
        identifier: &str,
    ) -> Result<AssignOutcome, SourceError> {
        let id = self
            .find(name)
            .map(|(id, _)| id)
            .ok_or_else(|| SourceError::TestNotFound {
                name: name.to_string(),
                path: self.path.clone(),
            })?;

        if ident::has_identifier(name) {
            debug!(test = name, file = %self.path.display(), "Test already carries an id");
            return Ok(AssignOutcome::AlreadyMarked);
        }

        let new_name = ident::with_identifier(name, identifier);
        self.model.rename_test(id, &new_name);
        self.persist()?;
        info!(test = %new_name, file = %self.path.display(), "Assigned test id");
        Ok(AssignOutcome::Assigned { new_name })
    }

    /// Strip markers from every test name in the file. Saves once, and only
    /// when something changed. Returns the number of renamed tests.
    ///
    /// A name made only of markers keeps them: an empty header line would
    /// hand the test's body to the block above it.
    pub fn strip_all_identifiers(&mut self) -> Result<usize, SourceError> {
        let mut renames: Vec<(BlockId, String)> = Vec::new();
        for (id, test) in self.model.test_cases() {
            if !ident::has_identifier(&test.name.value) {
                continue;
            }
            let stripped = ident::strip_identifiers(&test.name.value);
            if stripped.is_empty() {
                warn!(
                    test = %test.name.value,
                    file = %self.path.display(),
                    line = test.start_line,
                    "Test name is only an id; leaving it in place"
                );
                continue;
            }
            renames.push((id, stripped));
        }

        for (id, name) in &renames {
            self.model.rename_test(*id, name);
        }

        if !renames.is_empty() {
            self.persist()?;
            info!(
                file = %self.path.display(),
                count = renames.len(),
                "Removed test ids"
            );
        }
        Ok(renames.len())
    }

    /// Write the model back over the original file.
    pub fn persist(&self) -> Result<(), SourceError> {
        atomic_write(&self.path, self.model.render().as_bytes())
    }
}

/// Heuristic block end: the last non-blank line before the next line that
/// opens a block or section, or before end-of-file. Trailing blank lines are
/// never part of a block, matching the boundaries the model records.
/// Returns a 1-based inclusive line.
fn scan_block_end(lines: &[String], start_line: usize) -> usize {
    let mut last = start_line;
    for (idx, raw) in lines.iter().enumerate().skip(start_line) {
        let content = line_content(raw);
        if content.trim().is_empty() {
            continue;
        }
        if content.starts_with('*') || starts_block(content) {
            break;
        }
        last = idx + 1;
    }
    last
}

/// Writes content to a file atomically using a temporary sibling file.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), SourceError> {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));

    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    };

    write().map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        SourceError::io(path, e)
    })
}
