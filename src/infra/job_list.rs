//! Recipient list parsing.
//!
//! A list is plain text, one job per line: `recipient,subject,content-ref`.
//! The content reference names an HTML body resolved through a
//! [`ContentResolver`]. Lines with a bad address are rejected individually; a
//! reference that cannot be resolved rejects the whole list.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::{is_valid_address, DispatchError, Job, ValidationError};

/// Resolves content references to message bodies.
pub trait ContentResolver {
    /// Fetch the body named by `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingContent`] (wrapped) when nothing is
    /// stored under `reference`, or an I/O error for other read failures.
    fn resolve(&self, reference: &str) -> Result<String, DispatchError>;
}

/// Reads content files from one directory.
#[derive(Debug, Clone)]
pub struct DirContentResolver {
    root: PathBuf,
}

impl DirContentResolver {
    /// Resolve references relative to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ContentResolver for DirContentResolver {
    fn resolve(&self, reference: &str) -> Result<String, DispatchError> {
        // Only the final path component is honoured.
        let Some(name) = Path::new(reference).file_name() else {
            return Err(ValidationError::MissingContent(reference.to_owned()).into());
        };
        match std::fs::read_to_string(self.root.join(name)) {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(ValidationError::MissingContent(reference.to_owned()).into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Content held in memory, keyed by reference.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentResolver {
    bodies: HashMap<String, String>,
}

impl MemoryContentResolver {
    /// Empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `body` under `reference`.
    #[must_use]
    pub fn with(mut self, reference: impl Into<String>, body: impl Into<String>) -> Self {
        self.bodies.insert(reference.into(), body.into());
        self
    }
}

impl ContentResolver for MemoryContentResolver {
    fn resolve(&self, reference: &str) -> Result<String, DispatchError> {
        self.bodies
            .get(reference)
            .cloned()
            .ok_or_else(|| ValidationError::MissingContent(reference.to_owned()).into())
    }
}

/// Outcome of parsing a recipient list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobList {
    /// Jobs accepted for dispatch, in list order.
    pub jobs: Vec<Job>,
    /// Lines rejected during validation.
    pub rejected: Vec<ValidationError>,
}

/// Parse a recipient list.
///
/// Blank lines are ignored. Lines without exactly three fields and lines with
/// an invalid address go to [`JobList::rejected`].
///
/// # Errors
///
/// Fails the whole list when a content reference cannot be resolved.
pub fn parse_job_list<R>(text: &str, resolver: &R) -> Result<JobList, DispatchError>
where
    R: ContentResolver + ?Sized,
{
    let mut list = JobList::default();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [recipient, subject, reference] = fields.as_slice() else {
            tracing::warn!(line = idx + 1, "malformed recipient line");
            list.rejected.push(ValidationError::MalformedLine {
                line: idx + 1,
                content: line.to_owned(),
            });
            continue;
        };
        if !is_valid_address(recipient) {
            tracing::warn!(line = idx + 1, recipient, "invalid recipient address");
            list.rejected
                .push(ValidationError::InvalidRecipient((*recipient).to_owned()));
            continue;
        }
        let body = resolver.resolve(reference)?;
        list.jobs.push(Job::new(*recipient, *subject, body)?);
    }
    tracing::info!(
        accepted = list.jobs.len(),
        rejected = list.rejected.len(),
        "parsed recipient list"
    );
    Ok(list)
}

/// Read `file_name` from `dir` and parse it.
///
/// # Errors
///
/// Returns [`DispatchError::Io`] when the list cannot be read, plus any error
/// from [`parse_job_list`].
pub fn load_job_list<R>(
    dir: impl AsRef<Path>,
    file_name: &str,
    resolver: &R,
) -> Result<JobList, DispatchError>
where
    R: ContentResolver + ?Sized,
{
    let Some(name) = Path::new(file_name).file_name() else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty list file name").into());
    };
    let text = std::fs::read_to_string(dir.as_ref().join(name))?;
    parse_job_list(&text, resolver)
}
