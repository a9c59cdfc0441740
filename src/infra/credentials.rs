//! Credential source discovery.

use std::path::Path;

use crate::core::DispatchError;
use crate::util::CredentialId;

/// List credential files with `extension` in `dir`, sorted by name.
///
/// Each file name becomes one [`CredentialId`]. Ordering here is only for
/// reproducible listings; the pool shuffles per run.
///
/// # Errors
///
/// Returns [`DispatchError::Io`] if the directory cannot be read and
/// [`DispatchError::NoCredentials`] if it holds no matching files.
pub fn load_credential_sources(
    dir: impl AsRef<Path>,
    extension: &str,
) -> Result<Vec<CredentialId>, DispatchError> {
    let dir = dir.as_ref();
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            ids.push(CredentialId::new(name));
        }
    }
    ids.sort();
    tracing::info!(dir = %dir.display(), count = ids.len(), "loaded credential sources");
    if ids.is_empty() {
        return Err(DispatchError::NoCredentials);
    }
    Ok(ids)
}
