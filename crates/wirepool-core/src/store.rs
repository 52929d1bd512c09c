// Copyright (C) 2025 Joseph Sacchini
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the Free
// Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! JSON persistence for instance documents.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use wirepool_types::Instance;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("malformed document {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode instance: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

pub fn instance_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.json"))
}

#[tracing::instrument]
pub async fn load(path: &Path) -> Result<Instance, StoreError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let instance: Instance =
        serde_json::from_str(&contents).map_err(|source| StoreError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(
        instance = %instance.name,
        slot_count = instance.slots.len(),
        "loaded instance"
    );
    Ok(instance)
}

#[tracing::instrument(skip(instance), fields(instance = %instance.name))]
pub async fn save(instance: &Instance, path: &Path) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(instance)?;
    write_atomic(path, &json).await?;
    debug!(slot_count = instance.slots.len(), "saved instance");
    Ok(())
}

/// Delete the document at `path`. A missing document is not an error.
pub async fn remove(path: &Path) -> Result<(), StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StoreError::Write {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Write `contents` next to `path` and rename it into place, so readers see
/// either the old file or the new one. Missing parent directories are created.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let write_err = |source: io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    if let Err(e) = write_synced(&tmp, contents).await {
        if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
            warn!(path = %tmp.display(), error = %cleanup, "failed to remove temporary file");
        }
        return Err(write_err(e));
    }
    tokio::fs::rename(&tmp, path).await.map_err(write_err)
}

async fn write_synced(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    // configs carry private keys
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await?;
    }
    file.write_all(contents).await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::tests::{CountingKeys, definition};
    use crate::instance::{self, ClientPool};

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = instance_path(tmp.path(), "office");

        let keys = CountingKeys::default();
        let mut inst = instance::build(&definition("10.0.0.0/29", 4), &keys).unwrap();
        inst.allocate_client("alice").unwrap();
        inst.allocate_client("bob").unwrap();
        inst.revoke_client("alice", &keys);

        save(&inst, &path).await.unwrap();
        let loaded = load(&path).await.unwrap();
        assert_eq!(loaded, inst);
        assert_eq!(loaded.slots, inst.slots);
    }

    #[tokio::test]
    async fn save_leaves_no_temporary_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = instance_path(tmp.path(), "office");
        let keys = CountingKeys::default();
        let inst = instance::build(&definition("10.0.0.0/29", 4), &keys).unwrap();

        save(&inst, &path).await.unwrap();
        save(&inst, &path).await.unwrap();

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(tmp.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["office.json".to_string()]);
    }

    #[tokio::test]
    async fn load_missing_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load(&tmp.path().join("absent.json")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn load_garbage_is_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.json");
        tokio::fs::write(&path, b"{\"name\": \"office\", \"slots\": [").await.unwrap();
        let err = load(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }

    #[tokio::test]
    async fn remove_tolerates_missing_document() {
        let tmp = tempfile::tempdir().unwrap();
        let path = instance_path(tmp.path(), "office");
        let keys = CountingKeys::default();
        let inst = instance::build(&definition("10.0.0.0/29", 1), &keys).unwrap();

        save(&inst, &path).await.unwrap();
        remove(&path).await.unwrap();
        assert!(matches!(load(&path).await, Err(StoreError::NotFound(_))));
        remove(&path).await.unwrap();
    }

    #[tokio::test]
    async fn save_into_file_path_fails_with_write() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        tokio::fs::write(&blocker, b"").await.unwrap();

        let keys = CountingKeys::default();
        let inst = instance::build(&definition("10.0.0.0/29", 1), &keys).unwrap();
        let err = save(&inst, &blocker.join("office.json")).await.unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
    }
}
