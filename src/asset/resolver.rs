//! Folder path resolution.
//!
//! A folder's directory is not stored; it is rebuilt by walking the folder
//! edge set of its storage path from the folder up to its root.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use sqlx::SqlitePool;
use tracing::debug;

use super::folder::{FolderEdge, FolderRepository};
use super::storage_path::StoragePath;
use crate::{Result, VaultError};

/// The edge set of one storage path, indexed by child folder.
#[derive(Debug, Default)]
pub struct FolderGraph {
    parents: HashMap<i64, (i64, String)>,
}

impl FolderGraph {
    /// Index a list of edges by child folder ID.
    pub fn new(edges: impl IntoIterator<Item = FolderEdge>) -> Self {
        let parents = edges
            .into_iter()
            .map(|e| (e.folder_id, (e.parent_folder_id, e.folder_name)))
            .collect();
        Self { parents }
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Check if the graph has no edges.
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Walk upward from `folder_id`.
    ///
    /// Returns the names of every non-root folder on the way, root-most first,
    /// together with the ID of the folder that has no parent edge.
    pub fn ancestry(&self, folder_id: i64) -> Result<(Vec<String>, i64)> {
        let mut names = Vec::new();
        let mut visited = HashSet::new();
        let mut current = folder_id;

        while let Some((parent, name)) = self.parents.get(&current) {
            if !visited.insert(current) {
                return Err(VaultError::PathResolution(format!(
                    "cycle in folder graph at folder {current}"
                )));
            }
            names.push(name.clone());
            current = *parent;
        }

        names.reverse();
        Ok((names, current))
    }
}

/// Resolves the on-disk directory of a folder.
pub struct PathResolver<'a> {
    pool: &'a SqlitePool,
    files_root: &'a Path,
}

impl<'a> PathResolver<'a> {
    /// Create a resolver rooted at `files_root`.
    pub fn new(pool: &'a SqlitePool, files_root: &'a Path) -> Self {
        Self { pool, files_root }
    }

    /// Resolve the directory of `folder_id` inside `storage_path`.
    ///
    /// The result is `files_root / storage_path.path / root / ... / folder`.
    /// Nothing is returned unless every hop resolves.
    pub async fn resolve(&self, storage_path: &StoragePath, folder_id: i64) -> Result<PathBuf> {
        let folders = FolderRepository::new(self.pool);
        let graph = FolderGraph::new(folders.list_edges(storage_path.id).await?);
        let (names, root_id) = graph.ancestry(folder_id)?;

        let root = folders.get_by_id(root_id).await?.ok_or_else(|| {
            VaultError::PathResolution(format!("folder {root_id} does not exist"))
        })?;
        if root.storage_path_id != storage_path.id {
            return Err(VaultError::PathResolution(format!(
                "folder {root_id} does not belong to storage path {}",
                storage_path.id
            )));
        }

        let mut path = self
            .files_root
            .join(storage_path.path.trim_start_matches('/'))
            .join(&root.name);
        for name in &names {
            path.push(name);
        }

        debug!(folder_id, path = %path.display(), "Resolved folder path");
        Ok(path)
    }
}
