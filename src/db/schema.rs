//! Database schema and migrations for filevault.
//!
//! Migrations are applied in order when the database is opened; the
//! `schema_version` table records which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: storage paths and the folder graph
    r#"
CREATE TABLE storage_paths (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    app_name    TEXT NOT NULL,
    path        TEXT NOT NULL,
    size_limit  INTEGER,                 -- bytes, NULL = unlimited
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (app_name, path)
);

CREATE TABLE folders (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    storage_path_id  INTEGER NOT NULL REFERENCES storage_paths(id) ON DELETE CASCADE,
    name             TEXT NOT NULL,
    color            TEXT NOT NULL DEFAULT '',
    immutable        INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at       TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at       TEXT
);

CREATE INDEX idx_folders_storage_path ON folders(storage_path_id);

-- A folder without an edge is a root folder of its storage path.
CREATE TABLE folder_edges (
    storage_path_id   INTEGER NOT NULL REFERENCES storage_paths(id) ON DELETE CASCADE,
    folder_id         INTEGER NOT NULL UNIQUE REFERENCES folders(id) ON DELETE CASCADE,
    parent_folder_id  INTEGER NOT NULL REFERENCES folders(id) ON DELETE CASCADE
);

CREATE INDEX idx_folder_edges_storage_path ON folder_edges(storage_path_id);
CREATE INDEX idx_folder_edges_parent ON folder_edges(parent_folder_id);
"#,
    // v2: assets
    r#"
CREATE TABLE documents (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    folder_id   INTEGER NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    extension   TEXT NOT NULL,
    mime_type   TEXT NOT NULL,
    size        INTEGER NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at  TEXT
);

CREATE INDEX idx_documents_folder ON documents(folder_id);

CREATE TABLE images (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    folder_id    INTEGER NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
    name         TEXT NOT NULL,
    extension    TEXT NOT NULL,
    mime_type    TEXT NOT NULL,
    size         INTEGER NOT NULL,
    width        INTEGER NOT NULL,
    height       INTEGER NOT NULL,
    description  TEXT,
    created_at   TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at   TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at   TEXT
);

CREATE INDEX idx_images_folder ON images(folder_id);

CREATE TABLE image_variants (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    image_id  INTEGER NOT NULL REFERENCES images(id) ON DELETE CASCADE,
    size      TEXT NOT NULL,             -- 'xs', 'sm', 'md', 'lg', 'xl', 'xxl'
    width     INTEGER NOT NULL,
    height    INTEGER NOT NULL,
    UNIQUE (image_id, size)
);
"#,
];
