// Game catalog: directory scan, manifest validation and token lookup.

pub mod cache;

pub use cache::CatalogSource;

use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::token;

/// File names expected inside each game folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLayout {
    pub manifest_file_name: String,
    pub cover_file_name: String,
    pub archive_file_name: String,
}

impl Default for GameLayout {
    fn default() -> Self {
        Self {
            manifest_file_name: "game.json".to_string(),
            cover_file_name: "cover.jpg".to_string(),
            archive_file_name: "game.zip".to_string(),
        }
    }
}

/// The games directory itself could not be listed.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("games directory {path} is unavailable: {source}")]
    GamesDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why a single folder was left out of the catalog.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("cannot read manifest: {0}")]
    Read(#[from] io::Error),
    #[error("cannot parse manifest: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("manifest is not a JSON object")]
    NotAnObject,
}

/// One valid game folder.
#[derive(Debug, Clone, PartialEq)]
pub struct GameEntry {
    pub folder_name: String,
    /// Folder path on disk, `<games_dir>/<folder_name>`.
    pub path: PathBuf,
    pub manifest: Map<String, Value>,
    pub download_token: String,
    /// Set only when the cover file existed at scan time.
    pub cover_token: Option<String>,
}

impl GameEntry {
    pub fn has_cover(&self) -> bool {
        self.cover_token.is_some()
    }

    pub fn archive_path(&self, layout: &GameLayout) -> PathBuf {
        self.path.join(&layout.archive_file_name)
    }

    pub fn cover_path(&self, layout: &GameLayout) -> PathBuf {
        self.path.join(&layout.cover_file_name)
    }

    /// Listing form: the manifest with location fields injected.
    ///
    /// Injected keys overwrite same-named manifest keys.
    pub fn to_listing(&self, download_prefix: &str, cover_prefix: &str) -> Value {
        let mut obj = self.manifest.clone();
        obj.insert("folderName".into(), Value::String(self.folder_name.clone()));
        obj.insert(
            "contentFile".into(),
            Value::String(format!("{download_prefix}{}", self.download_token)),
        );
        let cover = match &self.cover_token {
            Some(t) => Value::String(format!("{cover_prefix}{t}")),
            None => Value::Bool(false),
        };
        obj.insert("coverFile".into(), cover);
        obj.insert("remoteFile".into(), Value::Bool(true));
        Value::Object(obj)
    }
}

/// Validated game entries, sorted by folder name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: Vec<GameEntry>,
}

impl Catalog {
    pub fn new(mut entries: Vec<GameEntry>) -> Self {
        entries.sort_by(|a, b| a.folder_name.cmp(&b.folder_name));
        Self { entries }
    }

    pub fn entries(&self) -> &[GameEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolve_by_download_token(&self, token: &str) -> Option<&GameEntry> {
        self.entries.iter().find(|e| e.download_token == token)
    }

    /// Entries without a cover never match.
    pub fn resolve_by_cover_token(&self, token: &str) -> Option<&GameEntry> {
        self.entries
            .iter()
            .find(|e| e.cover_token.as_deref() == Some(token))
    }

    /// JSON array served on the listing route.
    pub fn to_listing(&self, download_prefix: &str, cover_prefix: &str) -> Value {
        Value::Array(
            self.entries
                .iter()
                .map(|e| e.to_listing(download_prefix, cover_prefix))
                .collect(),
        )
    }
}

/// Scan `games_dir` and build a catalog of every folder with a valid manifest.
///
/// Folders whose manifest is missing or malformed are skipped. Only a failure
/// to list `games_dir` itself is an error.
pub fn scan(games_dir: &Path, layout: &GameLayout) -> Result<Catalog, ScanError> {
    let dir_error = |source| ScanError::GamesDirectory {
        path: games_dir.to_path_buf(),
        source,
    };
    let read_dir = std::fs::read_dir(games_dir).map_err(dir_error)?;

    let entries = collect_entries(read_dir.map(|dirent| dirent.map(|d| d.path())), layout);
    let catalog = Catalog::new(entries);
    tracing::debug!(
        games_dir = %games_dir.display(),
        entries = catalog.len(),
        "Catalog scan complete"
    );
    Ok(catalog)
}

/// Turn candidate paths from a directory listing into catalog entries.
///
/// A listing entry that cannot be read is skipped like any other bad folder.
fn collect_entries<I>(candidates: I, layout: &GameLayout) -> Vec<GameEntry>
where
    I: IntoIterator<Item = io::Result<PathBuf>>,
{
    let mut entries = Vec::new();
    for candidate in candidates {
        let path = match candidate {
            Ok(path) => path,
            Err(e) => {
                tracing::debug!("Skipping unreadable directory entry: {e}");
                continue;
            }
        };

        // Follow symlinks, like a stat would.
        if !path.is_dir() {
            continue;
        }
        let folder_name = match path.file_name().map(|n| n.to_os_string().into_string()) {
            Some(Ok(name)) => name,
            Some(Err(name)) => {
                tracing::debug!(?name, "Skipping folder with non UTF-8 name");
                continue;
            }
            None => continue,
        };

        match load_manifest(&path, &layout.manifest_file_name) {
            Ok(manifest) => entries.push(build_entry(folder_name, path, manifest, layout)),
            Err(e) => tracing::debug!(folder = %folder_name, "Not a valid game: {e}"),
        }
    }
    entries
}

/// Read and parse `<folder>/<manifest_file_name>`.
pub fn load_manifest(
    folder: &Path,
    manifest_file_name: &str,
) -> Result<Map<String, Value>, ManifestError> {
    let contents = std::fs::read_to_string(folder.join(manifest_file_name))?;
    match serde_json::from_str::<Value>(&contents)? {
        Value::Object(map) => Ok(map),
        _ => Err(ManifestError::NotAnObject),
    }
}

fn build_entry(
    folder_name: String,
    path: PathBuf,
    manifest: Map<String, Value>,
    layout: &GameLayout,
) -> GameEntry {
    let download_token = token::derive(&folder_name);
    let cover_token = path
        .join(&layout.cover_file_name)
        .is_file()
        .then(|| download_token.clone());
    GameEntry {
        folder_name,
        path,
        manifest,
        download_token,
        cover_token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn add_game(root: &Path, name: &str, manifest: &str, cover: bool) {
        let dir = root.join(name);
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("game.json"), manifest).unwrap();
        if cover {
            std::fs::write(dir.join("cover.jpg"), b"\xff\xd8\xff").unwrap();
        }
    }

    #[test]
    fn test_scan_filters_invalid_folders() {
        let root = tempfile::tempdir().unwrap();
        add_game(root.path(), "chess", r#"{"name":"Chess"}"#, true);
        add_game(root.path(), "broken", "{ nope", false);
        add_game(root.path(), "array", "[1, 2, 3]", false);
        std::fs::create_dir(root.path().join("empty")).unwrap();
        std::fs::write(root.path().join("stray.json"), r#"{"name":"x"}"#).unwrap();

        let catalog = scan(root.path(), &GameLayout::default()).unwrap();
        assert_eq!(catalog.len(), 1);
        let chess = &catalog.entries()[0];
        assert_eq!(chess.folder_name, "chess");
        assert!(chess.has_cover());
        assert_eq!(chess.manifest["name"], "Chess");
        assert_eq!(chess.download_token, token::derive("chess"));
    }

    #[test]
    fn test_unreadable_listing_entry_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        add_game(root.path(), "chess", "{}", false);
        add_game(root.path(), "go", "{}", false);

        let candidates = vec![
            Ok(root.path().join("chess")),
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "entry vanished")),
            Ok(root.path().join("go")),
        ];
        let entries = collect_entries(candidates, &GameLayout::default());
        let names: Vec<&str> = entries.iter().map(|e| e.folder_name.as_str()).collect();
        assert_eq!(names, vec!["chess", "go"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_follows_symlinked_folders() {
        let root = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        add_game(elsewhere.path(), "quake", r#"{"name":"Quake"}"#, true);
        std::os::unix::fs::symlink(elsewhere.path().join("quake"), root.path().join("linked"))
            .unwrap();
        // A symlink to a plain file is not a game folder
        std::fs::write(elsewhere.path().join("notes.txt"), "").unwrap();
        std::os::unix::fs::symlink(elsewhere.path().join("notes.txt"), root.path().join("notes"))
            .unwrap();

        let catalog = scan(root.path(), &GameLayout::default()).unwrap();
        assert_eq!(catalog.len(), 1);
        let linked = &catalog.entries()[0];
        assert_eq!(linked.folder_name, "linked");
        assert!(linked.has_cover());
        assert_eq!(linked.download_token, token::derive("linked"));
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_skips_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let root = tempfile::tempdir().unwrap();
        let bad = root.path().join(OsStr::from_bytes(b"bad\xff"));
        // Some filesystems reject invalid UTF-8 names outright
        if std::fs::create_dir(&bad).is_err() {
            return;
        }
        std::fs::write(bad.join("game.json"), "{}").unwrap();
        add_game(root.path(), "chess", "{}", false);

        let catalog = scan(root.path(), &GameLayout::default()).unwrap();
        let names: Vec<&str> = catalog
            .entries()
            .iter()
            .map(|e| e.folder_name.as_str())
            .collect();
        assert_eq!(names, vec!["chess"]);
    }

    #[test]
    fn test_scan_sorted_by_folder_name() {
        let root = tempfile::tempdir().unwrap();
        for name in ["zork", "doom", "quake", "Arma"] {
            add_game(root.path(), name, "{}", false);
        }

        let catalog = scan(root.path(), &GameLayout::default()).unwrap();
        let names: Vec<&str> = catalog
            .entries()
            .iter()
            .map(|e| e.folder_name.as_str())
            .collect();
        assert_eq!(names, vec!["Arma", "doom", "quake", "zork"]);
    }

    #[test]
    fn test_scan_empty_directory() {
        let root = tempfile::tempdir().unwrap();
        let catalog = scan(root.path(), &GameLayout::default()).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_scan_missing_directory_is_error() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("nope");
        let err = scan(&missing, &GameLayout::default()).unwrap_err();
        match err {
            ScanError::GamesDirectory { path, .. } => assert_eq!(path, missing),
        }
    }

    #[test]
    fn test_scan_file_instead_of_directory_is_error() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("games");
        std::fs::write(&file, "").unwrap();
        assert!(scan(&file, &GameLayout::default()).is_err());
    }

    #[test]
    fn test_scan_custom_manifest_name() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("tetris");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("meta.json"), "{}").unwrap();

        let default = scan(root.path(), &GameLayout::default()).unwrap();
        assert!(default.is_empty());

        let layout = GameLayout {
            manifest_file_name: "meta.json".to_string(),
            ..GameLayout::default()
        };
        let custom = scan(root.path(), &layout).unwrap();
        assert_eq!(custom.len(), 1);
    }

    #[test]
    fn test_load_manifest_errors() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_manifest(root.path(), "game.json"),
            Err(ManifestError::Read(_))
        ));

        std::fs::write(root.path().join("game.json"), "{").unwrap();
        assert!(matches!(
            load_manifest(root.path(), "game.json"),
            Err(ManifestError::Parse(_))
        ));

        std::fs::write(root.path().join("game.json"), "\"just a string\"").unwrap();
        assert!(matches!(
            load_manifest(root.path(), "game.json"),
            Err(ManifestError::NotAnObject)
        ));
    }

    #[test]
    fn test_resolve_tokens() {
        let root = tempfile::tempdir().unwrap();
        add_game(root.path(), "chess", "{}", true);
        add_game(root.path(), "go", "{}", false);
        let catalog = scan(root.path(), &GameLayout::default()).unwrap();

        let chess = catalog
            .resolve_by_download_token(&token::derive("chess"))
            .unwrap();
        assert_eq!(chess.folder_name, "chess");

        let go = catalog.resolve_by_download_token(&token::derive("go")).unwrap();
        assert_eq!(go.folder_name, "go");

        // Cover token maps back to the same folder's cover file
        let cover_token = chess.cover_token.clone().unwrap();
        let by_cover = catalog.resolve_by_cover_token(&cover_token).unwrap();
        assert_eq!(
            by_cover.cover_path(&GameLayout::default()),
            root.path().join("chess").join("cover.jpg")
        );

        // No cover, no match
        assert!(catalog.resolve_by_cover_token(&token::derive("go")).is_none());
        assert!(catalog
            .resolve_by_download_token(&token::derive("broken"))
            .is_none());
        assert!(catalog.resolve_by_download_token("").is_none());
    }

    #[test]
    fn test_listing_injects_locations() {
        let entry = GameEntry {
            folder_name: "chess".to_string(),
            path: PathBuf::from("/games/chess"),
            manifest: json!({"name": "Chess", "folderName": "spoofed"})
                .as_object()
                .cloned()
                .unwrap(),
            download_token: "abc".to_string(),
            cover_token: None,
        };

        let listing = entry.to_listing("/download/", "/cover/");
        assert_eq!(
            listing,
            json!({
                "name": "Chess",
                "folderName": "chess",
                "contentFile": "/download/abc",
                "coverFile": false,
                "remoteFile": true,
            })
        );

        let with_cover = GameEntry {
            cover_token: Some("abc".to_string()),
            ..entry
        };
        assert_eq!(
            with_cover.to_listing("/download/", "/cover/")["coverFile"],
            "/cover/abc"
        );
    }
}
