//! Template store.
//!
//! On-disk layout under the store root:
//!
//! ```text
//! index.json                  (name, scope) -> record pointer
//! global/<id>.pdf             original upload
//! global/<id>.model.json      serialized model
//! user_<id>/...               same, per user
//! ```
//!
//! Every file is written to a temporary file in its final directory and
//! renamed over the target, so readers see either the old or the new
//! content. A save writes the blobs before the index; a delete rewrites the
//! index before removing the blobs. A crash can leave an orphan blob but
//! never an index entry without its blobs.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::detect::SourceFormat;
use crate::error::{Error, Result};
use crate::model::NormalizedTemplateModel;

const INDEX_FILE: &str = "index.json";
const INDEX_VERSION: u32 = 1;

/// Ownership partition of stored templates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TemplateScope {
    /// Visible to everyone
    Global,
    /// Owned by one user
    User(String),
}

impl TemplateScope {
    /// Scope of a user.
    pub fn user(id: impl Into<String>) -> Self {
        TemplateScope::User(id.into())
    }

    /// Scope for an optional user id: `None` is global.
    pub fn from_user(id: Option<&str>) -> Self {
        match id {
            Some(id) if !id.trim().is_empty() => TemplateScope::User(id.trim().to_string()),
            _ => TemplateScope::Global,
        }
    }

    /// Check if this is the global scope.
    pub fn is_global(&self) -> bool {
        matches!(self, TemplateScope::Global)
    }

    /// Blob directory name. User ids are escaped so any id maps to one
    /// plain directory name.
    fn dir_name(&self) -> String {
        match self {
            TemplateScope::Global => "global".to_string(),
            TemplateScope::User(id) => {
                let mut dir = String::from("user_");
                for c in id.chars() {
                    if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                        dir.push(c);
                    } else {
                        let mut buf = [0u8; 4];
                        for byte in c.encode_utf8(&mut buf).bytes() {
                            dir.push_str(&format!("%{:02X}", byte));
                        }
                    }
                }
                dir
            }
        }
    }
}

impl fmt::Display for TemplateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateScope::Global => f.write_str("global"),
            TemplateScope::User(id) => write!(f, "user:{}", id),
        }
    }
}

impl FromStr for TemplateScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "global" => Ok(TemplateScope::Global),
            other => match other.strip_prefix("user:") {
                Some(id) if !id.trim().is_empty() => Ok(TemplateScope::User(id.trim().to_string())),
                _ => Err(Error::InvalidInput(format!(
                    "scope must be 'global' or 'user:<id>', got '{}'",
                    s
                ))),
            },
        }
    }
}

impl TryFrom<String> for TemplateScope {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TemplateScope> for String {
    fn from(scope: TemplateScope) -> Self {
        scope.to_string()
    }
}

/// A stored template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRecord {
    /// Unique id of this version
    pub template_id: String,
    /// Template name
    pub name: String,
    /// Owner scope
    pub scope: TemplateScope,
    /// When this version was saved
    pub created_at: DateTime<Utc>,
    /// Format of the original upload
    pub source_format: SourceFormat,
    /// The uploaded file
    pub original: Vec<u8>,
    /// The extracted model
    pub model: NormalizedTemplateModel,
}

/// Listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSummary {
    /// Template name
    pub name: String,
    /// Owner scope
    pub scope: TemplateScope,
    /// Unique id of the current version
    pub template_id: String,
    /// When the current version was saved
    pub created_at: DateTime<Utc>,
    /// Format of the original upload
    pub source_format: SourceFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IndexEntry {
    name: String,
    scope: TemplateScope,
    template_id: String,
    created_at: DateTime<Utc>,
    source_format: SourceFormat,
    /// Original bytes, relative to the store root
    blob: String,
    /// Serialized model, relative to the store root
    model: String,
}

impl IndexEntry {
    fn summary(&self) -> TemplateSummary {
        TemplateSummary {
            name: self.name.clone(),
            scope: self.scope.clone(),
            template_id: self.template_id.clone(),
            created_at: self.created_at,
            source_format: self.source_format,
        }
    }

    fn is(&self, name: &str, scope: &TemplateScope) -> bool {
        self.name == name && &self.scope == scope
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Index {
    version: u32,
    entries: Vec<IndexEntry>,
}

impl Default for Index {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            entries: Vec::new(),
        }
    }
}

/// Durable template storage.
#[derive(Debug)]
pub struct TemplateStore {
    root: PathBuf,
    /// Serializes index read-modify-write cycles within the process.
    writer: Mutex<()>,
}

impl TemplateStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| Error::storage(root.display(), e))?;
        log::debug!("Template store at {}", root.display());
        Ok(Self {
            root,
            writer: Mutex::new(()),
        })
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Save a template, replacing any template with the same name and scope.
    /// Returns the id of the new version.
    pub fn save(
        &self,
        name: &str,
        scope: &TemplateScope,
        model: &NormalizedTemplateModel,
        original: &[u8],
        source_format: SourceFormat,
    ) -> Result<String> {
        let name = validate_name(name)?;
        let problems = model.check_invariants();
        if !problems.is_empty() {
            return Err(Error::InvalidInput(format!(
                "model for '{}' is inconsistent: {}",
                name,
                problems.join("; ")
            )));
        }

        let created_at = Utc::now();
        let template_id = template_id(name, scope, created_at, original);
        let dir = scope.dir_name();
        let entry = IndexEntry {
            name: name.to_string(),
            scope: scope.clone(),
            template_id: template_id.clone(),
            created_at,
            source_format,
            blob: format!("{}/{}.{}", dir, template_id, source_format.extension()),
            model: format!("{}/{}.model.json", dir, template_id),
        };

        let model_json = serde_json::to_vec_pretty(model)
            .map_err(|e| Error::storage("serializing model", e))?;

        let _guard = self.lock()?;
        let blob_dir = self.root.join(&dir);
        fs::create_dir_all(&blob_dir).map_err(|e| Error::storage(blob_dir.display(), e))?;
        write_atomic(&self.root.join(&entry.blob), original)?;
        write_atomic(&self.root.join(&entry.model), &model_json)?;

        let mut index = self.read_index()?;
        let replaced = index
            .entries
            .iter()
            .position(|e| e.is(name, scope))
            .map(|i| index.entries.remove(i));
        index.entries.push(entry.clone());
        index
            .entries
            .sort_by(|a, b| (&a.scope, &a.name).cmp(&(&b.scope, &b.name)));
        self.write_index(&index)?;

        if let Some(old) = replaced {
            log::info!("Replaced template '{}' ({}) version {}", name, scope, old.template_id);
            self.remove_blobs(&old, Some(&entry));
        }
        log::info!("Saved template '{}' ({}) as {}", name, scope, template_id);
        Ok(template_id)
    }

    /// Load a template from exactly this scope.
    pub fn get(&self, name: &str, scope: &TemplateScope) -> Result<TemplateRecord> {
        let name = name.trim();
        // A concurrent replace may remove the blobs between reading the
        // index and reading them; the second attempt sees the new index.
        let mut attempt = 0;
        loop {
            let index = self.read_index()?;
            let entry = index
                .entries
                .into_iter()
                .find(|e| e.is(name, scope))
                .ok_or_else(|| Error::not_found(name, scope))?;
            match self.load(entry) {
                Err(Error::Storage(message)) if attempt == 0 => {
                    log::debug!("Retrying read of '{}' ({}): {}", name, scope, message);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Load a template from this scope, falling back to the global scope
    /// for user scopes.
    pub fn resolve(&self, name: &str, scope: &TemplateScope) -> Result<TemplateRecord> {
        match self.get(name, scope) {
            Err(e) if e.kind() == crate::error::ErrorKind::NotFound && !scope.is_global() => {
                self.get(name, &TemplateScope::Global).map_err(|e| match e {
                    Error::NotFound { .. } => Error::not_found(name, scope),
                    other => other,
                })
            }
            result => result,
        }
    }

    /// List templates visible in a scope, by name. A user scope sees its own
    /// templates plus global ones; its own win on a name collision.
    pub fn list(&self, scope: &TemplateScope) -> Result<Vec<TemplateSummary>> {
        let index = self.read_index()?;
        let mut visible: Vec<TemplateSummary> = index
            .entries
            .iter()
            .filter(|e| &e.scope == scope)
            .map(IndexEntry::summary)
            .collect();
        if !scope.is_global() {
            for entry in index.entries.iter().filter(|e| e.scope.is_global()) {
                if !visible.iter().any(|s| s.name == entry.name) {
                    visible.push(entry.summary());
                }
            }
        }
        visible.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.scope.cmp(&b.scope)));
        Ok(visible)
    }

    /// Delete a template from exactly this scope.
    pub fn delete(&self, name: &str, scope: &TemplateScope) -> Result<()> {
        let name = name.trim();
        let _guard = self.lock()?;
        let mut index = self.read_index()?;
        let position = index
            .entries
            .iter()
            .position(|e| e.is(name, scope))
            .ok_or_else(|| Error::not_found(name, scope))?;
        let entry = index.entries.remove(position);
        self.write_index(&index)?;
        self.remove_blobs(&entry, None);
        log::info!("Deleted template '{}' ({})", name, scope);
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.writer
            .lock()
            .map_err(|_| Error::Storage("store lock poisoned".to_string()))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn read_index(&self) -> Result<Index> {
        let path = self.index_path();
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Index::default()),
            Err(e) => return Err(Error::storage(path.display(), e)),
        };
        let index: Index =
            serde_json::from_slice(&data).map_err(|e| Error::storage(path.display(), e))?;
        if index.version != INDEX_VERSION {
            return Err(Error::Storage(format!(
                "{}: unsupported index version {}",
                path.display(),
                index.version
            )));
        }
        Ok(index)
    }

    fn write_index(&self, index: &Index) -> Result<()> {
        let json =
            serde_json::to_vec_pretty(index).map_err(|e| Error::storage("serializing index", e))?;
        write_atomic(&self.index_path(), &json)
    }

    fn load(&self, entry: IndexEntry) -> Result<TemplateRecord> {
        let blob_path = self.root.join(&entry.blob);
        let original = fs::read(&blob_path).map_err(|e| Error::storage(blob_path.display(), e))?;
        let model_path = self.root.join(&entry.model);
        let model_json =
            fs::read(&model_path).map_err(|e| Error::storage(model_path.display(), e))?;
        let model: NormalizedTemplateModel = serde_json::from_slice(&model_json)
            .map_err(|e| Error::storage(model_path.display(), e))?;

        Ok(TemplateRecord {
            template_id: entry.template_id,
            name: entry.name,
            scope: entry.scope,
            created_at: entry.created_at,
            source_format: entry.source_format,
            original,
            model,
        })
    }

    /// Remove the blobs of an entry that is no longer indexed.
    /// Delete the files of a version, except those `keep` still uses.
    fn remove_blobs(&self, old: &IndexEntry, keep: Option<&IndexEntry>) {
        for relative in [&old.blob, &old.model] {
            if keep.map_or(false, |k| relative == &k.blob || relative == &k.model) {
                continue;
            }
            let path = self.root.join(relative);
            if let Err(e) = fs::remove_file(&path) {
                log::warn!("Orphan blob {} left behind: {}", path.display(), e);
            }
        }
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("template name is empty".to_string()));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(Error::InvalidInput(
            "template name contains control characters".to_string(),
        ));
    }
    Ok(trimmed)
}

fn template_id(name: &str, scope: &TemplateScope, created_at: DateTime<Utc>, original: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(scope.to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(name.as_bytes());
    hasher.update(b"\0");
    hasher.update(created_at.to_rfc3339().as_bytes());
    hasher.update(original);
    format!("{:x}", hasher.finalize())
}

/// Write a file through a temporary file in the same directory.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Storage(format!("{} has no parent directory", path.display())))?;
    let mut tmp =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::storage(dir.display(), e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| Error::storage(tmp.path().display(), e))?;
    tmp.persist(path)
        .map_err(|e| Error::storage(path.display(), e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PageSetup, StyleRole, StyleRule};

    fn model() -> NormalizedTemplateModel {
        let mut model = NormalizedTemplateModel::new(PageSetup::a4());
        model.observe_font("Helvetica", 11.0);
        model.set_style(StyleRole::Body, StyleRule::new("Helvetica", 11.0));
        model
    }

    #[test]
    fn test_scope_strings() {
        assert_eq!(TemplateScope::Global.to_string(), "global");
        assert_eq!(TemplateScope::user("42").to_string(), "user:42");
        assert_eq!("user:42".parse::<TemplateScope>().unwrap(), TemplateScope::user("42"));
        assert!("user:".parse::<TemplateScope>().is_err());
        assert!("team:1".parse::<TemplateScope>().is_err());
        assert_eq!(TemplateScope::from_user(None), TemplateScope::Global);
    }

    #[test]
    fn test_scope_dir_names() {
        assert_eq!(TemplateScope::Global.dir_name(), "global");
        assert_eq!(TemplateScope::user("ab-1").dir_name(), "user_ab-1");
        assert_eq!(TemplateScope::user("../x").dir_name(), "user_%2E%2E%2Fx");
    }

    #[test]
    fn test_save_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::open(dir.path()).unwrap();
        let scope = TemplateScope::user("7");
        let id = store
            .save("letter", &scope, &model(), b"%PDF-1.7 bytes", SourceFormat::Pdf)
            .unwrap();

        let record = store.get("letter", &scope).unwrap();
        assert_eq!(record.template_id, id);
        assert_eq!(record.model, model());
        assert_eq!(record.original, b"%PDF-1.7 bytes");
        assert_eq!(record.source_format, SourceFormat::Pdf);
        assert!(dir.path().join("user_7").join(format!("{}.pdf", id)).exists());
    }

    #[test]
    fn test_replace_removes_old_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::open(dir.path()).unwrap();
        let first = store
            .save("memo", &TemplateScope::Global, &model(), b"one", SourceFormat::Docx)
            .unwrap();
        let second = store
            .save("memo", &TemplateScope::Global, &model(), b"two", SourceFormat::Docx)
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(store.list(&TemplateScope::Global).unwrap().len(), 1);
        assert_eq!(store.get("memo", &TemplateScope::Global).unwrap().original, b"two");
        assert!(!dir.path().join("global").join(format!("{}.docx", first)).exists());
    }

    #[test]
    fn test_replacing_same_version_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::open(dir.path()).unwrap();
        store
            .save("same", &TemplateScope::Global, &model(), b"x", SourceFormat::Pdf)
            .unwrap();
        let entry = store.read_index().unwrap().entries.remove(0);

        store.remove_blobs(&entry, Some(&entry));
        assert!(dir.path().join(&entry.blob).exists());
        assert!(dir.path().join(&entry.model).exists());
        assert_eq!(store.get("same", &TemplateScope::Global).unwrap().original, b"x");

        store.remove_blobs(&entry, None);
        assert!(!dir.path().join(&entry.blob).exists());
    }

    #[test]
    fn test_invalid_model_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::open(dir.path()).unwrap();
        let mut bad = model();
        bad.page.margins.left = 1000.0;
        let err = store
            .save("bad", &TemplateScope::Global, &bad, b"x", SourceFormat::Pdf)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
        assert!(store.list(&TemplateScope::Global).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_falls_back_to_global() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::open(dir.path()).unwrap();
        store
            .save("shared", &TemplateScope::Global, &model(), b"g", SourceFormat::Pdf)
            .unwrap();
        let user = TemplateScope::user("9");
        assert_eq!(store.resolve("shared", &user).unwrap().scope, TemplateScope::Global);
        assert!(store.get("shared", &user).is_err());

        let err = store.resolve("missing", &user).unwrap_err();
        assert_eq!(err.to_string(), "Template 'missing' not found in scope user:9");
    }

    #[test]
    fn test_corrupt_index_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(INDEX_FILE), b"{not json").unwrap();
        let store = TemplateStore::open(dir.path()).unwrap();
        let err = store.list(&TemplateScope::Global).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::StorageError);
    }
}
