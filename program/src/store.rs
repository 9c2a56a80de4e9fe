// Lucky Draw Engine - State store gateway
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use dashmap::{mapref::entry::Entry, DashMap};

use crate::{error::DrawError, state::DrawState};

const MAX_USER_KEY_LEN: usize = 64;

/// Stable identity of an authenticated caller
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserKey(String);

impl UserKey {
    /// Accepts 1 to 64 characters of `[A-Za-z0-9_-]`
    pub fn new(raw: impl Into<String>) -> Result<Self, DrawError> {
        let raw = raw.into();
        let well_formed = !raw.is_empty()
            && raw.len() <= MAX_USER_KEY_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !well_formed {
            return Err(DrawError::validation(format!("malformed user key {:?}", raw)));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-user overview of a stored document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentSummary {
    pub user: UserKey,
    pub participants: usize,
    pub prizes: usize,
    pub extra_prizes: usize,
    pub winners: usize,
    pub updated_at: Option<DateTime<Local>>,
}

/// Key-value persistence of one draw document per user
pub trait StateStore: Send + Sync {
    /// Stored document, if any
    fn load(&self, key: &UserKey) -> Result<Option<DrawState>, DrawError>;

    /// Unconditional overwrite, last write wins
    fn save(&self, key: &UserKey, state: &DrawState) -> Result<(), DrawError>;

    /// Users with a stored document, sorted
    fn keys(&self) -> Result<Vec<UserKey>, DrawError>;

    /// Time of the last save, when the backend tracks it
    fn updated_at(&self, _key: &UserKey) -> Result<Option<DateTime<Local>>, DrawError> {
        Ok(None)
    }

    /// One summary per stored document
    fn summaries(&self) -> Result<Vec<DocumentSummary>, DrawError> {
        let mut summaries = Vec::new();
        for user in self.keys()? {
            let state = match self.load(&user)? {
                Some(state) => state,
                // Removed between listing and loading
                None => continue,
            };
            summaries.push(DocumentSummary {
                participants: state.all_participants.len(),
                prizes: state.prizes.len(),
                extra_prizes: state.extra_prizes.len(),
                winners: state.winners.len(),
                updated_at: self.updated_at(&user)?,
                user,
            });
        }
        Ok(summaries)
    }

    /// Stored document, or the default one installed on first access
    fn get_or_create(&self, key: &UserKey) -> Result<DrawState, DrawError> {
        if let Some(state) = self.load(key)? {
            return Ok(state);
        }
        let state = DrawState::default();
        self.save(key, &state)?;
        Ok(state)
    }
}

struct StoredDocument {
    json: String,
    updated_at: DateTime<Local>,
}

impl StoredDocument {
    fn encode(state: &DrawState) -> Result<Self, DrawError> {
        Ok(Self {
            json: state.to_json()?,
            updated_at: Local::now(),
        })
    }
}

/// Process-local store keeping serialized documents
#[derive(Default)]
pub struct MemoryStore {
    documents: DashMap<UserKey, StoredDocument>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl StateStore for MemoryStore {
    fn load(&self, key: &UserKey) -> Result<Option<DrawState>, DrawError> {
        match self.documents.get(key) {
            Some(doc) => Ok(Some(DrawState::from_json(&doc.json)?)),
            None => Ok(None),
        }
    }

    fn save(&self, key: &UserKey, state: &DrawState) -> Result<(), DrawError> {
        let doc = StoredDocument::encode(state)?;
        self.documents.insert(key.clone(), doc);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<UserKey>, DrawError> {
        let mut keys: Vec<UserKey> = self.documents.iter().map(|doc| doc.key().clone()).collect();
        keys.sort_unstable_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(keys)
    }

    fn updated_at(&self, key: &UserKey) -> Result<Option<DateTime<Local>>, DrawError> {
        Ok(self.documents.get(key).map(|doc| doc.updated_at))
    }

    fn get_or_create(&self, key: &UserKey) -> Result<DrawState, DrawError> {
        match self.documents.entry(key.clone()) {
            Entry::Occupied(doc) => Ok(DrawState::from_json(&doc.get().json)?),
            Entry::Vacant(slot) => {
                let state = DrawState::default();
                slot.insert(StoredDocument::encode(&state)?);
                Ok(state)
            }
        }
    }
}

/// One `<user>.json` file per user under a directory
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, DrawError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, key: &UserKey) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }
}

impl StateStore for FileStore {
    fn load(&self, key: &UserKey) -> Result<Option<DrawState>, DrawError> {
        match fs::read_to_string(self.document_path(key)) {
            Ok(raw) => Ok(Some(DrawState::from_json(&raw)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &UserKey, state: &DrawState) -> Result<(), DrawError> {
        let path = self.document_path(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, state.to_json()?)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<UserKey>, DrawError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            // Files that are not named after a valid user key are not ours
            if let Some(key) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| UserKey::new(stem).ok())
            {
                keys.push(key);
            }
        }
        keys.sort_unstable_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(keys)
    }

    fn updated_at(&self, key: &UserKey) -> Result<Option<DateTime<Local>>, DrawError> {
        match fs::metadata(self.document_path(key)) {
            Ok(meta) => Ok(Some(DateTime::from(meta.modified()?))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
