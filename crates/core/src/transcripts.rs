use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::conversation::{Conversation, ConversationSummary};

pub type ConversationMap = BTreeMap<String, Conversation>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not read transcript file `{path}`: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("could not write transcript file `{path}`: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("transcript file `{path}` holds invalid JSON: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("could not encode transcripts: {0}")]
    Encode(#[source] serde_json::Error),
}

/// JSON-file-backed conversation storage. Every operation reads the whole map
/// and writes it back, so concurrent writers must be serialized by the caller.
#[derive(Clone, Debug)]
pub struct TranscriptStore {
    path: PathBuf,
}

impl TranscriptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Strict read: a missing file is an empty map, unreadable or corrupt
    /// content is an error. Used by diagnostics.
    pub fn read_map(&self) -> Result<ConversationMap, StoreError> {
        if !self.path.exists() {
            return Ok(ConversationMap::new());
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|source| StoreError::Read { path: self.path.clone(), source })?;
        serde_json::from_str(&raw)
            .map_err(|source| StoreError::Parse { path: self.path.clone(), source })
    }

    /// Lenient read: any failure yields an empty map so a damaged store never
    /// blocks new conversations.
    pub fn load_or_default(&self) -> ConversationMap {
        self.read_map().unwrap_or_default()
    }

    pub fn write_map(&self, conversations: &ConversationMap) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|source| StoreError::Write { path: self.path.clone(), source })?;
            }
        }

        let encoded = serde_json::to_string_pretty(conversations).map_err(StoreError::Encode)?;
        fs::write(&self.path, encoded)
            .map_err(|source| StoreError::Write { path: self.path.clone(), source })
    }

    pub fn get(&self, conversation_id: &str) -> Option<Conversation> {
        self.load_or_default().remove(conversation_id)
    }

    pub fn upsert(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let mut conversations = self.load_or_default();
        conversations.insert(conversation.id.clone(), conversation.clone());
        self.write_map(&conversations)
    }

    /// Removes one conversation. Returns false when the id was not stored.
    pub fn delete(&self, conversation_id: &str) -> Result<bool, StoreError> {
        let mut conversations = self.load_or_default();
        if conversations.remove(conversation_id).is_none() {
            return Ok(false);
        }

        self.write_map(&conversations)?;
        Ok(true)
    }

    /// Summaries of every stored conversation, newest first.
    pub fn summaries(&self) -> Vec<ConversationSummary> {
        let mut summaries = self
            .load_or_default()
            .values()
            .map(Conversation::summary)
            .collect::<Vec<_>>();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        summaries
    }
}
