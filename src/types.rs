use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The `(url, token)` pair that authorizes requests against one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub url: String,
    pub token: String,
}

impl Credential {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self { url: url.into(), token: token.into() }
    }

    /// Both fields are non-empty. The url is otherwise opaque.
    pub fn is_valid(&self) -> bool {
        !self.url.is_empty() && !self.token.is_empty()
    }
}

/// One row of the persisted pairing history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRecord {
    pub id: i64,
    pub credential: Credential,
    /// ISO-8601 UTC
    pub created_at: String,
}

/// Snapshot of the session context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub data: Option<Credential>,
    pub loading: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self { data: None, loading: true }
    }
}

/// Where a front end should go given the current session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Session not consulted yet; do not decide.
    Pending,
    /// Paired: browse the catalog.
    Home,
    /// Not paired: show the pairing screen.
    Pair,
}

/// JSON envelope every host endpoint answers with.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default)]
    pub message: String,
}

/// Node `Buffer` serialized as JSON: `{"type": "Buffer", "data": [..]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferJson {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetaData {
    pub thumbnail: BufferJson,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioMetaData {
    /// Seconds
    pub duration: f64,
    pub sample_rate: u32,
}

impl AudioMetaData {
    /// `"42s"`, `"3m 5s"` or `"1h 2m"`.
    pub fn duration_label(&self) -> String {
        let total_seconds = self.duration.max(0.0).round() as u64;
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        if minutes >= 60 {
            format!("{}h {}m", minutes / 60, minutes % 60)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub modified: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_meta_data: Option<ImageMetaData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_meta_data: Option<AudioMetaData>,
}

/// A file the host exposes. Identity is `(path, name)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub extension: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub metadata: FileMetadata,
}

impl RemoteFile {
    pub fn file_ref(&self) -> FileRef {
        FileRef { name: self.name.clone(), path: self.path.clone() }
    }

    /// `name` + `extension`, the name handed to the save collaborator.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, self.extension)
    }

    /// `"{kind}/{extension}"`, e.g. `audio/mp3`.
    pub fn mime_type(&self, kind: &str) -> String {
        format!("{}/{}", kind, self.extension.replacen('.', "", 1))
    }

    /// Size in MB below 1 GB, otherwise GB, two decimals.
    pub fn size_label(&self) -> String {
        let mb = self.metadata.size as f64 / (1024.0 * 1024.0);
        if mb < 1024.0 {
            format!("{:.2} MB", mb)
        } else {
            format!("{:.2} GB", mb / 1024.0)
        }
    }
}

/// Identifies one file for the fetch endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub path: String,
}

/// Entries sharing one parent folder.
///
/// The host sends each block as `{"key": "<folder>", "<folder>": [..]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FolderBlockWire")]
pub struct FolderListing {
    pub key: String,
    pub entries: Vec<RemoteFile>,
}

impl FolderListing {
    /// Last segment of the folder key, split on either separator.
    pub fn display_name(&self) -> &str {
        self.key.rsplit(['/', '\\']).next().unwrap_or(&self.key)
    }
}

#[derive(Deserialize)]
struct FolderBlockWire {
    key: String,
    #[serde(flatten)]
    rest: HashMap<String, JsonValue>,
}

impl TryFrom<FolderBlockWire> for FolderListing {
    type Error = serde_json::Error;

    fn try_from(mut wire: FolderBlockWire) -> Result<Self, Self::Error> {
        let entries = match wire.rest.remove(&wire.key) {
            Some(v) => serde_json::from_value(v)?,
            None => Vec::new(),
        };
        Ok(FolderListing { key: wire.key, entries })
    }
}

/// A remote file together with its bytes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileWithBytes {
    #[serde(flatten)]
    pub file: RemoteFile,
    #[serde(default)]
    pub data: Option<BufferJson>,
}

impl FileWithBytes {
    pub fn bytes(&self) -> Option<&[u8]> {
        self.data.as_ref().map(|b| b.data.as_slice()).filter(|b| !b.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Host-side settings. Stored and validated by the host; the client only
/// relays them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub allow_list: Vec<String>,
    pub image_paths: Vec<String>,
    pub audio_paths: Vec<String>,
    pub video_paths: Vec<String>,
    pub image_ext: Vec<String>,
    pub audio_ext: Vec<String>,
    pub video_ext: Vec<String>,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SettingsEnvelopeData {
    pub settings: Settings,
}
