use crate::dispatch::IdSource;
use crate::error::AttachmentError;
use crate::protocol::UnfurledMedia;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Where a media prop points.
#[derive(Debug, Clone)]
pub enum MediaSource {
    Url(String),
    Unfurled(UnfurledMedia),
    Binary(Arc<BinaryResource>),
}

impl MediaSource {
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }
}

impl From<Arc<BinaryResource>> for MediaSource {
    fn from(resource: Arc<BinaryResource>) -> Self {
        Self::Binary(resource)
    }
}

impl From<UnfurledMedia> for MediaSource {
    fn from(media: UnfurledMedia) -> Self {
        Self::Unfurled(media)
    }
}

#[derive(Debug, Clone)]
pub enum BinaryData {
    Bytes(Bytes),
    Blob { bytes: Bytes, mime: String },
    Path(PathBuf),
    Remote(String),
}

/// Binary content uploaded next to the message body. Identity matters:
/// one `Arc` referenced twice in a tree becomes one attachment.
#[derive(Debug, Clone)]
pub struct BinaryResource {
    pub name: Option<String>,
    pub data: BinaryData,
}

impl BinaryResource {
    pub fn bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Arc<Self> {
        Arc::new(Self {
            name: Some(name.into()),
            data: BinaryData::Bytes(bytes.into()),
        })
    }

    pub fn blob(bytes: impl Into<Bytes>, mime: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: None,
            data: BinaryData::Blob {
                bytes: bytes.into(),
                mime: mime.into(),
            },
        })
    }

    /// A local path or an http(s) url.
    pub fn file(location: &str) -> Arc<Self> {
        let data = if is_remote(location) {
            BinaryData::Remote(location.to_string())
        } else {
            BinaryData::Path(PathBuf::from(location))
        };
        Arc::new(Self { name: None, data })
    }

    fn derived_name(&self) -> Option<String> {
        if let Some(name) = &self.name {
            return Some(name.clone());
        }
        match &self.data {
            BinaryData::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            BinaryData::Remote(url) => url
                .split(['?', '#'])
                .next()
                .and_then(|path| path.rsplit('/').next())
                .filter(|segment| !segment.is_empty() && !segment.contains(':'))
                .map(str::to_string),
            BinaryData::Bytes(_) | BinaryData::Blob { .. } => None,
        }
    }

    fn extension(&self) -> Option<&'static str> {
        match &self.data {
            BinaryData::Blob { mime, .. } => mime_guess::get_mime_extensions_str(mime)
                .and_then(|extensions| extensions.first().copied()),
            _ => None,
        }
    }
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Attachments referenced by one compiled payload, keyed by filename.
#[derive(Debug, Clone, Default)]
pub struct AttachmentSet {
    files: BTreeMap<String, Arc<BinaryResource>>,
}

impl AttachmentSet {
    pub fn get(&self, name: &str) -> Option<&Arc<BinaryResource>> {
        self.files.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<BinaryResource>)> {
        self.files.iter().map(|(name, resource)| (name.as_str(), resource))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Assigns filenames to binary media while a payload is compiled.
pub(crate) struct AttachmentRegistry {
    ids: Arc<dyn IdSource>,
    names: HashMap<usize, String>,
    set: AttachmentSet,
}

impl AttachmentRegistry {
    pub(crate) fn new(ids: Arc<dyn IdSource>) -> Self {
        Self {
            ids,
            names: HashMap::new(),
            set: AttachmentSet::default(),
        }
    }

    pub(crate) fn resolve_media(&mut self, source: &MediaSource) -> UnfurledMedia {
        match source {
            MediaSource::Url(url) => UnfurledMedia::url(url.clone()),
            MediaSource::Unfurled(media) => media.clone(),
            MediaSource::Binary(resource) => UnfurledMedia::attachment(&self.register(resource)),
        }
    }

    fn register(&mut self, resource: &Arc<BinaryResource>) -> String {
        let identity = Arc::as_ptr(resource) as usize;
        if let Some(name) = self.names.get(&identity) {
            return name.clone();
        }

        let name = match resource.derived_name() {
            Some(name) => name,
            None => match resource.extension() {
                Some(extension) => format!("{}.{extension}", self.ids.next_id()),
                None => self.ids.next_id(),
            },
        };

        let mut unique = name.clone();
        while self.set.files.contains_key(&unique) {
            unique = disambiguate(&name, &self.ids.next_id());
        }
        if unique != name {
            debug!(filename = %name, renamed = %unique, "attachment filename already taken");
        }
        let name = unique;

        self.names.insert(identity, name.clone());
        self.set.files.insert(name.clone(), resource.clone());
        name
    }

    pub(crate) fn into_set(self) -> AttachmentSet {
        self.set
    }
}

/// `img.png` with suffix `7` becomes `img-7.png`.
fn disambiguate(name: &str, suffix: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => format!("{stem}-{suffix}.{extension}"),
        _ => format!("{name}-{suffix}"),
    }
}

/// One uploaded file for a platform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub name: String,
    pub data: Bytes,
}

pub async fn resolve(resource: &BinaryResource) -> Result<Bytes, AttachmentError> {
    match &resource.data {
        BinaryData::Bytes(bytes) | BinaryData::Blob { bytes, .. } => Ok(bytes.clone()),
        BinaryData::Path(path) => read_path(path).await,
        BinaryData::Remote(url) => fetch(url).await,
    }
}

async fn read_path(path: &Path) -> Result<Bytes, AttachmentError> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|source| AttachmentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Bytes::from(data))
}

async fn fetch(url: &str) -> Result<Bytes, AttachmentError> {
    let fetch_error = |source| AttachmentError::Fetch {
        url: url.to_string(),
        source,
    };
    debug!(url, "fetching remote attachment");
    reqwest::get(url)
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(fetch_error)?
        .bytes()
        .await
        .map_err(fetch_error)
}

pub async fn resolve_all(set: &AttachmentSet) -> Result<Vec<ResolvedFile>, AttachmentError> {
    let mut files = Vec::with_capacity(set.len());
    for (name, resource) in set.iter() {
        files.push(ResolvedFile {
            name: name.to_string(),
            data: resolve(resource).await?,
        });
    }
    Ok(files)
}
