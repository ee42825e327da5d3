use reqwest::Response;
use serde_json::{json, Value as JsonValue};
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, ClientResult, Outcome};
use crate::request::{run_cancellable, HostClient};
use crate::types::{
    Credential, Envelope, FileRef, FileWithBytes, FolderListing, Settings, SettingsEnvelopeData,
};

/// Browses and fetches the files a host exposes.
///
/// Listing and fetching never raise: every failure comes back as a message
/// a front end can render inline.
#[derive(Clone)]
pub struct CatalogClient {
    host: HostClient,
}

impl CatalogClient {
    pub fn new(host: HostClient) -> Self {
        Self { host }
    }

    /// `GET api/{kind}`: folder listings for one media kind.
    pub async fn list_files(&self, kind: &str, credential: &Credential) -> Result<Vec<FolderListing>, String> {
        let res = match self.host.get(&format!("api/{}", kind), credential).await {
            Outcome::Completed(res) => res,
            Outcome::Cancelled => return Err(format!("request for files type:{} was cancelled", kind)),
            Outcome::Failed(e) => return Err(e.to_string()),
        };

        if !res.status().is_success() {
            return Err(status_message("files", kind, &res));
        }

        match res.json::<Envelope<Vec<FolderListing>>>().await {
            Ok(envelope) => {
                tracing::debug!(kind, folders = envelope.data.len(), "listed files");
                Ok(envelope.data)
            }
            Err(e) => {
                tracing::warn!(kind, "failed to decode file listing: {}", e);
                Err(format!("failed to read files type:{}::{}", kind, e))
            }
        }
    }

    /// `GET api/{kind}/file?name=&path=`: one file with its bytes.
    ///
    /// The token covers both the request and the body download.
    pub async fn get_file(
        &self,
        kind: &str,
        file: &FileRef,
        credential: &Credential,
        cancel: Option<&CancellationToken>,
    ) -> Outcome<FileWithBytes, String> {
        let path = format!(
            "api/{}/file?name={}&path={}",
            kind,
            urlencoding::encode(&file.name),
            urlencoding::encode(&file.path)
        );

        let res = match self.host.request(&path, reqwest::Method::GET, credential, None, cancel).await {
            Outcome::Completed(res) => res,
            Outcome::Cancelled => return Outcome::Cancelled,
            Outcome::Failed(e) => return Outcome::Failed(e.to_string()),
        };

        if !res.status().is_success() {
            return Outcome::Failed(status_message("file", kind, &res));
        }

        let body = match run_cancellable(cancel, res.json::<Envelope<Option<FileWithBytes>>>()).await {
            Outcome::Completed(body) => body,
            Outcome::Cancelled => return Outcome::Cancelled,
            Outcome::Failed(never) => match never {},
        };

        match body {
            Ok(Envelope { data: Some(file), .. }) => Outcome::Completed(file),
            Ok(Envelope { data: None, .. }) => Outcome::Failed("failed to get data from the server".to_string()),
            Err(e) => {
                tracing::warn!(kind, name = %file.name, "failed to decode file: {}", e);
                Outcome::Failed(format!("failed to read file type:{}::{}", kind, e))
            }
        }
    }

    /// `GET api/settings`.
    pub async fn get_settings(&self, credential: &Credential) -> ClientResult<Settings> {
        let res = completed(self.host.get("api/settings", credential).await)?;
        let res = ensure_success(res)?;
        let envelope: Envelope<SettingsEnvelopeData> = res.json().await?;
        Ok(envelope.data.settings)
    }

    /// `POST api/settings` with `{settings: update}`.
    ///
    /// Returns the host's answer when `return_updated` is set.
    pub async fn update_settings(
        &self,
        credential: &Credential,
        update: &JsonValue,
        return_updated: bool,
    ) -> ClientResult<Option<JsonValue>> {
        let body = serde_json::to_string(&json!({ "settings": update }))?;
        let res = completed(self.host.post("api/settings", credential, body).await)?;
        let res = ensure_success(res)?;
        if return_updated {
            Ok(Some(res.json().await?))
        } else {
            Ok(None)
        }
    }
}

fn completed(outcome: Outcome<Response>) -> ClientResult<Response> {
    match outcome {
        Outcome::Completed(res) => Ok(res),
        Outcome::Cancelled => Err(ClientError::Cancelled),
        Outcome::Failed(e) => Err(e),
    }
}

fn ensure_success(res: Response) -> ClientResult<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    Err(ClientError::Status {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
    })
}

fn status_message(what: &str, kind: &str, res: &Response) -> String {
    let status = res.status();
    format!(
        "failed to request {} type:{}::{}:{}",
        what,
        kind,
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    )
}
