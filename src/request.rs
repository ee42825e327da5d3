use std::future::Future;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response};
use tokio_util::sync::CancellationToken;

use crate::config::HttpConfig;
use crate::error::{ClientError, ClientResult, Outcome};
use crate::types::Credential;

/// Authenticated HTTP access to the paired host.
///
/// Every call carries `Authorization: Bearer <token>`. Non-2xx answers are
/// returned as-is; only validation, transport failures and cancellation are
/// classified here.
#[derive(Clone)]
pub struct HostClient {
    http: Client,
}

impl HostClient {
    pub fn new(cfg: &HttpConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .connect_timeout(cfg.connect_timeout())
            .timeout(cfg.request_timeout())
            .user_agent(cfg.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build http client: {}", e)))?;
        Ok(Self { http })
    }

    /// Issues `method` against `{credential.url}/{path}`.
    ///
    /// Fails before any network I/O when the credential is incomplete or a
    /// POST has no body. When `cancel` fires first the in-flight request is
    /// dropped and [`Outcome::Cancelled`] is returned.
    pub async fn request(
        &self,
        path: &str,
        method: Method,
        credential: &Credential,
        body: Option<String>,
        cancel: Option<&CancellationToken>,
    ) -> Outcome<Response> {
        if !credential.is_valid() {
            return Outcome::Failed(ClientError::NoSession);
        }
        if method == Method::POST && body.is_none() {
            return Outcome::Failed(ClientError::MissingBody);
        }

        let url = endpoint(&credential.url, path);
        tracing::debug!(%method, %url, "host request");

        let mut builder = self
            .http
            .request(method, &url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", credential.token));
        if let Some(body) = body {
            builder = builder.body(body);
        }

        match run_cancellable(cancel, builder.send()).await {
            Outcome::Completed(Ok(res)) => Outcome::Completed(res),
            Outcome::Completed(Err(e)) => {
                tracing::warn!(%url, "host request failed: {}", e);
                Outcome::Failed(ClientError::Transport(e.to_string()))
            }
            Outcome::Cancelled => {
                tracing::debug!(%url, "host request cancelled");
                Outcome::Cancelled
            }
            Outcome::Failed(never) => match never {},
        }
    }

    pub async fn get(&self, path: &str, credential: &Credential) -> Outcome<Response> {
        self.request(path, Method::GET, credential, None, None).await
    }

    pub async fn post(&self, path: &str, credential: &Credential, body: String) -> Outcome<Response> {
        self.request(path, Method::POST, credential, Some(body), None).await
    }

    pub async fn put(&self, path: &str, credential: &Credential, body: Option<String>) -> Outcome<Response> {
        self.request(path, Method::PUT, credential, body, None).await
    }
}

/// Races `fut` against `cancel`. Cancellation wins ties, so nothing produced
/// after the token fired is ever observed.
pub async fn run_cancellable<T>(
    cancel: Option<&CancellationToken>,
    fut: impl Future<Output = T>,
) -> Outcome<T, std::convert::Infallible> {
    match cancel {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Outcome::Cancelled,
                v = fut => {
                    if token.is_cancelled() { Outcome::Cancelled } else { Outcome::Completed(v) }
                }
            }
        }
        None => Outcome::Completed(fut.await),
    }
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
