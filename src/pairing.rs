use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::error::{ClientError, ClientResult};
use crate::session::SessionContext;
use crate::types::Credential;

/// Camera permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Prompt,
}

/// The code-scanning hardware. Implemented by the front end.
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn check_permissions(&self) -> PermissionStatus;
    async fn request_permissions(&self) -> PermissionStatus;
    /// Resolves with the decoded text, or `None` if nothing was read.
    async fn scan(&self) -> Option<String>;
    /// Stops a running [`scan`](Self::scan).
    async fn cancel(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingMode {
    Scan,
    Manual,
}

impl PairingMode {
    pub fn toggled(self) -> Self {
        match self {
            PairingMode::Scan => PairingMode::Manual,
            PairingMode::Manual => PairingMode::Scan,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    MissingToken,
    MalformedPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingState {
    Idle(PairingMode),
    RequestingPermission,
    Scanning,
    Cancelled,
    Succeeded(Credential),
    Failed(FailureReason),
}

impl PairingState {
    /// Resting states from which the user may toggle mode or start over.
    fn is_resting(&self) -> bool {
        matches!(self, PairingState::Idle(_) | PairingState::Cancelled | PairingState::Failed(_))
    }
}

impl fmt::Display for PairingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairingState::Idle(PairingMode::Scan) => write!(f, "idle (scan)"),
            PairingState::Idle(PairingMode::Manual) => write!(f, "idle (manual)"),
            PairingState::RequestingPermission => write!(f, "requesting permission"),
            PairingState::Scanning => write!(f, "scanning"),
            PairingState::Cancelled => write!(f, "cancelled"),
            PairingState::Succeeded(_) => write!(f, "paired"),
            PairingState::Failed(_) => write!(f, "failed"),
        }
    }
}

struct Inner {
    mode: PairingMode,
    state: PairingState,
    scan_cancel: Option<CancellationToken>,
}

/// Drives scan-or-manual pairing and hands the resulting credential to the
/// session context.
///
/// Methods take `&self` so a cancel can arrive while [`start_scan`] is
/// awaiting the scanner.
///
/// [`start_scan`]: PairingMachine::start_scan
pub struct PairingMachine {
    scanner: Arc<dyn Scanner>,
    session: SessionContext,
    inner: Mutex<Inner>,
}

impl PairingMachine {
    pub fn new(scanner: Arc<dyn Scanner>, session: SessionContext) -> Self {
        Self {
            scanner,
            session,
            inner: Mutex::new(Inner {
                mode: PairingMode::Scan,
                state: PairingState::Idle(PairingMode::Scan),
                scan_cancel: None,
            }),
        }
    }

    pub fn state(&self) -> PairingState {
        self.lock().state.clone()
    }

    pub fn mode(&self) -> PairingMode {
        self.lock().mode
    }

    /// Switches between scan and manual entry.
    pub fn toggle_mode(&self) -> ClientResult<PairingMode> {
        let mut inner = self.lock();
        if !inner.state.is_resting() {
            return Err(invalid("toggle mode", &inner.state));
        }
        inner.mode = inner.mode.toggled();
        inner.state = PairingState::Idle(inner.mode);
        tracing::debug!(mode = ?inner.mode, "pairing mode toggled");
        Ok(inner.mode)
    }

    /// Runs one scan: permission check, scan, decode, and on success
    /// [`SessionContext::set_session`].
    ///
    /// Decode failures end in [`PairingState::Failed`] and are returned as
    /// the state, not as an error. An `Err` means either the call was not
    /// allowed from the current state or the credential could not be
    /// persisted (the state is `Succeeded` regardless).
    pub async fn start_scan(&self) -> ClientResult<PairingState> {
        {
            // Leave the resting states before the first await so toggle and
            // manual submit are refused while permissions are checked.
            let mut inner = self.lock();
            if inner.mode != PairingMode::Scan || !inner.state.is_resting() {
                return Err(invalid("start scanning", &inner.state));
            }
            inner.state = PairingState::RequestingPermission;
        }

        let permission = match self.scanner.check_permissions().await {
            PermissionStatus::Prompt => {
                self.ensure_state(&PairingState::RequestingPermission)?;
                self.scanner.request_permissions().await
            }
            other => other,
        };

        let token = CancellationToken::new();
        {
            let mut inner = self.lock();
            if inner.state != PairingState::RequestingPermission {
                return Ok(inner.state.clone());
            }
            if permission != PermissionStatus::Granted {
                tracing::info!(?permission, "camera unavailable, falling back to manual pairing");
                inner.mode = PairingMode::Manual;
                inner.state = PairingState::Idle(PairingMode::Manual);
                return Ok(inner.state.clone());
            }
            inner.state = PairingState::Scanning;
            inner.scan_cancel = Some(token.clone());
        }

        let scanned = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            content = self.scanner.scan() => Some(content),
        };
        self.lock().scan_cancel = None;

        let content = match scanned {
            Some(content) if !token.is_cancelled() => content,
            // cancel_scan already moved the state to Cancelled
            _ => return Ok(self.state()),
        };

        let parsed = match content {
            Some(payload) => codec::parse_scan_payload(&payload),
            None => Err(ClientError::MalformedPayload("nothing was scanned".to_string())),
        };
        match parsed {
            Ok(credential) => self.succeed(credential).await,
            Err(e) => {
                tracing::warn!("scanned payload rejected: {}", e);
                let reason = match e {
                    ClientError::MissingToken => FailureReason::MissingToken,
                    _ => FailureReason::MalformedPayload,
                };
                self.set_state(PairingState::Failed(reason));
                Ok(self.state())
            }
        }
    }

    /// Aborts a running scan. Returns `false` when no scan was running.
    pub async fn cancel_scan(&self) -> bool {
        let token = {
            let mut inner = self.lock();
            let Some(token) = inner.scan_cancel.take() else {
                return false;
            };
            inner.state = PairingState::Cancelled;
            token
        };
        token.cancel();
        self.scanner.cancel().await;
        tracing::info!("scan cancelled");
        true
    }

    /// Submits the manual form. Blank fields make this a no-op that returns
    /// the unchanged state.
    pub async fn submit_manual(&self, url: &str, token: &str) -> ClientResult<PairingState> {
        let Some(credential) = codec::from_form(url, token) else {
            return Ok(self.state());
        };
        {
            let inner = self.lock();
            if inner.mode != PairingMode::Manual || !inner.state.is_resting() {
                return Err(invalid("submit the manual form", &inner.state));
            }
        }
        self.succeed(credential).await
    }

    async fn succeed(&self, credential: Credential) -> ClientResult<PairingState> {
        let state = PairingState::Succeeded(credential.clone());
        self.set_state(state.clone());
        tracing::info!(url = %credential.url, "paired");
        self.session.set_session(credential).await?;
        Ok(state)
    }

    fn set_state(&self, state: PairingState) {
        self.lock().state = state;
    }

    fn ensure_state(&self, expected: &PairingState) -> ClientResult<()> {
        let inner = self.lock();
        if &inner.state != expected {
            return Err(invalid("continue scanning", &inner.state));
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn invalid(action: &'static str, state: &PairingState) -> ClientError {
    ClientError::InvalidTransition { action, state: state.to_string() }
}
