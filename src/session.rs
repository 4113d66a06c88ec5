//! Per-language endpoint cache
//!
//! A `Session` owns one initialized endpoint per language, spawning and
//! handshaking a server on first use. Several sessions can coexist; no
//! process-wide state is involved. The callback API of the endpoint is
//! bridged to awaitable results with a oneshot channel.

use crate::config::Config;
use crate::locations::{locations_from_response, path_to_uri};
use crate::rpc::{InitializeRequest, ResponseCallback, RpcEndpoint, RpcError, RpcHandle};
use lsp_types::Location;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::oneshot;

const INITIALIZE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),
    #[error("No language server configured for {0}")]
    UnknownLanguage(String),
    #[error("Language server not available: {0}")]
    ServerNotAvailable(String),
    #[error("Language server did not finish initializing")]
    InitializeTimedOut,
}

enum Lookup {
    Definition,
    References,
}

pub struct Session {
    root: PathBuf,
    config: Config,
    endpoints: HashMap<String, RpcEndpoint>,
}

impl Session {
    pub fn new(root: PathBuf, config: Config) -> Self {
        Self {
            root,
            config,
            endpoints: HashMap::new(),
        }
    }

    /// Resolve the definition of the symbol at `line`:`character`
    /// (0-based) in `path`.
    pub async fn definition(
        &mut self,
        path: &Path,
        line: u32,
        character: u32,
    ) -> Result<Vec<Location>, SessionError> {
        self.lookup(path, line, character, Lookup::Definition).await
    }

    /// List every reference to the symbol at `line`:`character` (0-based)
    /// in `path`.
    pub async fn references(
        &mut self,
        path: &Path,
        line: u32,
        character: u32,
    ) -> Result<Vec<Location>, SessionError> {
        self.lookup(path, line, character, Lookup::References).await
    }

    async fn lookup(
        &mut self,
        path: &Path,
        line: u32,
        character: u32,
        kind: Lookup,
    ) -> Result<Vec<Location>, SessionError> {
        let language = Config::detect_language(path)
            .ok_or_else(|| SessionError::UnknownLanguage(path.display().to_string()))?;
        let handle = self.ensure_endpoint(language).await?;

        let contents = tokio::fs::read_to_string(path).await?;

        let (tx, rx) = oneshot::channel();
        let callback: ResponseCallback = Box::new(move |_handle, outcome| {
            let _ = tx.send(outcome);
        });

        match kind {
            Lookup::Definition => {
                handle.request_definition(path, &contents, line, character, callback)?
            }
            Lookup::References => {
                handle.request_references(path, &contents, line, character, callback)?
            }
        };

        // The callback is dropped unfired only if the endpoint is torn down.
        let response = rx.await.map_err(|_| RpcError::NotConnected)??;
        Ok(locations_from_response(&response))
    }

    /// Return the endpoint for `language`, spawning and initializing the
    /// server on first use.
    async fn ensure_endpoint(&mut self, language: &str) -> Result<RpcHandle, SessionError> {
        if let Some(endpoint) = self.endpoints.get(language) {
            return Ok(endpoint.handle());
        }

        let server = self
            .config
            .server_for_language(language)
            .ok_or_else(|| SessionError::UnknownLanguage(language.to_string()))?
            .clone();

        if which::which(&server.command).is_err() {
            return Err(SessionError::ServerNotAvailable(format!(
                "{} not found in PATH",
                server.command
            )));
        }

        let endpoint = RpcEndpoint::spawn(
            &server.command,
            &server.argv(),
            &server.language_id,
            self.config.request_timeout(),
        )?;

        let root_uri = path_to_uri(&self.root)?;
        let mut request = InitializeRequest::new(root_uri.as_str());
        request.capabilities = server.settings.clone();
        endpoint.initialize(request)?;

        if !endpoint.wait_until_initialized(INITIALIZE_TIMEOUT).await {
            return Err(SessionError::InitializeTimedOut);
        }

        tracing::info!(language, pid = ?endpoint.server_pid(), "language server ready");
        self.endpoints.insert(language.to_string(), endpoint);
        Ok(self.endpoints[language].handle())
    }

    /// Ask every running server to shut down gracefully. The processes
    /// themselves are killed when the session drops.
    pub fn shutdown_all(&mut self) {
        for (language, endpoint) in &self.endpoints {
            if let Err(e) = endpoint.shutdown() {
                tracing::debug!(language, error = %e, "shutdown request failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_extension_is_an_error() {
        let mut session = Session::new(PathBuf::from("/tmp"), Config::default());
        let err = session.definition(Path::new("notes.txt"), 0, 0).await;
        assert!(matches!(err, Err(SessionError::UnknownLanguage(_))));
    }

    #[tokio::test]
    async fn test_unconfigured_language_is_an_error() {
        let mut config = Config::default();
        config.servers.clear();
        let mut session = Session::new(PathBuf::from("/tmp"), config);
        let err = session.definition(Path::new("main.c"), 0, 0).await;
        assert!(matches!(err, Err(SessionError::UnknownLanguage(_))));
    }

    #[tokio::test]
    async fn test_missing_server_binary_is_an_error() {
        let mut config = Config::default();
        config.servers.get_mut("c").unwrap().command =
            "lspjump-no-such-server-binary".to_string();
        let mut session = Session::new(PathBuf::from("/tmp"), config);
        let err = session.definition(Path::new("main.c"), 0, 0).await;
        assert!(matches!(err, Err(SessionError::ServerNotAvailable(_))));
    }
}
