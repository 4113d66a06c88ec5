//! JSON-RPC endpoint over a spawned language server
//!
//! Owns the server process and three tasks: a writer draining framed
//! messages into the child's stdin, a dispatch loop decoding stdout and
//! correlating responses with the pending table, and a stderr logger.
//! Callbacks registered for a request fire exactly once, synchronously
//! inside the dispatch step, so they must not block for long.

use super::capabilities::default_capabilities;
use super::framing::{encode, ReadBuffer};
use super::pending::{PendingTable, ResponseCallback};
use crate::locations::path_to_uri;
use lsp_types::notification::{DidOpenTextDocument, Exit, Initialized, Notification};
use lsp_types::request::{GotoDefinition, Initialize, References, Request, Shutdown};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;

const JSON_RPC_VERSION: &str = "2.0";
const READ_CHUNK: usize = 4096;
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Failed to spawn language server: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Failed to serialize/deserialize: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Pending request table is full")]
    TableFull,
    #[error("No active language server connection")]
    NotConnected,
    #[error("Request timeout")]
    Timeout,
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// How an outgoing message carries its `id` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPolicy {
    /// Mint and attach the next request id.
    Fresh,
    /// Attach a caller-chosen id, already registered in the pending table.
    Explicit(i64),
    /// Omit the id field entirely; the message is a one-way notification
    /// and never occupies a pending-table slot.
    None,
}

/// Parameters for the `initialize` handshake.
#[derive(Debug, Clone)]
pub struct InitializeRequest {
    pub root_uri: String,
    pub root_path: Option<String>,
    /// Client capabilities JSON; the built-in default is used when absent.
    pub capabilities: Option<Value>,
    pub trace: String,
    /// Defaults to a single folder named after this crate at `root_uri`.
    pub workspace_folders: Option<Value>,
    pub initialization_options: Option<Value>,
}

impl InitializeRequest {
    pub fn new(root_uri: impl Into<String>) -> Self {
        Self {
            root_uri: root_uri.into(),
            root_path: None,
            capabilities: None,
            trace: "off".to_string(),
            workspace_folders: None,
            initialization_options: None,
        }
    }
}

/// Cloneable sender side of an endpoint. This is what response callbacks
/// receive, so a callback can itself send (the initialize callback sends
/// the `initialized` notification this way).
#[derive(Clone)]
pub struct RpcHandle {
    writer: mpsc::UnboundedSender<Vec<u8>>,
    pending: Arc<Mutex<PendingTable>>,
    next_id: Arc<AtomicI64>,
    initialized: Arc<AtomicBool>,
    language_id: String,
}

impl RpcHandle {
    /// Serialize, frame, and queue one message for the server's stdin.
    ///
    /// Returns the id the message was sent under, if any. Write failures
    /// past this point are logged by the writer task and the message is
    /// dropped; a closed writer means the endpoint is gone.
    pub fn send(
        &self,
        method: &str,
        params: Option<Value>,
        id: IdPolicy,
    ) -> Result<Option<i64>, RpcError> {
        let mut message = json!({
            "jsonrpc": JSON_RPC_VERSION,
            "method": method,
            "params": params.unwrap_or_else(|| json!({})),
        });

        let sent_id = match id {
            IdPolicy::Fresh => Some(self.mint_id()),
            IdPolicy::Explicit(id) => Some(id),
            IdPolicy::None => None,
        };
        if let Some(id) = sent_id {
            message["id"] = json!(id);
        }

        let body = serde_json::to_vec(&message)?;
        tracing::debug!(method, id = ?sent_id, "sending message");
        self.writer
            .send(encode(&body))
            .map_err(|_| RpcError::NotConnected)?;
        Ok(sent_id)
    }

    /// Send a one-way notification.
    pub fn notify(&self, method: &str, params: Option<Value>) -> Result<(), RpcError> {
        self.send(method, params, IdPolicy::None).map(|_| ())
    }

    /// Send a request and register `callback` to run when the response
    /// with the matching id arrives (or the request times out). The id is
    /// minted once and sent under the explicit-id policy, so the wire id
    /// always matches the table slot.
    pub fn request(
        &self,
        method: &str,
        params: Option<Value>,
        callback: ResponseCallback,
    ) -> Result<i64, RpcError> {
        let id = self.mint_id();
        self.pending.lock().register(id, callback)?;
        match self.send(method, params, IdPolicy::Explicit(id)) {
            Ok(_) => Ok(id),
            Err(e) => {
                // Nothing went out; release the slot.
                self.pending.lock().take(id);
                Err(e)
            }
        }
    }

    /// Start the `initialize`/`initialized` handshake. The registered
    /// callback sends the `initialized` notification and flips the
    /// initialized flag once the server answers.
    pub fn initialize(&self, request: InitializeRequest) -> Result<i64, RpcError> {
        let capabilities = request.capabilities.unwrap_or_else(default_capabilities);
        let workspace_folders = request.workspace_folders.unwrap_or_else(|| {
            json!([{"name": env!("CARGO_PKG_NAME"), "uri": request.root_uri}])
        });

        let mut params = json!({
            // Our own pid; servers use it to exit when the client dies.
            "processId": std::process::id(),
            "rootUri": request.root_uri,
            "capabilities": capabilities,
            "trace": request.trace,
            "workspaceFolders": workspace_folders,
        });
        if let Some(root_path) = request.root_path {
            params["rootPath"] = json!(root_path);
        }
        if let Some(options) = request.initialization_options {
            params["initializationOptions"] = options;
        }

        let flag = self.initialized.clone();
        self.request(
            Initialize::METHOD,
            Some(params),
            Box::new(move |handle, outcome| match outcome {
                Ok(_) => {
                    tracing::info!("initialize response received");
                    if let Err(e) = handle.notify(Initialized::METHOD, None) {
                        tracing::warn!(error = %e, "failed to send initialized notification");
                    }
                    flag.store(true, Ordering::SeqCst);
                }
                Err(e) => tracing::warn!(error = %e, "initialize request failed"),
            }),
        )
    }

    /// Open `path` on the server (full text, version 1) and request the
    /// definition of the symbol at `line`:`character`. The callback
    /// receives the full response payload.
    pub fn request_definition(
        &self,
        path: &Path,
        contents: &str,
        line: u32,
        character: u32,
        callback: ResponseCallback,
    ) -> Result<i64, RpcError> {
        self.document_request(GotoDefinition::METHOD, path, contents, line, character, callback)
    }

    /// Same shape as [`request_definition`], method `textDocument/references`.
    ///
    /// [`request_definition`]: RpcHandle::request_definition
    pub fn request_references(
        &self,
        path: &Path,
        contents: &str,
        line: u32,
        character: u32,
        callback: ResponseCallback,
    ) -> Result<i64, RpcError> {
        self.document_request(References::METHOD, path, contents, line, character, callback)
    }

    fn document_request(
        &self,
        method: &str,
        path: &Path,
        contents: &str,
        line: u32,
        character: u32,
        callback: ResponseCallback,
    ) -> Result<i64, RpcError> {
        let uri = path_to_uri(path)?;

        self.notify(
            DidOpenTextDocument::METHOD,
            Some(json!({
                "textDocument": {
                    "uri": uri.as_str(),
                    "languageId": self.language_id,
                    "version": 1,
                    "text": contents,
                }
            })),
        )?;

        self.request(
            method,
            Some(json!({
                "textDocument": {"uri": uri.as_str()},
                "position": {"line": line, "character": character},
            })),
            callback,
        )
    }

    /// Ask the server to shut down; the callback sends the final `exit`
    /// notification once the server acknowledges.
    pub fn shutdown(&self) -> Result<(), RpcError> {
        self.request(
            Shutdown::METHOD,
            None,
            Box::new(|handle, _outcome| {
                if let Err(e) = handle.notify(Exit::METHOD, None) {
                    tracing::debug!(error = %e, "failed to send exit notification");
                }
            }),
        )?;
        Ok(())
    }

    /// Whether the `initialize`/`initialized` handshake has completed.
    pub fn initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn mint_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Decode one framed payload and route it. Responses with a pending id
    /// fire their callback exactly once; everything else is logged and
    /// dropped.
    fn dispatch_payload(&self, payload: &[u8]) {
        let value: Value = match serde_json::from_slice(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "discarding malformed JSON payload");
                return;
            }
        };

        let Some(id) = value.get("id").and_then(Value::as_i64) else {
            let method = value.get("method").and_then(Value::as_str).unwrap_or("");
            tracing::debug!(method, "ignoring server notification");
            return;
        };

        let callback = self.pending.lock().take(id);
        match callback {
            Some(callback) => callback(self, Ok(value)),
            None => tracing::debug!(id, "response has no pending request, dropping"),
        }
    }

    /// Fire timeout callbacks for entries older than `max_age`.
    fn expire_pending(&self, max_age: Duration) {
        let expired = self.pending.lock().expire(max_age);
        for (id, callback) in expired {
            tracing::warn!(id, "request timed out");
            callback(self, Err(RpcError::Timeout));
        }
    }

    #[cfg(test)]
    fn test_pair(language_id: &str) -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (writer, rx) = mpsc::unbounded_channel();
        let handle = Self {
            writer,
            pending: Arc::new(Mutex::new(PendingTable::new())),
            next_id: Arc::new(AtomicI64::new(1)),
            initialized: Arc::new(AtomicBool::new(false)),
            language_id: language_id.to_string(),
        };
        (handle, rx)
    }
}

/// A running language-server connection: the child process plus its I/O
/// tasks. Dropping the endpoint kills the child.
pub struct RpcEndpoint {
    child: Child,
    handle: RpcHandle,
}

impl RpcEndpoint {
    /// Spawn `program args..` with piped stdio and start the writer,
    /// dispatch, and stderr tasks. Must run inside a tokio runtime. Spawn
    /// failure is fatal to the session; no handshake is attempted.
    pub fn spawn(
        program: &str,
        args: &[String],
        language_id: &str,
        request_timeout: Duration,
    ) -> Result<Self, RpcError> {
        tracing::info!(program, ?args, "spawning language server");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| {
            RpcError::Spawn(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "child stdin not captured",
            ))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            RpcError::Spawn(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "child stdout not captured",
            ))
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            RpcError::Spawn(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "child stderr not captured",
            ))
        })?;

        let (writer, writer_rx) = mpsc::unbounded_channel();
        let handle = RpcHandle {
            writer,
            pending: Arc::new(Mutex::new(PendingTable::new())),
            next_id: Arc::new(AtomicI64::new(1)),
            initialized: Arc::new(AtomicBool::new(false)),
            language_id: language_id.to_string(),
        };

        tokio::spawn(run_writer(stdin, writer_rx));
        tokio::spawn(run_dispatch(handle.clone(), stdout, request_timeout));
        tokio::spawn(run_stderr(stderr));

        Ok(Self { child, handle })
    }

    /// A cloneable handle for sending on this endpoint.
    pub fn handle(&self) -> RpcHandle {
        self.handle.clone()
    }

    /// OS pid of the spawned server, while it is running.
    pub fn server_pid(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.initialized()
    }

    pub fn initialize(&self, request: InitializeRequest) -> Result<i64, RpcError> {
        self.handle.initialize(request)
    }

    pub fn request_definition(
        &self,
        path: &Path,
        contents: &str,
        line: u32,
        character: u32,
        callback: ResponseCallback,
    ) -> Result<i64, RpcError> {
        self.handle
            .request_definition(path, contents, line, character, callback)
    }

    pub fn request_references(
        &self,
        path: &Path,
        contents: &str,
        line: u32,
        character: u32,
        callback: ResponseCallback,
    ) -> Result<i64, RpcError> {
        self.handle
            .request_references(path, contents, line, character, callback)
    }

    pub fn shutdown(&self) -> Result<(), RpcError> {
        self.handle.shutdown()
    }

    /// Poll the initialized flag until it flips or `timeout` elapses.
    pub async fn wait_until_initialized(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.handle.initialized() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.handle.initialized()
    }
}

/// Drain framed messages into the child's stdin. A write or flush failure
/// is logged and the message dropped; the endpoint keeps running.
async fn run_writer(mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = stdin.write_all(&frame).await {
            tracing::warn!(error = %e, "failed to write to language server");
            continue;
        }
        if let Err(e) = stdin.flush().await {
            tracing::warn!(error = %e, "failed to flush language server stdin");
        }
    }
}

/// Read the server's stdout in bounded chunks, frame, decode, and route
/// each payload. A hang-up or read error ends dispatch for this endpoint;
/// there is no automatic respawn. A periodic sweep expires requests older
/// than `request_timeout`.
async fn run_dispatch(handle: RpcHandle, mut stdout: ChildStdout, request_timeout: Duration) {
    let mut buffer = ReadBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut sweep = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);

    loop {
        tokio::select! {
            read = stdout.read(&mut chunk) => match read {
                Ok(0) => {
                    tracing::info!("language server closed stdout");
                    break;
                }
                Ok(n) => {
                    for payload in buffer.feed(&chunk[..n]) {
                        handle.dispatch_payload(&payload);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "error reading language server stdout");
                    break;
                }
            },
            _ = sweep.tick() => handle.expire_pending(request_timeout),
        }
    }
}

/// Log the server's stderr one line at a time; no structured handling.
async fn run_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::debug!("server stderr: {}", line),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "error reading language server stderr");
                break;
            }
        }
    }
}
