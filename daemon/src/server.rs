//! Control server: line-oriented JSON over a Unix stream socket.
//!
//! Each connection carries exactly one request line and gets one response
//! line back. Connections run in a semaphore-bounded pool; the accept loop
//! stops when the shutdown flag flips and the socket file is unlinked on the
//! way out.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{watch, Semaphore};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::commands::CommandRouter;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_WORKERS: usize = 10;

pub struct ControlServer {
    socket_path: PathBuf,
    router: Arc<CommandRouter>,
    max_workers: usize,
}

impl ControlServer {
    pub fn new(socket_path: PathBuf, router: Arc<CommandRouter>) -> Self {
        Self {
            socket_path,
            router,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }

    /// Serve until the shutdown flag flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        if tokio::fs::try_exists(&self.socket_path).await.unwrap_or(false) {
            tokio::fs::remove_file(&self.socket_path)
                .await
                .with_context(|| {
                    format!("Failed to remove stale socket {}", self.socket_path.display())
                })?;
        }
        if let Some(parent) = self.socket_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
        }

        let listener = UnixListener::bind(&self.socket_path).with_context(|| {
            format!("Failed to bind control socket {}", self.socket_path.display())
        })?;

        // The socket is trusted to OS file permissions; open it to local users.
        std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o666))
            .with_context(|| {
                format!(
                    "Failed to set permissions on socket {}",
                    self.socket_path.display()
                )
            })?;

        let workers = Arc::new(Semaphore::new(self.max_workers));
        info!(
            "Control socket listening at {}",
            self.socket_path.display()
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let permit = match workers.clone().acquire_owned().await {
                                Ok(permit) => permit,
                                Err(_) => break,
                            };
                            let router = self.router.clone();
                            tokio::spawn(async move {
                                let _permit = permit;
                                handle_connection(stream, router).await;
                            });
                        }
                        Err(e) => error!("Socket accept error: {}", e),
                    }
                }
            }
        }

        drop(listener);
        if let Err(e) = tokio::fs::remove_file(&self.socket_path).await {
            warn!(
                "Could not remove socket file {}: {}",
                self.socket_path.display(),
                e
            );
        }
        info!("Control socket closed");
        Ok(())
    }
}

async fn handle_connection(stream: UnixStream, router: Arc<CommandRouter>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    let response = match timeout(CONNECTION_TIMEOUT, reader.read_line(&mut line)).await {
        Ok(Ok(0)) => json!({ "status": "error", "message": "Empty request" }),
        Ok(Ok(_)) => match serde_json::from_str::<Value>(line.trim()) {
            Ok(request) => {
                debug!("Handling control request: {}", line.trim());
                router.dispatch(request).await
            }
            Err(e) => json!({ "status": "error", "message": format!("Invalid request: {}", e) }),
        },
        Ok(Err(e)) => json!({ "status": "error", "message": format!("Read error: {}", e) }),
        Err(_) => json!({ "status": "error", "message": "Request timed out" }),
    };

    let mut payload = response.to_string();
    payload.push('\n');

    match timeout(CONNECTION_TIMEOUT, write_half.write_all(payload.as_bytes())).await {
        Ok(Ok(())) => {
            let _ = write_half.shutdown().await;
        }
        Ok(Err(e)) => error!("Error writing control response: {}", e),
        Err(_) => error!("Timed out writing control response"),
    }
}
