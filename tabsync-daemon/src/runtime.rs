use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

use tabsync_core::config::{self, tabsync_root};
use tabsync_sync::{Direction, RunOptions, SyncError, SyncReport};

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;
use crate::protocol::{DaemonRequest, DaemonResponse};
use crate::runner::{SyncFn, SyncRunner};

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon against the remote services in `~/.tabsync/config.yaml`.
///
/// The config is re-read for every job, so edits apply without a restart.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    // Fail fast on a broken config instead of on the first sync request.
    config::load_at(&home)?;

    let config_home = home.clone();
    let sync: Arc<SyncFn> = Arc::new(
        move |direction: Direction, options: &RunOptions| -> Result<SyncReport, SyncError> {
            let config = config::load_at(&config_home)?;
            let options = options.clone().with_lock_dir(tabsync_root(&config_home));
            tabsync_clients::run(direction, &config, &options)
        },
    );
    run_with(home, sync).await
}

/// Run the daemon with an arbitrary sync function behind the runner.
pub async fn run_with(home: PathBuf, sync: Arc<SyncFn>) -> Result<(), DaemonError> {
    let root = tabsync_root(&home);
    fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;

    let socket = socket_path(&home);
    let listener = bind_socket(&socket)?;

    let (shutdown, _) = broadcast::channel::<()>(16);
    let (runner, processor) = SyncRunner::spawn(sync, shutdown.subscribe());
    let server = Server {
        runner,
        shutdown: shutdown.clone(),
        socket,
        started_at: Utc::now(),
    };
    tracing::info!(socket = %server.socket.display(), "daemon started");

    let accept = tokio::spawn(server.accept_loop(listener));
    let signals = tokio::spawn(stop_on_ctrl_c(shutdown));
    let (processor, accept, signals) = tokio::join!(processor, accept, signals);

    joined("sync processor", processor)?;
    joined("socket server", accept)?;
    joined("signal handler", signals)?;
    tracing::info!("daemon stopped");
    Ok(())
}

async fn stop_on_ctrl_c(shutdown: broadcast::Sender<()>) -> Result<(), DaemonError> {
    let mut stopped = shutdown.subscribe();
    tokio::select! {
        _ = stopped.recv() => Ok(()),
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|err| DaemonError::Protocol(format!("ctrl-c handler failed: {err}")))?;
            tracing::info!("received ctrl-c, shutting down daemon");
            let _ = shutdown.send(());
            Ok(())
        }
    }
}

/// State shared by every socket connection.
#[derive(Clone)]
struct Server {
    runner: SyncRunner,
    shutdown: broadcast::Sender<()>,
    socket: PathBuf,
    started_at: DateTime<Utc>,
}

impl Server {
    async fn accept_loop(self, listener: UnixListener) -> Result<(), DaemonError> {
        let mut stopped = self.shutdown.subscribe();
        let result = loop {
            let stream = tokio::select! {
                _ = stopped.recv() => break Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => stream,
                    Err(err) => break Err(io_err(&self.socket, err)),
                },
            };
            let server = self.clone();
            tokio::spawn(async move {
                if let Err(err) = server.serve(stream).await {
                    tracing::error!(error = %err, "socket client error");
                }
            });
        };

        let _ = self.shutdown.send(());
        if let Err(err) = fs::remove_file(&self.socket) {
            if err.kind() != ErrorKind::NotFound {
                tracing::warn!(error = %err, "could not remove daemon socket");
            }
        }
        result
    }

    /// One JSON request per line, one JSON response per line.
    async fn serve(&self, stream: UnixStream) -> Result<(), DaemonError> {
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| io_err("daemon socket read", e))?
        {
            if line.trim().is_empty() {
                continue;
            }
            let (response, stop) = match serde_json::from_str::<DaemonRequest>(&line) {
                Ok(request) => self.dispatch(request).await,
                Err(err) => (
                    DaemonResponse::error(format!("invalid request JSON: {err}")),
                    false,
                ),
            };
            write_line(&mut writer, &response).await?;
            if stop {
                break;
            }
        }
        Ok(())
    }

    /// Answer one request. The flag is set when the connection should close.
    async fn dispatch(&self, request: DaemonRequest) -> (DaemonResponse, bool) {
        let response = match request.cmd.as_str() {
            "status" => DaemonResponse::ok(json!({
                "running": true,
                "started_at": self.started_at,
                "socket": self.socket.display().to_string(),
                "runner": self.runner.status().await,
            })),
            "sync" => {
                let direction = request.direction.as_deref().unwrap_or("forward");
                match direction.parse::<Direction>() {
                    Ok(direction) => match self.runner.submit(direction, request.dry_run).await {
                        Ok(report) => DaemonResponse::ok(report_payload(&report)),
                        Err(err) => DaemonResponse::error(err.to_string()),
                    },
                    Err(err) => DaemonResponse::error(err),
                }
            }
            "cancel" => DaemonResponse::ok(json!({ "cancelled": self.runner.cancel().await })),
            "stop" => {
                self.runner.cancel().await;
                let _ = self.shutdown.send(());
                return (DaemonResponse::ok(json!({ "stopping": true })), true);
            }
            other => DaemonResponse::error(format!("unknown command '{other}'")),
        };
        (response, false)
    }
}

fn report_payload(report: &SyncReport) -> Value {
    json!({
        "summary": report.summary(),
        "report": report,
    })
}

/// Bind the daemon socket, clearing a file left behind by a dead daemon.
/// A socket that still accepts connections belongs to a live daemon.
fn bind_socket(socket: &Path) -> Result<UnixListener, DaemonError> {
    if StdUnixStream::connect(socket).is_ok() {
        return Err(DaemonError::Protocol(format!(
            "another daemon is listening on {}",
            socket.display()
        )));
    }
    match fs::remove_file(socket) {
        Ok(()) => tracing::warn!(socket = %socket.display(), "removed stale daemon socket"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(io_err(socket, err)),
    }

    let listener = UnixListener::bind(socket).map_err(|e| io_err(socket, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(socket, fs::Permissions::from_mode(0o600))
            .map_err(|e| io_err(socket, e))?;
    }
    Ok(listener)
}

async fn write_line(writer: &mut OwnedWriteHalf, response: &DaemonResponse) -> Result<(), DaemonError> {
    let mut line = serde_json::to_vec(response)?;
    line.push(b'\n');
    writer
        .write_all(&line)
        .await
        .map_err(|e| io_err("daemon socket write", e))
}

fn joined(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    result.map_err(|err| DaemonError::Protocol(format!("{task} task panicked or was aborted: {err}")))?
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
