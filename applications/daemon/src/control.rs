//! JSON control surface
//!
//! Newline-delimited JSON over a Unix domain socket. Every request maps to
//! one engine call; responses carry `ok` plus either a `value` or a stable
//! machine-readable `error` kind.

use chime_playback::{Placement, PlayerEngine, RepeatMode, ShuffleMode, API_VERSION};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Control requests, tagged by command name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    GetStatus,
    Play,
    Pause,
    Next,
    Prev,
    GetVolume,
    SetVolume { level: u8 },
    GetRepeatMode,
    SetRepeatMode { mode: RepeatMode },
    GetShuffleMode,
    SetShuffleMode { mode: ShuffleMode },
    GetPlaylistSize,
    GetPlaylistItem { index: usize },
    GetCurrentQueueItem,
    ClearQueue,
    MoveQueueItem { from: usize, to: usize },
    Select { index: usize },
    Seek { frame: u64 },
    Enqueue {
        path: PathBuf,
        #[serde(default = "default_placement")]
        placement: Placement,
    },
    Remove { index: usize },
    QuitServer,
    GetApiVersion,
}

fn default_placement() -> Placement {
    Placement::Back
}

/// Control response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    fn empty() -> Self {
        Self {
            ok: true,
            value: None,
            error: None,
        }
    }

    fn value(value: impl Serialize) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => Self {
                ok: true,
                value: Some(value),
                error: None,
            },
            Err(_) => Self::error("internal_error"),
        }
    }

    fn error(kind: impl Into<String>) -> Self {
        Self {
            ok: false,
            value: None,
            error: Some(kind.into()),
        }
    }

    fn from_result(result: chime_playback::Result<()>) -> Self {
        match result {
            Ok(()) => Self::empty(),
            Err(err) => Self::error(err.kind()),
        }
    }

    fn from_value_result(result: chime_playback::Result<impl Serialize>) -> Self {
        match result {
            Ok(value) => Self::value(value),
            Err(err) => Self::error(err.kind()),
        }
    }
}

/// Map one request onto the engine
pub fn dispatch(engine: &PlayerEngine, request: Request) -> Response {
    match request {
        Request::GetStatus => Response::value(engine.playback_status()),
        Request::Play => {
            engine.play();
            Response::empty()
        }
        Request::Pause => {
            engine.pause();
            Response::empty()
        }
        Request::Next => {
            engine.next();
            Response::empty()
        }
        Request::Prev => {
            engine.prev();
            Response::empty()
        }
        Request::GetVolume => Response::value(engine.volume()),
        Request::SetVolume { level } => {
            engine.set_volume(level);
            Response::empty()
        }
        Request::GetRepeatMode => Response::value(engine.repeat_mode()),
        Request::SetRepeatMode { mode } => {
            engine.set_repeat_mode(mode);
            Response::empty()
        }
        Request::GetShuffleMode => Response::value(engine.shuffle_mode()),
        Request::SetShuffleMode { mode } => {
            engine.set_shuffle_mode(mode);
            Response::empty()
        }
        Request::GetPlaylistSize => Response::value(engine.size()),
        Request::GetPlaylistItem { index } => Response::from_value_result(engine.get_item(index)),
        Request::GetCurrentQueueItem => Response::from_value_result(engine.current_queue_item()),
        Request::ClearQueue => {
            engine.clear_queue();
            Response::empty()
        }
        Request::MoveQueueItem { from, to } => {
            engine.move_queue_item(from, to);
            Response::empty()
        }
        Request::Select { index } => {
            engine.select(index);
            Response::empty()
        }
        Request::Seek { frame } => Response::from_result(engine.seek(frame)),
        Request::Enqueue { path, placement } => {
            Response::from_result(engine.enqueue(path, placement))
        }
        Request::Remove { index } => Response::from_result(engine.remove(index)),
        Request::QuitServer => {
            engine.shutdown();
            Response::empty()
        }
        Request::GetApiVersion => Response::value(API_VERSION),
    }
}

/// Accept-loop poll interval while no client is connecting
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// Run the control surface until the engine shuts down
///
/// A stale socket file from a previous run is removed before binding.
/// Each client gets its own handler thread; clients are line-oriented, one
/// JSON request per line, one JSON response per line.
pub fn serve(engine: Arc<PlayerEngine>, socket_path: &Path) -> anyhow::Result<()> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    let listener = UnixListener::bind(socket_path)?;
    listener.set_nonblocking(true)?;
    info!(socket = %socket_path.display(), "control surface listening");

    while engine.is_running() {
        match listener.accept() {
            Ok((stream, _addr)) => {
                let engine = engine.clone();
                thread::spawn(move || {
                    if let Err(err) = handle_client(&engine, stream) {
                        debug!(%err, "client connection closed with error");
                    }
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(err) => {
                warn!(%err, "accept failed");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }

    let _ = std::fs::remove_file(socket_path);
    Ok(())
}

fn handle_client(engine: &PlayerEngine, stream: UnixStream) -> std::io::Result<()> {
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                debug!(?request, "control request");
                dispatch(engine, request)
            }
            Err(err) => {
                debug!(%err, "malformed control request");
                Response::error("bad_request")
            }
        };

        serde_json::to_writer(&mut writer, &response)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        if !engine.is_running() {
            break;
        }
    }

    Ok(())
}
