//! Cross-process "re-check credentials now" channel.
//!
//! The poller binds a Unix datagram socket; any other process may send it a
//! datagram. Delivery is best-effort: the poller re-reads token material on
//! every cycle anyway, so a lost notification only costs latency.

use std::io;
use std::path::{Path, PathBuf};

use tokio::net::UnixDatagram;

const RELOAD_MESSAGE: &[u8] = b"reload";

pub struct ReloadListener {
    socket: UnixDatagram,
    path: PathBuf,
}

impl ReloadListener {
    /// Bind at `path`, replacing a socket file left behind by a previous run.
    pub fn bind(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!("Removed stale reload socket {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        let socket = UnixDatagram::bind(&path)?;
        Ok(Self { socket, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the next notification. Payload content is ignored.
    pub async fn recv(&self) -> io::Result<()> {
        let mut buf = [0u8; 64];
        self.socket.recv(&mut buf).await?;
        Ok(())
    }
}

impl Drop for ReloadListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Ask the poller to re-check now. `Ok(false)` when nobody is listening.
pub async fn request_reload(path: &Path) -> io::Result<bool> {
    let socket = UnixDatagram::unbound()?;
    match socket.send_to(RELOAD_MESSAGE, path).await {
        Ok(_) => Ok(true),
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
            ) =>
        {
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
