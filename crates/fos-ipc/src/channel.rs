//! IPC Channel
//!
//! Non-blocking byte channel over Unix domain sockets. Outgoing bytes that
//! the socket cannot take right away are kept in a write buffer and flushed
//! on the next send.

use std::io::{self, Read, Write};

#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};

const READ_CHUNK: usize = 4096;

/// IPC channel state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Not connected
    Disconnected,
    /// Connecting
    Connecting,
    /// Connected and ready
    Connected,
    /// Error state
    Error,
}

/// IPC channel for inter-process communication
#[derive(Debug)]
pub struct IpcChannel {
    #[cfg(unix)]
    socket: Option<UnixStream>,
    /// Channel path (empty for anonymous pairs)
    path: String,
    state: ChannelState,
    /// Bytes accepted by `send` but not yet written
    write_buffer: Vec<u8>,
}

impl IpcChannel {
    /// Create new channel (not connected)
    pub fn new(path: &str) -> Self {
        Self {
            #[cfg(unix)]
            socket: None,
            path: path.to_string(),
            state: ChannelState::Disconnected,
            write_buffer: Vec::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ChannelState::Connected
    }

    /// Bytes waiting to be flushed
    pub fn pending_bytes(&self) -> usize {
        self.write_buffer.len()
    }

    /// Connect to a listening peer
    #[cfg(unix)]
    pub fn connect(&mut self) -> io::Result<()> {
        self.state = ChannelState::Connecting;

        match UnixStream::connect(&self.path).and_then(|socket| {
            socket.set_nonblocking(true)?;
            Ok(socket)
        }) {
            Ok(socket) => {
                self.socket = Some(socket);
                self.state = ChannelState::Connected;
                tracing::debug!("IPC channel connected: {}", self.path);
                Ok(())
            }
            Err(e) => {
                self.state = ChannelState::Error;
                Err(e)
            }
        }
    }

    #[cfg(not(unix))]
    pub fn connect(&mut self) -> io::Result<()> {
        self.state = ChannelState::Error;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "IPC channels require Unix domain sockets",
        ))
    }

    /// Wrap an already connected stream
    #[cfg(unix)]
    pub fn from_stream(stream: UnixStream, path: &str) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            socket: Some(stream),
            path: path.to_string(),
            state: ChannelState::Connected,
            write_buffer: Vec::new(),
        })
    }

    /// Connected anonymous pair, for in-process peers
    #[cfg(unix)]
    pub fn pair() -> io::Result<(Self, Self)> {
        let (a, b) = UnixStream::pair()?;
        Ok((Self::from_stream(a, "")?, Self::from_stream(b, "")?))
    }

    /// Queue `data` and write as much as the socket accepts.
    /// Returns the number of bytes still buffered.
    pub fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        if !self.is_connected() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "Channel not connected",
            ));
        }
        self.write_buffer.extend_from_slice(data);
        self.flush()
    }

    /// Write buffered bytes until empty or the socket would block
    #[cfg(unix)]
    pub fn flush(&mut self) -> io::Result<usize> {
        let Some(socket) = self.socket.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "Channel not connected",
            ));
        };

        while !self.write_buffer.is_empty() {
            match socket.write(&self.write_buffer) {
                Ok(0) => {
                    self.state = ChannelState::Disconnected;
                    return Err(io::Error::new(io::ErrorKind::WriteZero, "peer closed"));
                }
                Ok(n) => {
                    self.write_buffer.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.state = ChannelState::Error;
                    return Err(e);
                }
            }
        }
        Ok(self.write_buffer.len())
    }

    #[cfg(not(unix))]
    pub fn flush(&mut self) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "IPC channels require Unix domain sockets",
        ))
    }

    /// Append everything currently readable to `out` (non-blocking).
    /// Returns the number of bytes read; a closed peer moves the channel
    /// to `Disconnected`.
    #[cfg(unix)]
    pub fn read_available(&mut self, out: &mut Vec<u8>) -> io::Result<usize> {
        let Some(socket) = self.socket.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "Channel not connected",
            ));
        };

        let mut chunk = [0u8; READ_CHUNK];
        let mut total = 0;
        loop {
            match socket.read(&mut chunk) {
                Ok(0) => {
                    self.state = ChannelState::Disconnected;
                    break;
                }
                Ok(n) => {
                    out.extend_from_slice(&chunk[..n]);
                    total += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.state = ChannelState::Error;
                    return Err(e);
                }
            }
        }
        Ok(total)
    }

    #[cfg(not(unix))]
    pub fn read_available(&mut self, _out: &mut Vec<u8>) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "IPC channels require Unix domain sockets",
        ))
    }

    /// Close the channel, dropping unflushed bytes
    pub fn close(&mut self) {
        #[cfg(unix)]
        {
            self.socket = None;
        }
        self.write_buffer.clear();
        self.state = ChannelState::Disconnected;
    }
}

/// Listening end that remote peers connect to
#[cfg(unix)]
#[derive(Debug)]
pub struct IpcListener {
    listener: UnixListener,
    path: String,
}

#[cfg(unix)]
impl IpcListener {
    /// Bind a non-blocking listener at `path`, replacing a stale socket file
    pub fn bind(path: &str) -> io::Result<Self> {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!("Removed stale socket {}", path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        let listener = UnixListener::bind(path)?;
        listener.set_nonblocking(true)?;
        tracing::debug!("IPC listener bound: {}", path);
        Ok(Self {
            listener,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Accept one pending connection, if any
    pub fn accept(&self) -> io::Result<Option<IpcChannel>> {
        match self.listener.accept() {
            Ok((stream, _)) => IpcChannel::from_stream(stream, &self.path).map(Some),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(unix)]
impl Drop for IpcListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
