//! Persistent LPEC connection to one device
//!
//! Owns the socket, performs the connect handshake and the subscribe call, and
//! hands out lines one at a time with a bounded wait. It never reconnects on its
//! own: a dead connection is reported to the owner as [`LpecError::Closed`].

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{LpecError, Result};
use crate::event::{self, Announcement, LpecEvent};
use crate::DEFAULT_EVENT_PORT;

/// Timeouts and port for event connections
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub port: u16,
    pub connect_timeout: Duration,
    /// How long to wait for the `ALIVE` announcement after connecting
    pub handshake_timeout: Duration,
    /// How long to wait for the initial event after `SUBSCRIBE`
    pub subscribe_timeout: Duration,
    /// Steady-state read timeout; elapsing is an idle tick, not an error
    pub idle_timeout: Duration,
    /// Pause after the blank line sent to work around the first-command quirk
    pub quirk_pause: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_EVENT_PORT,
            connect_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(2),
            subscribe_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(30),
            quirk_pause: Duration::from_millis(100),
        }
    }
}

/// Handle that can tear down a connection from another thread
///
/// Shutting the socket down makes any blocked read on the owning thread return
/// immediately with EOF.
#[derive(Debug)]
pub struct ShutdownHandle {
    stream: TcpStream,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            if e.kind() != ErrorKind::NotConnected {
                tracing::debug!("socket shutdown failed: {}", e);
            }
        }
    }
}

/// An open event-subscription connection
#[derive(Debug)]
pub struct EventConnection {
    peer: SocketAddr,
    writer: TcpStream,
    reader: BufReader<TcpStream>,
    pending: Vec<u8>,
    announcements: Vec<Announcement>,
    config: ConnectionConfig,
}

impl EventConnection {
    /// Connect to `host` and perform the handshake
    pub fn connect(host: &str, config: &ConnectionConfig) -> Result<Self> {
        let addr = resolve(host, config.port)?;
        tracing::debug!("connecting to {}", addr);

        let stream = TcpStream::connect_timeout(&addr, config.connect_timeout).map_err(|e| {
            if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) {
                LpecError::Timeout("connect")
            } else {
                LpecError::Connect { addr, source: e }
            }
        })?;
        stream.set_nodelay(true)?;

        let reader = BufReader::new(stream.try_clone()?);
        let mut connection = Self {
            peer: addr,
            writer: stream,
            reader,
            pending: Vec::new(),
            announcements: Vec::new(),
            config: config.clone(),
        };
        connection.handshake()?;
        Ok(connection)
    }

    fn handshake(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.config.handshake_timeout;
        while let Some(line) = self.read_line_until(deadline)? {
            tracing::trace!(peer = %self.peer, "handshake: {}", line);
            if let Some(announcement) = event::parse_alive(&line) {
                let is_ds = announcement.service == "Ds";
                self.announcements.push(announcement);
                if is_ds {
                    break;
                }
            }
        }

        // the first command after connect is ignored by the device
        self.send_line("")?;
        if !self.config.quirk_pause.is_zero() {
            thread::sleep(self.config.quirk_pause);
        }
        Ok(())
    }

    /// Subscribe to a service (e.g. `Ds/Receiver`) and return the events of the
    /// initial response, which carry the current value of every variable
    pub fn subscribe(&mut self, service: &str) -> Result<Vec<LpecEvent>> {
        self.send_line(&format!("SUBSCRIBE {}", service))?;

        let deadline = Instant::now() + self.config.subscribe_timeout;
        let mut received_any = false;
        let mut events = Vec::new();

        while let Some(line) = self.read_line_until(deadline)? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            received_any = true;
            tracing::trace!(peer = %self.peer, "subscribe: {}", line);

            if event::is_event_line(line) {
                match event::parse_event(line) {
                    Ok(event) => {
                        events.push(event);
                        break;
                    }
                    Err(e) => tracing::warn!(peer = %self.peer, "skipping malformed event: {}", e),
                }
            }
        }

        if !received_any {
            return Err(LpecError::Timeout("subscribe"));
        }
        Ok(events)
    }

    /// Read the next line, waiting at most `timeout`
    ///
    /// `Ok(None)` means nothing arrived in time; EOF is [`LpecError::Closed`].
    pub fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        if timeout.is_zero() {
            return Ok(None);
        }
        self.reader.get_ref().set_read_timeout(Some(timeout))?;

        match self.reader.read_until(b'\n', &mut self.pending) {
            Ok(0) if self.pending.is_empty() => Err(LpecError::Closed),
            Ok(_) => {
                let raw = std::mem::take(&mut self.pending);
                let line = String::from_utf8_lossy(&raw);
                Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
            }
            // partial data stays in `pending` for the next call
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(LpecError::Io(e)),
        }
    }

    /// Read the next line with the configured idle timeout
    pub fn next_line(&mut self) -> Result<Option<String>> {
        let idle = self.config.idle_timeout;
        self.read_line(idle)
    }

    fn read_line_until(&mut self, deadline: Instant) -> Result<Option<String>> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.read_line(remaining)
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(format!("{}\r\n", line).as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    /// Announcements seen during the handshake
    pub fn announcements(&self) -> &[Announcement] {
        &self.announcements
    }

    /// Identifier announced for the `Ds` service, if any
    pub fn identifier(&self) -> Option<&str> {
        self.announcements
            .iter()
            .find(|a| a.service == "Ds")
            .map(|a| a.identifier.as_str())
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn shutdown_handle(&self) -> Result<ShutdownHandle> {
        Ok(ShutdownHandle {
            stream: self.writer.try_clone()?,
        })
    }

    /// Close both directions of the socket
    pub fn close(self) {
        tracing::debug!(peer = %self.peer, "closing event connection");
        let _ = self.writer.shutdown(Shutdown::Both);
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| LpecError::Resolve {
            host: host.to_string(),
            reason: e.to_string(),
        })?
        .next()
        .ok_or_else(|| LpecError::Resolve {
            host: host.to_string(),
            reason: "no addresses".to_string(),
        })
}
