//! Feed transports
//!
//! A transport delivers connection events and text frames to the client
//! and sends the client's requests. Contains the TCP line transport used
//! in production and an in-process channel transport.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use contracts::FeedConfig;

use crate::error::FeedError;

/// What happened on the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Connected,
    /// One text frame
    Message(String),
    Disconnected { reason: String },
}

/// Connection to a feed server
#[trait_variant::make(FeedTransport: Send)]
pub trait LocalFeedTransport {
    /// Wait for the next event
    ///
    /// `Ok(None)` means the transport is finished for good. Must be cancel
    /// safe: dropping the future loses no frame.
    async fn next_event(&mut self) -> Result<Option<FeedEvent>, FeedError>;

    /// Send one text frame
    async fn send(&mut self, frame: String) -> Result<(), FeedError>;

    /// Close the connection; later `next_event` calls return `Ok(None)`
    async fn close(&mut self) -> Result<(), FeedError>;
}

struct Connection {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

/// Newline-delimited JSON frames over TCP
///
/// Connects lazily on the first `next_event`, and reconnects after a
/// disconnect. Gives up with [`FeedError::Connect`] once `attempts`
/// consecutive connects fail. Connect progress lives on the struct, so a
/// cancelled `next_event` resumes the same attempt sequence.
pub struct TcpLineTransport {
    url: String,
    addr: String,
    attempts: u32,
    timeout: Duration,
    retry_delay: Duration,
    connection: Option<Connection>,
    closed: bool,
    failed_attempts: u32,
    /// Deadline of the attempt in flight
    attempt_deadline: Option<Instant>,
    /// Earliest start of the next attempt
    next_attempt_at: Option<Instant>,
}

impl TcpLineTransport {
    pub fn new(url: impl Into<String>, attempts: u32, timeout: Duration) -> Self {
        let url = url.into();
        let addr = url
            .strip_prefix("tcp://")
            .unwrap_or(&url)
            .trim_end_matches('/')
            .to_string();

        Self {
            url,
            addr,
            attempts: attempts.max(1),
            timeout,
            retry_delay: Duration::from_secs(1),
            connection: None,
            closed: false,
            failed_attempts: 0,
            attempt_deadline: None,
            next_attempt_at: None,
        }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(
            config.url.clone(),
            config.connect_attempts,
            config.connect_timeout(),
        )
    }

    /// Delay between failed connect attempts
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    #[instrument(name = "tcp_transport_connect", skip(self), fields(url = %self.url))]
    async fn connect(&mut self) -> Result<(), FeedError> {
        loop {
            if let Some(at) = self.next_attempt_at {
                tokio::time::sleep_until(at).await;
                self.next_attempt_at = None;
            }

            let timeout = self.timeout;
            let deadline = *self
                .attempt_deadline
                .get_or_insert_with(|| Instant::now() + timeout);
            let attempt = self.failed_attempts + 1;

            let error = match tokio::time::timeout_at(deadline, TcpStream::connect(&self.addr)).await {
                Ok(Ok(stream)) => {
                    let _ = stream.set_nodelay(true);
                    let (reader, writer) = stream.into_split();
                    self.connection = Some(Connection {
                        lines: BufReader::new(reader).lines(),
                        writer,
                    });
                    self.reset_attempts();
                    info!(url = %self.url, attempt, "Feed connected");
                    return Ok(());
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {:?}", self.timeout),
            };

            self.attempt_deadline = None;
            self.failed_attempts = attempt;
            warn!(url = %self.url, attempt, error = %error, "Feed connect failed");

            if attempt >= self.attempts {
                self.reset_attempts();
                return Err(FeedError::Connect {
                    url: self.url.clone(),
                    attempts: self.attempts,
                    message: error,
                });
            }
            self.next_attempt_at = Some(Instant::now() + self.retry_delay);
        }
    }

    fn reset_attempts(&mut self) {
        self.failed_attempts = 0;
        self.attempt_deadline = None;
        self.next_attempt_at = None;
    }
}

impl FeedTransport for TcpLineTransport {
    async fn next_event(&mut self) -> Result<Option<FeedEvent>, FeedError> {
        if self.closed {
            return Ok(None);
        }

        let Some(connection) = self.connection.as_mut() else {
            self.connect().await?;
            return Ok(Some(FeedEvent::Connected));
        };

        let reason = match connection.lines.next_line().await {
            Ok(Some(line)) => return Ok(Some(FeedEvent::Message(line))),
            Ok(None) => "closed by server".to_string(),
            Err(e) => e.to_string(),
        };

        self.connection = None;
        Ok(Some(FeedEvent::Disconnected { reason }))
    }

    async fn send(&mut self, frame: String) -> Result<(), FeedError> {
        let connection = self.connection.as_mut().ok_or(FeedError::NotConnected)?;
        connection.writer.write_all(frame.as_bytes()).await?;
        connection.writer.write_all(b"\n").await?;
        connection.writer.flush().await?;
        debug!(url = %self.url, bytes = frame.len(), "Frame sent");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), FeedError> {
        self.closed = true;
        if let Some(mut connection) = self.connection.take() {
            connection.writer.shutdown().await?;
            info!(url = %self.url, "Feed connection closed");
        }
        Ok(())
    }
}

/// In-process transport driven by a [`ChannelPeer`]
pub struct ChannelTransport {
    events: mpsc::UnboundedReceiver<FeedEvent>,
    sent: mpsc::UnboundedSender<String>,
    closed: bool,
}

/// The server side of a [`ChannelTransport`]
pub struct ChannelPeer {
    events: mpsc::UnboundedSender<FeedEvent>,
    sent: mpsc::UnboundedReceiver<String>,
}

impl ChannelTransport {
    pub fn pair() -> (Self, ChannelPeer) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        (
            Self {
                events: event_rx,
                sent: sent_tx,
                closed: false,
            },
            ChannelPeer {
                events: event_tx,
                sent: sent_rx,
            },
        )
    }
}

impl FeedTransport for ChannelTransport {
    async fn next_event(&mut self) -> Result<Option<FeedEvent>, FeedError> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.events.recv().await)
    }

    async fn send(&mut self, frame: String) -> Result<(), FeedError> {
        if self.closed {
            return Err(FeedError::NotConnected);
        }
        self.sent.send(frame).map_err(|_| FeedError::NotConnected)
    }

    async fn close(&mut self) -> Result<(), FeedError> {
        self.closed = true;
        self.events.close();
        Ok(())
    }
}

impl ChannelPeer {
    /// Queue an event for the client; false once the client has closed
    pub fn push(&self, event: FeedEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn connect(&self) -> bool {
        self.push(FeedEvent::Connected)
    }

    pub fn message(&self, frame: impl Into<String>) -> bool {
        self.push(FeedEvent::Message(frame.into()))
    }

    pub fn disconnect(&self, reason: impl Into<String>) -> bool {
        self.push(FeedEvent::Disconnected {
            reason: reason.into(),
        })
    }

    /// Next frame the client sent
    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent.recv().await
    }

    /// Next frame the client sent, if one is already waiting
    pub fn try_next_sent(&mut self) -> Option<String> {
        self.sent.try_recv().ok()
    }
}
