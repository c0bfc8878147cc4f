// MIT License - Copyright (c) 2026 Peter Wright

//! One authenticated TCP session with the central.
//!
//! The central does not tolerate long-lived multiplexed connections, so a
//! session is deliberately short-lived: dial, authenticate, run one command,
//! disconnect. The command executor owns that lifecycle.

use std::io::ErrorKind;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol;
use crate::status::{self, Status};

/// Deadline applied to the dial and to every bounded read.
pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// How to reach and authenticate against the central.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub password: String,
}

impl ConnectOptions {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Commands that can be sent to the central without expecting a decoded
/// reply beyond what the operation itself defines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Arm { partition: u8 },
    Disarm { partition: u8 },
    Bypass { zone: u8, set: bool },
    TurnOffSiren { partition: u8 },
    CleanFirings,
    Panic,
}

/// An authenticated connection to the central.
pub struct Session {
    stream: TcpStream,
}

impl Session {
    /// Dial the central and authenticate.
    pub async fn open(options: &ConnectOptions) -> Result<Self> {
        let addr = options.addr();
        let stream = match timeout(IO_TIMEOUT, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(Error::DialFailed { addr, source }),
            Err(_) => {
                return Err(Error::DialFailed {
                    addr,
                    source: std::io::Error::new(ErrorKind::TimedOut, "connect timed out"),
                })
            }
        };

        let mut session = Self { stream };
        session.authenticate(&options.password).await?;
        debug!("session established with {}", options.addr());
        Ok(session)
    }

    async fn authenticate(&mut self, password: &str) -> Result<()> {
        let body = protocol::auth_body(password)?;
        self.write_frame(protocol::CMD_AUTH, &body).await?;
        let reply = self.read_exact(protocol::auth_reply_len(password)).await?;
        protocol::parse_auth_reply(&reply)
    }

    /// Fetch and decode a status snapshot.
    ///
    /// The reply arrives in two pieces: a chunk the size of our own request,
    /// whose first byte says how many bytes follow, then the remainder.
    pub async fn status(&mut self) -> Result<Status> {
        let request = protocol::build_frame(protocol::CMD_STATUS, &[]);
        self.write_all(&request).await?;

        let mut reply = self.read_exact(request.len()).await?;
        let rest = self.read_exact(reply[0] as usize).await?;
        reply.extend_from_slice(&rest);

        let (_, body) = protocol::parse_frame(&reply)?;
        status::decode(body)
    }

    /// Run a fire-and-forget command, or the arm dialogue for `Arm`.
    pub async fn run(&mut self, command: &Command) -> Result<()> {
        match *command {
            Command::Arm { partition } => self.arm(partition).await,
            Command::Disarm { partition } => {
                debug!("disarm partition {partition:#04x}");
                self.write_frame(protocol::CMD_ARM, &[partition, protocol::SUB_DISARM])
                    .await
            }
            Command::Bypass { zone, set } => {
                debug!("bypass zone {zone} set={set}");
                self.write_frame(protocol::CMD_BYPASS, &[zone - 1, set as u8])
                    .await
            }
            Command::TurnOffSiren { partition } => {
                debug!("turn off siren, partition {partition:#04x}");
                self.write_frame(protocol::CMD_TURN_OFF_SIREN, &[partition])
                    .await
            }
            Command::CleanFirings => {
                debug!("clean firings");
                self.write_frame(protocol::CMD_CLEAN_FIRINGS, &[]).await
            }
            Command::Panic => {
                debug!("trigger audible panic");
                self.write_frame(protocol::CMD_PANIC, &[0x02, 0xa5]).await
            }
        }
    }

    /// Arm a partition (`ALL_PARTITIONS` for every one).
    ///
    /// The central answers arming explicitly: 6 bytes whose last one counts
    /// the remaining reply, then the remainder, whose first byte is 0x40 on
    /// success and 0xF0 when open zones prevent arming.
    async fn arm(&mut self, partition: u8) -> Result<()> {
        debug!("arm partition {partition:#04x}");
        self.write_frame(protocol::CMD_ARM, &[partition, protocol::SUB_ARM])
            .await?;

        let head = self.read_exact(6).await?;
        let rest = self.read_exact(head[5] as usize).await?;
        match rest.first() {
            Some(0xf0) => Err(Error::OpenZones),
            Some(0x40) => Ok(()),
            Some(other) => Err(Error::Protocol(format!(
                "unexpected arm reply opcode: {other:#04x}"
            ))),
            None => Err(Error::Protocol("empty arm reply".into())),
        }
    }

    /// Announce the disconnect and drop the connection. Best effort: by the
    /// time close is called the command already ran, so write failures only
    /// get logged by the caller if it cares.
    pub async fn close(mut self) {
        let frame = protocol::build_frame(protocol::CMD_DISCONNECT, &[]);
        if let Err(err) = self.stream.write_all(&frame).await {
            debug!("disconnect write failed: {err}");
        }
        if let Err(err) = self.stream.shutdown().await {
            debug!("socket shutdown failed: {err}");
        }
    }

    async fn write_frame(&mut self, command: u16, body: &[u8]) -> Result<()> {
        let frame = protocol::build_frame(command, body);
        self.write_all(&frame).await
    }

    async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.stream.write_all(buf).await.map_err(|err| match err.kind() {
            ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                Error::ConnectionLost(err)
            }
            _ => Error::Io(err),
        })
    }

    /// Read exactly `wanted` bytes within the session deadline. Anything
    /// less, including hitting the deadline, is a short read.
    async fn read_exact(&mut self, wanted: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; wanted];
        let mut read = 0;
        let deadline = Instant::now() + IO_TIMEOUT;
        while read < wanted {
            match timeout_at(deadline, self.stream.read(&mut buf[read..])).await {
                Ok(Ok(0)) => return Err(Error::ShortRead { wanted, read }),
                Ok(Ok(n)) => read += n,
                Ok(Err(err)) => return Err(Error::Io(err)),
                Err(_) => return Err(Error::ShortRead { wanted, read }),
            }
        }
        Ok(buf)
    }
}

impl Command {
    /// Human-readable command name for logs and error reports.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Arm { .. } => "arm",
            Command::Disarm { .. } => "disarm",
            Command::Bypass { .. } => "bypass",
            Command::TurnOffSiren { .. } => "turn-off-siren",
            Command::CleanFirings => "clean-firings",
            Command::Panic => "panic",
        }
    }
}
