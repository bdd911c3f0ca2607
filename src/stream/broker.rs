//! Stream broker - a registry of named in-process byte pipes
//!
//! ```text
//!   producer ──▶ StreamWriter ──┬──▶ [duplex 64KB] ──▶ StreamReader ──▶ consumer
//!                               └──▶ [duplex 64KB] ──▶ StreamReader ──▶ consumer
//! ```
//!
//! Each name maps to one write handle and one read end per declared
//! consumer. The name table sits behind a `RwLock` that is only held while
//! registering or looking up entries; byte I/O happens on the handles.
//!
//! A consumer that only starts after its producer has finished cannot drain
//! a 64KB pipe in time. Such read ends are spooled: a background task drains
//! the pipe into memory as the producer writes, and the reader replays it.

use crate::core::{BrokerError, Pipeline};
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, warn};

/// Default pipe buffer capacity (matches Linux kernel pipe default).
pub const PIPE_BUFFER_SIZE: usize = 64 * 1024;

struct StreamEntry {
    writer: StreamWriter,
    /// Live read ends not yet handed out by `get`
    unclaimed: Vec<DuplexStream>,
    /// Spooled read ends, handed out once the live ones are gone
    spooled: Vec<SpoolReader>,
    /// Set once `close_all` has run
    closed: bool,
}

/// Registry mapping stream names to in-process pipes for one execution
pub struct StreamBroker {
    streams: RwLock<HashMap<String, StreamEntry>>,
    /// Declared consumer count per stream; undeclared streams get one reader
    fan_out: HashMap<String, usize>,
    /// How many of a stream's consumers claim their reader late
    spool: HashMap<String, usize>,
    capacity: usize,
}

impl StreamBroker {
    pub fn new() -> Self {
        Self::with_capacity(PIPE_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            fan_out: HashMap::new(),
            spool: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Broker sized for `pipeline`: every produced stream gets one read end
    /// per step that consumes it, possibly zero.
    pub fn for_pipeline(pipeline: &Pipeline) -> Self {
        let fan_out = pipeline
            .produced_streams()
            .into_iter()
            .map(|name| (name.to_string(), pipeline.consumer_count(name)))
            .collect();
        Self {
            fan_out,
            ..Self::new()
        }
    }

    /// Declare how many consumers will call `get` for `name`
    pub fn expect_consumers(mut self, name: impl Into<String>, count: usize) -> Self {
        self.fan_out.insert(name.into(), count);
        self
    }

    /// Declare that `count` of the consumers of `name` claim their reader
    /// only after the producer may have finished. Their read ends buffer
    /// without bound and are handed out after every live read end.
    pub fn spool_consumers(mut self, name: impl Into<String>, count: usize) -> Self {
        self.spool.insert(name.into(), count);
        self
    }

    /// Register `name` and return its write handle
    pub async fn create(&self, name: &str) -> Result<StreamWriter, BrokerError> {
        let readers = self.fan_out.get(name).copied().unwrap_or(1);

        let mut streams = self.streams.write().await;
        if streams.contains_key(name) {
            return Err(BrokerError::DuplicateStream(name.to_string()));
        }

        let (sinks, mut unclaimed): (Vec<_>, Vec<_>) = (0..readers)
            .map(|_| tokio::io::duplex(self.capacity))
            .unzip();
        let spooled_count = self.spool.get(name).copied().unwrap_or(0).min(readers);
        let spooled = unclaimed
            .split_off(readers - spooled_count)
            .into_iter()
            .map(|pipe| SpoolReader::spawn(name, pipe))
            .collect();

        let writer = StreamWriter::new(name, sinks);
        streams.insert(
            name.to_string(),
            StreamEntry {
                writer: writer.clone(),
                unclaimed,
                spooled,
                closed: false,
            },
        );

        debug!(
            "Created stream '{}' with {} reader(s), {} spooled",
            name, readers, spooled_count
        );
        Ok(writer)
    }

    /// Claim a read handle for `name`
    pub async fn get(&self, name: &str) -> Result<StreamReader, BrokerError> {
        let mut streams = self.streams.write().await;
        let entry = streams
            .get_mut(name)
            .ok_or_else(|| BrokerError::StreamNotFound(name.to_string()))?;

        if entry.closed {
            return Err(BrokerError::StreamClosed(name.to_string()));
        }

        let inner = match entry.unclaimed.pop() {
            Some(pipe) => ReaderSource::Pipe(pipe),
            None => entry
                .spooled
                .pop()
                .map(ReaderSource::Spool)
                .ok_or_else(|| BrokerError::ReaderUnavailable(name.to_string()))?,
        };

        debug!("Claimed reader for stream '{}'", name);
        Ok(StreamReader {
            name: name.to_string(),
            inner,
        })
    }

    /// Close every write handle not already closed.
    ///
    /// Failures are folded into one `CloseFailed`; which handle failed is
    /// only visible in its text.
    pub async fn close_all(&self) -> Result<(), BrokerError> {
        let writers: Vec<StreamWriter> = {
            let mut streams = self.streams.write().await;
            streams
                .values_mut()
                .map(|entry| {
                    entry.closed = true;
                    entry.unclaimed.clear();
                    entry.spooled.clear();
                    entry.writer.clone()
                })
                .collect()
        };

        let mut failures = Vec::new();
        for writer in writers {
            if let Err(e) = writer.close().await {
                warn!("Failed to close stream '{}': {}", writer.name(), e);
                failures.push(e.to_string());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BrokerError::CloseFailed {
                failures: failures.len(),
                details: failures.join("; "),
            })
        }
    }
}

impl Default for StreamBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// Write end of a named stream; clones share the same pipe(s)
#[derive(Clone)]
pub struct StreamWriter {
    name: Arc<str>,
    /// `None` once closed
    sinks: Arc<Mutex<Option<Vec<DuplexStream>>>>,
}

impl StreamWriter {
    fn new(name: &str, sinks: Vec<DuplexStream>) -> Self {
        Self {
            name: Arc::from(name),
            sinks: Arc::new(Mutex::new(Some(sinks))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write `data` to every reader, waiting while a reader's buffer is full.
    ///
    /// A reader that went away is dropped from the fan-out; once the last one
    /// is gone the write fails with `BrokenPipe`.
    pub async fn write_all(&self, data: &[u8]) -> Result<(), BrokerError> {
        let mut guard = self.sinks.lock().await;
        let sinks = guard
            .as_mut()
            .ok_or_else(|| BrokerError::StreamClosed(self.name.to_string()))?;

        let had_readers = !sinks.is_empty();
        let mut index = 0;
        while index < sinks.len() {
            match sinks[index].write_all(data).await {
                Ok(()) => index += 1,
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!("Reader of stream '{}' went away", self.name);
                    sinks.swap_remove(index);
                }
                Err(source) => {
                    return Err(BrokerError::Io {
                        name: self.name.to_string(),
                        source,
                    })
                }
            }
        }

        if had_readers && sinks.is_empty() {
            return Err(BrokerError::Io {
                name: self.name.to_string(),
                source: io::Error::new(io::ErrorKind::BrokenPipe, "all readers closed"),
            });
        }
        Ok(())
    }

    /// Signal EOF to every reader. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), BrokerError> {
        let Some(sinks) = self.sinks.lock().await.take() else {
            return Ok(());
        };

        let mut first_error = None;
        for mut sink in sinks {
            if let Err(source) = sink.shutdown().await {
                if source.kind() != io::ErrorKind::BrokenPipe && first_error.is_none() {
                    first_error = Some(source);
                }
            }
        }

        debug!("Closed stream '{}'", self.name);
        match first_error {
            None => Ok(()),
            Some(source) => Err(BrokerError::Io {
                name: self.name.to_string(),
                source,
            }),
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.sinks.lock().await.is_none()
    }
}

/// Read end of a named stream
pub struct StreamReader {
    name: String,
    inner: ReaderSource,
}

enum ReaderSource {
    Pipe(DuplexStream),
    Spool(SpoolReader),
}

impl StreamReader {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl AsyncRead for StreamReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            ReaderSource::Pipe(pipe) => Pin::new(pipe).poll_read(cx, buf),
            ReaderSource::Spool(spool) => spool.poll_chunk(cx, buf),
        }
    }
}

/// Unbounded replay of a pipe, filled by a drain task
struct SpoolReader {
    chunks: mpsc::UnboundedReceiver<io::Result<Vec<u8>>>,
    pending: Vec<u8>,
    offset: usize,
}

impl SpoolReader {
    const CHUNK: usize = 8 * 1024;

    /// Start draining `pipe`. The task ends at EOF, or once the reader is
    /// dropped, which also drops the pipe and breaks it for the writer.
    fn spawn(name: &str, mut pipe: DuplexStream) -> Self {
        let (tx, chunks) = mpsc::unbounded_channel();
        let name = name.to_string();
        tokio::spawn(async move {
            let mut buf = vec![0u8; Self::CHUNK];
            loop {
                let chunk = match pipe.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => Ok(buf[..n].to_vec()),
                    Err(e) => Err(e),
                };
                let failed = chunk.is_err();
                if tx.send(chunk).is_err() || failed {
                    break;
                }
            }
            debug!("Spool for stream '{}' finished", name);
        });

        Self {
            chunks,
            pending: Vec::new(),
            offset: 0,
        }
    }

    fn poll_chunk(&mut self, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        loop {
            if self.offset < self.pending.len() {
                let n = buf.remaining().min(self.pending.len() - self.offset);
                buf.put_slice(&self.pending[self.offset..self.offset + n]);
                self.offset += n;
                return Poll::Ready(Ok(()));
            }
            match self.chunks.poll_recv(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Err(e)),
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
