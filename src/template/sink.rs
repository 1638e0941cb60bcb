//! Render sinks.
//!
//! A response writer can fail in two very different ways. Transport errors
//! (the client went away, a broken pipe) are expected and swallowed: the rest
//! of the render is discarded. Protocol violations (writing a body the
//! response may not carry, writing to a hijacked connection, overflowing the
//! declared length) are programming errors and must surface.
//!
//! Writers signal a protocol violation by returning an `io::Error` wrapping a
//! [`ProtocolViolation`]; every other error counts as transport.

use std::io::{self, Write};

use thiserror::Error;

/// A write the response is not allowed to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("request method or response status code does not allow body")]
    BodyNotAllowed,

    #[error("connection has been hijacked")]
    Hijacked,

    #[error("wrote more than the declared Content-Length")]
    ContentLength,
}

impl ProtocolViolation {
    /// Wrap into an `io::Error` a sink can return.
    pub fn into_io(self) -> io::Error {
        io::Error::other(self)
    }

    /// The violation carried by `err`, if any.
    pub fn from_io(err: &io::Error) -> Option<Self> {
        err.get_ref()
            .and_then(|e| e.downcast_ref::<ProtocolViolation>())
            .copied()
    }
}

/// Write adapter applying the two error channels.
///
/// After the first transport error every write succeeds without touching the
/// inner sink. A protocol violation is recorded and returned so the engine
/// aborts the render.
pub(crate) struct GuardedSink<W> {
    inner: W,
    disconnected: bool,
    violation: Option<ProtocolViolation>,
}

impl<W: Write> GuardedSink<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self {
            inner,
            disconnected: false,
            violation: None,
        }
    }

    pub(crate) fn violation(&self) -> Option<ProtocolViolation> {
        self.violation
    }

    #[cfg(test)]
    pub(crate) fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    fn classify(&mut self, err: io::Error) -> io::Result<()> {
        match ProtocolViolation::from_io(&err) {
            Some(violation) => {
                self.violation = Some(violation);
                Err(err)
            }
            None => {
                crate::debug!("render"; "client write failed, discarding output: {}", err);
                self.disconnected = true;
                Ok(())
            }
        }
    }
}

impl<W: Write> Write for GuardedSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.disconnected {
            return Ok(buf.len());
        }
        match self.inner.write(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Err(e),
            Err(e) => self.classify(e).map(|()| buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.disconnected {
            return Ok(());
        }
        match self.inner.flush() {
            Ok(()) => Ok(()),
            Err(e) => self.classify(e),
        }
    }
}
