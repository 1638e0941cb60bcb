//! Messages pushed to connected viewers and their SSE framing.

use std::fmt;

/// Comment frame written when the stream is idle.
pub const KEEP_ALIVE: &[u8] = b": ping\n\n";

/// A message for every connected viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadMessage {
    /// Sent once when a viewer connects.
    Connected,
    /// Sources changed, the page should reload.
    Reload,
    /// The watcher failed; carries the error text.
    Error(String),
}

impl ReloadMessage {
    /// Payload of the `data:` line.
    pub fn payload(&self) -> String {
        match self {
            Self::Connected => "live server is running".to_string(),
            Self::Reload => "reload".to_string(),
            Self::Error(message) => format!("live reload error: {}", single_line(message)),
        }
    }

    /// Complete server-sent-events frame.
    pub fn to_frame(&self) -> Vec<u8> {
        format!("data: {}\n\n", self.payload()).into_bytes()
    }
}

impl fmt::Display for ReloadMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.payload())
    }
}

/// A newline inside a `data:` line would end the frame early.
fn single_line(message: &str) -> String {
    message.lines().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames() {
        assert_eq!(ReloadMessage::Reload.to_frame(), b"data: reload\n\n");
        assert_eq!(
            ReloadMessage::Connected.to_frame(),
            b"data: live server is running\n\n"
        );
        assert_eq!(
            ReloadMessage::Error("watch failed".into()).to_frame(),
            b"data: live reload error: watch failed\n\n"
        );
    }

    #[test]
    fn test_error_frame_stays_on_one_line() {
        let frame = ReloadMessage::Error("first\nsecond".into()).to_frame();
        assert_eq!(frame, b"data: live reload error: first second\n\n");
    }
}
