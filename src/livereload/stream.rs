//! Server-sent-events endpoint.
//!
//! Each viewer holds one long-lived response. The stream forwards broadcast
//! messages as `data:` frames until the client goes away (a write fails) or
//! the engine shuts down. Idle streams get a comment frame every keep-alive
//! interval so a dead client is noticed even when nothing changes.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::select;

use super::broadcast::{Broadcaster, Subscriber};
use super::message::{KEEP_ALIVE, ReloadMessage};
use super::shutdown::ShutdownSignal;

const HEADERS: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Type: text/event-stream\r\n\
Cache-Control: no-cache\r\n\
Connection: keep-alive\r\n\
Access-Control-Allow-Origin: *\r\n\r\n";

/// Forward messages from `subscriber` into `sink` until disconnect or shutdown.
///
/// Returns the write error that ended the stream, or `Ok` on shutdown. The
/// subscriber is dropped, and so unsubscribed, on every exit path.
pub fn stream_to<W: Write>(
    mut sink: W,
    subscriber: Subscriber,
    shutdown: &ShutdownSignal,
    keep_alive: Duration,
) -> io::Result<()> {
    send(&mut sink, &ReloadMessage::Connected.to_frame())?;

    loop {
        select! {
            recv(subscriber.receiver()) -> message => match message {
                Ok(message) => send(&mut sink, &message.to_frame())?,
                Err(_) => return Ok(()),
            },
            recv(shutdown.receiver()) -> _ => return Ok(()),
            default(keep_alive) => send(&mut sink, KEEP_ALIVE)?,
        }
    }
}

fn send<W: Write>(sink: &mut W, frame: &[u8]) -> io::Result<()> {
    sink.write_all(frame)?;
    sink.flush()
}

/// Take over a `tiny_http` request and stream to it on the current thread.
pub fn serve(
    request: tiny_http::Request,
    broadcaster: &Arc<Broadcaster>,
    shutdown: &ShutdownSignal,
    keep_alive: Duration,
) {
    // Subscribe before the headers go out so no broadcast is missed
    let subscriber = broadcaster.subscribe();
    let id = subscriber.id();

    let mut writer = request.into_writer();
    let result = match send(&mut writer, HEADERS) {
        Ok(()) => stream_to(&mut writer, subscriber, shutdown, keep_alive),
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => crate::debug!("reload"; "stream {} closed on shutdown", id),
        Err(e) => crate::debug!("reload"; "stream {} disconnected: {}", id, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::livereload::shutdown;
    use parking_lot::Mutex;
    use std::thread;

    /// Sink shared with the test thread; fails once `fail_after` frames were written.
    #[derive(Clone, Default)]
    struct SharedSink {
        frames: Arc<Mutex<Vec<Vec<u8>>>>,
        fail_after: Option<usize>,
    }

    impl SharedSink {
        fn frames(&self) -> Vec<Vec<u8>> {
            self.frames.lock().clone()
        }
    }

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut frames = self.frames.lock();
            if self.fail_after.is_some_and(|n| frames.len() >= n) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
            }
            frames.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn wait_for(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_stream_forwards_and_stops_on_shutdown() {
        let hub = Broadcaster::new();
        let (trigger, signal) = shutdown::channel();
        let sink = SharedSink::default();

        let handle = {
            let sink = sink.clone();
            let subscriber = hub.subscribe();
            thread::spawn(move || stream_to(sink, subscriber, &signal, Duration::from_secs(60)))
        };

        wait_for(|| !sink.frames().is_empty());
        hub.broadcast(&ReloadMessage::Reload);
        wait_for(|| sink.frames().len() == 2);

        trigger.cancel();
        handle.join().unwrap().unwrap();

        assert_eq!(
            sink.frames(),
            vec![
                b"data: live server is running\n\n".to_vec(),
                b"data: reload\n\n".to_vec(),
            ]
        );
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_stream_unsubscribes_on_write_failure() {
        let hub = Broadcaster::new();
        let (_trigger, signal) = shutdown::channel();
        let sink = SharedSink {
            fail_after: Some(1),
            ..Default::default()
        };

        let subscriber = hub.subscribe();
        hub.broadcast(&ReloadMessage::Reload);
        let err = stream_to(sink, subscriber, &signal, Duration::from_secs(60)).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_keep_alive_on_idle_stream() {
        let hub = Broadcaster::new();
        let (trigger, signal) = shutdown::channel();
        let sink = SharedSink::default();

        let handle = {
            let sink = sink.clone();
            let subscriber = hub.subscribe();
            thread::spawn(move || stream_to(sink, subscriber, &signal, Duration::from_millis(20)))
        };

        wait_for(|| sink.frames().iter().any(|f| f == KEEP_ALIVE));
        trigger.cancel();
        handle.join().unwrap().unwrap();
    }
}
