use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::codec::FrameDecoder;
use crate::error::{BroadcasterError, FrameError, Result};
use crate::events::Event;

/// Size of a single socket read
const READ_CHUNK_SIZE: usize = 4096;

/// Receives decoded events from a [`StreamReader`].
pub trait EventHandler {
    /// Called once per decoded event, in stream order
    fn on_event(&mut self, event: &Event);

    /// Called for a line that could not be decoded; the stream continues.
    fn on_malformed(&mut self, error: &FrameError) {
        warn!("Failed to parse event: {}", error);
    }
}

/// How a read loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The broadcast source closed the stream
    Disconnected,
}

/// Consumer side of the broadcast stream
pub struct StreamReader<S> {
    stream: S,
    decoder: FrameDecoder,
}

impl StreamReader<TcpStream> {
    /// Connect to a broadcast source.
    ///
    /// A refused connection is reported as
    /// [`BroadcasterError::ConnectionRefused`]; there is no retry.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        info!("Connecting to sound broadcaster at {}:{}", host, port);

        let stream = TcpStream::connect((host, port)).await.map_err(|e| {
            if e.kind() == ErrorKind::ConnectionRefused {
                BroadcasterError::ConnectionRefused(format!("{}:{}", host, port))
            } else {
                BroadcasterError::Io(e)
            }
        })?;

        info!("✓ Connected to sound broadcaster");
        Ok(Self::from_stream(stream))
    }
}

impl<S: AsyncRead + Unpin> StreamReader<S> {
    pub fn from_stream(stream: S) -> Self {
        Self {
            stream,
            decoder: FrameDecoder::new(),
        }
    }

    /// Read until end of stream, handing each frame to `handler`.
    ///
    /// End of stream is a normal outcome; only read errors are returned as `Err`.
    pub async fn run<H: EventHandler + ?Sized>(&mut self, handler: &mut H) -> Result<ReadOutcome> {
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];

        loop {
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                if self.decoder.pending() > 0 {
                    debug!(
                        "Discarding {} bytes of an unterminated frame",
                        self.decoder.pending()
                    );
                }
                info!("Server disconnected");
                return Ok(ReadOutcome::Disconnected);
            }

            for frame in self.decoder.decode(&chunk[..n]) {
                match frame {
                    Ok(event) => handler.on_event(&event),
                    Err(e) => handler.on_malformed(&e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_frame;

    #[derive(Default)]
    struct Collect {
        events: Vec<Event>,
        malformed: Vec<FrameError>,
    }

    impl EventHandler for Collect {
        fn on_event(&mut self, event: &Event) {
            self.events.push(event.clone());
        }

        fn on_malformed(&mut self, error: &FrameError) {
            self.malformed.push(error.clone());
        }
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let first = encode_frame(&Event::point(2498)).unwrap();
        let second = encode_frame(&Event::area(3, 1, 2, 15)).unwrap();
        let (head, tail) = second.split_at(10);

        let stream = tokio_test::io::Builder::new()
            .read(first.as_bytes())
            .read(head.as_bytes())
            .read(tail.as_bytes())
            .build();

        let mut handler = Collect::default();
        let outcome = StreamReader::from_stream(stream)
            .run(&mut handler)
            .await
            .unwrap();

        assert_eq!(outcome, ReadOutcome::Disconnected);
        assert_eq!(
            handler.events,
            vec![Event::point(2498), Event::area(3, 1, 2, 15)]
        );
    }

    #[tokio::test]
    async fn test_malformed_frame_reported_to_handler() {
        let good = encode_frame(&Event::point(1)).unwrap();
        let stream = tokio_test::io::Builder::new()
            .read(b"{broken\n")
            .read(good.as_bytes())
            .build();

        let mut handler = Collect::default();
        StreamReader::from_stream(stream)
            .run(&mut handler)
            .await
            .unwrap();

        assert_eq!(handler.malformed.len(), 1);
        assert_eq!(handler.events, vec![Event::point(1)]);
    }

    #[tokio::test]
    async fn test_read_error_is_returned() {
        let stream = tokio_test::io::Builder::new()
            .read_error(std::io::Error::new(ErrorKind::ConnectionReset, "reset"))
            .build();

        let mut handler = Collect::default();
        let result = StreamReader::from_stream(stream).run(&mut handler).await;
        assert!(matches!(result, Err(BroadcasterError::Io(_))));
    }
}
