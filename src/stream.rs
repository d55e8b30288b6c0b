use std::{io, mem};
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::response::{Response, IntoResponse};
use bytes::{Bytes, BytesMut};
use http_body::{Body, SizeHint, Frame};
use futures::Stream;
use pin_project::pin_project;
use tokio::io::ReadBuf;

use crate::RangeBody;

const IO_BUFFER_SIZE: usize = 64 * 1024;

/// Response body stream. Implements [`Stream`], [`Body`], and [`IntoResponse`].
///
/// Seeks to `start` on first poll, then yields at most `length` bytes in
/// chunks of up to 64 KiB. If the underlying body hits end-of-file first the
/// stream simply ends. Dropping the stream drops the body, which closes the
/// file handle when a client goes away mid-transfer.
#[pin_project]
pub struct RangedStream<B> {
    state: StreamState,
    length: u64,
    #[pin]
    body: B,
}

impl<B: RangeBody + Send + 'static> RangedStream<B> {
    pub(crate) fn new(body: B, start: u64, length: u64) -> Self {
        RangedStream {
            state: StreamState::Seek { start },
            length,
            body,
        }
    }
}

impl<B> std::fmt::Debug for RangedStream<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangedStream")
            .field("state", &self.state)
            .field("length", &self.length)
            .finish()
    }
}

#[derive(Debug)]
enum StreamState {
    Seek { start: u64 },
    Seeking { remaining: u64 },
    Reading { buffer: BytesMut, remaining: u64 },
}

impl<B: RangeBody + Send + 'static> IntoResponse for RangedStream<B> {
    fn into_response(self) -> Response {
        Response::new(axum::body::Body::new(self))
    }
}

impl<B: RangeBody> Body for RangedStream<B> {
    type Data = Bytes;
    type Error = io::Error;

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.length)
    }

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>)
        -> Poll<Option<io::Result<Frame<Bytes>>>>
    {
        self.poll_next(cx).map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl<B: RangeBody> Stream for RangedStream<B> {
    type Item = io::Result<Bytes>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>
    ) -> Poll<Option<io::Result<Bytes>>> {
        let mut this = self.project();

        if let StreamState::Seek { start } = *this.state {
            match this.body.as_mut().start_seek(start) {
                Err(e) => { return Poll::Ready(Some(Err(e))); }
                Ok(()) => {
                    let remaining = *this.length;
                    *this.state = StreamState::Seeking { remaining };
                }
            }
        }

        if let StreamState::Seeking { remaining } = *this.state {
            match this.body.as_mut().poll_complete(cx) {
                Poll::Pending => { return Poll::Pending; }
                Poll::Ready(Err(e)) => { return Poll::Ready(Some(Err(e))); }
                Poll::Ready(Ok(())) => {
                    let buffer = allocate_buffer();
                    *this.state = StreamState::Reading { buffer, remaining };
                }
            }
        }

        let StreamState::Reading { buffer, remaining } = this.state else {
            unreachable!("seek states always advance to reading");
        };

        if *remaining == 0 {
            return Poll::Ready(None);
        }

        let uninit = buffer.spare_capacity_mut();

        // the smaller of the buffer size and the number of bytes remaining
        let nbytes = std::cmp::min(
            uninit.len(),
            usize::try_from(*remaining).unwrap_or(usize::MAX),
        );

        let mut read_buf = ReadBuf::uninit(&mut uninit[0..nbytes]);

        match this.body.as_mut().poll_read(cx, &mut read_buf) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => Poll::Ready(Some(Err(e))),
            Poll::Ready(Ok(())) => {
                match read_buf.filled().len() {
                    0 => {
                        tracing::debug!(remaining = *remaining, "body ended before range was filled");
                        Poll::Ready(None)
                    }
                    n => {
                        // SAFETY: poll_read has filled the buffer with `n`
                        // additional bytes. `buffer.len` should always be
                        // 0 here, but include it for rigorous correctness
                        unsafe { buffer.set_len(buffer.len() + n); }

                        let chunk = mem::replace(buffer, allocate_buffer());

                        // n <= remaining because of the cmp::min above
                        *remaining -= n as u64;

                        Poll::Ready(Some(Ok(chunk.freeze())))
                    }
                }
            }
        }
    }
}

fn allocate_buffer() -> BytesMut {
    BytesMut::with_capacity(IO_BUFFER_SIZE)
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use bytes::Bytes;
    use futures::{pin_mut, Stream, StreamExt};

    use super::{RangedStream, IO_BUFFER_SIZE};
    use crate::KnownSize;

    async fn collect_stream(stream: impl Stream<Item = io::Result<Bytes>>) -> Vec<Bytes> {
        let mut chunks = Vec::new();
        pin_mut!(stream);
        while let Some(chunk) = stream.next().await.transpose().unwrap() {
            chunks.push(chunk);
        }
        chunks
    }

    fn body(data: Vec<u8>) -> KnownSize<Cursor<Vec<u8>>> {
        let len = data.len() as u64;
        KnownSize::sized(Cursor::new(data), len)
    }

    #[tokio::test]
    async fn test_reads_exact_window() {
        let stream = RangedStream::new(body(b"0123456789".to_vec()), 3, 4);
        let chunks = collect_stream(stream).await;
        assert_eq!(b"3456", &chunks.concat()[..]);
    }

    #[tokio::test]
    async fn test_large_window_is_chunked() {
        let data: Vec<u8> = (0..(3 * IO_BUFFER_SIZE + 17)).map(|i| (i % 251) as u8).collect();
        let stream = RangedStream::new(body(data.clone()), 5, data.len() as u64 - 5);
        let chunks = collect_stream(stream).await;
        assert!(chunks.iter().all(|c| c.len() <= IO_BUFFER_SIZE));
        assert!(chunks.len() >= 4);
        assert_eq!(&data[5..], &chunks.concat()[..]);
    }

    #[tokio::test]
    async fn test_stops_at_end_of_body() {
        // declared size larger than what is actually there
        let stream = RangedStream::new(KnownSize::sized(Cursor::new(b"abc".to_vec()), 10), 1, 9);
        let chunks = collect_stream(stream).await;
        assert_eq!(b"bc", &chunks.concat()[..]);
    }

    #[tokio::test]
    async fn test_empty_window() {
        let stream = RangedStream::new(body(Vec::new()), 0, 0);
        assert!(collect_stream(stream).await.is_empty());
    }
}
