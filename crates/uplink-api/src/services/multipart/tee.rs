//! Shared request body with bounded record-and-replay.
//!
//! The ingestion engine reads the body once to classify the form layout,
//! then parses it a second time. HTTP bodies are single-shot, so the first
//! pass runs through a [`TeeStream`] that copies every raw chunk into a
//! recorder. The second pass replays the recorded prefix and then continues
//! reading the live body through [`SharedBodyHandle`].
//!
//! The tee enforces the classification bound at the pull side: once the
//! recorder holds `cap` bytes it stops drawing from the live body and
//! reports end-of-stream to the classifier, latching `saturated`. Nothing
//! is ever pulled from the body without being recorded, so the replay is
//! always exact.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use uplink_core::AppError;

/// Type-erased request body as a fallible chunk stream.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, AppError>> + Send>>;

fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// A body stream owned behind a mutex so two sequential consumers can share
/// it. Only one handle polls at a time; the engine never polls concurrently.
pub struct SharedBody {
    inner: Arc<Mutex<Option<BodyStream>>>,
}

impl SharedBody {
    pub fn new(body: BodyStream) -> Self {
        SharedBody {
            inner: Arc::new(Mutex::new(Some(body))),
        }
    }

    /// A stream view over the remaining live body.
    pub fn handle(&self) -> SharedBodyHandle {
        SharedBodyHandle {
            inner: self.inner.clone(),
        }
    }
}

pub struct SharedBodyHandle {
    inner: Arc<Mutex<Option<BodyStream>>>,
}

impl Stream for SharedBodyHandle {
    type Item = Result<Bytes, AppError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut slot = lock_ignore_poison(&self.inner);
        match slot.as_mut() {
            Some(body) => body.as_mut().poll_next(cx),
            None => Poll::Ready(None),
        }
    }
}

/// Raw bytes captured during the classification pass. `saturated` latches
/// when the cap cut the classifier off before the form was fully read.
pub struct RecordState {
    pub chunks: Vec<Bytes>,
    pub total: usize,
    pub cap: usize,
    pub saturated: bool,
}

pub type Recorder = Arc<Mutex<RecordState>>;

pub fn new_recorder(cap: usize) -> Recorder {
    Arc::new(Mutex::new(RecordState {
        chunks: Vec::new(),
        total: 0,
        cap,
        saturated: false,
    }))
}

pub fn is_saturated(recorder: &Recorder) -> bool {
    lock_ignore_poison(recorder).saturated
}

/// Wraps a body stream for the classification pass, copying every chunk
/// into the recorder as it passes through. When the recorder reaches its
/// cap the tee stops polling the inner stream and yields end-of-stream
/// instead, so the classifier can never draw more than the cap (plus the
/// one transport chunk that crossed it) out of the live body.
pub struct TeeStream<S> {
    inner: S,
    recorder: Recorder,
}

impl<S> TeeStream<S> {
    pub fn new(inner: S, recorder: Recorder) -> Self {
        TeeStream { inner, recorder }
    }
}

impl<S> Stream for TeeStream<S>
where
    S: Stream<Item = Result<Bytes, AppError>> + Unpin,
{
    type Item = Result<Bytes, AppError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.as_mut().get_mut();
        {
            let mut state = lock_ignore_poison(&this.recorder);
            if state.total >= state.cap {
                state.saturated = true;
                return Poll::Ready(None);
            }
        }
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                let mut state = lock_ignore_poison(&this.recorder);
                state.total += chunk.len();
                state.chunks.push(chunk.clone());
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}

/// Snapshot of the recorder after the classification pass.
pub struct Recorded {
    pub chunks: Vec<Bytes>,
    pub saturated: bool,
}

pub fn take_recorded(recorder: &Recorder) -> Recorded {
    let mut state = lock_ignore_poison(recorder);
    Recorded {
        chunks: std::mem::take(&mut state.chunks),
        saturated: state.saturated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn body_of(chunks: Vec<&'static [u8]>) -> BodyStream {
        Box::pin(futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::from_static(c)))
                .collect::<Vec<_>>(),
        ))
    }

    #[tokio::test]
    async fn test_tee_records_chunks_within_cap() {
        let shared = SharedBody::new(body_of(vec![b"abc", b"def"]));
        let recorder = new_recorder(64);
        let mut tee = TeeStream::new(shared.handle(), recorder.clone());

        let mut seen = Vec::new();
        while let Some(chunk) = tee.next().await {
            seen.push(chunk.unwrap());
        }
        assert_eq!(seen, vec![Bytes::from_static(b"abc"), Bytes::from_static(b"def")]);

        let recorded = take_recorded(&recorder);
        assert!(!recorded.saturated);
        assert_eq!(recorded.chunks, seen);
    }

    #[tokio::test]
    async fn test_tee_stops_pulling_at_cap() {
        let shared = SharedBody::new(body_of(vec![b"0123456789", b"abcdef", b"tail"]));
        let recorder = new_recorder(12);
        let mut tee = TeeStream::new(shared.handle(), recorder.clone());

        // The chunk crossing the cap still flows; after that the classifier
        // sees end-of-stream.
        let mut seen = 0;
        while let Some(chunk) = tee.next().await {
            seen += chunk.unwrap().len();
        }
        assert_eq!(seen, 16);

        let recorded = take_recorded(&recorder);
        assert!(recorded.saturated);
        assert_eq!(
            recorded.chunks,
            vec![Bytes::from_static(b"0123456789"), Bytes::from_static(b"abcdef")]
        );

        // The unpulled remainder is still on the live body for replay.
        let mut rest = shared.handle();
        assert_eq!(rest.next().await.unwrap().unwrap(), Bytes::from_static(b"tail"));
    }

    #[tokio::test]
    async fn test_shared_handle_resumes_where_previous_stopped() {
        let shared = SharedBody::new(body_of(vec![b"one", b"two", b"three"]));

        let mut first = shared.handle();
        assert_eq!(first.next().await.unwrap().unwrap(), Bytes::from_static(b"one"));
        drop(first);

        let mut second = shared.handle();
        assert_eq!(second.next().await.unwrap().unwrap(), Bytes::from_static(b"two"));
        assert_eq!(second.next().await.unwrap().unwrap(), Bytes::from_static(b"three"));
        assert!(second.next().await.is_none());
    }
}
