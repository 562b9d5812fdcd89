use core::pin::Pin;
use core::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::base::{Record, Rtype};

use super::XfrError;

/// A batch of records as sent to the client in one message.
pub type XfrBatch = Vec<Record>;

/// What the producer of a transfer sends: a batch or the reason it stopped.
pub type XfrItem = Result<XfrBatch, XfrError>;

//------------ Framing -------------------------------------------------------

/// The shape a complete transfer stream has.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Framing {
    /// A single SOA record, the client is up to date.
    SoaOnly,

    /// The whole zone between two SOA records.
    Axfr,

    /// Difference sequences between two SOA records.
    Ixfr,
}

//------------ XfrStream -----------------------------------------------------

/// The record batches of a single transfer.
///
/// The stream is single pass. Dropping it stops the producer. If the
/// producer fails, the stream ends early and [`error`][Self::error] tells
/// why.
#[derive(Debug)]
pub struct XfrStream {
    inner: ReceiverStream<XfrItem>,
    framing: Framing,
    records: usize,
    last_rtype: Option<Rtype>,
    error: Option<XfrError>,
    done: bool,
}

impl XfrStream {
    pub(super) fn new(rx: mpsc::Receiver<XfrItem>, framing: Framing) -> Self {
        XfrStream {
            inner: ReceiverStream::new(rx),
            framing,
            records: 0,
            last_rtype: None,
            error: None,
            done: false,
        }
    }

    /// Creates a stream with a single batch holding only `soa`.
    pub(super) fn soa_only(soa: Record) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // A fresh channel with capacity one always accepts one message.
        let _ = tx.try_send(Ok(vec![soa]));
        Self::new(rx, Framing::SoaOnly)
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Returns the error the producer stopped with, if any.
    pub fn error(&self) -> Option<&XfrError> {
        self.error.as_ref()
    }

    /// Returns whether the stream ended with its closing SOA.
    ///
    /// This is only meaningful once the stream returned `None`.
    pub fn is_complete(&self) -> bool {
        if !self.done
            || self.error.is_some()
            || self.last_rtype != Some(Rtype::SOA)
        {
            return false;
        }
        match self.framing {
            Framing::SoaOnly => self.records == 1,
            Framing::Axfr | Framing::Ixfr => self.records >= 2,
        }
    }

    /// Collects all records of the stream.
    ///
    /// Returns the producer's error if it failed and
    /// [`XfrError::Truncated`] if the stream ended early otherwise.
    pub async fn collect_records(mut self) -> Result<Vec<Record>, XfrError> {
        let mut res = Vec::new();
        while let Some(batch) = self.next().await {
            res.extend(batch);
        }
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        if self.is_complete() {
            Ok(res)
        } else {
            Err(XfrError::Truncated)
        }
    }
}

impl Stream for XfrStream {
    type Item = XfrBatch;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(batch))) => {
                this.records += batch.len();
                if let Some(last) = batch.last() {
                    this.last_rtype = Some(last.rtype());
                }
                Poll::Ready(Some(batch))
            }
            Poll::Ready(Some(Err(err))) => {
                this.error = Some(err);
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

//============ Testing =======================================================
