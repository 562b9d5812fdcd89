use core::fmt;

use tokio::sync::mpsc::Sender;

use crate::base::Record;

use super::stream::{XfrBatch, XfrItem};
use super::XfrError;

//------------ RecordBatcher -------------------------------------------------

/// Collects records into batches and hands them to the transfer stream.
///
/// Sending blocks the calling thread while the channel is full, so the
/// batcher must only be used from a blocking task.
pub struct RecordBatcher {
    tx: Sender<XfrItem>,
    batch: XfrBatch,
    batch_size: usize,
}

impl RecordBatcher {
    pub fn new(tx: Sender<XfrItem>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        RecordBatcher {
            tx,
            batch: Vec::with_capacity(batch_size),
            batch_size,
        }
    }

    /// Adds a record, sending the current batch if it is full.
    pub fn push(&mut self, record: Record) -> Result<(), BatcherClosed> {
        self.batch.push(record);
        if self.batch.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    pub fn extend(
        &mut self,
        records: impl IntoIterator<Item = Record>,
    ) -> Result<(), BatcherClosed> {
        for record in records {
            self.push(record)?;
        }
        Ok(())
    }

    /// Sends the last, possibly short, batch.
    pub fn finish(mut self) -> Result<(), BatcherClosed> {
        self.flush()
    }

    /// Ends the transfer with an error.
    ///
    /// Records still waiting for their batch to fill up are dropped so that
    /// nothing follows the last complete batch but the error.
    pub fn abort(mut self, err: XfrError) -> Result<(), BatcherClosed> {
        self.batch.clear();
        self.tx.blocking_send(Err(err)).map_err(|_| BatcherClosed)
    }

    /// Returns whether the receiving side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn flush(&mut self) -> Result<(), BatcherClosed> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let batch = core::mem::replace(
            &mut self.batch,
            Vec::with_capacity(self.batch_size),
        );
        self.tx.blocking_send(Ok(batch)).map_err(|_| BatcherClosed)
    }
}

//------------ BatcherClosed -------------------------------------------------

/// The consumer of a transfer went away.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BatcherClosed;

impl fmt::Display for BatcherClosed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("transfer consumer closed")
    }
}

impl std::error::Error for BatcherClosed {}

//============ Testing =======================================================
