//! Zone transfers.
//!
//! The [`TransferEngine`] turns a [`TransferRequest`] into an [`XfrStream`]
//! of record batches. Full transfers start and end with the SOA record of
//! the origin. A stream that ends without the closing SOA is a failed
//! transfer; see [`XfrStream::is_complete`]. If the record source fails
//! mid-transfer, the records not yet sent are dropped and the stream ends
//! with the error.
//!
//! Records are produced by a background task that feeds a bounded channel.
//! The task suspends while the channel is full and stops as soon as the
//! stream is dropped, so arbitrarily large zones can be transferred without
//! holding them in memory.

mod batcher;
mod engine;
mod policy;
mod stream;

use core::fmt;
use std::net::{IpAddr, Ipv4Addr};

use serde::Deserialize;

use crate::base::{Name, Request, Rtype, Serial};
use crate::source::SourceError;
use crate::zonetree::AuthorityError;

pub use self::batcher::{BatcherClosed, RecordBatcher};
pub use self::engine::TransferEngine;
pub use self::policy::{PolicyError, TransferPolicy};
pub use self::stream::{Framing, XfrBatch, XfrItem, XfrStream};

//------------ XfrConfig -----------------------------------------------------

/// Tuning knobs for zone transfers.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct XfrConfig {
    /// The maximum number of records in a single batch.
    pub batch_size: usize,

    /// The number of batches that may be queued for a slow consumer.
    pub channel_capacity: usize,

    /// The maximum number of transfers producing records at once.
    pub max_concurrent: usize,
}

impl Default for XfrConfig {
    fn default() -> Self {
        XfrConfig {
            batch_size: 100,
            channel_capacity: 4,
            max_concurrent: 8,
        }
    }
}

//------------ TransferRequest -----------------------------------------------

/// A request to transfer one origin.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransferRequest {
    origin: Name,

    /// The serial the client has. `None` asks for a full transfer.
    serial: Option<Serial>,

    client: IpAddr,
}

impl TransferRequest {
    /// Creates a request for the changes since `serial`.
    pub fn new(origin: Name, serial: Serial) -> Self {
        TransferRequest {
            origin,
            serial: Some(serial),
            client: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }

    /// Creates a request for the full zone.
    pub fn full(origin: Name) -> Self {
        TransferRequest {
            origin,
            serial: None,
            client: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }

    /// Creates the transfer request carried by a query.
    ///
    /// Returns `None` if the query isn't an AXFR or IXFR query.
    pub fn from_request(request: &Request) -> Option<Self> {
        if !request.is_xfr() {
            return None;
        }
        let serial = match request.qtype() {
            Rtype::IXFR => request.ixfr_serial(),
            _ => None,
        };
        Some(TransferRequest {
            origin: request.qname().clone(),
            serial,
            client: request.client().ip(),
        })
    }

    pub fn with_client(mut self, client: IpAddr) -> Self {
        self.client = client;
        self
    }

    pub fn origin(&self) -> &Name {
        &self.origin
    }

    pub fn serial(&self) -> Option<Serial> {
        self.serial
    }

    pub fn client(&self) -> IpAddr {
        self.client
    }
}

//============ Error Types ===================================================

//------------ XfrError ------------------------------------------------------

/// A zone transfer failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum XfrError {
    /// The origin isn't served here.
    NotAuthoritative(Name),

    /// The transfer policy denies this client.
    Refused { origin: Name, client: IpAddr },

    /// The record source failed.
    BackendUnavailable(SourceError),

    /// The stream ended without its closing SOA record.
    Truncated,
}

impl From<SourceError> for XfrError {
    fn from(err: SourceError) -> Self {
        XfrError::BackendUnavailable(err)
    }
}

impl From<AuthorityError> for XfrError {
    fn from(err: AuthorityError) -> Self {
        match err {
            AuthorityError::NotAuthoritative(apex) => {
                XfrError::NotAuthoritative(apex)
            }
            AuthorityError::Source(err) => XfrError::BackendUnavailable(err),
        }
    }
}

impl fmt::Display for XfrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            XfrError::NotAuthoritative(origin) => {
                write!(f, "not authoritative for {origin}")
            }
            XfrError::Refused { origin, client } => {
                write!(f, "transfer of {origin} to {client} refused")
            }
            XfrError::BackendUnavailable(err) => {
                write!(f, "transfer aborted: {err}")
            }
            XfrError::Truncated => f.write_str("transfer truncated"),
        }
    }
}

impl std::error::Error for XfrError {}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::TransportKind;

    #[test]
    fn requests_from_queries() {
        let apex = Name::new("cluster.local").unwrap();
        let client = "10.1.2.3:5300".parse().unwrap();

        let axfr = Request::axfr(apex.clone()).with_client(client);
        let req = TransferRequest::from_request(&axfr).unwrap();
        assert_eq!(req.origin(), &apex);
        assert_eq!(req.serial(), None);
        assert_eq!(req.client(), client.ip());

        let ixfr = Request::ixfr(apex.clone(), Serial(3));
        let req = TransferRequest::from_request(&ixfr).unwrap();
        assert_eq!(req.serial(), Some(Serial(3)));

        let query = Request::new(apex, Rtype::SOA)
            .with_transport(TransportKind::Tcp);
        assert_eq!(TransferRequest::from_request(&query), None);
    }
}
