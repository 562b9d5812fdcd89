//! Basic DNS data handling.
//!
//! This module contains the logical data model shared by all other parts
//! of the crate: domain names, the handful of IANA registries the server
//! core needs, serial numbers, resource records and the request and
//! response types that travel through the plugin chain.

pub mod iana;
pub mod message;
pub mod name;
pub mod record;
pub mod serial;

pub use self::iana::{Class, Opcode, Rcode, Rtype};
pub use self::message::{Request, Response, TransportKind};
pub use self::name::{Name, NameError};
pub use self::record::{Record, RecordData, Soa, Srv, Ttl};
pub use self::serial::Serial;
