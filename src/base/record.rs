//! Resource records.
//!
//! This is the logical record model. The wire encoding of records belongs
//! to the message codec and is not handled here.

use core::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use super::iana::{Class, Rtype};
use super::name::Name;
use super::serial::Serial;

//------------ Ttl -----------------------------------------------------------

/// A time-to-live value in seconds.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Ttl(u32);

impl Ttl {
    /// Creates a TTL from a number of seconds.
    pub const fn from_secs(secs: u32) -> Self {
        Ttl(secs)
    }

    /// Returns the TTL as a number of seconds.
    pub const fn as_secs(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//------------ Soa -----------------------------------------------------------

/// The data of an SOA record.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Soa {
    pub mname: Name,
    pub rname: Name,
    pub serial: Serial,
    pub refresh: Ttl,
    pub retry: Ttl,
    pub expire: Ttl,
    pub minimum: Ttl,
}

//------------ Srv -----------------------------------------------------------

/// The data of an SRV record.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Srv {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: Name,
}

impl Srv {
    pub fn new(priority: u16, weight: u16, port: u16, target: Name) -> Self {
        Srv {
            priority,
            weight,
            port,
            target,
        }
    }
}

//------------ RecordData ----------------------------------------------------

/// The record data the server core knows how to synthesize.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum RecordData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ns(Name),
    Cname(Name),
    Soa(Soa),
    Srv(Srv),
}

impl RecordData {
    /// Returns the record type of the data.
    pub fn rtype(&self) -> Rtype {
        match self {
            RecordData::A(_) => Rtype::A,
            RecordData::Aaaa(_) => Rtype::AAAA,
            RecordData::Ns(_) => Rtype::NS,
            RecordData::Cname(_) => Rtype::CNAME,
            RecordData::Soa(_) => Rtype::SOA,
            RecordData::Srv(_) => Rtype::SRV,
        }
    }

    /// Returns the address record type for an IP address.
    pub fn from_ip(addr: std::net::IpAddr) -> Self {
        match addr {
            std::net::IpAddr::V4(addr) => RecordData::A(addr),
            std::net::IpAddr::V6(addr) => RecordData::Aaaa(addr),
        }
    }

    /// Returns the domain name embedded in the data, if any.
    pub fn target(&self) -> Option<&Name> {
        match self {
            RecordData::Ns(name) | RecordData::Cname(name) => Some(name),
            RecordData::Srv(srv) => Some(&srv.target),
            _ => None,
        }
    }

    /// Replaces the suffix `from` with `to` in all embedded names.
    ///
    /// Returns `None` if an embedded name lives outside of `from`. SOA
    /// data is returned unchanged.
    pub fn reroot(&self, from: &Name, to: &Name) -> Option<Self> {
        Some(match self {
            RecordData::Ns(name) => RecordData::Ns(name.reroot(from, to)?),
            RecordData::Cname(name) => {
                RecordData::Cname(name.reroot(from, to)?)
            }
            RecordData::Srv(srv) => RecordData::Srv(Srv {
                target: srv.target.reroot(from, to)?,
                ..srv.clone()
            }),
            other => other.clone(),
        })
    }
}

impl fmt::Display for RecordData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordData::A(addr) => write!(f, "{addr}"),
            RecordData::Aaaa(addr) => write!(f, "{addr}"),
            RecordData::Ns(name) | RecordData::Cname(name) => {
                write!(f, "{name}")
            }
            RecordData::Soa(soa) => write!(
                f,
                "{} {} {} {} {} {} {}",
                soa.mname,
                soa.rname,
                soa.serial,
                soa.refresh,
                soa.retry,
                soa.expire,
                soa.minimum
            ),
            RecordData::Srv(srv) => write!(
                f,
                "{} {} {} {}",
                srv.priority, srv.weight, srv.port, srv.target
            ),
        }
    }
}

//------------ Record --------------------------------------------------------

/// A resource record.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Record {
    owner: Name,
    class: Class,
    ttl: Ttl,
    data: RecordData,
}

impl Record {
    /// Creates a new record of class IN.
    pub fn new(owner: Name, ttl: Ttl, data: RecordData) -> Self {
        Record {
            owner,
            class: Class::IN,
            ttl,
            data,
        }
    }

    pub fn owner(&self) -> &Name {
        &self.owner
    }

    pub fn class(&self) -> Class {
        self.class
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn data(&self) -> &RecordData {
        &self.data
    }

    pub fn rtype(&self) -> Rtype {
        self.data.rtype()
    }

    /// Returns the SOA data if this is an SOA record.
    pub fn as_soa(&self) -> Option<&Soa> {
        match &self.data {
            RecordData::Soa(soa) => Some(soa),
            _ => None,
        }
    }

    /// Moves the record from under `from` to under `to`.
    ///
    /// Both the owner and any embedded names are re-rooted. Returns `None`
    /// if any of these names isn't under `from`.
    pub fn reroot(&self, from: &Name, to: &Name) -> Option<Self> {
        Some(Record {
            owner: self.owner.reroot(from, to)?,
            class: self.class,
            ttl: self.ttl,
            data: self.data.reroot(from, to)?,
        })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.owner,
            self.ttl,
            self.class,
            self.rtype(),
            self.data
        )
    }
}

//============ Testing =======================================================
