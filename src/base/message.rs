//! Requests and responses as seen by the request processing chain.
//!
//! Messages arrive here already decoded and validated by the message codec.
//! Only the parts the chain reasons about are kept.

use core::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use super::iana::{Class, Opcode, Rcode, Rtype};
use super::name::Name;
use super::record::Record;
use super::serial::Serial;

//------------ TransportKind -------------------------------------------------

/// The transport over which a request was received.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum TransportKind {
    #[default]
    Udp,
    Tcp,
    Tls,
    Grpc,
}

impl TransportKind {
    /// Returns whether the transport is stream based.
    pub fn is_stream(self) -> bool {
        !matches!(self, TransportKind::Udp)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            TransportKind::Udp => "udp",
            TransportKind::Tcp => "tcp",
            TransportKind::Tls => "tls",
            TransportKind::Grpc => "grpc",
        })
    }
}

//------------ Request -------------------------------------------------------

/// A DNS request with a single question.
#[derive(Clone, Debug)]
pub struct Request {
    id: u16,
    opcode: Opcode,
    qname: Name,
    qtype: Rtype,
    qclass: Class,
    client: SocketAddr,
    transport: TransportKind,

    /// The serial of the SOA record in the authority section of an IXFR
    /// request.
    ixfr_serial: Option<Serial>,
}

impl Request {
    /// Creates a standard query from the local host over UDP.
    pub fn new(qname: Name, qtype: Rtype) -> Self {
        Request {
            id: 0,
            opcode: Opcode::QUERY,
            qname,
            qtype,
            qclass: Class::IN,
            client: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            transport: TransportKind::Udp,
            ixfr_serial: None,
        }
    }

    /// Creates an AXFR request.
    pub fn axfr(apex: Name) -> Self {
        Self::new(apex, Rtype::AXFR).with_transport(TransportKind::Tcp)
    }

    /// Creates an IXFR request for the given serial.
    pub fn ixfr(apex: Name, serial: Serial) -> Self {
        let mut req =
            Self::new(apex, Rtype::IXFR).with_transport(TransportKind::Tcp);
        req.ixfr_serial = Some(serial);
        req
    }

    pub fn with_id(mut self, id: u16) -> Self {
        self.id = id;
        self
    }

    pub fn with_opcode(mut self, opcode: Opcode) -> Self {
        self.opcode = opcode;
        self
    }

    pub fn with_client(mut self, client: SocketAddr) -> Self {
        self.client = client;
        self
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn qname(&self) -> &Name {
        &self.qname
    }

    pub fn qtype(&self) -> Rtype {
        self.qtype
    }

    pub fn qclass(&self) -> Class {
        self.qclass
    }

    pub fn client(&self) -> SocketAddr {
        self.client
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    pub fn ixfr_serial(&self) -> Option<Serial> {
        self.ixfr_serial
    }

    /// Returns whether this request asks for a zone transfer.
    pub fn is_xfr(&self) -> bool {
        self.opcode == Opcode::QUERY && self.qtype.is_xfr()
    }
}

//------------ Response ------------------------------------------------------

/// A DNS response under construction or finalized.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Response {
    id: u16,
    rcode: Rcode,
    authoritative: bool,
    answer: Vec<Record>,
    authority: Vec<Record>,
    additional: Vec<Record>,
}

impl Response {
    /// Starts an empty NOERROR response to the given request.
    pub fn for_request(request: &Request) -> Self {
        Response {
            id: request.id(),
            ..Default::default()
        }
    }

    /// Creates an empty response with the given response code.
    pub fn with_rcode(request: &Request, rcode: Rcode) -> Self {
        Response {
            id: request.id(),
            rcode,
            ..Default::default()
        }
    }

    pub fn servfail(request: &Request) -> Self {
        Self::with_rcode(request, Rcode::SERVFAIL)
    }

    pub fn refused(request: &Request) -> Self {
        Self::with_rcode(request, Rcode::REFUSED)
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn rcode(&self) -> Rcode {
        self.rcode
    }

    pub fn set_rcode(&mut self, rcode: Rcode) {
        self.rcode = rcode
    }

    pub fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    pub fn set_authoritative(&mut self, aa: bool) {
        self.authoritative = aa
    }

    pub fn answer(&self) -> &[Record] {
        &self.answer
    }

    pub fn authority(&self) -> &[Record] {
        &self.authority
    }

    pub fn additional(&self) -> &[Record] {
        &self.additional
    }

    pub fn push_answer(&mut self, record: Record) {
        self.answer.push(record)
    }

    pub fn push_authority(&mut self, record: Record) {
        self.authority.push(record)
    }

    pub fn push_additional(&mut self, record: Record) {
        self.additional.push(record)
    }

    /// Keeps only the answer records for which `keep` returns true.
    pub fn retain_answer(&mut self, keep: impl FnMut(&Record) -> bool) {
        self.answer.retain(keep)
    }

    /// Returns whether all sections are empty.
    pub fn is_empty(&self) -> bool {
        self.answer.is_empty()
            && self.authority.is_empty()
            && self.additional.is_empty()
    }
}
