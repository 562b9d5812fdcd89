//! Listening sockets that survive reloads.

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpListener, UdpSocket};
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::debug;

use crate::base::TransportKind;
use crate::config::ListenAddr;

/// The backlog of TCP listeners.
const TCP_BACKLOG: i32 = 1024;

//------------ BoundSocket ---------------------------------------------------

/// A socket bound to one configured listen address.
#[derive(Clone, Debug)]
pub enum BoundSocket {
    Udp(Arc<UdpSocket>),
    Tcp(Arc<TcpListener>),
}

impl BoundSocket {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        match self {
            BoundSocket::Udp(sock) => sock.local_addr(),
            BoundSocket::Tcp(sock) => sock.local_addr(),
        }
    }

    /// Returns whether both refer to the very same socket.
    pub fn same_socket(&self, other: &BoundSocket) -> bool {
        match (self, other) {
            (BoundSocket::Udp(a), BoundSocket::Udp(b)) => Arc::ptr_eq(a, b),
            (BoundSocket::Tcp(a), BoundSocket::Tcp(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

//------------ ListenerSet ---------------------------------------------------

/// The sockets of a generation keyed by their configured address.
///
/// A new generation takes over the sockets of the previous one for every
/// address both configure, so no connection is refused during a reload.
/// Only addresses new to the configuration are bound, with address reuse
/// enabled so that sockets of a generation still draining don't get in
/// the way.
#[derive(Clone, Debug, Default)]
pub struct ListenerSet {
    sockets: HashMap<ListenAddr, BoundSocket>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds all addresses, taking over sockets from `previous`.
    pub fn bind<'a>(
        addrs: impl IntoIterator<Item = &'a ListenAddr>,
        previous: Option<&ListenerSet>,
    ) -> Result<Self, (ListenAddr, io::Error)> {
        let mut res = Self::new();
        for addr in addrs {
            if res.sockets.contains_key(addr) {
                continue;
            }
            let sock = match previous.and_then(|prev| prev.sockets.get(addr)) {
                Some(sock) => {
                    debug!("Taking over listener {addr}");
                    sock.clone()
                }
                None => {
                    let sock = bind_socket(addr).map_err(|err| (*addr, err))?;
                    debug!("Bound listener {addr}");
                    sock
                }
            };
            res.sockets.insert(*addr, sock);
        }
        Ok(res)
    }

    pub fn get(&self, addr: &ListenAddr) -> Option<&BoundSocket> {
        self.sockets.get(addr)
    }

    /// Returns the address a configured listener is actually bound to.
    pub fn local_addr(&self, addr: &ListenAddr) -> Option<SocketAddr> {
        self.get(addr).and_then(|sock| sock.local_addr().ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ListenAddr, &BoundSocket)> + '_ {
        self.sockets.iter()
    }

    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }
}

fn bind_socket(addr: &ListenAddr) -> io::Result<BoundSocket> {
    let domain = Domain::for_address(addr.addr);
    match addr.transport {
        TransportKind::Udp => {
            let sock = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
            sock.set_reuse_address(true)?;
            sock.bind(&addr.addr.into())?;
            sock.set_nonblocking(true)?;
            Ok(BoundSocket::Udp(Arc::new(sock.into())))
        }
        TransportKind::Tcp | TransportKind::Tls | TransportKind::Grpc => {
            let sock = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
            sock.set_reuse_address(true)?;
            sock.bind(&addr.addr.into())?;
            sock.listen(TCP_BACKLOG)?;
            sock.set_nonblocking(true)?;
            Ok(BoundSocket::Tcp(Arc::new(sock.into())))
        }
    }
}

//============ Testing =======================================================
