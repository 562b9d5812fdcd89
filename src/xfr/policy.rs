use core::fmt;
use std::net::IpAddr;

use crate::base::Name;

//------------ TransferPolicy ------------------------------------------------

/// Which clients may transfer which origins.
///
/// The default policy refuses everything.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TransferPolicy {
    rules: Vec<Rule>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct Rule {
    /// The origins the rule covers. Empty means all of them.
    zones: Vec<Name>,
    to: Vec<Peer>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Peer {
    Any,
    Addr(IpAddr),
}

impl TransferPolicy {
    /// Creates a policy that refuses all transfers.
    pub fn deny_all() -> Self {
        Self::default()
    }

    /// Creates a policy that permits any client to transfer any origin.
    pub fn allow_any() -> Self {
        TransferPolicy {
            rules: vec![Rule {
                zones: Vec::new(),
                to: vec![Peer::Any],
            }],
        }
    }

    /// Adds a rule permitting the `to` peers to transfer `zones`.
    ///
    /// Peers are IP addresses or `*` for any client. An empty `zones`
    /// list covers all origins.
    pub fn allow<S: AsRef<str>>(
        &mut self,
        zones: Vec<Name>,
        to: &[S],
    ) -> Result<(), PolicyError> {
        if to.is_empty() {
            return Err(PolicyError::NoPeers);
        }
        let to = to
            .iter()
            .map(|peer| {
                let peer = peer.as_ref();
                if peer == "*" {
                    Ok(Peer::Any)
                } else {
                    peer.parse()
                        .map(Peer::Addr)
                        .map_err(|_| PolicyError::BadPeer(peer.into()))
                }
            })
            .collect::<Result<_, _>>()?;
        self.rules.push(Rule { zones, to });
        Ok(())
    }

    /// Returns whether `client` may transfer `origin`.
    pub fn permits(&self, origin: &Name, client: IpAddr) -> bool {
        self.rules.iter().any(|rule| {
            (rule.zones.is_empty() || rule.zones.contains(origin))
                && rule.to.iter().any(|peer| match peer {
                    Peer::Any => true,
                    Peer::Addr(addr) => *addr == client,
                })
        })
    }
}

//============ Error Types ===================================================

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PolicyError {
    NoPeers,
    BadPeer(String),
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PolicyError::NoPeers => f.write_str("'to' needs at least one peer"),
            PolicyError::BadPeer(peer) => {
                write!(f, "invalid transfer peer '{peer}'")
            }
        }
    }
}

impl std::error::Error for PolicyError {}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rules() {
        let zone = Name::new("cluster.local").unwrap();
        let other = Name::new("example.test").unwrap();
        let client: IpAddr = "10.0.0.5".parse().unwrap();

        assert!(!TransferPolicy::deny_all().permits(&zone, client));
        assert!(TransferPolicy::allow_any().permits(&other, client));

        let mut policy = TransferPolicy::deny_all();
        policy.allow(vec![zone.clone()], &["10.0.0.5"]).unwrap();
        assert!(policy.permits(&zone, client));
        assert!(!policy.permits(&other, client));
        assert!(!policy.permits(&zone, "10.0.0.6".parse().unwrap()));
    }

    #[test]
    fn bad_peers() {
        let mut policy = TransferPolicy::deny_all();
        assert_eq!(
            policy.allow::<&str>(vec![], &[]),
            Err(PolicyError::NoPeers)
        );
        assert_eq!(
            policy.allow(vec![], &["nope"]),
            Err(PolicyError::BadPeer("nope".into()))
        );
    }
}
