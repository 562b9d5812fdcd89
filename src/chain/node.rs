use core::fmt;
use core::future::Future;
use core::pin::Pin;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::base::{Request, Response, Rtype};
use crate::xfr::TransferPolicy;
use crate::zonetree::ZoneAuthority;

use super::SetupError;

/// The future returned by [`PluginNode::process`].
pub type ProcessFuture<'a> =
    Pin<Box<dyn Future<Output = Outcome> + Send + 'a>>;

//------------ PluginNode ----------------------------------------------------

/// A single handler in a request processing chain.
pub trait PluginNode: fmt::Debug + Send + Sync {
    /// Returns the directive name of the node.
    fn name(&self) -> &str;

    /// Processes a request.
    ///
    /// The node may add records to `response` and decides through the
    /// returned [`Outcome`] whether processing continues. A node returning
    /// [`Outcome::Delegate`] must leave `response` alone.
    fn process<'a>(
        &'a self,
        request: &'a Request,
        response: &'a mut Response,
    ) -> ProcessFuture<'a>;

    /// Returns whether the node is ready to serve.
    fn is_ready(&self) -> bool {
        true
    }

    /// Runs the startup checks of the node.
    ///
    /// This is called once per generation before it goes live. An error
    /// fails the whole generation.
    fn startup(&self) -> Result<(), SetupError> {
        Ok(())
    }

    /// Releases the background resources of the node.
    ///
    /// This is called once the generation the node belongs to has been
    /// replaced.
    fn shutdown(&self) {}

    /// Returns the authority whose origins this node can transfer.
    fn transfer_authority(&self) -> Option<Arc<ZoneAuthority>> {
        None
    }

    /// Returns the transfer policy this node contributes.
    fn transfer_policy(&self) -> Option<TransferPolicy> {
        None
    }
}

//------------ Outcome -------------------------------------------------------

/// What a node wants to happen after it processed a request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The response is final.
    Handled,

    /// Continue with the next node, but only for the given record types.
    ///
    /// What the node added to the response so far is kept.
    NextWithFallthrough(RtypeSet),

    /// The node didn't touch the request, pass it on.
    Delegate,
}

//------------ RtypeSet ------------------------------------------------------

/// A set of record types.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RtypeSet {
    all: bool,
    types: SmallVec<[Rtype; 4]>,
}

impl RtypeSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set containing every record type.
    pub fn all() -> Self {
        RtypeSet {
            all: true,
            types: SmallVec::new(),
        }
    }

    pub fn insert(&mut self, rtype: Rtype) {
        if !self.all && !self.types.contains(&rtype) {
            self.types.push(rtype)
        }
    }

    pub fn contains(&self, rtype: Rtype) -> bool {
        self.all || self.types.contains(&rtype)
    }

    pub fn is_all(&self) -> bool {
        self.all
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.types.is_empty()
    }
}

impl FromIterator<Rtype> for RtypeSet {
    fn from_iter<I: IntoIterator<Item = Rtype>>(iter: I) -> Self {
        let mut res = Self::new();
        for rtype in iter {
            res.insert(rtype);
        }
        res
    }
}

impl<const N: usize> From<[Rtype; N]> for RtypeSet {
    fn from(types: [Rtype; N]) -> Self {
        types.into_iter().collect()
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rtype_sets() {
        let set = RtypeSet::from([Rtype::A, Rtype::AAAA, Rtype::A]);
        assert!(set.contains(Rtype::A));
        assert!(!set.contains(Rtype::SRV));
        assert!(!set.is_empty());
        assert!(RtypeSet::all().contains(Rtype::SRV));
        assert!(RtypeSet::new().is_empty());
    }
}
