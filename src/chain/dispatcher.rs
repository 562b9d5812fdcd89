use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::base::{Name, Rcode, Request, Response};
use crate::xfr::{TransferEngine, TransferRequest, XfrConfig, XfrError, XfrStream};

use super::metrics::DispatchMetrics;
use super::node::{Outcome, PluginNode, RtypeSet};
use super::ready::{ReadinessRegistry, ReadinessReport};
use super::{ChainError, SetupError};
use crate::zonetree::OriginTree;

//------------ Chain ---------------------------------------------------------

/// The ordered nodes serving the zones of one server block.
#[derive(Debug)]
pub struct Chain {
    zones: Vec<Name>,
    nodes: Vec<Arc<dyn PluginNode>>,
    transfer: Option<TransferEngine>,
}

impl Chain {
    /// Creates a chain from nodes already in directive order.
    ///
    /// If any node can transfer zones, the chain gets a transfer engine
    /// using the policy of the first node providing one. Without such a
    /// node all transfers are refused.
    pub fn new(
        zones: Vec<Name>,
        nodes: Vec<Arc<dyn PluginNode>>,
        xfr: XfrConfig,
    ) -> Self {
        let authorities: Vec<_> = nodes
            .iter()
            .filter_map(|node| node.transfer_authority())
            .collect();
        let transfer = if authorities.is_empty() {
            None
        } else {
            let policy = nodes
                .iter()
                .find_map(|node| node.transfer_policy())
                .unwrap_or_default();
            Some(TransferEngine::new(authorities, policy, xfr))
        };
        Chain {
            zones,
            nodes,
            transfer,
        }
    }

    pub fn zones(&self) -> &[Name] {
        &self.zones
    }

    pub fn nodes(&self) -> &[Arc<dyn PluginNode>] {
        &self.nodes
    }

    pub fn transfer_engine(&self) -> Option<&TransferEngine> {
        self.transfer.as_ref()
    }

    /// Runs a request through the nodes of the chain.
    pub async fn process(
        &self,
        request: &Request,
    ) -> Result<Response, ChainError> {
        let mut response = Response::for_request(request);

        // The answer records to keep and the types later nodes may add.
        let mut fallthrough: Option<(usize, RtypeSet)> = None;

        for node in &self.nodes {
            let outcome = node.process(request, &mut response).await;
            if let Some((keep, allowed)) = &fallthrough {
                restrict_answer(&mut response, *keep, allowed);
            }
            match outcome {
                Outcome::Handled => {
                    trace!(plugin = node.name(), "Handled {}", request.qname());
                    return Ok(response);
                }
                Outcome::Delegate => {}
                Outcome::NextWithFallthrough(allowed) => {
                    if !allowed.contains(request.qtype()) {
                        trace!(
                            plugin = node.name(),
                            "No fallthrough for {} {}",
                            request.qname(),
                            request.qtype()
                        );
                        return Ok(response);
                    }
                    trace!(
                        plugin = node.name(),
                        "Falling through for {} {}",
                        request.qname(),
                        request.qtype()
                    );
                    fallthrough = Some((response.answer().len(), allowed));
                }
            }
        }
        Err(ChainError::ChainExhausted)
    }
}

/// Drops answer records after the first `keep` not in `allowed`.
fn restrict_answer(response: &mut Response, keep: usize, allowed: &RtypeSet) {
    let mut idx = 0;
    response.retain_answer(|record| {
        idx += 1;
        idx <= keep || allowed.contains(record.rtype())
    });
}

//------------ Routed --------------------------------------------------------

/// The result of routing a request.
#[derive(Debug)]
pub enum Routed {
    /// A single response message.
    Response(Response),

    /// A zone transfer.
    Transfer(XfrStream),
}

impl Routed {
    pub fn into_response(self) -> Option<Response> {
        match self {
            Routed::Response(response) => Some(response),
            Routed::Transfer(_) => None,
        }
    }

    pub fn into_transfer(self) -> Option<XfrStream> {
        match self {
            Routed::Response(_) => None,
            Routed::Transfer(stream) => Some(stream),
        }
    }
}

//------------ Dispatcher ----------------------------------------------------

/// Routes requests to the chain serving them.
#[derive(Debug)]
pub struct Dispatcher {
    chains: Vec<Chain>,

    /// The chains per zone in declaration order.
    routes: OriginTree<Vec<usize>>,

    readiness: ReadinessRegistry,
    metrics: Arc<DispatchMetrics>,
}

impl Dispatcher {
    pub fn new(chains: Vec<Chain>, metrics: Arc<DispatchMetrics>) -> Self {
        let mut routes: OriginTree<Vec<usize>> = OriginTree::new();
        for (idx, chain) in chains.iter().enumerate() {
            for zone in &chain.zones {
                match routes.get_mut(zone) {
                    Some(idxs) => idxs.push(idx),
                    None => {
                        // Can't fail, we just checked.
                        let _ = routes.insert(zone.clone(), vec![idx]);
                    }
                }
            }
        }
        let readiness = ReadinessRegistry::from_nodes(
            chains.iter().flat_map(|chain| chain.nodes.iter()),
        );
        Dispatcher {
            chains,
            routes,
            readiness,
            metrics,
        }
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    /// Returns all nodes of all chains.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<dyn PluginNode>> + '_ {
        self.chains.iter().flat_map(|chain| chain.nodes.iter())
    }

    /// Returns the chain serving `qname`.
    ///
    /// The chain with the longest matching zone wins. If several chains
    /// serve that zone, the first one declared wins.
    pub fn find_chain(&self, qname: &Name) -> Option<&Chain> {
        let (_, idxs) = self.routes.find(qname)?;
        self.chains.get(*idxs.first()?)
    }

    /// Runs the startup hooks of all nodes.
    pub fn startup(&self) -> Result<(), SetupError> {
        for node in self.nodes() {
            node.startup()?;
        }
        Ok(())
    }

    /// Runs the shutdown hooks of all nodes.
    pub fn shutdown(&self) {
        for node in self.nodes() {
            node.shutdown();
        }
    }

    /// Returns the readiness of all nodes.
    pub fn readiness(&self) -> ReadinessReport {
        self.readiness.report()
    }

    /// Processes a request.
    pub async fn route(&self, request: &Request) -> Routed {
        self.metrics.inc_requests();

        // Transfers of origins nobody serves are answered with NOTAUTH.
        if let Some(xfr) = TransferRequest::from_request(request) {
            return match self.transfer(xfr).await {
                Ok(stream) => Routed::Transfer(stream),
                Err(err) => {
                    let rcode = match err {
                        XfrError::NotAuthoritative(_) => Rcode::NOTAUTH,
                        XfrError::Refused { .. } => Rcode::REFUSED,
                        _ => Rcode::SERVFAIL,
                    };
                    Routed::Response(Response::with_rcode(request, rcode))
                }
            };
        }

        let Some(chain) = self.find_chain(request.qname()) else {
            self.metrics.inc_no_chain();
            debug!("{}", ChainError::NoChain(request.qname().clone()));
            return Routed::Response(Response::refused(request));
        };

        match chain.process(request).await {
            Ok(response) => {
                self.metrics.inc_handled();
                Routed::Response(response)
            }
            Err(err) => {
                self.metrics.inc_chain_exhausted();
                warn!("{err} for {} {}", request.qname(), request.qtype());
                Routed::Response(Response::servfail(request))
            }
        }
    }

    /// Starts a zone transfer.
    pub async fn transfer(
        &self,
        req: TransferRequest,
    ) -> Result<XfrStream, XfrError> {
        match self.find_chain(req.origin()) {
            Some(chain) => self.transfer_with(chain, req).await,
            None => {
                self.metrics.inc_no_chain();
                self.metrics.inc_transfers_refused();
                debug!("{}", ChainError::NoChain(req.origin().clone()));
                Err(XfrError::NotAuthoritative(req.origin().clone()))
            }
        }
    }

    async fn transfer_with(
        &self,
        chain: &Chain,
        req: TransferRequest,
    ) -> Result<XfrStream, XfrError> {
        let res = match chain.transfer_engine() {
            Some(engine) => engine.transfer(req).await,
            None => Err(XfrError::NotAuthoritative(req.origin().clone())),
        };
        match &res {
            Ok(_) => self.metrics.inc_transfers_started(),
            Err(err) => {
                debug!("Transfer failed: {err}");
                self.metrics.inc_transfers_refused()
            }
        }
        res
    }
}

//============ Testing =======================================================
