use std::sync::Arc;

use crate::base::Request;
use crate::chain::{
    Chain, DispatchMetrics, Dispatcher, PluginRegistry, ReadinessReport,
    Routed,
};
use crate::config::Config;
use crate::source::SnapshotStore;

use super::listeners::ListenerSet;
use super::{ReloadError, ValidationError};

//------------ Generation ----------------------------------------------------

/// One immutable configuration of the whole server.
#[derive(Debug)]
pub struct Generation {
    id: u64,

    /// The id of the generation this one replaced.
    replaced: Option<u64>,

    config: Config,
    dispatcher: Dispatcher,
    listeners: ListenerSet,
}

impl Generation {
    /// Builds and validates a generation.
    ///
    /// Runs every check a fresh start would run: all directives must be
    /// known and set up, all startup hooks must succeed and all listen
    /// addresses must be bound. Nothing shared is modified. On error,
    /// all nodes created so far have been shut down again.
    pub(super) fn build(
        id: u64,
        config: Config,
        registry: &PluginRegistry,
        backend: &Arc<SnapshotStore>,
        metrics: Arc<DispatchMetrics>,
        previous: Option<&Generation>,
    ) -> Result<Self, ReloadError> {
        let mut chains = Vec::with_capacity(config.servers.len());
        for block in &config.servers {
            let nodes = match registry.build_nodes(block, backend) {
                Ok(nodes) => nodes,
                Err(err) => {
                    shutdown_chains(&chains);
                    return Err(err.into());
                }
            };
            chains.push(Chain::new(block.zones.clone(), nodes, config.xfr));
        }
        let dispatcher = Dispatcher::new(chains, metrics);

        if let Err(err) = dispatcher.startup() {
            dispatcher.shutdown();
            return Err(err.into());
        }

        let listeners = match ListenerSet::bind(
            config.servers.iter().flat_map(|block| block.listen.iter()),
            previous.map(|gen| &gen.listeners),
        ) {
            Ok(listeners) => listeners,
            Err((addr, err)) => {
                dispatcher.shutdown();
                return Err(ValidationError::Bind(addr, err).into());
            }
        };

        Ok(Generation {
            id,
            replaced: previous.map(|gen| gen.id),
            config,
            dispatcher,
            listeners,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn replaced(&self) -> Option<u64> {
        self.replaced
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    pub fn readiness(&self) -> ReadinessReport {
        self.dispatcher.readiness()
    }

    pub async fn route(&self, request: &Request) -> Routed {
        self.dispatcher.route(request).await
    }

    /// Releases the background resources of all nodes.
    pub(super) fn shutdown(&self) {
        self.dispatcher.shutdown()
    }
}

fn shutdown_chains(chains: &[Chain]) {
    for node in chains.iter().flat_map(|chain| chain.nodes()) {
        node.shutdown();
    }
}
