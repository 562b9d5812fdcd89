//! The plugin chain dispatcher.
//!
//! Every server block of the configuration becomes a [`Chain`]: an ordered
//! list of [`PluginNode`]s serving the block's zones. The [`Dispatcher`]
//! picks the chain for a request by longest zone match and walks its nodes
//! until one of them returns a terminal [`Outcome`].
//!
//! Zone transfer requests never enter the chain. The dispatcher hands them
//! straight to the transfer engine of the chain serving the origin.
//!
//! Nodes are created from configuration directives by a [`PluginRegistry`]
//! and ordered by its [`Directives`] table.

mod dispatcher;
mod metrics;
mod node;
mod ready;
mod registry;

use core::fmt;

use crate::base::Name;

pub use self::dispatcher::{Chain, Dispatcher, Routed};
pub use self::metrics::{DispatchMetrics, MetricsSnapshot};
pub use self::node::{Outcome, PluginNode, ProcessFuture, RtypeSet};
pub use self::ready::{ReadinessRegistry, ReadinessReport};
pub use self::registry::{Directives, PluginRegistry, SetupContext, SetupFn};

//============ Error Types ===================================================

//------------ ChainError ----------------------------------------------------

/// A request could not be processed by the chains.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChainError {
    /// No node produced a terminal outcome.
    ChainExhausted,

    /// No chain serves the name.
    NoChain(Name),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::ChainExhausted => {
                f.write_str("chain exhausted without an answer")
            }
            ChainError::NoChain(qname) => write!(f, "no chain serves {qname}"),
        }
    }
}

impl std::error::Error for ChainError {}

//------------ SetupError ----------------------------------------------------

/// A plugin could not be set up from its directive.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SetupError {
    plugin: String,
    message: String,
}

impl SetupError {
    pub fn new(plugin: &str, message: impl fmt::Display) -> Self {
        SetupError {
            plugin: plugin.into(),
            message: message.to_string(),
        }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "plugin/{}: {}", self.plugin, self.message)
    }
}

impl std::error::Error for SetupError {}
