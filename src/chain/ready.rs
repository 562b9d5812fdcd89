use core::fmt;
use std::sync::Arc;

use super::node::PluginNode;

//------------ ReadinessRegistry ---------------------------------------------

/// The nodes contributing to the readiness of one generation.
///
/// Nodes sharing a name are reported under that name once. The registry
/// is built from scratch for every generation and never changes after.
#[derive(Clone, Default)]
pub struct ReadinessRegistry {
    entries: Vec<(String, Vec<Arc<dyn PluginNode>>)>,
}

impl ReadinessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry from nodes in chain order.
    pub fn from_nodes<'a>(
        nodes: impl IntoIterator<Item = &'a Arc<dyn PluginNode>>,
    ) -> Self {
        let mut res = Self::new();
        for node in nodes {
            res.register(node.clone());
        }
        res
    }

    fn register(&mut self, node: Arc<dyn PluginNode>) {
        match self.entries.iter_mut().find(|(name, _)| name == node.name()) {
            Some((_, nodes)) => nodes.push(node),
            None => self.entries.push((node.name().into(), vec![node])),
        }
    }

    /// Returns the current readiness.
    pub fn report(&self) -> ReadinessReport {
        let mut report = ReadinessReport {
            ready: true,
            nodes: Vec::with_capacity(self.entries.len()),
            not_ready: Vec::new(),
        };
        for (name, nodes) in &self.entries {
            report.nodes.push(name.clone());
            if !nodes.iter().all(|node| node.is_ready()) {
                report.ready = false;
                report.not_ready.push(name.clone());
            }
        }
        report
    }
}

impl fmt::Debug for ReadinessRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

//------------ ReadinessReport -----------------------------------------------

/// The readiness of the live generation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReadinessReport {
    /// Whether all nodes are ready.
    pub ready: bool,

    /// The names of all contributing nodes, each listed once.
    pub nodes: Vec<String>,

    /// The names of the nodes that aren't ready, each listed once.
    pub not_ready: Vec<String>,
}

impl ReadinessReport {
    /// Returns the body of the readiness endpoint's response.
    ///
    /// This is `OK` if all nodes are ready and the comma separated names
    /// of the nodes that aren't otherwise.
    pub fn body(&self) -> String {
        if self.ready {
            "OK".into()
        } else {
            self.not_ready.join(",")
        }
    }
}
