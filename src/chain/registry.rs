//! Turning plugin directives into chain nodes.

use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

use crate::base::Name;
use crate::config::{Directive, ListenAddr, ServerBlock};
use crate::source::SnapshotStore;

use super::node::PluginNode;
use super::SetupError;

//------------ Directives ----------------------------------------------------

/// The fixed order of plugins within a chain.
///
/// Nodes run in the order their directive appears here, no matter where
/// they appear in the configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Directives {
    order: Vec<String>,
}

impl Directives {
    /// The order of the plugins that come with this crate.
    pub const BUILTIN: &'static [&'static str] =
        &["root", "ready", "log", "transfer", "kubernetes", "whoami"];

    pub fn new<I, S>(order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Directives {
            order: order.into_iter().map(Into::into).collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(Self::BUILTIN.iter().copied())
    }

    /// Returns the position of a directive in the table.
    pub fn priority(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|item| item == name)
    }

    /// Appends a directive if it isn't in the table yet.
    pub fn push(&mut self, name: &str) {
        if self.priority(name).is_none() {
            self.order.push(name.into())
        }
    }

    /// Inserts a directive right before another one.
    ///
    /// If `before` is unknown, the directive is appended. A directive that
    /// is already in the table is moved.
    pub fn insert_before(&mut self, name: &str, before: &str) {
        if let Some(pos) = self.priority(name) {
            self.order.remove(pos);
        }
        match self.priority(before) {
            Some(pos) => self.order.insert(pos, name.into()),
            None => self.order.push(name.into()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(String::as_str)
    }
}

//------------ SetupContext --------------------------------------------------

/// What a plugin's setup function gets to see of its server block.
#[derive(Clone, Copy, Debug)]
pub struct SetupContext<'a> {
    /// The zones of the server block.
    pub zones: &'a [Name],

    /// The addresses the server block listens on.
    pub listen: &'a [ListenAddr],

    /// The service discovery data shared by all generations.
    pub backend: &'a Arc<SnapshotStore>,
}

//------------ SetupFn -------------------------------------------------------

/// Creates a node from its directive.
pub type SetupFn = Arc<
    dyn Fn(&Directive, &SetupContext) -> Result<Arc<dyn PluginNode>, SetupError>
        + Send
        + Sync,
>;

//------------ PluginRegistry ------------------------------------------------

/// The plugins known to a server and their order.
///
/// The registry is owned by the reload coordinator and consulted every
/// time a generation is built.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    directives: Directives,
    setups: HashMap<String, SetupFn>,
}

impl PluginRegistry {
    /// Creates a registry without any plugins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with all the plugins of this crate.
    pub fn with_builtins() -> Self {
        let mut res = PluginRegistry {
            directives: Directives::builtin(),
            setups: HashMap::new(),
        };
        crate::plugins::register_builtins(&mut res);
        res
    }

    /// Registers a plugin.
    ///
    /// Plugins not yet in the directive table are appended to it.
    pub fn register<F>(&mut self, name: &str, setup: F)
    where
        F: Fn(&Directive, &SetupContext) -> Result<Arc<dyn PluginNode>, SetupError>
            + Send
            + Sync
            + 'static,
    {
        self.directives.push(name);
        self.setups.insert(name.into(), Arc::new(setup));
    }

    /// Registers a plugin that runs right before the plugin `before`.
    pub fn register_before<F>(&mut self, name: &str, before: &str, setup: F)
    where
        F: Fn(&Directive, &SetupContext) -> Result<Arc<dyn PluginNode>, SetupError>
            + Send
            + Sync
            + 'static,
    {
        self.directives.insert_before(name, before);
        self.setups.insert(name.into(), Arc::new(setup));
    }

    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.setups.contains_key(name)
    }

    /// Creates the nodes of a server block in directive order.
    pub fn build_nodes(
        &self,
        block: &ServerBlock,
        backend: &Arc<SnapshotStore>,
    ) -> Result<Vec<Arc<dyn PluginNode>>, SetupError> {
        let ctx = SetupContext {
            zones: &block.zones,
            listen: &block.listen,
            backend,
        };
        let mut nodes = Vec::with_capacity(block.plugins.len());
        for directive in &block.plugins {
            let (Some(setup), Some(priority)) = (
                self.setups.get(&directive.name),
                self.directives.priority(&directive.name),
            ) else {
                return Err(SetupError::new(
                    &directive.name,
                    "unknown directive",
                ));
            };
            if nodes.iter().any(|(prio, _)| *prio == priority) {
                return Err(SetupError::new(
                    &directive.name,
                    "directive given more than once",
                ));
            }
            nodes.push((priority, setup(directive, &ctx)?));
        }
        nodes.sort_by_key(|(priority, _)| *priority);
        Ok(nodes.into_iter().map(|(_, node)| node).collect())
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("directives", &self.directives)
            .finish_non_exhaustive()
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{Request, Response};
    use crate::chain::{Outcome, ProcessFuture};

    #[derive(Debug)]
    struct Named(String);

    impl PluginNode for Named {
        fn name(&self) -> &str {
            &self.0
        }

        fn process<'a>(
            &'a self,
            _request: &'a Request,
            _response: &'a mut Response,
        ) -> ProcessFuture<'a> {
            Box::pin(async { Outcome::Delegate })
        }
    }

    fn registry() -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        for name in ["first", "second", "third"] {
            registry.register(name, |d: &Directive, _: &SetupContext| {
                Ok(Arc::new(Named(d.name.clone())) as Arc<dyn PluginNode>)
            });
        }
        registry
    }

    fn block(names: &[&str]) -> ServerBlock {
        names.iter().fold(
            ServerBlock::new(vec![Name::root()]),
            |block, name| block.with_plugin(Directive::new(name)),
        )
    }

    #[test]
    fn nodes_follow_directive_order() {
        let backend = Arc::new(SnapshotStore::new());
        let nodes = registry()
            .build_nodes(&block(&["third", "first", "second"]), &backend)
            .unwrap();
        let names: Vec<_> = nodes.iter().map(|n| n.name()).collect();
        assert_eq!(names, ["first", "second", "third"]);
    }

    #[test]
    fn register_before_reorders() {
        let mut registry = registry();
        registry.register_before("early", "first", |_: &Directive, _: &SetupContext| {
            Ok(Arc::new(Named("early".into())) as Arc<dyn PluginNode>)
        });
        let backend = Arc::new(SnapshotStore::new());
        let nodes = registry
            .build_nodes(&block(&["first", "early"]), &backend)
            .unwrap();
        assert_eq!(nodes[0].name(), "early");
    }

    #[test]
    fn unknown_and_duplicate_directives() {
        let backend = Arc::new(SnapshotStore::new());
        let err = registry()
            .build_nodes(&block(&["first", "invalid"]), &backend)
            .unwrap_err();
        assert_eq!(err.plugin(), "invalid");

        let err = registry()
            .build_nodes(&block(&["first", "first"]), &backend)
            .unwrap_err();
        assert_eq!(err.plugin(), "first");
    }

    #[test]
    fn builtin_directives() {
        let registry = PluginRegistry::with_builtins();
        for name in Directives::BUILTIN {
            assert!(registry.is_known(name), "{name}");
        }
        assert!(
            registry.directives().priority("log")
                < registry.directives().priority("kubernetes")
        );
    }
}
