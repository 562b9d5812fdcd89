//! The `transfer` plugin.
//!
//! Permits zone transfers. The arguments list the zones the rule covers,
//! defaulting to all zones of the server block. The `to` option lists the
//! client addresses that may transfer, `*` permits everyone.
//!
//! Without this plugin in a chain, all transfers are refused.

use std::sync::Arc;

use crate::base::{Request, Response};
use crate::chain::{Outcome, PluginNode, ProcessFuture, SetupContext, SetupError};
use crate::config::Directive;
use crate::xfr::TransferPolicy;

use super::parse_zones;

pub const NAME: &str = "transfer";

#[derive(Debug)]
pub struct TransferNode {
    policy: TransferPolicy,
}

pub fn setup(
    directive: &Directive,
    ctx: &SetupContext,
) -> Result<Arc<dyn PluginNode>, SetupError> {
    let zones = parse_zones(NAME, &directive.args, ctx)?;
    let to = directive
        .option("to")
        .ok_or_else(|| SetupError::new(NAME, "missing 'to' option"))?;
    let mut policy = TransferPolicy::deny_all();
    policy
        .allow(zones, to)
        .map_err(|err| SetupError::new(NAME, err))?;
    if let Some(key) = directive.options.keys().find(|key| *key != "to") {
        return Err(SetupError::new(NAME, format!("unknown option '{key}'")));
    }
    Ok(Arc::new(TransferNode { policy }))
}

impl PluginNode for TransferNode {
    fn name(&self) -> &str {
        NAME
    }

    fn process<'a>(
        &'a self,
        _request: &'a Request,
        _response: &'a mut Response,
    ) -> ProcessFuture<'a> {
        Box::pin(async { Outcome::Delegate })
    }

    fn transfer_policy(&self) -> Option<TransferPolicy> {
        Some(self.policy.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::Name;
    use crate::source::SnapshotStore;

    fn run(directive: Directive) -> Result<Arc<dyn PluginNode>, SetupError> {
        let zones = [Name::new("cluster.local").unwrap()];
        let backend = Arc::new(SnapshotStore::new());
        let ctx = SetupContext {
            zones: &zones,
            listen: &[],
            backend: &backend,
        };
        setup(&directive, &ctx)
    }

    #[test]
    fn policy_from_directive() {
        let node = run(Directive::new(NAME).with_option("to", ["10.0.0.1"])).unwrap();
        let policy = node.transfer_policy().unwrap();
        let zone = Name::new("cluster.local").unwrap();
        assert!(policy.permits(&zone, "10.0.0.1".parse().unwrap()));
        assert!(!policy.permits(&zone, "10.0.0.2".parse().unwrap()));
    }

    #[test]
    fn bad_directives() {
        assert!(run(Directive::new(NAME)).is_err());
        assert!(run(Directive::new(NAME)
            .with_args(["example.test."])
            .with_option("to", ["*"]))
        .is_err());
        assert!(run(Directive::new(NAME)
            .with_option("to", ["*"])
            .with_option("from", ["*"]))
        .is_err());
    }
}
