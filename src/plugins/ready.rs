//! The `ready` plugin.
//!
//! Declares the address the readiness endpoint of the server listens on.
//! The endpoint itself reports the readiness of the live generation, see
//! [`ReloadCoordinator::readiness`][crate::reload::ReloadCoordinator::readiness].

use std::net::SocketAddr;
use std::sync::Arc;

use crate::base::{Request, Response};
use crate::chain::{Outcome, PluginNode, ProcessFuture, SetupContext, SetupError};
use crate::config::Directive;

pub const NAME: &str = "ready";

/// The address used if none is given.
pub const DEFAULT_ADDR: &str = "0.0.0.0:8181";

#[derive(Debug)]
pub struct ReadyNode {
    addr: SocketAddr,
}

impl ReadyNode {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

pub fn setup(
    directive: &Directive,
    _ctx: &SetupContext,
) -> Result<Arc<dyn PluginNode>, SetupError> {
    let addr = match directive.args.as_slice() {
        [] => DEFAULT_ADDR,
        [addr] => addr.as_str(),
        _ => return Err(SetupError::new(NAME, "expected at most one address")),
    };
    let addr = addr.parse().map_err(|_| {
        SetupError::new(NAME, format!("invalid address '{addr}'"))
    })?;
    Ok(Arc::new(ReadyNode { addr }))
}

impl PluginNode for ReadyNode {
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
}
