//! The `log` plugin logs every query it sees.

use std::sync::Arc;

use tracing::info;

use crate::base::{Request, Response};
use crate::chain::{Outcome, PluginNode, ProcessFuture, SetupContext, SetupError};
use crate::config::Directive;

pub const NAME: &str = "log";

#[derive(Debug, Default)]
pub struct LogNode;

pub fn setup(
    directive: &Directive,
    _ctx: &SetupContext,
) -> Result<Arc<dyn PluginNode>, SetupError> {
    if !directive.args.is_empty() {
        return Err(SetupError::new(NAME, "unexpected arguments"));
    }
    Ok(Arc::new(LogNode))
}

impl PluginNode for LogNode {
    fn name(&self) -> &str {
        NAME
    }

    fn process<'a>(
        &'a self,
        request: &'a Request,
        _response: &'a mut Response,
    ) -> ProcessFuture<'a> {
        Box::pin(async move {
            info!(
                plugin = NAME,
                "{} - {} \"{} {} {}\"",
                request.client(),
                request.id(),
                request.qtype(),
                request.qclass(),
                request.qname(),
            );
            Outcome::Delegate
        })
    }
}
