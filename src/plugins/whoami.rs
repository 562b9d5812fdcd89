//! The `whoami` plugin.
//!
//! Tells the client what its address, port and transport look like from
//! here. The address is returned as an A or AAAA record, port and
//! transport as an SRV record, both in the additional section.

use std::sync::Arc;

use crate::base::{Record, RecordData, Request, Response, Srv, Ttl};
use crate::chain::{Outcome, PluginNode, ProcessFuture, SetupContext, SetupError};
use crate::config::Directive;

pub const NAME: &str = "whoami";

#[derive(Debug, Default)]
pub struct WhoamiNode;

pub fn setup(
    directive: &Directive,
    _ctx: &SetupContext,
) -> Result<Arc<dyn PluginNode>, SetupError> {
    if !directive.args.is_empty() {
        return Err(SetupError::new(NAME, "unexpected arguments"));
    }
    Ok(Arc::new(WhoamiNode))
}

impl PluginNode for WhoamiNode {
    fn name(&self) -> &str {
        NAME
    }

    fn process<'a>(
        &'a self,
        request: &'a Request,
        response: &'a mut Response,
    ) -> ProcessFuture<'a> {
        Box::pin(async move {
            let qname = request.qname();
            let client = request.client();
            response.set_authoritative(true);
            response.push_additional(Record::new(
                qname.clone(),
                Ttl::default(),
                RecordData::from_ip(client.ip()),
            ));
            if let Ok(owner) =
                qname.prepend(&format!("_{}", request.transport()))
            {
                response.push_additional(Record::new(
                    owner,
                    Ttl::default(),
                    RecordData::Srv(Srv::new(0, 0, client.port(), qname.clone())),
                ));
            }
            Outcome::Handled
        })
    }
}
