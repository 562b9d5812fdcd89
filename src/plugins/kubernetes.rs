//! The `kubernetes` plugin.
//!
//! Serves the records synthesized from service discovery data for its
//! zones and makes them transferable. Options:
//!
//! * `namespaces`: only expose services in these namespaces,
//! * `multicluster`: zones that are merge origins over all other zones,
//! * `fallthrough`: pass queries for names that don't exist to the next
//!   plugin, for the listed zones or for all zones if none are listed,
//! * `nameservers`: the addresses of the `ns.dns` name of each zone,
//!   defaulting to the addresses the server block listens on,
//! * `ttl`: the TTL of all synthesized records.

use std::net::IpAddr;
use std::sync::Arc;

use tracing::warn;

use crate::base::{Name, Rcode, Record, Request, Response, Rtype, Ttl};
use crate::chain::{
    Outcome, PluginNode, ProcessFuture, RtypeSet, SetupContext, SetupError,
};
use crate::config::Directive;
use crate::source::{RecordSource, ServiceSource, SourceError};
use crate::zonetree::{Origin, SoaParams, ZoneAuthority};

use super::parse_zones;

pub const NAME: &str = "kubernetes";

const OPTIONS: &[&str] =
    &["namespaces", "multicluster", "fallthrough", "nameservers", "ttl"];

//------------ KubernetesNode ------------------------------------------------

#[derive(Debug)]
pub struct KubernetesNode {
    source: Arc<ServiceSource>,
    authority: Arc<ZoneAuthority>,

    /// The zones to fall through for. `Some` with an empty list means all.
    fallthrough: Option<Vec<Name>>,
}

pub fn setup(
    directive: &Directive,
    ctx: &SetupContext,
) -> Result<Arc<dyn PluginNode>, SetupError> {
    if let Some(key) = directive
        .options
        .keys()
        .find(|key| !OPTIONS.contains(&key.as_str()))
    {
        return Err(SetupError::new(NAME, format!("unknown option '{key}'")));
    }

    let zones = parse_zones(NAME, &directive.args, ctx)?;
    let multicluster = match directive.option("multicluster") {
        Some(args) if args.is_empty() => {
            return Err(SetupError::new(NAME, "multicluster needs a zone"))
        }
        Some(args) => parse_zones(NAME, args, ctx)?,
        None => Vec::new(),
    };
    if let Some(zone) = multicluster.iter().find(|zone| !zones.contains(zone)) {
        return Err(SetupError::new(
            NAME,
            format!("multicluster zone {zone} is not a zone of the plugin"),
        ));
    }
    if zones.iter().all(|zone| multicluster.contains(zone)) {
        return Err(SetupError::new(NAME, "no zone left besides multicluster zones"));
    }
    let fallthrough = directive
        .option("fallthrough")
        .map(|args| {
            if args.is_empty() {
                Ok(Vec::new())
            } else {
                parse_zones(NAME, args, ctx)
            }
        })
        .transpose()?;

    let ttl = match directive.option("ttl") {
        None => None,
        Some([ttl]) => Some(ttl.parse::<u32>().map_err(|_| {
            SetupError::new(NAME, format!("invalid ttl '{ttl}'"))
        })?),
        Some(_) => return Err(SetupError::new(NAME, "ttl takes one value")),
    };
    let nameservers = match directive.option("nameservers") {
        Some(addrs) => addrs
            .iter()
            .map(|addr| {
                addr.parse::<IpAddr>().map_err(|_| {
                    SetupError::new(NAME, format!("invalid address '{addr}'"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        None => listen_addrs(ctx),
    };

    let mut source = ServiceSource::new(ctx.backend.clone());
    if let Some(namespaces) = directive.option("namespaces") {
        source = source.with_namespaces(namespaces.iter().cloned());
    }
    let mut soa = SoaParams::default();
    if let Some(ttl) = ttl {
        source = source.with_ttl(Ttl::from_secs(ttl));
        soa.ttl = ttl;
        soa.minimum = ttl;
    }
    let source = Arc::new(source);

    let mut authority = ZoneAuthority::new(source.clone());
    for zone in zones {
        let mut origin = Origin::new(zone.clone())
            .with_soa(soa)
            .with_nameservers(nameservers.clone());
        if multicluster.contains(&zone) {
            origin = origin.into_merge(Vec::new());
        }
        authority
            .add_origin(origin)
            .map_err(|err| SetupError::new(NAME, err))?;
    }

    Ok(Arc::new(KubernetesNode {
        source,
        authority: Arc::new(authority),
        fallthrough,
    }))
}

/// Returns the distinct, specified addresses the server listens on.
fn listen_addrs(ctx: &SetupContext) -> Vec<IpAddr> {
    let mut res = Vec::new();
    for addr in ctx.listen {
        let ip = addr.addr.ip();
        if !ip.is_unspecified() && !res.contains(&ip) {
            res.push(ip);
        }
    }
    res
}

impl KubernetesNode {
    pub fn authority(&self) -> &Arc<ZoneAuthority> {
        &self.authority
    }

    fn falls_through(&self, qname: &Name) -> bool {
        match &self.fallthrough {
            None => false,
            Some(zones) => {
                zones.is_empty() || zones.iter().any(|zone| qname.ends_with(zone))
            }
        }
    }

    /// Answers a query for a name within `apex`.
    fn answer(
        &self,
        apex: &Name,
        request: &Request,
        response: &mut Response,
    ) -> Result<Outcome, SourceError> {
        let qname = request.qname();
        let qtype = request.qtype();
        let soa = self.authority.current_soa(apex).map_err(to_source_error)?;
        response.set_authoritative(true);

        let mut found = false;
        if qname == apex {
            found = true;
            match qtype {
                Rtype::SOA => response.push_answer(soa.clone()),
                Rtype::NS => {
                    let mut ns = self
                        .authority
                        .nameserver_records(apex)
                        .map_err(to_source_error)?
                        .into_iter();
                    response.push_answer(ns.next().ok_or_else(|| {
                        SourceError::Unavailable("no NS record".into())
                    })?);
                    ns.for_each(|record| response.push_additional(record));
                }
                _ => {}
            }
        } else {
            let records = self.lookup(apex, qname)?;
            if records.iter().any(|record| record.owner().ends_with(qname)) {
                found = true;
            }
            for record in records {
                if record.owner() == qname
                    && (record.rtype() == qtype
                        || qtype == Rtype::ANY
                        || record.rtype() == Rtype::CNAME)
                {
                    response.push_answer(record);
                }
            }
        }

        if !found {
            if self.falls_through(qname) {
                response.set_authoritative(false);
                return Ok(Outcome::NextWithFallthrough(RtypeSet::all()));
            }
            response.set_rcode(Rcode::NXDOMAIN);
        }
        if response.answer().is_empty() {
            response.push_authority(soa);
        }
        Ok(Outcome::Handled)
    }

    /// Returns the records of the group `qname` belongs to.
    ///
    /// Includes the name server records so that `ns.dns` resolves.
    fn lookup(
        &self,
        apex: &Name,
        qname: &Name,
    ) -> Result<Vec<Record>, SourceError> {
        let mut res = self
            .authority
            .nameserver_records(apex)
            .map_err(to_source_error)?;
        res.retain(|record| record.owner() != apex);

        let is_merge = self
            .authority
            .origin(apex)
            .map(|origin| origin.is_merge())
            .unwrap_or(false);
        if !is_merge {
            if let Some(owner) = ServiceSource::group_owner(apex, qname) {
                if let Some(group) = self.source.records_for(apex, &owner)? {
                    res.extend(group.into_records());
                }
            }
            return Ok(res);
        }

        for member in self.authority.members(apex) {
            let Some(name) = qname.reroot(apex, &member) else {
                continue;
            };
            let Some(owner) = ServiceSource::group_owner(&member, &name) else {
                continue;
            };
            let Some(group) = self.source.records_for(&member, &owner)? else {
                continue;
            };
            if group.is_cluster_local() {
                continue;
            }
            for record in group.records() {
                if let Some(record) = record.reroot(&member, apex) {
                    if !res.contains(&record) {
                        res.push(record);
                    }
                }
            }
        }
        Ok(res)
    }
}

fn to_source_error(err: crate::zonetree::AuthorityError) -> SourceError {
    match err {
        crate::zonetree::AuthorityError::Source(err) => err,
        other => SourceError::Unavailable(other.to_string()),
    }
}

impl PluginNode for KubernetesNode {
    fn name(&self) -> &str {
        NAME
    }

    fn process<'a>(
        &'a self,
        request: &'a Request,
        response: &'a mut Response,
    ) -> ProcessFuture<'a> {
        Box::pin(async move {
            let Some(apex) = self
                .authority
                .find_origin(request.qname())
                .map(|origin| origin.apex().clone())
            else {
                return Outcome::Delegate;
            };
            match self.answer(&apex, request, response) {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(plugin = NAME, "Failed to answer {}: {err}", request.qname());
                    *response = Response::servfail(request);
                    Outcome::Handled
                }
            }
        })
    }

    fn is_ready(&self) -> bool {
        self.source.is_synced()
    }

    fn startup(&self) -> Result<(), SetupError> {
        if !self.source.is_synced() {
            warn!(plugin = NAME, "Starting before the backend has synced");
        }
        Ok(())
    }

    fn transfer_authority(&self) -> Option<Arc<ZoneAuthority>> {
        Some(self.authority.clone())
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::Serial;
    use crate::config::ListenAddr;
    use crate::source::services::{Protocol, Service, ServicePort, Snapshot};
    use crate::source::SnapshotStore;

    fn n(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    fn backend() -> Arc<SnapshotStore> {
        Arc::new(SnapshotStore::with_snapshot(
            Snapshot::new(Serial(3))
                .with_service(Service::cluster_ip(
                    "svc1",
                    "testns",
                    vec!["10.0.0.1".parse().unwrap()],
                    vec![ServicePort::named("http", Protocol::Tcp, 80)],
                ))
                .with_service(Service::external_name(
                    "external",
                    "testns",
                    n("ext.interwebs.test"),
                )),
        ))
    }

    fn node(directive: Directive) -> Arc<dyn PluginNode> {
        let zones = [n("cluster.local"), n("clusterset.local")];
        let listen = ["udp://10.0.0.10:53".parse::<ListenAddr>().unwrap()];
        let backend = backend();
        let ctx = SetupContext {
            zones: &zones,
            listen: &listen,
            backend: &backend,
        };
        setup(&directive, &ctx).unwrap()
    }

    async fn query(
        node: &Arc<dyn PluginNode>,
        qname: &str,
        qtype: Rtype,
    ) -> (Outcome, Response) {
        let request = Request::new(n(qname), qtype);
        let mut response = Response::for_request(&request);
        let outcome = node.process(&request, &mut response).await;
        (outcome, response)
    }

    #[tokio::test]
    async fn service_lookups() {
        let node = node(Directive::new(NAME));
        let (outcome, resp) =
            query(&node, "svc1.testns.svc.cluster.local", Rtype::A).await;
        assert_eq!(outcome, Outcome::Handled);
        assert!(resp.is_authoritative());
        assert_eq!(resp.answer().len(), 1);
        assert_eq!(resp.answer()[0].data().to_string(), "10.0.0.1");

        let (_, resp) =
            query(&node, "_http._tcp.svc1.testns.svc.cluster.local", Rtype::SRV)
                .await;
        assert_eq!(resp.answer().len(), 1);

        let (_, resp) =
            query(&node, "external.testns.svc.cluster.local", Rtype::A).await;
        assert_eq!(resp.answer()[0].rtype(), Rtype::CNAME);

        let (_, resp) = query(&node, "ns.dns.cluster.local", Rtype::A).await;
        assert_eq!(resp.answer()[0].data().to_string(), "10.0.0.10");
    }

    #[tokio::test]
    async fn apex_records() {
        let node = node(Directive::new(NAME));
        let (_, resp) = query(&node, "cluster.local", Rtype::SOA).await;
        assert_eq!(resp.answer()[0].rtype(), Rtype::SOA);
        let (_, resp) = query(&node, "cluster.local", Rtype::NS).await;
        assert_eq!(resp.answer()[0].rtype(), Rtype::NS);
        assert_eq!(resp.additional().len(), 1);
    }

    #[tokio::test]
    async fn nxdomain_and_fallthrough() {
        let node_plain = node(Directive::new(NAME));
        let (outcome, resp) =
            query(&node_plain, "nope.testns.svc.cluster.local", Rtype::A).await;
        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(resp.rcode(), Rcode::NXDOMAIN);
        assert_eq!(resp.authority()[0].rtype(), Rtype::SOA);

        let node_ft = node(Directive::new(NAME).with_option("fallthrough", Vec::<String>::new()));
        let (outcome, resp) =
            query(&node_ft, "nope.testns.svc.cluster.local", Rtype::A).await;
        assert_eq!(outcome, Outcome::NextWithFallthrough(RtypeSet::all()));
        assert!(resp.is_empty());
    }

    #[tokio::test]
    async fn other_zones_are_delegated() {
        let node = node(Directive::new(NAME).with_args(["cluster.local"]));
        let (outcome, _) = query(&node, "example.test", Rtype::A).await;
        assert_eq!(outcome, Outcome::Delegate);
    }

    #[tokio::test]
    async fn multicluster_hides_cluster_local_records() {
        let node = node(
            Directive::new(NAME).with_option("multicluster", ["clusterset.local."]),
        );
        let (_, resp) =
            query(&node, "svc1.testns.svc.clusterset.local", Rtype::A).await;
        assert_eq!(resp.answer().len(), 1);
        let (_, resp) =
            query(&node, "external.testns.svc.clusterset.local", Rtype::A).await;
        assert_eq!(resp.rcode(), Rcode::NXDOMAIN);
    }

    #[test]
    fn bad_options() {
        let zones = [n("cluster.local")];
        let backend = backend();
        let ctx = SetupContext {
            zones: &zones,
            listen: &[],
            backend: &backend,
        };
        for directive in [
            Directive::new(NAME).with_option("bogus", ["x"]),
            Directive::new(NAME).with_option("ttl", ["x"]),
            Directive::new(NAME).with_option("multicluster", ["cluster.local"]),
            Directive::new(NAME).with_args(["example.test"]),
        ] {
            assert!(setup(&directive, &ctx).is_err(), "{directive:?}");
        }
    }
}
