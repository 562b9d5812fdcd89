//! Service discovery data and the records synthesized from it.
//!
//! The data model mirrors what a service discovery API exposes: services
//! with their ports, and endpoints listing the addresses that back a
//! service. [`ServiceSource`] turns this into DNS records following the
//! usual cluster DNS naming scheme:
//!
//! ```text
//! <service>.<namespace>.svc.<zone>                  A/AAAA, SRV, CNAME
//! <endpoint>.<service>.<namespace>.svc.<zone>       A/AAAA
//! _<port>._<proto>.<service>.<namespace>.svc.<zone> SRV
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;

use crate::base::{Name, Record, RecordData, Serial, Srv, Ttl};

use super::store::SnapshotStore;
use super::{RecordGroup, RecordSource, SourceError};

//------------ Constants -----------------------------------------------------

/// The label between the namespace and the zone apex.
const SERVICE_LABEL: &str = "svc";

/// The default TTL of synthesized records.
pub const DEFAULT_TTL: Ttl = Ttl::from_secs(5);

//------------ Protocol ------------------------------------------------------

/// The transport protocol of a service port.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
}

impl Protocol {
    fn label(self) -> &'static str {
        match self {
            Protocol::Tcp => "_tcp",
            Protocol::Udp => "_udp",
            Protocol::Sctp => "_sctp",
        }
    }
}

//------------ ServicePort ---------------------------------------------------

/// A port exposed by a service or an endpoint.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ServicePort {
    pub name: Option<String>,
    pub protocol: Protocol,
    pub port: u16,
}

impl ServicePort {
    /// Creates a named port.
    pub fn named(name: &str, protocol: Protocol, port: u16) -> Self {
        ServicePort {
            name: Some(name.into()),
            protocol,
            port,
        }
    }

    /// Creates an unnamed port.
    pub fn unnamed(protocol: Protocol, port: u16) -> Self {
        ServicePort {
            name: None,
            protocol,
            port,
        }
    }

    /// Returns the owner of the named SRV record for this port.
    fn srv_owner(&self, service: &Name) -> Option<Name> {
        let name = self.name.as_deref().filter(|name| !name.is_empty())?;
        service
            .prepend(self.protocol.label())
            .and_then(|owner| owner.prepend(&format!("_{name}")))
            .ok()
    }
}

//------------ ServiceKind ---------------------------------------------------

/// How a service is reachable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServiceKind {
    /// Through one virtual IP per address family.
    ClusterIp(Vec<IpAddr>),

    /// Directly through the addresses of its endpoints.
    Headless,

    /// Through an alias to another name.
    ExternalName(Name),
}

//------------ Service -------------------------------------------------------

/// A published service.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Service {
    pub name: String,
    pub namespace: String,
    pub kind: ServiceKind,
    pub ports: Vec<ServicePort>,
}

impl Service {
    pub fn cluster_ip(
        name: &str,
        namespace: &str,
        ips: Vec<IpAddr>,
        ports: Vec<ServicePort>,
    ) -> Self {
        Service {
            name: name.into(),
            namespace: namespace.into(),
            kind: ServiceKind::ClusterIp(ips),
            ports,
        }
    }

    pub fn headless(
        name: &str,
        namespace: &str,
        ports: Vec<ServicePort>,
    ) -> Self {
        Service {
            name: name.into(),
            namespace: namespace.into(),
            kind: ServiceKind::Headless,
            ports,
        }
    }

    pub fn external_name(name: &str, namespace: &str, target: Name) -> Self {
        Service {
            name: name.into(),
            namespace: namespace.into(),
            kind: ServiceKind::ExternalName(target),
            ports: Vec::new(),
        }
    }

    fn key(&self) -> (String, String) {
        (self.namespace.clone(), self.name.clone())
    }
}

//------------ EndpointAddress -----------------------------------------------

/// A single network endpoint backing a service.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EndpointAddress {
    pub ip: IpAddr,
    pub hostname: Option<String>,
}

//------------ Endpoints -----------------------------------------------------

/// A set of endpoints backing a service, sharing the same ports.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoints {
    pub service: String,
    pub namespace: String,
    pub addresses: Vec<EndpointAddress>,
    pub ports: Vec<ServicePort>,
}

impl Endpoints {
    pub fn new(service: &str, namespace: &str) -> Self {
        Endpoints {
            service: service.into(),
            namespace: namespace.into(),
            addresses: Vec::new(),
            ports: Vec::new(),
        }
    }

    /// Adds an address without a hostname.
    pub fn with_address(mut self, ip: IpAddr) -> Self {
        self.addresses.push(EndpointAddress { ip, hostname: None });
        self
    }

    /// Adds an address with a hostname.
    pub fn with_host(mut self, ip: IpAddr, hostname: &str) -> Self {
        self.addresses.push(EndpointAddress {
            ip,
            hostname: Some(hostname.into()),
        });
        self
    }

    pub fn with_port(mut self, port: ServicePort) -> Self {
        self.ports.push(port);
        self
    }
}

//------------ Snapshot ------------------------------------------------------

/// A point-in-time view of the service discovery backend.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    version: Serial,
    services: BTreeMap<(String, String), Service>,
    endpoints: BTreeMap<(String, String), Vec<Endpoints>>,
}

impl Snapshot {
    /// Creates an empty snapshot with the given version.
    pub fn new(version: Serial) -> Self {
        Snapshot {
            version,
            ..Default::default()
        }
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.insert_service(service);
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.insert_endpoints(endpoints);
        self
    }

    /// Adds or replaces a service.
    pub fn insert_service(&mut self, service: Service) {
        self.services.insert(service.key(), service);
    }

    /// Adds a set of endpoints to its service.
    pub fn insert_endpoints(&mut self, endpoints: Endpoints) {
        self.endpoints
            .entry((endpoints.namespace.clone(), endpoints.service.clone()))
            .or_default()
            .push(endpoints);
    }

    pub fn version(&self) -> Serial {
        self.version
    }

    /// Returns all services ordered by namespace and name.
    pub fn services(&self) -> Vec<&Service> {
        self.services.values().collect()
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<&Service> {
        self.services.get(&(namespace.into(), name.into()))
    }

    pub fn endpoints(&self, namespace: &str, service: &str) -> &[Endpoints] {
        self.endpoints
            .get(&(namespace.into(), service.into()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

//------------ ServiceSource -------------------------------------------------

/// A [`RecordSource`] synthesizing records from service discovery data.
#[derive(Debug)]
pub struct ServiceSource {
    store: Arc<SnapshotStore>,

    /// The namespaces in scope. `None` means all of them.
    namespaces: Option<BTreeSet<String>>,

    ttl: Ttl,
}

impl ServiceSource {
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        ServiceSource {
            store,
            namespaces: None,
            ttl: DEFAULT_TTL,
        }
    }

    /// Restricts the source to the given namespaces.
    pub fn with_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> =
            namespaces.into_iter().map(Into::into).collect();
        self.namespaces = if set.is_empty() { None } else { Some(set) };
        self
    }

    pub fn with_ttl(mut self, ttl: Ttl) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    fn in_scope(&self, namespace: &str) -> bool {
        self.namespaces
            .as_ref()
            .map(|set| set.contains(namespace))
            .unwrap_or(true)
    }

    /// Returns the owner name of the service record group for a service.
    pub fn service_owner(
        apex: &Name,
        service: &Service,
    ) -> Result<Name, SourceError> {
        apex.prepend_all(
            [service.name.as_str(), &service.namespace, SERVICE_LABEL]
                .into_iter(),
        )
        .map_err(|err| {
            SourceError::Unavailable(format!(
                "service {}/{} has no valid name: {err}",
                service.namespace, service.name
            ))
        })
    }

    /// Returns the owner of the record group that may contain `qname`.
    ///
    /// This is the `<service>.<namespace>.svc.<zone>` part of the name or
    /// `None` if `qname` isn't shaped like a service name.
    pub fn group_owner(apex: &Name, qname: &Name) -> Option<Name> {
        let rel = qname.relative_to(apex)?;
        if rel.len() < 3 || rel[rel.len() - 1] != SERVICE_LABEL {
            return None;
        }
        apex.prepend_all(rel[rel.len() - 3..].iter().copied()).ok()
    }

    /// Synthesizes the record group of a service.
    fn synthesize(
        &self,
        owner: Name,
        service: &Service,
        endpoints: &[Endpoints],
    ) -> Result<RecordGroup, SourceError> {
        let mut records = Vec::new();
        let group = match &service.kind {
            ServiceKind::ExternalName(target) => {
                records.push(self.record(
                    owner.clone(),
                    RecordData::Cname(target.clone()),
                ));
                RecordGroup::new(owner, records).into_cluster_local()
            }
            ServiceKind::ClusterIp(ips) => {
                for ip in ips {
                    records.push(
                        self.record(owner.clone(), RecordData::from_ip(*ip)),
                    );
                }
                for port in &service.ports {
                    let srv = RecordData::Srv(Srv::new(
                        0,
                        100,
                        port.port,
                        owner.clone(),
                    ));
                    records.push(self.record(owner.clone(), srv.clone()));
                    if let Some(srv_owner) = port.srv_owner(&owner) {
                        records.push(self.record(srv_owner, srv));
                    }
                }
                RecordGroup::new(owner, records)
            }
            ServiceKind::Headless => {
                self.synthesize_headless(&owner, endpoints, &mut records)?;
                RecordGroup::new(owner, records)
            }
        };
        Ok(group)
    }

    /// Synthesizes the records of a headless service.
    ///
    /// Every endpoint gets a label of its own: its hostname if it has one,
    /// otherwise its address with separators replaced by hyphens. Endpoints
    /// sharing an address additionally get a disambiguating label so that
    /// none of them is lost behind another.
    fn synthesize_headless(
        &self,
        owner: &Name,
        endpoints: &[Endpoints],
        records: &mut Vec<Record>,
    ) -> Result<(), SourceError> {
        let members: Vec<(&EndpointAddress, &[ServicePort])> = endpoints
            .iter()
            .flat_map(|eps| {
                eps.addresses
                    .iter()
                    .map(move |addr| (addr, eps.ports.as_slice()))
            })
            .collect();

        let mut sharing: HashMap<IpAddr, usize> = HashMap::new();
        for (addr, _) in &members {
            *sharing.entry(addr.ip).or_default() += 1;
        }

        // Work out all labels first, the SRV weight depends on their
        // number.
        let mut seen = HashSet::new();
        let mut ordinals: HashMap<IpAddr, usize> = HashMap::new();
        let mut plan = Vec::with_capacity(members.len());
        for (addr, ports) in &members {
            let canonical = endpoint_label(addr);
            let first = seen.insert((canonical.clone(), addr.ip));
            let alternate = if sharing[&addr.ip] > 1 {
                let ordinal = ordinals.entry(addr.ip).or_default();
                *ordinal += 1;
                Some(format!("{canonical}-{ordinal}"))
            } else {
                None
            };
            plan.push((addr.ip, canonical, first, alternate, *ports));
        }
        let targets = plan
            .iter()
            .map(|(_, _, first, alt, _)| {
                usize::from(*first) + usize::from(alt.is_some())
            })
            .sum::<usize>()
            .max(1);
        let weight = u16::try_from(100 / targets).unwrap_or(0);

        for (ip, canonical, first, alternate, ports) in plan {
            let mut labels = Vec::with_capacity(2);
            if first {
                records.push(self.record(owner.clone(), RecordData::from_ip(ip)));
                labels.push(canonical);
            }
            labels.extend(alternate);
            for label in labels {
                let target = owner.prepend(&label).map_err(|err| {
                    SourceError::Unavailable(format!(
                        "endpoint {ip} of {owner} has no valid name: {err}"
                    ))
                })?;
                records
                    .push(self.record(target.clone(), RecordData::from_ip(ip)));
                for port in ports {
                    if let Some(srv_owner) = port.srv_owner(owner) {
                        records.push(self.record(
                            srv_owner,
                            RecordData::Srv(Srv::new(
                                0,
                                weight,
                                port.port,
                                target.clone(),
                            )),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn record(&self, owner: Name, data: RecordData) -> Record {
        Record::new(owner, self.ttl, data)
    }
}

impl RecordSource for ServiceSource {
    fn list_names(&self, apex: &Name) -> Result<Vec<Name>, SourceError> {
        if !self.store.is_synced() {
            return Err(SourceError::NotSynced);
        }
        let snapshot = self.store.load();
        snapshot
            .services()
            .into_iter()
            .filter(|svc| self.in_scope(&svc.namespace))
            .map(|svc| Self::service_owner(apex, svc))
            .collect()
    }

    fn records_for(
        &self,
        apex: &Name,
        name: &Name,
    ) -> Result<Option<RecordGroup>, SourceError> {
        if !self.store.is_synced() {
            return Err(SourceError::NotSynced);
        }
        let Some(rel) = name.relative_to(apex) else {
            return Ok(None);
        };
        let [service, namespace, SERVICE_LABEL] = rel.as_slice() else {
            return Ok(None);
        };
        if !self.in_scope(namespace) {
            return Ok(None);
        }
        let snapshot = self.store.load();
        let Some(svc) = snapshot.service(namespace, service) else {
            return Ok(None);
        };
        let endpoints = snapshot.endpoints(namespace, service);
        self.synthesize(name.clone(), svc, endpoints).map(Some)
    }

    fn current_version(&self, _apex: &Name) -> Result<Serial, SourceError> {
        if !self.store.is_synced() {
            return Err(SourceError::NotSynced);
        }
        Ok(self.store.version())
    }

    fn is_synced(&self) -> bool {
        self.store.is_synced()
    }
}

//------------ Helper Functions ----------------------------------------------

/// Returns the DNS label for an endpoint.
fn endpoint_label(addr: &EndpointAddress) -> String {
    match addr.hostname.as_deref() {
        Some(hostname) if !hostname.is_empty() => hostname.to_ascii_lowercase(),
        _ => ip_label(addr.ip),
    }
}

/// Encodes an IP address as a single DNS label.
///
/// `172.0.0.2` becomes `172-0-0-2`, `5678:abcd::1` becomes `5678-abcd--1`.
pub fn ip_label(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(ip) => ip.to_string().replace('.', "-"),
        IpAddr::V6(ip) => ip.to_string().replace(':', "-"),
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    fn n(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn source(snapshot: Snapshot) -> ServiceSource {
        ServiceSource::new(Arc::new(SnapshotStore::with_snapshot(snapshot)))
    }

    fn rendered(group: &RecordGroup) -> Vec<String> {
        group.records().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn ip_labels() {
        assert_eq!(ip_label(ip("172.0.0.2")), "172-0-0-2");
        assert_eq!(ip_label(ip("5678:abcd::1")), "5678-abcd--1");
    }

    #[test]
    fn names_are_ordered_by_namespace_then_service() {
        let src = source(
            Snapshot::new(Serial(1))
                .with_service(Service::headless("b", "ns2", vec![]))
                .with_service(Service::headless("z", "ns1", vec![]))
                .with_service(Service::headless("a", "ns2", vec![])),
        );
        let names = src.list_names(&n("cluster.local")).unwrap();
        assert_eq!(
            names,
            vec![
                n("z.ns1.svc.cluster.local"),
                n("a.ns2.svc.cluster.local"),
                n("b.ns2.svc.cluster.local"),
            ]
        );
    }

    #[test]
    fn namespace_filter() {
        let src = source(
            Snapshot::new(Serial(1))
                .with_service(Service::headless("a", "hidden", vec![]))
                .with_service(Service::headless("b", "shown", vec![])),
        )
        .with_namespaces(["shown"]);
        let apex = n("cluster.local");
        assert_eq!(
            src.list_names(&apex).unwrap(),
            vec![n("b.shown.svc.cluster.local")]
        );
        assert_eq!(
            src.records_for(&apex, &n("a.hidden.svc.cluster.local"))
                .unwrap(),
            None
        );
    }

    #[test]
    fn cluster_ip_service() {
        let src = source(Snapshot::new(Serial(1)).with_service(
            Service::cluster_ip(
                "svc-dual-stack",
                "testns",
                vec![ip("10.0.0.3"), ip("10::3")],
                vec![ServicePort::named("http", Protocol::Tcp, 80)],
            ),
        ));
        let group = src
            .records_for(
                &n("cluster.local"),
                &n("svc-dual-stack.testns.svc.cluster.local"),
            )
            .unwrap()
            .unwrap();
        assert_eq!(
            rendered(&group),
            vec![
                "svc-dual-stack.testns.svc.cluster.local.\t5\tIN\tA\t10.0.0.3",
                "svc-dual-stack.testns.svc.cluster.local.\t5\tIN\tAAAA\t10::3",
                "svc-dual-stack.testns.svc.cluster.local.\t5\tIN\tSRV\t0 100 80 svc-dual-stack.testns.svc.cluster.local.",
                "_http._tcp.svc-dual-stack.testns.svc.cluster.local.\t5\tIN\tSRV\t0 100 80 svc-dual-stack.testns.svc.cluster.local.",
            ]
        );
        assert!(!group.is_cluster_local());
    }

    #[test]
    fn external_name_is_cluster_local() {
        let src = source(Snapshot::new(Serial(1)).with_service(
            Service::external_name("external", "testns", n("ext.interwebs.test")),
        ));
        let group = src
            .records_for(
                &n("cluster.local"),
                &n("external.testns.svc.cluster.local"),
            )
            .unwrap()
            .unwrap();
        assert!(group.is_cluster_local());
        assert_eq!(
            rendered(&group),
            vec!["external.testns.svc.cluster.local.\t5\tIN\tCNAME\text.interwebs.test."]
        );
    }

    #[test]
    fn headless_hostnames_share_a_label() {
        let src = source(
            Snapshot::new(Serial(1))
                .with_service(Service::headless("hdls1", "testns", vec![]))
                .with_endpoints(
                    Endpoints::new("hdls1", "testns")
                        .with_host(ip("172.0.0.4"), "dup-name")
                        .with_host(ip("172.0.0.5"), "dup-name")
                        .with_port(ServicePort::named("http", Protocol::Tcp, 80)),
                ),
        );
        let group = src
            .records_for(
                &n("cluster.local"),
                &n("hdls1.testns.svc.cluster.local"),
            )
            .unwrap()
            .unwrap();
        assert_eq!(
            rendered(&group),
            vec![
                "hdls1.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.4",
                "dup-name.hdls1.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.4",
                "_http._tcp.hdls1.testns.svc.cluster.local.\t5\tIN\tSRV\t0 50 80 dup-name.hdls1.testns.svc.cluster.local.",
                "hdls1.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.5",
                "dup-name.hdls1.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.5",
                "_http._tcp.hdls1.testns.svc.cluster.local.\t5\tIN\tSRV\t0 50 80 dup-name.hdls1.testns.svc.cluster.local.",
            ]
        );
    }

    #[test]
    fn headless_shared_address_is_disambiguated() {
        let src = source(
            Snapshot::new(Serial(1))
                .with_service(Service::headless("hdls2", "testns", vec![]))
                .with_endpoints(
                    Endpoints::new("hdls2", "testns")
                        .with_address(ip("172.0.0.9"))
                        .with_address(ip("172.0.0.9"))
                        .with_port(ServicePort::named("http", Protocol::Tcp, 80)),
                ),
        );
        let group = src
            .records_for(
                &n("cluster.local"),
                &n("hdls2.testns.svc.cluster.local"),
            )
            .unwrap()
            .unwrap();
        assert_eq!(
            rendered(&group),
            vec![
                "hdls2.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.9",
                "172-0-0-9.hdls2.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.9",
                "_http._tcp.hdls2.testns.svc.cluster.local.\t5\tIN\tSRV\t0 33 80 172-0-0-9.hdls2.testns.svc.cluster.local.",
                "172-0-0-9-1.hdls2.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.9",
                "_http._tcp.hdls2.testns.svc.cluster.local.\t5\tIN\tSRV\t0 33 80 172-0-0-9-1.hdls2.testns.svc.cluster.local.",
                "172-0-0-9-2.hdls2.testns.svc.cluster.local.\t5\tIN\tA\t172.0.0.9",
                "_http._tcp.hdls2.testns.svc.cluster.local.\t5\tIN\tSRV\t0 33 80 172-0-0-9-2.hdls2.testns.svc.cluster.local.",
            ]
        );
    }

    #[test]
    fn group_owner_for_queries() {
        let apex = n("cluster.local");
        assert_eq!(
            ServiceSource::group_owner(
                &apex,
                &n("_http._tcp.hdls1.testns.svc.cluster.local")
            ),
            Some(n("hdls1.testns.svc.cluster.local"))
        );
        assert_eq!(
            ServiceSource::group_owner(&apex, &n("testns.svc.cluster.local")),
            None
        );
        assert_eq!(
            ServiceSource::group_owner(&apex, &n("a.b.c.example.test")),
            None
        );
    }

    #[test]
    fn unsynced_source_fails() {
        let src = ServiceSource::new(Arc::new(SnapshotStore::new()));
        assert_eq!(
            src.list_names(&n("cluster.local")),
            Err(SourceError::NotSynced)
        );
        assert!(!src.is_synced());
    }
}
