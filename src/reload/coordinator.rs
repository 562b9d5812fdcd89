use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use crate::base::Request;
use crate::chain::{DispatchMetrics, PluginRegistry, ReadinessReport, Routed};
use crate::config::ConfigSource;
use crate::source::SnapshotStore;

use super::generation::Generation;
use super::ReloadError;

//------------ ReloadState ---------------------------------------------------

/// Where the coordinator is in its reload cycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReloadState {
    /// No reload has been attempted yet.
    Idle,

    /// A candidate generation is being built and checked.
    Validating,

    /// The given generation went live.
    Live(u64),

    /// The candidate was discarded, the given generation stays live.
    RolledBack(u64),
}

//------------ ReloadCoordinator ---------------------------------------------

/// Owns the live generation and swaps it on reload.
///
/// Requests load the live generation once and keep it for their whole
/// lifetime, so a reload never changes the plugin set under a request in
/// flight. Reloads are serialized: a second reload starts only after the
/// first one has either gone live or rolled back, and uses its result as
/// the baseline.
#[derive(Debug)]
pub struct ReloadCoordinator {
    live: ArcSwap<Generation>,
    registry: PluginRegistry,
    backend: Arc<SnapshotStore>,
    metrics: Arc<DispatchMetrics>,
    next_id: AtomicU64,
    reloading: Mutex<()>,
    state: watch::Sender<ReloadState>,
}

impl ReloadCoordinator {
    /// Builds the first generation and starts serving it.
    pub fn start(
        source: &dyn ConfigSource,
        registry: PluginRegistry,
        backend: Arc<SnapshotStore>,
    ) -> Result<Self, ReloadError> {
        let metrics = Arc::new(DispatchMetrics::new());
        let config = source.load()?;
        let first = Generation::build(
            1,
            config,
            &registry,
            &backend,
            metrics.clone(),
            None,
        )?;
        info!(
            "Generation 1 live with {} chain(s)",
            first.dispatcher().chains().len()
        );
        let (state, _) = watch::channel(ReloadState::Idle);
        Ok(ReloadCoordinator {
            live: ArcSwap::from_pointee(first),
            registry,
            backend,
            metrics,
            next_id: AtomicU64::new(2),
            reloading: Mutex::new(()),
            state,
        })
    }

    /// Returns the live generation.
    pub fn live(&self) -> Arc<Generation> {
        self.live.load_full()
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    pub fn backend(&self) -> &Arc<SnapshotStore> {
        &self.backend
    }

    pub fn state(&self) -> ReloadState {
        *self.state.borrow()
    }

    /// Returns a receiver following the reload state.
    pub fn subscribe(&self) -> watch::Receiver<ReloadState> {
        self.state.subscribe()
    }

    /// Returns the readiness of the live generation.
    pub fn readiness(&self) -> ReadinessReport {
        self.live.load().readiness()
    }

    /// Processes a request with the live generation.
    pub async fn route(&self, request: &Request) -> Routed {
        let generation = self.live();
        generation.route(request).await
    }

    /// Replaces the live generation with one built from `source`.
    ///
    /// The candidate is fully validated before anything shared changes.
    /// If validation fails, the live generation stays untouched and keeps
    /// answering. Otherwise, the candidate is swapped in and the nodes of
    /// the old generation are shut down. Requests still holding the old
    /// generation finish against it.
    pub async fn reload(
        &self,
        source: &dyn ConfigSource,
    ) -> Result<Arc<Generation>, ReloadError> {
        let _guard = self.reloading.lock().await;
        let old = self.live.load_full();
        self.state.send_replace(ReloadState::Validating);

        // Reloads hold the lock, the id is only claimed once live.
        let id = self.next_id.load(Ordering::Relaxed);
        let candidate = source.load().map_err(ReloadError::from).and_then(
            |config| {
                Generation::build(
                    id,
                    config,
                    &self.registry,
                    &self.backend,
                    self.metrics.clone(),
                    Some(&old),
                )
            },
        );

        match candidate {
            Ok(candidate) => {
                let candidate = Arc::new(candidate);
                self.next_id.store(id + 1, Ordering::Relaxed);
                self.live.store(candidate.clone());
                old.shutdown();
                info!("Generation {id} live, replacing {}", old.id());
                self.state.send_replace(ReloadState::Live(id));
                Ok(candidate)
            }
            Err(err) => {
                error!("Reload failed: {err}");
                warn!("Generation {} stays live", old.id());
                self.state.send_replace(ReloadState::RolledBack(old.id()));
                Err(err)
            }
        }
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::{Name, Rtype};
    use crate::config::{Config, Directive, ServerBlock};

    fn config(plugin: &str) -> Config {
        Config {
            servers: vec![ServerBlock::new(vec![Name::root()])
                .with_plugin(Directive::new(plugin))],
            ..Default::default()
        }
    }

    fn coordinator() -> ReloadCoordinator {
        ReloadCoordinator::start(
            &config("whoami"),
            PluginRegistry::with_builtins(),
            Arc::new(SnapshotStore::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn successful_reload() {
        let coordinator = coordinator();
        let mut states = coordinator.subscribe();
        assert_eq!(coordinator.state(), ReloadState::Idle);

        let generation = coordinator.reload(&config("log")).await.unwrap();
        assert_eq!(generation.id(), 2);
        assert_eq!(generation.replaced(), Some(1));
        assert_eq!(coordinator.live().id(), 2);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), ReloadState::Live(2));
    }

    #[tokio::test]
    async fn failed_reload_rolls_back() {
        let coordinator = coordinator();
        let err = coordinator.reload(&config("invalid")).await.unwrap_err();
        assert!(matches!(err, ReloadError::ValidationFailed(_)));
        assert_eq!(coordinator.live().id(), 1);
        assert_eq!(coordinator.state(), ReloadState::RolledBack(1));

        let request = Request::new(Name::new("example.org").unwrap(), Rtype::A);
        let response = coordinator.route(&request).await.into_response().unwrap();
        assert_eq!(response.additional().len(), 2);

        // The rolled back attempt didn't use up an id.
        let generation = coordinator.reload(&config("log")).await.unwrap();
        assert_eq!(generation.id(), 2);
    }
}
