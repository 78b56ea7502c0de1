//! One live routing unit.

use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::unit::ProxyConfig;
use crate::config::validation::validate_unit;
use crate::error::Result;
use crate::load_balancer::selector::TargetSelector;
use crate::load_balancer::weights::normalize_weights;
use crate::routing::matcher::DispatchKey;
use crate::stats::collector::StatsCollector;

/// Immutable routing state of a unit: validated config with normalized
/// weights, and the dispatch key it owns. Replaced as a whole on update.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingState {
    pub config: ProxyConfig,
    pub key: DispatchKey,
}

impl RoutingState {
    pub fn build(mut config: ProxyConfig) -> Result<Self> {
        validate_unit(&config)?;
        normalize_weights(&mut config.targets);
        let key = config.dispatch_key();
        Ok(Self { config, key })
    }
}

pub struct ProxyInstance {
    id: String,
    state: ArcSwap<RoutingState>,
    stats: StatsCollector,
    selector: TargetSelector,
    started: AtomicBool,
}

impl std::fmt::Debug for ProxyInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyInstance")
            .field("id", &self.id)
            .field("key", &self.state.load().key)
            .field("started", &self.is_started())
            .finish()
    }
}

impl ProxyInstance {
    pub fn new(state: RoutingState, selector: TargetSelector) -> Self {
        Self {
            id: state.config.id.clone(),
            state: ArcSwap::from_pointee(state),
            stats: StatsCollector::new(),
            selector,
            started: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Consistent view for one request; never blocks a concurrent update.
    pub fn snapshot(&self) -> Arc<RoutingState> {
        self.state.load_full()
    }

    /// Swap in a new routing state, returning the previous one.
    pub(crate) fn replace(&self, state: RoutingState) -> Arc<RoutingState> {
        self.state.swap(Arc::new(state))
    }

    pub fn stats(&self) -> &StatsCollector {
        &self.stats
    }

    pub(crate) fn selector(&self) -> &TargetSelector {
        &self.selector
    }

    pub(crate) fn mark_started(&self) {
        self.started.store(true, Ordering::Release);
    }

    /// Only started units take part in the stats flush.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}
