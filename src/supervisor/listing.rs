//! Point-in-time listings of the registry.

use std::cmp::Ordering;

use crate::config::unit::ProxyConfig;

/// Listing sort order. Anything unrecognized means ascending by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Id,
    ListenKey,
    Mode,
    Targets,
}

impl SortKey {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "id" => Some(SortKey::Id),
            "listen_key" | "listenKey" | "listen_url" => Some(SortKey::ListenKey),
            "mode" => Some(SortKey::Mode),
            "targets" => Some(SortKey::Targets),
            _ => None,
        }
    }

    fn compare(self, a: &ProxyConfig, b: &ProxyConfig) -> Ordering {
        match self {
            SortKey::Id => a.id.cmp(&b.id),
            SortKey::ListenKey => a.listen_key.cmp(&b.listen_key),
            SortKey::Mode => a.mode.cmp(&b.mode),
            SortKey::Targets => a.targets.len().cmp(&b.targets.len()),
        }
    }
}

/// Sort `configs` by `sort_key`; ties are broken by ascending id.
pub fn sort_configs(configs: &mut [ProxyConfig], sort_key: &str, desc: bool) {
    let Some(key) = SortKey::parse(sort_key) else {
        configs.sort_by(|a, b| a.id.cmp(&b.id));
        return;
    };

    configs.sort_by(|a, b| {
        let primary = key.compare(a, b);
        let primary = if desc { primary.reverse() } else { primary };
        primary.then_with(|| a.id.cmp(&b.id))
    });
}
