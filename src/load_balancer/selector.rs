//! Target selection.
//!
//! Selection order:
//! 1. Affinity: the unit's sticky cookie names the url of an active target.
//! 2. Rule: the configured condition maps the observed signal to a target,
//!    falling back to the rule default. A rule never falls through to 3.
//! 3. Weighted random over active targets.

use std::sync::Arc;

use crate::config::unit::{ConditionType, ProxyConfig, RoutingRule, Target};
use crate::error::SelectionError;
use crate::load_balancer::random::RandomSource;
use crate::load_balancer::signals::{detect_browser, detect_platform, preferred_language, RequestSignals};

/// Name of the per-unit affinity cookie.
pub fn affinity_cookie_name(unit_id: &str) -> String {
    format!("proxy_{unit_id}")
}

/// Pure decision function: request signals + unit state → target.
#[derive(Clone)]
pub struct TargetSelector {
    random: Arc<dyn RandomSource>,
}

impl std::fmt::Debug for TargetSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetSelector").finish_non_exhaustive()
    }
}

impl TargetSelector {
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }

    /// Choose a target for one request.
    pub fn select<'s>(
        &self,
        signals: &RequestSignals<'_>,
        unit: &'s ProxyConfig,
    ) -> Result<&'s Target, SelectionError> {
        if let Some(target) = by_affinity(signals, unit) {
            return Ok(target);
        }

        if let Some(rule) = &unit.rule {
            return by_rule(signals, rule, &unit.targets).ok_or(SelectionError::NoMatch);
        }

        self.weighted(&unit.targets)
    }

    fn weighted<'s>(&self, targets: &'s [Target]) -> Result<&'s Target, SelectionError> {
        let active: Vec<&Target> = targets.iter().filter(|t| t.active).collect();
        let first = *active.first().ok_or(SelectionError::NoActiveTargets)?;

        let total: f64 = active.iter().map(|t| t.weight).sum();
        if total <= 0.0 {
            let index = (self.random.next_f64() * active.len() as f64) as usize;
            return Ok(active[index.min(active.len() - 1)]);
        }

        let draw = self.random.next_f64() * total;
        let mut cumulative = 0.0;
        for target in &active {
            cumulative += target.weight;
            if cumulative >= draw {
                return Ok(target);
            }
        }

        // Rounding can leave the draw just above the final cumulative sum.
        Ok(first)
    }
}

fn by_affinity<'s>(signals: &RequestSignals<'_>, unit: &'s ProxyConfig) -> Option<&'s Target> {
    let url = signals.cookie(&affinity_cookie_name(&unit.id))?;
    unit.targets.iter().find(|t| t.active && t.url == url)
}

fn by_rule<'s>(
    signals: &RequestSignals<'_>,
    rule: &RoutingRule,
    targets: &'s [Target],
) -> Option<&'s Target> {
    let active = |id: &str| targets.iter().find(|t| t.active && t.id == id);

    let value = rule_value(signals, rule);
    value
        .as_deref()
        .and_then(|v| rule.value_to_target.get(v))
        .and_then(|id| active(id))
        .or_else(|| active(&rule.default))
}

fn rule_value(signals: &RequestSignals<'_>, rule: &RoutingRule) -> Option<String> {
    let name = rule.param_name.as_str();
    match rule.condition {
        ConditionType::Header => signals.header(name).map(str::to_owned),
        ConditionType::Query => signals.query(name).map(str::to_owned),
        ConditionType::Cookie => signals.cookie(name).map(str::to_owned),
        ConditionType::UserAgent => match name {
            "platform" => Some(detect_platform(signals.user_agent()).to_owned()),
            "browser" => Some(detect_browser(signals.user_agent()).to_owned()),
            _ => None,
        },
        ConditionType::Language => Some(preferred_language(signals.accept_language())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::unit::ProxyMode;
    use crate::load_balancer::random::SeededRandom;
    use axum::http::{header, HeaderMap, HeaderValue, Uri};
    use std::collections::HashMap;

    struct Fixed(f64);

    impl RandomSource for Fixed {
        fn next_f64(&self) -> f64 {
            self.0
        }
    }

    fn target(id: &str, weight: f64, active: bool) -> Target {
        Target {
            id: id.into(),
            url: format!("http://{id}.internal"),
            weight,
            active,
        }
    }

    fn unit(targets: Vec<Target>, rule: Option<RoutingRule>) -> ProxyConfig {
        ProxyConfig {
            id: "u1".into(),
            listen_key: "a.test".into(),
            mode: ProxyMode::Reverse,
            path_key: None,
            targets,
            rule,
            tags: vec![],
            active: true,
        }
    }

    fn plan_rule() -> RoutingRule {
        RoutingRule {
            condition: ConditionType::Header,
            param_name: "X-Plan".into(),
            value_to_target: HashMap::from([("pro".into(), "A".into()), ("free".into(), "B".into())]),
            default: "B".into(),
        }
    }

    fn selector(draw: f64) -> TargetSelector {
        TargetSelector::new(Arc::new(Fixed(draw)))
    }

    fn pick<'s>(sel: &TargetSelector, headers: &HeaderMap, unit: &'s ProxyConfig) -> Result<&'s Target, SelectionError> {
        let uri = Uri::from_static("/");
        let signals = RequestSignals::new(headers, &uri);
        sel.select(&signals, unit)
    }

    #[test]
    fn test_weighted_walk() {
        let u = unit(vec![target("A", 0.7, true), target("B", 0.3, true)], None);
        let headers = HeaderMap::new();

        assert_eq!(pick(&selector(0.0), &headers, &u).unwrap().id, "A");
        assert_eq!(pick(&selector(0.69), &headers, &u).unwrap().id, "A");
        assert_eq!(pick(&selector(0.71), &headers, &u).unwrap().id, "B");
        assert_eq!(pick(&selector(0.999_999), &headers, &u).unwrap().id, "B");
    }

    #[test]
    fn test_weighted_skips_inactive() {
        let u = unit(vec![target("A", 0.9, false), target("B", 0.1, true)], None);
        let headers = HeaderMap::new();
        assert_eq!(pick(&selector(0.0), &headers, &u).unwrap().id, "B");
        assert_eq!(pick(&selector(0.99), &headers, &u).unwrap().id, "B");
    }

    #[test]
    fn test_no_active_targets() {
        let u = unit(vec![target("A", 1.0, false)], None);
        let err = pick(&selector(0.5), &HeaderMap::new(), &u).unwrap_err();
        assert_eq!(err, SelectionError::NoActiveTargets);
        assert_eq!(err.to_string(), "no active targets");
    }

    #[test]
    fn test_zero_active_weight_is_uniform() {
        let u = unit(
            vec![target("A", 1.0, false), target("B", 0.0, true), target("C", 0.0, true)],
            None,
        );
        let headers = HeaderMap::new();
        assert_eq!(pick(&selector(0.2), &headers, &u).unwrap().id, "B");
        assert_eq!(pick(&selector(0.8), &headers, &u).unwrap().id, "C");
    }

    #[test]
    fn test_weighted_frequencies() {
        let u = unit(
            vec![target("A", 0.5, true), target("B", 0.3, true), target("C", 0.2, true)],
            None,
        );
        let sel = TargetSelector::new(Arc::new(SeededRandom::new(42)));
        let headers = HeaderMap::new();

        let samples = 100_000;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..samples {
            *counts.entry(pick(&sel, &headers, &u).unwrap().id.clone()).or_default() += 1;
        }

        for (id, expected) in [("A", 0.5), ("B", 0.3), ("C", 0.2)] {
            let observed = counts[id] as f64 / samples as f64;
            assert!((observed - expected).abs() < 0.01, "{id}: {observed}");
        }
    }

    #[test]
    fn test_affinity_beats_weights_and_rule() {
        let u = unit(vec![target("A", 0.0, true), target("B", 1.0, true)], Some(plan_rule()));
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("proxy_u1=http://A.internal"));
        headers.insert("x-plan", HeaderValue::from_static("free"));

        for draw in [0.0, 0.5, 0.99] {
            assert_eq!(pick(&selector(draw), &headers, &u).unwrap().id, "A");
        }
    }

    #[test]
    fn test_affinity_ignores_inactive_target() {
        let u = unit(vec![target("A", 0.5, false), target("B", 0.5, true)], None);
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("proxy_u1=http://A.internal"));
        assert_eq!(pick(&selector(0.1), &headers, &u).unwrap().id, "B");
    }

    #[test]
    fn test_header_rule() {
        let u = unit(vec![target("A", 0.5, true), target("B", 0.5, true)], Some(plan_rule()));

        let mut pro = HeaderMap::new();
        pro.insert("x-plan", HeaderValue::from_static("pro"));
        assert_eq!(pick(&selector(0.9), &pro, &u).unwrap().id, "A");

        assert_eq!(pick(&selector(0.0), &HeaderMap::new(), &u).unwrap().id, "B");
    }

    #[test]
    fn test_rule_falls_back_to_default_when_mapped_target_inactive() {
        let u = unit(vec![target("A", 0.5, false), target("B", 0.5, true)], Some(plan_rule()));
        let mut pro = HeaderMap::new();
        pro.insert("x-plan", HeaderValue::from_static("pro"));
        assert_eq!(pick(&selector(0.0), &pro, &u).unwrap().id, "B");
    }

    #[test]
    fn test_rule_without_resolvable_default_fails() {
        let mut rule = plan_rule();
        rule.default = "A".into();
        let u = unit(vec![target("A", 0.5, false), target("B", 0.5, true)], Some(rule));

        let err = pick(&selector(0.0), &HeaderMap::new(), &u).unwrap_err();
        assert_eq!(err, SelectionError::NoMatch);
        assert_eq!(err.to_string(), "no match");
    }

    #[test]
    fn test_user_agent_and_language_rules() {
        let platform = RoutingRule {
            condition: ConditionType::UserAgent,
            param_name: "platform".into(),
            value_to_target: HashMap::from([("mobile".into(), "B".into())]),
            default: "A".into(),
        };
        let u = unit(vec![target("A", 0.5, true), target("B", 0.5, true)], Some(platform));
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("Mozilla/5.0 (Linux; Android 14) Mobile"));
        assert_eq!(pick(&selector(0.0), &headers, &u).unwrap().id, "B");

        let language = RoutingRule {
            condition: ConditionType::Language,
            param_name: String::new(),
            value_to_target: HashMap::from([("de-de".into(), "B".into())]),
            default: "A".into(),
        };
        let u = unit(vec![target("A", 0.5, true), target("B", 0.5, true)], Some(language));
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("de-DE;q=0.9,en;q=0.5"));
        assert_eq!(pick(&selector(0.0), &headers, &u).unwrap().id, "B");
    }

    #[test]
    fn test_query_and_cookie_rules() {
        let mut rule = plan_rule();
        rule.condition = ConditionType::Query;
        rule.param_name = "plan".into();
        let u = unit(vec![target("A", 0.5, true), target("B", 0.5, true)], Some(rule));

        let uri = Uri::from_static("/?plan=pro");
        let headers = HeaderMap::new();
        let signals = RequestSignals::new(&headers, &uri);
        assert_eq!(selector(0.0).select(&signals, &u).unwrap().id, "A");

        let mut rule = plan_rule();
        rule.condition = ConditionType::Cookie;
        rule.param_name = "plan".into();
        let u = unit(vec![target("A", 0.5, true), target("B", 0.5, true)], Some(rule));
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("plan=pro"));
        assert_eq!(pick(&selector(0.0), &headers, &u).unwrap().id, "A");
    }
}
