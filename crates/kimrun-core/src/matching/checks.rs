//! Declarative compatibility checks for runner/subject pairs.
//!
//! Checks run in [`MatchRule::ordered`] order and stop at the first
//! violation.

use serde::{Deserialize, Serialize};

use crate::domain::{Item, ItemKind};
use crate::registry::Registry;

/// A single compatibility rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// Declared drivers exist on disk and have the right kind.
    DriverLinkage,
    /// Only Test or Verification Check against Model or Simulator Model.
    KindPairing,
    /// Runner species intersect subject species.
    Species,
    /// Declared `kim_api_version` ranges overlap.
    ApiVersion,
    /// A Simulator Model's simulator is one the runner supports.
    Simulator,
}

impl MatchRule {
    pub fn ordered() -> [MatchRule; 5] {
        [
            MatchRule::DriverLinkage,
            MatchRule::KindPairing,
            MatchRule::Species,
            MatchRule::ApiVersion,
            MatchRule::Simulator,
        ]
    }
}

/// Context for evaluating a pair.
pub struct MatchContext<'a> {
    pub registry: &'a Registry,
    pub runner: &'a Item,
    pub subject: &'a Item,
}

/// A rule the pair violates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchViolation {
    pub rule: MatchRule,
    pub reason: String,
}

/// First violated rule, if any.
pub fn first_violation(ctx: &MatchContext) -> Option<MatchViolation> {
    MatchRule::ordered()
        .iter()
        .find_map(|rule| check_rule(*rule, ctx))
}

fn violation(rule: MatchRule, reason: String) -> Option<MatchViolation> {
    Some(MatchViolation { rule, reason })
}

fn check_rule(rule: MatchRule, ctx: &MatchContext) -> Option<MatchViolation> {
    match rule {
        MatchRule::DriverLinkage => check_driver(ctx.registry, ctx.runner)
            .or_else(|| check_driver(ctx.registry, ctx.subject))
            .and_then(|reason| violation(rule, reason)),
        MatchRule::KindPairing => {
            let runner = ctx.runner.kind();
            let subject = ctx.subject.kind();
            if runner.is_runner() && subject.is_subject() {
                None
            } else {
                violation(
                    rule,
                    format!(
                        "invalid pairing: {} {} with {} {} (expected a test or verification-check with a model or simulator-model)",
                        runner, ctx.runner.id, subject, ctx.subject.id,
                    ),
                )
            }
        }
        MatchRule::Species => {
            let wanted = &ctx.runner.metadata.species;
            let offered = &ctx.subject.metadata.species;
            if wanted.is_empty() || wanted.iter().any(|s| offered.contains(s)) {
                None
            } else if offered.is_empty() {
                violation(
                    rule,
                    format!(
                        "species mismatch: {} requires one of [{}], {} declares no species",
                        ctx.runner.id,
                        wanted.join(", "),
                        ctx.subject.id,
                    ),
                )
            } else {
                violation(
                    rule,
                    format!(
                        "species mismatch: {} requires one of [{}], {} supports [{}]",
                        ctx.runner.id,
                        wanted.join(", "),
                        ctx.subject.id,
                        offered.join(", "),
                    ),
                )
            }
        }
        MatchRule::ApiVersion => {
            match (
                &ctx.runner.metadata.kim_api_version,
                &ctx.subject.metadata.kim_api_version,
            ) {
                (Some(runner), Some(subject)) if !runner.overlaps(subject) => violation(
                    rule,
                    format!(
                        "kim_api_version mismatch: {} requires '{}', {} requires '{}'",
                        ctx.runner.id, runner, ctx.subject.id, subject,
                    ),
                ),
                _ => None,
            }
        }
        MatchRule::Simulator => {
            if ctx.subject.kind() != ItemKind::SimulatorModel {
                return None;
            }
            check_simulator(ctx.runner, ctx.subject).and_then(|reason| violation(rule, reason))
        }
    }
}

fn check_driver(registry: &Registry, item: &Item) -> Option<String> {
    let declared = item.metadata.driver.as_ref()?;
    let Some(expected) = item.kind().driver_kind() else {
        return Some(format!(
            "{} declares driver {} but {} items take no driver",
            item.id,
            declared,
            item.kind(),
        ));
    };
    if declared.kind() != expected {
        return Some(format!(
            "{} declares driver {} of kind {}, expected a {}",
            item.id,
            declared,
            declared.kind(),
            expected,
        ));
    }
    if registry.driver_of(item).is_none() {
        return Some(format!(
            "driver {} of {} is not present",
            declared, item.id
        ));
    }
    None
}

fn check_simulator(runner: &Item, subject: &Item) -> Option<String> {
    let Some(name) = subject.metadata.simulator_name.as_deref() else {
        return Some(format!(
            "simulator mismatch: {} declares no simulator_name",
            subject.id
        ));
    };

    let supported = &runner.metadata.simulators;
    if supported.is_empty() {
        return None;
    }
    let Some(entry) = supported
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(name))
    else {
        let names: Vec<&str> = supported.iter().map(|s| s.name.as_str()).collect();
        return Some(format!(
            "simulator mismatch: {} supports [{}], {} uses {}",
            runner.id,
            names.join(", "),
            subject.id,
            name,
        ));
    };

    let constraint = entry.version.as_ref()?;
    match &subject.metadata.simulator_version {
        Some(version) if constraint.satisfied_by(version) => None,
        Some(version) => Some(format!(
            "simulator version mismatch: {} requires {} '{}', {} uses {} {}",
            runner.id, entry.name, constraint, subject.id, name, version,
        )),
        None => Some(format!(
            "simulator version mismatch: {} requires {} '{}', {} declares no simulator_version",
            runner.id, entry.name, constraint, subject.id,
        )),
    }
}
