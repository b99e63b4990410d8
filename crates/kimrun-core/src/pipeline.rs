//! Batch pipeline: expand queries into runner/subject pairs, build every
//! involved item, match, and run accepted pairs one at a time.
//!
//! Builds happen before any match check and the first build failure aborts
//! the batch. Mismatches are collected, not raised.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::{info, instrument};

use crate::domain::{Identifier, Item, ItemKind};
use crate::executor::{ExecError, Executor, Job};
use crate::matching::{Diagnostic, MatchEngine, MatchError, MatchResult};
use crate::registry::{freshest, is_pattern, Registry, RegistryError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("Invalid pairing: {first} is a {first_kind} and {second} is a {second_kind}")]
    InvalidPairing {
        first: String,
        first_kind: ItemKind,
        second: String,
        second_kind: ItemKind,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// A rejected pair and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub runner: Identifier,
    pub subject: Identifier,
    pub diagnostic: Diagnostic,
}

#[derive(Debug, Clone, Default)]
pub struct MatchReport {
    /// Accepted pairs as (runner, subject).
    pub matches: Vec<(Identifier, Identifier)>,
    pub mismatches: Vec<Mismatch>,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub jobs: Vec<Job>,
    pub mismatches: Vec<Mismatch>,
}

pub struct Pipeline {
    registry: Registry,
    engine: MatchEngine,
}

impl Pipeline {
    pub fn new(registry: Registry, engine: MatchEngine) -> Self {
        Self { registry, engine }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Items of one kind, freshest only unless `all_versions`.
    pub fn list(&self, kind: ItemKind, all_versions: bool) -> Vec<Item> {
        self.registry.all_of_kind(kind, !all_versions)
    }

    /// Build every item `query` resolves to.
    pub async fn build(&mut self, query: &str) -> Result<Vec<Item>> {
        let items = self.registry.resolve(query)?;
        let mut built = Vec::with_capacity(items.len());
        for item in items {
            built.push(self.registry.build(&item.id).await?);
        }
        Ok(built)
    }

    /// Expand the queries into (runner, subject) pairs.
    ///
    /// Without `second`, each item of `first` is paired with every item of
    /// its counterpart kinds. Globs and counterpart listings keep only the
    /// freshest version of each lineage unless `all_versions`.
    pub fn pairs(
        &self,
        first: &str,
        second: Option<&str>,
        all_versions: bool,
    ) -> Result<Vec<(Item, Item)>> {
        if let Some(second) = second {
            ensure_pairable(first, second)?;
        }
        let left = self.candidates(first, all_versions)?;
        let right = match second {
            Some(query) => Some(self.candidates(query, all_versions)?),
            None => None,
        };

        let mut seen = BTreeSet::new();
        let mut pairs = Vec::new();
        for a in &left {
            let partners = match &right {
                Some(items) => items.clone(),
                None => a
                    .kind()
                    .counterparts()
                    .iter()
                    .flat_map(|kind| self.registry.all_of_kind(*kind, !all_versions))
                    .collect(),
            };
            for b in partners {
                let (runner, subject) = orient(a.clone(), b);
                if seen.insert((runner.id.format(), subject.id.format())) {
                    pairs.push((runner, subject));
                }
            }
        }
        Ok(pairs)
    }

    /// Match every pair the queries expand to.
    #[instrument(skip(self))]
    pub async fn match_items(
        &mut self,
        first: &str,
        second: Option<&str>,
        all_versions: bool,
    ) -> Result<MatchReport> {
        let pairs = self.pairs(first, second, all_versions)?;
        self.build_involved(&pairs).await?;

        let mut report = MatchReport::default();
        for (runner, subject) in pairs {
            let (runner, subject) = self.refreshed(runner, subject);
            match self
                .engine
                .valid_match(&self.registry, &runner, &subject)
                .await?
            {
                MatchResult::Match(_) => report.matches.push((runner.id, subject.id)),
                MatchResult::Mismatch(diagnostic) => report.mismatches.push(Mismatch {
                    runner: runner.id,
                    subject: subject.id,
                    diagnostic,
                }),
            }
        }
        info!(
            matches = report.matches.len(),
            mismatches = report.mismatches.len(),
            "matching finished"
        );
        Ok(report)
    }

    /// Match and run every pair the queries expand to, sequentially.
    #[instrument(skip(self, executor))]
    pub async fn run(
        &mut self,
        executor: &Executor,
        first: &str,
        second: Option<&str>,
        all_versions: bool,
    ) -> Result<RunReport> {
        let pairs = self.pairs(first, second, all_versions)?;
        self.build_involved(&pairs).await?;

        let mut report = RunReport::default();
        for (runner, subject) in pairs {
            let (runner, subject) = self.refreshed(runner, subject);
            let result = self
                .engine
                .valid_match(&self.registry, &runner, &subject)
                .await?;
            match result {
                MatchResult::Match(pair) => {
                    let job = executor.execute(&mut self.registry, pair).await?;
                    report.jobs.push(job);
                }
                MatchResult::Mismatch(diagnostic) => report.mismatches.push(Mismatch {
                    runner: runner.id,
                    subject: subject.id,
                    diagnostic,
                }),
            }
        }
        info!(
            jobs = report.jobs.len(),
            mismatches = report.mismatches.len(),
            "run finished"
        );
        Ok(report)
    }

    fn candidates(&self, query: &str, all_versions: bool) -> Result<Vec<Item>> {
        let items = self.registry.resolve(query)?;
        if is_pattern(query) && !all_versions {
            Ok(freshest(items))
        } else {
            Ok(items)
        }
    }

    async fn build_involved(&mut self, pairs: &[(Item, Item)]) -> Result<()> {
        let involved: BTreeSet<Identifier> = pairs
            .iter()
            .flat_map(|(runner, subject)| [runner.id.clone(), subject.id.clone()])
            .collect();
        for id in involved {
            self.registry.build(&id).await?;
        }
        Ok(())
    }

    /// Current registry view of a pair, picking up build states.
    fn refreshed(&self, runner: Item, subject: Item) -> (Item, Item) {
        let runner = self.registry.get(&runner.id).cloned().unwrap_or(runner);
        let subject = self.registry.get(&subject.id).cloned().unwrap_or(subject);
        (runner, subject)
    }
}

/// Two explicit identifiers must be of kinds that can ever pair. Globs are
/// left to the per-pair kind check.
fn ensure_pairable(first: &str, second: &str) -> Result<()> {
    if is_pattern(first) || is_pattern(second) {
        return Ok(());
    }
    let (a, _) = Identifier::parse_query(first).map_err(RegistryError::from)?;
    let (b, _) = Identifier::parse_query(second).map_err(RegistryError::from)?;
    if a.kind().counterparts().contains(&b.kind()) {
        Ok(())
    } else {
        Err(PipelineError::InvalidPairing {
            first: first.to_string(),
            first_kind: a.kind(),
            second: second.to_string(),
            second_kind: b.kind(),
        })
    }
}

/// Put the runner first when exactly one side is a runner.
fn orient(a: Item, b: Item) -> (Item, Item) {
    if !a.kind().is_runner() && b.kind().is_runner() {
        (b, a)
    } else {
        (a, b)
    }
}
