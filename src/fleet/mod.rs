mod progress;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;

use crate::models::Host;

pub use progress::Progress;

/// Terminal state of one host's unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    Changed,
    Failed(String),
}

impl Outcome {
    pub fn changed(changed: bool) -> Self {
        if changed {
            Outcome::Changed
        } else {
            Outcome::Unchanged
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// AggregatedResult maps every targeted host to its outcome for one run
#[derive(Debug, Clone, Default)]
pub struct AggregatedResult {
    pub name: String,
    results: BTreeMap<String, Outcome>,
}

impl AggregatedResult {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            results: BTreeMap::new(),
        }
    }

    pub fn get(&self, host: &str) -> Option<&Outcome> {
        self.results.get(host)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Outcome)> {
        self.results.iter()
    }

    /// Hosts that failed, with their causes
    pub fn failed(&self) -> impl Iterator<Item = (&String, &str)> {
        self.results.iter().filter_map(|(host, outcome)| match outcome {
            Outcome::Failed(cause) => Some((host, cause.as_str())),
            _ => None,
        })
    }

    pub fn changed(&self) -> impl Iterator<Item = &String> {
        self.results
            .iter()
            .filter(|(_, outcome)| **outcome == Outcome::Changed)
            .map(|(host, _)| host)
    }

    pub fn is_failed(&self) -> bool {
        self.results.values().any(Outcome::is_failed)
    }

    fn insert(&mut self, host: String, outcome: Outcome) {
        self.results.insert(host, outcome);
    }
}

/// Fleet is an ordered, immutable view over inventory hosts
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    hosts: Vec<Arc<Host>>,
}

impl Fleet {
    pub fn new(hosts: Vec<Arc<Host>>) -> Self {
        Self { hosts }
    }

    pub fn hosts(&self) -> &[Arc<Host>] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Hosts that are members of `group`
    pub fn in_group(&self, group: &str) -> Fleet {
        self.filter(|host| host.in_group(group))
    }

    /// Hosts that did not fail in `result`; hosts it does not cover are kept
    pub fn without_failed(&self, result: &AggregatedResult) -> Fleet {
        self.filter(|host| !result.get(&host.name).is_some_and(Outcome::is_failed))
    }

    pub fn filter<P>(&self, predicate: P) -> Fleet
    where
        P: Fn(&Host) -> bool,
    {
        Fleet {
            hosts: self
                .hosts
                .iter()
                .filter(|host| predicate(host))
                .cloned()
                .collect(),
        }
    }

    /// Run `work` once per host concurrently and collect one outcome per host.
    ///
    /// An error or panic in one host's unit of work is recorded as
    /// `Outcome::Failed` for that host and never affects the others. The
    /// returned result always holds exactly one entry per host of the fleet.
    pub async fn run<F, Fut>(&self, title: &str, total_units: u64, work: F) -> AggregatedResult
    where
        F: Fn(Arc<Host>, Progress) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome>> + Send + 'static,
    {
        let progress = Progress::new(title, total_units);
        let result = self.run_with(title, &progress, work).await;
        progress.finish();
        result
    }

    /// Same as [`Fleet::run`] with a caller-provided progress handle
    pub async fn run_with<F, Fut>(&self, title: &str, progress: &Progress, work: F) -> AggregatedResult
    where
        F: Fn(Arc<Host>, Progress) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome>> + Send + 'static,
    {
        tracing::info!("{} ({} hosts)", title, self.hosts.len());
        let work = Arc::new(work);

        let handles: Vec<_> = self
            .hosts
            .iter()
            .map(|host| {
                let work = work.clone();
                let host = host.clone();
                let progress = progress.clone();
                tokio::spawn(async move { work(host, progress).await })
            })
            .collect();

        let mut result = AggregatedResult::new(title);
        let joined = futures::future::join_all(handles).await;
        for (host, joined) in self.hosts.iter().zip(joined) {
            let outcome = match joined {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    tracing::debug!("{}: {:#}", host.name, e);
                    Outcome::Failed(format!("{:#}", e))
                }
                Err(e) => {
                    tracing::error!("{}: task aborted: {}", host.name, e);
                    Outcome::Failed(format!("task aborted: {}", e))
                }
            };
            result.insert(host.name.clone(), outcome);
        }
        result
    }
}
