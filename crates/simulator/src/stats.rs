//! Dissemination run measurements
//!
//! Snapshots of a run, taken once per triggered round, that answer the
//! questions a dissemination study asks: how many nodes a topic reached,
//! how quickly, at what message volume, and how much a coin policy traded
//! away. A [`RunReport`] is plain data, so it can be serialized and
//! compared across policies.

use serde::{Deserialize, Serialize};
use spora_types::Topic;

use crate::Simulation;

/// State of a run at the end of one round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundReport {
    /// Round number, starting at 1
    pub round: usize,
    /// Nodes holding any version of the observed topic
    pub infected: usize,
    /// Nodes holding exactly the observed timestamp
    pub holding: usize,
    /// Cumulative frames sent by the whole run so far
    pub frames_total: u64,
    /// Cumulative removed-set insertions across all nodes
    pub removals_total: usize,
}

/// Round-by-round measurements of one topic version spreading.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    /// Topic under observation
    pub topic: Topic,
    /// Timestamp under observation
    pub timestamp: u64,
    /// Number of nodes in the run
    pub population: usize,
    /// One entry per triggered round
    pub rounds: Vec<RoundReport>,
}

impl RunReport {
    /// First round after which every node held the observed version.
    pub fn converged_round(&self) -> Option<usize> {
        self.rounds
            .iter()
            .find(|report| report.holding == self.population)
            .map(|report| report.round)
    }

    /// Fraction of nodes holding the observed version at the end.
    pub fn final_coverage(&self) -> f64 {
        match self.rounds.last() {
            Some(report) if self.population > 0 => report.holding as f64 / self.population as f64,
            _ => 0.0,
        }
    }

    /// Total frames the run had sent by the last observed round.
    pub fn frames_sent(&self) -> u64 {
        self.rounds.last().map(|report| report.frames_total).unwrap_or(0)
    }

    /// Total removed-set insertions by the last observed round.
    pub fn removals(&self) -> usize {
        self.rounds
            .last()
            .map(|report| report.removals_total)
            .unwrap_or(0)
    }
}

impl Simulation {
    /// Snapshot the run's state for one topic version.
    pub fn observe(&self, round: usize, topic: &Topic, timestamp: u64) -> RoundReport {
        RoundReport {
            round,
            infected: self.infected(topic),
            holding: self.holding(topic, timestamp),
            frames_total: self.frames_sent(),
            removals_total: self
                .ids()
                .iter()
                .map(|id| self.node(*id).removed().len())
                .sum(),
        }
    }

    /// Drive rounds until every node holds `(topic, timestamp)` or
    /// `max_rounds` have run, recording a report per round.
    ///
    /// Gossip runs may legitimately finish short of full coverage; the
    /// report's [`RunReport::final_coverage`] says how short.
    pub async fn run_observed(&self, topic: &Topic, timestamp: u64, max_rounds: usize) -> RunReport {
        let mut report = RunReport {
            topic: topic.clone(),
            timestamp,
            population: self.ids().len(),
            rounds: Vec::with_capacity(max_rounds),
        };
        for round in 1..=max_rounds {
            self.run_round().await;
            let snapshot = self.observe(round, topic, timestamp);
            let done = snapshot.holding == report.population;
            report.rounds.push(snapshot);
            if done {
                break;
            }
        }
        report
    }
}
