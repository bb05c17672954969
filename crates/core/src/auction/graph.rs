use super::AuctionRound;
use crate::domain::AuctionConfiguration;
use crate::MediationError;
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Directed acyclic graph of auction rounds
#[derive(Debug, Clone)]
pub struct AuctionGraph {
    /// Rounds in configuration order
    rounds: Vec<AuctionRound>,

    /// Round lookup by identifier
    index: HashMap<String, usize>,

    /// Rounds started when the auction starts
    roots: Vec<usize>,

    /// Successor rounds by round
    seeds: HashMap<usize, Vec<usize>>,

    /// Number of predecessors by round
    predecessors: Vec<usize>,
}

impl AuctionGraph {
    /// Builds a graph from rounds and an explicit successor mapping.
    ///
    /// Roots are the rounds that never appear as a seed.
    pub fn new(
        rounds: Vec<AuctionRound>,
        seeds: &HashMap<String, Vec<String>>,
    ) -> crate::Result<Self> {
        if rounds.is_empty() {
            return Err(MediationError::InvalidConfiguration(
                "auction has no rounds".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(rounds.len());
        for (position, round) in rounds.iter().enumerate() {
            if index.insert(round.id().to_string(), position).is_some() {
                return Err(MediationError::InvalidConfiguration(format!(
                    "duplicate round identifier '{}'",
                    round.id()
                )));
            }
        }

        let lookup = |id: &str| {
            index.get(id).copied().ok_or_else(|| {
                MediationError::InvalidConfiguration(format!("unknown round '{id}' in seeds"))
            })
        };

        let mut edges: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut predecessors = vec![0usize; rounds.len()];

        for (from, targets) in seeds {
            let from = lookup(from.as_str())?;
            let successors = edges.entry(from).or_default();
            for target in targets {
                let target = lookup(target.as_str())?;
                if successors.contains(&target) {
                    continue;
                }
                successors.push(target);
                predecessors[target] += 1;
            }
        }

        // HashMap iteration order is random; keep successors in configuration order
        for successors in edges.values_mut() {
            successors.sort_unstable();
        }

        let roots: Vec<usize> = (0..rounds.len())
            .filter(|&position| predecessors[position] == 0)
            .collect();

        let graph = Self {
            rounds,
            index,
            roots,
            seeds: edges,
            predecessors,
        };

        graph.ensure_acyclic()?;
        Ok(graph)
    }

    /// Builds a waterfall of rounds where each round seeds the next one
    pub fn chain(rounds: Vec<AuctionRound>) -> crate::Result<Self> {
        let seeds = rounds
            .windows(2)
            .map(|pair| (pair[0].id().to_string(), vec![pair[1].id().to_string()]))
            .collect();
        Self::new(rounds, &seeds)
    }

    /// Builds the graph described by an auction configuration
    pub fn from_configuration(configuration: &AuctionConfiguration) -> crate::Result<Self> {
        let rounds = configuration.rounds.iter().map(AuctionRound::from).collect();
        match &configuration.seeds {
            Some(seeds) => Self::new(rounds, seeds),
            None => Self::chain(rounds),
        }
    }

    /// Kahn's algorithm: every round must be reachable in topological order
    fn ensure_acyclic(&self) -> crate::Result<()> {
        let mut remaining = self.predecessors.clone();
        let mut queue: VecDeque<usize> = self.roots.iter().copied().collect();
        let mut visited = 0;

        while let Some(position) = queue.pop_front() {
            visited += 1;
            for &seed in self.seeds.get(&position).into_iter().flatten() {
                remaining[seed] -= 1;
                if remaining[seed] == 0 {
                    queue.push_back(seed);
                }
            }
        }

        if visited != self.rounds.len() {
            return Err(MediationError::InvalidConfiguration(
                "auction rounds contain a cycle".to_string(),
            ));
        }
        Ok(())
    }

    /// Rounds without predecessors
    pub fn roots(&self) -> Vec<&AuctionRound> {
        self.roots.iter().map(|&position| &self.rounds[position]).collect()
    }

    /// Rounds unlocked by the completion of `round_id`
    pub fn seeds(&self, round_id: &str) -> Vec<&AuctionRound> {
        self.index
            .get(round_id)
            .and_then(|position| self.seeds.get(position))
            .map(|seeds| seeds.iter().map(|&seed| &self.rounds[seed]).collect())
            .unwrap_or_default()
    }

    /// Number of rounds that must complete before `round_id` starts
    pub fn predecessors(&self, round_id: &str) -> usize {
        self.index
            .get(round_id)
            .map(|&position| self.predecessors[position])
            .unwrap_or_default()
    }

    pub fn round(&self, round_id: &str) -> Option<&AuctionRound> {
        self.index.get(round_id).map(|&position| &self.rounds[position])
    }

    /// Position of the round in configuration order
    pub fn position(&self, round_id: &str) -> Option<usize> {
        self.index.get(round_id).copied()
    }

    pub fn rounds(&self) -> &[AuctionRound] {
        &self.rounds
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}

impl fmt::Display for AuctionGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roots: Vec<&str> = self.roots().into_iter().map(AuctionRound::id).collect();
        write!(f, "auction with {} rounds, roots: [{}]", self.len(), roots.join(", "))
    }
}
