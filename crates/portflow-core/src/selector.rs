//! # Context Selector
//!
//! One resolution run over a set of representation nodes.
//!
//! The selector indexes every port once (nodes in order, ports in order),
//! enumerates every combination of candidate connection lines, writes each
//! combination into a pairwise relationship matrix and keeps the combinations
//! whose matrix validates. Exactly one survivor is committed to the nodes;
//! zero or several is an error and no node is touched.
//!
//! A selector over shared borrows can enumerate and pick a winner
//! (`valid_configurations`, `resolve`); committing needs mutable borrows.
//!
//! ## Matrix Layout
//!
//! For a port `p` with link partner `q`, cell `[idx(p)][idx(q)]` holds the
//! role code `p` takes under the selected line. Both directions of a link are
//! written because both owners contribute their own line. Ports that are not
//! linked, or whose partner is not part of this run, write nothing.

use crate::matrix::IntMatrix;
use crate::node::{ConnectionLine, RepresentationNode};
use crate::primitives::DEFAULT_MAX_COMBINATIONS;
use crate::variants::{VariantIter, combination_count};
use crate::{PortId, PortRole, PortflowError};
use std::borrow::{Borrow, BorrowMut};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Pairwise check over `(matrix[i][j], matrix[j][i])`. Zero means no conflict.
pub type PairValidator = fn(i32, i32) -> i32;

/// Lifecycle of one resolution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorPhase {
    Initialized,
    Enumerating,
    Validating,
    Committed,
    Failed,
}

/// Default pairwise validator.
///
/// `Neutral` on either side imposes nothing. Otherwise `Input` counts -1 and
/// `Output` +1; any other code counts as a large sentinel so it never
/// cancels out. A link is consistent iff the two sides sum to zero.
#[must_use]
pub fn default_validator(a: i32, b: i32) -> i32 {
    let neutral = PortRole::Neutral.code();
    if a == neutral || b == neutral {
        return 0;
    }
    direction_weight(a) + direction_weight(b)
}

fn direction_weight(code: i32) -> i32 {
    match PortRole::from_code(code) {
        Some(PortRole::Input) => -1,
        Some(PortRole::Output) => 1,
        _ => i32::from(i8::MAX),
    }
}

/// True iff `validator` reports no conflict for every pair `i < j`.
#[must_use]
pub fn validate_matrix(matrix: &IntMatrix, validator: PairValidator) -> bool {
    let (rows, cols) = matrix.dims();
    let size = rows.min(cols);
    for i in 0..size {
        for j in (i + 1)..size {
            let (Ok(forward), Ok(backward)) = (matrix.get(i, j), matrix.get(j, i)) else {
                return false;
            };
            if validator(forward, backward) != 0 {
                return false;
            }
        }
    }
    true
}

pub struct ContextSelector<N> {
    nodes: Vec<N>,
    port_index: BTreeMap<PortId, usize>,
    partners: Vec<Option<usize>>,
    lines: Vec<Vec<ConnectionLine>>,
    matrix: IntMatrix,
    max_combinations: usize,
    validator: PairValidator,
    phase: SelectorPhase,
}

impl<N: Borrow<RepresentationNode>> ContextSelector<N> {
    pub fn new(nodes: Vec<N>) -> Self {
        let mut port_index = BTreeMap::new();
        let mut links = Vec::new();
        for node in &nodes {
            let node: &RepresentationNode = node.borrow();
            for port in node.ports() {
                let next = port_index.len();
                port_index.entry(port.id()).or_insert(next);
                links.push(port.link());
            }
        }

        let partners = links
            .into_iter()
            .map(|link| link.and_then(|partner| port_index.get(&partner).copied()))
            .collect();

        let lines = nodes
            .iter()
            .map(|node| {
                let node: &RepresentationNode = node.borrow();
                node.connection_lines().to_vec()
            })
            .collect();

        let size = port_index.len();
        debug!(nodes = nodes.len(), ports = size, "selector initialized");

        Self {
            nodes,
            port_index,
            partners,
            lines,
            matrix: IntMatrix::filled(size, size, PortRole::Neutral.code()),
            max_combinations: DEFAULT_MAX_COMBINATIONS,
            validator: default_validator,
            phase: SelectorPhase::Initialized,
        }
    }

    /// Ceiling on the number of combinations enumerated.
    #[must_use]
    pub fn with_max_combinations(mut self, limit: usize) -> Self {
        self.max_combinations = limit;
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: PairValidator) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn phase(&self) -> SelectorPhase {
        self.phase
    }

    /// Number of distinct ports taking part in the run.
    #[must_use]
    pub fn port_count(&self) -> usize {
        self.port_index.len()
    }

    /// Candidate count per node, in node order.
    #[must_use]
    pub fn limits(&self) -> Vec<usize> {
        self.lines.iter().map(Vec::len).collect()
    }

    /// Every consistent combination, in lexicographic order.
    ///
    /// Nothing is committed.
    pub fn valid_configurations(&mut self) -> Result<Vec<Vec<usize>>, PortflowError> {
        let limits = self.limits();
        self.check_ceiling(&limits)?;

        self.phase = SelectorPhase::Enumerating;
        debug!(?limits, "enumerating combinations");

        let mut valid = Vec::new();
        for combination in VariantIter::new(&limits) {
            self.write_combination(&combination)?;
            if validate_matrix(&self.matrix, self.validator) {
                valid.push(combination);
            }
        }

        self.phase = SelectorPhase::Validating;
        debug!(valid = valid.len(), "enumeration finished");
        Ok(valid)
    }

    /// The single consistent combination. Nothing is committed.
    ///
    /// Zero survivors is `Unsatisfiable`, several is `Ambiguous` with every
    /// survivor listed.
    pub fn resolve(&mut self) -> Result<Vec<usize>, PortflowError> {
        let mut valid = match self.valid_configurations() {
            Ok(valid) => valid,
            Err(err) => return Err(self.fail(err)),
        };

        match valid.len() {
            0 => Err(self.fail(PortflowError::Unsatisfiable)),
            1 => Ok(valid.remove(0)),
            _ => Err(self.fail(PortflowError::Ambiguous(valid))),
        }
    }

    fn check_ceiling(&self, limits: &[usize]) -> Result<(), PortflowError> {
        let within = combination_count(limits).is_some_and(|count| count <= self.max_combinations);
        if within {
            return Ok(());
        }
        let combinations = limits
            .iter()
            .fold(1u128, |acc, &limit| acc.saturating_mul(limit as u128));
        Err(PortflowError::SearchSpaceTooLarge {
            combinations,
            limit: self.max_combinations,
        })
    }

    fn write_combination(&mut self, combination: &[usize]) -> Result<(), PortflowError> {
        self.matrix.fill(PortRole::Neutral.code());
        for (candidates, &choice) in self.lines.iter().zip(combination) {
            let Some(line) = candidates.get(choice) else {
                continue;
            };
            for (port, role) in line {
                let Some(&row) = self.port_index.get(port) else {
                    continue;
                };
                if let Some(Some(col)) = self.partners.get(row) {
                    self.matrix.set(row, *col, role.code())?;
                }
            }
        }
        Ok(())
    }

    fn fail(&mut self, err: PortflowError) -> PortflowError {
        self.phase = SelectorPhase::Failed;
        warn!(error = %err, "configuration failed");
        err
    }
}

impl<N: BorrowMut<RepresentationNode>> ContextSelector<N> {
    /// Resolve and commit. Returns the winning combination.
    pub fn configure(&mut self) -> Result<Vec<usize>, PortflowError> {
        let winner = self.resolve()?;

        for (node, &index) in self.nodes.iter_mut().zip(&winner) {
            let node: &mut RepresentationNode = node.borrow_mut();
            node.select_state(index)?;
        }

        self.phase = SelectorPhase::Committed;
        debug!(selection = ?winner, "configuration committed");
        Ok(winner)
    }
}

// =============================================================================
// TESTS
// =============================================================================
