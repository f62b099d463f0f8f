//! Validation and ordering of one machine's units.

use std::collections::{BTreeSet, HashMap};

use rampart_common::error::{CompileError, Result};
use tracing::debug;

use super::Phase;
use crate::unit::{Precondition, Unit};

pub struct PlannedUnit {
    pub phase: Phase,
    pub unit: Box<dyn Unit>,
}

/// The units of one machine in execution order.
///
/// A plan only exists once its graph was validated: every precondition resolves to
/// a unit of the same machine, names are unique and there is no cycle.
pub struct MachinePlan {
    machine: String,
    units: Vec<PlannedUnit>,
}

impl MachinePlan {
    /// Validates `units` and orders them topologically.
    ///
    /// Among units that are ready at the same time, earlier phases go first and,
    /// within a phase, the order the units were collected in is kept.
    pub fn build(machine: &str, units: Vec<(Phase, Box<dyn Unit>)>) -> Result<Self> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(units.len());
        for (i, (_, unit)) in units.iter().enumerate() {
            if index.insert(unit.name(), i).is_some() {
                return Err(CompileError::DuplicateUnitName {
                    machine: machine.to_string(),
                    name: unit.name().to_string(),
                });
            }
        }

        // parent[i] is the unit that must pass before unit i
        let mut parent: Vec<Option<usize>> = Vec::with_capacity(units.len());
        for (_, unit) in &units {
            let resolved = match unit.precondition() {
                Precondition::Proceed => None,
                Precondition::After(handle) => {
                    let found = (handle.machine() == machine)
                        .then(|| index.get(handle.name()).copied())
                        .flatten();
                    if found.is_none() {
                        return Err(CompileError::UnknownPrecondition {
                            machine: machine.to_string(),
                            unit: unit.name().to_string(),
                            precondition: handle.to_string(),
                        });
                    }
                    found
                }
            };
            parent.push(resolved);
        }

        let order = topological_order(&units, &parent)
            .map_err(|cycle| CompileError::CycleDetected {
                machine: machine.to_string(),
                units: cycle.iter().map(|&i| units[i].1.name().to_string()).collect(),
            })?;

        let mut slots: Vec<Option<(Phase, Box<dyn Unit>)>> = units.into_iter().map(Some).collect();
        let units = order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .map(|(phase, unit)| PlannedUnit { phase, unit })
            .collect::<Vec<_>>();

        debug!(%machine, units = units.len(), "plan built");
        Ok(Self {
            machine: machine.to_string(),
            units,
        })
    }

    pub fn machine(&self) -> &str {
        &self.machine
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[PlannedUnit] {
        &self.units
    }

    /// Unit names in execution order.
    pub fn order(&self) -> Vec<&str> {
        self.units.iter().map(|p| p.unit.name()).collect()
    }

    pub(crate) fn into_units(self) -> Vec<PlannedUnit> {
        self.units
    }
}

/// Kahn's algorithm. On a cycle, returns the units forming it, first unit repeated last.
fn topological_order(
    units: &[(Phase, Box<dyn Unit>)],
    parent: &[Option<usize>],
) -> std::result::Result<Vec<usize>, Vec<usize>> {
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); units.len()];
    for (child, p) in parent.iter().enumerate() {
        if let Some(p) = p {
            children[*p].push(child);
        }
    }

    let mut ready: BTreeSet<(Phase, usize)> = parent
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_none())
        .map(|(i, _)| (units[i].0, i))
        .collect();

    let mut order = Vec::with_capacity(units.len());
    while let Some((phase, next)) = ready.pop_first() {
        order.push(next);
        for &child in &children[next] {
            ready.insert((units[child].0.max(phase), child));
        }
    }

    if order.len() == units.len() {
        return Ok(order);
    }

    // Every unit has at most one parent, so walking parents from any unplaced
    // unit ends up going round the cycle.
    let placed: BTreeSet<usize> = order.into_iter().collect();
    let start = (0..units.len()).find(|i| !placed.contains(i)).unwrap_or_default();
    let mut seen = vec![false; units.len()];
    let mut current = start;
    while !seen[current] {
        seen[current] = true;
        match parent[current] {
            Some(p) => current = p,
            None => break,
        }
    }

    let mut cycle = vec![current];
    let mut walk = parent[current];
    while let Some(p) = walk {
        if p == current {
            break;
        }
        cycle.push(p);
        walk = parent[p];
    }
    // parent pointers run against execution order
    cycle.reverse();
    cycle.push(cycle[0]);
    Err(cycle)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
