//! Finite-domain constraint solver for slot assignment.
//!
//! Every session is a variable over the slot domain `0..K`. Constraints are
//! all-different groups (one per faculty member, room and student). Pairwise
//! `!=` arcs are never materialized: a variable's neighbours are the other
//! members of its groups, and a pair in several groups answers to the lowest
//! group index. The search is depth-first backtracking that maintains arc
//! consistency after every assignment and checks each touched group for the
//! pigeonhole condition.

use itertools::Itertools;
use log::{debug, trace};
use std::cmp::Reverse;
use std::time::Instant;

use crate::data::{ConstraintClass, SlotIndex};
use crate::model::Problem;

/// Bitset of the slots still available to one variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSet {
    words: Vec<u64>,
    len: usize,
}

impl SlotSet {
    pub fn full(size: usize) -> Self {
        let mut words = vec![u64::MAX; size.div_ceil(64)];
        if size % 64 != 0 {
            if let Some(last) = words.last_mut() {
                *last = (1u64 << (size % 64)) - 1;
            }
        }
        Self { words, len: size }
    }

    pub fn empty(size: usize) -> Self {
        Self {
            words: vec![0; size.div_ceil(64)],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, value: SlotIndex) -> bool {
        self.words
            .get(value / 64)
            .is_some_and(|word| (word >> (value % 64)) & 1 == 1)
    }

    /// Returns `true` if the value was absent.
    pub fn insert(&mut self, value: SlotIndex) -> bool {
        let Some(word) = self.words.get_mut(value / 64) else {
            return false;
        };
        let mask = 1u64 << (value % 64);
        if *word & mask != 0 {
            return false;
        }
        *word |= mask;
        self.len += 1;
        true
    }

    /// Returns `true` if the value was present.
    pub fn remove(&mut self, value: SlotIndex) -> bool {
        let Some(word) = self.words.get_mut(value / 64) else {
            return false;
        };
        let mask = 1u64 << (value % 64);
        if *word & mask == 0 {
            return false;
        }
        *word &= !mask;
        self.len -= 1;
        true
    }

    pub fn first(&self) -> Option<SlotIndex> {
        self.iter().next()
    }

    /// Values in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = SlotIndex> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(i * 64 + bit)
            })
        })
    }

    pub fn union_with(&mut self, other: &SlotSet) {
        for (word, other) in self.words.iter_mut().zip(&other.words) {
            *word |= *other;
        }
        self.len = self.words.iter().map(|w| w.count_ones() as usize).sum();
    }
}

/// Variables that must all take different slots.
#[derive(Debug, Clone)]
pub struct AllDifferent {
    pub class: ConstraintClass,
    /// Faculty, room or student id, for logging.
    pub label: String,
    pub vars: Vec<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CspStats {
    pub nodes: u64,
    pub backtracks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CspOutcome {
    /// One slot per variable, all constraints satisfied.
    Solved(Vec<SlotIndex>),
    /// The search space is exhausted. `hint` is the class of the constraint
    /// that most recently failed.
    Infeasible { hint: Option<ConstraintClass> },
    /// The deadline passed; the partial assignment was completed arbitrarily
    /// and may violate constraints.
    DeadlineExceeded(Vec<SlotIndex>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CspResult {
    pub outcome: CspOutcome,
    pub stats: CspStats,
}

/// Slot assignment model: variables over `0..domain_size` and all-different groups.
#[derive(Debug, Clone)]
pub struct SlotCsp {
    domain_size: usize,
    groups: Vec<AllDifferent>,
    /// Group indices per variable, ascending.
    var_groups: Vec<Vec<usize>>,
    /// Sum of `group size - 1` over the variable's groups.
    degrees: Vec<usize>,
    /// First group with more members than slots.
    refuted_by: Option<usize>,
}

impl SlotCsp {
    pub fn new(num_vars: usize, domain_size: usize) -> Self {
        Self {
            domain_size,
            groups: Vec::new(),
            var_groups: vec![Vec::new(); num_vars],
            degrees: vec![0; num_vars],
            refuted_by: None,
        }
    }

    /// Builds the model for a problem whose sessions are bound.
    ///
    /// Faculty groups are added first, then rooms, then students, so a pair
    /// constrained for several reasons is tagged with the first of them.
    /// Building is linear in the total group membership.
    pub fn for_problem(problem: &Problem) -> Self {
        let mut csp = Self::new(problem.sessions.len(), problem.domain.len());

        let by_faculty = problem
            .sessions
            .iter()
            .filter_map(|s| s.faculty_id.as_deref().map(|id| (id, s.id)))
            .into_group_map();
        for (id, vars) in by_faculty.into_iter().sorted() {
            csp.add_all_different(ConstraintClass::Faculty, id, vars);
        }

        let by_room = problem
            .sessions
            .iter()
            .filter_map(|s| s.room_id.as_deref().map(|id| (id, s.id)))
            .into_group_map();
        for (id, vars) in by_room.into_iter().sorted() {
            csp.add_all_different(ConstraintClass::Room, id, vars);
        }

        let by_course = problem.sessions_by_course();
        for student in &problem.students {
            let vars: Vec<usize> = student
                .enrolled_courses
                .iter()
                .unique()
                .filter_map(|course| by_course.get(course.as_str()))
                .flatten()
                .copied()
                .sorted()
                .collect();
            csp.add_all_different(ConstraintClass::StudentOverlap, &student.id, vars);
        }
        csp
    }

    pub fn num_vars(&self) -> usize {
        self.var_groups.len()
    }

    pub fn domain_size(&self) -> usize {
        self.domain_size
    }

    pub fn groups(&self) -> &[AllDifferent] {
        &self.groups
    }

    /// Requires every variable in `vars` to take a distinct slot.
    pub fn add_all_different(&mut self, class: ConstraintClass, label: &str, vars: Vec<usize>) {
        let vars: Vec<usize> = vars.into_iter().unique().collect();
        if vars.len() < 2 {
            return;
        }
        let index = self.groups.len();
        if vars.len() > self.domain_size && self.refuted_by.is_none() {
            debug!(
                "{} group `{}` has {} sessions for {} slots",
                class,
                label,
                vars.len(),
                self.domain_size
            );
            self.refuted_by = Some(index);
        }
        for &var in &vars {
            self.var_groups[var].push(index);
            self.degrees[var] += vars.len() - 1;
        }
        trace!("{} group `{}` over {} sessions", class, label, vars.len());
        self.groups.push(AllDifferent {
            class,
            label: label.to_string(),
            vars,
        });
    }

    /// Searches for the first complete assignment satisfying every group.
    pub fn solve(&self, deadline: Option<Instant>) -> CspResult {
        if let Some(index) = self.refuted_by {
            return CspResult {
                outcome: CspOutcome::Infeasible {
                    hint: Some(self.groups[index].class),
                },
                stats: CspStats::default(),
            };
        }

        let mut search = Search {
            csp: self,
            domains: vec![SlotSet::full(self.domain_size); self.num_vars()],
            assigned: vec![false; self.num_vars()],
            trail: Vec::new(),
            last_conflict: None,
            deadline,
            stats: CspStats::default(),
            group_stamps: vec![0; self.groups.len()],
            stamp: 0,
        };

        let outcome = if !search.initial_propagation() {
            debug!("Constraint model refuted before search ({:?})", search.last_conflict);
            CspOutcome::Infeasible {
                hint: search.last_conflict,
            }
        } else {
            match search.search() {
                Ok(true) => CspOutcome::Solved(search.current_assignment()),
                Ok(false) => CspOutcome::Infeasible {
                    hint: search.last_conflict,
                },
                Err(DeadlineReached) => CspOutcome::DeadlineExceeded(search.current_assignment()),
            }
        };
        debug!(
            "CSP search finished after {} nodes and {} backtracks",
            search.stats.nodes, search.stats.backtracks
        );
        CspResult {
            outcome,
            stats: search.stats,
        }
    }
}

struct DeadlineReached;

struct Search<'a> {
    csp: &'a SlotCsp,
    domains: Vec<SlotSet>,
    assigned: Vec<bool>,
    /// Removed (variable, value) pairs, undone on backtrack.
    trail: Vec<(usize, SlotIndex)>,
    last_conflict: Option<ConstraintClass>,
    deadline: Option<Instant>,
    stats: CspStats,
    group_stamps: Vec<u64>,
    stamp: u64,
}

impl Search<'_> {
    fn initial_propagation(&mut self) -> bool {
        if self.domains.iter().any(SlotSet::is_empty) {
            return false;
        }
        let all: Vec<usize> = (0..self.domains.len()).collect();
        if !self.check_groups(&all) {
            return false;
        }
        let singletons: Vec<usize> = all
            .into_iter()
            .filter(|&var| self.domains[var].len() == 1)
            .collect();
        self.propagate(singletons)
    }

    fn search(&mut self) -> Result<bool, DeadlineReached> {
        self.stats.nodes += 1;
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(DeadlineReached);
        }
        let Some(var) = self.select_var() else {
            return Ok(true);
        };

        let values: Vec<SlotIndex> = self.domains[var].iter().collect();
        for value in values {
            let mark = self.trail.len();
            self.assigned[var] = true;
            if self.assign(var, value) && self.search()? {
                return Ok(true);
            }
            self.undo(mark);
            self.assigned[var] = false;
            self.stats.backtracks += 1;
        }
        Ok(false)
    }

    /// Most constrained variable first, ties broken by degree then index.
    fn select_var(&self) -> Option<usize> {
        (0..self.domains.len())
            .filter(|&var| !self.assigned[var])
            .min_by_key(|&var| {
                (
                    self.domains[var].len(),
                    Reverse(self.csp.degrees[var]),
                    var,
                )
            })
    }

    fn assign(&mut self, var: usize, value: SlotIndex) -> bool {
        let others: Vec<SlotIndex> = self.domains[var].iter().filter(|&v| v != value).collect();
        for other in others {
            self.remove(var, other);
        }
        self.propagate(vec![var])
    }

    /// Removes the value of every singleton in `queue` from its neighbours,
    /// cascading through new singletons, then checks the touched groups.
    fn propagate(&mut self, mut queue: Vec<usize>) -> bool {
        let csp = self.csp;
        let mut touched = queue.clone();
        while let Some(var) = queue.pop() {
            let Some(value) = self.domains[var].first() else {
                return false;
            };
            for &index in &csp.var_groups[var] {
                let group = &csp.groups[index];
                for &other in &group.vars {
                    if other == var || !self.remove(other, value) {
                        continue;
                    }
                    touched.push(other);
                    match self.domains[other].len() {
                        0 => {
                            self.last_conflict = Some(group.class);
                            return false;
                        }
                        1 => queue.push(other),
                        _ => {}
                    }
                }
            }
        }
        self.check_groups(&touched)
    }

    /// Fails when some group has more members than slots left to share among them.
    fn check_groups(&mut self, vars: &[usize]) -> bool {
        let csp = self.csp;
        self.stamp += 1;
        for &var in vars {
            for &index in &csp.var_groups[var] {
                if self.group_stamps[index] == self.stamp {
                    continue;
                }
                self.group_stamps[index] = self.stamp;

                let group = &csp.groups[index];
                let mut available = SlotSet::empty(csp.domain_size);
                for &member in &group.vars {
                    available.union_with(&self.domains[member]);
                }
                if available.len() < group.vars.len() {
                    trace!(
                        "{} group `{}` needs {} slots but only {} remain",
                        group.class,
                        group.label,
                        group.vars.len(),
                        available.len()
                    );
                    self.last_conflict = Some(group.class);
                    return false;
                }
            }
        }
        true
    }

    fn remove(&mut self, var: usize, value: SlotIndex) -> bool {
        let removed = self.domains[var].remove(value);
        if removed {
            self.trail.push((var, value));
        }
        removed
    }

    fn undo(&mut self, mark: usize) {
        while self.trail.len() > mark {
            if let Some((var, value)) = self.trail.pop() {
                self.domains[var].insert(value);
            }
        }
    }

    /// Assigned values, or the first remaining candidate of unassigned variables.
    fn current_assignment(&self) -> Vec<SlotIndex> {
        self.domains
            .iter()
            .map(|domain| domain.first().unwrap_or(0))
            .collect()
    }
}
