//! Execution plan: phase grouping and topological levels.

use crate::model::CqsType;
use std::collections::BTreeSet;

pub const PHASES: [CqsType; 3] = [CqsType::Signal, CqsType::C, CqsType::Q];

/// Components grouped by phase (Signal, C, Q), each phase split into levels.
///
/// Members of one level have no same-step data dependency on each other.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub phases: [Vec<Vec<usize>>; 3],
    /// Components on a same-phase cycle, in insertion order.
    pub cyclic: Vec<usize>,
}

impl ExecutionPlan {
    /// `edges` are `(writer, reader)` signal dependencies between component indices.
    pub fn build(roles: &[CqsType], edges: &[(usize, usize)]) -> Self {
        let mut plan = ExecutionPlan::default();
        for (slot, phase) in PHASES.iter().enumerate() {
            let members: Vec<usize> = (0..roles.len()).filter(|&i| roles[i] == *phase).collect();
            let (levels, cyclic) = levels(&members, edges);
            plan.phases[slot] = levels;
            plan.cyclic.extend(cyclic);
        }
        plan
    }

    /// Flattened order: Signal phase, then C, then Q.
    pub fn order(&self) -> impl Iterator<Item = usize> + '_ {
        self.phases.iter().flatten().flatten().copied()
    }

    pub fn levels(&self) -> impl Iterator<Item = &[usize]> {
        self.phases.iter().flatten().map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.order().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Kahn's algorithm over `members`, one level per wave of zero in-degree nodes.
///
/// When every remaining node waits on another, the lowest-index node on a cycle
/// runs alone and levelling resumes. Only nodes on a cycle are reported.
fn levels(members: &[usize], edges: &[(usize, usize)]) -> (Vec<Vec<usize>>, Vec<usize>) {
    let in_phase: BTreeSet<usize> = members.iter().copied().collect();
    let local: Vec<(usize, usize)> = edges
        .iter()
        .copied()
        .filter(|(a, b)| a != b && in_phase.contains(a) && in_phase.contains(b))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut remaining = in_phase;
    let mut cyclic = BTreeSet::new();
    let mut out = Vec::new();
    while !remaining.is_empty() {
        let ready: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|n| !local.iter().any(|(a, b)| b == n && remaining.contains(a)))
            .collect();
        if !ready.is_empty() {
            for n in &ready {
                remaining.remove(n);
            }
            out.push(ready);
            continue;
        }

        let looped: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&n| on_cycle(n, &local, &remaining))
            .collect();
        let Some(first) = looped.first().or(remaining.first()).copied() else {
            break;
        };
        cyclic.extend(looped);
        remaining.remove(&first);
        out.push(vec![first]);
    }
    (out, cyclic.into_iter().collect())
}

/// Whether `start` can reach itself through `edges` restricted to `alive`.
fn on_cycle(start: usize, edges: &[(usize, usize)], alive: &BTreeSet<usize>) -> bool {
    let mut seen = BTreeSet::new();
    let mut stack = vec![start];
    while let Some(n) = stack.pop() {
        for &(a, b) in edges {
            if a != n || !alive.contains(&b) {
                continue;
            }
            if b == start {
                return true;
            }
            if seen.insert(b) {
                stack.push(b);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use CqsType::{C, Q, Signal as S};
    use proptest::prelude::*;

    #[test]
    fn phases_are_ordered_signal_c_q() {
        let plan = ExecutionPlan::build(&[Q, C, S, C], &[]);
        let order: Vec<usize> = plan.order().collect();
        assert_eq!(order, vec![2, 1, 3, 0]);
        assert_eq!(plan.phases[1], vec![vec![1, 3]]);
    }

    #[test]
    fn signal_chain_is_levelled() {
        // 2 -> 0 -> 1, 3 independent
        let plan = ExecutionPlan::build(&[S, S, S, S], &[(2, 0), (0, 1)]);
        assert_eq!(plan.phases[0], vec![vec![2, 3], vec![0], vec![1]]);
        assert!(plan.cyclic.is_empty());
    }

    #[test]
    fn cross_phase_edges_are_ignored() {
        let plan = ExecutionPlan::build(&[Q, S], &[(0, 1)]);
        assert_eq!(plan.phases[0], vec![vec![1]]);
        assert_eq!(plan.phases[2], vec![vec![0]]);
    }

    #[test]
    fn cycles_fall_back_to_insertion_order() {
        // 0 -> 1 -> 0, 2 -> 0
        let plan = ExecutionPlan::build(&[S, S, S], &[(0, 1), (1, 0), (2, 0)]);
        assert_eq!(plan.phases[0], vec![vec![2], vec![0], vec![1]]);
        assert_eq!(plan.cyclic, vec![0, 1]);
    }

    #[test]
    fn components_fed_by_a_loop_are_not_loop_members() {
        // 0 <-> 1, 1 -> 3 -> 4
        let plan = ExecutionPlan::build(&[S, S, S, S, S], &[(0, 1), (1, 0), (1, 3), (3, 4)]);
        assert_eq!(plan.cyclic, vec![0, 1]);
        assert_eq!(
            plan.phases[0],
            vec![vec![2], vec![0], vec![1], vec![3], vec![4]]
        );
    }

    #[test]
    fn separate_loops_are_both_reported() {
        // 0 <-> 1 and 2 -> 3 -> 4 -> 2
        let edges = [(0, 1), (1, 0), (2, 3), (3, 4), (4, 2)];
        let plan = ExecutionPlan::build(&[S, S, S, S, S], &edges);
        assert_eq!(plan.cyclic, vec![0, 1, 2, 3, 4]);
        assert_eq!(plan.len(), 5);
    }

    fn role() -> impl Strategy<Value = CqsType> {
        prop_oneof![Just(C), Just(Q), Just(S)]
    }

    fn position(plan: &ExecutionPlan) -> Vec<Option<usize>> {
        let mut at = vec![None; plan.len()];
        for (level, members) in plan.levels().enumerate() {
            for &n in members {
                at[n] = Some(level);
            }
        }
        at
    }

    proptest! {
        #[test]
        fn acyclic_edges_run_writer_first(
            roles in prop::collection::vec(role(), 1..24),
            raw in prop::collection::vec((0usize..24, 0usize..24), 0..60),
        ) {
            let n = roles.len();
            let edges: Vec<(usize, usize)> = raw
                .into_iter()
                .map(|(a, b)| (a % n, b % n))
                .filter(|(a, b)| a < b)
                .collect();
            let plan = ExecutionPlan::build(&roles, &edges);
            prop_assert!(plan.cyclic.is_empty());
            let at = position(&plan);
            prop_assert!(at.iter().all(Option::is_some));
            for (a, b) in edges {
                if roles[a] == roles[b] {
                    prop_assert!(at[a] < at[b], "{a} -> {b}");
                }
            }
        }

        #[test]
        fn every_component_is_planned_once(
            roles in prop::collection::vec(role(), 1..16),
            raw in prop::collection::vec((0usize..16, 0usize..16), 0..40),
        ) {
            let n = roles.len();
            let edges: Vec<(usize, usize)> = raw.into_iter().map(|(a, b)| (a % n, b % n)).collect();
            let plan = ExecutionPlan::build(&roles, &edges);
            let mut order: Vec<usize> = plan.order().collect();
            order.sort_unstable();
            prop_assert_eq!(order, (0..n).collect::<Vec<_>>());
            for &c in &plan.cyclic {
                let alive: BTreeSet<usize> = (0..n).filter(|&i| roles[i] == roles[c]).collect();
                let local: Vec<(usize, usize)> = edges
                    .iter()
                    .copied()
                    .filter(|(a, b)| a != b && alive.contains(a) && alive.contains(b))
                    .collect();
                prop_assert!(on_cycle(c, &local, &alive), "{c} is not on a loop");
            }
        }
    }
}
