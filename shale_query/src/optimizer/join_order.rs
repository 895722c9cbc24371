use std::cmp::Ordering;

use tracing::debug;

/// One input to the join-order planner: a base relation with its estimated
/// output cardinality and the cost of scanning it once.
#[derive(Debug, Clone)]
pub struct JoinRelation {
    pub label: String,
    pub cardinality: f64,
    pub scan_cost: f64,
}

/// An equi-join predicate between two relations, with its estimated
/// selectivity.
#[derive(Debug, Clone)]
pub struct JoinEdge {
    pub left: usize,
    pub right: usize,
    pub selectivity: f64,
}

/// Past this many relations the subset enumeration is replaced by a greedy
/// build, the same escape hatch the dynamic program needs to stay
/// polynomial.
const DP_RELATION_LIMIT: usize = 8;

#[derive(Debug, Clone)]
struct PlanState {
    order: Vec<usize>,
    cost: f64,
    cardinality: f64,
}

fn better(a: &PlanState, b: &PlanState) -> Ordering {
    a.cost
        .total_cmp(&b.cost)
        .then_with(|| a.order.cmp(&b.order))
}

/// Selectivity product of every edge connecting `relation` to the set in
/// `mask`, and whether any such edge exists.
fn connection(relation: usize, mask: u32, edges: &[JoinEdge]) -> (f64, bool) {
    let mut selectivity = 1.0;
    let mut connected = false;
    for edge in edges {
        let touches = (edge.left == relation && mask & (1 << edge.right) != 0)
            || (edge.right == relation && mask & (1 << edge.left) != 0);
        if touches {
            selectivity *= edge.selectivity;
            connected = true;
        }
    }
    (selectivity, connected)
}

fn extend(prev: &PlanState, relation: usize, relations: &[JoinRelation], edges: &[JoinEdge]) -> (PlanState, bool) {
    let prev_mask = prev
        .order
        .iter()
        .fold(0u32, |mask, r| mask | (1 << *r));
    let (selectivity, connected) = connection(relation, prev_mask, edges);
    let mut order = prev.order.clone();
    order.push(relation);
    let state = PlanState {
        order,
        cost: prev.cost + prev.cardinality * relations[relation].scan_cost,
        cardinality: (prev.cardinality * relations[relation].cardinality * selectivity).max(1.0),
    };
    (state, connected)
}

/// Produces a left-deep join order over the given relations, minimizing
/// the accumulated `outer_rows * inner_scan_cost`. Subsets are enumerated
/// by increasing size; a cartesian extension is admitted for a subset only
/// when that subset has no predicate-connected alternative. Returns the
/// relation indices in execution order.
pub fn plan_left_deep(relations: &[JoinRelation], edges: &[JoinEdge]) -> Option<Vec<usize>> {
    if relations.is_empty() {
        return None;
    }
    let n = relations.len();
    if n > DP_RELATION_LIMIT {
        return plan_greedy(relations, edges);
    }

    let full_mask = (1u32 << n) - 1;
    let mut best: Vec<Option<PlanState>> = vec![None; (full_mask + 1) as usize];
    for (i, rel) in relations.iter().enumerate() {
        best[1 << i] = Some(PlanState {
            order: vec![i],
            cost: rel.scan_cost,
            cardinality: rel.cardinality,
        });
    }

    for size in 2..=n {
        for mask in 1..=full_mask {
            if mask.count_ones() != size as u32 {
                continue;
            }
            let mut best_connected: Option<PlanState> = None;
            let mut best_any: Option<PlanState> = None;
            for r in 0..n {
                if mask & (1 << r) == 0 {
                    continue;
                }
                let prev_mask = mask & !(1 << r);
                let Some(prev) = &best[prev_mask as usize] else {
                    continue;
                };
                let (candidate, connected) = extend(prev, r, relations, edges);
                if connected {
                    merge_best(&mut best_connected, candidate.clone());
                }
                merge_best(&mut best_any, candidate);
            }
            best[mask as usize] = best_connected.or(best_any);
        }
    }

    let plan = best[full_mask as usize].take()?;
    debug!(order = ?plan.order, cost = plan.cost, "left-deep join order chosen");
    Some(plan.order)
}

fn merge_best(slot: &mut Option<PlanState>, candidate: PlanState) {
    match slot {
        Some(current) if better(current, &candidate) != Ordering::Greater => {}
        _ => *slot = Some(candidate),
    }
}

/// Greedy build for wide joins: start from the first relation and keep
/// appending the cheapest extension, preferring predicate-connected
/// candidates over cartesian ones.
fn plan_greedy(relations: &[JoinRelation], edges: &[JoinEdge]) -> Option<Vec<usize>> {
    let n = relations.len();
    let mut current = PlanState {
        order: vec![0],
        cost: relations[0].scan_cost,
        cardinality: relations[0].cardinality,
    };
    let mut remaining: Vec<usize> = (1..n).collect();

    while !remaining.is_empty() {
        let mut best_connected: Option<PlanState> = None;
        let mut best_any: Option<PlanState> = None;
        for &r in &remaining {
            let (candidate, connected) = extend(&current, r, relations, edges);
            if connected {
                merge_best(&mut best_connected, candidate.clone());
            }
            merge_best(&mut best_any, candidate);
        }
        current = best_connected.or(best_any)?;
        let appended = *current.order.last().expect("order never empty");
        remaining.retain(|r| *r != appended);
    }
    Some(current.order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(label: &str, cardinality: f64, scan_cost: f64) -> JoinRelation {
        JoinRelation {
            label: label.to_string(),
            cardinality,
            scan_cost,
        }
    }

    fn edge(left: usize, right: usize, selectivity: f64) -> JoinEdge {
        JoinEdge {
            left,
            right,
            selectivity,
        }
    }

    #[test]
    fn single_relation_plans_itself() {
        let order = plan_left_deep(&[rel("t", 10.0, 100.0)], &[]).unwrap();
        assert_eq!(order, vec![0]);
    }

    #[test]
    fn no_relations_is_no_plan() {
        assert!(plan_left_deep(&[], &[]).is_none());
    }

    #[test]
    fn chain_starts_from_the_cheap_end() {
        let relations = [
            rel("big", 1000.0, 1000.0),
            rel("mid", 100.0, 100.0),
            rel("small", 10.0, 10.0),
        ];
        let edges = [edge(0, 1, 0.01), edge(1, 2, 0.1)];
        let order = plan_left_deep(&relations, &edges).unwrap();
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn cartesian_pair_puts_the_smaller_outer_first() {
        let relations = [rel("a", 10.0, 10.0), rel("b", 100.0, 100.0)];
        let order = plan_left_deep(&relations, &[]).unwrap();
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn isolated_relation_still_joins_in() {
        let relations = [
            rel("a", 50.0, 50.0),
            rel("b", 50.0, 50.0),
            rel("island", 5.0, 5.0),
        ];
        let edges = [edge(0, 1, 0.1)];
        let mut order = plan_left_deep(&relations, &edges).unwrap();
        order.sort();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn plans_are_stable_across_invocations() {
        let relations = [
            rel("a", 500.0, 500.0),
            rel("b", 500.0, 500.0),
            rel("c", 500.0, 500.0),
        ];
        let edges = [edge(0, 1, 0.01), edge(1, 2, 0.01), edge(0, 2, 0.01)];
        let expected = plan_left_deep(&relations, &edges).unwrap();
        for _ in 0..20 {
            assert_eq!(plan_left_deep(&relations, &edges).unwrap(), expected);
        }
    }

    #[test]
    fn wide_joins_fall_back_to_greedy() {
        let count = DP_RELATION_LIMIT + 1;
        let relations: Vec<_> = (0..count)
            .map(|i| rel(&format!("t{}", i), 100.0 + i as f64, 100.0))
            .collect();
        let edges: Vec<_> = (1..count).map(|i| edge(i - 1, i, 0.05)).collect();
        let mut order = plan_left_deep(&relations, &edges).unwrap();
        assert_eq!(order.len(), count);
        order.sort();
        assert_eq!(order, (0..count).collect::<Vec<_>>());
    }
}
