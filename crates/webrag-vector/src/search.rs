//! Exact nearest-neighbour scan over a flat row-major vector buffer.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// `sum((a_i - b_i)^2)`, no square root.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| { let d = x - y; d * d }).sum()
}

/// Max-heap entry: the worst candidate (largest distance, then latest
/// insertion) sits on top and is evicted first.
#[derive(Debug)]
struct Candidate {
    distance: f32,
    position: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.total_cmp(&other.distance).then(self.position.cmp(&other.position))
    }
}

/// The `k` rows of `vectors` closest to `query`, as `(position, distance)`
/// sorted by ascending distance with ties in insertion order.
///
/// `vectors.len()` must be a multiple of `query.len()`.
pub fn top_k_nearest(query: &[f32], vectors: &[f32], k: usize) -> Vec<(usize, f32)> {
    let dim = query.len();
    if k == 0 || dim == 0 {
        return Vec::new();
    }
    let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
    for (position, row) in vectors.chunks_exact(dim).enumerate() {
        let distance = squared_l2(query, row);
        if heap.len() == k {
            // Equal distance never displaces an earlier entry.
            if let Some(worst) = heap.peek() {
                if distance.total_cmp(&worst.distance) != Ordering::Less { continue; }
            }
        }
        heap.push(Candidate { distance, position });
        if heap.len() > k { heap.pop(); }
    }
    heap.into_sorted_vec().into_iter().map(|c| (c.position, c.distance)).collect()
}
