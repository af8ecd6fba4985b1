//! Reverse Cuthill-McKee ordering
//!
//! Reduces the bandwidth of finite element matrices so that the banded
//! factorization stays cheap.
use std::collections::VecDeque;

/// Breadth-first traversal from `start`, children visited by increasing
/// degree. Returns the visiting order and the level of every visited node.
fn bfs(adj: &[Vec<usize>], start: usize, visited: &mut [bool]) -> (Vec<usize>, Vec<usize>) {
    let mut order = vec![start];
    let mut level = vec![0];
    let mut queue = VecDeque::from(vec![(start, 0_usize)]);
    visited[start] = true;
    let mut nbrs: Vec<usize> = Vec::new();
    while let Some((node, depth)) = queue.pop_front() {
        nbrs.clear();
        nbrs.extend(adj[node].iter().copied().filter(|&n| !visited[n]));
        nbrs.sort_by_key(|&n| (adj[n].len(), n));
        for &n in &nbrs {
            visited[n] = true;
            order.push(n);
            level.push(depth + 1);
            queue.push_back((n, depth + 1));
        }
    }
    (order, level)
}

/// Pseudo-peripheral node of the component containing `start`
fn peripheral(adj: &[Vec<usize>], start: usize, visited: &[bool]) -> usize {
    let mut node = start;
    let mut ecc = 0;
    loop {
        let mut scratch = visited.to_vec();
        let (order, level) = bfs(adj, node, &mut scratch);
        let depth = level.last().copied().unwrap_or(0);
        if depth <= ecc && node != start {
            return node;
        }
        ecc = depth;
        let far = order
            .iter()
            .zip(level.iter())
            .filter(|&(_, &l)| l == depth)
            .map(|(&n, _)| n)
            .min_by_key(|&n| adj[n].len());
        match far {
            Some(f) if f != node && depth > 0 => node = f,
            _ => return node,
        }
    }
}

/// Permutation `perm` such that row `i` of the reordered matrix is row
/// `perm[i]` of the original one. Handles disconnected graphs.
pub fn reverse_cuthill_mckee(adj: &[Vec<usize>]) -> Vec<usize> {
    let n = adj.len();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut by_degree: Vec<usize> = (0..n).collect();
    by_degree.sort_by_key(|&i| (adj[i].len(), i));
    for &seed in &by_degree {
        if visited[seed] {
            continue;
        }
        let start = peripheral(adj, seed, &visited);
        let (component, _) = bfs(adj, start, &mut visited);
        order.extend(component);
    }
    order.reverse();
    order
}
