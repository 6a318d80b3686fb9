//! Min-cost flow on a directed graph with integer capacities and real costs.
//!
//! Successive shortest paths: each augmentation follows a cheapest source → sink path of the
//! residual graph, found with Dijkstra on costs reduced by node potentials. All arc costs
//! must be non-negative when the graph is built; the potentials keep the reduced costs
//! non-negative afterwards (up to rounding, which is clamped).
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

#[derive(Debug, Clone)]
struct Edge {
    to: usize,
    /// residual capacity
    cap: i64,
    cost: f64,
    initial: i64,
}

/// Total flow pushed and its cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FlowResult {
    pub flow: i64,
    pub cost: f64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FlowGraph {
    edges: Vec<Edge>,
    adj: Vec<Vec<usize>>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self) -> usize {
        self.adj.push(Vec::new());
        self.adj.len() - 1
    }

    pub fn n_nodes(&self) -> usize {
        self.adj.len()
    }

    pub fn n_arcs(&self) -> usize {
        self.edges.len() / 2
    }

    /// Add an arc and its residual twin; returns the arc id.
    pub fn add_arc(&mut self, from: usize, to: usize, cap: i64, cost: f64) -> usize {
        let id = self.edges.len();
        self.edges.push(Edge {
            to,
            cap,
            cost,
            initial: cap,
        });
        self.edges.push(Edge {
            to: from,
            cap: 0,
            cost: -cost,
            initial: 0,
        });
        self.adj[from].push(id);
        self.adj[to].push(id + 1);
        id
    }

    /// Flow currently carried by arc `id`.
    pub fn flow(&self, id: usize) -> i64 {
        self.edges[id].initial - self.edges[id].cap
    }

    /// Push as much flow as possible from `source` to `sink` at minimum cost.
    pub fn min_cost_flow(&mut self, source: usize, sink: usize) -> FlowResult {
        let n = self.adj.len();
        let mut potential = vec![0.0; n];
        let mut dist = vec![f64::INFINITY; n];
        let mut prev_edge = vec![usize::MAX; n];
        let mut result = FlowResult { flow: 0, cost: 0.0 };

        loop {
            dist.fill(f64::INFINITY);
            prev_edge.fill(usize::MAX);
            dist[source] = 0.0;

            let mut heap = BinaryHeap::new();
            heap.push(Reverse((OrderedFloat(0.0), source)));
            while let Some(Reverse((OrderedFloat(d), u))) = heap.pop() {
                if d > dist[u] {
                    continue;
                }
                for &e in &self.adj[u] {
                    let edge = &self.edges[e];
                    if edge.cap <= 0 {
                        continue;
                    }
                    let reduced = (edge.cost + potential[u] - potential[edge.to]).max(0.0);
                    let nd = d + reduced;
                    if nd < dist[edge.to] {
                        dist[edge.to] = nd;
                        prev_edge[edge.to] = e;
                        heap.push(Reverse((OrderedFloat(nd), edge.to)));
                    }
                }
            }

            if !dist[sink].is_finite() {
                break;
            }
            for (p, d) in potential.iter_mut().zip(&dist) {
                if d.is_finite() {
                    *p += d;
                }
            }

            // bottleneck of the path
            let mut push = i64::MAX;
            let mut v = sink;
            while v != source {
                let e = prev_edge[v];
                push = push.min(self.edges[e].cap);
                v = self.edges[e ^ 1].to;
            }

            let mut v = sink;
            while v != source {
                let e = prev_edge[v];
                self.edges[e].cap -= push;
                self.edges[e ^ 1].cap += push;
                result.cost += push as f64 * self.edges[e].cost;
                v = self.edges[e ^ 1].to;
            }
            result.flow += push;
        }

        result
    }
}
