use crate::plugin::{normalize_name, PluginData};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use tracing::{error, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeType {
    Hardcoded,
    MasterFlag,
    Master,
    MasterlistRequirement,
    UserRequirement,
    MasterlistLoadAfter,
    UserLoadAfter,
    Group,
    Priority,
    Overlap,
    TieBreak,
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EdgeType::Hardcoded => "Hardcoded",
            EdgeType::MasterFlag => "Master Flag",
            EdgeType::Master => "Master",
            EdgeType::MasterlistRequirement => "Masterlist Requirement",
            EdgeType::UserRequirement => "User Requirement",
            EdgeType::MasterlistLoadAfter => "Masterlist Load After",
            EdgeType::UserLoadAfter => "User Load After",
            EdgeType::Group => "Group",
            EdgeType::Priority => "Priority",
            EdgeType::Overlap => "Overlap",
            EdgeType::TieBreak => "Tie Break",
        };
        f.write_str(label)
    }
}

// The edge leads to the next step, wrapping back to the first at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleStep {
    pub name: String,
    pub edge: EdgeType,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    target: usize,
    kind: EdgeType,
}

#[derive(Debug, Default)]
pub struct PluginGraph {
    vertices: Vec<PluginData>,
    edges: Vec<Vec<Edge>>,
    index: HashMap<String, usize>,
}

impl PluginGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    pub fn plugin(&self, vertex: usize) -> &PluginData {
        &self.vertices[vertex]
    }

    pub fn add_vertex(&mut self, plugin: PluginData) -> Option<usize> {
        let key = plugin.key();
        if self.index.contains_key(&key) {
            return None;
        }
        let vertex = self.vertices.len();
        self.index.insert(key, vertex);
        self.vertices.push(plugin);
        self.edges.push(Vec::new());
        Some(vertex)
    }

    pub fn vertex_by_name(&self, name: &str) -> Option<usize> {
        self.index.get(&normalize_name(name)).copied()
    }

    pub fn add_edge(&mut self, from: usize, to: usize, kind: EdgeType) {
        if self.edges[from]
            .iter()
            .any(|edge| edge.target == to && edge.kind == kind)
        {
            return;
        }
        trace!(
            from = %self.vertices[from].name,
            to = %self.vertices[to].name,
            %kind,
            "adding edge"
        );
        self.edges[from].push(Edge { target: to, kind });
    }

    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        self.edges[from].iter().any(|edge| edge.target == to)
    }

    pub fn path_exists(&self, from: usize, to: usize) -> bool {
        if from == to {
            return true;
        }
        let mut visited = vec![false; self.vertices.len()];
        let mut queue = VecDeque::new();
        visited[from] = true;
        queue.push_back(from);
        while let Some(vertex) = queue.pop_front() {
            for edge in &self.edges[vertex] {
                if edge.target == to {
                    return true;
                }
                if !visited[edge.target] {
                    visited[edge.target] = true;
                    queue.push_back(edge.target);
                }
            }
        }
        false
    }

    // Adding from -> to creates a cycle iff to already reaches from.
    pub fn would_cycle(&self, from: usize, to: usize) -> bool {
        self.path_exists(to, from)
    }

    pub fn check_for_cycles(&self) -> Option<Vec<CycleStep>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Grey,
            Black,
        }

        let count = self.vertices.len();
        let mut marks = vec![Mark::White; count];

        for start in 0..count {
            if marks[start] != Mark::White {
                continue;
            }
            // Each frame is (vertex, index of the next out-edge to follow).
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            marks[start] = Mark::Grey;

            while let Some(frame) = stack.last_mut() {
                let (vertex, cursor) = *frame;
                if cursor < self.edges[vertex].len() {
                    frame.1 += 1;
                    let edge = self.edges[vertex][cursor];
                    match marks[edge.target] {
                        Mark::White => {
                            marks[edge.target] = Mark::Grey;
                            stack.push((edge.target, 0));
                        }
                        Mark::Grey => {
                            return Some(self.collect_cycle(&stack, edge));
                        }
                        Mark::Black => {}
                    }
                } else {
                    marks[vertex] = Mark::Black;
                    stack.pop();
                }
            }
        }

        None
    }

    fn collect_cycle(&self, stack: &[(usize, usize)], closing: Edge) -> Vec<CycleStep> {
        let first = stack
            .iter()
            .position(|frame| frame.0 == closing.target)
            .unwrap_or(0);
        let mut cycle = Vec::new();
        for position in first..stack.len() {
            let (vertex, cursor) = stack[position];
            let edge = if position + 1 < stack.len() {
                // cursor was advanced past the edge taken to descend.
                self.edges[vertex][cursor - 1]
            } else {
                closing
            };
            cycle.push(CycleStep {
                name: self.vertices[vertex].name.clone(),
                edge: edge.kind,
            });
        }
        cycle
    }

    // Kahn's algorithm; the caller must have tie-broken the graph first.
    pub fn topological_sort(&self) -> Vec<usize> {
        let count = self.vertices.len();
        let mut in_degree = vec![0usize; count];
        let mut seen = vec![false; count];
        for vertex in 0..count {
            seen.iter_mut().for_each(|flag| *flag = false);
            for edge in &self.edges[vertex] {
                if !seen[edge.target] {
                    seen[edge.target] = true;
                    in_degree[edge.target] += 1;
                }
            }
        }

        let mut ready: Vec<usize> = (0..count).filter(|v| in_degree[*v] == 0).collect();
        let mut order = Vec::with_capacity(count);
        while !ready.is_empty() {
            // Lowest vertex index first keeps the output deterministic.
            let position = ready
                .iter()
                .enumerate()
                .min_by_key(|(_, vertex)| **vertex)
                .map(|(position, _)| position)
                .unwrap_or(0);
            let vertex = ready.swap_remove(position);
            order.push(vertex);

            seen.iter_mut().for_each(|flag| *flag = false);
            for edge in &self.edges[vertex] {
                if seen[edge.target] {
                    continue;
                }
                seen[edge.target] = true;
                in_degree[edge.target] -= 1;
                if in_degree[edge.target] == 0 {
                    ready.push(edge.target);
                }
            }
        }

        for pair in order.windows(2) {
            if !self.has_edge(pair[0], pair[1]) {
                error!(
                    earlier = %self.vertices[pair[0]].name,
                    later = %self.vertices[pair[1]].name,
                    "load order is not unique: no edge between consecutive plugins"
                );
            }
        }

        order
    }
}
