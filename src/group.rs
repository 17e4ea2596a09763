use crate::error::SortError;
use crate::plugin::normalize_name;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub loads_after: Vec<String>,
}

impl Group {
    pub fn new(name: &str, loads_after: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            loads_after: loads_after.iter().map(|name| name.to_string()).collect(),
        }
    }
}

#[derive(Debug)]
pub struct GroupGraph {
    names: Vec<String>,
    index: HashMap<String, usize>,
    afters: Vec<Vec<usize>>,
}

impl GroupGraph {
    pub fn build(groups: &[Group]) -> Result<Self, SortError> {
        let mut names = Vec::with_capacity(groups.len());
        let mut index = HashMap::new();
        for group in groups {
            let key = normalize_name(&group.name);
            if index.contains_key(&key) {
                continue;
            }
            index.insert(key, names.len());
            names.push(group.name.clone());
        }

        let mut afters = vec![Vec::new(); names.len()];
        for group in groups {
            let Some(&slot) = index.get(&normalize_name(&group.name)) else {
                continue;
            };
            for after in &group.loads_after {
                let Some(&target) = index.get(&normalize_name(after)) else {
                    return Err(SortError::UndefinedGroup {
                        group: after.clone(),
                    });
                };
                if !afters[slot].contains(&target) {
                    afters[slot].push(target);
                }
            }
        }

        let graph = Self {
            names,
            index,
            afters,
        };
        if let Some(cycle) = graph.find_cycle() {
            return Err(SortError::CyclicGroups { cycle });
        }
        Ok(graph)
    }

    pub fn resolve(&self, name: &str) -> Option<usize> {
        self.index.get(&normalize_name(name)).copied()
    }

    pub fn name(&self, group: usize) -> &str {
        &self.names[group]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    // Walks the closure so a group with no plugins of its own still
    // passes ordering through to its neighbours.
    pub fn transitive_afters(&self, group: usize) -> Vec<usize> {
        let mut visited = vec![false; self.names.len()];
        visited[group] = true;
        let mut queue = VecDeque::new();
        queue.push_back(group);
        let mut out = Vec::new();
        while let Some(current) = queue.pop_front() {
            for &after in &self.afters[current] {
                if !visited[after] {
                    visited[after] = true;
                    out.push(after);
                    queue.push_back(after);
                }
            }
        }
        out
    }

    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Grey,
            Black,
        }

        let count = self.names.len();
        let mut marks = vec![Mark::White; count];

        for start in 0..count {
            if marks[start] != Mark::White {
                continue;
            }
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            marks[start] = Mark::Grey;

            while let Some(frame) = stack.last_mut() {
                let (group, cursor) = *frame;
                if cursor < self.afters[group].len() {
                    frame.1 += 1;
                    let target = self.afters[group][cursor];
                    match marks[target] {
                        Mark::White => {
                            marks[target] = Mark::Grey;
                            stack.push((target, 0));
                        }
                        Mark::Grey => {
                            let first = stack
                                .iter()
                                .position(|frame| frame.0 == target)
                                .unwrap_or(0);
                            let mut cycle: Vec<String> = stack[first..]
                                .iter()
                                .map(|frame| self.names[frame.0].clone())
                                .collect();
                            cycle.push(self.names[target].clone());
                            return Some(cycle);
                        }
                        Mark::Black => {}
                    }
                } else {
                    marks[group] = Mark::Black;
                    stack.pop();
                }
            }
        }

        None
    }
}
