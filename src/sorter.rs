use crate::error::SortError;
use crate::graph::{EdgeType, PluginGraph};
use crate::group::{Group, GroupGraph};
use crate::plugin::{normalize_name, PluginData};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SortReport {
    pub total: usize,
    pub edges: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone)]
pub struct SortResult {
    pub order: Vec<String>,
    pub report: SortReport,
    pub warnings: Vec<String>,
}

pub fn build_and_sort(
    plugins: Vec<PluginData>,
    groups: &[Group],
    hardcoded: &[String],
    previous_order: &[String],
) -> Result<SortResult, SortError> {
    let mut graph = PluginGraph::new();
    let mut warnings = Vec::new();
    let mut dropped = 0usize;

    for plugin in plugins {
        let name = plugin.name.clone();
        if graph.add_vertex(plugin).is_none() {
            warnings.push(format!("Duplicate plugin entry ignored for {name}"));
        }
    }
    let total = graph.vertex_count();
    if total == 0 {
        return Ok(SortResult {
            order: Vec::new(),
            report: SortReport {
                total: 0,
                edges: 0,
                dropped: 0,
            },
            warnings,
        });
    }

    info!(plugins = total, "building load order graph");
    add_hardcoded_edges(&mut graph, hardcoded);
    add_master_flag_edges(&mut graph);
    add_master_edges(&mut graph);
    add_specific_edges(&mut graph);
    add_group_edges(&mut graph, groups, &mut warnings, &mut dropped)?;
    add_priority_edges(&mut graph);
    add_overlap_edges(&mut graph);

    debug!("checking for cycles");
    if let Some(cycle) = graph.check_for_cycles() {
        return Err(SortError::CyclicInteraction { cycle });
    }

    add_tie_break_edges(&mut graph, previous_order);

    debug!("performing topological sort");
    let order: Vec<String> = graph
        .topological_sort()
        .into_iter()
        .map(|vertex| graph.plugin(vertex).name.clone())
        .collect();
    info!(plugins = order.len(), "calculated load order");

    Ok(SortResult {
        order,
        report: SortReport {
            total,
            edges: graph.edge_count(),
            dropped,
        },
        warnings,
    })
}

fn add_hardcoded_edges(graph: &mut PluginGraph, hardcoded: &[String]) {
    debug!("adding hardcoded edges");
    let installed: Vec<usize> = hardcoded
        .iter()
        .filter_map(|name| graph.vertex_by_name(name))
        .collect();
    for (position, &from) in installed.iter().enumerate() {
        for &to in &installed[position + 1..] {
            graph.add_edge(from, to, EdgeType::Hardcoded);
        }
    }

    let pinned: HashSet<usize> = installed.iter().copied().collect();
    for &from in &installed {
        for to in 0..graph.vertex_count() {
            if !pinned.contains(&to) {
                graph.add_edge(from, to, EdgeType::Hardcoded);
            }
        }
    }
}

fn add_master_flag_edges(graph: &mut PluginGraph) {
    debug!("adding master flag edges");
    let count = graph.vertex_count();
    for from in 0..count {
        if !graph.plugin(from).is_master {
            continue;
        }
        for to in 0..count {
            if from != to && !graph.plugin(to).is_master {
                graph.add_edge(from, to, EdgeType::MasterFlag);
            }
        }
    }
}

fn add_master_edges(graph: &mut PluginGraph) {
    debug!("adding master file edges");
    for vertex in 0..graph.vertex_count() {
        let masters = graph.plugin(vertex).masters.clone();
        for master in masters {
            if let Some(parent) = graph.vertex_by_name(&master) {
                if parent != vertex {
                    graph.add_edge(parent, vertex, EdgeType::Master);
                }
            }
        }
    }
}

// Requirement and load-after edges are inserted unconditionally; a cycle
// among them is a real metadata conflict and surfaces in the cycle check.
fn add_specific_edges(graph: &mut PluginGraph) {
    debug!("adding requirement and load-after edges");
    for vertex in 0..graph.vertex_count() {
        let plugin = graph.plugin(vertex).clone();
        let rules = [
            (&plugin.masterlist_requirements, EdgeType::MasterlistRequirement),
            (&plugin.user_requirements, EdgeType::UserRequirement),
            (&plugin.masterlist_load_after, EdgeType::MasterlistLoadAfter),
            (&plugin.user_load_after, EdgeType::UserLoadAfter),
        ];
        for (entries, kind) in rules {
            for name in entries {
                let Some(parent) = graph.vertex_by_name(name) else {
                    continue;
                };
                if parent != vertex {
                    graph.add_edge(parent, vertex, kind);
                }
            }
        }
    }
}

fn add_group_edges(
    graph: &mut PluginGraph,
    groups: &[Group],
    warnings: &mut Vec<String>,
    dropped: &mut usize,
) -> Result<(), SortError> {
    debug!("adding group edges");
    let group_graph = GroupGraph::build(groups)?;

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); group_graph.len()];
    for vertex in 0..graph.vertex_count() {
        let Some(name) = graph.plugin(vertex).group.clone() else {
            continue;
        };
        let Some(group) = group_graph.resolve(&name) else {
            return Err(SortError::UndefinedGroup { group: name });
        };
        members[group].push(vertex);
    }

    for group in 0..group_graph.len() {
        for earlier in group_graph.transitive_afters(group) {
            for &from in &members[earlier] {
                for &to in &members[group] {
                    if graph.path_exists(from, to) {
                        continue;
                    }
                    if graph.would_cycle(from, to) {
                        *dropped += 1;
                        warnings.push(format!(
                            "{}: group rule after {} dropped to avoid a cycle",
                            graph.plugin(to).name,
                            graph.plugin(from).name
                        ));
                        continue;
                    }
                    graph.add_edge(from, to, EdgeType::Group);
                }
            }
        }
    }
    Ok(())
}

fn add_priority_edges(graph: &mut PluginGraph) {
    debug!("adding priority edges");
    let prioritized: Vec<usize> = (0..graph.vertex_count())
        .filter(|vertex| graph.plugin(*vertex).priority.is_some())
        .collect();

    for (position, &first) in prioritized.iter().enumerate() {
        for &second in &prioritized[position + 1..] {
            let (Some(lhs), Some(rhs)) =
                (graph.plugin(first).priority, graph.plugin(second).priority)
            else {
                continue;
            };
            let (from, to) = match lhs.cmp(&rhs) {
                Ordering::Equal => continue,
                Ordering::Less => (first, second),
                Ordering::Greater => (second, first),
            };
            if graph.path_exists(from, to) || graph.path_exists(to, from) {
                continue;
            }
            graph.add_edge(from, to, EdgeType::Priority);
        }
    }
}

// The plugin overriding more records loads earlier; equal counts stay
// ambiguous and fall through to the tie-break.
fn add_overlap_edges(graph: &mut PluginGraph) {
    debug!("adding overlap edges");
    let count = graph.vertex_count();
    for first in 0..count {
        if graph.plugin(first).override_count() == 0 {
            continue;
        }
        for second in first + 1..count {
            let first_count = graph.plugin(first).override_count();
            let second_count = graph.plugin(second).override_count();
            if second_count == 0 || first_count == second_count {
                continue;
            }
            if !graph.plugin(first).records_overlap(graph.plugin(second)) {
                continue;
            }
            let (from, to) = if first_count > second_count {
                (first, second)
            } else {
                (second, first)
            };
            if graph.path_exists(from, to) || graph.path_exists(to, from) {
                continue;
            }
            graph.add_edge(from, to, EdgeType::Overlap);
        }
    }
}

// Tie-break edges only join pairs with no path in either direction, so
// they cannot cycle.
fn add_tie_break_edges(graph: &mut PluginGraph, previous_order: &[String]) {
    debug!("adding tie-break edges");
    let mut previous_index: HashMap<String, usize> = HashMap::new();
    for (index, name) in previous_order.iter().enumerate() {
        previous_index.entry(normalize_name(name)).or_insert(index);
    }

    let count = graph.vertex_count();
    for first in 0..count {
        for second in first + 1..count {
            if graph.path_exists(first, second) || graph.path_exists(second, first) {
                continue;
            }
            let ordering =
                compare_previous(graph.plugin(first), graph.plugin(second), &previous_index);
            let (from, to) = if ordering == Ordering::Greater {
                (second, first)
            } else {
                (first, second)
            };
            graph.add_edge(from, to, EdgeType::TieBreak);
        }
    }
}

fn compare_previous(
    first: &PluginData,
    second: &PluginData,
    previous_index: &HashMap<String, usize>,
) -> Ordering {
    match (
        previous_index.get(&first.key()),
        previous_index.get(&second.key()),
    ) {
        (Some(lhs), Some(rhs)) => lhs.cmp(rhs),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => first
            .key()
            .cmp(&second.key())
            .then_with(|| first.name.cmp(&second.name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Priority;
    use std::collections::HashSet;

    fn plugin(name: &str) -> PluginData {
        PluginData::new(name)
    }

    fn master(name: &str) -> PluginData {
        let mut plugin = PluginData::new(name);
        plugin.is_master = true;
        plugin
    }

    fn sort(plugins: Vec<PluginData>) -> SortResult {
        build_and_sort(plugins, &[], &[], &[]).unwrap()
    }

    fn position(result: &SortResult, name: &str) -> usize {
        result
            .order
            .iter()
            .position(|entry| entry == name)
            .unwrap_or_else(|| panic!("{name} missing from order"))
    }

    #[test]
    fn empty_input_sorts_to_empty_order() {
        let result = sort(Vec::new());
        assert!(result.order.is_empty());
        assert_eq!(result.report.total, 0);
    }

    #[test]
    fn output_is_a_permutation_of_the_input() {
        let mut a = plugin("A.esp");
        a.masterlist_load_after.push("B.esp".to_string());
        let plugins = vec![master("Master.esm"), a, plugin("B.esp"), plugin("C.esp")];
        let names: HashSet<String> = plugins.iter().map(|p| p.name.clone()).collect();

        let result = sort(plugins);
        assert_eq!(result.order.len(), names.len());
        let sorted: HashSet<String> = result.order.iter().cloned().collect();
        assert_eq!(sorted, names);
    }

    #[test]
    fn identical_inputs_produce_identical_output() {
        let build = || {
            let mut a = plugin("A.esp");
            a.priority = Some(Priority::local(10));
            let mut b = plugin("B.esp");
            b.overridden_records = [1, 2].into_iter().collect();
            let mut c = plugin("C.esp");
            c.overridden_records = [2].into_iter().collect();
            vec![master("Master.esm"), a, b, c]
        };
        let first = sort(build());
        let second = sort(build());
        assert_eq!(first.order, second.order);
    }

    #[test]
    fn masters_load_before_non_masters() {
        let result = sort(vec![
            plugin("Zebra.esp"),
            master("Core.esm"),
            plugin("Apple.esp"),
            master("Other.esm"),
        ]);
        assert!(position(&result, "Core.esm") < position(&result, "Zebra.esp"));
        assert!(position(&result, "Core.esm") < position(&result, "Apple.esp"));
        assert!(position(&result, "Other.esm") < position(&result, "Zebra.esp"));
        assert!(position(&result, "Other.esm") < position(&result, "Apple.esp"));
    }

    #[test]
    fn hardcoded_plugins_load_first_in_given_order() {
        let hardcoded = vec!["Game.esm".to_string(), "Update.esm".to_string()];
        let result = build_and_sort(
            vec![
                plugin("Mod.esp"),
                master("Update.esm"),
                master("Game.esm"),
                master("DLC.esm"),
            ],
            &[],
            &hardcoded,
            &[],
        )
        .unwrap();
        assert_eq!(position(&result, "Game.esm"), 0);
        assert_eq!(position(&result, "Update.esm"), 1);
    }

    #[test]
    fn declared_masters_load_before_their_dependents() {
        let mut dependent = master("Child.esm");
        dependent.masters.push("Parent.esm".to_string());
        let result = sort(vec![dependent, master("Parent.esm")]);
        assert!(position(&result, "Parent.esm") < position(&result, "Child.esm"));
    }

    #[test]
    fn requirements_and_load_after_rules_are_honored() {
        let mut a = plugin("A.esp");
        a.masterlist_requirements.push("B.esp".to_string());
        let mut c = plugin("C.esp");
        c.user_load_after.push("A.esp".to_string());
        let result = sort(vec![a, plugin("B.esp"), c]);
        assert!(position(&result, "B.esp") < position(&result, "A.esp"));
        assert!(position(&result, "A.esp") < position(&result, "C.esp"));
    }

    #[test]
    fn missing_dependency_produces_no_edge_and_no_failure() {
        let mut with_rule = plugin("A.esp");
        with_rule
            .masterlist_requirements
            .push("NotInstalled.esp".to_string());
        let with_entry = sort(vec![with_rule, plugin("B.esp")]);
        let without_entry = sort(vec![plugin("A.esp"), plugin("B.esp")]);
        assert_eq!(with_entry.order, without_entry.order);
    }

    #[test]
    fn requirement_cycle_fails_and_names_all_plugins() {
        let mut a = plugin("A.esp");
        a.masterlist_requirements.push("B.esp".to_string());
        let mut b = plugin("B.esp");
        b.masterlist_requirements.push("C.esp".to_string());
        let mut c = plugin("C.esp");
        c.user_load_after.push("A.esp".to_string());

        let error = build_and_sort(vec![a, b, c], &[], &[], &[]).unwrap_err();
        match error {
            SortError::CyclicInteraction { cycle } => {
                let names: HashSet<&str> =
                    cycle.iter().map(|step| step.name.as_str()).collect();
                assert_eq!(names, ["A.esp", "B.esp", "C.esp"].into_iter().collect());
            }
            other => panic!("expected CyclicInteraction, got {other}"),
        }
    }

    #[test]
    fn undefined_plugin_group_is_fatal() {
        let mut a = plugin("A.esp");
        a.group = Some("No Such Group".to_string());
        let error =
            build_and_sort(vec![a], &[Group::new("default", &[])], &[], &[]).unwrap_err();
        assert_eq!(
            error,
            SortError::UndefinedGroup {
                group: "No Such Group".to_string()
            }
        );
    }

    #[test]
    fn cyclic_group_graph_is_fatal() {
        let groups = vec![Group::new("X", &["Y"]), Group::new("Y", &["X"])];
        let error = build_and_sort(vec![plugin("A.esp")], &groups, &[], &[]).unwrap_err();
        assert!(matches!(error, SortError::CyclicGroups { .. }));
    }

    #[test]
    fn group_membership_orders_plugins() {
        let groups = vec![
            Group::new("default", &[]),
            Group::new("Late", &["default"]),
        ];
        let mut early = plugin("Zz Early.esp");
        early.group = Some("default".to_string());
        let mut late = plugin("Aa Late.esp");
        late.group = Some("Late".to_string());

        let result = build_and_sort(vec![late, early], &groups, &[], &[]).unwrap();
        assert!(position(&result, "Zz Early.esp") < position(&result, "Aa Late.esp"));
    }

    #[test]
    fn empty_intermediate_group_still_orders_neighbours() {
        let groups = vec![
            Group::new("default", &[]),
            Group::new("Mid", &["default"]),
            Group::new("Late", &["Mid"]),
        ];
        let mut early = plugin("Zz.esp");
        early.group = Some("default".to_string());
        let mut late = plugin("Aa.esp");
        late.group = Some("Late".to_string());

        let result = build_and_sort(vec![late, early], &groups, &[], &[]).unwrap();
        assert!(position(&result, "Zz.esp") < position(&result, "Aa.esp"));
    }

    #[test]
    fn contradicted_group_edge_is_dropped_with_a_warning() {
        let groups = vec![
            Group::new("default", &[]),
            Group::new("Late", &["default"]),
        ];
        // The requirement points the opposite way to the group rule, and
        // requirements are the harder layer.
        let mut early = plugin("Early.esp");
        early.group = Some("default".to_string());
        early.masterlist_requirements.push("Late.esp".to_string());
        let mut late = plugin("Late.esp");
        late.group = Some("Late".to_string());

        let result = build_and_sort(vec![early, late], &groups, &[], &[]).unwrap();
        assert!(position(&result, "Late.esp") < position(&result, "Early.esp"));
        assert_eq!(result.report.dropped, 1);
        assert!(result.warnings.iter().any(|w| w.contains("group rule")));
    }

    #[test]
    fn lower_priority_loads_first() {
        let mut a = plugin("A.esp");
        a.priority = Some(Priority::local(10));
        let mut b = plugin("B.esp");
        b.priority = Some(Priority::local(-5));
        let result = sort(vec![a, b]);
        assert!(position(&result, "B.esp") < position(&result, "A.esp"));
    }

    #[test]
    fn global_priority_outranks_local() {
        let mut local = plugin("Local.esp");
        local.priority = Some(Priority::local(100));
        let mut global = plugin("Global.esp");
        global.priority = Some(Priority::global(-5));
        let result = sort(vec![local, global]);
        assert!(position(&result, "Local.esp") < position(&result, "Global.esp"));
    }

    #[test]
    fn priority_yields_to_existing_requirement_order() {
        // Higher priority would load later, but the requirement already
        // orders the pair the other way round.
        let mut first = plugin("First.esp");
        first.priority = Some(Priority::local(50));
        let mut second = plugin("Second.esp");
        second.priority = Some(Priority::local(-50));
        second.masterlist_requirements.push("First.esp".to_string());

        let result = sort(vec![first, second]);
        assert!(position(&result, "First.esp") < position(&result, "Second.esp"));
    }

    #[test]
    fn overlapping_records_order_by_override_count() {
        let mut wide = plugin("Wide.esp");
        wide.overridden_records = [1, 2, 3, 4].into_iter().collect();
        let mut narrow = plugin("Narrow.esp");
        narrow.overridden_records = [2].into_iter().collect();

        let result = sort(vec![narrow, wide]);
        assert!(position(&result, "Wide.esp") < position(&result, "Narrow.esp"));
    }

    #[test]
    fn equal_override_counts_fall_back_to_tie_break() {
        let mut one = plugin("Bravo.esp");
        one.overridden_records = [1, 2].into_iter().collect();
        let mut two = plugin("Alpha.esp");
        two.overridden_records = [2, 3].into_iter().collect();

        let result = sort(vec![one, two]);
        // No overlap edge; lexicographic tie-break decides.
        assert!(position(&result, "Alpha.esp") < position(&result, "Bravo.esp"));
    }

    #[test]
    fn previous_order_breaks_ties() {
        let previous = vec!["B.esp".to_string(), "A.esp".to_string()];
        let result =
            build_and_sort(vec![plugin("A.esp"), plugin("B.esp")], &[], &[], &previous).unwrap();
        assert!(position(&result, "B.esp") < position(&result, "A.esp"));
    }

    #[test]
    fn plugins_absent_from_previous_order_sort_after_present_ones() {
        let previous = vec!["Zulu.esp".to_string()];
        let result = build_and_sort(
            vec![plugin("Alpha.esp"), plugin("Zulu.esp")],
            &[],
            &[],
            &previous,
        )
        .unwrap();
        assert!(position(&result, "Zulu.esp") < position(&result, "Alpha.esp"));
    }

    #[test]
    fn unconstrained_pairs_fall_back_to_name_order() {
        let result = sort(vec![plugin("beta.esp"), plugin("Alpha.esp")]);
        assert!(position(&result, "Alpha.esp") < position(&result, "beta.esp"));
    }

    #[test]
    fn duplicate_plugin_names_are_skipped_with_warning() {
        let result = sort(vec![plugin("Same.esp"), plugin("same.ESP")]);
        assert_eq!(result.order, vec!["Same.esp".to_string()]);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("Duplicate"));
    }

    #[test]
    fn worked_example_orders_as_specified() {
        let mut a = plugin("A.esp");
        a.priority = Some(Priority::local(10));
        let mut b = plugin("B.esp");
        b.priority = Some(Priority::local(-5));
        let result = sort(vec![master("Master.esm"), a, b, plugin("C.esp")]);

        assert_eq!(position(&result, "Master.esm"), 0);
        assert!(position(&result, "B.esp") < position(&result, "A.esp"));
        assert_eq!(result.order.len(), 4);
    }
}
