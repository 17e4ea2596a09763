use crate::graph::CycleStep;
use thiserror::Error;

// Any of these means no new load order was computed and the previous
// order must be kept unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SortError {
    #[error("cyclic interaction detected: {}", render_cycle(.cycle))]
    CyclicInteraction { cycle: Vec<CycleStep> },

    #[error("plugin group \"{group}\" is not defined")]
    UndefinedGroup { group: String },

    #[error("group load-after rules form a cycle: {}", .cycle.join(" -> "))]
    CyclicGroups { cycle: Vec<String> },
}

fn render_cycle(cycle: &[CycleStep]) -> String {
    let mut out = String::new();
    for step in cycle {
        out.push_str(&step.name);
        out.push_str(&format!(" --[{}]--> ", step.edge));
    }
    if let Some(first) = cycle.first() {
        out.push_str(&first.name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeType;

    #[test]
    fn cyclic_interaction_renders_chain() {
        let error = SortError::CyclicInteraction {
            cycle: vec![
                CycleStep {
                    name: "A.esp".to_string(),
                    edge: EdgeType::MasterlistRequirement,
                },
                CycleStep {
                    name: "B.esp".to_string(),
                    edge: EdgeType::UserLoadAfter,
                },
            ],
        };
        assert_eq!(
            error.to_string(),
            "cyclic interaction detected: A.esp --[Masterlist Requirement]--> B.esp --[User Load After]--> A.esp"
        );
    }

    #[test]
    fn undefined_group_names_the_group() {
        let error = SortError::UndefinedGroup {
            group: "Late Fixes".to_string(),
        };
        assert_eq!(error.to_string(), "plugin group \"Late Fixes\" is not defined");
    }

    #[test]
    fn cyclic_groups_renders_path() {
        let error = SortError::CyclicGroups {
            cycle: vec!["X".to_string(), "Y".to_string(), "X".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "group load-after rules form a cycle: X -> Y -> X"
        );
    }
}
