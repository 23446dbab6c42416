//! Dead-function classification.
//!
//! A declaration is a dead-code candidate iff its id is absent from the
//! reachable set. Entry-point markers are already folded into the set by
//! the graph builder, so absence is the whole condition.

use std::collections::HashSet;

use crate::parse::FunctionDecl;

/// Ids of declarations not present in the reachable set, in declaration
/// order.
pub fn find_dead(decls: &[FunctionDecl], reachable: &HashSet<u32>) -> Vec<u32> {
    decls
        .iter()
        .filter(|d| !reachable.contains(&d.id))
        .map(|d| d.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::{extract_usage, CallGraph};
    use crate::config::CalibrationConfig;
    use crate::parse::{extract_functions, parse_source};

    #[test]
    fn test_find_dead_orders_by_declaration() {
        let source = "\
def zulu():
    pass

def alpha():
    pass

def live():
    pass

live()
";
        let unit = parse_source(1, "test.py", source).unwrap();
        let decls = extract_functions(&unit);
        let usage = extract_usage(&unit, &decls);
        let graph = CallGraph::build(&decls, &usage, &CalibrationConfig::default());
        let reachable = graph.compute_reachable();

        let dead = find_dead(&decls, &reachable);
        let names: Vec<&str> = dead
            .iter()
            .map(|&id| decls[id as usize].name.as_str())
            .collect();
        assert_eq!(names, vec!["zulu", "alpha"]);
    }

    #[test]
    fn test_find_dead_empty_when_all_reachable() {
        let decls = Vec::new();
        let reachable = HashSet::new();
        assert!(find_dead(&decls, &reachable).is_empty());
    }
}
