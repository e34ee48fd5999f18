//! Call graph handler.

use crate::error::ToolError;
use crate::hopper::callgraph::{traverse, CallGraph, Direction, HostGraph, MAX_DEPTH_LIMIT};
use crate::hopper::resolve::{locate, parse_hex_address};
use crate::hopper::session::Session;

pub fn handle_call_graph(
    session: &Session,
    start_hex: &str,
    direction: &str,
    max_depth: usize,
) -> Result<CallGraph, ToolError> {
    let start = parse_hex_address(start_hex)?;
    let direction: Direction = direction.parse()?;
    if !(1..=MAX_DEPTH_LIMIT).contains(&max_depth) {
        return Err(ToolError::InvalidParams(format!(
            "max_depth must be between 1 and {MAX_DEPTH_LIMIT}"
        )));
    }

    let host = session.host();
    let doc = session.current()?;
    locate(host, doc, start)?;

    let view = HostGraph::new(host, doc);
    let mut graph = traverse(&view, start, direction, max_depth);
    graph.start_address = start_hex.to_string();
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hopper::snapshot::fixtures;
    use std::path::Path;

    #[test]
    fn test_call_graph_validation() {
        let session = Session::new(Box::new(fixtures::host(Path::new("/nonexistent"))));
        let graph = handle_call_graph(&session, "0x10411ead0", "forward", 1).unwrap();
        assert_eq!(graph.total_edges, 1);
        assert_eq!(graph.start_address, "0x10411ead0");
        let upper = handle_call_graph(&session, "0X10411EAD0", "forward", 1).unwrap();
        assert_eq!(upper.start_address, "0X10411EAD0");
        assert_eq!(upper.total_edges, 1);

        assert!(matches!(
            handle_call_graph(&session, "0x10411ead0", "forward", 11),
            Err(ToolError::InvalidParams(_))
        ));
        assert!(matches!(
            handle_call_graph(&session, "0x10411ead0", "up", 2),
            Err(ToolError::InvalidParams(_))
        ));
        assert!(matches!(
            handle_call_graph(&session, "0x104ad8000", "forward", 2),
            Err(ToolError::ProcedureNotFound(_))
        ));
    }

    #[test]
    fn test_call_graph_bidirectional() {
        let session = Session::new(Box::new(fixtures::host(Path::new("/nonexistent"))));
        let graph = handle_call_graph(&session, "0x1040f4124", "bidirectional", 1).unwrap();
        let edges: Vec<(&str, &str)> = graph
            .edges
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect();
        let vdl = "-[AccountSettingsViewController viewDidLoad]";
        assert_eq!(
            edges,
            vec![
                (vdl, "sub_1040f4000"),
                ("EntryPoint", vdl),
                ("_ZN6Signal4mainEv", vdl),
            ]
        );
        assert_eq!(graph.total_nodes, 4);
    }
}
