//! Bounded call graph traversal.
//!
//! The walk keeps an explicit stack of frames so deep graphs cannot exhaust
//! the thread stack, while visiting nodes and emitting edges in the same
//! order a recursive depth-first walk would.

use crate::error::ToolError;
use crate::hopper::host::{Address, DocumentId, HopperHost};
use crate::hopper::resolve::display_name;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

pub const MAX_DEPTH_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    Bidirectional,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Bidirectional => "bidirectional",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "forward" => Ok(Self::Forward),
            "backward" => Ok(Self::Backward),
            "bidirectional" => Ok(Self::Bidirectional),
            other => Err(ToolError::InvalidParams(format!(
                "Invalid direction '{other}'. Must be 'forward', 'backward', or 'bidirectional'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub name: String,
    pub entry_point: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_blocks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demangled_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl NodeInfo {
    pub fn placeholder(name: &str, addr: Address) -> Self {
        Self {
            name: name.to_string(),
            entry_point: format!("{addr:#x}"),
            basic_blocks: None,
            demangled_name: None,
            signature: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallGraph {
    /// Hex form of the start; the tool handler echoes the caller's text instead.
    pub start_address: String,
    pub direction: String,
    pub max_depth: usize,
    pub nodes: BTreeMap<String, NodeInfo>,
    pub edges: Vec<CallEdge>,
    pub total_nodes: usize,
    pub total_edges: usize,
}

/// What the traversal needs to know about the program.
pub trait CallGraphView {
    fn describe(&self, addr: Address) -> NodeInfo;
    /// Callee entry points, or `None` when `addr` is not in a procedure.
    fn callees(&self, addr: Address) -> Option<Vec<Address>>;
    /// Call sites calling into the procedure at `addr`.
    fn callers(&self, addr: Address) -> Option<Vec<Address>>;
    fn name(&self, addr: Address) -> String;
}

/// [`CallGraphView`] over one document of a live host.
pub struct HostGraph<'a> {
    host: &'a dyn HopperHost,
    doc: DocumentId,
}

impl<'a> HostGraph<'a> {
    pub fn new(host: &'a dyn HopperHost, doc: DocumentId) -> Self {
        Self { host, doc }
    }

    fn neighbours(&self, addr: Address, forward: bool) -> Option<Vec<Address>> {
        let seg = self.host.segment_at(self.doc, addr)?;
        let proc = self.host.procedure_at(seg, addr)?;
        let refs = if forward {
            self.host.callees(proc).into_iter().map(|c| c.to).collect()
        } else {
            self.host.callers(proc).into_iter().map(|c| c.from).collect()
        };
        Some(refs)
    }
}

impl CallGraphView for HostGraph<'_> {
    fn describe(&self, addr: Address) -> NodeInfo {
        let Some(seg) = self.host.segment_at(self.doc, addr) else {
            return NodeInfo::placeholder("unknown_segment", addr);
        };
        let Some(desc) = self
            .host
            .procedure_at(seg, addr)
            .and_then(|proc| self.host.procedure(proc).ok())
        else {
            return NodeInfo::placeholder("unknown_procedure", addr);
        };
        let name = self
            .host
            .name_at(seg, desc.entry_point)
            .unwrap_or_else(|| format!("sub_{:x}", desc.entry_point));
        let demangled_name = self
            .host
            .demangled_name_at(seg, desc.entry_point)
            .filter(|d| *d != name);
        NodeInfo {
            name,
            entry_point: format!("{:#x}", desc.entry_point),
            basic_blocks: Some(desc.basic_blocks.len()),
            demangled_name,
            signature: desc.signature,
        }
    }

    fn callees(&self, addr: Address) -> Option<Vec<Address>> {
        self.neighbours(addr, true)
    }

    fn callers(&self, addr: Address) -> Option<Vec<Address>> {
        self.neighbours(addr, false)
    }

    fn name(&self, addr: Address) -> String {
        display_name(self.host, self.doc, addr)
    }
}

struct Frame {
    name: String,
    depth: usize,
    pending: std::vec::IntoIter<Address>,
}

struct Walk<'v, V: ?Sized> {
    view: &'v V,
    max_depth: usize,
    forward: bool,
}

impl<V: CallGraphView + ?Sized> Walk<'_, V> {
    /// Record `addr` and return a frame for expanding it, if it may be expanded.
    fn enter(&self, addr: Address, depth: usize, nodes: &mut BTreeMap<String, NodeInfo>) -> Option<Frame> {
        nodes.insert(format!("{addr:#x}"), self.view.describe(addr));
        if depth >= self.max_depth {
            return None;
        }
        let neighbours = if self.forward {
            self.view.callees(addr)?
        } else {
            self.view.callers(addr)?
        };
        Some(Frame {
            name: self.view.name(addr),
            depth,
            pending: neighbours.into_iter(),
        })
    }

    fn run(
        &self,
        start: Address,
        nodes: &mut BTreeMap<String, NodeInfo>,
        edges: &mut Vec<CallEdge>,
    ) {
        let mut visited = HashSet::from([start]);
        let mut stack: Vec<Frame> = self.enter(start, 0, nodes).into_iter().collect();

        while let Some(frame) = stack.last_mut() {
            let Some(next) = frame.pending.next() else {
                stack.pop();
                continue;
            };
            let other = self.view.name(next);
            let edge = if self.forward {
                CallEdge {
                    from: frame.name.clone(),
                    to: other,
                }
            } else {
                CallEdge {
                    from: other,
                    to: frame.name.clone(),
                }
            };
            let depth = frame.depth + 1;
            edges.push(edge);

            if visited.insert(next) {
                if let Some(child) = self.enter(next, depth, nodes) {
                    stack.push(child);
                }
            }
        }
    }
}

/// Walk the call graph from `start` up to `max_depth` levels.
pub fn traverse<V: CallGraphView + ?Sized>(
    view: &V,
    start: Address,
    direction: Direction,
    max_depth: usize,
) -> CallGraph {
    let mut nodes = BTreeMap::new();
    let mut edges = Vec::new();

    let passes: &[bool] = match direction {
        Direction::Forward => &[true],
        Direction::Backward => &[false],
        Direction::Bidirectional => &[true, false],
    };
    for &forward in passes {
        Walk {
            view,
            max_depth,
            forward,
        }
        .run(start, &mut nodes, &mut edges);
    }

    CallGraph {
        start_address: format!("{start:#x}"),
        direction: direction.as_str().to_string(),
        max_depth,
        total_nodes: nodes.len(),
        total_edges: edges.len(),
        nodes,
        edges,
    }
}
