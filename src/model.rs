use std::collections::{BTreeMap, BTreeSet};

use crate::ident::StageName;

pub type NodeId = i64;

/// A stage point with the network node it snapped to.
#[derive(Debug, Clone, PartialEq)]
pub struct SnappedPoint {
    pub id: i64,
    pub x: f64,
    pub y: f64,
    pub node: NodeId,
}

/// Node relation of one stage: one row per stage point.
#[derive(Debug, Clone)]
pub struct NodeRelation {
    pub stage: StageName,
    pub points: Vec<SnappedPoint>,
}

impl NodeRelation {
    pub fn distinct_nodes(&self) -> BTreeSet<NodeId> {
        self.points.iter().map(|p| p.node).collect()
    }
}

/// One row as returned by the shortest-path oracle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostRow {
    pub start: NodeId,
    pub end: NodeId,
    pub cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hop {
    pub end: NodeId,
    pub cost: f64,
}

/// Pairwise cost table of one stage transition, at most one hop per start node.
#[derive(Debug, Clone)]
pub struct CostTable {
    pub source: StageName,
    pub target: StageName,
    pub hops: BTreeMap<NodeId, Hop>,
}

impl CostTable {
    pub fn hop(&self, start: NodeId) -> Option<&Hop> {
        self.hops.get(&start)
    }

    pub fn end_nodes(&self) -> BTreeSet<NodeId> {
        self.hops.values().map(|hop| hop.end).collect()
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }
}

/// One fully connected node chain: `nodes[i]` is the node at stage `i`,
/// `costs[i]` the cost of the hop from stage `i` to stage `i + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRow {
    pub nodes: Vec<NodeId>,
    pub costs: Vec<f64>,
}

impl ChainRow {
    pub fn start(&self) -> NodeId {
        self.nodes[0]
    }
}

/// Joined chains, one column per transition, keyed by stage-1 node.
#[derive(Debug, Clone)]
pub struct CostChain {
    pub columns: Vec<String>,
    pub rows: Vec<ChainRow>,
}

/// A stage-1 point with the cumulative cost of its chain per column.
#[derive(Debug, Clone, PartialEq)]
pub struct CostRecord {
    pub id: i64,
    pub x: f64,
    pub y: f64,
    pub node: NodeId,
    pub cumulative: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct CostSurfaceInput {
    pub columns: Vec<String>,
    pub records: Vec<CostRecord>,
}

/// Input vertex for polygon construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonVertex {
    pub id: i64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServicePolygon {
    pub node: NodeId,
    pub wkt: String,
    pub srid: i32,
}
