//! The routing engine, consumed as a black box.

pub mod pgrouting;

use async_trait::async_trait;

use crate::error::QueryError;
use crate::ident::{Ident, StageName};
use crate::model::{CostRow, NodeId, PolygonVertex};

/// A stage point and the vertex the nearest-neighbour index picked for it.
/// `node` is `None` when the network has no vertex to offer.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestNode {
    pub id: i64,
    pub x: f64,
    pub y: f64,
    pub node: Option<NodeId>,
}

#[async_trait]
pub trait NetworkOracle: Send + Sync {
    /// Closest network vertex for every point of `stage`.
    async fn nearest_nodes(&self, stage: &StageName) -> Result<Vec<NearestNode>, QueryError>;

    /// Undirected least-cost rows between every reachable (source, target)
    /// pair. Unreachable pairs are absent.
    async fn shortest_costs(
        &self,
        sources: &[NodeId],
        targets: &[NodeId],
        cost_field: &Ident,
    ) -> Result<Vec<CostRow>, QueryError>;

    /// Polygon around `vertices` as WKT, or `None` if the engine returns no
    /// geometry.
    async fn points_as_polygon(
        &self,
        vertices: &[PolygonVertex],
        srid: i32,
    ) -> Result<Option<String>, QueryError>;
}
