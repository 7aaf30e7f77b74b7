//! In-memory stand-ins for the routing database and the grid builder.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, QueryError, Result};
use crate::grid::{GridBuilder, GridRequest};
use crate::ident::{Ident, RunId, StageName, Stages, TableNames};
use crate::model::{CostRow, CostTable, NodeId, NodeRelation, PolygonVertex, ServicePolygon};
use crate::oracle::{NearestNode, NetworkOracle};
use crate::pipeline::{snap, RunContext};
use crate::store::{ArtifactStore, CostColumns};

pub fn context(stages: &[&str], dir: impl AsRef<Path>) -> RunContext {
    let run = RunId::parse("test").unwrap();
    RunContext {
        stages: Stages::new(stages).unwrap(),
        cost_field: Ident::parse("costo").unwrap(),
        output_dir: dir.as_ref().join(run.as_str()),
        tables: TableNames::new(run),
        raster_extension: "tif".to_string(),
        srid: 32615,
        timeout: Duration::from_secs(5),
        polygon_concurrency: 2,
        cancel: CancellationToken::new(),
    }
}

pub async fn relation(ctx: &RunContext, net: &MemoryNetwork, stage: &str) -> NodeRelation {
    let stage = ctx.stages.get(stage).unwrap();
    snap::snap(ctx, net, net, stage).await.unwrap()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Persisted {
    NodeRelation {
        id_column: String,
        rows: Vec<(i64, NodeId)>,
    },
    Costs {
        columns: [String; 3],
        rows: Vec<(NodeId, NodeId, f64)>,
    },
    Polygons {
        key: String,
        srid: i32,
        polygons: Vec<ServicePolygon>,
    },
}

fn failure(operation: &'static str, message: String) -> QueryError {
    QueryError {
        operation,
        source: sqlx::Error::Protocol(message),
    }
}

/// Network vertices, stage point tables and a cost matrix held in memory.
/// Also records every table the pipeline persists.
#[derive(Default)]
pub struct MemoryNetwork {
    nodes: BTreeMap<NodeId, (f64, f64)>,
    stages: HashMap<String, Vec<(i64, f64, f64)>>,
    costs: Vec<CostRow>,
    poisoned: HashSet<i64>,
    costs_fail: bool,
    polygon_table_fails: bool,
    tables: Mutex<HashMap<String, Persisted>>,
    drops: Mutex<HashMap<String, usize>>,
    cost_queries: Mutex<usize>,
    polygon_calls: Mutex<Vec<Vec<PolygonVertex>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, id: NodeId, x: f64, y: f64) -> Self {
        self.nodes.insert(id, (x, y));
        self
    }

    pub fn stage(mut self, name: &str, points: &[(i64, f64, f64)]) -> Self {
        self.stages.insert(name.to_string(), points.to_vec());
        self
    }

    /// Undirected: the reverse row is returned as well.
    pub fn cost(mut self, start: NodeId, end: NodeId, cost: f64) -> Self {
        self.costs.push(CostRow { start, end, cost });
        self.costs.push(CostRow {
            start: end,
            end: start,
            cost,
        });
        self
    }

    /// Polygon construction fails for any vertex set containing `point`.
    pub fn poison_point(mut self, point: i64) -> Self {
        self.poisoned.insert(point);
        self
    }

    /// Every shortest-path cost query fails.
    pub fn failing_costs(mut self) -> Self {
        self.costs_fail = true;
        self
    }

    /// Creating a polygon table fails.
    pub fn failing_polygon_table(mut self) -> Self {
        self.polygon_table_fails = true;
        self
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn distance_to(&self, node: NodeId, x: f64, y: f64) -> f64 {
        let (nx, ny) = self.nodes[&node];
        ((nx - x).powi(2) + (ny - y).powi(2)).sqrt()
    }

    pub fn persisted(&self, table: &str) -> Option<Persisted> {
        self.tables.lock().unwrap().get(table).cloned()
    }

    pub fn drops(&self, table: &str) -> usize {
        self.drops.lock().unwrap().get(table).copied().unwrap_or(0)
    }

    pub fn cost_queries(&self) -> usize {
        *self.cost_queries.lock().unwrap()
    }

    pub fn polygon_calls(&self) -> Vec<Vec<PolygonVertex>> {
        self.polygon_calls.lock().unwrap().clone()
    }

    fn replace(&self, table: &Ident, contents: Persisted) {
        *self
            .drops
            .lock()
            .unwrap()
            .entry(table.as_str().to_string())
            .or_default() += 1;
        self.tables
            .lock()
            .unwrap()
            .insert(table.as_str().to_string(), contents);
    }
}

#[async_trait]
impl NetworkOracle for MemoryNetwork {
    async fn nearest_nodes(&self, stage: &StageName) -> std::result::Result<Vec<NearestNode>, QueryError> {
        let points = self.stages.get(stage.as_str()).ok_or_else(|| {
            failure(
                "nearest node lookup",
                format!("relation \"{stage}\" does not exist"),
            )
        })?;

        Ok(points
            .iter()
            .map(|&(id, x, y)| {
                let mut best: Option<(NodeId, f64)> = None;
                for &node in self.nodes.keys() {
                    let distance = self.distance_to(node, x, y);
                    if best.map_or(true, |(_, d)| distance < d) {
                        best = Some((node, distance));
                    }
                }
                NearestNode {
                    id,
                    x,
                    y,
                    node: best.map(|(node, _)| node),
                }
            })
            .collect())
    }

    async fn shortest_costs(
        &self,
        sources: &[NodeId],
        targets: &[NodeId],
        _cost_field: &Ident,
    ) -> std::result::Result<Vec<CostRow>, QueryError> {
        *self.cost_queries.lock().unwrap() += 1;

        if self.costs_fail {
            return Err(failure(
                "pgr_dijkstraCost",
                "column \"costo\" does not exist".to_string(),
            ));
        }

        Ok(self
            .costs
            .iter()
            .filter(|row| sources.contains(&row.start) && targets.contains(&row.end))
            .copied()
            .collect())
    }

    async fn points_as_polygon(
        &self,
        vertices: &[PolygonVertex],
        _srid: i32,
    ) -> std::result::Result<Option<String>, QueryError> {
        self.polygon_calls.lock().unwrap().push(vertices.to_vec());

        if vertices.iter().any(|v| self.poisoned.contains(&v.id)) {
            return Err(failure(
                "pgr_pointsAsPolygon",
                "alpha shape failed".to_string(),
            ));
        }

        let mut ring: Vec<String> = vertices.iter().map(|v| format!("{} {}", v.x, v.y)).collect();
        if let Some(first) = ring.first().cloned() {
            ring.push(first);
        }
        Ok(Some(format!("POLYGON(({}))", ring.join(", "))))
    }
}

#[async_trait]
impl ArtifactStore for MemoryNetwork {
    async fn replace_node_relation(
        &self,
        table: &Ident,
        id_column: &Ident,
        relation: &NodeRelation,
    ) -> std::result::Result<(), QueryError> {
        self.replace(
            table,
            Persisted::NodeRelation {
                id_column: id_column.as_str().to_string(),
                rows: relation.points.iter().map(|p| (p.id, p.node)).collect(),
            },
        );
        Ok(())
    }

    async fn replace_cost_table(
        &self,
        table: &Ident,
        columns: &CostColumns,
        costs: &CostTable,
    ) -> std::result::Result<(), QueryError> {
        self.replace(
            table,
            Persisted::Costs {
                columns: [
                    columns.start.as_str().to_string(),
                    columns.end.as_str().to_string(),
                    columns.cost.as_str().to_string(),
                ],
                rows: costs
                    .hops
                    .iter()
                    .map(|(start, hop)| (*start, hop.end, hop.cost))
                    .collect(),
            },
        );
        Ok(())
    }

    async fn reset_polygon_table(
        &self,
        table: &Ident,
        key: &Ident,
        srid: i32,
    ) -> std::result::Result<(), QueryError> {
        if self.polygon_table_fails {
            return Err(failure(
                "create polygon table",
                "permission denied for schema public".to_string(),
            ));
        }

        self.replace(
            table,
            Persisted::Polygons {
                key: key.as_str().to_string(),
                srid,
                polygons: Vec::new(),
            },
        );
        Ok(())
    }

    async fn insert_polygon(
        &self,
        table: &Ident,
        _key: &Ident,
        polygon: &ServicePolygon,
    ) -> std::result::Result<(), QueryError> {
        let mut tables = self.tables.lock().unwrap();
        match tables.get_mut(table.as_str()) {
            Some(Persisted::Polygons { polygons, .. }) => {
                polygons.push(polygon.clone());
                Ok(())
            }
            _ => Err(failure(
                "insert polygon",
                format!("relation {table} does not exist"),
            )),
        }
    }
}

/// Grid builder that records requests, fails for the listed layers and
/// writes a placeholder raster for the others.
pub struct ScriptedGrid {
    failing: HashSet<String>,
    requests: Mutex<Vec<GridRequest>>,
}

impl ScriptedGrid {
    pub fn failing(layers: &[&str]) -> Self {
        Self {
            failing: layers.iter().map(|l| l.to_string()).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GridRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn layers(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.layer).collect()
    }
}

#[async_trait]
impl GridBuilder for ScriptedGrid {
    async fn build(&self, request: &GridRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());

        if self.failing.contains(&request.layer) {
            return Err(Error::GridBuilder {
                program: "gdal_grid".to_string(),
                status: "exit status: 1".to_string(),
                message: format!("ERROR 1: cannot open layer {}", request.layer),
            });
        }

        tokio::fs::write(&request.output, b"raster")
            .await
            .map_err(Error::io(&request.output))
    }
}
