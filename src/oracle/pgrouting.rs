use async_trait::async_trait;

use crate::db::Database;
use crate::error::QueryError;
use crate::ident::{Ident, StageName};
use crate::model::{CostRow, NodeId, PolygonVertex};
use crate::schema;

use super::{NearestNode, NetworkOracle};

/// pgRouting over PostGIS: `edges` holds `id, source, target` and the cost
/// columns, `vertices` holds `id, geom`.
#[derive(Clone)]
pub struct PgRouting {
    db: Database,
    edges: Ident,
    vertices: Ident,
}

impl PgRouting {
    pub fn new(db: Database, edges: Ident, vertices: Ident) -> Self {
        Self {
            db,
            edges,
            vertices,
        }
    }
}

#[async_trait]
impl NetworkOracle for PgRouting {
    async fn nearest_nodes(&self, stage: &StageName) -> Result<Vec<NearestNode>, QueryError> {
        let rows: Vec<(i64, f64, f64, Option<i64>)> =
            sqlx::query_as(&schema::nearest_nodes(stage.table(), &self.vertices))
                .fetch_all(&self.db.pool)
                .await
                .map_err(QueryError::during("nearest node lookup"))?;

        Ok(rows
            .into_iter()
            .map(|(id, x, y, node)| NearestNode { id, x, y, node })
            .collect())
    }

    async fn shortest_costs(
        &self,
        sources: &[NodeId],
        targets: &[NodeId],
        cost_field: &Ident,
    ) -> Result<Vec<CostRow>, QueryError> {
        let rows: Vec<(i64, i64, f64)> = sqlx::query_as(schema::DIJKSTRA_COST)
            .bind(schema::edges_query(&self.edges, cost_field))
            .bind(sources)
            .bind(targets)
            .fetch_all(&self.db.pool)
            .await
            .map_err(QueryError::during("pgr_dijkstraCost"))?;

        Ok(rows
            .into_iter()
            .map(|(start, end, cost)| CostRow { start, end, cost })
            .collect())
    }

    async fn points_as_polygon(
        &self,
        vertices: &[PolygonVertex],
        srid: i32,
    ) -> Result<Option<String>, QueryError> {
        sqlx::query_scalar(schema::POINTS_AS_POLYGON)
            .bind(schema::vertices_query(vertices))
            .bind(srid)
            .fetch_one(&self.db.pool)
            .await
            .map_err(QueryError::during("pgr_pointsAsPolygon"))
    }
}
