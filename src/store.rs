//! Persistence of the derived tables.

use async_trait::async_trait;

use crate::error::{QueryError, Result};
use crate::ident::{cost_column, Ident, StageName};
use crate::model::{CostTable, NodeRelation, ServicePolygon};

/// Column names of a persisted cost table: `id_<source>`, `id_<target>`,
/// `costo_<source>_<target>`.
#[derive(Debug, Clone)]
pub struct CostColumns {
    pub start: Ident,
    pub end: Ident,
    pub cost: Ident,
}

impl CostColumns {
    pub fn new(source: &StageName, target: &StageName) -> Result<Self> {
        Ok(Self {
            start: source.id_column()?,
            end: target.id_column()?,
            cost: cost_column(source, target)?,
        })
    }
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Drops `table` if present and writes `relation` into a fresh one.
    async fn replace_node_relation(
        &self,
        table: &Ident,
        id_column: &Ident,
        relation: &NodeRelation,
    ) -> std::result::Result<(), QueryError>;

    /// Drops `table` if present and writes `costs` into a fresh one.
    async fn replace_cost_table(
        &self,
        table: &Ident,
        columns: &CostColumns,
        costs: &CostTable,
    ) -> std::result::Result<(), QueryError>;

    /// Drops and recreates an empty polygon table keyed by `key`.
    async fn reset_polygon_table(
        &self,
        table: &Ident,
        key: &Ident,
        srid: i32,
    ) -> std::result::Result<(), QueryError>;

    async fn insert_polygon(
        &self,
        table: &Ident,
        key: &Ident,
        polygon: &ServicePolygon,
    ) -> std::result::Result<(), QueryError>;
}
