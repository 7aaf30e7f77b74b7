use std::str::FromStr;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::config::DatabaseConfig;
use crate::error::QueryError;
use crate::ident::Ident;
use crate::model::{CostTable, NodeRelation, ServicePolygon};
use crate::schema;
use crate::store::{ArtifactStore, CostColumns};

#[derive(Clone)]
pub struct Database {
    pub pool: sqlx::PgPool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let options = match config {
            DatabaseConfig::Url(url) => PgConnectOptions::from_str(url)?,
            DatabaseConfig::Params {
                host,
                port,
                user,
                password,
                database,
            } => {
                let mut options = PgConnectOptions::new()
                    .host(host)
                    .port(*port)
                    .database(database);
                if let Some(user) = user {
                    options = options.username(user);
                }
                if let Some(password) = password {
                    options = options.password(password);
                }
                options
            }
        };

        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        Ok(Database { pool })
    }
}

#[async_trait]
impl ArtifactStore for Database {
    async fn replace_node_relation(
        &self,
        table: &Ident,
        id_column: &Ident,
        relation: &NodeRelation,
    ) -> Result<(), QueryError> {
        let (ids, nodes): (Vec<i64>, Vec<i64>) =
            relation.points.iter().map(|p| (p.id, p.node)).unzip();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(QueryError::during("begin node relation"))?;

        sqlx::query(&schema::drop_table(table))
            .execute(&mut *tx)
            .await
            .map_err(QueryError::during("drop node relation"))?;

        sqlx::query(&schema::create_node_relation(table, id_column))
            .execute(&mut *tx)
            .await
            .map_err(QueryError::during("create node relation"))?;

        sqlx::query(&schema::insert_node_relation(table))
            .bind(&ids)
            .bind(&nodes)
            .execute(&mut *tx)
            .await
            .map_err(QueryError::during("insert node relation"))?;

        tx.commit()
            .await
            .map_err(QueryError::during("commit node relation"))
    }

    async fn replace_cost_table(
        &self,
        table: &Ident,
        columns: &CostColumns,
        costs: &CostTable,
    ) -> Result<(), QueryError> {
        let mut starts = Vec::with_capacity(costs.len());
        let mut ends = Vec::with_capacity(costs.len());
        let mut values = Vec::with_capacity(costs.len());
        for (node, hop) in &costs.hops {
            starts.push(*node);
            ends.push(hop.end);
            values.push(hop.cost);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(QueryError::during("begin cost table"))?;

        sqlx::query(&schema::drop_table(table))
            .execute(&mut *tx)
            .await
            .map_err(QueryError::during("drop cost table"))?;

        sqlx::query(&schema::create_cost_table(table, &columns.start, &columns.end, &columns.cost))
            .execute(&mut *tx)
            .await
            .map_err(QueryError::during("create cost table"))?;

        sqlx::query(&schema::insert_cost_table(table))
            .bind(&starts)
            .bind(&ends)
            .bind(&values)
            .execute(&mut *tx)
            .await
            .map_err(QueryError::during("insert cost table"))?;

        tx.commit().await.map_err(QueryError::during("commit cost table"))
    }

    async fn reset_polygon_table(
        &self,
        table: &Ident,
        key: &Ident,
        srid: i32,
    ) -> Result<(), QueryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(QueryError::during("begin polygon table"))?;

        sqlx::query(&schema::drop_table(table))
            .execute(&mut *tx)
            .await
            .map_err(QueryError::during("drop polygon table"))?;

        sqlx::query(&schema::create_polygon_table(table, key, srid))
            .execute(&mut *tx)
            .await
            .map_err(QueryError::during("create polygon table"))?;

        tx.commit().await.map_err(QueryError::during("commit polygon table"))
    }

    async fn insert_polygon(
        &self,
        table: &Ident,
        key: &Ident,
        polygon: &ServicePolygon,
    ) -> Result<(), QueryError> {
        sqlx::query(&schema::insert_polygon(table, key))
            .bind(polygon.node)
            .bind(&polygon.wkt)
            .bind(polygon.srid)
            .execute(&self.pool)
            .await
            .map_err(QueryError::during("insert polygon"))?;

        Ok(())
    }
}
