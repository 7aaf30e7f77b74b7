//! Statement builders for the derived tables and the pgRouting queries.
//!
//! Only [`Ident`]s and validated integers are spliced; everything else is a
//! bound parameter.

use crate::ident::Ident;

pub fn drop_table(table: &Ident) -> String {
    format!("DROP TABLE IF EXISTS {table}")
}

pub fn create_node_relation(table: &Ident, id_column: &Ident) -> String {
    format!(
        "CREATE TABLE {table} (
            {id_column} BIGINT NOT NULL,
            closest_node BIGINT NOT NULL
        )"
    )
}

/// Binds: `$1 BIGINT[]` point ids, `$2 BIGINT[]` node ids.
pub fn insert_node_relation(table: &Ident) -> String {
    format!("INSERT INTO {table} SELECT * FROM UNNEST($1::BIGINT[], $2::BIGINT[])")
}

pub fn create_cost_table(table: &Ident, start: &Ident, end: &Ident, cost: &Ident) -> String {
    format!(
        "CREATE TABLE {table} (
            {start} BIGINT NOT NULL PRIMARY KEY,
            {end} BIGINT NOT NULL,
            {cost} DOUBLE PRECISION NOT NULL
        )"
    )
}

/// Binds: `$1 BIGINT[]` start nodes, `$2 BIGINT[]` end nodes, `$3 FLOAT8[]` costs.
pub fn insert_cost_table(table: &Ident) -> String {
    format!(
        "INSERT INTO {table} SELECT * FROM UNNEST($1::BIGINT[], $2::BIGINT[], $3::FLOAT8[])"
    )
}

pub fn create_polygon_table(table: &Ident, key: &Ident, srid: i32) -> String {
    format!(
        "CREATE TABLE {table} (
            {key} BIGINT NOT NULL,
            geom geometry(Polygon, {srid})
        )"
    )
}

/// Binds: `$1 BIGINT` node id, `$2 TEXT` polygon WKT, `$3 INTEGER` srid.
pub fn insert_polygon(table: &Ident, key: &Ident) -> String {
    format!("INSERT INTO {table} ({key}, geom) VALUES ($1, ST_GeomFromText($2, $3))")
}

/// Stage points with their closest network vertex. Multi-point geometries
/// contribute their first component.
pub fn nearest_nodes(stage: &Ident, vertices: &Ident) -> String {
    format!(
        "SELECT
            f.id::BIGINT AS id,
            ST_X(ST_GeometryN(f.geom, 1)) AS x,
            ST_Y(ST_GeometryN(f.geom, 1)) AS y,
            (
                SELECT n.id::BIGINT
                FROM {vertices} AS n
                ORDER BY f.geom <-> n.geom
                LIMIT 1
            ) AS closest_node
        FROM {stage} AS f
        ORDER BY f.id"
    )
}

/// Inner edge query handed to `pgr_dijkstraCost` as text.
pub fn edges_query(edges: &Ident, cost_field: &Ident) -> String {
    format!("SELECT id, source, target, {cost_field} AS cost FROM {edges}")
}

/// Binds: `$1 TEXT` edge query, `$2 BIGINT[]` sources, `$3 BIGINT[]` targets.
pub const DIJKSTRA_COST: &str = "
    SELECT start_vid, end_vid, agg_cost
    FROM pgr_dijkstraCost($1, $2::BIGINT[], $3::BIGINT[], directed := false)
";

/// Binds: `$1 TEXT` vertex query, `$2 INTEGER` srid.
pub const POINTS_AS_POLYGON: &str =
    "SELECT ST_AsText(ST_SetSRID(pgr_pointsAsPolygon($1), $2))";

/// Inline `(id, x, y)` relation handed to `pgr_pointsAsPolygon`. Coordinates
/// must be finite.
pub fn vertices_query(vertices: &[crate::model::PolygonVertex]) -> String {
    let rows = vertices
        .iter()
        .map(|v| format!("({}, {:?}::FLOAT8, {:?}::FLOAT8)", v.id, v.x, v.y))
        .collect::<Vec<_>>()
        .join(", ");

    format!("SELECT id::INT4, x, y FROM (VALUES {rows}) AS v(id, x, y)")
}
