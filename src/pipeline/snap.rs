use crate::error::{Error, Result};
use crate::ident::StageName;
use crate::model::{NodeRelation, SnappedPoint};
use crate::oracle::{NearestNode, NetworkOracle};
use crate::store::ArtifactStore;

use super::RunContext;

/// Snaps every point of `stage` to its closest network node and replaces the
/// stage's node relation table with the result.
pub async fn snap(
    ctx: &RunContext,
    oracle: &dyn NetworkOracle,
    store: &dyn ArtifactStore,
    stage: &StageName,
) -> Result<NodeRelation> {
    let table = ctx.tables.node_relation(stage)?;
    let id_column = stage.id_column()?;

    let nearest = ctx
        .guard("nearest node lookup", oracle.nearest_nodes(stage))
        .await?;
    let relation = assign(stage, nearest)?;

    ctx.guard(
        "persist node relation",
        store.replace_node_relation(&table, &id_column, &relation),
    )
    .await?;

    log::info!(
        "{stage}: snapped {} point(s) to {} node(s) -> {}",
        relation.points.len(),
        relation.distinct_nodes().len(),
        table.as_str()
    );

    Ok(relation)
}

/// Fails if any point came back without a node.
fn assign(stage: &StageName, nearest: Vec<NearestNode>) -> Result<NodeRelation> {
    let unsnapped = nearest.iter().filter(|n| n.node.is_none()).count();
    if unsnapped > 0 {
        return Err(Error::Unsnapped {
            stage: stage.to_string(),
            count: unsnapped,
        });
    }

    let points = nearest
        .into_iter()
        .filter_map(|n| {
            n.node.map(|node| SnappedPoint {
                id: n.id,
                x: n.x,
                y: n.y,
                node,
            })
        })
        .collect();

    Ok(NodeRelation {
        stage: stage.clone(),
        points,
    })
}
