use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::ident::StageName;
use crate::model::{CostRow, CostTable, Hop, NodeId, NodeRelation};
use crate::oracle::NetworkOracle;
use crate::store::{ArtifactStore, CostColumns};

use super::RunContext;

/// Least-cost hop from every reachable source node to the target stage,
/// persisted as `dist_<source>_<run>`.
pub async fn pairwise_cost(
    ctx: &RunContext,
    oracle: &dyn NetworkOracle,
    store: &dyn ArtifactStore,
    source: &NodeRelation,
    target: &NodeRelation,
) -> Result<CostTable> {
    let table = ctx.tables.cost_table(&source.stage)?;
    let columns = CostColumns::new(&source.stage, &target.stage)?;

    let sources = source.distinct_nodes();
    let targets = target.distinct_nodes();

    let rows = if sources.is_empty() || targets.is_empty() {
        Vec::new()
    } else {
        let source_ids: Vec<NodeId> = sources.iter().copied().collect();
        let target_ids: Vec<NodeId> = targets.iter().copied().collect();
        ctx.guard(
            "shortest path costs",
            oracle.shortest_costs(&source_ids, &target_ids, &ctx.cost_field),
        )
        .await?
    };

    let costs = reduce(&source.stage, &target.stage, &sources, &targets, rows);

    ctx.guard(
        "persist cost table",
        store.replace_cost_table(&table, &columns, &costs),
    )
    .await?;

    let unreachable = sources.len() - costs.len();
    log::info!(
        "{} -> {}: {} of {} source node(s) reach the next stage -> {}",
        source.stage,
        target.stage,
        costs.len(),
        sources.len(),
        table.as_str()
    );
    if unreachable > 0 {
        log::debug!(
            "{} -> {}: {unreachable} source node(s) without a path",
            source.stage,
            target.stage
        );
    }

    Ok(costs)
}

/// Keeps one row per source node: the cheapest target, lowest target id on
/// ties. Rows outside the requested node sets and non-finite costs are
/// dropped.
pub fn reduce(
    source: &StageName,
    target: &StageName,
    sources: &BTreeSet<NodeId>,
    targets: &BTreeSet<NodeId>,
    rows: impl IntoIterator<Item = CostRow>,
) -> CostTable {
    let mut hops: BTreeMap<NodeId, Hop> = BTreeMap::new();

    for row in rows {
        if !row.cost.is_finite() || !sources.contains(&row.start) || !targets.contains(&row.end) {
            continue;
        }

        let candidate = Hop {
            end: row.end,
            cost: row.cost,
        };
        hops.entry(row.start)
            .and_modify(|best| {
                if (candidate.cost, candidate.end) < (best.cost, best.end) {
                    *best = candidate;
                }
            })
            .or_insert(candidate);
    }

    CostTable {
        source: source.clone(),
        target: target.clone(),
        hops,
    }
}
