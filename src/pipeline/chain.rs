use std::collections::HashMap;

use crate::error::Result;
use crate::ident::cost_column;
use crate::model::{ChainRow, CostChain, CostRecord, CostSurfaceInput, CostTable, NodeId, NodeRelation};

/// Inner-joins consecutive cost tables end-to-start. A chain survives only
/// if every hop exists; broken chains are dropped without notice.
pub fn compose(tables: &[CostTable]) -> Result<CostChain> {
    let columns = tables
        .iter()
        .map(|t| cost_column(&t.source, &t.target).map(|c| c.as_str().to_string()))
        .collect::<Result<Vec<_>>>()?;

    let Some((first, rest)) = tables.split_first() else {
        return Ok(CostChain {
            columns,
            rows: Vec::new(),
        });
    };

    let mut rows: Vec<ChainRow> = first
        .hops
        .iter()
        .map(|(start, hop)| ChainRow {
            nodes: vec![*start, hop.end],
            costs: vec![hop.cost],
        })
        .collect();

    for table in rest {
        rows = rows
            .into_iter()
            .filter_map(|mut row| {
                let last = *row.nodes.last()?;
                let hop = table.hop(last)?;
                row.nodes.push(hop.end);
                row.costs.push(hop.cost);
                Some(row)
            })
            .collect();
    }

    Ok(CostChain { columns, rows })
}

/// Replaces each cost column with the running sum of itself and every column
/// to its left.
pub fn cumulative(chain: &CostChain) -> CostChain {
    let rows = chain
        .rows
        .iter()
        .map(|row| ChainRow {
            nodes: row.nodes.clone(),
            costs: row
                .costs
                .iter()
                .scan(0.0, |total, cost| {
                    *total += cost;
                    Some(*total)
                })
                .collect(),
        })
        .collect();

    CostChain {
        columns: chain.columns.clone(),
        rows,
    }
}

/// Joins chains back to the first stage's points on the snapped node id.
/// Points whose node starts no surviving chain are left out.
pub fn attach_points(chain: &CostChain, first_stage: &NodeRelation) -> CostSurfaceInput {
    let by_start: HashMap<NodeId, &ChainRow> =
        chain.rows.iter().map(|row| (row.start(), row)).collect();

    let mut records: Vec<CostRecord> = first_stage
        .points
        .iter()
        .filter_map(|point| {
            by_start.get(&point.node).map(|row| CostRecord {
                id: point.id,
                x: point.x,
                y: point.y,
                node: point.node,
                cumulative: row.costs.clone(),
            })
        })
        .collect();
    records.sort_by_key(|r| r.id);

    CostSurfaceInput {
        columns: chain.columns.clone(),
        records,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::ident::Stages;
    use crate::model::{Hop, SnappedPoint};

    fn table(stages: &Stages, index: usize, hops: &[(NodeId, NodeId, f64)]) -> CostTable {
        let (source, target) = stages.transitions().nth(index).unwrap();
        CostTable {
            source: source.clone(),
            target: target.clone(),
            hops: hops
                .iter()
                .map(|&(start, end, cost)| (start, Hop { end, cost }))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn only_unbroken_chains_survive() {
        // A1 -> B1 -> C1 connects; B2 -> C2 has no predecessor in A.
        let stages = Stages::new(&["a", "b", "c"]).unwrap();
        let tables = vec![
            table(&stages, 0, &[(101, 201, 1.0)]),
            table(&stages, 1, &[(201, 301, 2.0), (202, 302, 4.0)]),
        ];

        let chain = compose(&tables).unwrap();

        assert_eq!(chain.columns, vec!["costo_a_b", "costo_b_c"]);
        assert_eq!(
            chain.rows,
            vec![ChainRow {
                nodes: vec![101, 201, 301],
                costs: vec![1.0, 2.0],
            }]
        );
        assert!(!chain.rows.iter().any(|r| r.nodes.contains(&202)));
    }

    #[test]
    fn missing_middle_hop_drops_chain() {
        let stages = Stages::new(&["a", "b", "c", "d"]).unwrap();
        let tables = vec![
            table(&stages, 0, &[(1, 10, 1.0), (2, 20, 1.0)]),
            table(&stages, 1, &[(10, 100, 1.0)]),
            table(&stages, 2, &[(100, 1000, 1.0), (200, 2000, 1.0)]),
        ];

        let chain = compose(&tables).unwrap();
        let starts: Vec<NodeId> = chain.rows.iter().map(ChainRow::start).collect();
        assert_eq!(starts, vec![1]);
        assert_eq!(chain.rows[0].nodes, vec![1, 10, 100, 1000]);
    }

    #[test]
    fn running_sum_left_to_right() {
        let chain = CostChain {
            columns: vec!["c1".into(), "c2".into(), "c3".into()],
            rows: vec![ChainRow {
                nodes: vec![1, 2, 3, 4],
                costs: vec![2.0, 3.0, 5.0],
            }],
        };

        let cumulative = cumulative(&chain);
        assert_eq!(cumulative.rows[0].costs, vec![2.0, 5.0, 10.0]);
        assert_eq!(cumulative.rows[0].nodes, vec![1, 2, 3, 4]);
        assert_eq!(cumulative.columns, chain.columns);
    }

    #[test]
    fn points_join_on_snapped_node() {
        let stages = Stages::new(&["a", "b"]).unwrap();
        let chain = CostChain {
            columns: vec!["costo_a_b".into()],
            rows: vec![
                ChainRow { nodes: vec![7, 70], costs: vec![4.0] },
                ChainRow { nodes: vec![8, 80], costs: vec![6.0] },
            ],
        };
        let point = |id: i64, node: NodeId| SnappedPoint { id, x: id as f64, y: 0.0, node };
        let relation = NodeRelation {
            stage: stages.first().clone(),
            points: vec![point(3, 8), point(1, 7), point(2, 7), point(4, 9)],
        };

        let input = attach_points(&chain, &relation);
        let joined: Vec<(i64, NodeId, f64)> = input
            .records
            .iter()
            .map(|r| (r.id, r.node, r.cumulative[0]))
            .collect();

        assert_eq!(joined, vec![(1, 7, 4.0), (2, 7, 4.0), (3, 8, 6.0)]);
    }
}
