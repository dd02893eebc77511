use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::Selection;
use crate::engine::staleness::stale_stages;
use crate::errors::EngineError;
use crate::event::RunEvent;
use crate::stage::StageDefinition;

/// Nodo validado: definición + índices de sus upstream directos.
pub struct StageNode {
    pub definition: Arc<dyn StageDefinition>,
    pub upstream: Vec<usize>,
}

/// Grafo inmutable y ya validado (acíclico, ids únicos).
///
/// Se construye una sola vez al arrancar (`GraphBuilder::build`); los runs
/// sólo lo leen.
pub struct StageGraph {
    nodes: Vec<StageNode>,
    index: IndexMap<String, usize>,
    order: Vec<usize>,
    downstream: Vec<Vec<usize>>,
    graph_hash: String,
}

impl StageGraph {
    pub(crate) fn new(nodes: Vec<StageNode>, index: IndexMap<String, usize>, order: Vec<usize>, graph_hash: String) -> Self {
        let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        for (i, node) in nodes.iter().enumerate() {
            for &up in &node.upstream {
                downstream[up].push(i);
            }
        }
        Self { nodes,
               index,
               order,
               downstream,
               graph_hash }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn graph_hash(&self) -> &str {
        &self.graph_hash
    }

    pub fn node(&self, idx: usize) -> &StageNode {
        &self.nodes[idx]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Orden topológico (índices de declaración).
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn topological_ids(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.nodes[i].definition.id()).collect()
    }

    pub fn upstream_ids(&self, idx: usize) -> Vec<&str> {
        self.nodes[idx].upstream.iter().map(|&u| self.nodes[u].definition.id()).collect()
    }

    /// Resuelve una selección a índices en orden topológico.
    ///
    /// `history` sólo se consulta para `Selection::Stale`.
    pub fn resolve(&self, selection: &Selection, history: &[RunEvent]) -> Result<Vec<usize>, EngineError> {
        let chosen: BTreeSet<usize> = match selection {
            Selection::All => (0..self.nodes.len()).collect(),
            Selection::Stages(names) => self.lookup(names)?,
            Selection::Downstream(names) => {
                let mut set = self.lookup(names)?;
                let mut stack: Vec<usize> = set.iter().copied().collect();
                while let Some(i) = stack.pop() {
                    for &d in &self.downstream[i] {
                        if set.insert(d) {
                            stack.push(d);
                        }
                    }
                }
                set
            }
            Selection::Stale => stale_stages(self, history).iter()
                                                           .filter_map(|id| self.index_of(id))
                                                           .collect(),
        };
        Ok(self.order.iter().copied().filter(|i| chosen.contains(i)).collect())
    }

    fn lookup(&self, names: &[String]) -> Result<BTreeSet<usize>, EngineError> {
        if names.is_empty() {
            return Err(EngineError::EmptySelection);
        }
        names.iter()
             .map(|n| self.index_of(n).ok_or_else(|| EngineError::UnknownStage(n.clone())))
             .collect()
    }
}

impl fmt::Debug for StageGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageGraph")
         .field("order", &self.topological_ids())
         .field("graph_hash", &self.graph_hash)
         .finish()
    }
}
