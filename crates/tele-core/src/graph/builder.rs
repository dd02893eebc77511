//! Builder del grafo de stages.
//!
//! Cada stage se declara con su lista explícita de upstream. `build` valida
//! una sola vez: ids no vacíos y únicos, upstream conocidos y ausencia de
//! ciclos. El orden topológico resultante usa el orden de declaración como
//! desempate entre stages listos.
//!
//! ```ignore
//! let graph = GraphBuilder::new()
//!     .stage(ExtractStage::new(..), &[])
//!     .stage(LoadStage::new(..), &["raw_files"])
//!     .build()?;
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::json;

use super::dag::{StageGraph, StageNode};
use crate::errors::GraphError;
use crate::hashing::hash_value;
use crate::stage::StageDefinition;

struct StageDecl {
    definition: Arc<dyn StageDefinition>,
    upstream: Vec<String>,
}

#[derive(Default)]
pub struct GraphBuilder {
    decls: Vec<StageDecl>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declara un stage y sus dependencias directas.
    pub fn stage<S>(self, stage: S, upstream: &[&str]) -> Self
        where S: StageDefinition + 'static
    {
        self.shared_stage(Arc::new(stage), upstream)
    }

    pub fn shared_stage(mut self, stage: Arc<dyn StageDefinition>, upstream: &[&str]) -> Self {
        self.decls.push(StageDecl { definition: stage,
                                    upstream: upstream.iter().map(|s| s.to_string()).collect() });
        self
    }

    /// Valida la declaración y calcula el orden topológico.
    pub fn build(self) -> Result<StageGraph, GraphError> {
        let mut index: IndexMap<String, usize> = IndexMap::with_capacity(self.decls.len());
        for (i, decl) in self.decls.iter().enumerate() {
            let id = decl.definition.id();
            if id.is_empty() {
                return Err(GraphError::EmptyStageId);
            }
            if index.insert(id.to_string(), i).is_some() {
                return Err(GraphError::DuplicateStage(id.to_string()));
            }
        }

        let mut nodes: Vec<StageNode> = Vec::with_capacity(self.decls.len());
        for decl in &self.decls {
            let mut upstream: Vec<usize> = Vec::with_capacity(decl.upstream.len());
            for name in &decl.upstream {
                let idx = *index.get(name).ok_or_else(|| GraphError::UnknownUpstream { stage: decl.definition.id().to_string(),
                                                                                      upstream: name.clone() })?;
                if !upstream.contains(&idx) {
                    upstream.push(idx);
                }
            }
            nodes.push(StageNode { definition: decl.definition.clone(),
                                   upstream });
        }

        let order = topological_order(&nodes)?;
        let graph_hash = definition_hash(&nodes);
        Ok(StageGraph::new(nodes, index, order, graph_hash))
    }
}

/// Kahn con desempate por orden de declaración.
fn topological_order(nodes: &[StageNode]) -> Result<Vec<usize>, GraphError> {
    let n = nodes.len();
    let mut indegree: Vec<usize> = nodes.iter().map(|node| node.upstream.len()).collect();
    let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, node) in nodes.iter().enumerate() {
        for &up in &node.upstream {
            downstream[up].push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &d in &downstream[next] {
            indegree[d] -= 1;
            if indegree[d] == 0 {
                ready.insert(d);
            }
        }
    }

    if order.len() == n {
        return Ok(order);
    }
    let remaining: Vec<bool> = (0..n).map(|i| indegree[i] > 0).collect();
    Err(GraphError::Cycle { stage: nodes[stage_on_cycle(nodes, &remaining)].definition.id().to_string() })
}

/// Un nodo sin procesar siempre tiene algún upstream sin procesar; seguir esa
/// cadena termina repitiendo un nodo, que está sobre un ciclo.
fn stage_on_cycle(nodes: &[StageNode], remaining: &[bool]) -> usize {
    let mut current = remaining.iter().position(|&r| r).unwrap_or(0);
    let mut seen = vec![false; nodes.len()];
    loop {
        if seen[current] {
            return current;
        }
        seen[current] = true;
        match nodes[current].upstream.iter().copied().find(|&u| remaining[u]) {
            Some(up) => current = up,
            None => return current,
        }
    }
}

fn definition_hash(nodes: &[StageNode]) -> String {
    let stages: Vec<serde_json::Value> =
        nodes.iter()
             .map(|node| {
                 let upstream: Vec<&str> = node.upstream.iter().map(|&u| nodes[u].definition.id()).collect();
                 json!({
                     "id": node.definition.id(),
                     "kind": node.definition.kind().as_str(),
                     "upstream": upstream,
                 })
             })
             .collect();
    hash_value(&json!({
        "engine_version": crate::constants::ENGINE_VERSION,
        "stages": stages,
    }))
}
