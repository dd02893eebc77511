//! Política de staleness: qué stages deben re-ejecutarse según el historial
//! de runs.
//!
//! Un stage es stale si:
//! - nunca terminó `succeeded`;
//! - su último resultado terminal no fue `succeeded`;
//! - algún upstream tuvo un éxito más reciente (mayor `seq`) que el suyo;
//! - algún upstream es stale.
//!
//! Se evalúa en orden topológico, por lo que la propagación es transitiva.
use std::collections::HashMap;

use crate::event::{RunEvent, RunEventKind};
use crate::graph::StageGraph;

#[derive(Debug, Default, Clone, Copy)]
struct Outcomes {
    last_success: Option<u64>,
    last_terminal_ok: Option<bool>,
}

/// Ids de los stages stale, en orden topológico.
pub fn stale_stages(graph: &StageGraph, history: &[RunEvent]) -> Vec<String> {
    let mut outcomes: HashMap<&str, Outcomes> = HashMap::new();
    for ev in history {
        let (id, ok) = match &ev.kind {
            RunEventKind::StageSucceeded { stage_id, .. } => (stage_id.as_str(), true),
            RunEventKind::StageFailed { stage_id, .. } | RunEventKind::StageSkipped { stage_id, .. } => {
                (stage_id.as_str(), false)
            }
            _ => continue,
        };
        let entry = outcomes.entry(id).or_default();
        entry.last_terminal_ok = Some(ok);
        if ok {
            entry.last_success = Some(ev.seq);
        }
    }

    let mut stale = vec![false; graph.len()];
    for &idx in graph.order() {
        let node = graph.node(idx);
        let own = outcomes.get(node.definition.id()).copied().unwrap_or_default();
        let mut is_stale = own.last_success.is_none() || own.last_terminal_ok != Some(true);
        if !is_stale {
            for &up in &node.upstream {
                if stale[up] {
                    is_stale = true;
                    break;
                }
                let up_success = outcomes.get(graph.node(up).definition.id()).and_then(|o| o.last_success);
                if up_success > own.last_success {
                    is_stale = true;
                    break;
                }
            }
        }
        stale[idx] = is_stale;
    }

    graph.order()
         .iter()
         .filter(|&&i| stale[i])
         .map(|&i| graph.node(i).definition.id().to_string())
         .collect()
}
