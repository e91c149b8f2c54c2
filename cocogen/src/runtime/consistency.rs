//! Mandatory child checks.

use crate::model::{Child, MandatoryPhase, PhaseId};
use crate::runtime::{NodeRef, Tree};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("child `{child}` of `{node_type}` is mandatory in phase `{phase}`")]
pub struct MissingChild {
    pub node: NodeRef,
    pub node_type: String,
    pub child: String,
    pub phase: String,
}

/// Whether a child must be present during a phase.
pub fn is_required(child: &Child, phase: PhaseId) -> bool {
    if !child.mandatory {
        return false;
    }
    if child.mandatory_phases.is_empty() {
        return true;
    }

    let (negated, required): (Vec<&MandatoryPhase>, Vec<&MandatoryPhase>) =
        (child.mandatory_phases.iter()).partition(|range| range.negated);
    if required.iter().any(|range| range.contains(phase)) {
        return true;
    }
    required.is_empty() && !negated.iter().any(|range| range.contains(phase))
}

/// Every mandatory child missing from the tree rooted at `root`, in
/// pre-order.
pub fn check_mandatory(tree: &Tree<'_>, root: NodeRef, phase: PhaseId) -> Vec<MissingChild> {
    let config = tree.config();
    let mut missing = Vec::new();

    for node in tree.preorder(root) {
        let data = tree.data(node);
        let decl = &config[data.node];
        for (child, slot) in decl.children.iter().zip(&data.children) {
            if slot.is_none() && is_required(child, phase) {
                missing.push(MissingChild {
                    node,
                    node_type: decl.name.clone(),
                    child: child.name.clone(),
                    phase: config[phase].name.clone(),
                });
            }
        }
    }
    missing
}
