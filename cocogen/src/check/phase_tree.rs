use crate::model::{Phase, PhaseBody, PhaseId, PhaseTree, PhaseTreeKind};

/// Build the execution tree of the phases reachable from `root`.
///
/// Subphases must already have been checked to be declared before the
/// phases that use them, which guarantees that this terminates.
pub fn build_phase_tree(phases: &[Phase], root: PhaseId) -> PhaseTree {
    let kind = match &phases[root.0].body {
        PhaseBody::Subphases(subphases) => PhaseTreeKind::Composite(
            subphases
                .iter()
                .map(|subphase| {
                    assert!(*subphase < root, "subphase declared after its parent");
                    build_phase_tree(phases, *subphase)
                })
                .collect(),
        ),
        PhaseBody::Actions(actions) => PhaseTreeKind::Leaf(actions.clone()),
    };

    PhaseTree { phase: root, kind }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, PassId, TraversalId};

    fn phase(name: &str, body: PhaseBody) -> Phase {
        Phase {
            name: name.to_owned(),
            info: None,
            is_root: false,
            cycle: false,
            body,
        }
    }

    #[test]
    fn single_leaf() {
        let phases = [phase("Main", PhaseBody::Actions(vec![Action::Pass(PassId(0))]))];
        let tree = build_phase_tree(&phases, PhaseId(0));

        assert_eq!(
            tree,
            PhaseTree {
                phase: PhaseId(0),
                kind: PhaseTreeKind::Leaf(vec![Action::Pass(PassId(0))]),
            },
        );
    }

    #[test]
    fn nested_phases() {
        let phases = [
            phase("Scan", PhaseBody::Actions(vec![Action::Pass(PassId(0))])),
            phase("Check", PhaseBody::Actions(vec![Action::Traversal(TraversalId(0))])),
            phase("Front", PhaseBody::Subphases(vec![PhaseId(0), PhaseId(1)])),
            phase("Main", PhaseBody::Subphases(vec![PhaseId(2), PhaseId(0)])),
        ];
        let tree = build_phase_tree(&phases, PhaseId(3));

        match &tree.kind {
            PhaseTreeKind::Composite(subtrees) => {
                assert_eq!(subtrees.len(), 2);
                assert_eq!(subtrees[0].phase, PhaseId(2));
                assert_eq!(subtrees[1].phase, PhaseId(0));
            }
            PhaseTreeKind::Leaf(_) => panic!("expected a composite phase"),
        }
        assert_eq!(
            tree.actions(),
            [
                Action::Pass(PassId(0)),
                Action::Traversal(TraversalId(0)),
                Action::Pass(PassId(0)),
            ],
        );
    }
}
