//! Traversal dispatch with node replacement.

use fxhash::FxHashMap;

use crate::model::{NodeId, NodeType, Reachability, TraversalId};
use crate::runtime::{NodeRef, Tree};

/// What to do when a handler returns a replacement that does not fit the
/// slot it would be stored in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ReplacementPolicy {
    /// Keep the original child and record the mismatch.
    #[default]
    Skip,
    /// Fail the traversal.
    Error,
}

/// A node to store in place of the node that was just visited.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Replacement(pub NodeRef);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TravError {
    #[error(
        "replacement of type `{found}` does not fit child `{child}` of `{parent}`, \
         which expects `{expected}`"
    )]
    MismatchedReplacement {
        parent: String,
        child: String,
        expected: String,
        found: String,
    },
    #[error("replacement of type `{found}` does not fit the traversal root, which expects `{expected}`")]
    MismatchedRoot { expected: String, found: String },
    #[error("{0}")]
    Handler(String),
}

pub type HandlerResult = Result<Option<Replacement>, TravError>;

type Handler<'h, S> =
    dyn Fn(&mut TravContext<'_, '_, 'h, S>, NodeRef, &mut S) -> HandlerResult + 'h;

/// User handlers, keyed by traversal and node type.
pub struct Handlers<'h, S> {
    handlers: FxHashMap<(TraversalId, NodeId), Box<Handler<'h, S>>>,
}

impl<'h, S> Handlers<'h, S> {
    pub fn new() -> Handlers<'h, S> {
        Handlers {
            handlers: FxHashMap::default(),
        }
    }

    /// Register the handler of a node type in a traversal. It is only ever
    /// called when the traversal lists the node.
    pub fn on(
        &mut self,
        traversal: TraversalId,
        node: NodeId,
        handler: impl Fn(&mut TravContext<'_, '_, 'h, S>, NodeRef, &mut S) -> HandlerResult + 'h,
    ) -> &mut Handlers<'h, S> {
        self.handlers.insert((traversal, node), Box::new(handler));
        self
    }

    fn get(&self, traversal: TraversalId, node: NodeId) -> Option<&Handler<'h, S>> {
        self.handlers.get(&(traversal, node)).map(Box::as_ref)
    }
}

impl<'h, S> Default for Handlers<'h, S> {
    fn default() -> Self {
        Handlers::new()
    }
}

/// The state of a (possibly nested) traversal.
pub struct TravContext<'a, 'config, 'h, S> {
    tree: &'a mut Tree<'config>,
    handlers: &'a Handlers<'h, S>,
    reachability: Reachability,
    policy: ReplacementPolicy,
    stack: Vec<TraversalId>,
    skipped: Vec<TravError>,
}

impl<'a, 'config, 'h, S> TravContext<'a, 'config, 'h, S> {
    pub fn new(tree: &'a mut Tree<'config>, handlers: &'a Handlers<'h, S>) -> Self {
        TravContext {
            reachability: tree.config().reachability(),
            tree,
            handlers,
            policy: ReplacementPolicy::default(),
            stack: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: ReplacementPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn tree(&self) -> &Tree<'config> {
        self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree<'config> {
        self.tree
    }

    /// The innermost active traversal.
    pub fn current(&self) -> Option<TraversalId> {
        self.stack.last().copied()
    }

    /// Replacements that were dropped under [`ReplacementPolicy::Skip`].
    pub fn skipped(&self) -> &[TravError] {
        &self.skipped
    }

    /// Run a traversal over the tree rooted at `root`, returning the new
    /// root. Traversals may be started from inside handlers.
    pub fn start(
        &mut self,
        traversal: TraversalId,
        root: NodeRef,
        state: &mut S,
    ) -> Result<NodeRef, TravError> {
        let config = self.tree.config();
        let original = self.tree.node_type(root);

        tracing::trace!(traversal = %config[traversal].name, "start traversal");
        self.stack.push(traversal);
        let result = self.visit(root, state);
        self.stack.pop();

        match result? {
            None => Ok(root),
            Some(Replacement(node)) if self.fits_root(original, self.tree.node_type(node)) => {
                Ok(node)
            }
            Some(Replacement(node)) => {
                let error = TravError::MismatchedRoot {
                    expected: config[original].name.clone(),
                    found: self.tree.type_name(node).to_owned(),
                };
                self.mismatch(error)?;
                Ok(root)
            }
        }
    }

    /// A root may be replaced by a node of the same type, or by another
    /// member of a nodeset containing it.
    fn fits_root(&self, original: NodeId, replacement: NodeId) -> bool {
        let config = self.tree.config();
        original == replacement
            || (config.nodesets_of(original))
                .any(|set| config.accepts(NodeType::Nodeset(set), replacement))
    }

    /// Visit a node: call its handler in the current traversal, or descend
    /// into the children that may contain a handled node.
    pub fn visit(&mut self, node: NodeRef, state: &mut S) -> HandlerResult {
        let config = self.tree.config();
        let node_type = self.tree.node_type(node);
        let handlers = self.handlers;

        match self.current() {
            Some(traversal) if config[traversal].handles(node_type) => {
                match handlers.get(traversal, node_type) {
                    Some(handler) => handler(self, node, state),
                    None => self.descend(node, state).map(|()| None),
                }
            }
            _ => self.descend(node, state).map(|()| None),
        }
    }

    fn descend(&mut self, node: NodeRef, state: &mut S) -> Result<(), TravError> {
        let config = self.tree.config();
        let decl = &config[self.tree.node_type(node)];
        for (slot, child) in decl.children.iter().enumerate() {
            let needed = match self.current() {
                Some(traversal) => {
                    (self.reachability).needs_descent(config, &config[traversal], child.r#type)
                }
                None => true,
            };
            if needed {
                self.visit_child(node, slot, state)?;
            }
        }
        Ok(())
    }

    /// Visit every child of a node, in declaration order.
    pub fn visit_children(&mut self, node: NodeRef, state: &mut S) -> Result<(), TravError> {
        let count = self.tree.data(node).children.len();
        (0..count).try_for_each(|slot| self.visit_child(node, slot, state))
    }

    /// Visit one child slot of a node, storing the replacement it returns.
    pub fn visit_child(
        &mut self,
        node: NodeRef,
        slot: usize,
        state: &mut S,
    ) -> Result<(), TravError> {
        let Some(child) = self.tree.data(node).children[slot] else {
            return Ok(());
        };
        let Some(Replacement(replacement)) = self.visit(child, state)? else {
            return Ok(());
        };

        let config = self.tree.config();
        let decl = &config[self.tree.node_type(node)];
        let expected = decl.children[slot].r#type;
        if self.tree.accepts(expected, replacement) {
            self.tree.replace_child(node, slot, Some(replacement));
            Ok(())
        } else {
            self.mismatch(TravError::MismatchedReplacement {
                parent: decl.name.clone(),
                child: decl.children[slot].name.clone(),
                expected: config.type_name(expected).to_owned(),
                found: self.tree.type_name(replacement).to_owned(),
            })
        }
    }

    fn mismatch(&mut self, error: TravError) -> Result<(), TravError> {
        match self.policy {
            ReplacementPolicy::Error => Err(error),
            ReplacementPolicy::Skip => {
                tracing::warn!("{error}");
                self.skipped.push(error);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::tests::check_ok;
    use crate::model::Config;
    use crate::runtime::Value;

    const SOURCE: &str = r#"
        root node Program { children { child Expr body { construct }, child Num count { construct } } };
        nodeset Expr { Num, Var, Add };
        node Num { attributes { construct int value } };
        node Var { attributes { construct string name } };
        node Add { children { child Expr left { construct }, child Expr right { construct } } };
        traversal Fold { nodes { Add } };
        traversal Rename { nodes { Var } };
        traversal Count;
        pass Noop;
        root phase Main { passes { Noop } };
    "#;

    fn id(config: &Config, name: &str) -> NodeId {
        config.node_by_name(name).unwrap()
    }

    fn num(tree: &mut Tree<'_>, value: i64) -> NodeRef {
        let num = id(tree.config(), "Num");
        tree.create(num, vec![], vec![Some(Value::Int(value))]).unwrap()
    }

    fn var(tree: &mut Tree<'_>, name: &str) -> NodeRef {
        let var = id(tree.config(), "Var");
        tree.create(var, vec![], vec![Some(Value::String(name.to_owned()))]).unwrap()
    }

    fn add(tree: &mut Tree<'_>, left: NodeRef, right: NodeRef) -> NodeRef {
        let add = id(tree.config(), "Add");
        tree.create(add, vec![Some(left), Some(right)], vec![]).unwrap()
    }

    fn program(tree: &mut Tree<'_>, body: NodeRef, count: NodeRef) -> NodeRef {
        let program = id(tree.config(), "Program");
        tree.create(program, vec![Some(body), Some(count)], vec![]).unwrap()
    }

    fn fold_handlers<'h>(config: &Config) -> Handlers<'h, ()> {
        let fold = TraversalId(0);
        let mut handlers = Handlers::new();
        handlers.on(fold, id(config, "Add"), |ctx, node, state| {
            ctx.visit_children(node, state)?;
            let value = |ctx: &TravContext<'_, '_, '_, ()>, name| {
                let child = ctx.tree().child(node, name)?;
                match ctx.tree().attr(child, "value") {
                    Some(Value::Int(value)) => Some(*value),
                    _ => None,
                }
            };
            match (value(&*ctx, "left"), value(&*ctx, "right")) {
                (Some(left), Some(right)) => {
                    let sum = num(ctx.tree_mut(), left + right);
                    Ok(Some(Replacement(sum)))
                }
                _ => Ok(None),
            }
        });
        handlers
    }

    #[test]
    fn constant_folding() {
        let config = check_ok(SOURCE);
        let mut tree = Tree::new(&config);
        let one = num(&mut tree, 1);
        let two = num(&mut tree, 2);
        let three = num(&mut tree, 3);
        let inner = add(&mut tree, one, two);
        let outer = add(&mut tree, inner, three);
        let count = num(&mut tree, 0);
        let root = program(&mut tree, outer, count);

        let handlers = fold_handlers(&config);
        let mut ctx = TravContext::new(&mut tree, &handlers);
        let new_root = ctx.start(TraversalId(0), root, &mut ()).unwrap();
        assert_eq!(new_root, root);
        assert!(ctx.skipped().is_empty());
        assert_eq!(ctx.current(), None);

        let body = tree.child(root, "body").unwrap();
        assert_eq!(tree.type_name(body), "Num");
        assert_eq!(tree.attr(body, "value"), Some(&Value::Int(6)));
    }

    #[test]
    fn mismatched_replacement_is_skipped() {
        let config = check_ok(SOURCE);
        let mut tree = Tree::new(&config);
        let body = var(&mut tree, "x");
        let count = num(&mut tree, 0);
        let root = program(&mut tree, body, count);

        let mut handlers = Handlers::new();
        handlers.on(TraversalId(2), id(&config, "Num"), |ctx, _, _: &mut ()| {
            Ok(Some(Replacement(var(ctx.tree_mut(), "y"))))
        });

        let mut ctx = TravContext::new(&mut tree, &handlers);
        ctx.start(TraversalId(2), root, &mut ()).unwrap();
        assert_eq!(ctx.skipped().len(), 1);
        assert!(matches!(
            &ctx.skipped()[0],
            TravError::MismatchedReplacement { child, .. } if child == "count",
        ));
        assert_eq!(tree.child(root, "count"), Some(count));
    }

    #[test]
    fn mismatched_replacement_is_an_error() {
        let config = check_ok(SOURCE);
        let mut tree = Tree::new(&config);
        let body = var(&mut tree, "x");
        let count = num(&mut tree, 0);
        let root = program(&mut tree, body, count);

        let mut handlers = Handlers::new();
        handlers.on(TraversalId(2), id(&config, "Num"), |ctx, _, _: &mut ()| {
            Ok(Some(Replacement(var(ctx.tree_mut(), "y"))))
        });

        let mut ctx = TravContext::new(&mut tree, &handlers).with_policy(ReplacementPolicy::Error);
        let result = ctx.start(TraversalId(2), root, &mut ());
        assert!(matches!(result, Err(TravError::MismatchedReplacement { .. })));
        assert_eq!(ctx.current(), None);
    }

    #[test]
    fn nested_traversals() {
        let config = check_ok(SOURCE);
        let mut tree = Tree::new(&config);
        let x = var(&mut tree, "x");
        let y = var(&mut tree, "y");
        let body = add(&mut tree, x, y);
        let count = num(&mut tree, 0);
        let root = program(&mut tree, body, count);

        let (fold, rename) = (TraversalId(0), TraversalId(1));
        let mut handlers = Handlers::new();
        handlers
            .on(fold, id(&config, "Add"), move |ctx, node, renamed: &mut Vec<String>| {
                assert_eq!(ctx.current(), Some(fold));
                ctx.start(rename, node, renamed)?;
                assert_eq!(ctx.current(), Some(fold));
                Ok(None)
            })
            .on(rename, id(&config, "Var"), move |ctx, node, renamed| {
                assert_eq!(ctx.current(), Some(rename));
                if let Some(Value::String(name)) = ctx.tree().attr(node, "name") {
                    renamed.push(name.clone());
                }
                Ok(None)
            });

        let mut renamed = Vec::new();
        let mut ctx = TravContext::new(&mut tree, &handlers);
        ctx.start(fold, root, &mut renamed).unwrap();
        assert_eq!(renamed, ["x", "y"]);
    }

    #[test]
    fn descent_is_pruned() {
        let config = check_ok(SOURCE);
        let mut tree = Tree::new(&config);
        let body = var(&mut tree, "x");
        let count = num(&mut tree, 0);
        let root = program(&mut tree, body, count);

        // Nothing below `count` can be a `Var`
        let rename = TraversalId(1);
        let mut handlers = Handlers::new();
        handlers.on(rename, id(&config, "Var"), |_, _, visits: &mut usize| {
            *visits += 1;
            Ok(None)
        });

        let mut visits = 0;
        let mut ctx = TravContext::new(&mut tree, &handlers);
        ctx.start(rename, root, &mut visits).unwrap();
        assert_eq!(visits, 1);
        let num = NodeType::Node(id(&config, "Num"));
        assert!(!ctx.reachability.needs_descent(&config, &config[rename], num));
    }

    #[test]
    fn root_replacement() {
        let config = check_ok(SOURCE);
        let mut tree = Tree::new(&config);
        let one = num(&mut tree, 1);
        let two = num(&mut tree, 2);
        let sum = add(&mut tree, one, two);

        let handlers = fold_handlers(&config);
        let mut ctx = TravContext::new(&mut tree, &handlers);
        let new_root = ctx.start(TraversalId(0), sum, &mut ()).unwrap();
        assert_eq!(tree.attr(new_root, "value"), Some(&Value::Int(3)));
    }
}
