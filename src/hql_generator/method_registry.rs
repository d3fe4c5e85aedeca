/// Method Translation Registry
///
/// Maps a method signature to the handler that emits its HQL fragment.
///
/// Resolution is a plain lookup keyed by [`MethodSignature`]. Handlers are
/// tagged values ([`MethodGenerator`]) rather than trait objects, except for
/// user-supplied closures carried by [`MethodGenerator::Custom`].
///
/// A registry may be created as a child of another one; lookups fall back to
/// the parent when the child has no entry. [`MethodRegistry::with_defaults`]
/// builds a child of the built-in default set, which is how callers install
/// overrides. Within one registry the last registration for a signature wins.
///
/// Registration is configuration-time only. Once a registry is shared across
/// threads it is read-only, and concurrent lookups are safe.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::query_planner::logical_expr::{Expr, MethodSignature};

use super::errors::HqlGeneratorError;
use super::hql_ast::{HqlBinaryOperator, HqlNode};
use super::method_generators;
use super::tree_builder::HqlTreeBuilder;

pub type HqlGeneratorResult<T> = Result<T, HqlGeneratorError>;

/// User-supplied generator.
pub type CustomGenerator =
    Arc<dyn Fn(&MethodCallContext<'_>, &HqlTreeBuilder) -> HqlGeneratorResult<HqlNode> + Send + Sync>;

/// Whether a handler lets the lowering stage expand a branching operand into
/// one call per branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentExpansion {
    Never,
    /// Only an operand that is itself a conditional/coalesce over collections
    /// or rows (see `Expr::is_expandable_branching`).
    BareBranching,
}

/// What a handler emits.
#[derive(Clone)]
pub enum MethodGenerator {
    /// `operand0 = operand1`
    Equality,
    /// `name(operands...)`
    Function { hql_name: &'static str },
    /// `operand0 like concat(operand1, '%') escape '\'`, `operand1` escaped
    StartsWith,
    /// `operand0 like concat('%', operand1) escape '\'`
    EndsWith,
    /// `operand0 like concat('%', operand1, '%') escape '\'`
    StringContains,
    /// `operand1 in (operand0)`
    CollectionContains,
    /// `exists(operand0)`
    CollectionAny,
    /// `size(operand0)`
    CollectionCount,
    /// `operand0 <op> operand1`
    BinaryOperator(HqlBinaryOperator),
    Custom(CustomGenerator),
}

impl fmt::Debug for MethodGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodGenerator::Equality => write!(f, "Equality"),
            MethodGenerator::Function { hql_name } => write!(f, "Function({})", hql_name),
            MethodGenerator::StartsWith => write!(f, "StartsWith"),
            MethodGenerator::EndsWith => write!(f, "EndsWith"),
            MethodGenerator::StringContains => write!(f, "StringContains"),
            MethodGenerator::CollectionContains => write!(f, "CollectionContains"),
            MethodGenerator::CollectionAny => write!(f, "CollectionAny"),
            MethodGenerator::CollectionCount => write!(f, "CollectionCount"),
            MethodGenerator::BinaryOperator(op) => write!(f, "BinaryOperator({:?})", op),
            MethodGenerator::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// Everything a handler gets to see about one call site.
///
/// `target`/`arguments` are the original expressions; `visited_*` are their
/// lowered forms. Handlers only receive shared references.
#[derive(Debug)]
pub struct MethodCallContext<'a> {
    pub method: &'a MethodSignature,
    pub target: Option<&'a Expr>,
    pub arguments: &'a [Expr],
    pub visited_target: Option<HqlNode>,
    pub visited_arguments: Vec<HqlNode>,
}

impl MethodCallContext<'_> {
    /// Lowered operands: the target (for instance methods) then the arguments.
    pub fn operands(&self) -> Vec<&HqlNode> {
        self.visited_target
            .iter()
            .chain(self.visited_arguments.iter())
            .collect()
    }

    /// Exactly `expected` lowered operands, or `InvalidArguments`.
    pub fn expect_operands(&self, expected: usize) -> HqlGeneratorResult<Vec<&HqlNode>> {
        let operands = self.operands();
        if operands.len() != expected {
            return Err(HqlGeneratorError::InvalidArguments {
                method: self.method.to_string(),
                expected,
                actual: operands.len(),
            });
        }
        Ok(operands)
    }
}

#[derive(Debug, Clone)]
pub struct MethodHandler {
    name: String,
    supported_methods: Vec<MethodSignature>,
    generator: MethodGenerator,
    argument_expansion: ArgumentExpansion,
}

impl MethodHandler {
    pub fn new(name: impl Into<String>, generator: MethodGenerator) -> Self {
        Self {
            name: name.into(),
            supported_methods: vec![],
            generator,
            argument_expansion: ArgumentExpansion::Never,
        }
    }

    /// Handler backed by a closure.
    pub fn custom<F>(name: impl Into<String>, generator: F) -> Self
    where
        F: Fn(&MethodCallContext<'_>, &HqlTreeBuilder) -> HqlGeneratorResult<HqlNode>
            + Send
            + Sync
            + 'static,
    {
        Self::new(name, MethodGenerator::Custom(Arc::new(generator)))
    }

    pub fn supporting(mut self, signature: MethodSignature) -> Self {
        self.supported_methods.push(signature);
        self
    }

    pub fn with_argument_expansion(mut self, expansion: ArgumentExpansion) -> Self {
        self.argument_expansion = expansion;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every signature this handler translates.
    pub fn supported_methods(&self) -> &[MethodSignature] {
        &self.supported_methods
    }

    pub fn generator(&self) -> &MethodGenerator {
        &self.generator
    }

    pub fn argument_expansion(&self) -> ArgumentExpansion {
        self.argument_expansion
    }

    pub fn build_hql(
        &self,
        call: &MethodCallContext<'_>,
        builder: &HqlTreeBuilder,
    ) -> HqlGeneratorResult<HqlNode> {
        method_generators::generate(&self.generator, call, builder)
    }
}

#[derive(Debug, Default, Clone)]
pub struct MethodRegistry {
    handlers: HashMap<MethodSignature, Arc<MethodHandler>>,
    parent: Option<Arc<MethodRegistry>>,
}

impl MethodRegistry {
    /// An empty registry without a parent.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty registry that falls back to `parent` on lookup misses.
    pub fn child_of(parent: Arc<MethodRegistry>) -> Self {
        Self {
            handlers: HashMap::new(),
            parent: Some(parent),
        }
    }

    /// A child of the built-in default registry.
    pub fn with_defaults() -> Self {
        Self::child_of(default_registry())
    }

    /// Register `handler` for `signature`, replacing any earlier entry in
    /// this registry.
    pub fn register(&mut self, signature: MethodSignature, handler: impl Into<Arc<MethodHandler>>) {
        let handler = handler.into();
        if let Some(previous) = self.handlers.insert(signature.clone(), handler.clone()) {
            log::debug!(
                "MethodRegistry: {} now handled by '{}' (was '{}')",
                signature,
                handler.name(),
                previous.name()
            );
        }
    }

    /// Register `handler` under every signature it supports.
    pub fn merge(&mut self, handler: MethodHandler) {
        let handler = Arc::new(handler);
        for signature in handler.supported_methods() {
            self.register(signature.clone(), handler.clone());
        }
    }

    pub fn lookup(&self, signature: &MethodSignature) -> Option<&MethodHandler> {
        match self.handlers.get(signature) {
            Some(handler) => Some(handler.as_ref()),
            None => self.parent.as_ref()?.lookup(signature),
        }
    }

    pub fn contains(&self, signature: &MethodSignature) -> bool {
        self.lookup(signature).is_some()
    }

    /// Every signature resolvable through this registry, parents included.
    pub fn signatures(&self) -> Vec<&MethodSignature> {
        let mut signatures: Vec<&MethodSignature> = self.handlers.keys().collect();
        if let Some(parent) = &self.parent {
            for signature in parent.signatures() {
                if !self.handlers.contains_key(signature) {
                    signatures.push(signature);
                }
            }
        }
        signatures
    }
}

lazy_static::lazy_static! {
    static ref DEFAULT_REGISTRY: Arc<MethodRegistry> =
        Arc::new(method_generators::build_default_registry());
}

/// The shared, immutable built-in registry.
pub fn default_registry() -> Arc<MethodRegistry> {
    DEFAULT_REGISTRY.clone()
}
