//! Result-operator handlers.
//!
//! Each handler rewrites only the builder fields its operator is about. When
//! the operator has to see the rows produced by everything before it (an
//! aggregate after `Take`, `Distinct` after `Take`, ...), it first flushes the
//! builder into a sub-statement.

mod aggregate;
mod limit;
mod membership;
mod shape;

pub use aggregate::{AggregateHandler, CountHandler};
pub use limit::{SingleRowHandler, SkipHandler, TakeHandler};
pub use membership::{AllHandler, AnyHandler, ContainsHandler};
pub use shape::{CastHandler, DefaultIfEmptyHandler, DistinctHandler, GroupByHandler, OfTypeHandler};

use super::{PreparationScope, SqlPreparationStage};
use crate::context::CompilationContext;
use crate::error::{PreparationError, PreparationResult};
use crate::query_model::{ResultOperator, ResultOperatorKind};
use crate::statement::{JoinSemantics, SqlStatementBuilder};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

/// Applies one kind of result operator to the statement being built.
pub trait ResultOperatorHandler: Send + Sync {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        stage: &SqlPreparationStage,
        context: &mut CompilationContext,
        scope: &PreparationScope<'_>,
    ) -> PreparationResult<()>;
}

/// Handlers keyed by operator kind. Kinds without an entry are rejected with
/// [`PreparationError::UnsupportedOperator`].
pub struct ResultOperatorHandlerRegistry {
    handlers: HashMap<ResultOperatorKind, Arc<dyn ResultOperatorHandler>>,
}

impl Default for ResultOperatorHandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_REGISTRY: Lazy<Arc<ResultOperatorHandlerRegistry>> =
    Lazy::new(|| Arc::new(ResultOperatorHandlerRegistry::create_default()));

impl ResultOperatorHandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry with a handler for every supported operator.
    pub fn create_default() -> Self {
        use ResultOperatorKind as Kind;

        let mut registry = Self::new();
        registry.register(Kind::Take, TakeHandler);
        registry.register(Kind::Skip, SkipHandler);
        registry.register_all([Kind::First, Kind::Single], Arc::new(SingleRowHandler));
        registry.register(Kind::Distinct, DistinctHandler);
        registry.register_all([Kind::Count, Kind::LongCount], Arc::new(CountHandler));
        registry.register_all(
            [Kind::Sum, Kind::Min, Kind::Max, Kind::Average],
            Arc::new(AggregateHandler),
        );
        registry.register(Kind::Contains, ContainsHandler);
        registry.register(Kind::Any, AnyHandler);
        registry.register(Kind::All, AllHandler);
        registry.register(Kind::DefaultIfEmpty, DefaultIfEmptyHandler);
        registry.register(Kind::Cast, CastHandler);
        registry.register(Kind::OfType, OfTypeHandler);
        registry.register(Kind::GroupBy, GroupByHandler);
        registry
    }

    pub fn default_registry() -> Arc<Self> {
        Arc::clone(&DEFAULT_REGISTRY)
    }

    pub fn register(&mut self, kind: ResultOperatorKind, handler: impl ResultOperatorHandler + 'static) {
        self.handlers.insert(kind, Arc::new(handler));
    }

    pub fn register_all(
        &mut self,
        kinds: impl IntoIterator<Item = ResultOperatorKind>,
        handler: Arc<dyn ResultOperatorHandler>,
    ) {
        for kind in kinds {
            self.handlers.insert(kind, Arc::clone(&handler));
        }
    }

    pub fn get(&self, kind: ResultOperatorKind) -> Option<&Arc<dyn ResultOperatorHandler>> {
        self.handlers.get(&kind)
    }

    pub fn contains(&self, kind: ResultOperatorKind) -> bool {
        self.handlers.contains_key(&kind)
    }
}

/// Flush into an inner-joined sub-statement when `needs_flush` holds.
fn flush_if(
    needs_flush: bool,
    builder: &mut SqlStatementBuilder,
    stage: &SqlPreparationStage,
    context: &mut CompilationContext,
) -> PreparationResult<()> {
    if needs_flush {
        stage.flush(builder, context, JoinSemantics::Inner)?;
    }
    Ok(())
}

/// A handler was invoked for an operator it was not registered for.
fn wrong_operator(operator: &ResultOperator) -> PreparationError {
    PreparationError::UnsupportedOperator {
        operator: operator.kind().to_string(),
    }
}
