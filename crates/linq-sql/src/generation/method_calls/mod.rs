//! Dialect method-call generators.
//!
//! Calls that survive preparation as [`Expr::MethodCall`] are rendered here,
//! by purely syntactic templating over the dialect's function names. A
//! generator validates the call's shape and nothing else.

mod convert;
mod date_time;
mod string;

use super::SqlGeneratingExpressionVisitor;
use crate::error::{GenerationError, GenerationResult};
use crate::expr::{Expr, MethodCallExpression};
use crate::types::MethodSignature;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

/// Emits the SQL text for one kind of method call.
pub trait MethodCallSqlGenerator: Send + Sync {
    fn generate_sql(
        &self,
        call: &MethodCallExpression,
        visitor: &mut SqlGeneratingExpressionVisitor<'_>,
    ) -> GenerationResult<()>;
}

impl<F> MethodCallSqlGenerator for F
where
    F: Fn(&MethodCallExpression, &mut SqlGeneratingExpressionVisitor<'_>) -> GenerationResult<()>
        + Send
        + Sync,
{
    fn generate_sql(
        &self,
        call: &MethodCallExpression,
        visitor: &mut SqlGeneratingExpressionVisitor<'_>,
    ) -> GenerationResult<()> {
        self(call, visitor)
    }
}

pub struct MethodCallSqlGeneratorRegistry {
    generators: HashMap<MethodSignature, Arc<dyn MethodCallSqlGenerator>>,
}

impl Default for MethodCallSqlGeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_REGISTRY: Lazy<Arc<MethodCallSqlGeneratorRegistry>> =
    Lazy::new(|| Arc::new(MethodCallSqlGeneratorRegistry::create_default()));

impl MethodCallSqlGeneratorRegistry {
    pub fn new() -> Self {
        Self {
            generators: HashMap::new(),
        }
    }

    /// Registry with every built-in generator.
    pub fn create_default() -> Self {
        let mut registry = Self::new();
        string::register(&mut registry);
        convert::register(&mut registry);
        date_time::register(&mut registry);
        registry
    }

    pub fn default_registry() -> Arc<Self> {
        Arc::clone(&DEFAULT_REGISTRY)
    }

    pub fn register(
        &mut self,
        signature: MethodSignature,
        generator: impl MethodCallSqlGenerator + 'static,
    ) {
        self.generators.insert(signature, Arc::new(generator));
    }

    pub fn register_all(
        &mut self,
        signatures: impl IntoIterator<Item = MethodSignature>,
        generator: Arc<dyn MethodCallSqlGenerator>,
    ) {
        for signature in signatures {
            self.generators.insert(signature, Arc::clone(&generator));
        }
    }

    pub fn get(&self, signature: &MethodSignature) -> Option<&Arc<dyn MethodCallSqlGenerator>> {
        self.generators.get(signature)
    }

    pub fn contains(&self, signature: &MethodSignature) -> bool {
        self.generators.contains_key(signature)
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}

fn argument_count_error(call: &MethodCallExpression, expected: &'static str) -> GenerationError {
    GenerationError::ArgumentCount {
        method: call.method.full_name(),
        expected,
        actual: call.arguments.len(),
    }
}

fn instance_object(call: &MethodCallExpression) -> GenerationResult<&Expr> {
    call.object.as_deref().ok_or_else(|| {
        GenerationError::UnsupportedExpression(format!(
            "{} requires an instance",
            call.method.full_name()
        ))
    })
}

/// Exactly `N` arguments; `expected` names the count in the error.
fn arguments<'a, const N: usize>(
    call: &'a MethodCallExpression,
    expected: &'static str,
) -> GenerationResult<&'a [Expr; N]> {
    <&[Expr; N]>::try_from(call.arguments.as_slice()).map_err(|_| argument_count_error(call, expected))
}

/// `(x + 1)`: host indexes are zero-based, SQL positions one-based.
fn visit_one_based(visitor: &mut SqlGeneratingExpressionVisitor<'_>, index: &Expr) -> GenerationResult<()> {
    visitor.append("(");
    visitor.visit(index)?;
    visitor.append(" + 1)");
    Ok(())
}
