//! Method-call transformers: host-library calls rewritten into SQL
//! expression nodes during preparation.
//!
//! The registry is keyed by [`MethodSignature`] and populated once; after
//! that it is only read, so a single instance is shared by every compilation.

mod date_time;
mod index_of;
mod like;
mod math;
mod string;

pub use like::{escape_like_pattern, LikePosition, LikeTransformer};

use crate::error::{PreparationError, PreparationResult};
use crate::expr::{Expr, MethodCallExpression};
use crate::types::MethodSignature;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

/// Rewrites one kind of method call. Object and arguments have already been
/// prepared.
pub trait MethodCallTransformer: Send + Sync {
    fn transform(&self, call: MethodCallExpression) -> PreparationResult<Expr>;
}

impl<F> MethodCallTransformer for F
where
    F: Fn(MethodCallExpression) -> PreparationResult<Expr> + Send + Sync,
{
    fn transform(&self, call: MethodCallExpression) -> PreparationResult<Expr> {
        self(call)
    }
}

pub struct MethodCallTransformerRegistry {
    transformers: HashMap<MethodSignature, Arc<dyn MethodCallTransformer>>,
}

impl Default for MethodCallTransformerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_REGISTRY: Lazy<Arc<MethodCallTransformerRegistry>> =
    Lazy::new(|| Arc::new(MethodCallTransformerRegistry::create_default('\\')));

impl MethodCallTransformerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            transformers: HashMap::new(),
        }
    }

    /// Registry with every built-in transformer, LIKE patterns escaped with
    /// `like_escape`.
    pub fn create_default(like_escape: char) -> Self {
        let mut registry = Self::new();
        like::register(&mut registry, like_escape);
        index_of::register(&mut registry);
        string::register(&mut registry);
        date_time::register(&mut registry);
        math::register(&mut registry);
        registry
    }

    /// Shared default registry (escape character `\`)
    pub fn default_registry() -> Arc<Self> {
        Arc::clone(&DEFAULT_REGISTRY)
    }

    /// Built-in transformers for `like_escape`; the shared registry when it
    /// is the default escape character.
    pub fn for_like_escape(like_escape: char) -> Arc<Self> {
        if like_escape == '\\' {
            Self::default_registry()
        } else {
            Arc::new(Self::create_default(like_escape))
        }
    }

    pub fn register(
        &mut self,
        signature: MethodSignature,
        transformer: impl MethodCallTransformer + 'static,
    ) {
        self.transformers.insert(signature, Arc::new(transformer));
    }

    /// Register one transformer for several overloads.
    pub fn register_all(
        &mut self,
        signatures: impl IntoIterator<Item = MethodSignature>,
        transformer: Arc<dyn MethodCallTransformer>,
    ) {
        for signature in signatures {
            self.transformers.insert(signature, Arc::clone(&transformer));
        }
    }

    pub fn get(&self, signature: &MethodSignature) -> Option<&Arc<dyn MethodCallTransformer>> {
        self.transformers.get(signature)
    }

    pub fn contains(&self, signature: &MethodSignature) -> bool {
        self.transformers.contains_key(signature)
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Registered signatures, sorted by display name
    pub fn signatures(&self) -> Vec<&MethodSignature> {
        let mut signatures: Vec<_> = self.transformers.keys().collect();
        signatures.sort_by_key(|s| s.to_string());
        signatures
    }
}

fn argument_count_error(call: &MethodCallExpression, expected: &'static str) -> PreparationError {
    PreparationError::ArgumentCount {
        method: call.method.full_name(),
        expected,
        actual: call.arguments.len(),
    }
}

fn count_name(n: usize) -> &'static str {
    match n {
        0 => "0",
        1 => "1",
        2 => "2",
        3 => "3",
        _ => "more",
    }
}

/// Split an instance call into its object and exactly `N` arguments.
pub(crate) fn instance_parts<const N: usize>(
    call: MethodCallExpression,
) -> PreparationResult<(Expr, [Expr; N])> {
    let Some(object) = call.object.as_deref().cloned() else {
        return Err(PreparationError::UnsupportedExpression(format!(
            "{} requires an instance",
            call.method.full_name()
        )));
    };
    let error = argument_count_error(&call, count_name(N));
    let arguments = <[Expr; N]>::try_from(call.arguments).map_err(|_| error)?;
    Ok((object, arguments))
}

/// Exactly `N` arguments of a static call.
pub(crate) fn static_parts<const N: usize>(call: MethodCallExpression) -> PreparationResult<[Expr; N]> {
    let error = argument_count_error(&call, count_name(N));
    <[Expr; N]>::try_from(call.arguments).map_err(|_| error)
}
