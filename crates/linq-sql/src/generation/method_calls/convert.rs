//! `Convert.ToX(value)` as `CONVERT(<sql type>, value)`.

use super::{arguments, MethodCallSqlGeneratorRegistry};
use crate::error::{GenerationError, GenerationResult};
use crate::expr::{MethodCallExpression, SqlConvertExpression};
use crate::generation::SqlGeneratingExpressionVisitor;
use crate::types::{DataType, MethodSignature};
use std::sync::Arc;

const TARGETS: &[&str] = &[
    "ToString",
    "ToInt32",
    "ToInt64",
    "ToDouble",
    "ToDecimal",
    "ToBoolean",
    "ToDateTime",
];

const SOURCES: &[DataType] = &[
    DataType::Boolean,
    DataType::Int16,
    DataType::Int32,
    DataType::Int64,
    DataType::Single,
    DataType::Double,
    DataType::Decimal,
    DataType::String,
    DataType::Char,
    DataType::DateTime,
];

/// The target SQL type is taken from the call's return type.
fn convert(call: &MethodCallExpression, visitor: &mut SqlGeneratingExpressionVisitor<'_>) -> GenerationResult<()> {
    let [value] = arguments::<1>(call, "1")?;
    let target = &call.method.return_type;
    let type_name = SqlConvertExpression::sql_type_name(target).ok_or_else(|| {
        GenerationError::UnsupportedExpression(format!("CONVERT to {}", target))
    })?;
    visitor.append("CONVERT(");
    visitor.append(type_name);
    visitor.append(", ");
    visitor.visit(value)?;
    visitor.append(")");
    Ok(())
}

pub(super) fn register(registry: &mut MethodCallSqlGeneratorRegistry) {
    let generator: Arc<dyn super::MethodCallSqlGenerator> = Arc::new(convert);
    for name in TARGETS {
        let signatures = SOURCES
            .iter()
            .map(|source| MethodSignature::new("Convert", *name, [source.clone()]));
        registry.register_all(signatures, Arc::clone(&generator));
    }
}
