//! `String` methods rendered directly: case mapping, `Remove`, `Substring`.

use super::{arguments, instance_object, visit_one_based, MethodCallSqlGeneratorRegistry};
use crate::error::GenerationResult;
use crate::expr::{Expr, MethodCallExpression};
use crate::generation::SqlGeneratingExpressionVisitor;
use crate::types::{DataType, MethodSignature};

fn wrap(
    function: &'static str,
) -> impl Fn(&MethodCallExpression, &mut SqlGeneratingExpressionVisitor<'_>) -> GenerationResult<()> + Send + Sync
{
    move |call, visitor| {
        let object = instance_object(call)?;
        arguments::<0>(call, "0")?;
        visitor.append(function);
        visitor.append("(");
        visitor.visit(object)?;
        visitor.append(")");
        Ok(())
    }
}

/// `LEN(x)` as the "rest of the string" length argument.
fn visit_length(visitor: &mut SqlGeneratingExpressionVisitor<'_>, object: &Expr) -> GenerationResult<()> {
    visitor.append("LEN(");
    visitor.visit(object)?;
    visitor.append(")");
    Ok(())
}

/// `STUFF(x, (start + 1), LEN(x) | count, '')`
fn remove(call: &MethodCallExpression, visitor: &mut SqlGeneratingExpressionVisitor<'_>) -> GenerationResult<()> {
    let object = instance_object(call)?;
    let (start, count) = match call.arguments.len() {
        1 => (&arguments::<1>(call, "1 or 2")?[0], None),
        _ => {
            let [start, count] = arguments::<2>(call, "1 or 2")?;
            (start, Some(count))
        }
    };
    visitor.append("STUFF(");
    visitor.visit(object)?;
    visitor.append(", ");
    visit_one_based(visitor, start)?;
    visitor.append(", ");
    match count {
        Some(count) => visitor.visit(count)?,
        None => visit_length(visitor, object)?,
    }
    visitor.append(", '')");
    Ok(())
}

/// `SUBSTRING(x, (start + 1), LEN(x) | length)`
fn substring(call: &MethodCallExpression, visitor: &mut SqlGeneratingExpressionVisitor<'_>) -> GenerationResult<()> {
    let object = instance_object(call)?;
    let (start, length) = match call.arguments.len() {
        1 => (&arguments::<1>(call, "1 or 2")?[0], None),
        _ => {
            let [start, length] = arguments::<2>(call, "1 or 2")?;
            (start, Some(length))
        }
    };
    visitor.append("SUBSTRING(");
    visitor.visit(object)?;
    visitor.append(", ");
    visit_one_based(visitor, start)?;
    visitor.append(", ");
    match length {
        Some(length) => visitor.visit(length)?,
        None => visit_length(visitor, object)?,
    }
    visitor.append(")");
    Ok(())
}

pub(super) fn register(registry: &mut MethodCallSqlGeneratorRegistry) {
    use DataType::Int32;

    registry.register(MethodSignature::new("String", "ToUpper", []), wrap("UPPER"));
    registry.register(MethodSignature::new("String", "ToLower", []), wrap("LOWER"));
    registry.register(MethodSignature::new("String", "Remove", [Int32]), remove);
    registry.register(MethodSignature::new("String", "Remove", [Int32, Int32]), remove);
    registry.register(MethodSignature::new("String", "Substring", [Int32]), substring);
    registry.register(MethodSignature::new("String", "Substring", [Int32, Int32]), substring);
}
