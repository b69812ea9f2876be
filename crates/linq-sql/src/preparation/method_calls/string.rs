//! Remaining `String` members rewritten to SQL functions and operators.

use super::{instance_parts, static_parts, MethodCallTransformerRegistry};
use crate::error::PreparationResult;
use crate::expr::{BinaryOp, Expr, MethodCallExpression};
use crate::types::{DataType, MethodSignature};

fn string_function(name: &str, arguments: Vec<Expr>) -> Expr {
    Expr::function(name, DataType::String, arguments)
}

fn len(expr: Expr) -> Expr {
    Expr::function("LEN", DataType::Int32, vec![expr])
}

fn trim(call: MethodCallExpression) -> PreparationResult<Expr> {
    let (object, []) = instance_parts::<0>(call)?;
    Ok(string_function(
        "LTRIM",
        vec![string_function("RTRIM", vec![object])],
    ))
}

fn trim_start(call: MethodCallExpression) -> PreparationResult<Expr> {
    let (object, []) = instance_parts::<0>(call)?;
    Ok(string_function("LTRIM", vec![object]))
}

fn trim_end(call: MethodCallExpression) -> PreparationResult<Expr> {
    let (object, []) = instance_parts::<0>(call)?;
    Ok(string_function("RTRIM", vec![object]))
}

fn replace(call: MethodCallExpression) -> PreparationResult<Expr> {
    let (object, [old_value, new_value]) = instance_parts::<2>(call)?;
    Ok(string_function("REPLACE", vec![object, old_value, new_value]))
}

/// `STUFF` cannot append at the very end, so that position is a plain
/// concatenation.
fn insert(call: MethodCallExpression) -> PreparationResult<Expr> {
    let (object, [index, value]) = instance_parts::<2>(call)?;
    let test = Expr::equal(len(object.clone()), index.clone());
    let appended = Expr::add(object.clone(), value.clone());
    let stuffed = string_function(
        "STUFF",
        vec![
            object,
            Expr::add(index, Expr::literal_int(1)),
            Expr::literal_int(0),
            value,
        ],
    );
    Ok(Expr::case(test, appended, stuffed)?)
}

fn is_null_or_empty(call: MethodCallExpression) -> PreparationResult<Expr> {
    let [value] = static_parts::<1>(call)?;
    Ok(Expr::or_else(
        Expr::SqlIsNull(Box::new(value.clone())),
        Expr::equal(len(value), Expr::literal_int(0)),
    ))
}

fn concat(call: MethodCallExpression) -> PreparationResult<Expr> {
    let arguments = match call.arguments.len() {
        2 => static_parts::<2>(call)?.to_vec(),
        _ => static_parts::<3>(call)?.to_vec(),
    };
    let mut arguments = arguments.into_iter();
    let first = arguments
        .next()
        .unwrap_or_else(|| Expr::literal_string(""));
    Ok(arguments.fold(first, |acc, next| {
        Expr::binary(BinaryOp::Add, acc, next)
    }))
}

fn equals(call: MethodCallExpression) -> PreparationResult<Expr> {
    let (object, [other]) = instance_parts::<1>(call)?;
    Ok(Expr::equal(object, other))
}

fn length(call: MethodCallExpression) -> PreparationResult<Expr> {
    let (object, []) = instance_parts::<0>(call)?;
    Ok(len(object))
}

pub(super) fn register(registry: &mut MethodCallTransformerRegistry) {
    use DataType::{Int32, String};

    registry.register(MethodSignature::new("String", "Trim", []), trim);
    registry.register(MethodSignature::new("String", "TrimStart", []), trim_start);
    registry.register(MethodSignature::new("String", "TrimEnd", []), trim_end);
    registry.register(MethodSignature::new("String", "Replace", [String, String]), replace);
    registry.register(MethodSignature::new("String", "Insert", [Int32, String]), insert);
    registry.register(
        MethodSignature::new("String", "IsNullOrEmpty", [String]),
        is_null_or_empty,
    );
    registry.register(MethodSignature::new("String", "Concat", [String, String]), concat);
    registry.register(
        MethodSignature::new("String", "Concat", [String, String, String]),
        concat,
    );
    registry.register(MethodSignature::new("String", "Equals", [String]), equals);
    registry.register(MethodSignature::property("String", "Length"), length);
}
