//! `String.IndexOf` in its 1, 2 and 3 argument forms.
//!
//! `CHARINDEX` is 1-based and returns 0 when nothing is found, so the result
//! is shifted by one. Searching for the empty string returns the start index
//! (or 0) as long as the start index lies within the string.

use super::{instance_parts, MethodCallTransformerRegistry};
use crate::error::PreparationResult;
use crate::expr::{BinaryOp, Expr, MethodCallExpression};
use crate::types::{DataType, MethodSignature};

fn len(expr: Expr) -> Expr {
    Expr::function("LEN", DataType::Int32, vec![expr])
}

fn constant_int(expr: &Expr) -> Option<i64> {
    expr.as_constant().and_then(|c| c.value.as_i64())
}

/// `Some(true)` for a constant empty search string, `None` when only
/// known at execution time.
fn constant_is_empty(value: &Expr) -> Option<bool> {
    value
        .as_constant()
        .and_then(|c| c.value.as_str())
        .map(str::is_empty)
}

fn add(left: Expr, right: Expr) -> Expr {
    match (constant_int(&left), constant_int(&right)) {
        (Some(left), Some(right)) => Expr::int(left + right),
        _ => Expr::add(left, right),
    }
}

fn plus_one(expr: Expr) -> Expr {
    match constant_int(&expr) {
        Some(value) => Expr::int(value + 1),
        None => Expr::add(expr, Expr::literal_int(1)),
    }
}

fn minus_one(expr: Expr) -> Expr {
    Expr::binary(BinaryOp::Subtract, expr, Expr::literal_int(1))
}

fn is_empty(value: &Expr) -> Expr {
    Expr::equal(len(value.clone()), Expr::literal_int(0))
}

fn charindex(arguments: Vec<Expr>) -> Expr {
    Expr::function("CHARINDEX", DataType::Int32, arguments)
}

fn start_within(start: &Expr, object: &Expr) -> Expr {
    Expr::binary(
        BinaryOp::LessThanOrEqual,
        plus_one(start.clone()),
        len(object.clone()),
    )
}

fn index_of(call: MethodCallExpression) -> PreparationResult<Expr> {
    let (object, [value]) = instance_parts::<1>(call)?;
    match constant_is_empty(&value) {
        Some(true) => Ok(Expr::literal_int(0)),
        Some(false) => Ok(minus_one(charindex(vec![value, object]))),
        None => {
            let test = is_empty(&value);
            let found = minus_one(charindex(vec![value, object]));
            Ok(Expr::case(test, Expr::literal_int(0), found)?)
        }
    }
}

/// Shared by the 2 and 3 argument forms; `searched` is the (possibly
/// truncated) string CHARINDEX looks in.
fn index_of_after(object: Expr, searched: Expr, value: Expr, start: Expr) -> PreparationResult<Expr> {
    match constant_is_empty(&value) {
        Some(false) => Ok(minus_one(charindex(vec![value, searched, plus_one(start)]))),
        Some(true) => Ok(Expr::case(
            start_within(&start, &object),
            start,
            Expr::literal_int(-1),
        )?),
        None => {
            let test = Expr::and_also(is_empty(&value), start_within(&start, &object));
            let found = minus_one(charindex(vec![value, searched, plus_one(start.clone())]));
            Ok(Expr::case(test, start, found)?)
        }
    }
}

fn index_of_from(call: MethodCallExpression) -> PreparationResult<Expr> {
    let (object, [value, start]) = instance_parts::<2>(call)?;
    index_of_after(object.clone(), object, value, start)
}

fn index_of_in_range(call: MethodCallExpression) -> PreparationResult<Expr> {
    let (object, [value, start, count]) = instance_parts::<3>(call)?;
    let searched = Expr::function(
        "SUBSTRING",
        DataType::String,
        vec![object.clone(), Expr::literal_int(1), add(start.clone(), count)],
    );
    index_of_after(object, searched, value, start)
}

pub(super) fn register(registry: &mut MethodCallTransformerRegistry) {
    registry.register(
        MethodSignature::new("String", "IndexOf", [DataType::String]),
        index_of,
    );
    registry.register(
        MethodSignature::new("String", "IndexOf", [DataType::String, DataType::Int32]),
        index_of_from,
    );
    registry.register(
        MethodSignature::new(
            "String",
            "IndexOf",
            [DataType::String, DataType::Int32, DataType::Int32],
        ),
        index_of_in_range,
    );
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::error::PreparationError;
    use serde_json::json;

    fn first_name() -> Expr {
        column("FirstName", DataType::String)
    }

    fn index_of_call(arguments: Vec<Expr>) -> (String, Vec<serde_json::Value>) {
        let expr = transform("String", "IndexOf", Some(name_column()), arguments, DataType::Int32).unwrap();
        render(&expr)
    }

    #[test]
    fn test_index_of_constant_value() {
        let (text, params) = index_of_call(vec![Expr::string("o")]);
        assert_eq!(text, "(CHARINDEX(@1, [t0].[Name]) - 1)");
        assert_eq!(params, vec![json!("o")]);
    }

    #[test]
    fn test_index_of_empty_constant_is_zero() {
        let (text, params) = index_of_call(vec![Expr::string("")]);
        assert_eq!(text, "0");
        assert!(params.is_empty());
    }

    #[test]
    fn test_index_of_column_value() {
        let (text, _) = index_of_call(vec![first_name()]);
        assert_eq!(
            text,
            "CASE WHEN (LEN([t0].[FirstName]) = 0) THEN 0 \
             ELSE (CHARINDEX([t0].[FirstName], [t0].[Name]) - 1) END"
        );
    }

    #[test]
    fn test_index_of_with_constant_start() {
        let (text, params) = index_of_call(vec![Expr::string("o"), Expr::int(2)]);
        assert_eq!(text, "(CHARINDEX(@1, [t0].[Name], @2) - 1)");
        assert_eq!(params, vec![json!("o"), json!(3)]);
    }

    #[test]
    fn test_index_of_empty_constant_with_start() {
        let (text, params) = index_of_call(vec![Expr::string(""), Expr::int(2)]);
        assert_eq!(text, "CASE WHEN (@1 <= LEN([t0].[Name])) THEN @2 ELSE -1 END");
        assert_eq!(params, vec![json!(3), json!(2)]);
    }

    #[test]
    fn test_index_of_column_value_and_start() {
        let age = column("Age", DataType::Int32);
        let (text, params) = index_of_call(vec![first_name(), age]);
        assert_eq!(
            text,
            "CASE WHEN ((LEN([t0].[FirstName]) = 0) AND (([t0].[Age] + 1) <= LEN([t0].[Name]))) \
             THEN [t0].[Age] ELSE (CHARINDEX([t0].[FirstName], [t0].[Name], ([t0].[Age] + 1)) - 1) END"
        );
        assert!(params.is_empty());
    }

    #[test]
    fn test_index_of_with_start_and_count() {
        let (text, params) = index_of_call(vec![Expr::string("o"), Expr::int(2), Expr::int(3)]);
        assert_eq!(
            text,
            "(CHARINDEX(@1, SUBSTRING([t0].[Name], 1, @2), @3) - 1)"
        );
        assert_eq!(params, vec![json!("o"), json!(5), json!(3)]);
    }

    #[test]
    fn test_index_of_requires_instance() {
        let call = MethodCallExpression {
            object: None,
            method: crate::expr::MethodInfo::static_method("String", "IndexOf", [DataType::String], DataType::Int32),
            arguments: vec![Expr::string("o")],
        };
        assert!(matches!(
            index_of(call),
            Err(PreparationError::UnsupportedExpression(_))
        ));
    }
}
