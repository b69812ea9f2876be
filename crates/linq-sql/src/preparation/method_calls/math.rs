//! Static `Math` functions.

use super::{static_parts, MethodCallTransformerRegistry};
use crate::error::PreparationResult;
use crate::expr::{Expr, MethodCallExpression};
use crate::types::{DataType, MethodSignature};
use std::sync::Arc;

/// One-argument function whose result has the argument's type.
fn unary(name: &'static str) -> impl Fn(MethodCallExpression) -> PreparationResult<Expr> + Send + Sync {
    move |call| {
        let [value] = static_parts::<1>(call)?;
        let ty = value.ty();
        Ok(Expr::function(name, ty, vec![value]))
    }
}

fn round(call: MethodCallExpression) -> PreparationResult<Expr> {
    let [value] = static_parts::<1>(call)?;
    let ty = value.ty();
    Ok(Expr::function("ROUND", ty, vec![value, Expr::literal_int(0)]))
}

fn round_to_digits(call: MethodCallExpression) -> PreparationResult<Expr> {
    let [value, digits] = static_parts::<2>(call)?;
    let ty = value.ty();
    Ok(Expr::function("ROUND", ty, vec![value, digits]))
}

fn power(call: MethodCallExpression) -> PreparationResult<Expr> {
    let [value, exponent] = static_parts::<2>(call)?;
    Ok(Expr::function("POWER", DataType::Double, vec![value, exponent]))
}

pub(super) fn register(registry: &mut MethodCallTransformerRegistry) {
    use DataType::{Decimal, Double, Int32, Int64};

    let overloads = |name: &'static str, types: &[DataType]| {
        types
            .iter()
            .map(|ty| MethodSignature::new("Math", name, [ty.clone()]))
            .collect::<Vec<_>>()
    };

    registry.register_all(overloads("Abs", &[Int32, Int64, Double, Decimal]), Arc::new(unary("ABS")));
    registry.register_all(overloads("Floor", &[Double, Decimal]), Arc::new(unary("FLOOR")));
    registry.register_all(overloads("Ceiling", &[Double, Decimal]), Arc::new(unary("CEILING")));
    registry.register_all(overloads("Sqrt", &[Double]), Arc::new(unary("SQRT")));
    registry.register_all(overloads("Round", &[Double, Decimal]), Arc::new(round));
    for ty in [Double, Decimal] {
        registry.register(MethodSignature::new("Math", "Round", [ty, Int32]), round_to_digits);
    }
    registry.register(MethodSignature::new("Math", "Pow", [Double, Double]), power);
}
