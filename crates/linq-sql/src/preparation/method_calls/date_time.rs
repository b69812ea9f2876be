//! `DateTime` component properties as `DATEPART`.

use super::{instance_parts, MethodCallTransformer, MethodCallTransformerRegistry};
use crate::error::PreparationResult;
use crate::expr::{Expr, MethodCallExpression, SqlLiteral};
use crate::types::{DataType, MethodSignature};

const DATE_PARTS: &[(&str, &str)] = &[
    ("Year", "year"),
    ("Month", "month"),
    ("Day", "day"),
    ("Hour", "hour"),
    ("Minute", "minute"),
    ("Second", "second"),
    ("Millisecond", "millisecond"),
];

struct DatePart(&'static str);

impl MethodCallTransformer for DatePart {
    fn transform(&self, call: MethodCallExpression) -> PreparationResult<Expr> {
        let (object, []) = instance_parts::<0>(call)?;
        Ok(Expr::function(
            "DATEPART",
            DataType::Int32,
            vec![Expr::SqlLiteral(SqlLiteral::Keyword(self.0.to_string())), object],
        ))
    }
}

pub(super) fn register(registry: &mut MethodCallTransformerRegistry) {
    for (property, part) in DATE_PARTS {
        registry.register(MethodSignature::property("DateTime", *property), DatePart(part));
    }
}
