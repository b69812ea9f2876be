//! `DateTime.AddX(n)` as `DATEADD(<unit>, n, x)`.

use super::{arguments, instance_object, MethodCallSqlGenerator, MethodCallSqlGeneratorRegistry};
use crate::error::GenerationResult;
use crate::expr::MethodCallExpression;
use crate::generation::SqlGeneratingExpressionVisitor;
use crate::types::{DataType, MethodSignature};

struct DateAdd(&'static str);

impl MethodCallSqlGenerator for DateAdd {
    fn generate_sql(
        &self,
        call: &MethodCallExpression,
        visitor: &mut SqlGeneratingExpressionVisitor<'_>,
    ) -> GenerationResult<()> {
        let object = instance_object(call)?;
        let [amount] = arguments::<1>(call, "1")?;
        visitor.append("DATEADD(");
        visitor.append(self.0);
        visitor.append(", ");
        visitor.visit(amount)?;
        visitor.append(", ");
        visitor.visit(object)?;
        visitor.append(")");
        Ok(())
    }
}

pub(super) fn register(registry: &mut MethodCallSqlGeneratorRegistry) {
    for (method, unit, amount_type) in [
        ("AddYears", "year", DataType::Int32),
        ("AddMonths", "month", DataType::Int32),
        ("AddDays", "day", DataType::Double),
        ("AddHours", "hour", DataType::Double),
        ("AddMinutes", "minute", DataType::Double),
        ("AddSeconds", "second", DataType::Double),
        ("AddMilliseconds", "millisecond", DataType::Double),
    ] {
        registry.register(MethodSignature::new("DateTime", method, [amount_type]), DateAdd(unit));
    }
}
