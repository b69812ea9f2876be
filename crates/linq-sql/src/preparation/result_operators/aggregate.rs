//! `Count`, `LongCount`, `Sum`, `Min`, `Max`, `Average`.

use super::{flush_if, wrong_operator, ResultOperatorHandler};
use crate::context::CompilationContext;
use crate::error::PreparationResult;
use crate::expr::{AggregationFunction, Expr, SqlAggregationExpression, SqlConvertExpression};
use crate::preparation::{PreparationScope, SqlPreparationStage};
use crate::query_model::ResultOperator;
use crate::statement::{DataInfo, SqlStatementBuilder};
use crate::types::DataType;

/// Aggregating a grouped, distinct or limited statement has to aggregate its
/// result rows, not its source rows.
fn needs_flush(builder: &SqlStatementBuilder) -> bool {
    builder.top_expression.is_some() || builder.is_distinct || builder.group_by_expression.is_some()
}

pub struct CountHandler;

impl ResultOperatorHandler for CountHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        stage: &SqlPreparationStage,
        context: &mut CompilationContext,
        _scope: &PreparationScope<'_>,
    ) -> PreparationResult<()> {
        let (function, ty) = match operator {
            ResultOperator::Count => (AggregationFunction::Count, DataType::Int32),
            ResultOperator::LongCount => (AggregationFunction::CountBig, DataType::Int64),
            other => return Err(wrong_operator(other)),
        };

        flush_if(needs_flush(builder), builder, stage, context)?;
        builder.orderings.clear();
        builder.select_projection = Some(Expr::SqlAggregation(SqlAggregationExpression::count_all(
            function,
            ty.clone(),
        )));
        builder.data_info = Some(DataInfo::scalar(ty));
        Ok(())
    }
}

pub struct AggregateHandler;

impl ResultOperatorHandler for AggregateHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        stage: &SqlPreparationStage,
        context: &mut CompilationContext,
        _scope: &PreparationScope<'_>,
    ) -> PreparationResult<()> {
        let function = match operator {
            ResultOperator::Sum => AggregationFunction::Sum,
            ResultOperator::Min => AggregationFunction::Min,
            ResultOperator::Max => AggregationFunction::Max,
            ResultOperator::Average => AggregationFunction::Average,
            other => return Err(wrong_operator(other)),
        };

        flush_if(needs_flush(builder), builder, stage, context)?;
        // Without TOP the order cannot change which rows are aggregated.
        builder.orderings.clear();

        let argument = builder.projection()?.clone().into_unnamed();
        let (argument, ty) = match function {
            AggregationFunction::Average => average_argument(argument)?,
            _ => {
                let ty = argument.ty();
                (argument, ty)
            }
        };

        builder.select_projection = Some(Expr::SqlAggregation(SqlAggregationExpression::over(
            function,
            ty.clone(),
            argument,
        )));
        builder.data_info = Some(DataInfo::scalar(ty));
        Ok(())
    }
}

/// `AVG` over an integer column is integer division in SQL; convert the
/// argument so the result matches the host's floating point average.
fn average_argument(argument: Expr) -> PreparationResult<(Expr, DataType)> {
    let ty = argument.ty();
    if !matches!(
        ty.underlying(),
        DataType::Int16 | DataType::Int32 | DataType::Int64
    ) {
        return Ok((argument, ty));
    }
    let double = if ty.is_nullable() {
        DataType::nullable(DataType::Double)
    } else {
        DataType::Double
    };
    let converted = SqlConvertExpression::new(double.clone(), argument)?;
    Ok((Expr::SqlConvert(converted), double))
}
