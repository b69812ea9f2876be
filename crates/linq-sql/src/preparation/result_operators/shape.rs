//! Operators that change the shape of the rows: `Distinct`,
//! `DefaultIfEmpty`, `Cast`, `OfType`, `GroupBy`.

use super::{flush_if, wrong_operator, ResultOperatorHandler};
use crate::context::CompilationContext;
use crate::error::PreparationResult;
use crate::expr::{Expr, SqlGroupingSelectExpression};
use crate::preparation::{PreparationScope, SqlPreparationStage};
use crate::query_model::ResultOperator;
use crate::statement::{DataInfo, JoinSemantics, SqlStatementBuilder};

/// `DISTINCT` and `TOP` in one statement means "distinct, then limit", so a
/// distinct over already limited rows needs its own statement.
pub struct DistinctHandler;

impl ResultOperatorHandler for DistinctHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        stage: &SqlPreparationStage,
        context: &mut CompilationContext,
        _scope: &PreparationScope<'_>,
    ) -> PreparationResult<()> {
        if !matches!(operator, ResultOperator::Distinct) {
            return Err(wrong_operator(operator));
        }
        flush_if(builder.top_expression.is_some(), builder, stage, context)?;
        builder.is_distinct = true;
        Ok(())
    }
}

/// Left-joins the rows built so far against a one-row anchor, so an empty
/// result still produces a single row of defaults.
pub struct DefaultIfEmptyHandler;

impl ResultOperatorHandler for DefaultIfEmptyHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        stage: &SqlPreparationStage,
        context: &mut CompilationContext,
        _scope: &PreparationScope<'_>,
    ) -> PreparationResult<()> {
        if !matches!(operator, ResultOperator::DefaultIfEmpty) {
            return Err(wrong_operator(operator));
        }
        stage.flush(builder, context, JoinSemantics::Left)?;
        Ok(())
    }
}

pub struct CastHandler;

impl ResultOperatorHandler for CastHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        _stage: &SqlPreparationStage,
        _context: &mut CompilationContext,
        _scope: &PreparationScope<'_>,
    ) -> PreparationResult<()> {
        let ResultOperator::Cast(ty) = operator else {
            return Err(wrong_operator(operator));
        };
        let projection = builder.projection()?.clone();
        builder.select_projection = Some(Expr::convert(projection, ty.clone()));
        builder.data_info = Some(DataInfo::sequence(ty.clone()));
        Ok(())
    }
}

/// Filters with the mapping's type check, then casts.
pub struct OfTypeHandler;

impl ResultOperatorHandler for OfTypeHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        _stage: &SqlPreparationStage,
        _context: &mut CompilationContext,
        _scope: &PreparationScope<'_>,
    ) -> PreparationResult<()> {
        let ResultOperator::OfType(ty) = operator else {
            return Err(wrong_operator(operator));
        };
        let projection = builder.projection()?.clone();
        builder.add_where_condition(Expr::type_is(projection.clone(), ty.clone()));
        builder.select_projection = Some(Expr::convert(projection, ty.clone()));
        builder.data_info = Some(DataInfo::sequence(ty.clone()));
        Ok(())
    }
}

pub struct GroupByHandler;

impl ResultOperatorHandler for GroupByHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        stage: &SqlPreparationStage,
        context: &mut CompilationContext,
        scope: &PreparationScope<'_>,
    ) -> PreparationResult<()> {
        let ResultOperator::GroupBy { key, element } = operator else {
            return Err(wrong_operator(operator));
        };
        let needs_flush = builder.top_expression.is_some()
            || builder.is_distinct
            || builder.group_by_expression.is_some();
        flush_if(needs_flush, builder, stage, context)?;

        let item = builder.projection()?.clone();
        let key = stage.prepare_selector(key, &item, context, scope)?;
        let element = stage.prepare_selector(element, &item, context, scope)?;

        let grouping = SqlGroupingSelectExpression::new(key.clone(), element);
        builder.data_info = Some(DataInfo::sequence(grouping.ty.clone()));
        builder.group_by_expression = Some(key);
        builder.select_projection = Some(Expr::SqlGroupingSelect(grouping));
        builder.orderings.clear();
        Ok(())
    }
}
