//! Boolean results over the whole sequence: `Contains`, `Any`, `All`.
//!
//! Each turns the statement built so far into a sub-statement and makes the
//! outer statement a bare projection of a boolean expression over it. The
//! outer statement has no tables, so when the query is nested in another
//! expression it can be inlined as a plain predicate.

use super::{wrong_operator, ResultOperatorHandler};
use crate::context::CompilationContext;
use crate::error::PreparationResult;
use crate::expr::{Expr, SqlInExpression};
use crate::preparation::{PreparationScope, SqlPreparationStage};
use crate::query_model::ResultOperator;
use crate::statement::{DataInfo, SqlStatementBuilder};
use crate::types::DataType;

/// Move the statement out of the builder as a sub-statement expression.
/// ORDER BY without TOP is meaningless (and invalid) in a nested SELECT.
fn take_sub_statement(builder: &mut SqlStatementBuilder) -> PreparationResult<Expr> {
    if builder.top_expression.is_none() {
        builder.orderings.clear();
    }
    let statement = builder.get_statement_and_reset_builder()?;
    Ok(Expr::SqlSubStatement(Box::new(statement)))
}

fn project_boolean(builder: &mut SqlStatementBuilder, projection: Expr) {
    builder.select_projection = Some(projection);
    builder.data_info = Some(DataInfo::scalar(DataType::Boolean));
}

pub struct ContainsHandler;

impl ResultOperatorHandler for ContainsHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        stage: &SqlPreparationStage,
        context: &mut CompilationContext,
        scope: &PreparationScope<'_>,
    ) -> PreparationResult<()> {
        let ResultOperator::Contains(item) = operator else {
            return Err(wrong_operator(operator));
        };
        let item = stage.prepare_expression(item, context, scope)?;
        let sub_statement = take_sub_statement(builder)?;
        project_boolean(
            builder,
            Expr::SqlIn(SqlInExpression {
                left: Box::new(item),
                right: Box::new(sub_statement),
            }),
        );
        Ok(())
    }
}

pub struct AnyHandler;

impl ResultOperatorHandler for AnyHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        _stage: &SqlPreparationStage,
        _context: &mut CompilationContext,
        _scope: &PreparationScope<'_>,
    ) -> PreparationResult<()> {
        if !matches!(operator, ResultOperator::Any) {
            return Err(wrong_operator(operator));
        }
        let sub_statement = take_sub_statement(builder)?;
        project_boolean(builder, Expr::SqlExists(Box::new(sub_statement)));
        Ok(())
    }
}

/// `All(p)` is `NOT EXISTS (... WHERE NOT p)`.
pub struct AllHandler;

impl ResultOperatorHandler for AllHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        stage: &SqlPreparationStage,
        context: &mut CompilationContext,
        scope: &PreparationScope<'_>,
    ) -> PreparationResult<()> {
        let ResultOperator::All(predicate) = operator else {
            return Err(wrong_operator(operator));
        };
        let item = builder.projection()?.clone();
        let predicate = stage.prepare_selector(predicate, &item, context, scope)?;
        builder.add_where_condition(Expr::not(predicate));

        let sub_statement = take_sub_statement(builder)?;
        project_boolean(builder, Expr::not(Expr::SqlExists(Box::new(sub_statement))));
        Ok(())
    }
}
