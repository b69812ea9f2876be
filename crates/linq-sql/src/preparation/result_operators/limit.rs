//! Row limiting: `Take`, `Skip`, `First`, `Single`.

use super::{flush_if, wrong_operator, ResultOperatorHandler};
use crate::context::CompilationContext;
use crate::error::PreparationResult;
use crate::expr::{BinaryOp, Expr, SqlRowNumberExpression};
use crate::preparation::{PreparationScope, SqlPreparationStage};
use crate::query_model::ResultOperator;
use crate::statement::{DataInfo, JoinSemantics, Ordering, SqlStatementBuilder, KEY_MEMBER};
use crate::types::DataType;

const ROW_NUMBER_MEMBER: &str = "Value";

pub struct TakeHandler;

impl ResultOperatorHandler for TakeHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        stage: &SqlPreparationStage,
        context: &mut CompilationContext,
        scope: &PreparationScope<'_>,
    ) -> PreparationResult<()> {
        let ResultOperator::Take(count) = operator else {
            return Err(wrong_operator(operator));
        };
        let count = stage.prepare_expression(count, context, scope)?;

        // After Skip the rows are numbered; take by row number instead of TOP.
        if let Some(row_number) = builder.row_number_selector.clone() {
            let limit = match builder.current_row_number_offset.clone() {
                Some(offset) => Expr::add(offset, count),
                None => count,
            };
            builder.add_where_condition(Expr::binary(BinaryOp::LessThanOrEqual, row_number, limit));
            return Ok(());
        }

        flush_if(builder.top_expression.is_some(), builder, stage, context)?;
        builder.top_expression = Some(count);
        Ok(())
    }
}

/// `Skip(n)` numbers the rows in an inner statement and filters on the
/// number outside.
pub struct SkipHandler;

impl ResultOperatorHandler for SkipHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        stage: &SqlPreparationStage,
        context: &mut CompilationContext,
        scope: &PreparationScope<'_>,
    ) -> PreparationResult<()> {
        let ResultOperator::Skip(count) = operator else {
            return Err(wrong_operator(operator));
        };
        let count = stage.prepare_expression(count, context, scope)?;
        let projection = builder.projection()?.clone();
        let item_type = projection.ty();

        // With TOP the inner statement still needs its ORDER BY.
        let orderings = if builder.orderings.is_empty() {
            vec![Ordering::asc(Expr::int(1))]
        } else if builder.top_expression.is_some() {
            builder.orderings.clone()
        } else {
            std::mem::take(&mut builder.orderings)
        };

        builder.select_projection = Some(Expr::new_record(
            "RowNumberProjection",
            vec![
                (KEY_MEMBER.to_string(), projection),
                (
                    ROW_NUMBER_MEMBER.to_string(),
                    Expr::SqlRowNumber(SqlRowNumberExpression { orderings }),
                ),
            ],
        ));
        builder.data_info = None;

        let table = stage.flush(builder, context, JoinSemantics::Inner)?;
        let reference = Expr::table_reference(table, context.tables.get(table).info.item_type());
        let row_number = Expr::member(reference.clone(), ROW_NUMBER_MEMBER, DataType::Int64);

        builder.select_projection = Some(Expr::member(reference, KEY_MEMBER, item_type.clone()));
        builder.data_info = Some(DataInfo::sequence(item_type));
        builder.add_where_condition(Expr::binary(
            BinaryOp::GreaterThan,
            row_number.clone(),
            count.clone(),
        ));
        builder.orderings = vec![Ordering::asc(row_number.clone())];
        builder.row_number_selector = Some(row_number);
        builder.current_row_number_offset = Some(count);
        Ok(())
    }
}

/// `First` fetches one row; `Single` over-fetches two so the reader can tell
/// "exactly one" from "more than one".
pub struct SingleRowHandler;

impl ResultOperatorHandler for SingleRowHandler {
    fn handle(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        stage: &SqlPreparationStage,
        context: &mut CompilationContext,
        _scope: &PreparationScope<'_>,
    ) -> PreparationResult<()> {
        let (rows, or_default) = match operator {
            ResultOperator::First { or_default } => (1, *or_default),
            ResultOperator::Single { or_default } => (2, *or_default),
            other => return Err(wrong_operator(other)),
        };

        flush_if(builder.top_expression.is_some(), builder, stage, context)?;
        builder.top_expression = Some(Expr::literal_int(rows));

        let item_type = builder.item_type()?;
        let ty = if or_default && !item_type.is_entity() && !item_type.is_string() {
            DataType::nullable(item_type)
        } else {
            item_type
        };
        builder.data_info = Some(DataInfo::SingleValue {
            ty,
            return_default_when_empty: or_default,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::expr::SqlLiteral;
    use crate::statement::TableInfo;
    use test_case::test_case;

    #[test]
    fn test_take_sets_top() {
        let (statement, _) = prepare(&cooks_with(vec![ResultOperator::Take(Expr::int(5))]));
        assert_eq!(statement.top_expression, Some(Expr::int(5)));
        assert_eq!(statement.sql_tables.len(), 1);
    }

    #[test]
    fn test_second_take_nests_first() {
        let (statement, context) = prepare(&cooks_with(vec![
            ResultOperator::Take(Expr::int(5)),
            ResultOperator::Take(Expr::int(3)),
        ]));
        assert_eq!(statement.top_expression, Some(Expr::int(3)));
        assert_eq!(
            inner_statement(&statement, &context).top_expression,
            Some(Expr::int(5))
        );
    }

    #[test_case(ResultOperator::First { or_default: false }, 1; "first")]
    #[test_case(ResultOperator::Single { or_default: false }, 2; "single")]
    #[test_case(ResultOperator::Single { or_default: true }, 2; "single or default")]
    fn test_single_row_operators_use_literal_top(operator: ResultOperator, rows: i64) {
        let (statement, _) = prepare(&cooks_with(vec![operator]));
        assert_eq!(
            statement.top_expression,
            Some(Expr::SqlLiteral(SqlLiteral::Int(rows)))
        );
        assert!(matches!(statement.data_info, DataInfo::SingleValue { .. }));
    }

    #[test]
    fn test_skip_numbers_rows_in_inner_statement() {
        let (statement, context) = prepare(&cooks_with(vec![ResultOperator::Skip(Expr::int(10))]));

        let inner = inner_statement(&statement, &context);
        let Expr::New(record) = &inner.select_projection else {
            panic!("expected row number record");
        };
        assert!(matches!(record.member("Value"), Some(Expr::SqlRowNumber(_))));
        assert!(record.member(KEY_MEMBER).is_some());

        assert!(statement.where_condition.is_some());
        assert_eq!(statement.orderings.len(), 1);
        assert_eq!(statement.current_row_number_offset, Some(Expr::int(10)));
        assert_eq!(statement.data_info, DataInfo::sequence(DataType::entity("Cook")));
    }

    #[test]
    fn test_take_after_skip_filters_on_row_number() {
        let (statement, context) = prepare(&cooks_with(vec![
            ResultOperator::Skip(Expr::int(10)),
            ResultOperator::Take(Expr::int(5)),
        ]));

        assert!(statement.top_expression.is_none());
        let Some(Expr::Binary(condition)) = &statement.where_condition else {
            panic!("expected combined row number filter");
        };
        assert_eq!(condition.op, BinaryOp::AndAlso);
        let Expr::Binary(upper) = condition.right.as_ref() else {
            panic!("expected upper bound");
        };
        assert_eq!(upper.op, BinaryOp::LessThanOrEqual);
        assert_eq!(*upper.right, Expr::add(Expr::int(10), Expr::int(5)));
        assert!(matches!(
            context.tables.get(statement.sql_tables[0]).info,
            TableInfo::SubStatement(_)
        ));
    }
}
