//! Boolean semantics: SQL separates predicates (`WHERE`, `ON`, `CASE WHEN`)
//! from values (select items, arguments). Host expressions do not, so every
//! boolean-typed node is converted to the form its position needs.
//!
//! Conversion is idempotent and allocation-free when nothing changes: an
//! already converted tree comes back as `Cow::Borrowed` of the same node.

use crate::error::BooleanSemanticsError;
use crate::expr::{BinaryOp, Expr, SqlCaseExpression, UnaryOp};
use crate::statement::{Ordering, SqlStatement, TableInfo, TableKey, TableStore};
use std::borrow::Cow;

pub type BooleanSemanticsResult<T> = Result<T, BooleanSemanticsError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanSemantics {
    Predicate,
    Value,
}

/// What a boolean-typed node is in SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BooleanKind {
    Predicate,
    Value,
}

fn boolean_kind(expression: &Expr) -> BooleanSemanticsResult<BooleanKind> {
    match expression {
        Expr::Binary(binary) if binary.op.is_comparison() || binary.op.is_logical() => {
            Ok(BooleanKind::Predicate)
        }
        Expr::Unary(unary) if unary.op == UnaryOp::Not => Ok(BooleanKind::Predicate),
        Expr::SqlIn(_)
        | Expr::SqlLike(_)
        | Expr::SqlIsNull(_)
        | Expr::SqlIsNotNull(_)
        | Expr::SqlExists(_) => Ok(BooleanKind::Predicate),
        Expr::Constant(_)
        | Expr::SqlColumn(_)
        | Expr::Binary(_)
        | Expr::Unary(_)
        | Expr::MethodCall(_)
        | Expr::SqlFunction(_)
        | Expr::SqlConvert(_)
        | Expr::SqlCase(_)
        | Expr::SqlBinaryOperator(_)
        | Expr::SqlLiteral(_)
        | Expr::SqlAggregation(_)
        | Expr::SqlSubStatement(_) => Ok(BooleanKind::Value),
        other => Err(BooleanSemanticsError::UnsupportedBooleanExpression {
            expression_type: other.ty(),
            node: other.kind_name(),
        }),
    }
}

fn one() -> Expr {
    Expr::literal_int(1)
}

fn zero() -> Expr {
    Expr::literal_int(0)
}

/// Convert `expression` (and everything below it) for a position requiring
/// `semantics`.
pub fn convert_boolean_expressions(
    expression: &Expr,
    semantics: BooleanSemantics,
) -> BooleanSemanticsResult<Cow<'_, Expr>> {
    if let Expr::Named(named) = expression {
        let inner = convert_boolean_expressions(&named.expression, semantics)?;
        return Ok(match inner {
            Cow::Borrowed(_) => Cow::Borrowed(expression),
            Cow::Owned(inner) => Cow::Owned(Expr::named(named.name.clone(), inner)),
        });
    }

    let converted = convert_children(expression)?;
    if !expression.ty().is_boolean() {
        return Ok(converted);
    }
    // A boolean CASE whose branches became 0/1 values is now an integer.
    if !converted.ty().is_boolean() {
        return Ok(match semantics {
            BooleanSemantics::Value => converted,
            BooleanSemantics::Predicate => Cow::Owned(Expr::equal(converted.into_owned(), one())),
        });
    }

    let kind = match converted.as_ref() {
        Expr::Constant(constant) if !constant.value.is_null() => {
            let value = constant.value.as_bool().unwrap_or(false);
            return Ok(Cow::Owned(match semantics {
                BooleanSemantics::Value => Expr::literal_int(i64::from(value)),
                BooleanSemantics::Predicate if value => Expr::equal(one(), one()),
                BooleanSemantics::Predicate => Expr::not_equal(one(), one()),
            }));
        }
        Expr::SqlColumn(column) => {
            let value = Expr::SqlColumn(column.clone().with_type(column.ty.as_sql_value_type()));
            return Ok(Cow::Owned(match semantics {
                BooleanSemantics::Value => value,
                BooleanSemantics::Predicate => Expr::equal(value, one()),
            }));
        }
        node => boolean_kind(node)?,
    };

    match (kind, semantics) {
        (BooleanKind::Predicate, BooleanSemantics::Predicate)
        | (BooleanKind::Value, BooleanSemantics::Value) => Ok(converted),
        (BooleanKind::Predicate, BooleanSemantics::Value) => Ok(Cow::Owned(Expr::case(
            converted.into_owned(),
            one(),
            zero(),
        )?)),
        (BooleanKind::Value, BooleanSemantics::Predicate) => {
            Ok(Cow::Owned(Expr::equal(converted.into_owned(), one())))
        }
    }
}

/// Children of logical operators and `CASE` tests are predicates; every
/// other child is a value.
fn convert_children(expression: &Expr) -> BooleanSemanticsResult<Cow<'_, Expr>> {
    match expression {
        Expr::Binary(binary) if binary.op == BinaryOp::AndAlso || binary.op == BinaryOp::OrElse => {
            expression.try_map_children_cow(|child| {
                convert_boolean_expressions(child, BooleanSemantics::Predicate)
            })
        }
        Expr::Unary(unary) if unary.op == UnaryOp::Not && unary.operand.ty().is_boolean() => {
            expression.try_map_children_cow(|child| {
                convert_boolean_expressions(child, BooleanSemantics::Predicate)
            })
        }
        Expr::SqlCase(case) => {
            let test = convert_boolean_expressions(&case.test, BooleanSemantics::Predicate)?;
            let then_value = convert_boolean_expressions(&case.then_value, BooleanSemantics::Value)?;
            let else_value = convert_boolean_expressions(&case.else_value, BooleanSemantics::Value)?;
            if [&test, &then_value, &else_value]
                .iter()
                .all(|c| matches!(c, Cow::Borrowed(_)))
            {
                return Ok(Cow::Borrowed(expression));
            }
            // Rebuilt so the type follows converted branches.
            Ok(Cow::Owned(Expr::SqlCase(SqlCaseExpression::new(
                test.into_owned(),
                then_value.into_owned(),
                else_value.into_owned(),
            )?)))
        }
        Expr::SqlSubStatement(statement) => Ok(match convert_statement(statement)? {
            Cow::Borrowed(_) => Cow::Borrowed(expression),
            Cow::Owned(statement) => Cow::Owned(Expr::SqlSubStatement(Box::new(statement))),
        }),
        _ => expression.try_map_children_cow(|child| {
            convert_boolean_expressions(child, BooleanSemantics::Value)
        }),
    }
}

fn convert_optional(
    expression: Option<&Expr>,
    semantics: BooleanSemantics,
) -> BooleanSemanticsResult<Option<Cow<'_, Expr>>> {
    expression
        .map(|e| convert_boolean_expressions(e, semantics))
        .transpose()
}

fn is_owned<T: Clone>(value: &Option<Cow<'_, T>>) -> bool {
    matches!(value, Some(Cow::Owned(_)))
}

/// Convert every clause of `statement`: the projection, orderings and TOP
/// as values, WHERE as a predicate.
pub fn convert_statement(statement: &SqlStatement) -> BooleanSemanticsResult<Cow<'_, SqlStatement>> {
    let projection = convert_boolean_expressions(&statement.select_projection, BooleanSemantics::Value)?;
    let where_condition =
        convert_optional(statement.where_condition.as_ref(), BooleanSemantics::Predicate)?;
    let group_by = convert_optional(statement.group_by_expression.as_ref(), BooleanSemantics::Value)?;
    let top = convert_optional(statement.top_expression.as_ref(), BooleanSemantics::Value)?;
    let row_number = convert_optional(statement.row_number_selector.as_ref(), BooleanSemantics::Value)?;
    let offset = convert_optional(
        statement.current_row_number_offset.as_ref(),
        BooleanSemantics::Value,
    )?;
    let orderings = statement
        .orderings
        .iter()
        .map(|o| convert_boolean_expressions(&o.expression, BooleanSemantics::Value))
        .collect::<BooleanSemanticsResult<Vec<_>>>()?;

    let changed = matches!(projection, Cow::Owned(_))
        || is_owned(&where_condition)
        || is_owned(&group_by)
        || is_owned(&top)
        || is_owned(&row_number)
        || is_owned(&offset)
        || orderings.iter().any(|o| matches!(o, Cow::Owned(_)));
    if !changed {
        return Ok(Cow::Borrowed(statement));
    }

    Ok(Cow::Owned(SqlStatement {
        data_info: statement.data_info.clone(),
        select_projection: projection.into_owned(),
        sql_tables: statement.sql_tables.clone(),
        where_condition: where_condition.map(Cow::into_owned),
        group_by_expression: group_by.map(Cow::into_owned),
        orderings: orderings
            .into_iter()
            .zip(&statement.orderings)
            .map(|(expression, original)| Ordering {
                expression: expression.into_owned(),
                direction: original.direction,
            })
            .collect(),
        top_expression: top.map(Cow::into_owned),
        is_distinct: statement.is_distinct,
        row_number_selector: row_number.map(Cow::into_owned),
        current_row_number_offset: offset.map(Cow::into_owned),
    }))
}

/// Convert the statement of every sub-statement table in `tables`.
pub fn convert_tables(tables: &mut TableStore) -> BooleanSemanticsResult<()> {
    for index in 0..tables.len() {
        let key = TableKey::new(index);
        if let TableInfo::SubStatement(info) = &tables.get(key).info {
            if let Cow::Owned(converted) = convert_statement(&info.statement)? {
                if let TableInfo::SubStatement(info) = &mut tables.get_mut(key).info {
                    info.statement = Box::new(converted);
                }
            }
        }
    }
    Ok(())
}
