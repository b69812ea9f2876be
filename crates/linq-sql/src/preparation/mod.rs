//! SQL preparation: lowers a [`QueryModel`] into an unresolved [`SqlStatement`].
//!
//! Clauses are visited in declaration order and build up a
//! [`SqlStatementBuilder`]; expressions go through the expression visitor in
//! [`expression`], which applies the method-call transformers; result
//! operators are then applied strictly in source order by the handlers in
//! [`result_operators`].

mod expression;
pub mod method_calls;
pub mod result_operators;

pub use method_calls::{MethodCallTransformer, MethodCallTransformerRegistry};
pub use result_operators::{ResultOperatorHandler, ResultOperatorHandlerRegistry};

use crate::config::SqlBackendConfig;
use crate::context::CompilationContext;
use crate::error::{PreparationError, PreparationResult};
use crate::expr::Expr;
use crate::generation::MethodCallSqlGeneratorRegistry;
use crate::query_model::{BodyClause, FromClause, JoinClause, QueryModel, ResultOperator, Selector, SourceId};
use crate::statement::{
    DataInfo, JoinInfo, JoinSemantics, Ordering, ResolvedSubStatementTableInfo, SqlStatement,
    SqlStatementBuilder, TableInfo, TableKey, UnresolvedCollectionJoinInfo,
    UnresolvedGroupReferenceTableInfo, UnresolvedTableInfo,
};
use crate::types::DataType;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Maps range variables to the expressions standing in for them. Nested
/// sub-queries get a child scope, so correlated references resolve through
/// the parent chain.
#[derive(Debug, Default)]
pub struct PreparationScope<'a> {
    parent: Option<&'a PreparationScope<'a>>,
    mapping: HashMap<SourceId, Expr>,
}

impl<'a> PreparationScope<'a> {
    pub fn root() -> PreparationScope<'static> {
        PreparationScope {
            parent: None,
            mapping: HashMap::new(),
        }
    }

    pub fn child(&'a self) -> PreparationScope<'a> {
        PreparationScope {
            parent: Some(self),
            mapping: HashMap::new(),
        }
    }

    pub fn add_mapping(&mut self, source: SourceId, expression: Expr) {
        self.mapping.insert(source, expression);
    }

    pub fn get(&self, source: SourceId) -> Option<&Expr> {
        self.mapping
            .get(&source)
            .or_else(|| self.parent.and_then(|parent| parent.get(source)))
    }
}

pub struct SqlPreparationStage {
    method_call_transformers: Arc<MethodCallTransformerRegistry>,
    result_operator_handlers: Arc<ResultOperatorHandlerRegistry>,
    sql_generators: Arc<MethodCallSqlGeneratorRegistry>,
    sub_statement_alias_prefix: String,
}

impl SqlPreparationStage {
    pub fn new(
        method_call_transformers: Arc<MethodCallTransformerRegistry>,
        result_operator_handlers: Arc<ResultOperatorHandlerRegistry>,
        sql_generators: Arc<MethodCallSqlGeneratorRegistry>,
        config: &SqlBackendConfig,
    ) -> Self {
        Self {
            method_call_transformers,
            result_operator_handlers,
            sql_generators,
            sub_statement_alias_prefix: config.identifiers.sub_statement_alias_prefix.clone(),
        }
    }

    pub fn prepare_sql_statement(
        &self,
        model: &QueryModel,
        context: &mut CompilationContext,
    ) -> PreparationResult<SqlStatement> {
        let root = PreparationScope::root();
        let statement = self.prepare_query_model(model, context, &root)?;
        debug!(
            tables = context.tables.len(),
            result_operators = model.result_operators.len(),
            "prepared SQL statement"
        );
        Ok(statement)
    }

    pub fn sub_statement_alias_prefix(&self) -> &str {
        &self.sub_statement_alias_prefix
    }

    /// Prepare a (sub-)query model in a child of `parent`.
    pub fn prepare_query_model(
        &self,
        model: &QueryModel,
        context: &mut CompilationContext,
        parent: &PreparationScope<'_>,
    ) -> PreparationResult<SqlStatement> {
        let mut scope = parent.child();
        let mut builder = SqlStatementBuilder::new();

        self.add_from_clause(&model.main_from_clause, &mut builder, context, &mut scope)?;

        for clause in &model.body_clauses {
            match clause {
                BodyClause::AdditionalFrom(from) => {
                    self.add_from_clause(from, &mut builder, context, &mut scope)?;
                }
                BodyClause::Where(predicate) => {
                    let predicate = self.prepare_expression(predicate, context, &scope)?;
                    builder.add_where_condition(predicate);
                }
                BodyClause::OrderBy(orderings) => {
                    let prepared = orderings
                        .iter()
                        .map(|o| {
                            Ok(Ordering {
                                expression: self.prepare_expression(&o.expression, context, &scope)?,
                                direction: o.direction,
                            })
                        })
                        .collect::<PreparationResult<Vec<_>>>()?;
                    // A later orderby clause is the primary sort key.
                    builder.orderings.splice(0..0, prepared);
                }
                BodyClause::Join(join) => {
                    self.add_join_clause(join, &mut builder, context, &mut scope)?;
                }
            }
        }

        let projection = self.prepare_expression(&model.selector, context, &scope)?;
        builder.data_info = Some(DataInfo::sequence(projection.ty()));
        builder.select_projection = Some(projection);

        for operator in &model.result_operators {
            self.apply_result_operator(operator, &mut builder, context, &scope)?;
        }

        builder.get_statement_and_reset_builder()
    }

    fn apply_result_operator(
        &self,
        operator: &ResultOperator,
        builder: &mut SqlStatementBuilder,
        context: &mut CompilationContext,
        scope: &PreparationScope<'_>,
    ) -> PreparationResult<()> {
        let kind = operator.kind();
        let handler = self.result_operator_handlers.get(kind).ok_or_else(|| {
            PreparationError::UnsupportedOperator {
                operator: kind.to_string(),
            }
        })?;
        trace!(operator = %kind, "applying result operator");
        handler.handle(operator, builder, self, context, scope)
    }

    /// Flush the builder into a sub-statement table aliased with the
    /// configured sub-statement prefix.
    pub fn flush(
        &self,
        builder: &mut SqlStatementBuilder,
        context: &mut CompilationContext,
        join_semantics: JoinSemantics,
    ) -> PreparationResult<TableKey> {
        builder.flush_into_sub_statement(context, &self.sub_statement_alias_prefix, join_semantics)
    }

    /// Prepare a selector lambda with its parameter bound to `item`.
    pub fn prepare_selector(
        &self,
        selector: &Selector,
        item: &Expr,
        context: &mut CompilationContext,
        scope: &PreparationScope<'_>,
    ) -> PreparationResult<Expr> {
        let mut lambda_scope = scope.child();
        lambda_scope.add_mapping(selector.parameter, item.clone());
        self.prepare_expression(&selector.body, context, &lambda_scope)
    }

    fn add_from_clause(
        &self,
        clause: &FromClause,
        builder: &mut SqlStatementBuilder,
        context: &mut CompilationContext,
        scope: &mut PreparationScope<'_>,
    ) -> PreparationResult<()> {
        let (table, reference) =
            self.create_table(&clause.from_expression, &clause.item_type, context, scope)?;
        builder.sql_tables.push(table);
        scope.add_mapping(clause.id, reference);
        Ok(())
    }

    /// `join` becomes an additional table plus an equality in WHERE.
    fn add_join_clause(
        &self,
        join: &JoinClause,
        builder: &mut SqlStatementBuilder,
        context: &mut CompilationContext,
        scope: &mut PreparationScope<'_>,
    ) -> PreparationResult<()> {
        let (table, reference) =
            self.create_table(&join.inner_sequence, &join.item_type, context, scope)?;
        builder.sql_tables.push(table);
        scope.add_mapping(join.id, reference);

        let outer_key = self.prepare_expression(&join.outer_key_selector, context, scope)?;
        let inner_key = self.prepare_expression(&join.inner_key_selector, context, scope)?;
        builder.add_where_condition(Expr::equal(outer_key, inner_key));
        Ok(())
    }

    /// Create the table a from-expression iterates and the expression that
    /// stands in for its range variable.
    fn create_table(
        &self,
        from_expression: &Expr,
        item_type: &DataType,
        context: &mut CompilationContext,
        scope: &PreparationScope<'_>,
    ) -> PreparationResult<(TableKey, Expr)> {
        let (info, semantics) = match from_expression {
            Expr::Queryable(queryable_item) => (
                TableInfo::Unresolved(UnresolvedTableInfo {
                    item_type: queryable_item.clone(),
                }),
                JoinSemantics::Inner,
            ),
            Expr::SubQuery(model) => {
                let (model, semantics) = strip_default_if_empty(model);
                let mut statement = self.prepare_query_model(&model, context, scope)?;
                if statement.top_expression.is_none() {
                    statement.orderings.clear();
                }
                let table_alias = context.unique_identifier(&self.sub_statement_alias_prefix);
                (
                    TableInfo::SubStatement(ResolvedSubStatementTableInfo {
                        table_alias,
                        statement: Box::new(statement),
                    }),
                    semantics,
                )
            }
            other => match self.prepare_expression(other, context, scope)? {
                Expr::Member(member) if member.ty.is_sequence() => (
                    TableInfo::Joined(JoinInfo::UnresolvedCollection(
                        UnresolvedCollectionJoinInfo {
                            source_expression: *member.expression,
                            member: member.member,
                            item_type: item_type.clone(),
                        },
                    )),
                    JoinSemantics::Inner,
                ),
                Expr::SqlTableReference { table, ty } if ty.is_grouping() => (
                    TableInfo::UnresolvedGroupReference(UnresolvedGroupReferenceTableInfo {
                        item_type: item_type.clone(),
                        referenced_group_source: table,
                    }),
                    JoinSemantics::Inner,
                ),
                prepared => {
                    return Err(PreparationError::UnsupportedExpression(format!(
                        "{} cannot be used as a query source",
                        prepared.kind_name()
                    )))
                }
            },
        };

        let table_type = info.item_type();
        let key = context.add_table(info, semantics);
        Ok((key, Expr::table_reference(key, table_type)))
    }
}

/// A trailing `DefaultIfEmpty` on a from-clause sub-query turns into left
/// join semantics for the sub-statement table.
fn strip_default_if_empty(model: &QueryModel) -> (QueryModel, JoinSemantics) {
    let mut model = model.clone();
    if matches!(model.result_operators.last(), Some(ResultOperator::DefaultIfEmpty)) {
        model.result_operators.pop();
        (model, JoinSemantics::Left)
    } else {
        (model, JoinSemantics::Inner)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::query_model::FromClause;

    pub fn stage() -> SqlPreparationStage {
        SqlPreparationStage::new(
            MethodCallTransformerRegistry::default_registry(),
            ResultOperatorHandlerRegistry::default_registry(),
            MethodCallSqlGeneratorRegistry::default_registry(),
            &SqlBackendConfig::default(),
        )
    }

    pub fn cook() -> DataType {
        DataType::entity("Cook")
    }

    pub fn cooks_from(id: u32) -> FromClause {
        FromClause::new(SourceId(id), "c", cook(), Expr::queryable(cook()))
    }

    pub fn cook_member(id: u32, member: &str, ty: DataType) -> Expr {
        Expr::member(Expr::source(SourceId(id), cook()), member, ty)
    }
}
