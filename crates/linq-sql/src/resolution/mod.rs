//! Mapping resolution: replaces every unresolved table, table reference and
//! member access of a prepared statement with mapped tables, entities and
//! columns, asking a [`MappingResolver`] for the mapping facts.
//!
//! Tables are resolved before expressions, outer statements before the
//! statements nested in them, so a correlated reference always finds its
//! table already resolved.

mod expression;
mod group;
mod sub_statement;

use crate::config::SqlBackendConfig;
use crate::context::CompilationContext;
use crate::error::{ResolutionError, ResolutionResult};
use crate::expr::Expr;
use crate::mapping::MappingResolver;
use crate::statement::{
    Cardinality, JoinInfo, Ordering, ResolvedSubStatementTableInfo, SqlStatement, TableInfo,
    TableKey, UnresolvedJoinInfo,
};
use std::sync::Arc;
use tracing::debug;

/// Tables a FROM entry expands to after resolution, plus any condition the
/// expansion requires in WHERE.
struct ResolvedTables {
    tables: Vec<TableKey>,
    condition: Option<Expr>,
}

impl ResolvedTables {
    fn unchanged(table: TableKey) -> Self {
        Self {
            tables: vec![table],
            condition: None,
        }
    }
}

pub struct MappingResolutionStage {
    resolver: Arc<dyn MappingResolver>,
    table_alias_prefix: String,
    value_column_name: String,
}

impl MappingResolutionStage {
    pub fn new(resolver: Arc<dyn MappingResolver>, config: &SqlBackendConfig) -> Self {
        Self {
            resolver,
            table_alias_prefix: config.identifiers.table_alias_prefix.clone(),
            value_column_name: config.generation.value_column_name.clone(),
        }
    }

    /// Resolve the top-level statement and name its projection.
    pub fn resolve_sql_statement(
        &self,
        statement: SqlStatement,
        context: &mut CompilationContext,
    ) -> ResolutionResult<SqlStatement> {
        let mut statement = self.resolve_statement(statement, context)?;
        statement.select_projection = self.name_projection(statement.select_projection, None);
        debug!(
            tables = statement.sql_tables.len(),
            aliases = context.generator.issued(),
            "resolved SQL statement"
        );
        Ok(statement)
    }

    pub(crate) fn resolve_statement(
        &self,
        mut statement: SqlStatement,
        context: &mut CompilationContext,
    ) -> ResolutionResult<SqlStatement> {
        let mut tables = Vec::with_capacity(statement.sql_tables.len());
        let mut conditions = Vec::new();
        for table in std::mem::take(&mut statement.sql_tables) {
            let resolved = self.resolve_table(table, context)?;
            tables.extend(resolved.tables);
            conditions.extend(resolved.condition);
        }
        statement.sql_tables = tables;

        statement.select_projection = self.resolve_expression(statement.select_projection, context)?;
        statement.where_condition = statement
            .where_condition
            .map(|condition| self.resolve_expression(condition, context))
            .transpose()?;
        for condition in conditions {
            statement.where_condition = Some(match statement.where_condition.take() {
                Some(existing) => Expr::and_also(existing, condition),
                None => condition,
            });
        }
        statement.group_by_expression = statement
            .group_by_expression
            .map(|key| self.resolve_expression(key, context))
            .transpose()?;
        statement.orderings = statement
            .orderings
            .into_iter()
            .map(|ordering| {
                Ok(Ordering {
                    expression: self.resolve_expression(ordering.expression, context)?,
                    direction: ordering.direction,
                })
            })
            .collect::<ResolutionResult<Vec<_>>>()?;
        statement.top_expression = statement
            .top_expression
            .map(|top| self.resolve_expression(top, context))
            .transpose()?;
        statement.row_number_selector = statement
            .row_number_selector
            .map(|selector| self.resolve_expression(selector, context))
            .transpose()?;
        statement.current_row_number_offset = statement
            .current_row_number_offset
            .map(|offset| self.resolve_expression(offset, context))
            .transpose()?;
        Ok(statement)
    }

    fn resolve_table(
        &self,
        table: TableKey,
        context: &mut CompilationContext,
    ) -> ResolutionResult<ResolvedTables> {
        let info = context.tables.get(table).info.clone();
        match info {
            TableInfo::Unresolved(info) => {
                let resolved = self
                    .resolver
                    .resolve_table_info(&info, &mut context.generator)?;
                context.tables.get_mut(table).info = TableInfo::ResolvedSimple(resolved);
                Ok(ResolvedTables::unchanged(table))
            }
            TableInfo::SubStatement(info) => {
                let mut statement = self.resolve_statement(*info.statement, context)?;
                statement.select_projection = self.name_projection(statement.select_projection, None);
                context.tables.get_mut(table).info =
                    TableInfo::SubStatement(ResolvedSubStatementTableInfo {
                        table_alias: info.table_alias,
                        statement: Box::new(statement),
                    });
                Ok(ResolvedTables::unchanged(table))
            }
            TableInfo::Joined(JoinInfo::UnresolvedCollection(join)) => {
                let entity = match self
                    .resolve_expression(join.source_expression, context)?
                    .into_unnamed()
                {
                    Expr::SqlEntity(entity) => entity,
                    other => {
                        return Err(ResolutionError::UnresolvableMember {
                            member: join.member,
                            on_type: other.ty(),
                        })
                    }
                };
                let resolved = self.resolver.resolve_join_info(
                    &UnresolvedJoinInfo {
                        originating_entity: entity,
                        member: join.member,
                        cardinality: Cardinality::Many,
                        item_type: join.item_type,
                    },
                    &mut context.generator,
                )?;
                let condition = resolved.join_condition();
                context.tables.get_mut(table).info = TableInfo::Joined(JoinInfo::Resolved(resolved));
                Ok(ResolvedTables {
                    tables: vec![table],
                    condition: Some(condition),
                })
            }
            TableInfo::Joined(JoinInfo::Unresolved(join)) => Err(ResolutionError::UnsupportedExpression(
                format!("join '{}' used as a query source", join.member),
            )),
            TableInfo::UnresolvedGroupReference(info) => self.rematerialize_group(table, info, context),
            TableInfo::ResolvedSimple(_)
            | TableInfo::Joined(JoinInfo::Resolved(_))
            | TableInfo::ResolvedGroupReference { .. } => Ok(ResolvedTables::unchanged(table)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::error::{MappedItemKind, MappingError};
    use crate::expr::{BinaryOp, SqlColumnExpression};
    use crate::preparation::test_support::{cook, cook_member, cooks_from};
    use crate::query_model::{BodyClause, FromClause, QueryModel, ResultOperator, SourceId};
    use crate::statement::DataInfo;
    use crate::types::DataType;

    fn column(alias: &str, name: &str, ty: DataType) -> Expr {
        Expr::SqlColumn(SqlColumnExpression::definition(ty, alias, name, false))
    }

    #[test]
    fn test_table_reference_becomes_entity() {
        let (statement, context) = resolve(&QueryModel::from(cooks_from(0))).unwrap();

        let Expr::SqlEntity(entity) = &statement.select_projection else {
            panic!("expected entity projection");
        };
        assert_eq!(entity.table_alias, "t0");
        assert_eq!(entity.primary_key_column().column_name, "ID");
        assert_eq!(
            context.tables.get(statement.sql_tables[0]).info.alias(),
            Some("t0")
        );
    }

    #[test]
    fn test_scalar_projection_is_named_value() {
        let model = QueryModel::from(cooks_from(0))
            .with_select(cook_member(0, "FirstName", DataType::String));
        let (statement, _) = resolve(&model).unwrap();

        assert_eq!(
            statement.select_projection,
            Expr::named(
                Some("value".into()),
                column("t0", "FirstName", DataType::String)
            )
        );
    }

    #[test]
    fn test_relation_member_is_joined_once() {
        let kitchen = || cook_member(0, "Kitchen", DataType::entity("Kitchen"));
        let model = QueryModel::from(cooks_from(0))
            .with_where(Expr::equal(
                Expr::member(kitchen(), "Name", DataType::String),
                Expr::string("Main"),
            ))
            .with_select(Expr::member(kitchen(), "RoomNumber", DataType::Int32));
        let (statement, context) = resolve(&model).unwrap();

        let cook_table = context.tables.get(statement.sql_tables[0]);
        assert_eq!(cook_table.joins.len(), 1);
        let joined = cook_table.joins.get("Kitchen").unwrap();
        assert_eq!(context.tables.get(joined).info.alias(), Some("t1"));
        assert_eq!(
            statement.select_projection,
            Expr::named(Some("value".into()), column("t1", "RoomNumber", DataType::Int32))
        );
    }

    #[test]
    fn test_entity_comparison_uses_primary_keys() {
        let model = QueryModel::from(cooks_from(0)).with_where(Expr::equal(
            Expr::source(SourceId(0), cook()),
            Expr::constant(serde_json::json!({ "ID": 5, "Name": "Hugo" }), cook()),
        ));
        let (statement, _) = resolve(&model).unwrap();

        let Some(Expr::Binary(binary)) = &statement.where_condition else {
            panic!("expected comparison");
        };
        let Expr::SqlColumn(left) = binary.left.as_ref() else {
            panic!("expected key column");
        };
        assert!(left.is_primary_key);
        assert_eq!(*binary.right, Expr::constant(5, DataType::Int32));
    }

    #[test]
    fn test_unmapped_member_propagates_mapping_error() {
        let model = QueryModel::from(cooks_from(0))
            .with_select(cook_member(0, "Salary", DataType::Decimal));
        let err = resolve(&model).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::Mapping(MappingError::unmapped(MappedItemKind::Member, "Cook.Salary"))
        );
    }

    #[test]
    fn test_collection_source_joins_through_where() {
        let order = DataType::entity("Order");
        let model = QueryModel::from(cooks_from(0))
            .with_body_clause(BodyClause::AdditionalFrom(FromClause::new(
                SourceId(1),
                "o",
                order.clone(),
                cook_member(0, "Orders", DataType::sequence(order.clone())),
            )))
            .with_select(Expr::member(
                Expr::source(SourceId(1), order),
                "Amount",
                DataType::Decimal,
            ));
        let (statement, context) = resolve(&model).unwrap();

        assert_eq!(statement.sql_tables.len(), 2);
        assert!(matches!(
            context.tables.get(statement.sql_tables[1]).info,
            TableInfo::Joined(JoinInfo::Resolved(_))
        ));
        assert_eq!(
            statement.where_condition,
            Some(Expr::equal(
                Expr::SqlColumn(SqlColumnExpression::definition(DataType::Int32, "t0", "ID", true)),
                column("t1", "CookID", DataType::Int32),
            ))
        );
    }

    #[test]
    fn test_projection_only_sub_statement_is_inlined() {
        let kitchen = DataType::entity("Kitchen");
        let any_kitchen = QueryModel::from(FromClause::new(
            SourceId(1),
            "k",
            kitchen.clone(),
            Expr::queryable(kitchen),
        ))
        .with_result_operator(ResultOperator::Any);
        let model = QueryModel::from(cooks_from(0)).with_where(Expr::sub_query(any_kitchen));
        let (statement, _) = resolve(&model).unwrap();

        let Some(Expr::SqlExists(inner)) = &statement.where_condition else {
            panic!("expected inlined EXISTS, got {:?}", statement.where_condition);
        };
        assert!(matches!(inner.as_ref(), Expr::SqlSubStatement(_)));
    }

    #[test]
    fn test_of_type_resolves_discriminator_check() {
        let chef = DataType::entity("Chef");
        let model = QueryModel::from(cooks_from(0)).with_result_operator(ResultOperator::OfType(chef.clone()));
        let (statement, _) = resolve(&model).unwrap();

        let Some(Expr::Binary(check)) = &statement.where_condition else {
            panic!("expected discriminator comparison");
        };
        assert_eq!(check.op, BinaryOp::Equal);
        assert_eq!(*check.right, Expr::string("Chef"));
        assert_eq!(statement.select_projection.ty(), chef);
        assert!(matches!(statement.select_projection, Expr::SqlEntity(_)));
    }

    #[test]
    fn test_sub_statement_source_is_referenced_by_alias() {
        let inner = QueryModel::from(cooks_from(1)).with_result_operator(ResultOperator::Take(Expr::int(5)));
        let model = QueryModel::from(FromClause::new(SourceId(0), "x", cook(), Expr::sub_query(inner)))
            .with_select(cook_member(0, "Name", DataType::String));
        let (statement, context) = resolve(&model).unwrap();

        assert_eq!(
            statement.select_projection,
            Expr::named(
                Some("value".into()),
                Expr::SqlColumn(SqlColumnExpression::reference(DataType::String, "q0", "Name", false))
            )
        );
        let TableInfo::SubStatement(sub) = &context.tables.get(statement.sql_tables[0]).info else {
            panic!("expected sub-statement table");
        };
        assert!(matches!(sub.statement.select_projection, Expr::SqlEntity(_)));
        assert_eq!(statement.data_info, DataInfo::sequence(DataType::String));
    }
}
