//! Groups used after a `GroupBy`.
//!
//! An aggregate over a group moves into the grouping statement and is read
//! back as one of its columns. Any other use of a group's items re-runs the
//! grouped statement's FROM under fresh aliases, restricted to the rows whose
//! key equals the current group's key.

use super::expression::identity_key;
use super::{MappingResolutionStage, ResolvedTables};
use crate::context::CompilationContext;
use crate::error::{ResolutionError, ResolutionResult};
use crate::expr::{Expr, SqlColumnExpression, SqlGroupingSelectExpression};
use crate::statement::{
    JoinInfo, Ordering, SqlStatement, SqlTable, TableInfo, TableKey,
    UnresolvedGroupReferenceTableInfo,
};
use std::collections::HashMap;
use std::convert::Infallible;
use tracing::{debug, trace};

/// Old-to-new table keys and aliases of a re-materialised group source.
#[derive(Debug, Default)]
struct Remapping {
    tables: HashMap<TableKey, TableKey>,
    aliases: HashMap<String, String>,
}

impl Remapping {
    fn expression(&self, expression: Expr) -> Expr {
        match expression {
            Expr::SqlColumn(mut column) => {
                if let Some(alias) = self.aliases.get(&column.owning_table_alias) {
                    column.owning_table_alias = alias.clone();
                }
                Expr::SqlColumn(column)
            }
            Expr::SqlEntity(entity) => Expr::SqlEntity(entity.remap(&self.tables, &self.aliases)),
            Expr::SqlTableReference { table, ty } => Expr::SqlTableReference {
                table: self.tables.get(&table).copied().unwrap_or(table),
                ty,
            },
            Expr::SqlSubStatement(statement) => {
                Expr::SqlSubStatement(Box::new(self.statement(*statement)))
            }
            other => match other.try_map_children(|child| Ok::<_, Infallible>(self.expression(child))) {
                Ok(mapped) => mapped,
                Err(never) => match never {},
            },
        }
    }

    /// Correlated references inside a nested statement; its own tables are
    /// left alone.
    fn statement(&self, mut statement: SqlStatement) -> SqlStatement {
        statement.select_projection = self.expression(statement.select_projection);
        statement.where_condition = statement.where_condition.map(|c| self.expression(c));
        statement.group_by_expression = statement.group_by_expression.map(|k| self.expression(k));
        statement.top_expression = statement.top_expression.map(|t| self.expression(t));
        statement.orderings = statement
            .orderings
            .into_iter()
            .map(|o| Ordering {
                expression: self.expression(o.expression),
                direction: o.direction,
            })
            .collect();
        statement
    }

    fn remap_join_keys(&self, context: &mut CompilationContext) {
        for cloned in self.tables.values() {
            if let TableInfo::Joined(JoinInfo::Resolved(join)) = &mut context.tables.get_mut(*cloned).info {
                join.left_key = self.expression(join.left_key.clone());
                join.right_key = self.expression(join.right_key.clone());
            }
        }
    }
}

/// `inner = outer`, member-wise for records and through the primary key for
/// entities. Nullable keys also match when both sides are NULL.
fn key_equality(inner: Expr, outer: Expr) -> Expr {
    match (inner.into_unnamed(), outer.into_unnamed()) {
        (Expr::New(inner), Expr::New(outer)) => inner
            .members
            .into_iter()
            .zip(outer.members)
            .map(|((_, i), (_, o))| key_equality(i, o))
            .reduce(Expr::and_also)
            .unwrap_or_else(|| Expr::bool(true)),
        (inner, outer) => {
            let inner = identity_key(inner);
            let outer = identity_key(outer);
            let ty = inner.ty();
            if ty.is_nullable() || ty.is_string() {
                Expr::or_else(
                    Expr::equal(inner.clone(), outer.clone()),
                    Expr::and_also(
                        Expr::SqlIsNull(Box::new(inner)),
                        Expr::SqlIsNull(Box::new(outer)),
                    ),
                )
            } else {
                Expr::equal(inner, outer)
            }
        }
    }
}

fn grouping_statement(
    context: &CompilationContext,
    source: TableKey,
) -> Option<(&str, &SqlStatement, &SqlGroupingSelectExpression)> {
    match &context.tables.get(source).info {
        TableInfo::SubStatement(info) => match &info.statement.select_projection {
            Expr::SqlGroupingSelect(grouping) => {
                Some((info.table_alias.as_str(), info.statement.as_ref(), grouping))
            }
            _ => None,
        },
        _ => None,
    }
}

fn not_a_grouping(source: TableKey) -> ResolutionError {
    ResolutionError::UnsupportedExpression(format!(
        "group reference to table {} which is not a grouping statement",
        source.index()
    ))
}

impl MappingResolutionStage {
    /// `COUNT(*)`, `SUM(x)`, ... directly over a group, with nothing else in
    /// the statement, becomes `[q].[aN]` of the grouping statement.
    pub(super) fn try_simplify_group_aggregate(
        &self,
        statement: &SqlStatement,
        context: &mut CompilationContext,
    ) -> ResolutionResult<Option<Expr>> {
        let &[table] = statement.sql_tables.as_slice() else {
            return Ok(None);
        };
        let TableInfo::UnresolvedGroupReference(reference) = &context.tables.get(table).info else {
            return Ok(None);
        };
        let Expr::SqlAggregation(aggregation) = statement.select_projection.unwrap_named() else {
            return Ok(None);
        };
        if statement.where_condition.is_some()
            || statement.group_by_expression.is_some()
            || statement.top_expression.is_some()
            || statement.is_distinct
            || statement.row_number_selector.is_some()
        {
            return Ok(None);
        }

        let source = reference.referenced_group_source;
        let item_type = reference.item_type.clone();
        let aggregation = Expr::SqlAggregation(aggregation.clone());
        let Some(element) = grouping_statement(context, source).map(|(_, _, g)| (*g.element).clone())
        else {
            return Ok(None);
        };

        // Evaluated inside the grouping statement, where the group's items
        // are its element.
        context.tables.get_mut(table).info = TableInfo::ResolvedGroupReference { item_type, element };
        let resolved = self.resolve_expression(aggregation, context)?;

        let TableInfo::SubStatement(grouped) = &mut context.tables.get_mut(source).info else {
            return Err(not_a_grouping(source));
        };
        let Expr::SqlGroupingSelect(grouping) = &mut grouped.statement.select_projection else {
            return Err(not_a_grouping(source));
        };
        let ty = resolved.ty();
        let name = grouping.add_aggregation(resolved);
        trace!(group = %grouped.table_alias, column = %name, "aggregate moved into grouping statement");
        Ok(Some(Expr::SqlColumn(SqlColumnExpression::reference(
            ty,
            grouped.table_alias.clone(),
            name,
            false,
        ))))
    }

    pub(super) fn rematerialize_group(
        &self,
        table: TableKey,
        reference: UnresolvedGroupReferenceTableInfo,
        context: &mut CompilationContext,
    ) -> ResolutionResult<ResolvedTables> {
        let source = reference.referenced_group_source;
        let (source_alias, grouped, grouping) = grouping_statement(context, source)
            .map(|(alias, statement, grouping)| {
                (alias.to_string(), statement.clone(), grouping.clone())
            })
            .ok_or_else(|| not_a_grouping(source))?;

        let mut remapping = Remapping::default();
        let mut tables = Vec::with_capacity(grouped.sql_tables.len());
        for original in &grouped.sql_tables {
            tables.push(self.clone_table(*original, context, &mut remapping)?);
        }
        remapping.remap_join_keys(context);

        let element = remapping.expression(*grouping.element);
        let inner_key = remapping.expression(grouping.key.as_ref().clone());
        let outer_key = self.create_reference(&grouping.key, source, &source_alias);
        let mut condition = key_equality(inner_key, outer_key);
        if let Some(filter) = grouped.where_condition {
            condition = Expr::and_also(remapping.expression(filter), condition);
        }

        debug!(group = %source_alias, tables = tables.len(), "re-materialised group source");
        context.tables.get_mut(table).info = TableInfo::ResolvedGroupReference {
            item_type: reference.item_type,
            element,
        };
        Ok(ResolvedTables {
            tables,
            condition: Some(condition),
        })
    }

    /// Copy a resolved table and its member joins under fresh aliases.
    fn clone_table(
        &self,
        original: TableKey,
        context: &mut CompilationContext,
        remapping: &mut Remapping,
    ) -> ResolutionResult<TableKey> {
        let table = context.tables.get(original).clone();
        let info = match table.info {
            TableInfo::ResolvedSimple(mut info) => {
                let alias = context.unique_identifier(&self.table_alias_prefix);
                remapping.aliases.insert(info.table_alias.clone(), alias.clone());
                info.table_alias = alias;
                TableInfo::ResolvedSimple(info)
            }
            TableInfo::Joined(JoinInfo::Resolved(mut join)) => {
                let alias = context.unique_identifier(&self.table_alias_prefix);
                remapping
                    .aliases
                    .insert(join.foreign_table_info.table_alias.clone(), alias.clone());
                join.foreign_table_info.table_alias = alias;
                TableInfo::Joined(JoinInfo::Resolved(join))
            }
            other => {
                return Err(ResolutionError::UnsupportedExpression(format!(
                    "group source table of {} cannot be re-materialised",
                    other.item_type()
                )))
            }
        };

        let cloned = context.tables.add(SqlTable::new(info, table.join_semantics));
        remapping.tables.insert(original, cloned);
        for (member, joined) in table.joins.iter() {
            let joined = self.clone_table(joined, context, remapping)?;
            context.tables.get_mut(cloned).joins.insert(member, joined);
        }
        Ok(cloned)
    }
}
