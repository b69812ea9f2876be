//! Mutable staging area for one statement during preparation.

use super::{
    DataInfo, JoinSemantics, Ordering, ResolvedSubStatementTableInfo, SqlStatement, TableInfo,
    TableKey,
};
use crate::context::CompilationContext;
use crate::error::{PreparationError, PreparationResult};
use crate::expr::Expr;
use crate::types::DataType;

/// Name of the member carrying the original projection when a statement is
/// wrapped in a record (ordering propagation, row numbering).
pub const KEY_MEMBER: &str = "Key";

/// Working copy of a [`SqlStatement`].
///
/// Result-operator handlers either mutate the fields in place or call
/// [`flush_into_sub_statement`](Self::flush_into_sub_statement), which turns
/// everything built so far into a nested FROM source and restarts the builder
/// around it.
#[derive(Debug, Clone, Default)]
pub struct SqlStatementBuilder {
    pub data_info: Option<DataInfo>,
    pub select_projection: Option<Expr>,
    pub sql_tables: Vec<TableKey>,
    pub where_condition: Option<Expr>,
    pub group_by_expression: Option<Expr>,
    pub orderings: Vec<Ordering>,
    pub top_expression: Option<Expr>,
    pub is_distinct: bool,
    pub row_number_selector: Option<Expr>,
    pub current_row_number_offset: Option<Expr>,
}

impl SqlStatementBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_statement(statement: SqlStatement) -> Self {
        Self {
            data_info: Some(statement.data_info),
            select_projection: Some(statement.select_projection),
            sql_tables: statement.sql_tables,
            where_condition: statement.where_condition,
            group_by_expression: statement.group_by_expression,
            orderings: statement.orderings,
            top_expression: statement.top_expression,
            is_distinct: statement.is_distinct,
            row_number_selector: statement.row_number_selector,
            current_row_number_offset: statement.current_row_number_offset,
        }
    }

    /// AND `condition` onto the existing WHERE condition.
    pub fn add_where_condition(&mut self, condition: Expr) {
        self.where_condition = Some(match self.where_condition.take() {
            Some(existing) => Expr::and_also(existing, condition),
            None => condition,
        });
    }

    pub fn projection(&self) -> PreparationResult<&Expr> {
        self.select_projection
            .as_ref()
            .ok_or(PreparationError::IncompleteStatement("no select projection"))
    }

    /// Item type of the rows the statement currently produces.
    pub fn item_type(&self) -> PreparationResult<DataType> {
        Ok(self.projection()?.ty())
    }

    pub fn get_sql_statement(&self) -> PreparationResult<SqlStatement> {
        self.clone().into_statement()
    }

    /// Take the statement out, leaving an empty builder behind.
    pub fn get_statement_and_reset_builder(&mut self) -> PreparationResult<SqlStatement> {
        std::mem::take(self).into_statement()
    }

    fn into_statement(self) -> PreparationResult<SqlStatement> {
        let select_projection = self
            .select_projection
            .ok_or(PreparationError::IncompleteStatement("no select projection"))?;
        let data_info = self
            .data_info
            .unwrap_or_else(|| DataInfo::sequence(select_projection.ty()));
        Ok(SqlStatement {
            data_info,
            select_projection,
            sql_tables: self.sql_tables,
            where_condition: self.where_condition,
            group_by_expression: self.group_by_expression,
            orderings: self.orderings,
            top_expression: self.top_expression,
            is_distinct: self.is_distinct,
            row_number_selector: self.row_number_selector,
            current_row_number_offset: self.current_row_number_offset,
        })
    }

    /// Move the current statement into a sub-statement table and make the
    /// builder select from it.
    ///
    /// ORDER BY is only valid in a nested statement together with TOP, so
    /// orderings of an unlimited statement are carried out to the new outer
    /// statement through extra projected members. A DISTINCT statement drops
    /// them instead, since extra columns would change what is distinct.
    pub fn flush_into_sub_statement(
        &mut self,
        context: &mut CompilationContext,
        alias_prefix: &str,
        join_semantics: JoinSemantics,
    ) -> PreparationResult<TableKey> {
        let mut statement = self.get_statement_and_reset_builder()?;
        let item_type = statement.select_projection.ty();

        let mut carried_orderings = Vec::new();
        if statement.top_expression.is_none() && !statement.orderings.is_empty() {
            let orderings = std::mem::take(&mut statement.orderings);
            if !statement.is_distinct {
                let mut members = vec![(KEY_MEMBER.to_string(), statement.select_projection)];
                for (i, ordering) in orderings.into_iter().enumerate() {
                    let name = format!("Ordering{}", i);
                    carried_orderings.push((name.clone(), ordering.expression.ty(), ordering.direction));
                    members.push((name, ordering.expression));
                }
                statement.select_projection = Expr::new_record("OrderedProjection", members);
            }
        }
        let table_type = statement.select_projection.ty();
        statement.data_info = DataInfo::sequence(table_type.clone());

        let table_alias = context.unique_identifier(alias_prefix);
        let key = context.add_table(
            TableInfo::SubStatement(ResolvedSubStatementTableInfo {
                table_alias,
                statement: Box::new(statement),
            }),
            join_semantics,
        );

        let reference = Expr::table_reference(key, table_type);
        self.sql_tables.push(key);
        if carried_orderings.is_empty() {
            self.select_projection = Some(reference);
        } else {
            self.select_projection = Some(Expr::member(reference.clone(), KEY_MEMBER, item_type.clone()));
            self.orderings = carried_orderings
                .into_iter()
                .map(|(name, ty, direction)| Ordering {
                    expression: Expr::member(reference.clone(), name, ty),
                    direction,
                })
                .collect();
        }
        self.data_info = Some(DataInfo::sequence(item_type));
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{OrderingDirection, TableInfo, UnresolvedTableInfo};

    fn builder_over_cooks(context: &mut CompilationContext) -> SqlStatementBuilder {
        let table = context.add_table(
            TableInfo::Unresolved(UnresolvedTableInfo {
                item_type: DataType::entity("Cook"),
            }),
            JoinSemantics::Inner,
        );
        let mut builder = SqlStatementBuilder::new();
        builder.sql_tables.push(table);
        builder.select_projection = Some(Expr::table_reference(table, DataType::entity("Cook")));
        builder
    }

    #[test]
    fn test_add_where_condition_ands_conditions() {
        let mut builder = SqlStatementBuilder::new();
        builder.add_where_condition(Expr::bool(true));
        builder.add_where_condition(Expr::bool(false));
        assert_eq!(
            builder.where_condition,
            Some(Expr::and_also(Expr::bool(true), Expr::bool(false)))
        );
    }

    #[test]
    fn test_statement_requires_projection() {
        let builder = SqlStatementBuilder::new();
        assert!(matches!(
            builder.get_sql_statement(),
            Err(PreparationError::IncompleteStatement(_))
        ));
    }

    #[test]
    fn test_flush_wraps_statement_in_sub_statement_table() {
        let mut context = CompilationContext::new();
        let mut builder = builder_over_cooks(&mut context);
        builder.top_expression = Some(Expr::int(5));
        builder.orderings.push(Ordering::asc(Expr::int(1)));

        let key = builder
            .flush_into_sub_statement(&mut context, "q", JoinSemantics::Inner)
            .unwrap();

        assert_eq!(builder.sql_tables, vec![key]);
        assert!(builder.top_expression.is_none());
        assert!(builder.orderings.is_empty());
        assert_eq!(
            builder.select_projection,
            Some(Expr::table_reference(key, DataType::entity("Cook")))
        );

        let TableInfo::SubStatement(info) = &context.tables.get(key).info else {
            panic!("expected sub-statement table");
        };
        assert_eq!(info.table_alias, "q0");
        assert_eq!(info.statement.top_expression, Some(Expr::int(5)));
        assert_eq!(info.statement.orderings.len(), 1);
    }

    #[test]
    fn test_flush_without_top_moves_orderings_outward() {
        let mut context = CompilationContext::new();
        let mut builder = builder_over_cooks(&mut context);
        builder.orderings.push(Ordering::desc(Expr::string("x")));

        let key = builder
            .flush_into_sub_statement(&mut context, "q", JoinSemantics::Left)
            .unwrap();

        let TableInfo::SubStatement(info) = &context.tables.get(key).info else {
            panic!("expected sub-statement table");
        };
        assert!(info.statement.orderings.is_empty());
        assert_eq!(context.tables.get(key).join_semantics, JoinSemantics::Left);

        assert_eq!(builder.orderings.len(), 1);
        assert_eq!(builder.orderings[0].direction, OrderingDirection::Desc);
        assert_eq!(builder.item_type().unwrap(), DataType::entity("Cook"));
    }

    #[test]
    fn test_flush_of_distinct_statement_drops_orderings() {
        let mut context = CompilationContext::new();
        let mut builder = builder_over_cooks(&mut context);
        builder.is_distinct = true;
        builder.orderings.push(Ordering::asc(Expr::string("x")));

        builder
            .flush_into_sub_statement(&mut context, "q", JoinSemantics::Inner)
            .unwrap();

        assert!(builder.orderings.is_empty());
        assert!(!builder.is_distinct);
    }
}
