//! Statement and FROM-clause rendering.

use super::SqlGeneratingExpressionVisitor;
use crate::error::{GenerationError, GenerationResult};
use crate::statement::{JoinInfo, JoinSemantics, SqlStatement, SqlTable, TableInfo, TableKey};

impl SqlGeneratingExpressionVisitor<'_> {
    /// `SELECT [DISTINCT ][TOP (n) ]items[ FROM][ WHERE][ GROUP BY][ ORDER BY]`
    pub fn generate_statement(&mut self, statement: &SqlStatement) -> GenerationResult<()> {
        self.append("SELECT ");
        if statement.is_distinct {
            self.append("DISTINCT ");
        }
        if let Some(top) = &statement.top_expression {
            self.append("TOP (");
            self.visit(top)?;
            self.append(") ");
        }
        self.visit_select_projection(&statement.select_projection)?;

        if !statement.sql_tables.is_empty() {
            self.append(" FROM ");
            for (i, table) in statement.sql_tables.iter().enumerate() {
                self.generate_table(*table, i == 0)?;
            }
        }

        if let Some(condition) = &statement.where_condition {
            self.append(" WHERE ");
            self.visit(condition)?;
        }

        if let Some(key) = &statement.group_by_expression {
            self.append(" GROUP BY ");
            self.visit_group_by(key)?;
        }

        if !statement.orderings.is_empty() {
            self.append(" ORDER BY ");
            self.visit_orderings(&statement.orderings)?;
        }
        Ok(())
    }

    /// One FROM entry plus the member joins registered on it.
    fn generate_table(&mut self, key: TableKey, is_first: bool) -> GenerationResult<()> {
        let tables = self.tables;
        let table = tables.get(key);
        let is_sub_statement = matches!(table.info, TableInfo::SubStatement(_));
        let is_left = table.join_semantics == JoinSemantics::Left;

        if is_first {
            if is_left {
                self.append("(SELECT NULL AS [Empty]) AS [Empty] LEFT OUTER JOIN ");
                self.generate_table_source(table)?;
                self.append(" ON (1 = 1)");
            } else {
                self.generate_table_source(table)?;
            }
        } else {
            self.append(match (is_sub_statement, is_left) {
                (true, true) => " OUTER APPLY ",
                (true, false) => " CROSS APPLY ",
                (false, _) => " CROSS JOIN ",
            });
            self.generate_table_source(table)?;
        }

        self.generate_joins(table)
    }

    fn generate_table_source(&mut self, table: &SqlTable) -> GenerationResult<()> {
        match &table.info {
            TableInfo::ResolvedSimple(info) => {
                self.builder().append_identifier(&info.table_name);
                self.append(" AS ");
                self.builder().append_identifier(&info.table_alias);
                Ok(())
            }
            TableInfo::Joined(JoinInfo::Resolved(info)) => {
                self.builder()
                    .append_identifier(&info.foreign_table_info.table_name);
                self.append(" AS ");
                self.builder()
                    .append_identifier(&info.foreign_table_info.table_alias);
                Ok(())
            }
            TableInfo::SubStatement(info) => {
                self.append("(");
                self.generate_statement(&info.statement)?;
                self.append(") AS ");
                self.builder().append_identifier(&info.table_alias);
                Ok(())
            }
            other => Err(GenerationError::UnsupportedExpression(format!(
                "unresolved table of {}",
                other.item_type()
            ))),
        }
    }

    /// Member joins in registration order, each followed by the joins
    /// registered on it.
    fn generate_joins(&mut self, table: &SqlTable) -> GenerationResult<()> {
        let tables = self.tables;
        for joined_key in table.joins.keys() {
            let joined = tables.get(joined_key);
            let TableInfo::Joined(JoinInfo::Resolved(info)) = &joined.info else {
                return Err(GenerationError::UnsupportedExpression(format!(
                    "unresolved join to {}",
                    joined.info.item_type()
                )));
            };
            self.append(" LEFT OUTER JOIN ");
            self.builder()
                .append_identifier(&info.foreign_table_info.table_name);
            self.append(" AS ");
            self.builder()
                .append_identifier(&info.foreign_table_info.table_alias);
            self.append(" ON ");
            self.visit(&info.join_condition())?;
            self.generate_joins(joined)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::expr::{Expr, SqlColumnExpression};
    use crate::generation::{MethodCallSqlGeneratorRegistry, SqlCommandBuilder};
    use crate::statement::{
        DataInfo, Ordering, ResolvedJoinInfo, ResolvedSimpleTableInfo,
        ResolvedSubStatementTableInfo, TableStore,
    };
    use crate::types::DataType;

    fn simple(name: &str, alias: &str) -> TableInfo {
        TableInfo::ResolvedSimple(ResolvedSimpleTableInfo {
            item_type: DataType::entity(name),
            table_name: format!("{}Table", name),
            table_alias: alias.to_string(),
        })
    }

    fn column(alias: &str, name: &str) -> Expr {
        Expr::SqlColumn(SqlColumnExpression::definition(DataType::Int32, alias, name, false))
    }

    fn statement(projection: Expr, tables: Vec<TableKey>) -> SqlStatement {
        SqlStatement {
            data_info: DataInfo::sequence(projection.ty()),
            select_projection: projection,
            sql_tables: tables,
            where_condition: None,
            group_by_expression: None,
            orderings: Vec::new(),
            top_expression: None,
            is_distinct: false,
            row_number_selector: None,
            current_row_number_offset: None,
        }
    }

    fn generate(statement: &SqlStatement, tables: &TableStore) -> String {
        let config = GenerationConfig::default();
        let mut builder = SqlCommandBuilder::new(&config);
        let generators = MethodCallSqlGeneratorRegistry::default_registry();
        let mut visitor = SqlGeneratingExpressionVisitor::new(&mut builder, &generators, tables, &config);
        visitor.generate_statement(statement).unwrap();
        builder.into_command().command_text
    }

    #[test]
    fn test_clause_order() {
        let mut tables = TableStore::new();
        let cook = tables.add(SqlTable::new(simple("Cook", "t0"), JoinSemantics::Inner));
        let mut s = statement(column("t0", "ID"), vec![cook]);
        s.is_distinct = true;
        s.top_expression = Some(Expr::literal_int(2));
        s.where_condition = Some(Expr::equal(column("t0", "Age"), Expr::int(3)));
        s.orderings.push(Ordering::desc(column("t0", "Age")));

        assert_eq!(
            generate(&s, &tables),
            "SELECT DISTINCT TOP (2) [t0].[ID] FROM [CookTable] AS [t0] \
             WHERE ([t0].[Age] = @1) ORDER BY [t0].[Age] DESC"
        );
    }

    #[test]
    fn test_member_joins_follow_their_table() {
        let mut tables = TableStore::new();
        let cook = tables.add(SqlTable::new(simple("Cook", "t0"), JoinSemantics::Inner));
        tables.get_or_add_join(cook, "Kitchen", || {
            SqlTable::new(
                TableInfo::Joined(JoinInfo::Resolved(ResolvedJoinInfo {
                    foreign_table_info: ResolvedSimpleTableInfo {
                        item_type: DataType::entity("Kitchen"),
                        table_name: "KitchenTable".into(),
                        table_alias: "t1".into(),
                    },
                    left_key: column("t0", "KitchenID"),
                    right_key: column("t1", "ID"),
                })),
                JoinSemantics::Left,
            )
        });
        let order = tables.add(SqlTable::new(simple("Order", "t2"), JoinSemantics::Inner));

        assert_eq!(
            generate(&statement(column("t1", "Name"), vec![cook, order]), &tables),
            "SELECT [t1].[Name] FROM [CookTable] AS [t0] \
             LEFT OUTER JOIN [KitchenTable] AS [t1] ON ([t0].[KitchenID] = [t1].[ID]) \
             CROSS JOIN [OrderTable] AS [t2]"
        );
    }

    #[test]
    fn test_left_first_table_is_anchored() {
        let mut tables = TableStore::new();
        let cook = tables.add(SqlTable::new(simple("Cook", "t0"), JoinSemantics::Inner));
        let inner = statement(column("t0", "ID"), vec![cook]);
        let sub = tables.add(SqlTable::new(
            TableInfo::SubStatement(ResolvedSubStatementTableInfo {
                table_alias: "q1".into(),
                statement: Box::new(inner),
            }),
            JoinSemantics::Left,
        ));

        assert_eq!(
            generate(&statement(column("q1", "ID"), vec![sub]), &tables),
            "SELECT [q1].[ID] FROM (SELECT NULL AS [Empty]) AS [Empty] LEFT OUTER JOIN \
             (SELECT [t0].[ID] FROM [CookTable] AS [t0]) AS [q1] ON (1 = 1)"
        );
    }

    #[test]
    fn test_non_first_sub_statements_are_applied() {
        let mut tables = TableStore::new();
        let cook = tables.add(SqlTable::new(simple("Cook", "t0"), JoinSemantics::Inner));
        let kitchen = tables.add(SqlTable::new(simple("Kitchen", "t1"), JoinSemantics::Inner));
        let inner = statement(column("t1", "ID"), vec![kitchen]);
        let cross = tables.add(SqlTable::new(
            TableInfo::SubStatement(ResolvedSubStatementTableInfo {
                table_alias: "q2".into(),
                statement: Box::new(inner.clone()),
            }),
            JoinSemantics::Inner,
        ));
        let outer = tables.add(SqlTable::new(
            TableInfo::SubStatement(ResolvedSubStatementTableInfo {
                table_alias: "q3".into(),
                statement: Box::new(inner),
            }),
            JoinSemantics::Left,
        ));

        let text = generate(&statement(column("t0", "ID"), vec![cook, cross, outer]), &tables);
        assert_eq!(
            text,
            "SELECT [t0].[ID] FROM [CookTable] AS [t0] \
             CROSS APPLY (SELECT [t1].[ID] FROM [KitchenTable] AS [t1]) AS [q2] \
             OUTER APPLY (SELECT [t1].[ID] FROM [KitchenTable] AS [t1]) AS [q3]"
        );
    }

    #[test]
    fn test_unresolved_table_is_rejected() {
        let mut tables = TableStore::new();
        let cook = tables.add(SqlTable::new(
            TableInfo::Unresolved(crate::statement::UnresolvedTableInfo {
                item_type: DataType::entity("Cook"),
            }),
            JoinSemantics::Inner,
        ));
        let config = GenerationConfig::default();
        let mut builder = SqlCommandBuilder::new(&config);
        let generators = MethodCallSqlGeneratorRegistry::default_registry();
        let mut visitor = SqlGeneratingExpressionVisitor::new(&mut builder, &generators, &tables, &config);
        let err = visitor
            .generate_statement(&statement(column("t0", "ID"), vec![cook]))
            .unwrap_err();
        assert!(matches!(err, GenerationError::UnsupportedExpression(_)));
    }
}
