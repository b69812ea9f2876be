//! SQL generation: renders a resolved, boolean-converted statement into
//! command text plus positional parameters.

mod command;
mod expression;
pub mod method_calls;
mod statement;

pub use command::{CommandParameter, SqlCommand, SqlCommandBuilder};
pub use expression::SqlGeneratingExpressionVisitor;
pub use method_calls::{MethodCallSqlGenerator, MethodCallSqlGeneratorRegistry};

use crate::config::GenerationConfig;
use crate::error::GenerationResult;
use crate::statement::{SqlStatement, TableStore};
use std::sync::Arc;
use tracing::debug;

pub struct SqlGenerationStage {
    generators: Arc<MethodCallSqlGeneratorRegistry>,
    config: GenerationConfig,
}

impl SqlGenerationStage {
    pub fn new(generators: Arc<MethodCallSqlGeneratorRegistry>, config: GenerationConfig) -> Self {
        Self { generators, config }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Render the top-level statement. Parameters are numbered across the
    /// whole command, nested sub-statements included.
    pub fn generate_text_for_outer_statement(
        &self,
        statement: &SqlStatement,
        tables: &TableStore,
    ) -> GenerationResult<SqlCommand> {
        let mut builder = SqlCommandBuilder::new(&self.config);
        let mut visitor =
            SqlGeneratingExpressionVisitor::new(&mut builder, &self.generators, tables, &self.config);
        visitor.generate_statement(statement)?;

        let command = builder.into_command();
        if self.config.log_generated_sql {
            debug!(
                sql = %command.command_text,
                parameters = command.parameters.len(),
                "generated SQL command"
            );
        } else {
            debug!(parameters = command.parameters.len(), "generated SQL command");
        }
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Expr, SqlColumnExpression};
    use crate::statement::{
        DataInfo, JoinSemantics, ResolvedSimpleTableInfo, SqlTable, TableInfo,
        ResolvedSubStatementTableInfo,
    };
    use crate::types::DataType;
    use serde_json::json;

    fn stage() -> SqlGenerationStage {
        SqlGenerationStage::new(
            MethodCallSqlGeneratorRegistry::default_registry(),
            GenerationConfig::default(),
        )
    }

    fn column(alias: &str, name: &str, ty: DataType) -> Expr {
        Expr::SqlColumn(SqlColumnExpression::definition(ty, alias, name, false))
    }

    fn select(projection: Expr, tables: Vec<crate::statement::TableKey>) -> SqlStatement {
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

    #[test]
    fn test_parameters_are_numbered_across_sub_statements() {
        let mut tables = TableStore::new();
        let cook = tables.add(SqlTable::new(
            TableInfo::ResolvedSimple(ResolvedSimpleTableInfo {
                item_type: DataType::entity("Cook"),
                table_name: "CookTable".into(),
                table_alias: "t1".into(),
            }),
            JoinSemantics::Inner,
        ));
        let mut inner = select(column("t1", "ID", DataType::Int32), vec![cook]);
        inner.top_expression = Some(Expr::int(10));
        let sub = tables.add(SqlTable::new(
            TableInfo::SubStatement(ResolvedSubStatementTableInfo {
                table_alias: "q0".into(),
                statement: Box::new(inner),
            }),
            JoinSemantics::Inner,
        ));
        let mut outer = select(column("q0", "ID", DataType::Int32), vec![sub]);
        outer.top_expression = Some(Expr::int(5));
        outer.where_condition = Some(Expr::equal(
            column("q0", "ID", DataType::Int32),
            Expr::int(7),
        ));

        let command = stage().generate_text_for_outer_statement(&outer, &tables).unwrap();
        assert_eq!(
            command.command_text,
            "SELECT TOP (@1) [q0].[ID] FROM (SELECT TOP (@2) [t1].[ID] FROM [CookTable] AS [t1]) AS [q0] \
             WHERE ([q0].[ID] = @3)"
        );
        let values: Vec<_> = command.parameters.iter().map(|p| p.value.clone()).collect();
        assert_eq!(values, vec![json!(5), json!(10), json!(7)]);
    }

    #[test]
    fn test_tableless_statement() {
        let tables = TableStore::new();
        let statement = select(Expr::named(None, Expr::literal_int(1)), vec![]);
        let command = stage().generate_text_for_outer_statement(&statement, &tables).unwrap();
        assert_eq!(command.command_text, "SELECT 1 AS [value]");
        assert!(command.parameters.is_empty());
    }
}
