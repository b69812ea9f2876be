//! Expression rendering.

use super::{MethodCallSqlGeneratorRegistry, SqlCommandBuilder};
use crate::config::GenerationConfig;
use crate::error::{GenerationError, GenerationResult};
use crate::expr::{Expr, SqlColumnExpression, SqlEntityExpression, SqlLiteral, UnaryOp};
use crate::statement::{Ordering, TableStore};
use serde_json::Value;

/// Emits SQL for resolved, boolean-converted expressions and statements.
///
/// Every node kind has exactly one rendering rule. Nodes that should have
/// been eliminated by an earlier stage are reported as
/// [`GenerationError::UnsupportedExpression`].
pub struct SqlGeneratingExpressionVisitor<'a> {
    builder: &'a mut SqlCommandBuilder,
    generators: &'a MethodCallSqlGeneratorRegistry,
    pub(super) tables: &'a TableStore,
    pub(super) config: &'a GenerationConfig,
}

impl<'a> SqlGeneratingExpressionVisitor<'a> {
    pub fn new(
        builder: &'a mut SqlCommandBuilder,
        generators: &'a MethodCallSqlGeneratorRegistry,
        tables: &'a TableStore,
        config: &'a GenerationConfig,
    ) -> Self {
        Self {
            builder,
            generators,
            tables,
            config,
        }
    }

    pub fn builder(&mut self) -> &mut SqlCommandBuilder {
        self.builder
    }

    pub fn append(&mut self, text: &str) {
        self.builder.append(text);
    }

    /// Render `expression` in a value or predicate position.
    pub fn visit(&mut self, expression: &Expr) -> GenerationResult<()> {
        match expression {
            Expr::Constant(constant) => {
                self.visit_constant(&constant.value);
                Ok(())
            }
            Expr::MethodCall(call) => {
                let signature = call.method.signature();
                let generator = self.generators.get(&signature).ok_or_else(|| {
                    GenerationError::UnsupportedMethod {
                        declaring_type: call.method.declaring_type.clone(),
                        name: call.method.name.clone(),
                    }
                })?;
                let generator = std::sync::Arc::clone(generator);
                generator.generate_sql(call, self)
            }
            Expr::Binary(binary) => {
                let operator = binary.op.sql_operator().ok_or_else(|| {
                    GenerationError::UnsupportedExpression(format!("{:?} operator", binary.op))
                })?;
                self.visit_infix(&binary.left, operator, &binary.right)
            }
            Expr::Unary(unary) => match unary.op {
                UnaryOp::Not => {
                    self.append("NOT ");
                    self.visit(&unary.operand)
                }
                UnaryOp::Negate => {
                    self.append("-");
                    self.visit(&unary.operand)
                }
                UnaryOp::Convert => self.visit(&unary.operand),
            },
            Expr::Named(named) => self.visit(&named.expression),
            Expr::SqlSubStatement(statement) => {
                self.append("(");
                self.generate_statement(statement)?;
                self.append(")");
                Ok(())
            }
            Expr::SqlFunction(function) => {
                self.append(&function.name);
                self.append("(");
                self.visit_list(&function.arguments, ", ")?;
                self.append(")");
                Ok(())
            }
            Expr::SqlConvert(convert) => {
                let type_name = crate::expr::SqlConvertExpression::sql_type_name(&convert.ty)
                    .ok_or_else(|| {
                        GenerationError::UnsupportedExpression(format!("CONVERT to {}", convert.ty))
                    })?;
                self.append("CONVERT(");
                self.append(type_name);
                self.append(", ");
                self.visit(&convert.source)?;
                self.append(")");
                Ok(())
            }
            Expr::SqlCase(case) => {
                self.append("CASE WHEN ");
                self.visit(&case.test)?;
                self.append(" THEN ");
                self.visit(&case.then_value)?;
                self.append(" ELSE ");
                self.visit(&case.else_value)?;
                self.append(" END");
                Ok(())
            }
            Expr::SqlBinaryOperator(binary) => {
                self.visit_infix(&binary.left, &binary.operator, &binary.right)
            }
            Expr::SqlIn(sql_in) => {
                self.visit(&sql_in.left)?;
                self.append(" IN ");
                self.visit(&sql_in.right)
            }
            Expr::SqlLike(like) => {
                self.visit(&like.expression)?;
                self.append(" LIKE ");
                self.visit(&like.pattern)?;
                self.append(" ESCAPE ");
                self.visit(&like.escape)
            }
            Expr::SqlIsNull(operand) => {
                self.append("(");
                self.visit(operand)?;
                self.append(" IS NULL)");
                Ok(())
            }
            Expr::SqlIsNotNull(operand) => {
                self.append("(");
                self.visit(operand)?;
                self.append(" IS NOT NULL)");
                Ok(())
            }
            Expr::SqlExists(operand) => {
                self.append("EXISTS");
                self.visit(operand)
            }
            Expr::SqlLiteral(literal) => {
                match literal {
                    SqlLiteral::Int(value) => self.append(&value.to_string()),
                    SqlLiteral::String(value) => self.builder.append_string_literal(value),
                    SqlLiteral::Null(_) => self.append("NULL"),
                    SqlLiteral::Keyword(keyword) => self.append(keyword),
                }
                Ok(())
            }
            Expr::SqlRowNumber(row_number) => {
                self.append("ROW_NUMBER() OVER (ORDER BY ");
                self.visit_orderings(&row_number.orderings)?;
                self.append(")");
                Ok(())
            }
            Expr::SqlAggregation(aggregation) => {
                self.append(aggregation.function.sql_name());
                self.append("(");
                match &aggregation.expression {
                    Some(argument) => self.visit(argument)?,
                    None => self.append("*"),
                }
                self.append(")");
                Ok(())
            }
            Expr::SqlEntity(entity) => self.visit_entity_columns(entity, ","),
            Expr::SqlEntityConstant(constant) => self.visit(&constant.primary_key),
            Expr::SqlColumn(column) => {
                self.visit_column(column);
                Ok(())
            }
            Expr::Queryable(_)
            | Expr::QuerySourceReference { .. }
            | Expr::SubQuery(_)
            | Expr::Member(_)
            | Expr::Conditional(_)
            | Expr::New(_)
            | Expr::TypeIs(_)
            | Expr::SqlTableReference { .. }
            | Expr::SqlGroupingSelect(_)
            | Expr::SqlEntityRefMember(_) => Err(GenerationError::UnsupportedExpression(format!(
                "{} of type {}",
                expression.kind_name(),
                expression.ty()
            ))),
        }
    }

    fn visit_constant(&mut self, value: &Value) {
        match value {
            Value::Null => self.append("NULL"),
            Value::Array(items) if items.is_empty() => self.append("(SELECT NULL WHERE 1 = 0)"),
            Value::Array(items) => {
                self.append("(");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.append(", ");
                    }
                    self.builder.append_parameter(item.clone());
                }
                self.append(")");
            }
            other => self.builder.append_parameter(other.clone()),
        }
    }

    fn visit_infix(&mut self, left: &Expr, operator: &str, right: &Expr) -> GenerationResult<()> {
        self.append("(");
        self.visit(left)?;
        self.append(" ");
        self.append(operator);
        self.append(" ");
        self.visit(right)?;
        self.append(")");
        Ok(())
    }

    pub fn visit_list(&mut self, expressions: &[Expr], separator: &str) -> GenerationResult<()> {
        for (i, expression) in expressions.iter().enumerate() {
            if i > 0 {
                self.append(separator);
            }
            self.visit(expression)?;
        }
        Ok(())
    }

    pub(super) fn visit_column(&mut self, column: &SqlColumnExpression) {
        self.builder.append_identifier(&column.owning_table_alias);
        self.append(".");
        self.builder.append_identifier(&column.column_name);
    }

    fn visit_entity_columns(&mut self, entity: &SqlEntityExpression, separator: &str) -> GenerationResult<()> {
        for (i, column) in entity.columns().iter().enumerate() {
            if i > 0 {
                self.append(separator);
            }
            self.visit_column(column);
        }
        Ok(())
    }

    /// `ORDER BY` items. Constants are not allowed as sort keys, so they are
    /// wrapped in a sub-select; entities sort by each of their columns.
    pub(super) fn visit_orderings(&mut self, orderings: &[Ordering]) -> GenerationResult<()> {
        let mut first = true;
        for ordering in orderings {
            let keyword = ordering.direction.sql_keyword();
            let columns: Vec<&SqlColumnExpression> = match ordering.expression.unwrap_named() {
                Expr::SqlEntity(entity) => entity.columns().iter().collect(),
                _ => Vec::new(),
            };
            if !columns.is_empty() {
                for column in columns {
                    if !first {
                        self.append(", ");
                    }
                    first = false;
                    self.visit_column(column);
                    self.append(" ");
                    self.append(keyword);
                }
                continue;
            }

            if !first {
                self.append(", ");
            }
            first = false;
            match ordering.expression.unwrap_named() {
                Expr::Constant(_) | Expr::SqlLiteral(_) => {
                    self.append("(SELECT ");
                    self.visit(&ordering.expression)?;
                    self.append(")");
                }
                other => self.visit(other)?,
            }
            self.append(" ");
            self.append(keyword);
        }
        Ok(())
    }

    /// Render a select list item, naming it the way the reader of the
    /// result expects.
    pub fn visit_select_projection(&mut self, expression: &Expr) -> GenerationResult<()> {
        match expression {
            Expr::Named(named) => match named.expression.as_ref() {
                Expr::SqlEntity(entity) => {
                    let entity = entity.clone().with_name(named.name.clone());
                    self.visit_select_projection(&Expr::SqlEntity(entity))
                }
                Expr::New(_) | Expr::SqlGroupingSelect(_) | Expr::Named(_) => {
                    self.visit_select_projection(&named.expression)
                }
                inner => {
                    self.visit(inner)?;
                    self.append(" AS ");
                    let name = named
                        .name
                        .as_deref()
                        .unwrap_or(self.config.value_column_name.as_str());
                    self.builder.append_identifier(name);
                    Ok(())
                }
            },
            Expr::SqlEntity(entity) if entity.name.is_some() => {
                for (i, column) in entity.columns().iter().enumerate() {
                    if i > 0 {
                        self.append(",");
                    }
                    self.visit_column(column);
                    self.append(" AS ");
                    self.builder
                        .append_identifier(&entity.projected_column_name(column));
                }
                Ok(())
            }
            Expr::New(record) => {
                for (i, (_, member)) in record.members.iter().enumerate() {
                    if i > 0 {
                        self.append(",");
                    }
                    self.visit_select_projection(member)?;
                }
                Ok(())
            }
            Expr::SqlGroupingSelect(grouping) => {
                self.visit_select_projection(&grouping.key)?;
                for aggregation in &grouping.aggregations {
                    self.append(",");
                    self.visit_select_projection(aggregation)?;
                }
                Ok(())
            }
            other => self.visit(other),
        }
    }

    /// `GROUP BY` items; entity and record keys group by each of their
    /// columns.
    pub(super) fn visit_group_by(&mut self, key: &Expr) -> GenerationResult<()> {
        match key {
            Expr::Named(named) => self.visit_group_by(&named.expression),
            Expr::SqlEntity(entity) => self.visit_entity_columns(entity, ", "),
            Expr::New(record) => {
                for (i, (_, member)) in record.members.iter().enumerate() {
                    if i > 0 {
                        self.append(", ");
                    }
                    self.visit_group_by(member)?;
                }
                Ok(())
            }
            other => self.visit(other),
        }
    }
}
