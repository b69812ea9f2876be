//! SQL-specific and mapping expression nodes.

use super::Expr;
use crate::error::ExpressionError;
use crate::statement::{Ordering, TableKey};
use crate::types::DataType;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct SqlFunctionExpression {
    pub ty: DataType,
    pub name: String,
    pub arguments: Vec<Expr>,
}

/// `CONVERT(<sql type>, source)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlConvertExpression {
    pub ty: DataType,
    pub source: Box<Expr>,
}

impl SqlConvertExpression {
    pub fn new(ty: DataType, source: Expr) -> Result<Self, ExpressionError> {
        if Self::sql_type_name(&ty).is_none() {
            return Err(ExpressionError::UnsupportedConvertType { target: ty });
        }
        Ok(Self {
            ty,
            source: Box::new(source),
        })
    }

    /// Fixed host type to SQL type name table.
    pub fn sql_type_name(ty: &DataType) -> Option<&'static str> {
        Some(match ty.underlying() {
            DataType::Boolean => "BIT",
            DataType::Int16 => "SMALLINT",
            DataType::Int32 => "INT",
            DataType::Int64 => "BIGINT",
            DataType::Single => "REAL",
            DataType::Double => "FLOAT",
            DataType::Decimal => "DECIMAL",
            DataType::String => "NVARCHAR(MAX)",
            DataType::Char => "NVARCHAR(1)",
            DataType::DateTime => "DATETIME",
            DataType::Guid => "UNIQUEIDENTIFIER",
            _ => return None,
        })
    }
}

/// `CASE WHEN test THEN then_value ELSE else_value END`.
///
/// The constructor enforces a boolean test and matching branch types; a
/// nullable and a non-nullable branch of the same underlying type combine to
/// the nullable type.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlCaseExpression {
    pub ty: DataType,
    pub test: Box<Expr>,
    pub then_value: Box<Expr>,
    pub else_value: Box<Expr>,
}

impl SqlCaseExpression {
    pub fn new(test: Expr, then_value: Expr, else_value: Expr) -> Result<Self, ExpressionError> {
        let test_type = test.ty();
        if !test_type.is_boolean() {
            return Err(ExpressionError::CaseTestNotBoolean { actual: test_type });
        }

        let then_type = then_value.ty();
        let else_type = else_value.ty();
        let ty = if then_type == else_type {
            then_type
        } else if then_type.underlying() == else_type.underlying() {
            DataType::nullable(then_type.underlying().clone())
        } else {
            return Err(ExpressionError::CaseBranchTypeMismatch {
                then_type,
                else_type,
            });
        };

        Ok(Self {
            ty,
            test: Box::new(test),
            then_value: Box::new(then_value),
            else_value: Box::new(else_value),
        })
    }
}

/// Infix operator without a host equivalent (e.g. string concatenation).
#[derive(Debug, Clone, PartialEq)]
pub struct SqlBinaryOperatorExpression {
    pub ty: DataType,
    pub operator: String,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

/// `left IN right`; `right` is a sub-statement or a constant collection.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlInExpression {
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlLikeExpression {
    pub expression: Box<Expr>,
    pub pattern: Box<Expr>,
    pub escape: Box<Expr>,
}

/// Text rendered inline rather than as a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlLiteral {
    Int(i64),
    String(String),
    Null(DataType),
    /// A dialect keyword argument such as the `year` in `DATEPART(year, x)`
    Keyword(String),
}

impl SqlLiteral {
    pub fn ty(&self) -> DataType {
        match self {
            SqlLiteral::Int(_) => DataType::Int32,
            SqlLiteral::String(_) => DataType::String,
            SqlLiteral::Null(ty) => ty.clone(),
            SqlLiteral::Keyword(_) => DataType::Object,
        }
    }
}

/// `ROW_NUMBER() OVER (ORDER BY ...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlRowNumberExpression {
    pub orderings: Vec<Ordering>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationFunction {
    Count,
    CountBig,
    Sum,
    Min,
    Max,
    Average,
}

impl AggregationFunction {
    pub fn sql_name(self) -> &'static str {
        match self {
            AggregationFunction::Count => "COUNT",
            AggregationFunction::CountBig => "COUNT_BIG",
            AggregationFunction::Sum => "SUM",
            AggregationFunction::Min => "MIN",
            AggregationFunction::Max => "MAX",
            AggregationFunction::Average => "AVG",
        }
    }
}

/// An aggregate; `expression: None` means `(*)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlAggregationExpression {
    pub ty: DataType,
    pub function: AggregationFunction,
    pub expression: Option<Box<Expr>>,
}

impl SqlAggregationExpression {
    pub fn count_all(function: AggregationFunction, ty: DataType) -> Self {
        Self {
            ty,
            function,
            expression: None,
        }
    }

    pub fn over(function: AggregationFunction, ty: DataType, expression: Expr) -> Self {
        Self {
            ty,
            function,
            expression: Some(Box::new(expression)),
        }
    }
}

/// Projection of a `GroupBy`: key, element, and the aggregations other parts
/// of the query computed over each group (named `a0`, `a1`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct SqlGroupingSelectExpression {
    pub ty: DataType,
    pub key: Box<Expr>,
    pub element: Box<Expr>,
    pub aggregations: Vec<Expr>,
}

impl SqlGroupingSelectExpression {
    pub const KEY_NAME: &'static str = "key";

    pub fn new(key: Expr, element: Expr) -> Self {
        Self {
            ty: DataType::grouping(key.ty(), element.ty()),
            key: Box::new(key),
            element: Box::new(element),
            aggregations: Vec::new(),
        }
    }

    pub fn aggregation_name(index: usize) -> String {
        format!("a{}", index)
    }

    /// Append an aggregation, named, and return the name it is selected under.
    pub fn add_aggregation(&mut self, aggregation: Expr) -> String {
        let name = Self::aggregation_name(self.aggregations.len());
        self.aggregations
            .push(Expr::named(Some(name.clone()), aggregation));
        name
    }
}

/// A projection item carrying the column name it is selected under;
/// `None` means the configured default value column name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedExpression {
    pub name: Option<String>,
    pub expression: Box<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Column of a physical table
    Definition,
    /// Column selected by a sub-statement
    Reference,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlColumnExpression {
    pub ty: DataType,
    pub owning_table_alias: String,
    pub column_name: String,
    pub is_primary_key: bool,
    pub kind: ColumnKind,
}

impl SqlColumnExpression {
    pub fn definition(
        ty: DataType,
        owning_table_alias: impl Into<String>,
        column_name: impl Into<String>,
        is_primary_key: bool,
    ) -> Self {
        Self {
            ty,
            owning_table_alias: owning_table_alias.into(),
            column_name: column_name.into(),
            is_primary_key,
            kind: ColumnKind::Definition,
        }
    }

    pub fn reference(
        ty: DataType,
        owning_table_alias: impl Into<String>,
        column_name: impl Into<String>,
        is_primary_key: bool,
    ) -> Self {
        Self {
            kind: ColumnKind::Reference,
            ..Self::definition(ty, owning_table_alias, column_name, is_primary_key)
        }
    }

    pub fn with_type(mut self, ty: DataType) -> Self {
        self.ty = ty;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Definition,
    Reference,
}

/// A full mapped row: one primary-key column plus the property columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlEntityExpression {
    pub ty: DataType,
    /// Table the entity's rows come from; joins are registered on it.
    pub table: TableKey,
    pub table_alias: String,
    pub name: Option<String>,
    pub kind: EntityKind,
    columns: Vec<SqlColumnExpression>,
    primary_key_index: usize,
}

impl SqlEntityExpression {
    pub fn new(
        ty: DataType,
        table: TableKey,
        table_alias: impl Into<String>,
        name: Option<String>,
        columns: Vec<SqlColumnExpression>,
        kind: EntityKind,
    ) -> Result<Self, ExpressionError> {
        let primary_keys: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_primary_key)
            .map(|(i, _)| i)
            .collect();
        if primary_keys.len() != 1 {
            return Err(ExpressionError::PrimaryKeyCount {
                entity: ty.to_string(),
                found: primary_keys.len(),
            });
        }
        Ok(Self {
            ty,
            table,
            table_alias: table_alias.into(),
            name,
            kind,
            columns,
            primary_key_index: primary_keys[0],
        })
    }

    pub fn columns(&self) -> &[SqlColumnExpression] {
        &self.columns
    }

    pub fn primary_key_column(&self) -> &SqlColumnExpression {
        &self.columns[self.primary_key_index]
    }

    pub fn column(&self, name: &str) -> Option<&SqlColumnExpression> {
        self.columns.iter().find(|c| c.column_name == name)
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_type(mut self, ty: DataType) -> Self {
        self.ty = ty;
        self
    }

    /// Column name under which `column` is selected when this entity is
    /// projected by a sub-statement.
    pub fn projected_column_name(&self, column: &SqlColumnExpression) -> String {
        match &self.name {
            Some(name) => format!("{}_{}", name, column.column_name),
            None => column.column_name.clone(),
        }
    }

    /// The entity as seen from outside a sub-statement aliased `table_alias`.
    pub fn create_reference(&self, table: TableKey, table_alias: &str) -> SqlEntityExpression {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                SqlColumnExpression::reference(
                    c.ty.clone(),
                    table_alias,
                    self.projected_column_name(c),
                    c.is_primary_key,
                )
            })
            .collect();
        SqlEntityExpression {
            ty: self.ty.clone(),
            table,
            table_alias: table_alias.to_string(),
            name: None,
            kind: EntityKind::Reference,
            columns,
            primary_key_index: self.primary_key_index,
        }
    }

    /// Re-point the entity at other tables (used when a group's source is
    /// re-materialised under fresh aliases).
    pub fn remap(
        &self,
        tables: &HashMap<TableKey, TableKey>,
        aliases: &HashMap<String, String>,
    ) -> SqlEntityExpression {
        let mut remapped = self.clone();
        if let Some(table) = tables.get(&self.table) {
            remapped.table = *table;
        }
        if let Some(alias) = aliases.get(&self.table_alias) {
            remapped.table_alias = alias.clone();
        }
        for column in &mut remapped.columns {
            if let Some(alias) = aliases.get(&column.owning_table_alias) {
                column.owning_table_alias = alias.clone();
            }
        }
        remapped
    }
}

/// Member access on an entity that names a relation, not yet joined.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlEntityRefMemberExpression {
    pub ty: DataType,
    pub entity: SqlEntityExpression,
    pub member: String,
}

/// An entity instance supplied by the caller, compared through its key.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlEntityConstantExpression {
    pub ty: DataType,
    pub value: Value,
    pub primary_key: Box<Expr>,
}
