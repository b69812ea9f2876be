//! In-memory side of a generated query: how the columns of one result row
//! are assembled back into a value of the statement's item type.

use crate::error::RowError;
use crate::expr::{Expr, SqlEntityExpression};
use crate::statement::DataInfo;
use crate::types::DataType;
use serde::Serialize;
use serde_json::{Map, Value};

/// Shape of one result row, derived from the outer statement's projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ProjectionPlan {
    /// A single column.
    Value { column: String, ty: DataType },
    /// An entity spread over several columns.
    Entity { ty: DataType, columns: Vec<String> },
    /// A record built member by member.
    Record {
        ty: DataType,
        members: Vec<(String, ProjectionPlan)>,
    },
}

impl ProjectionPlan {
    /// Plan for a named projection, as produced by mapping resolution.
    /// Unnamed scalars are read from `value_column_name`.
    pub fn from_projection(projection: &Expr, value_column_name: &str) -> Self {
        match projection {
            Expr::Named(named) => match named.expression.as_ref() {
                Expr::SqlEntity(_) | Expr::New(_) | Expr::SqlGroupingSelect(_) => {
                    Self::from_projection(&named.expression, value_column_name)
                }
                inner => ProjectionPlan::Value {
                    column: named
                        .name
                        .clone()
                        .unwrap_or_else(|| value_column_name.to_string()),
                    ty: inner.ty(),
                },
            },
            Expr::SqlEntity(entity) => Self::entity(entity),
            Expr::New(record) => ProjectionPlan::Record {
                ty: record.ty.clone(),
                members: record
                    .members
                    .iter()
                    .map(|(member, value)| {
                        (member.clone(), Self::from_projection(value, value_column_name))
                    })
                    .collect(),
            },
            // Only the key of a top-level grouping is selected by a plain
            // statement; the elements need a query of their own.
            Expr::SqlGroupingSelect(grouping) => ProjectionPlan::Record {
                ty: grouping.ty.clone(),
                members: vec![(
                    "Key".to_string(),
                    Self::from_projection(&grouping.key, value_column_name),
                )],
            },
            other => ProjectionPlan::Value {
                column: value_column_name.to_string(),
                ty: other.ty(),
            },
        }
    }

    fn entity(entity: &SqlEntityExpression) -> Self {
        ProjectionPlan::Entity {
            ty: entity.ty.clone(),
            columns: entity
                .columns()
                .iter()
                .map(|c| entity.projected_column_name(c))
                .collect(),
        }
    }

    /// Read one row.
    pub fn materialize(&self, row: &dyn DatabaseResultRow) -> Result<Value, RowError> {
        match self {
            ProjectionPlan::Value { column, ty } => Ok(from_sql_value(row.get_value(column)?, ty)),
            ProjectionPlan::Entity { ty, columns } => row.get_entity(ty, columns),
            ProjectionPlan::Record { members, .. } => {
                let mut object = Map::new();
                for (member, plan) in members {
                    object.insert(member.clone(), plan.materialize(row)?);
                }
                Ok(Value::Object(object))
            }
        }
    }
}

/// Booleans travel as `0`/`1` integers in result sets.
fn from_sql_value(value: Value, ty: &DataType) -> Value {
    match (&value, ty.is_boolean()) {
        (Value::Number(n), true) => Value::Bool(n.as_i64().map_or(false, |n| n != 0)),
        _ => value,
    }
}

/// Access to the columns of one row returned by the database.
pub trait DatabaseResultRow {
    fn get_value(&self, column: &str) -> Result<Value, RowError>;

    /// The entity selected over `columns`, or `Value::Null` when the entity
    /// is absent (all columns null, as for an unmatched left join).
    fn get_entity(&self, entity_type: &DataType, columns: &[String]) -> Result<Value, RowError>;
}

/// Rows already decoded into JSON objects keyed by column name.
impl DatabaseResultRow for Map<String, Value> {
    fn get_value(&self, column: &str) -> Result<Value, RowError> {
        self.get(column)
            .cloned()
            .ok_or_else(|| RowError::MissingColumn(column.to_string()))
    }

    fn get_entity(&self, _entity_type: &DataType, columns: &[String]) -> Result<Value, RowError> {
        let mut object = Map::new();
        for column in columns {
            object.insert(column.clone(), self.get_value(column)?);
        }
        if object.values().all(Value::is_null) {
            return Ok(Value::Null);
        }
        Ok(Value::Object(object))
    }
}

/// Value returned by `FirstOrDefault`/`SingleOrDefault` on an empty result.
pub fn default_value(ty: &DataType) -> Value {
    match ty {
        DataType::Boolean => Value::Bool(false),
        DataType::Int16 | DataType::Int32 | DataType::Int64 => Value::from(0),
        DataType::Single | DataType::Double | DataType::Decimal => Value::from(0.0),
        _ => Value::Null,
    }
}

/// Reduce the rows of a single-value statement to its result.
///
/// `Single` over-fetches with `TOP (2)` so that a second row can be detected
/// here; `First` is limited to one row by the statement itself.
pub fn materialize_single<R: DatabaseResultRow>(
    rows: impl IntoIterator<Item = R>,
    plan: &ProjectionPlan,
    data_info: &DataInfo,
) -> Result<Value, RowError> {
    let mut rows = rows.into_iter();
    let first = match rows.next() {
        Some(row) => row,
        None => {
            return match data_info {
                DataInfo::SingleValue {
                    ty,
                    return_default_when_empty: true,
                } => Ok(default_value(ty)),
                _ => Err(RowError::NoElements),
            };
        }
    };
    if rows.next().is_some() {
        return Err(RowError::MoreThanOneElement);
    }
    plan.materialize(&first)
}
