//! SQL statement model.
//!
//! A [`SqlStatement`] is one SELECT (possibly nested). Its FROM tables live in
//! the compilation's [`TableStore`] and are referenced by [`TableKey`], so an
//! expression anywhere in the tree (including correlated sub-statements) can
//! point at a table and register joins on it.

mod builder;
mod table;

pub use builder::{SqlStatementBuilder, KEY_MEMBER};
pub use table::{
    Cardinality, JoinCollection, JoinInfo, JoinSemantics, ResolvedJoinInfo,
    ResolvedSimpleTableInfo, ResolvedSubStatementTableInfo, SqlTable, TableInfo, TableKey,
    TableStore, UnresolvedCollectionJoinInfo, UnresolvedGroupReferenceTableInfo,
    UnresolvedJoinInfo, UnresolvedTableInfo,
};

use crate::expr::Expr;
use crate::types::DataType;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingDirection {
    Asc,
    Desc,
}

impl OrderingDirection {
    pub fn sql_keyword(self) -> &'static str {
        match self {
            OrderingDirection::Asc => "ASC",
            OrderingDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub expression: Expr,
    pub direction: OrderingDirection,
}

impl Ordering {
    pub fn asc(expression: Expr) -> Self {
        Self {
            expression,
            direction: OrderingDirection::Asc,
        }
    }

    pub fn desc(expression: Expr) -> Self {
        Self {
            expression,
            direction: OrderingDirection::Desc,
        }
    }
}

/// Shape of what a statement yields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DataInfo {
    /// Zero or more rows of `item_type`
    Sequence { item_type: DataType },
    /// One row taken from a sequence (`First`, `Single`, ...)
    SingleValue {
        ty: DataType,
        return_default_when_empty: bool,
    },
    /// A computed scalar (`Count`, `Contains`, `Sum`, ...)
    ScalarValue { ty: DataType },
}

impl DataInfo {
    pub fn sequence(item_type: DataType) -> Self {
        DataInfo::Sequence { item_type }
    }

    pub fn scalar(ty: DataType) -> Self {
        DataInfo::ScalarValue { ty }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            DataInfo::Sequence { item_type } => DataType::sequence(item_type.clone()),
            DataInfo::SingleValue { ty, .. } | DataInfo::ScalarValue { ty } => ty.clone(),
        }
    }

    /// Type of one row: the sequence item, or the value itself.
    pub fn item_type(&self) -> &DataType {
        match self {
            DataInfo::Sequence { item_type } => item_type,
            DataInfo::SingleValue { ty, .. } | DataInfo::ScalarValue { ty } => ty,
        }
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, DataInfo::Sequence { .. })
    }
}

/// One (sub-)statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub data_info: DataInfo,
    pub select_projection: Expr,
    pub sql_tables: Vec<TableKey>,
    pub where_condition: Option<Expr>,
    pub group_by_expression: Option<Expr>,
    pub orderings: Vec<Ordering>,
    pub top_expression: Option<Expr>,
    pub is_distinct: bool,
    /// Set by `Skip`: the row-number column of the flushed inner statement
    pub row_number_selector: Option<Expr>,
    /// Set by `Skip`: rows already skipped, consumed by a following `Take`
    pub current_row_number_offset: Option<Expr>,
}

impl SqlStatement {
    /// True when the statement is nothing but a projection, so referencing it
    /// can be replaced by the projection itself.
    pub fn is_projection_only(&self) -> bool {
        self.sql_tables.is_empty()
            && self.where_condition.is_none()
            && self.group_by_expression.is_none()
            && self.orderings.is_empty()
            && self.top_expression.is_none()
            && !self.is_distinct
            && self.row_number_selector.is_none()
    }
}
