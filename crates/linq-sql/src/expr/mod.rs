//! Expression tree shared by every pipeline stage.
//!
//! A single closed enum covers host expressions (as produced by the query
//! front end), unresolved mapping nodes, resolved entity/column nodes and
//! SQL-specific nodes. Each stage matches exhaustively, so a node kind a stage
//! forgot about is a compile error rather than a runtime fallback.

mod sql;
mod visit;

pub use sql::{
    AggregationFunction, ColumnKind, EntityKind, NamedExpression, SqlAggregationExpression,
    SqlBinaryOperatorExpression, SqlCaseExpression, SqlColumnExpression, SqlConvertExpression,
    SqlEntityConstantExpression, SqlEntityExpression, SqlEntityRefMemberExpression,
    SqlFunctionExpression, SqlGroupingSelectExpression, SqlInExpression, SqlLikeExpression,
    SqlLiteral, SqlRowNumberExpression,
};

use crate::error::ExpressionError;
use crate::query_model::{QueryModel, SourceId};
use crate::statement::{SqlStatement, TableKey};
use crate::types::{DataType, MethodSignature};
use serde_json::Value;

/// Binary operators of the host expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    And,
    Or,
    ExclusiveOr,
    AndAlso,
    OrElse,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Coalesce,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }

    /// Short-circuiting boolean connectives.
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::AndAlso | BinaryOp::OrElse)
    }

    /// SQL spelling of the operator. `Coalesce` has none; it is lowered to a
    /// `COALESCE` function during preparation.
    pub fn sql_operator(self) -> Option<&'static str> {
        Some(match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::ExclusiveOr => "^",
            BinaryOp::AndAlso => "AND",
            BinaryOp::OrElse => "OR",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "<>",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::Coalesce => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Negate,
    /// Type reinterpretation; renders as its operand.
    Convert,
}

/// A literal value of the host language.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantExpression {
    pub value: Value,
    pub ty: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpression {
    pub expression: Box<Expr>,
    pub member: String,
    pub ty: DataType,
}

/// Reflected description of a host-library method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub declaring_type: String,
    pub name: String,
    pub parameter_types: Vec<DataType>,
    pub return_type: DataType,
    pub is_static: bool,
}

impl MethodInfo {
    pub fn instance(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        parameter_types: impl IntoIterator<Item = DataType>,
        return_type: DataType,
    ) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
            parameter_types: parameter_types.into_iter().collect(),
            return_type,
            is_static: false,
        }
    }

    pub fn static_method(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        parameter_types: impl IntoIterator<Item = DataType>,
        return_type: DataType,
    ) -> Self {
        Self {
            is_static: true,
            ..Self::instance(declaring_type, name, parameter_types, return_type)
        }
    }

    pub fn signature(&self) -> MethodSignature {
        MethodSignature::new(
            self.declaring_type.clone(),
            self.name.clone(),
            self.parameter_types.iter().cloned(),
        )
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.declaring_type, self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodCallExpression {
    pub object: Option<Box<Expr>>,
    pub method: MethodInfo,
    pub arguments: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    pub op: BinaryOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub ty: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    pub op: UnaryOp,
    pub operand: Box<Expr>,
    pub ty: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalExpression {
    pub test: Box<Expr>,
    pub if_true: Box<Expr>,
    pub if_false: Box<Expr>,
    pub ty: DataType,
}

/// Construction of a record; each member keeps its name so projections can
/// label their columns.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpression {
    pub ty: DataType,
    pub members: Vec<(String, Expr)>,
}

impl NewExpression {
    pub fn member(&self, name: &str) -> Option<&Expr> {
        self.members
            .iter()
            .find(|(member, _)| member == name)
            .map(|(_, expr)| expr)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeIsExpression {
    pub expression: Box<Expr>,
    pub type_operand: DataType,
}

/// Every expression node kind known to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Host expressions
    Constant(ConstantExpression),
    /// Root table source: all rows of a mapped item type.
    Queryable(DataType),
    QuerySourceReference {
        source: SourceId,
        ty: DataType,
    },
    SubQuery(Box<QueryModel>),
    Member(MemberExpression),
    MethodCall(MethodCallExpression),
    Binary(BinaryExpression),
    Unary(UnaryExpression),
    Conditional(ConditionalExpression),
    New(NewExpression),
    TypeIs(TypeIsExpression),

    // Statement structure
    SqlTableReference {
        table: TableKey,
        ty: DataType,
    },
    SqlSubStatement(Box<SqlStatement>),
    Named(NamedExpression),

    // SQL-specific
    SqlFunction(SqlFunctionExpression),
    SqlConvert(SqlConvertExpression),
    SqlCase(SqlCaseExpression),
    SqlBinaryOperator(SqlBinaryOperatorExpression),
    SqlIn(SqlInExpression),
    SqlLike(SqlLikeExpression),
    SqlIsNull(Box<Expr>),
    SqlIsNotNull(Box<Expr>),
    SqlExists(Box<Expr>),
    SqlLiteral(SqlLiteral),
    SqlRowNumber(SqlRowNumberExpression),
    SqlAggregation(SqlAggregationExpression),
    SqlGroupingSelect(SqlGroupingSelectExpression),

    // Mapping
    SqlEntityRefMember(SqlEntityRefMemberExpression),
    SqlEntity(SqlEntityExpression),
    SqlEntityConstant(SqlEntityConstantExpression),
    SqlColumn(SqlColumnExpression),
}

impl Expr {
    pub fn constant(value: impl Into<Value>, ty: DataType) -> Self {
        Expr::Constant(ConstantExpression {
            value: value.into(),
            ty,
        })
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::constant(Value::String(value.into()), DataType::String)
    }

    pub fn int(value: i64) -> Self {
        Expr::constant(value, DataType::Int32)
    }

    pub fn bool(value: bool) -> Self {
        Expr::constant(value, DataType::Boolean)
    }

    pub fn null(ty: DataType) -> Self {
        Expr::constant(Value::Null, ty)
    }

    pub fn queryable(item_type: DataType) -> Self {
        Expr::Queryable(item_type)
    }

    pub fn source(source: SourceId, ty: DataType) -> Self {
        Expr::QuerySourceReference { source, ty }
    }

    pub fn sub_query(model: QueryModel) -> Self {
        Expr::SubQuery(Box::new(model))
    }

    pub fn member(expression: Expr, member: impl Into<String>, ty: DataType) -> Self {
        Expr::Member(MemberExpression {
            expression: Box::new(expression),
            member: member.into(),
            ty,
        })
    }

    pub fn call(object: Expr, method: MethodInfo, arguments: Vec<Expr>) -> Self {
        Expr::MethodCall(MethodCallExpression {
            object: Some(Box::new(object)),
            method,
            arguments,
        })
    }

    pub fn static_call(method: MethodInfo, arguments: Vec<Expr>) -> Self {
        Expr::MethodCall(MethodCallExpression {
            object: None,
            method,
            arguments,
        })
    }

    /// Binary node with the result type implied by the operator.
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        let ty = if op.is_comparison() || op.is_logical() {
            DataType::Boolean
        } else if op == BinaryOp::Coalesce {
            right.ty()
        } else {
            left.ty()
        };
        Expr::Binary(BinaryExpression {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty,
        })
    }

    pub fn equal(left: Expr, right: Expr) -> Self {
        Expr::binary(BinaryOp::Equal, left, right)
    }

    pub fn not_equal(left: Expr, right: Expr) -> Self {
        Expr::binary(BinaryOp::NotEqual, left, right)
    }

    pub fn and_also(left: Expr, right: Expr) -> Self {
        Expr::binary(BinaryOp::AndAlso, left, right)
    }

    pub fn or_else(left: Expr, right: Expr) -> Self {
        Expr::binary(BinaryOp::OrElse, left, right)
    }

    pub fn add(left: Expr, right: Expr) -> Self {
        Expr::binary(BinaryOp::Add, left, right)
    }

    pub fn not(operand: Expr) -> Self {
        let ty = operand.ty();
        Expr::Unary(UnaryExpression {
            op: UnaryOp::Not,
            operand: Box::new(operand),
            ty,
        })
    }

    pub fn convert(operand: Expr, ty: DataType) -> Self {
        Expr::Unary(UnaryExpression {
            op: UnaryOp::Convert,
            operand: Box::new(operand),
            ty,
        })
    }

    pub fn conditional(test: Expr, if_true: Expr, if_false: Expr) -> Self {
        let ty = if_true.ty();
        Expr::Conditional(ConditionalExpression {
            test: Box::new(test),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
            ty,
        })
    }

    pub fn new_record(type_name: impl Into<String>, members: Vec<(String, Expr)>) -> Self {
        Expr::New(NewExpression {
            ty: DataType::Record(type_name.into()),
            members,
        })
    }

    pub fn type_is(expression: Expr, type_operand: DataType) -> Self {
        Expr::TypeIs(TypeIsExpression {
            expression: Box::new(expression),
            type_operand,
        })
    }

    pub fn function(name: impl Into<String>, ty: DataType, arguments: Vec<Expr>) -> Self {
        Expr::SqlFunction(SqlFunctionExpression {
            ty,
            name: name.into(),
            arguments,
        })
    }

    pub fn literal_int(value: i64) -> Self {
        Expr::SqlLiteral(SqlLiteral::Int(value))
    }

    pub fn literal_string(value: impl Into<String>) -> Self {
        Expr::SqlLiteral(SqlLiteral::String(value.into()))
    }

    pub fn case(test: Expr, then_value: Expr, else_value: Expr) -> Result<Self, ExpressionError> {
        SqlCaseExpression::new(test, then_value, else_value).map(Expr::SqlCase)
    }

    pub fn named(name: Option<String>, expression: Expr) -> Self {
        Expr::Named(NamedExpression {
            name,
            expression: Box::new(expression),
        })
    }

    pub fn table_reference(table: TableKey, ty: DataType) -> Self {
        Expr::SqlTableReference { table, ty }
    }

    /// Declared result type of the node.
    pub fn ty(&self) -> DataType {
        match self {
            Expr::Constant(c) => c.ty.clone(),
            Expr::Queryable(item) => DataType::sequence(item.clone()),
            Expr::QuerySourceReference { ty, .. } => ty.clone(),
            Expr::SubQuery(model) => model.result_type(),
            Expr::Member(m) => m.ty.clone(),
            Expr::MethodCall(call) => call.method.return_type.clone(),
            Expr::Binary(b) => b.ty.clone(),
            Expr::Unary(u) => u.ty.clone(),
            Expr::Conditional(c) => c.ty.clone(),
            Expr::New(n) => n.ty.clone(),
            Expr::TypeIs(_) => DataType::Boolean,
            Expr::SqlTableReference { ty, .. } => ty.clone(),
            Expr::SqlSubStatement(statement) => statement.data_info.data_type(),
            Expr::Named(named) => named.expression.ty(),
            Expr::SqlFunction(f) => f.ty.clone(),
            Expr::SqlConvert(c) => c.ty.clone(),
            Expr::SqlCase(c) => c.ty.clone(),
            Expr::SqlBinaryOperator(b) => b.ty.clone(),
            Expr::SqlIn(_)
            | Expr::SqlLike(_)
            | Expr::SqlIsNull(_)
            | Expr::SqlIsNotNull(_)
            | Expr::SqlExists(_) => DataType::Boolean,
            Expr::SqlLiteral(literal) => literal.ty(),
            Expr::SqlRowNumber(_) => DataType::Int64,
            Expr::SqlAggregation(a) => a.ty.clone(),
            Expr::SqlGroupingSelect(g) => g.ty.clone(),
            Expr::SqlEntityRefMember(r) => r.ty.clone(),
            Expr::SqlEntity(e) => e.ty.clone(),
            Expr::SqlEntityConstant(c) => c.ty.clone(),
            Expr::SqlColumn(c) => c.ty.clone(),
        }
    }

    /// Short node-kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Constant(_) => "Constant",
            Expr::Queryable(_) => "Queryable",
            Expr::QuerySourceReference { .. } => "QuerySourceReference",
            Expr::SubQuery(_) => "SubQuery",
            Expr::Member(_) => "Member",
            Expr::MethodCall(_) => "MethodCall",
            Expr::Binary(_) => "Binary",
            Expr::Unary(_) => "Unary",
            Expr::Conditional(_) => "Conditional",
            Expr::New(_) => "New",
            Expr::TypeIs(_) => "TypeIs",
            Expr::SqlTableReference { .. } => "SqlTableReference",
            Expr::SqlSubStatement(_) => "SqlSubStatement",
            Expr::Named(_) => "Named",
            Expr::SqlFunction(_) => "SqlFunction",
            Expr::SqlConvert(_) => "SqlConvert",
            Expr::SqlCase(_) => "SqlCase",
            Expr::SqlBinaryOperator(_) => "SqlBinaryOperator",
            Expr::SqlIn(_) => "SqlIn",
            Expr::SqlLike(_) => "SqlLike",
            Expr::SqlIsNull(_) => "SqlIsNull",
            Expr::SqlIsNotNull(_) => "SqlIsNotNull",
            Expr::SqlExists(_) => "SqlExists",
            Expr::SqlLiteral(_) => "SqlLiteral",
            Expr::SqlRowNumber(_) => "SqlRowNumber",
            Expr::SqlAggregation(_) => "SqlAggregation",
            Expr::SqlGroupingSelect(_) => "SqlGroupingSelect",
            Expr::SqlEntityRefMember(_) => "SqlEntityRefMember",
            Expr::SqlEntity(_) => "SqlEntity",
            Expr::SqlEntityConstant(_) => "SqlEntityConstant",
            Expr::SqlColumn(_) => "SqlColumn",
        }
    }

    pub fn as_constant(&self) -> Option<&ConstantExpression> {
        match self {
            Expr::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_null_constant(&self) -> bool {
        matches!(self, Expr::Constant(c) if c.value.is_null())
    }

    /// Strip any number of `Named` wrappers.
    pub fn unwrap_named(&self) -> &Expr {
        match self {
            Expr::Named(named) => named.expression.unwrap_named(),
            other => other,
        }
    }

    pub fn into_unnamed(self) -> Expr {
        match self {
            Expr::Named(named) => named.expression.into_unnamed(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_types_follow_operator() {
        let cmp = Expr::equal(Expr::int(1), Expr::int(2));
        assert_eq!(cmp.ty(), DataType::Boolean);

        let sum = Expr::add(Expr::string("a"), Expr::string("b"));
        assert_eq!(sum.ty(), DataType::String);
    }

    #[test]
    fn test_unwrap_named_strips_nested_names() {
        let inner = Expr::int(3);
        let named = Expr::named(Some("a".into()), Expr::named(None, inner.clone()));
        assert_eq!(named.unwrap_named(), &inner);
        assert_eq!(named.into_unnamed(), inner);
    }

    #[test]
    fn test_null_constant_detection() {
        assert!(Expr::null(DataType::String).is_null_constant());
        assert!(!Expr::string("x").is_null_constant());
    }
}
