//! Error types for the query translation pipeline.
//!
//! Each stage has its own error enum; [`QueryError`] wraps them for callers of
//! the [`SqlQueryGenerator`](crate::SqlQueryGenerator) facade. All errors are
//! static: a bad mapping or a missing method translation will fail the same
//! way every time, so nothing in the pipeline retries.

use crate::types::DataType;
use std::fmt;
use thiserror::Error;

/// Structural validation errors raised when expression nodes are built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("CASE test must be a boolean predicate, got {actual}")]
    CaseTestNotBoolean { actual: DataType },

    #[error("CASE branches must have the same type: THEN is {then_type}, ELSE is {else_type}")]
    CaseBranchTypeMismatch {
        then_type: DataType,
        else_type: DataType,
    },

    #[error("entity '{entity}' must have exactly one primary key column, found {found}")]
    PrimaryKeyCount { entity: String, found: usize },

    #[error("no SQL type is known for {target}")]
    UnsupportedConvertType { target: DataType },
}

/// What kind of item a mapping resolver failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappedItemKind {
    Type,
    Member,
    Relation,
    TypeCheck,
}

impl fmt::Display for MappedItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappedItemKind::Type => write!(f, "type"),
            MappedItemKind::Member => write!(f, "member"),
            MappedItemKind::Relation => write!(f, "relation"),
            MappedItemKind::TypeCheck => write!(f, "type check"),
        }
    }
}

/// Errors raised by a [`MappingResolver`](crate::mapping::MappingResolver).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("{kind} '{name}' is not mapped")]
    UnmappedItem { kind: MappedItemKind, name: String },

    #[error("invalid mapping schema: {0}")]
    InvalidSchema(String),
}

impl MappingError {
    pub fn unmapped(kind: MappedItemKind, name: impl Into<String>) -> Self {
        MappingError::UnmappedItem {
            kind,
            name: name.into(),
        }
    }
}

/// Errors raised while lowering a query model into a SQL statement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreparationError {
    #[error("method {declaring_type}.{name} is not supported")]
    UnsupportedMethod { declaring_type: String, name: String },

    #[error("result operator '{operator}' is not supported")]
    UnsupportedOperator { operator: String },

    #[error("query source '{query_source}' is not known in this context")]
    UnknownQuerySource { query_source: String },

    #[error("{method} expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        method: String,
        expected: &'static str,
        actual: usize,
    },

    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    #[error("statement is incomplete: {0}")]
    IncompleteStatement(&'static str),

    #[error(transparent)]
    Expression(#[from] ExpressionError),
}

/// Errors raised while resolving a prepared statement against the mapping.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("cannot resolve member '{member}' applied to an expression of type {on_type}")]
    UnresolvableMember { member: String, on_type: DataType },

    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    #[error(transparent)]
    Expression(#[from] ExpressionError),
}

/// Errors raised by the boolean-semantics converter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BooleanSemanticsError {
    #[error("boolean expression of type {expression_type} ({node}) cannot be used as a predicate or value")]
    UnsupportedBooleanExpression {
        expression_type: DataType,
        node: &'static str,
    },

    #[error(transparent)]
    Expression(#[from] ExpressionError),
}

/// Errors raised while emitting SQL text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("no SQL generator registered for method {declaring_type}.{name}")]
    UnsupportedMethod { declaring_type: String, name: String },

    #[error("{method} expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        method: String,
        expected: &'static str,
        actual: usize,
    },

    #[error("expression cannot be rendered as SQL: {0}")]
    UnsupportedExpression(String),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised while materialising result rows.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("column '{0}' is not present in the result row")]
    MissingColumn(String),

    #[error("sequence contains no elements")]
    NoElements,

    #[error("sequence contains more than one element")]
    MoreThanOneElement,

    #[error("projection cannot be materialised: {0}")]
    Unsupported(String),
}

/// Umbrella error for a full query compilation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error(transparent)]
    Preparation(#[from] PreparationError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    BooleanSemantics(#[from] BooleanSemanticsError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl From<MappingError> for QueryError {
    fn from(err: MappingError) -> Self {
        QueryError::Resolution(ResolutionError::Mapping(err))
    }
}

pub type PreparationResult<T> = Result<T, PreparationError>;
pub type ResolutionResult<T> = Result<T, ResolutionError>;
pub type GenerationResult<T> = Result<T, GenerationError>;
pub type MappingResult<T> = Result<T, MappingError>;
