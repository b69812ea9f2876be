//! Mapping resolution contract.
//!
//! The resolution stage never looks at mapping metadata itself; it asks a
//! [`MappingResolver`] what table backs a type, which columns make up an
//! entity and how a relation is joined. [`SchemaMappingResolver`] answers
//! from a declarative [`MappingSchema`].

mod schema;

#[cfg(test)]
pub(crate) use schema::test_support;

pub use schema::{
    ColumnMapping, DiscriminatorMapping, EntityMapping, MappingSchema, RelationMapping,
    SchemaMappingResolver,
};

use crate::error::MappingResult;
use crate::expr::{ConstantExpression, Expr, SqlEntityExpression};
use crate::identifiers::UniqueIdentifierGenerator;
use crate::statement::{
    ResolvedJoinInfo, ResolvedSimpleTableInfo, TableKey, UnresolvedJoinInfo, UnresolvedTableInfo,
};
use crate::types::DataType;

/// Answers mapping questions for the resolution stage.
///
/// Implementations must be deterministic; anything they do not know is an
/// [`UnmappedItem`](crate::error::MappingError::UnmappedItem) error, which
/// aborts the compilation unchanged.
pub trait MappingResolver: Send + Sync {
    /// Table name plus a fresh alias from `generator`.
    fn resolve_table_info(
        &self,
        table: &UnresolvedTableInfo,
        generator: &mut UniqueIdentifierGenerator,
    ) -> MappingResult<ResolvedSimpleTableInfo>;

    /// Foreign table (fresh alias) and the key columns joining it to the
    /// originating entity.
    fn resolve_join_info(
        &self,
        join: &UnresolvedJoinInfo,
        generator: &mut UniqueIdentifierGenerator,
    ) -> MappingResult<ResolvedJoinInfo>;

    /// The full entity definition selected from `table`, stored at `key`.
    fn resolve_simple_table_info(
        &self,
        table: &ResolvedSimpleTableInfo,
        key: TableKey,
    ) -> MappingResult<SqlEntityExpression>;

    /// A column of `entity`, or an entity-ref member for a relation.
    fn resolve_member_expression(
        &self,
        entity: &SqlEntityExpression,
        member: &str,
    ) -> MappingResult<Expr>;

    /// Constants of mapped types become entity constants; anything else is
    /// returned unchanged.
    fn resolve_constant_expression(&self, constant: &ConstantExpression) -> MappingResult<Expr>;

    /// A predicate that holds when `expression` is of `desired_type`.
    fn resolve_type_check(&self, expression: &Expr, desired_type: &DataType) -> MappingResult<Expr>;
}
