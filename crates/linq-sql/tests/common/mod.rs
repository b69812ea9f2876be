//! Shared fixtures for the query translation tests.

#![allow(dead_code)]

use linq_sql::query_model::{FromClause, QueryModel, SourceId};
use linq_sql::{DataType, Expr, MappingSchema, SchemaMappingResolver, SqlQueryGenerator};
use std::path::PathBuf;
use std::sync::Arc;

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Resolver over the kitchen staff mapping in `fixtures/cooks.toml`.
pub fn cook_resolver() -> SchemaMappingResolver {
    let schema = MappingSchema::from_toml_file(fixture_path("cooks.toml")).unwrap();
    SchemaMappingResolver::new(schema).unwrap()
}

pub fn generator() -> SqlQueryGenerator {
    init_tracing();
    SqlQueryGenerator::new(Arc::new(cook_resolver()))
}

/// Route pipeline diagnostics to the test output. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

pub fn cook() -> DataType {
    DataType::entity("Cook")
}

pub fn kitchen() -> DataType {
    DataType::entity("Kitchen")
}

/// `from c in Cooks`, with `c` identified by `id`.
pub fn cooks_from(id: u32) -> FromClause {
    FromClause::new(SourceId(id), "c", cook(), Expr::queryable(cook()))
}

pub fn kitchens_from(id: u32) -> FromClause {
    FromClause::new(SourceId(id), "k", kitchen(), Expr::queryable(kitchen()))
}

/// `c.<member>` for the range variable `id` of type Cook.
pub fn cook_member(id: u32, member: &str, ty: DataType) -> Expr {
    Expr::member(Expr::source(SourceId(id), cook()), member, ty)
}

/// `from c in Cooks select c.<member>`
pub fn cooks_select(member: &str, ty: DataType) -> QueryModel {
    QueryModel::from(cooks_from(0)).with_select(cook_member(0, member, ty))
}
