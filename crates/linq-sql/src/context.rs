//! Per-compilation state.

use crate::identifiers::UniqueIdentifierGenerator;
use crate::statement::{JoinSemantics, SqlTable, TableInfo, TableKey, TableStore};

/// Mutable state of one top-level compilation, threaded by `&mut` through
/// every stage and every nested statement.
///
/// Each call to
/// [`SqlQueryGenerator::create_sql_query`](crate::SqlQueryGenerator::create_sql_query)
/// creates a fresh context; contexts are never shared between compilations.
#[derive(Debug, Default)]
pub struct CompilationContext {
    pub generator: UniqueIdentifierGenerator,
    pub tables: TableStore,
}

impl CompilationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, info: TableInfo, join_semantics: JoinSemantics) -> TableKey {
        self.tables.add(SqlTable::new(info, join_semantics))
    }

    pub fn unique_identifier(&mut self, prefix: &str) -> String {
        self.generator.get_unique_identifier(prefix)
    }
}
