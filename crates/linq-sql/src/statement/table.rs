//! FROM-clause tables, joins and the per-compilation table store.

use super::SqlStatement;
use crate::expr::{Expr, SqlEntityExpression};
use crate::types::DataType;
use serde::{Deserialize, Serialize};

/// Handle to a table in the [`TableStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableKey(usize);

impl TableKey {
    pub fn new(index: usize) -> Self {
        TableKey(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSemantics {
    Inner,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    One,
    Many,
}

/// A table whose mapping has not been looked up yet.
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedTableInfo {
    pub item_type: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSimpleTableInfo {
    pub item_type: DataType,
    pub table_name: String,
    pub table_alias: String,
}

/// A nested statement used as a FROM source: `(SELECT ...) AS [q0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSubStatementTableInfo {
    pub table_alias: String,
    pub statement: Box<SqlStatement>,
}

/// Iteration over the elements of a group produced by an earlier `GroupBy`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedGroupReferenceTableInfo {
    pub item_type: DataType,
    pub referenced_group_source: TableKey,
}

/// Navigation from an entity through a relation member.
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedJoinInfo {
    pub originating_entity: SqlEntityExpression,
    pub member: String,
    pub cardinality: Cardinality,
    pub item_type: DataType,
}

/// A from-clause iterating a collection member (`from o in c.Orders`).
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedCollectionJoinInfo {
    pub source_expression: Expr,
    pub member: String,
    pub item_type: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedJoinInfo {
    pub foreign_table_info: ResolvedSimpleTableInfo,
    pub left_key: Expr,
    pub right_key: Expr,
}

impl ResolvedJoinInfo {
    pub fn join_condition(&self) -> Expr {
        Expr::equal(self.left_key.clone(), self.right_key.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinInfo {
    Unresolved(UnresolvedJoinInfo),
    UnresolvedCollection(UnresolvedCollectionJoinInfo),
    Resolved(ResolvedJoinInfo),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableInfo {
    Unresolved(UnresolvedTableInfo),
    ResolvedSimple(ResolvedSimpleTableInfo),
    SubStatement(ResolvedSubStatementTableInfo),
    Joined(JoinInfo),
    UnresolvedGroupReference(UnresolvedGroupReferenceTableInfo),
    /// A group reference after resolution: its rows are produced by the
    /// re-materialised group source, projected through `element`.
    ResolvedGroupReference { item_type: DataType, element: Expr },
}

impl TableInfo {
    pub fn item_type(&self) -> DataType {
        match self {
            TableInfo::Unresolved(info) => info.item_type.clone(),
            TableInfo::ResolvedSimple(info) => info.item_type.clone(),
            TableInfo::SubStatement(info) => info.statement.data_info.item_type().clone(),
            TableInfo::Joined(JoinInfo::Unresolved(info)) => info.item_type.clone(),
            TableInfo::Joined(JoinInfo::UnresolvedCollection(info)) => info.item_type.clone(),
            TableInfo::Joined(JoinInfo::Resolved(info)) => info.foreign_table_info.item_type.clone(),
            TableInfo::UnresolvedGroupReference(info) => info.item_type.clone(),
            TableInfo::ResolvedGroupReference { item_type, .. } => item_type.clone(),
        }
    }

    /// Alias the table is declared under, once known.
    pub fn alias(&self) -> Option<&str> {
        match self {
            TableInfo::ResolvedSimple(info) => Some(&info.table_alias),
            TableInfo::SubStatement(info) => Some(&info.table_alias),
            TableInfo::Joined(JoinInfo::Resolved(info)) => {
                Some(&info.foreign_table_info.table_alias)
            }
            _ => None,
        }
    }
}

/// Joins reached from one table through member access, in registration
/// order. The same member traversed twice yields the same join.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinCollection {
    entries: Vec<(String, TableKey)>,
}

impl JoinCollection {
    pub fn get(&self, member: &str) -> Option<TableKey> {
        self.entries
            .iter()
            .find(|(m, _)| m == member)
            .map(|(_, key)| *key)
    }

    pub fn insert(&mut self, member: impl Into<String>, table: TableKey) {
        self.entries.push((member.into(), table));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, TableKey)> {
        self.entries.iter().map(|(m, k)| (m.as_str(), *k))
    }

    pub fn keys(&self) -> impl Iterator<Item = TableKey> + '_ {
        self.entries.iter().map(|(_, k)| *k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlTable {
    pub info: TableInfo,
    pub join_semantics: JoinSemantics,
    pub joins: JoinCollection,
}

impl SqlTable {
    pub fn new(info: TableInfo, join_semantics: JoinSemantics) -> Self {
        Self {
            info,
            join_semantics,
            joins: JoinCollection::default(),
        }
    }
}

/// Owner of every table created during one compilation.
#[derive(Debug, Default)]
pub struct TableStore {
    tables: Vec<SqlTable>,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, table: SqlTable) -> TableKey {
        self.tables.push(table);
        TableKey(self.tables.len() - 1)
    }

    /// Keys are only minted by `add`, so every key indexes a live table.
    pub fn get(&self, key: TableKey) -> &SqlTable {
        &self.tables[key.0]
    }

    pub fn get_mut(&mut self, key: TableKey) -> &mut SqlTable {
        &mut self.tables[key.0]
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// The join registered on `table` for `member`, creating it with
    /// `create` on first use.
    pub fn get_or_add_join(
        &mut self,
        table: TableKey,
        member: &str,
        create: impl FnOnce() -> SqlTable,
    ) -> TableKey {
        if let Some(existing) = self.get(table).joins.get(member) {
            return existing;
        }
        let joined = self.add(create());
        self.get_mut(table).joins.insert(member, joined);
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple(name: &str, alias: &str) -> SqlTable {
        SqlTable::new(
            TableInfo::ResolvedSimple(ResolvedSimpleTableInfo {
                item_type: DataType::entity(name),
                table_name: format!("{}Table", name),
                table_alias: alias.to_string(),
            }),
            JoinSemantics::Inner,
        )
    }

    #[test]
    fn test_same_member_join_is_deduplicated() {
        let mut store = TableStore::new();
        let cook = store.add(simple("Cook", "t0"));

        let first = store.get_or_add_join(cook, "Kitchen", || simple("Kitchen", "t1"));
        let second = store.get_or_add_join(cook, "Kitchen", || simple("Kitchen", "t2"));

        assert_eq!(first, second);
        assert_eq!(store.get(cook).joins.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_joins_keep_registration_order() {
        let mut store = TableStore::new();
        let cook = store.add(simple("Cook", "t0"));
        store.get_or_add_join(cook, "Kitchen", || simple("Kitchen", "t1"));
        store.get_or_add_join(cook, "Substitution", || simple("Cook", "t2"));

        let members: Vec<&str> = store.get(cook).joins.iter().map(|(m, _)| m).collect();
        assert_eq!(members, vec!["Kitchen", "Substitution"]);
    }
}
