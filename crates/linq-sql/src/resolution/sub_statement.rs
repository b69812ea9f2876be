//! Nested statements: projection naming, references from the enclosing
//! statement, and inlining of statements that are only a projection.

use super::MappingResolutionStage;
use crate::context::CompilationContext;
use crate::error::ResolutionResult;
use crate::expr::{Expr, NewExpression, SqlColumnExpression, SqlGroupingSelectExpression};
use crate::statement::{SqlStatement, TableKey};

fn qualified(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}_{}", prefix, name),
        None => name.to_string(),
    }
}

impl MappingResolutionStage {
    /// Give every selected value a column name so the enclosing statement
    /// (or the result reader) can address it. Record members are named
    /// after the member, prefixed by the enclosing names; a bare value gets
    /// the configured value column name.
    pub(super) fn name_projection(&self, projection: Expr, name: Option<String>) -> Expr {
        match projection {
            Expr::Named(named) => self.name_projection(*named.expression, name.or(named.name)),
            Expr::SqlEntity(entity) => Expr::SqlEntity(entity.with_name(name)),
            Expr::New(record) => Expr::New(NewExpression {
                ty: record.ty,
                members: record
                    .members
                    .into_iter()
                    .map(|(member, value)| {
                        let member_name = qualified(name.as_deref(), &member);
                        let value = self.name_projection(value, Some(member_name));
                        (member, value)
                    })
                    .collect(),
            }),
            Expr::SqlGroupingSelect(grouping) => {
                let key_name = qualified(name.as_deref(), SqlGroupingSelectExpression::KEY_NAME);
                Expr::SqlGroupingSelect(SqlGroupingSelectExpression {
                    key: Box::new(self.name_projection(*grouping.key, Some(key_name))),
                    ..grouping
                })
            }
            other => Expr::named(Some(name.unwrap_or_else(|| self.value_column_name.clone())), other),
        }
    }

    /// The named `projection` of a sub-statement as seen from the statement
    /// that uses it as table `table` aliased `alias`.
    pub(super) fn create_reference(&self, projection: &Expr, table: TableKey, alias: &str) -> Expr {
        match projection {
            Expr::Named(named) => match named.expression.as_ref() {
                inner @ (Expr::SqlEntity(_) | Expr::New(_) | Expr::SqlGroupingSelect(_)) => {
                    self.create_reference(inner, table, alias)
                }
                inner => Expr::SqlColumn(SqlColumnExpression::reference(
                    inner.ty(),
                    alias,
                    named
                        .name
                        .clone()
                        .unwrap_or_else(|| self.value_column_name.clone()),
                    false,
                )),
            },
            Expr::SqlEntity(entity) => Expr::SqlEntity(entity.create_reference(table, alias)),
            Expr::New(record) => Expr::New(NewExpression {
                ty: record.ty.clone(),
                members: record
                    .members
                    .iter()
                    .map(|(member, value)| (member.clone(), self.create_reference(value, table, alias)))
                    .collect(),
            }),
            // Aggregations are referenced by column once they are added, so
            // only the key is visible here. The element stays in the source
            // statement's terms for re-materialisation.
            Expr::SqlGroupingSelect(grouping) => Expr::SqlGroupingSelect(SqlGroupingSelectExpression {
                ty: grouping.ty.clone(),
                key: Box::new(self.create_reference(&grouping.key, table, alias)),
                element: grouping.element.clone(),
                aggregations: Vec::new(),
            }),
            other => Expr::SqlColumn(SqlColumnExpression::reference(
                other.ty(),
                alias,
                self.value_column_name.clone(),
                false,
            )),
        }
    }

    /// A statement used as an expression. Aggregates over a group become a
    /// column of the grouping statement; statements that are nothing but a
    /// projection are replaced by it.
    pub(super) fn resolve_sub_statement_expression(
        &self,
        statement: SqlStatement,
        context: &mut CompilationContext,
    ) -> ResolutionResult<Expr> {
        if let Some(aggregation) = self.try_simplify_group_aggregate(&statement, context)? {
            return Ok(aggregation);
        }
        let resolved = self.resolve_statement(statement, context)?;
        if resolved.is_projection_only() {
            return Ok(resolved.select_projection.into_unnamed());
        }
        Ok(Expr::SqlSubStatement(Box::new(resolved)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::expr::{EntityKind, SqlEntityExpression};
    use crate::types::DataType;

    fn cook_entity() -> SqlEntityExpression {
        SqlEntityExpression::new(
            DataType::entity("Cook"),
            TableKey::new(0),
            "t0",
            None,
            vec![
                SqlColumnExpression::definition(DataType::Int32, "t0", "ID", true),
                SqlColumnExpression::definition(DataType::String, "t0", "Name", false),
            ],
            EntityKind::Definition,
        )
        .unwrap()
    }

    fn name_column() -> Expr {
        Expr::SqlColumn(SqlColumnExpression::definition(DataType::String, "t0", "Name", false))
    }

    #[test]
    fn test_record_members_are_named_with_prefix() {
        let record = Expr::new_record(
            "Outer",
            vec![
                ("A".into(), name_column()),
                (
                    "B".into(),
                    Expr::new_record("Inner", vec![("C".into(), name_column())]),
                ),
            ],
        );
        let Expr::New(named) = stage().name_projection(record, None) else {
            panic!("expected record");
        };
        assert_eq!(named.members[0].1, Expr::named(Some("A".into()), name_column()));
        let Expr::New(inner) = &named.members[1].1 else {
            panic!("expected nested record");
        };
        assert_eq!(inner.members[0].1, Expr::named(Some("B_C".into()), name_column()));
    }

    #[test]
    fn test_reference_follows_names() {
        let stage = stage();
        let record = stage.name_projection(
            Expr::new_record(
                "Pair",
                vec![
                    ("Key".into(), Expr::SqlEntity(cook_entity())),
                    ("Value".into(), name_column()),
                ],
            ),
            None,
        );

        let Expr::New(reference) = stage.create_reference(&record, TableKey::new(3), "q2") else {
            panic!("expected record reference");
        };
        let Expr::SqlEntity(key) = &reference.members[0].1 else {
            panic!("expected entity reference");
        };
        assert_eq!(key.table, TableKey::new(3));
        assert_eq!(key.primary_key_column().column_name, "Key_ID");
        assert_eq!(
            reference.members[1].1,
            Expr::SqlColumn(SqlColumnExpression::reference(DataType::String, "q2", "Value", false))
        );
    }

    #[test]
    fn test_grouping_reference_exposes_key_column() {
        let stage = stage();
        let grouping = stage.name_projection(
            Expr::SqlGroupingSelect(SqlGroupingSelectExpression::new(
                name_column(),
                Expr::SqlEntity(cook_entity()),
            )),
            None,
        );
        let Expr::SqlGroupingSelect(reference) = stage.create_reference(&grouping, TableKey::new(1), "q1")
        else {
            panic!("expected grouping reference");
        };
        assert_eq!(
            *reference.key,
            Expr::SqlColumn(SqlColumnExpression::reference(DataType::String, "q1", "key", false))
        );
        assert_eq!(*reference.element, Expr::SqlEntity(cook_entity()));
    }
}
