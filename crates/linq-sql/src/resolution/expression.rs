//! Expression resolution: table references, member access and entity
//! identity.

use super::MappingResolutionStage;
use crate::context::CompilationContext;
use crate::error::{ResolutionError, ResolutionResult};
use crate::expr::{
    BinaryExpression, BinaryOp, Expr, SqlEntityExpression, SqlEntityRefMemberExpression,
    SqlInExpression, UnaryExpression, UnaryOp,
};
use crate::statement::{
    Cardinality, JoinInfo, JoinSemantics, SqlTable, TableInfo, TableKey, UnresolvedJoinInfo,
};
use crate::types::DataType;
use tracing::trace;

/// Member of a grouping that yields its key.
const GROUP_KEY_MEMBER: &str = "Key";

impl MappingResolutionStage {
    pub fn resolve_expression(
        &self,
        expression: Expr,
        context: &mut CompilationContext,
    ) -> ResolutionResult<Expr> {
        match expression {
            Expr::SqlTableReference { table, .. } => self.resolve_table_reference(table, context),
            Expr::Member(member) => {
                let inner = self.resolve_expression(*member.expression, context)?;
                self.resolve_member(inner, &member.member, &member.ty, context)
            }
            Expr::Constant(constant) => Ok(self.resolver.resolve_constant_expression(&constant)?),
            Expr::TypeIs(type_is) => {
                let inner = self.resolve_expression(*type_is.expression, context)?;
                Ok(self
                    .resolver
                    .resolve_type_check(inner.unwrap_named(), &type_is.type_operand)?)
            }
            Expr::Unary(unary) if unary.op == UnaryOp::Convert => {
                match self.resolve_expression(*unary.operand, context)?.into_unnamed() {
                    Expr::SqlEntity(entity) if unary.ty.is_entity() => {
                        Ok(Expr::SqlEntity(entity.with_type(unary.ty)))
                    }
                    operand => Ok(Expr::Unary(UnaryExpression {
                        op: unary.op,
                        operand: Box::new(operand),
                        ty: unary.ty,
                    })),
                }
            }
            Expr::Binary(binary) if matches!(binary.op, BinaryOp::Equal | BinaryOp::NotEqual) => {
                let left = identity_key(self.resolve_expression(*binary.left, context)?);
                let right = identity_key(self.resolve_expression(*binary.right, context)?);
                Ok(Expr::Binary(BinaryExpression {
                    op: binary.op,
                    left: Box::new(left),
                    right: Box::new(right),
                    ty: binary.ty,
                }))
            }
            Expr::SqlIsNull(operand) => Ok(Expr::SqlIsNull(Box::new(identity_key(
                self.resolve_expression(*operand, context)?,
            )))),
            Expr::SqlIsNotNull(operand) => Ok(Expr::SqlIsNotNull(Box::new(identity_key(
                self.resolve_expression(*operand, context)?,
            )))),
            Expr::SqlIn(sql_in) => {
                let left = identity_key(self.resolve_expression(*sql_in.left, context)?);
                let right = match self.resolve_expression(*sql_in.right, context)? {
                    Expr::SqlSubStatement(mut statement) => {
                        statement.select_projection = identity_key(statement.select_projection);
                        Expr::SqlSubStatement(statement)
                    }
                    other => other,
                };
                Ok(Expr::SqlIn(SqlInExpression {
                    left: Box::new(left),
                    right: Box::new(right),
                }))
            }
            Expr::SqlSubStatement(statement) => self.resolve_sub_statement_expression(*statement, context),
            other => other.try_map_children(|child| self.resolve_expression(child, context)),
        }
    }

    fn resolve_table_reference(
        &self,
        table: TableKey,
        context: &mut CompilationContext,
    ) -> ResolutionResult<Expr> {
        match &context.tables.get(table).info {
            TableInfo::ResolvedSimple(info) => Ok(Expr::SqlEntity(
                self.resolver.resolve_simple_table_info(info, table)?,
            )),
            TableInfo::Joined(JoinInfo::Resolved(join)) => Ok(Expr::SqlEntity(
                self.resolver
                    .resolve_simple_table_info(&join.foreign_table_info, table)?,
            )),
            TableInfo::SubStatement(info) => Ok(self.create_reference(
                &info.statement.select_projection,
                table,
                &info.table_alias,
            )),
            TableInfo::ResolvedGroupReference { element, .. } => Ok(element.clone()),
            other => Err(ResolutionError::UnsupportedExpression(format!(
                "reference to an unresolved table of {}",
                other.item_type()
            ))),
        }
    }

    fn resolve_member(
        &self,
        inner: Expr,
        member: &str,
        ty: &DataType,
        context: &mut CompilationContext,
    ) -> ResolutionResult<Expr> {
        match inner {
            Expr::Named(named) => self.resolve_member(*named.expression, member, ty, context),
            Expr::SqlEntity(entity) => match self.resolver.resolve_member_expression(&entity, member)? {
                Expr::SqlEntityRefMember(reference) if !reference.ty.is_sequence() => {
                    Ok(Expr::SqlEntity(self.join_entity(&reference, context)?))
                }
                resolved => Ok(resolved),
            },
            Expr::SqlEntityConstant(constant) => match constant.value.get(member) {
                Some(value) => Ok(Expr::constant(value.clone(), ty.clone())),
                None => Err(unresolvable(member, constant.ty)),
            },
            Expr::New(record) => record
                .member(member)
                .cloned()
                .ok_or_else(|| unresolvable(member, record.ty.clone())),
            Expr::SqlGroupingSelect(grouping) if member == GROUP_KEY_MEMBER => {
                Ok(grouping.key.into_unnamed())
            }
            other if other.ty().is_nullable() && member == "HasValue" => {
                Ok(Expr::SqlIsNotNull(Box::new(other)))
            }
            other if other.ty().is_nullable() && member == "Value" => {
                Ok(Expr::convert(other, ty.clone()))
            }
            other => Err(unresolvable(member, other.ty())),
        }
    }

    /// The entity on the other side of a single-valued relation. The join
    /// is registered on the originating entity's table, once per member.
    fn join_entity(
        &self,
        reference: &SqlEntityRefMemberExpression,
        context: &mut CompilationContext,
    ) -> ResolutionResult<SqlEntityExpression> {
        let origin = reference.entity.table;
        let joined = match context.tables.get(origin).joins.get(&reference.member) {
            Some(existing) => existing,
            None => {
                let info = self.resolver.resolve_join_info(
                    &UnresolvedJoinInfo {
                        originating_entity: reference.entity.clone(),
                        member: reference.member.clone(),
                        cardinality: Cardinality::One,
                        item_type: reference.ty.clone(),
                    },
                    &mut context.generator,
                )?;
                trace!(
                    member = %reference.member,
                    alias = %info.foreign_table_info.table_alias,
                    "added member join"
                );
                context.tables.get_or_add_join(origin, &reference.member, || {
                    SqlTable::new(TableInfo::Joined(JoinInfo::Resolved(info)), JoinSemantics::Left)
                })
            }
        };

        match &context.tables.get(joined).info {
            TableInfo::Joined(JoinInfo::Resolved(join)) => Ok(self
                .resolver
                .resolve_simple_table_info(&join.foreign_table_info, joined)?),
            other => Err(ResolutionError::UnsupportedExpression(format!(
                "join '{}' to {} is not resolved",
                reference.member,
                other.item_type()
            ))),
        }
    }
}

fn unresolvable(member: &str, on_type: DataType) -> ResolutionError {
    ResolutionError::UnresolvableMember {
        member: member.to_string(),
        on_type,
    }
}

/// Entities compare, test for null and take part in `IN` through their
/// primary key.
pub(super) fn identity_key(expression: Expr) -> Expr {
    match expression.into_unnamed() {
        Expr::SqlEntity(entity) => Expr::SqlColumn(entity.primary_key_column().clone()),
        Expr::SqlEntityConstant(constant) => *constant.primary_key,
        other => other,
    }
}
