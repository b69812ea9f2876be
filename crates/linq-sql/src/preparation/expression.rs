//! Expression visitor of the preparation stage.

use super::{PreparationScope, SqlPreparationStage};
use crate::context::CompilationContext;
use crate::error::{PreparationError, PreparationResult};
use crate::expr::{
    BinaryExpression, BinaryOp, Expr, MethodCallExpression, MethodInfo, SqlCaseExpression,
    SqlInExpression,
};
use crate::query_model::{QueryModel, ResultOperator};
use crate::types::{DataType, MethodSignature};

impl SqlPreparationStage {
    /// Rewrite a host expression into its SQL-ready form: range variables
    /// become table references, method calls go through the transformer
    /// registry, sub-queries become sub-statements.
    pub fn prepare_expression(
        &self,
        expression: &Expr,
        context: &mut CompilationContext,
        scope: &PreparationScope<'_>,
    ) -> PreparationResult<Expr> {
        match expression {
            Expr::QuerySourceReference { source, .. } => scope.get(*source).cloned().ok_or_else(|| {
                PreparationError::UnknownQuerySource {
                    query_source: source.to_string(),
                }
            }),
            Expr::SubQuery(model) => self.prepare_sub_query(model, context, scope),
            Expr::Binary(binary) => self.prepare_binary(binary, context, scope),
            Expr::Conditional(conditional) => {
                let test = self.prepare_expression(&conditional.test, context, scope)?;
                let if_true = self.prepare_expression(&conditional.if_true, context, scope)?;
                let if_false = self.prepare_expression(&conditional.if_false, context, scope)?;
                Ok(Expr::SqlCase(SqlCaseExpression::new(test, if_true, if_false)?))
            }
            Expr::MethodCall(call) => {
                let object = call
                    .object
                    .as_deref()
                    .map(|o| self.prepare_expression(o, context, scope))
                    .transpose()?;
                let arguments = call
                    .arguments
                    .iter()
                    .map(|a| self.prepare_expression(a, context, scope))
                    .collect::<PreparationResult<Vec<_>>>()?;
                self.prepare_method_call(MethodCallExpression {
                    object: object.map(Box::new),
                    method: call.method.clone(),
                    arguments,
                })
            }
            Expr::Member(member) => {
                let inner = self.prepare_expression(&member.expression, context, scope)?;
                let declaring_type = inner.ty().underlying().to_string();
                let signature = MethodSignature::property(declaring_type.clone(), member.member.clone());
                match self.method_call_transformers.get(&signature) {
                    Some(transformer) => transformer.transform(MethodCallExpression {
                        object: Some(Box::new(inner)),
                        method: MethodInfo::instance(
                            declaring_type,
                            member.member.clone(),
                            [],
                            member.ty.clone(),
                        ),
                        arguments: Vec::new(),
                    }),
                    None => Ok(Expr::member(inner, member.member.clone(), member.ty.clone())),
                }
            }
            other => other
                .clone()
                .try_map_children(|child| self.prepare_expression(&child, context, scope)),
        }
    }

    fn prepare_binary(
        &self,
        binary: &BinaryExpression,
        context: &mut CompilationContext,
        scope: &PreparationScope<'_>,
    ) -> PreparationResult<Expr> {
        let left = self.prepare_expression(&binary.left, context, scope)?;
        let right = self.prepare_expression(&binary.right, context, scope)?;

        match binary.op {
            BinaryOp::Coalesce => Ok(Expr::function("COALESCE", binary.ty.clone(), vec![left, right])),
            BinaryOp::Equal | BinaryOp::NotEqual => {
                let equal = binary.op == BinaryOp::Equal;
                if let Some(operand) = null_comparison_operand(&left, &right) {
                    let operand = Box::new(operand.clone());
                    return Ok(if equal {
                        Expr::SqlIsNull(operand)
                    } else {
                        Expr::SqlIsNotNull(operand)
                    });
                }
                if let Some((operand, value)) = boolean_literal_comparison(&left, &right) {
                    // x == true -> x, x == false -> !x, and the reverse for !=
                    let operand = operand.clone();
                    return Ok(if value == equal {
                        operand
                    } else {
                        Expr::not(operand)
                    });
                }
                Ok(Expr::binary(binary.op, left, right))
            }
            BinaryOp::And if left.ty().is_boolean() => Ok(Expr::and_also(left, right)),
            BinaryOp::Or if left.ty().is_boolean() => Ok(Expr::or_else(left, right)),
            op => Ok(Expr::Binary(BinaryExpression {
                op,
                left: Box::new(left),
                right: Box::new(right),
                ty: binary.ty.clone(),
            })),
        }
    }

    fn prepare_method_call(&self, call: MethodCallExpression) -> PreparationResult<Expr> {
        let signature = call.method.signature();
        if let Some(transformer) = self.method_call_transformers.get(&signature) {
            return transformer.transform(call);
        }
        if self.sql_generators.contains(&signature) {
            return Ok(Expr::MethodCall(call));
        }
        Err(PreparationError::UnsupportedMethod {
            declaring_type: call.method.declaring_type,
            name: call.method.name,
        })
    }

    fn prepare_sub_query(
        &self,
        model: &QueryModel,
        context: &mut CompilationContext,
        scope: &PreparationScope<'_>,
    ) -> PreparationResult<Expr> {
        if let Some((collection, item)) = constant_collection_contains(model) {
            let item = self.prepare_expression(item, context, scope)?;
            return Ok(Expr::SqlIn(SqlInExpression {
                left: Box::new(item),
                right: Box::new(collection.clone()),
            }));
        }
        let statement = self.prepare_query_model(model, context, scope)?;
        Ok(Expr::SqlSubStatement(Box::new(statement)))
    }
}

fn null_comparison_operand<'a>(left: &'a Expr, right: &'a Expr) -> Option<&'a Expr> {
    if right.is_null_constant() {
        Some(left)
    } else if left.is_null_constant() {
        Some(right)
    } else {
        None
    }
}

fn boolean_literal(expr: &Expr) -> Option<bool> {
    expr.as_constant()
        .filter(|c| c.ty == DataType::Boolean)
        .and_then(|c| c.value.as_bool())
}

fn boolean_literal_comparison<'a>(left: &'a Expr, right: &'a Expr) -> Option<(&'a Expr, bool)> {
    match (boolean_literal(left), boolean_literal(right)) {
        (_, Some(value)) if left.ty().is_boolean() => Some((left, value)),
        (Some(value), _) if right.ty().is_boolean() => Some((right, value)),
        _ => None,
    }
}

/// `constants.Contains(x)` over an in-memory collection: `x IN (...)`.
fn constant_collection_contains(model: &QueryModel) -> Option<(&Expr, &Expr)> {
    let [ResultOperator::Contains(item)] = model.result_operators.as_slice() else {
        return None;
    };
    let collection = &model.main_from_clause.from_expression;
    let is_constant_collection = collection
        .as_constant()
        .is_some_and(|c| c.value.is_array());
    let selects_item = model.selector == model.main_from_clause.reference();
    (is_constant_collection && selects_item && model.body_clauses.is_empty())
        .then_some((collection, item))
}
