//! Structural traversal helpers.
//!
//! Sub-queries and sub-statements are leaves here; stages that need to
//! descend into them do so explicitly because nested statements carry their
//! own tables and scoping.

use super::*;
use crate::statement::Ordering;
use std::borrow::Cow;

fn map_box<E>(
    expr: Box<Expr>,
    f: &mut impl FnMut(Expr) -> Result<Expr, E>,
) -> Result<Box<Expr>, E> {
    Ok(Box::new(f(*expr)?))
}

fn map_orderings<E>(
    orderings: Vec<Ordering>,
    f: &mut impl FnMut(Expr) -> Result<Expr, E>,
) -> Result<Vec<Ordering>, E> {
    orderings
        .into_iter()
        .map(|o| {
            Ok(Ordering {
                expression: f(o.expression)?,
                direction: o.direction,
            })
        })
        .collect()
}

impl Expr {
    /// Rebuild the node with every direct child replaced by `f(child)`.
    pub fn try_map_children<E>(
        self,
        mut f: impl FnMut(Expr) -> Result<Expr, E>,
    ) -> Result<Expr, E> {
        let f = &mut f;
        Ok(match self {
            Expr::Constant(_)
            | Expr::Queryable(_)
            | Expr::QuerySourceReference { .. }
            | Expr::SubQuery(_)
            | Expr::SqlTableReference { .. }
            | Expr::SqlSubStatement(_)
            | Expr::SqlLiteral(_)
            | Expr::SqlEntityRefMember(_)
            | Expr::SqlEntity(_)
            | Expr::SqlColumn(_) => self,
            Expr::Member(m) => Expr::Member(MemberExpression {
                expression: map_box(m.expression, f)?,
                ..m
            }),
            Expr::MethodCall(call) => Expr::MethodCall(MethodCallExpression {
                object: call.object.map(|o| map_box(o, f)).transpose()?,
                arguments: call.arguments.into_iter().map(&mut *f).collect::<Result<_, _>>()?,
                method: call.method,
            }),
            Expr::Binary(b) => Expr::Binary(BinaryExpression {
                left: map_box(b.left, f)?,
                right: map_box(b.right, f)?,
                ..b
            }),
            Expr::Unary(u) => Expr::Unary(UnaryExpression {
                operand: map_box(u.operand, f)?,
                ..u
            }),
            Expr::Conditional(c) => Expr::Conditional(ConditionalExpression {
                test: map_box(c.test, f)?,
                if_true: map_box(c.if_true, f)?,
                if_false: map_box(c.if_false, f)?,
                ty: c.ty,
            }),
            Expr::New(n) => Expr::New(NewExpression {
                members: n
                    .members
                    .into_iter()
                    .map(|(name, e)| Ok((name, f(e)?)))
                    .collect::<Result<_, E>>()?,
                ty: n.ty,
            }),
            Expr::TypeIs(t) => Expr::TypeIs(TypeIsExpression {
                expression: map_box(t.expression, f)?,
                type_operand: t.type_operand,
            }),
            Expr::Named(n) => Expr::Named(NamedExpression {
                expression: map_box(n.expression, f)?,
                name: n.name,
            }),
            Expr::SqlFunction(func) => Expr::SqlFunction(SqlFunctionExpression {
                arguments: func.arguments.into_iter().map(&mut *f).collect::<Result<_, _>>()?,
                ..func
            }),
            Expr::SqlConvert(c) => Expr::SqlConvert(SqlConvertExpression {
                source: map_box(c.source, f)?,
                ty: c.ty,
            }),
            Expr::SqlCase(c) => Expr::SqlCase(SqlCaseExpression {
                test: map_box(c.test, f)?,
                then_value: map_box(c.then_value, f)?,
                else_value: map_box(c.else_value, f)?,
                ty: c.ty,
            }),
            Expr::SqlBinaryOperator(b) => Expr::SqlBinaryOperator(SqlBinaryOperatorExpression {
                left: map_box(b.left, f)?,
                right: map_box(b.right, f)?,
                ..b
            }),
            Expr::SqlIn(i) => Expr::SqlIn(SqlInExpression {
                left: map_box(i.left, f)?,
                right: map_box(i.right, f)?,
            }),
            Expr::SqlLike(l) => Expr::SqlLike(SqlLikeExpression {
                expression: map_box(l.expression, f)?,
                pattern: map_box(l.pattern, f)?,
                escape: map_box(l.escape, f)?,
            }),
            Expr::SqlIsNull(e) => Expr::SqlIsNull(map_box(e, f)?),
            Expr::SqlIsNotNull(e) => Expr::SqlIsNotNull(map_box(e, f)?),
            Expr::SqlExists(e) => Expr::SqlExists(map_box(e, f)?),
            Expr::SqlRowNumber(r) => Expr::SqlRowNumber(SqlRowNumberExpression {
                orderings: map_orderings(r.orderings, f)?,
            }),
            Expr::SqlAggregation(a) => Expr::SqlAggregation(SqlAggregationExpression {
                expression: a.expression.map(|e| map_box(e, f)).transpose()?,
                ..a
            }),
            Expr::SqlGroupingSelect(g) => Expr::SqlGroupingSelect(SqlGroupingSelectExpression {
                key: map_box(g.key, f)?,
                element: map_box(g.element, f)?,
                aggregations: g.aggregations.into_iter().map(&mut *f).collect::<Result<_, _>>()?,
                ty: g.ty,
            }),
            Expr::SqlEntityConstant(c) => Expr::SqlEntityConstant(SqlEntityConstantExpression {
                primary_key: map_box(c.primary_key, f)?,
                ..c
            }),
        })
    }

    /// Visit every direct child, in the same order `try_map_children` maps
    /// them.
    pub fn for_each_child<'a>(&'a self, mut f: impl FnMut(&'a Expr)) {
        match self {
            Expr::Constant(_)
            | Expr::Queryable(_)
            | Expr::QuerySourceReference { .. }
            | Expr::SubQuery(_)
            | Expr::SqlTableReference { .. }
            | Expr::SqlSubStatement(_)
            | Expr::SqlLiteral(_)
            | Expr::SqlEntityRefMember(_)
            | Expr::SqlEntity(_)
            | Expr::SqlColumn(_) => {}
            Expr::Member(m) => f(&m.expression),
            Expr::MethodCall(call) => {
                if let Some(object) = &call.object {
                    f(object);
                }
                call.arguments.iter().for_each(f);
            }
            Expr::Binary(b) => {
                f(&b.left);
                f(&b.right);
            }
            Expr::Unary(u) => f(&u.operand),
            Expr::Conditional(c) => {
                f(&c.test);
                f(&c.if_true);
                f(&c.if_false);
            }
            Expr::New(n) => n.members.iter().for_each(|(_, e)| f(e)),
            Expr::TypeIs(t) => f(&t.expression),
            Expr::Named(n) => f(&n.expression),
            Expr::SqlFunction(func) => func.arguments.iter().for_each(f),
            Expr::SqlConvert(c) => f(&c.source),
            Expr::SqlCase(c) => {
                f(&c.test);
                f(&c.then_value);
                f(&c.else_value);
            }
            Expr::SqlBinaryOperator(b) => {
                f(&b.left);
                f(&b.right);
            }
            Expr::SqlIn(i) => {
                f(&i.left);
                f(&i.right);
            }
            Expr::SqlLike(l) => {
                f(&l.expression);
                f(&l.pattern);
                f(&l.escape);
            }
            Expr::SqlIsNull(e) | Expr::SqlIsNotNull(e) | Expr::SqlExists(e) => f(e),
            Expr::SqlRowNumber(r) => r.orderings.iter().for_each(|o| f(&o.expression)),
            Expr::SqlAggregation(a) => {
                if let Some(e) = &a.expression {
                    f(e);
                }
            }
            Expr::SqlGroupingSelect(g) => {
                f(&g.key);
                f(&g.element);
                g.aggregations.iter().for_each(f);
            }
            Expr::SqlEntityConstant(c) => f(&c.primary_key),
        }
    }

    /// Like `try_map_children` over a borrowed node; returns the node itself
    /// (`Cow::Borrowed`) when `f` borrowed every child back.
    pub fn try_map_children_cow<'a, E>(
        &'a self,
        mut f: impl FnMut(&'a Expr) -> Result<Cow<'a, Expr>, E>,
    ) -> Result<Cow<'a, Expr>, E> {
        let mut mapped = Vec::new();
        let mut error = None;
        self.for_each_child(|child| {
            if error.is_some() {
                return;
            }
            match f(child) {
                Ok(result) => mapped.push(result),
                Err(err) => error = Some(err),
            }
        });
        if let Some(err) = error {
            return Err(err);
        }
        if mapped.iter().all(|c| matches!(c, Cow::Borrowed(_))) {
            return Ok(Cow::Borrowed(self));
        }

        let mut replacements = mapped.into_iter().map(Cow::into_owned);
        let rebuilt = self
            .clone()
            .try_map_children(|child| Ok::<_, E>(replacements.next().unwrap_or(child)))?;
        Ok(Cow::Owned(rebuilt))
    }

    /// True if `predicate` holds for this node or any descendant (not
    /// descending into sub-queries or sub-statements).
    pub fn any_node(&self, predicate: &impl Fn(&Expr) -> bool) -> bool {
        if predicate(self) {
            return true;
        }
        let mut found = false;
        self.for_each_child(|child| {
            if !found && child.any_node(predicate) {
                found = true;
            }
        });
        found
    }
}
