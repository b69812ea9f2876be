//! Provider-agnostic query model consumed by the pipeline.
//!
//! A [`QueryModel`] is what a LINQ-style front end produces: a main from
//! clause, body clauses, a select clause and an ordered list of result
//! operators. Range variables are identified by [`SourceId`]; expressions
//! refer to them through [`Expr::QuerySourceReference`].

use crate::expr::Expr;
use crate::statement::OrderingDirection;
use crate::types::DataType;
use std::fmt;

/// Identity of a range variable (`c` in `from c in Cooks`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// `from <item_name> in <from_expression>`
#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub id: SourceId,
    pub item_name: String,
    pub item_type: DataType,
    pub from_expression: Expr,
}

impl FromClause {
    pub fn new(
        id: SourceId,
        item_name: impl Into<String>,
        item_type: DataType,
        from_expression: Expr,
    ) -> Self {
        Self {
            id,
            item_name: item_name.into(),
            item_type,
            from_expression,
        }
    }

    /// Reference to this clause's range variable.
    pub fn reference(&self) -> Expr {
        Expr::source(self.id, self.item_type.clone())
    }
}

/// `join <item> in <inner_sequence> on <outer_key> equals <inner_key>`
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub id: SourceId,
    pub item_name: String,
    pub item_type: DataType,
    pub inner_sequence: Expr,
    pub outer_key_selector: Expr,
    pub inner_key_selector: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOrdering {
    pub expression: Expr,
    pub direction: OrderingDirection,
}

impl QueryOrdering {
    pub fn asc(expression: Expr) -> Self {
        Self {
            expression,
            direction: OrderingDirection::Asc,
        }
    }

    pub fn desc(expression: Expr) -> Self {
        Self {
            expression,
            direction: OrderingDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyClause {
    AdditionalFrom(FromClause),
    Where(Expr),
    OrderBy(Vec<QueryOrdering>),
    Join(JoinClause),
}

/// A lambda applied to the current item, e.g. the key selector of `GroupBy`.
/// `body` refers to the item through `parameter`.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub parameter: SourceId,
    pub body: Expr,
}

impl Selector {
    pub fn new(parameter: SourceId, body: Expr) -> Self {
        Self { parameter, body }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultOperator {
    Take(Expr),
    Skip(Expr),
    First { or_default: bool },
    Single { or_default: bool },
    Last { or_default: bool },
    Distinct,
    Count,
    LongCount,
    Sum,
    Min,
    Max,
    Average,
    Contains(Expr),
    Any,
    All(Selector),
    DefaultIfEmpty,
    Cast(DataType),
    OfType(DataType),
    GroupBy { key: Selector, element: Selector },
    Reverse,
    Union(Expr),
    Intersect(Expr),
    Except(Expr),
}

/// Tag of a [`ResultOperator`], used to key handler registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultOperatorKind {
    Take,
    Skip,
    First,
    Single,
    Last,
    Distinct,
    Count,
    LongCount,
    Sum,
    Min,
    Max,
    Average,
    Contains,
    Any,
    All,
    DefaultIfEmpty,
    Cast,
    OfType,
    GroupBy,
    Reverse,
    Union,
    Intersect,
    Except,
}

impl ResultOperatorKind {
    pub fn name(self) -> &'static str {
        match self {
            ResultOperatorKind::Take => "Take",
            ResultOperatorKind::Skip => "Skip",
            ResultOperatorKind::First => "First",
            ResultOperatorKind::Single => "Single",
            ResultOperatorKind::Last => "Last",
            ResultOperatorKind::Distinct => "Distinct",
            ResultOperatorKind::Count => "Count",
            ResultOperatorKind::LongCount => "LongCount",
            ResultOperatorKind::Sum => "Sum",
            ResultOperatorKind::Min => "Min",
            ResultOperatorKind::Max => "Max",
            ResultOperatorKind::Average => "Average",
            ResultOperatorKind::Contains => "Contains",
            ResultOperatorKind::Any => "Any",
            ResultOperatorKind::All => "All",
            ResultOperatorKind::DefaultIfEmpty => "DefaultIfEmpty",
            ResultOperatorKind::Cast => "Cast",
            ResultOperatorKind::OfType => "OfType",
            ResultOperatorKind::GroupBy => "GroupBy",
            ResultOperatorKind::Reverse => "Reverse",
            ResultOperatorKind::Union => "Union",
            ResultOperatorKind::Intersect => "Intersect",
            ResultOperatorKind::Except => "Except",
        }
    }
}

impl fmt::Display for ResultOperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ResultOperator {
    pub fn kind(&self) -> ResultOperatorKind {
        match self {
            ResultOperator::Take(_) => ResultOperatorKind::Take,
            ResultOperator::Skip(_) => ResultOperatorKind::Skip,
            ResultOperator::First { .. } => ResultOperatorKind::First,
            ResultOperator::Single { .. } => ResultOperatorKind::Single,
            ResultOperator::Last { .. } => ResultOperatorKind::Last,
            ResultOperator::Distinct => ResultOperatorKind::Distinct,
            ResultOperator::Count => ResultOperatorKind::Count,
            ResultOperator::LongCount => ResultOperatorKind::LongCount,
            ResultOperator::Sum => ResultOperatorKind::Sum,
            ResultOperator::Min => ResultOperatorKind::Min,
            ResultOperator::Max => ResultOperatorKind::Max,
            ResultOperator::Average => ResultOperatorKind::Average,
            ResultOperator::Contains(_) => ResultOperatorKind::Contains,
            ResultOperator::Any => ResultOperatorKind::Any,
            ResultOperator::All(_) => ResultOperatorKind::All,
            ResultOperator::DefaultIfEmpty => ResultOperatorKind::DefaultIfEmpty,
            ResultOperator::Cast(_) => ResultOperatorKind::Cast,
            ResultOperator::OfType(_) => ResultOperatorKind::OfType,
            ResultOperator::GroupBy { .. } => ResultOperatorKind::GroupBy,
            ResultOperator::Reverse => ResultOperatorKind::Reverse,
            ResultOperator::Union(_) => ResultOperatorKind::Union,
            ResultOperator::Intersect(_) => ResultOperatorKind::Intersect,
            ResultOperator::Except(_) => ResultOperatorKind::Except,
        }
    }

    /// Type produced by applying the operator to a sequence of `item`s.
    fn result_type(&self, input: DataType) -> DataType {
        let item = input.item_type().cloned().unwrap_or_else(|| input.clone());
        match self {
            ResultOperator::First { or_default }
            | ResultOperator::Single { or_default }
            | ResultOperator::Last { or_default } => {
                if *or_default && !item.is_entity() && !item.is_string() {
                    DataType::nullable(item)
                } else {
                    item
                }
            }
            ResultOperator::Count => DataType::Int32,
            ResultOperator::LongCount => DataType::Int64,
            ResultOperator::Sum | ResultOperator::Min | ResultOperator::Max => item,
            ResultOperator::Average => match item.underlying() {
                DataType::Decimal | DataType::Single => item,
                _ if item.is_nullable() => DataType::nullable(DataType::Double),
                _ => DataType::Double,
            },
            ResultOperator::Contains(_) | ResultOperator::Any | ResultOperator::All(_) => {
                DataType::Boolean
            }
            ResultOperator::Cast(ty) | ResultOperator::OfType(ty) => DataType::sequence(ty.clone()),
            ResultOperator::GroupBy { key, element } => DataType::sequence(DataType::grouping(
                key.body.ty(),
                element.body.ty(),
            )),
            ResultOperator::Take(_)
            | ResultOperator::Skip(_)
            | ResultOperator::Distinct
            | ResultOperator::DefaultIfEmpty
            | ResultOperator::Reverse
            | ResultOperator::Union(_)
            | ResultOperator::Intersect(_)
            | ResultOperator::Except(_) => input,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryModel {
    pub main_from_clause: FromClause,
    pub body_clauses: Vec<BodyClause>,
    pub selector: Expr,
    pub result_operators: Vec<ResultOperator>,
}

impl QueryModel {
    /// `from <item> in <source> select <item>`
    pub fn from(main_from_clause: FromClause) -> Self {
        let selector = main_from_clause.reference();
        Self {
            main_from_clause,
            body_clauses: Vec::new(),
            selector,
            result_operators: Vec::new(),
        }
    }

    pub fn with_body_clause(mut self, clause: BodyClause) -> Self {
        self.body_clauses.push(clause);
        self
    }

    pub fn with_where(self, predicate: Expr) -> Self {
        self.with_body_clause(BodyClause::Where(predicate))
    }

    pub fn with_order_by(self, orderings: Vec<QueryOrdering>) -> Self {
        self.with_body_clause(BodyClause::OrderBy(orderings))
    }

    pub fn with_select(mut self, selector: Expr) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_result_operator(mut self, operator: ResultOperator) -> Self {
        self.result_operators.push(operator);
        self
    }

    /// Type the whole query evaluates to.
    pub fn result_type(&self) -> DataType {
        self.result_operators
            .iter()
            .fold(DataType::sequence(self.selector.ty()), |ty, op| {
                op.result_type(ty)
            })
    }

    /// True when the query yields a sequence rather than a single value.
    pub fn returns_sequence(&self) -> bool {
        self.result_type().is_sequence()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cooks() -> FromClause {
        FromClause::new(
            SourceId(0),
            "c",
            DataType::entity("Cook"),
            Expr::queryable(DataType::entity("Cook")),
        )
    }

    #[test]
    fn test_result_type_follows_operators() {
        let model = QueryModel::from(cooks());
        assert_eq!(
            model.result_type(),
            DataType::sequence(DataType::entity("Cook"))
        );

        let counted = model.clone().with_result_operator(ResultOperator::Count);
        assert_eq!(counted.result_type(), DataType::Int32);

        let first = model
            .with_result_operator(ResultOperator::Take(Expr::int(3)))
            .with_result_operator(ResultOperator::First { or_default: false });
        assert_eq!(first.result_type(), DataType::entity("Cook"));
        assert!(!first.returns_sequence());
    }

    #[test]
    fn test_average_of_integers_is_double() {
        let c = cooks();
        let model = QueryModel::from(c.clone())
            .with_select(Expr::member(c.reference(), "Age", DataType::Int32))
            .with_result_operator(ResultOperator::Average);
        assert_eq!(model.result_type(), DataType::Double);
    }

    #[test]
    fn test_group_by_yields_groupings() {
        let c = cooks();
        let key = Selector::new(
            SourceId(1),
            Expr::member(
                Expr::source(SourceId(1), DataType::entity("Cook")),
                "Name",
                DataType::String,
            ),
        );
        let element = Selector::new(SourceId(2), Expr::source(SourceId(2), DataType::entity("Cook")));
        let model = QueryModel::from(c).with_result_operator(ResultOperator::GroupBy { key, element });
        assert_eq!(
            model.result_type(),
            DataType::sequence(DataType::grouping(DataType::String, DataType::entity("Cook")))
        );
    }

    #[test]
    fn test_operator_kind_names() {
        assert_eq!(ResultOperator::DefaultIfEmpty.kind().to_string(), "DefaultIfEmpty");
        assert_eq!(
            ResultOperator::Single { or_default: true }.kind(),
            ResultOperatorKind::Single
        );
    }
}
