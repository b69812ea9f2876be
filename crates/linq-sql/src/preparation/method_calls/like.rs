//! `String.Contains`, `StartsWith` and `EndsWith` as `LIKE`.

use super::{instance_parts, MethodCallTransformer, MethodCallTransformerRegistry};
use crate::error::PreparationResult;
use crate::expr::{Expr, MethodCallExpression, SqlLikeExpression};
use crate::types::{DataType, MethodSignature};
use once_cell::sync::Lazy;
use regex::Regex;

static LIKE_WILDCARD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[%_\[]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikePosition {
    Contains,
    StartsWith,
    EndsWith,
}

impl LikePosition {
    fn method_name(self) -> &'static str {
        match self {
            LikePosition::Contains => "Contains",
            LikePosition::StartsWith => "StartsWith",
            LikePosition::EndsWith => "EndsWith",
        }
    }

    fn leading_wildcard(self) -> bool {
        matches!(self, LikePosition::Contains | LikePosition::EndsWith)
    }

    fn trailing_wildcard(self) -> bool {
        matches!(self, LikePosition::Contains | LikePosition::StartsWith)
    }
}

/// Escape `%`, `_`, `[` and the escape character itself.
pub fn escape_like_pattern(pattern: &str, escape: char) -> String {
    let escaped_escape = pattern.replace(escape, &format!("{0}{0}", escape));
    LIKE_WILDCARD_RE
        .replace_all(&escaped_escape, |caps: &regex::Captures<'_>| {
            format!("{}{}", escape, &caps[0])
        })
        .into_owned()
}

pub struct LikeTransformer {
    pub position: LikePosition,
    pub escape: char,
}

impl LikeTransformer {
    fn wrap(&self, escaped: String) -> String {
        let mut pattern = String::with_capacity(escaped.len() + 2);
        if self.position.leading_wildcard() {
            pattern.push('%');
        }
        pattern.push_str(&escaped);
        if self.position.trailing_wildcard() {
            pattern.push('%');
        }
        pattern
    }

    /// Pattern built in SQL for values only known at execution time:
    /// nested `REPLACE` calls escape the wildcards before concatenation.
    fn escape_in_sql(&self, value: Expr) -> Expr {
        let escape = self.escape.to_string();
        let replacements = [
            escape.clone(),
            "%".to_string(),
            "_".to_string(),
            "[".to_string(),
        ];
        let escaped = replacements.into_iter().fold(value, |inner, special| {
            let replacement = format!("{}{}", escape, special);
            Expr::function(
                "REPLACE",
                DataType::String,
                vec![
                    inner,
                    Expr::literal_string(special),
                    Expr::literal_string(replacement),
                ],
            )
        });

        let mut pattern = escaped;
        if self.position.leading_wildcard() {
            pattern = Expr::add(Expr::literal_string("%"), pattern);
        }
        if self.position.trailing_wildcard() {
            pattern = Expr::add(pattern, Expr::literal_string("%"));
        }
        pattern
    }
}

impl MethodCallTransformer for LikeTransformer {
    fn transform(&self, call: MethodCallExpression) -> PreparationResult<Expr> {
        let (object, [argument]) = instance_parts::<1>(call)?;

        let pattern = match argument.as_constant().and_then(|c| c.value.as_str()) {
            Some(text) => Expr::string(self.wrap(escape_like_pattern(text, self.escape))),
            None => self.escape_in_sql(argument),
        };

        Ok(Expr::SqlLike(SqlLikeExpression {
            expression: Box::new(object),
            pattern: Box::new(pattern),
            escape: Box::new(Expr::literal_string(self.escape.to_string())),
        }))
    }
}

pub(super) fn register(registry: &mut MethodCallTransformerRegistry, escape: char) {
    for position in [
        LikePosition::Contains,
        LikePosition::StartsWith,
        LikePosition::EndsWith,
    ] {
        registry.register(
            MethodSignature::new("String", position.method_name(), [DataType::String]),
            LikeTransformer { position, escape },
        );
    }
}
