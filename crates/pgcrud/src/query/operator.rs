//! Operator catalog.

use crate::error::{CrudError, CrudResult};
use crate::value::FieldValue;

/// Comparison and match operators accepted in a [`QueryItem`](super::QueryItem).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    StartsWith,
    EndsWith,
    Contains,
    NotStartsWith,
    NotEndsWith,
    NotContains,
}

impl Operator {
    /// Parse an operator name, ignoring case and `-`/`_` separators.
    ///
    /// `includes` / `notIncludes` are accepted as aliases of
    /// `contains` / `notContains`.
    pub fn parse(name: &str) -> CrudResult<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        let op = match normalized.as_str() {
            "eq" => Operator::Eq,
            "ne" | "neq" => Operator::Ne,
            "lt" => Operator::Lt,
            "lte" => Operator::Lte,
            "gt" => Operator::Gt,
            "gte" => Operator::Gte,
            "in" => Operator::In,
            "notin" | "nin" => Operator::NotIn,
            "startswith" => Operator::StartsWith,
            "endswith" => Operator::EndsWith,
            "contains" | "includes" => Operator::Contains,
            "notstartswith" => Operator::NotStartsWith,
            "notendswith" => Operator::NotEndsWith,
            "notcontains" | "notincludes" => Operator::NotContains,
            _ => return Err(CrudError::UnknownOperator(name.to_string())),
        };
        Ok(op)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::In => "in",
            Operator::NotIn => "notIn",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
            Operator::Contains => "contains",
            Operator::NotStartsWith => "notStartsWith",
            Operator::NotEndsWith => "notEndsWith",
            Operator::NotContains => "notContains",
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(
            self,
            Operator::StartsWith
                | Operator::EndsWith
                | Operator::Contains
                | Operator::NotStartsWith
                | Operator::NotEndsWith
                | Operator::NotContains
        )
    }

    /// Whether this operator can be compiled against `value`.
    pub fn accepts(&self, value: &FieldValue) -> bool {
        use FieldValue as V;
        match self {
            Operator::Eq | Operator::Ne => matches!(
                value,
                V::String(_) | V::Bool(_) | V::Integer(_) | V::Float(_) | V::Timestamp(_)
            ),
            Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => {
                matches!(value, V::Integer(_) | V::Float(_) | V::Timestamp(_))
            }
            Operator::In | Operator::NotIn => {
                matches!(value, V::StringArray(_) | V::NumericArray(_))
            }
            _ => matches!(value, V::String(_)),
        }
    }

    /// SQL comparison symbol for the comparison operators.
    pub(crate) fn comparison_symbol(&self) -> Option<&'static str> {
        match self {
            Operator::Eq => Some("="),
            Operator::Ne => Some("<>"),
            Operator::Lt => Some("<"),
            Operator::Lte => Some("<="),
            Operator::Gt => Some(">"),
            Operator::Gte => Some(">="),
            _ => None,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean link between consecutive items or groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkOp {
    #[default]
    And,
    Or,
}

impl LinkOp {
    /// Parse a link operator; anything other than `and`/`or` is `And`.
    pub fn parse_or_default(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("or") {
            LinkOp::Or
        } else {
            LinkOp::And
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            LinkOp::And => "AND",
            LinkOp::Or => "OR",
        }
    }
}
