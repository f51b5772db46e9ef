// Expression evaluation over tuples
//
// The planner (external to this crate) hands executors fully-resolved
// expressions: columns are positional, never named.

use thiserror::Error;

use crate::storage::tuple::{Datum, Tuple};

#[derive(Error, Debug)]
pub enum ExpressionError {
    #[error("Column index {0} out of range")]
    ColumnOutOfRange(usize),

    #[error("Aggregate reference used outside aggregation")]
    AggregateOutsideAggregation,

    #[error("Type error: {0}")]
    TypeError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Datum),
    /// Positional reference into the input tuple
    Column(usize),
    Compare {
        op: CompareOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    /// Reference to a group-by term (aggregation context only)
    GroupByRef(usize),
    /// Reference to an aggregate result (aggregation context only)
    AggregateRef(usize),
}

impl Expression {
    pub fn column(idx: usize) -> Expression {
        Expression::Column(idx)
    }

    pub fn literal(value: Datum) -> Expression {
        Expression::Literal(value)
    }

    pub fn compare(op: CompareOp, left: Expression, right: Expression) -> Expression {
        Expression::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Evaluate against a tuple
    pub fn evaluate(&self, tuple: &Tuple) -> Result<Datum, ExpressionError> {
        match self {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Column(idx) => tuple
                .value(*idx)
                .cloned()
                .ok_or(ExpressionError::ColumnOutOfRange(*idx)),
            Expression::Compare { op, left, right } => {
                let l = left.evaluate(tuple)?;
                let r = right.evaluate(tuple)?;
                Ok(Datum::Bool(compare(*op, &l, &r)))
            }
            Expression::And(left, right) => Ok(Datum::Bool(
                left.evaluate(tuple)?.is_true() && right.evaluate(tuple)?.is_true(),
            )),
            Expression::Or(left, right) => Ok(Datum::Bool(
                left.evaluate(tuple)?.is_true() || right.evaluate(tuple)?.is_true(),
            )),
            Expression::GroupByRef(_) | Expression::AggregateRef(_) => {
                Err(ExpressionError::AggregateOutsideAggregation)
            }
        }
    }

    /// Evaluate in aggregation context, where group-by terms and
    /// aggregate results stand in for columns (used by HAVING)
    pub fn evaluate_aggregate(
        &self,
        group_bys: &[Datum],
        aggregates: &[Datum],
    ) -> Result<Datum, ExpressionError> {
        match self {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::GroupByRef(idx) => group_bys
                .get(*idx)
                .cloned()
                .ok_or(ExpressionError::ColumnOutOfRange(*idx)),
            Expression::AggregateRef(idx) => aggregates
                .get(*idx)
                .cloned()
                .ok_or(ExpressionError::ColumnOutOfRange(*idx)),
            Expression::Compare { op, left, right } => {
                let l = left.evaluate_aggregate(group_bys, aggregates)?;
                let r = right.evaluate_aggregate(group_bys, aggregates)?;
                Ok(Datum::Bool(compare(*op, &l, &r)))
            }
            Expression::And(left, right) => Ok(Datum::Bool(
                left.evaluate_aggregate(group_bys, aggregates)?.is_true()
                    && right.evaluate_aggregate(group_bys, aggregates)?.is_true(),
            )),
            Expression::Or(left, right) => Ok(Datum::Bool(
                left.evaluate_aggregate(group_bys, aggregates)?.is_true()
                    || right.evaluate_aggregate(group_bys, aggregates)?.is_true(),
            )),
            Expression::Column(idx) => Err(ExpressionError::ColumnOutOfRange(*idx)),
        }
    }
}

fn compare(op: CompareOp, left: &Datum, right: &Datum) -> bool {
    match op {
        CompareOp::Eq => left == right,
        CompareOp::Ne => left != right,
        // Null comparisons are never true
        CompareOp::Lt => matches!(left.partial_cmp(right), Some(std::cmp::Ordering::Less)),
        CompareOp::Le => matches!(
            left.partial_cmp(right),
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        ),
        CompareOp::Gt => matches!(left.partial_cmp(right), Some(std::cmp::Ordering::Greater)),
        CompareOp::Ge => matches!(
            left.partial_cmp(right),
            Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_and_compare() {
        let tuple = Tuple::new(vec![Datum::Int(5), Datum::Str("x".into())]);
        let expr = Expression::compare(
            CompareOp::Gt,
            Expression::column(0),
            Expression::literal(Datum::Int(3)),
        );
        assert_eq!(expr.evaluate(&tuple).unwrap(), Datum::Bool(true));
    }

    #[test]
    fn test_null_comparison_is_false() {
        let tuple = Tuple::new(vec![Datum::Null]);
        let expr = Expression::compare(
            CompareOp::Lt,
            Expression::column(0),
            Expression::literal(Datum::Int(3)),
        );
        assert_eq!(expr.evaluate(&tuple).unwrap(), Datum::Bool(false));
    }

    #[test]
    fn test_having_style_evaluation() {
        let expr = Expression::compare(
            CompareOp::Gt,
            Expression::AggregateRef(0),
            Expression::literal(Datum::Int(15)),
        );
        let result = expr
            .evaluate_aggregate(&[Datum::Int(1)], &[Datum::Int(30)])
            .unwrap();
        assert_eq!(result, Datum::Bool(true));
    }
}
