// Hash aggregation
//
// The child is drained eagerly in init; groups accumulate in an
// insertion-ordered hash table so emission order tracks first appearance.

use std::collections::VecDeque;

use linked_hash_map::LinkedHashMap;

use crate::common::types::Rid;
use crate::query::executor::{BoxedExecutor, ExecResult, Executor};
use crate::query::plan::{AggregateType, AggregationPlan};
use crate::storage::tuple::{Datum, Tuple};

/// Running state for one aggregate of one group
#[derive(Debug, Clone)]
struct Accumulator {
    agg_type: AggregateType,
    count: i64,
    value: Datum,
}

impl Accumulator {
    fn new(agg_type: AggregateType) -> Self {
        Self {
            agg_type,
            count: 0,
            value: Datum::Null,
        }
    }

    fn update(&mut self, input: &Datum) {
        // NULL never contributes, per the SQL convention
        if input.is_null() {
            return;
        }
        match self.agg_type {
            AggregateType::Count => self.count += 1,
            AggregateType::Sum => {
                self.value = match (&self.value, input) {
                    (Datum::Null, v) => v.clone(),
                    (Datum::Int(a), Datum::Int(b)) => Datum::Int(a + b),
                    (Datum::Double(a), Datum::Double(b)) => Datum::Double(a + b),
                    (Datum::Int(a), Datum::Double(b)) => Datum::Double(*a as f64 + b),
                    (Datum::Double(a), Datum::Int(b)) => Datum::Double(a + *b as f64),
                    (current, _) => current.clone(),
                };
            }
            AggregateType::Min => {
                if self.value.is_null() || *input < self.value {
                    self.value = input.clone();
                }
            }
            AggregateType::Max => {
                if self.value.is_null() || *input > self.value {
                    self.value = input.clone();
                }
            }
        }
    }

    fn result(&self) -> Datum {
        match self.agg_type {
            AggregateType::Count => Datum::Int(self.count),
            _ => self.value.clone(),
        }
    }
}

/// GROUP BY + SUM/COUNT/MIN/MAX with an optional HAVING filter
pub struct AggregationExecutor {
    plan: AggregationPlan,
    child: BoxedExecutor,
    results: VecDeque<(Vec<Datum>, Vec<Datum>)>,
}

impl AggregationExecutor {
    pub fn new(plan: AggregationPlan, child: BoxedExecutor) -> Self {
        Self {
            plan,
            child,
            results: VecDeque::new(),
        }
    }
}

impl Executor for AggregationExecutor {
    fn init(&mut self) -> ExecResult<()> {
        self.child.init()?;

        let mut groups: LinkedHashMap<Vec<Datum>, Vec<Accumulator>> = LinkedHashMap::new();
        while let Some((tuple, _)) = self.child.next()? {
            let mut key = Vec::with_capacity(self.plan.group_by.len());
            for expr in &self.plan.group_by {
                key.push(expr.evaluate(&tuple)?);
            }

            let accumulators = groups.entry(key).or_insert_with(|| {
                self.plan
                    .aggregates
                    .iter()
                    .map(|(agg_type, _)| Accumulator::new(*agg_type))
                    .collect()
            });
            for (accumulator, (_, expr)) in accumulators.iter_mut().zip(&self.plan.aggregates) {
                accumulator.update(&expr.evaluate(&tuple)?);
            }
        }

        self.results = groups
            .into_iter()
            .map(|(key, accs)| {
                let values = accs.iter().map(Accumulator::result).collect();
                (key, values)
            })
            .collect();
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<(Tuple, Rid)>> {
        while let Some((group_bys, aggregates)) = self.results.pop_front() {
            if let Some(having) = &self.plan.having {
                if !having.evaluate_aggregate(&group_bys, &aggregates)?.is_true() {
                    continue;
                }
            }
            let mut values = group_bys;
            values.extend(aggregates);
            return Ok(Some((Tuple::new(values), Rid::INVALID)));
        }
        Ok(None)
    }
}
