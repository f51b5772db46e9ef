use crate::common::types::Rid;
use crate::query::executor::{BoxedExecutor, ExecResult, Executor};
use crate::query::plan::NestedLoopJoinPlan;
use crate::storage::tuple::Tuple;

/// Classic nested iteration: the right child restarts for every left
/// row. An empty right child simply drains the left side and finishes.
pub struct NestedLoopJoinExecutor {
    plan: NestedLoopJoinPlan,
    left: BoxedExecutor,
    right: BoxedExecutor,
    current_left: Option<Tuple>,
}

impl NestedLoopJoinExecutor {
    pub fn new(plan: NestedLoopJoinPlan, left: BoxedExecutor, right: BoxedExecutor) -> Self {
        Self {
            plan,
            left,
            right,
            current_left: None,
        }
    }
}

impl Executor for NestedLoopJoinExecutor {
    fn init(&mut self) -> ExecResult<()> {
        self.left.init()?;
        self.right.init()?;
        self.current_left = self.left.next()?.map(|(tuple, _)| tuple);
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<(Tuple, Rid)>> {
        loop {
            let left_tuple = match &self.current_left {
                Some(tuple) => tuple,
                None => return Ok(None),
            };

            let right_tuple = match self.right.next()? {
                Some((tuple, _)) => tuple,
                None => {
                    self.current_left = self.left.next()?.map(|(tuple, _)| tuple);
                    if self.current_left.is_none() {
                        return Ok(None);
                    }
                    self.right.init()?;
                    continue;
                }
            };

            let joined = left_tuple.join(&right_tuple);
            if let Some(predicate) = &self.plan.predicate {
                if !predicate.evaluate(&joined)?.is_true() {
                    continue;
                }
            }
            return Ok(Some((joined, Rid::INVALID)));
        }
    }
}
