// Hash join
//
// Builds a hash table over the left child in init, then streams the
// right child, emitting the matching bucket's cross product per row.

use std::collections::HashMap;

use crate::common::types::Rid;
use crate::query::executor::{BoxedExecutor, ExecResult, Executor};
use crate::query::plan::HashJoinPlan;
use crate::storage::tuple::{Datum, Tuple};

pub struct HashJoinExecutor {
    plan: HashJoinPlan,
    left: BoxedExecutor,
    right: BoxedExecutor,
    hash_table: HashMap<Datum, Vec<Tuple>>,
    current_bucket: Vec<Tuple>,
    bucket_cursor: usize,
    current_right: Option<Tuple>,
}

impl HashJoinExecutor {
    pub fn new(plan: HashJoinPlan, left: BoxedExecutor, right: BoxedExecutor) -> Self {
        Self {
            plan,
            left,
            right,
            hash_table: HashMap::new(),
            current_bucket: Vec::new(),
            bucket_cursor: 0,
            current_right: None,
        }
    }
}

impl Executor for HashJoinExecutor {
    fn init(&mut self) -> ExecResult<()> {
        self.left.init()?;
        self.right.init()?;
        self.hash_table.clear();
        self.current_bucket.clear();
        self.bucket_cursor = 0;
        self.current_right = None;

        // build side
        while let Some((tuple, _)) = self.left.next()? {
            let key = self.plan.left_key.evaluate(&tuple)?;
            self.hash_table.entry(key).or_default().push(tuple);
        }
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<(Tuple, Rid)>> {
        // refill the bucket from the probe side when exhausted
        if self.bucket_cursor >= self.current_bucket.len() {
            loop {
                let (right_tuple, _) = match self.right.next()? {
                    Some(row) => row,
                    None => return Ok(None),
                };
                let key = self.plan.right_key.evaluate(&right_tuple)?;
                if let Some(matches) = self.hash_table.get(&key) {
                    // the same key may probe again, so the bucket is copied
                    self.current_bucket = matches.clone();
                    self.bucket_cursor = 0;
                    self.current_right = Some(right_tuple);
                    break;
                }
            }
        }

        let right_tuple = match &self.current_right {
            Some(tuple) => tuple,
            None => return Ok(None),
        };
        let left_tuple = &self.current_bucket[self.bucket_cursor];
        self.bucket_cursor += 1;

        Ok(Some((left_tuple.join(right_tuple), Rid::INVALID)))
    }
}
