use std::collections::HashSet;

use crate::common::types::Rid;
use crate::query::executor::{BoxedExecutor, ExecResult, Executor};
use crate::storage::tuple::{Datum, Tuple};

/// Yields only the first occurrence of each distinct row
pub struct DistinctExecutor {
    child: BoxedExecutor,
    seen: HashSet<Vec<Datum>>,
}

impl DistinctExecutor {
    pub fn new(child: BoxedExecutor) -> Self {
        Self {
            child,
            seen: HashSet::new(),
        }
    }
}

impl Executor for DistinctExecutor {
    fn init(&mut self) -> ExecResult<()> {
        self.seen.clear();
        self.child.init()
    }

    fn next(&mut self) -> ExecResult<Option<(Tuple, Rid)>> {
        while let Some((tuple, rid)) = self.child.next()? {
            if self.seen.insert(tuple.values().to_vec()) {
                return Ok(Some((tuple, rid)));
            }
        }
        Ok(None)
    }
}
