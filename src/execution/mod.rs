pub mod physical_plan;

use std::sync::Arc;

use crate::catalog::SchemaRef;
use crate::error::HashFileResult;
use crate::execution::physical_plan::PhysicalPlan;
use crate::expression::{Expr, ExprTrait};
use crate::storage::tuple::Tuple;

pub trait VolcanoExecutor {
    fn init(&self, _context: &mut ExecutionContext) -> HashFileResult<()> {
        Ok(())
    }

    fn next(&self, context: &mut ExecutionContext) -> HashFileResult<Option<Tuple>>;

    fn output_schema(&self) -> SchemaRef;
}

/// Work counters of scan nodes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanMetrics {
    /// Tuples fetched from storage, whether or not they passed the predicate.
    pub tuples_examined: u64,
    pub keyed_lookups: u64,
    pub full_scans: u64,
}

#[derive(Debug, Default)]
pub struct ExecutionContext {
    pub metrics: ScanMetrics,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// An unknown (NULL) predicate result rejects the tuple.
    pub fn eval_predicate(&self, predicate: &Expr, tuple: &Tuple) -> HashFileResult<bool> {
        Ok(predicate.evaluate(tuple)?.as_boolean()?.unwrap_or(false))
    }
}

#[derive(Debug, Default)]
pub struct ExecutionEngine {
    pub context: ExecutionContext,
}

impl ExecutionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execute(&mut self, plan: Arc<PhysicalPlan>) -> HashFileResult<Vec<Tuple>> {
        plan.init(&mut self.context)?;
        let mut result = Vec::new();
        loop {
            let next_tuple = plan.next(&mut self.context)?;
            if let Some(tuple) = next_tuple {
                result.push(tuple);
            } else {
                break;
            }
        }
        Ok(result)
    }
}
