use std::sync::Arc;

use log::debug;

use crate::catalog::{DataType, SchemaRef};
use crate::error::{HashFileError, HashFileResult};
use crate::execution::{ExecutionContext, VolcanoExecutor};
use crate::expression::{Expr, ExprTrait};
use crate::storage::tuple::Tuple;

use super::PhysicalPlan;

/// Selection over the output of another plan.
#[derive(derive_new::new, Debug)]
pub struct PhysicalFilter {
    pub predicate: Expr,
    pub input: Arc<PhysicalPlan>,
}

impl VolcanoExecutor for PhysicalFilter {
    fn init(&self, context: &mut ExecutionContext) -> HashFileResult<()> {
        let predicate_type = self.predicate.data_type(&self.input.output_schema())?;
        if predicate_type != DataType::Boolean {
            return Err(HashFileError::Plan(format!(
                "Filter predicate {} is {}, not boolean",
                self.predicate, predicate_type
            )));
        }
        debug!("init filter {}", self.predicate);
        self.input.init(context)
    }

    fn next(&self, context: &mut ExecutionContext) -> HashFileResult<Option<Tuple>> {
        while let Some(tuple) = self.input.next(context)? {
            if context.eval_predicate(&self.predicate, &tuple)? {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn output_schema(&self) -> SchemaRef {
        self.input.output_schema()
    }
}

impl std::fmt::Display for PhysicalFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Filter: {} <- {}", self.predicate, self.input)
    }
}
