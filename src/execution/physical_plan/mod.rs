mod file_scan;
mod filter;

pub use file_scan::PhysicalFileScan;
pub use filter::PhysicalFilter;

use crate::catalog::SchemaRef;
use crate::{
    error::HashFileResult,
    execution::{ExecutionContext, VolcanoExecutor},
    storage::tuple::Tuple,
};

#[derive(Debug)]
pub enum PhysicalPlan {
    FileScan(PhysicalFileScan),
    Filter(PhysicalFilter),
}

impl PhysicalPlan {
    pub fn inputs(&self) -> Vec<&PhysicalPlan> {
        match self {
            PhysicalPlan::Filter(PhysicalFilter { input, .. }) => vec![input],
            PhysicalPlan::FileScan(_) => vec![],
        }
    }
}

impl VolcanoExecutor for PhysicalPlan {
    fn init(&self, context: &mut ExecutionContext) -> HashFileResult<()> {
        match self {
            PhysicalPlan::FileScan(op) => op.init(context),
            PhysicalPlan::Filter(op) => op.init(context),
        }
    }

    fn next(&self, context: &mut ExecutionContext) -> HashFileResult<Option<Tuple>> {
        match self {
            PhysicalPlan::FileScan(op) => op.next(context),
            PhysicalPlan::Filter(op) => op.next(context),
        }
    }

    fn output_schema(&self) -> SchemaRef {
        match self {
            Self::FileScan(op) => op.output_schema(),
            Self::Filter(op) => op.output_schema(),
        }
    }
}

impl std::fmt::Display for PhysicalPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileScan(op) => write!(f, "{op}"),
            Self::Filter(op) => write!(f, "{op}"),
        }
    }
}
