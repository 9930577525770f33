use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::catalog::{DataType, SchemaRef};
use crate::cost::{CostEstimator, PlanCost};
use crate::error::{HashFileError, HashFileResult};
use crate::execution::{ExecutionContext, VolcanoExecutor};
use crate::expression::utils::{collect_conjuncts, normalize_column_predicate};
use crate::expression::{BinaryOp, Expr};
use crate::storage::tuple::Tuple;
use crate::storage::tuple_file::{FilePointer, FileTuple, TupleFile};
use crate::utils::scalar::ScalarValue;

#[derive(Debug, Default)]
struct ScanState {
    /// Probe key in hash-key column order; set when the predicate pins
    /// every hash-key column to a literal.
    key: Option<Tuple>,
    prepared: bool,
    current: Option<FilePointer>,
    last_mark: Option<FilePointer>,
    resume_from_mark: bool,
    exhausted: bool,
}

/// Leaf scan over a tuple file. When the predicate fixes the whole hash key
/// the scan walks one bucket chain instead of the whole file. The predicate
/// is applied to every produced tuple in both modes.
#[derive(Debug)]
pub struct PhysicalFileScan {
    pub table: Arc<dyn TupleFile>,
    pub predicate: Option<Expr>,
    state: Mutex<ScanState>,
}

impl PhysicalFileScan {
    pub fn new(table: Arc<dyn TupleFile>, predicate: Option<Expr>) -> Self {
        Self {
            table,
            predicate,
            state: Mutex::new(ScanState::default()),
        }
    }

    /// Picks keyed or full mode. Returns whether the scan is keyed.
    pub fn prepare(&self) -> HashFileResult<bool> {
        let mut state = self.state.lock();
        if !state.prepared {
            state.key = self.probe_key()?;
            state.prepared = true;
            if let Some(key) = &state.key {
                debug!("File scan switched to keyed lookup on key {}", key);
            }
        }
        Ok(state.key.is_some())
    }

    pub fn is_keyed(&self) -> bool {
        self.state.lock().key.is_some()
    }

    fn probe_key(&self) -> HashFileResult<Option<Tuple>> {
        let (Some(hashed), Some(predicate)) = (self.table.as_hashed(), &self.predicate) else {
            return Ok(None);
        };
        let schema = self.table.schema();

        let mut equalities: HashMap<usize, &ScalarValue> = HashMap::new();
        for conjunct in collect_conjuncts(predicate) {
            let Some((column, BinaryOp::Eq, literal)) = normalize_column_predicate(conjunct)
            else {
                continue;
            };
            let Ok(idx) = schema.index_of(&column.name) else {
                continue;
            };
            if literal.value.is_null() {
                continue;
            }
            equalities.entry(idx).or_insert(&literal.value);
        }

        let key_columns = hashed.key_columns();
        let mut key_values = Vec::with_capacity(key_columns.len());
        for col in key_columns {
            let Some(value) = equalities.get(col) else {
                return Ok(None);
            };
            let column_type = schema.column_with_index(*col)?.data_type;
            if DataType::comparison_numeric_coercion(&column_type, &value.data_type()).is_err() {
                return Ok(None);
            }
            // Out-of-range literals match nothing; left to the full scan.
            match value.cast_to(&column_type) {
                Ok(cast) => key_values.push(cast),
                Err(_) => return Ok(None),
            }
        }
        let key_schema = Arc::new(schema.project(key_columns)?);
        Ok(Some(Tuple::new(key_schema, key_values)))
    }

    /// Remembers the tuple last returned by `next`.
    pub fn mark_current_position(&self) -> HashFileResult<()> {
        let mut state = self.state.lock();
        let current = state.current.ok_or_else(|| {
            HashFileError::Execution("No current tuple to mark in file scan".to_string())
        })?;
        state.last_mark = Some(current);
        Ok(())
    }

    /// Makes the next call to `next` return the marked tuple again and
    /// continue from there.
    pub fn reset_to_last_mark(&self) -> HashFileResult<()> {
        let mut state = self.state.lock();
        if state.last_mark.is_none() {
            return Err(HashFileError::Execution(
                "File scan has no marked position to reset to".to_string(),
            ));
        }
        state.resume_from_mark = true;
        state.exhausted = false;
        Ok(())
    }

    pub fn cost(&self) -> HashFileResult<PlanCost> {
        self.prepare()?;
        let schema = self.table.schema();
        let stats = self.table.stats();
        let estimator = CostEstimator::new(&schema, &stats);
        match (self.is_keyed(), self.table.as_hashed()) {
            (true, Some(hashed)) => {
                Ok(estimator.keyed_lookup_cost(hashed.layout()?, self.predicate.as_ref()))
            }
            _ => Ok(estimator.full_scan_cost(self.predicate.as_ref())),
        }
    }

    fn fetch(&self, state: &mut ScanState) -> HashFileResult<Option<FileTuple>> {
        if state.resume_from_mark {
            state.resume_from_mark = false;
            if let Some(mark) = state.last_mark {
                return self.table.get_tuple(&mark).map(Some);
            }
        }
        if state.exhausted {
            return Ok(None);
        }

        let fetched = match (&state.key, state.current, self.table.as_hashed()) {
            (Some(key), None, Some(hashed)) => hashed.find_first_tuple_equals(key)?,
            (Some(key), Some(prev), Some(hashed)) => hashed.find_next_tuple_equals(&prev, key)?,
            (_, None, _) => self.table.get_first_tuple()?,
            (_, Some(prev), _) => self.table.get_next_tuple(&prev)?,
        };
        if fetched.is_none() {
            state.exhausted = true;
        }
        Ok(fetched)
    }
}

impl VolcanoExecutor for PhysicalFileScan {
    fn init(&self, context: &mut ExecutionContext) -> HashFileResult<()> {
        let keyed = self.prepare()?;
        let mut state = self.state.lock();
        state.current = None;
        state.last_mark = None;
        state.resume_from_mark = false;
        state.exhausted = false;
        if keyed {
            context.metrics.keyed_lookups += 1;
        } else {
            context.metrics.full_scans += 1;
        }
        Ok(())
    }

    fn next(&self, context: &mut ExecutionContext) -> HashFileResult<Option<Tuple>> {
        let mut state = self.state.lock();
        loop {
            let Some(FileTuple { pointer, tuple }) = self.fetch(&mut state)? else {
                state.current = None;
                return Ok(None);
            };
            context.metrics.tuples_examined += 1;
            state.current = Some(pointer);
            let passes = match &self.predicate {
                Some(predicate) => context.eval_predicate(predicate, &tuple)?,
                None => true,
            };
            if passes {
                return Ok(Some(tuple));
            }
        }
    }

    fn output_schema(&self) -> SchemaRef {
        self.table.schema()
    }
}

impl std::fmt::Display for PhysicalFileScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = if self.is_keyed() { "keyed" } else { "full" };
        match &self.predicate {
            Some(predicate) => write!(f, "FileScan ({mode}): {predicate}"),
            None => write!(f, "FileScan ({mode})"),
        }
    }
}
