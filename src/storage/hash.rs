use crate::error::HashFileResult;
use crate::storage::page::HeaderState;
use crate::storage::tuple::Tuple;
use crate::utils::scalar::ScalarValue;

/// Hash of a tuple's key columns. Bucket placement on disk is derived from
/// it, so it folds [`ScalarValue::stable_hash`] with a fixed multiplier
/// rather than using a process-seeded hasher.
pub struct TupleHasher;

impl TupleHasher {
    pub fn hash_values<'a>(values: impl IntoIterator<Item = &'a ScalarValue>) -> i32 {
        values.into_iter().fold(0i32, |h, value| {
            h.wrapping_mul(31).wrapping_add(value.stable_hash())
        })
    }

    /// Hashes the values of `columns`, in that order.
    pub fn hash_columns(tuple: &Tuple, columns: &[usize]) -> HashFileResult<i32> {
        let values = columns
            .iter()
            .map(|col| tuple.value(*col))
            .collect::<HashFileResult<Vec<&ScalarValue>>>()?;
        Ok(Self::hash_values(values))
    }
}

/// Bucket for `hash` under linear hashing: `h mod N*2^level`, or
/// `h mod N*2^(level+1)` when that bucket has already split this round.
pub fn compute_bucket_number(hash: i32, state: &HeaderState) -> u32 {
    let h = hash.unsigned_abs() as u64;
    let bucket_count = state.bucket_count();
    let base = h % bucket_count;
    if base < state.next as u64 {
        (h % (bucket_count * 2)) as u32
    } else {
        base as u32
    }
}

/// A split is due when the overflow file holds more pages than there are
/// buckets at the current level.
pub fn split_needed(overflow_pages: u32, state: &HeaderState) -> bool {
    overflow_pages as u64 > state.bucket_count()
}
