use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::catalog::Schema;
use crate::storage::tuple::Tuple;
use crate::utils::scalar::ScalarValue;

/// Per-table statistics persisted in the header page of a tuple file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableStats {
    pub num_tuples: u64,
    /// Pages holding tuple data, header excluded.
    pub num_data_pages: u32,
    /// Average encoded tuple size in bytes.
    pub avg_tuple_size: f64,
    /// Indexed like the schema's columns.
    pub column_stats: Vec<ColumnStats>,
}

impl TableStats {
    pub fn empty(schema: &Schema) -> Self {
        Self {
            num_tuples: 0,
            num_data_pages: 0,
            avg_tuple_size: 0.0,
            column_stats: vec![ColumnStats::default(); schema.column_count()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub null_count: u64,
    pub distinct_count: u64,
    pub min: Option<ScalarValue>,
    pub max: Option<ScalarValue>,
}

/// Accumulates statistics over a full pass of a tuple file.
#[derive(Debug)]
pub struct StatsCollector {
    stats: TableStats,
    total_bytes: u64,
    distinct: Vec<HashSet<ScalarValue>>,
}

impl StatsCollector {
    pub fn new(schema: &Schema) -> Self {
        Self {
            stats: TableStats::empty(schema),
            total_bytes: 0,
            distinct: vec![HashSet::new(); schema.column_count()],
        }
    }

    pub fn record_page(&mut self) {
        self.stats.num_data_pages += 1;
    }

    pub fn record_tuple(&mut self, tuple: &Tuple, encoded_size: usize) {
        self.stats.num_tuples += 1;
        self.total_bytes += encoded_size as u64;
        for (idx, value) in tuple.data.iter().enumerate() {
            let Some(stats) = self.stats.column_stats.get_mut(idx) else {
                continue;
            };
            if value.is_null() {
                stats.null_count += 1;
                continue;
            }
            self.distinct[idx].insert(value.clone());

            let is_new_min = stats.min.as_ref().map_or(true, |min| {
                matches!(value.partial_cmp(min), Some(Ordering::Less))
            });
            if is_new_min {
                stats.min = Some(value.clone());
            }
            let is_new_max = stats.max.as_ref().map_or(true, |max| {
                matches!(value.partial_cmp(max), Some(Ordering::Greater))
            });
            if is_new_max {
                stats.max = Some(value.clone());
            }
        }
    }

    pub fn finish(mut self) -> TableStats {
        if self.stats.num_tuples > 0 {
            self.stats.avg_tuple_size = self.total_bytes as f64 / self.stats.num_tuples as f64;
        }
        for (stats, values) in self.stats.column_stats.iter_mut().zip(self.distinct) {
            stats.distinct_count = values.len() as u64;
        }
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType};
    use std::sync::Arc;

    #[test]
    fn collector_tracks_min_max_and_distinct() {
        let schema = Arc::new(Schema::new(vec![
            Column::new("a", DataType::Int32, false),
            Column::new("b", DataType::Varchar(None), true),
        ]));
        let mut collector = StatsCollector::new(&schema);
        collector.record_page();
        for (a, b) in [(3i32, Some("x")), (1, None), (3, Some("y"))] {
            let tuple = Tuple::new(
                schema.clone(),
                vec![a.into(), b.map(|s| s.to_string()).into()],
            );
            collector.record_tuple(&tuple, 10);
        }
        let stats = collector.finish();
        assert_eq!(stats.num_tuples, 3);
        assert_eq!(stats.num_data_pages, 1);
        assert_eq!(stats.avg_tuple_size, 10.0);
        assert_eq!(stats.column_stats[0].distinct_count, 2);
        assert_eq!(stats.column_stats[0].min, Some(1i32.into()));
        assert_eq!(stats.column_stats[0].max, Some(3i32.into()));
        assert_eq!(stats.column_stats[1].null_count, 1);
        assert_eq!(stats.column_stats[1].distinct_count, 2);
    }
}
