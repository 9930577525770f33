use crate::catalog::{Schema, TableStats};
use crate::expression::utils::normalize_column_predicate;
use crate::expression::{BinaryExpr, BinaryOp, Expr};
use crate::storage::tuple_file::HashLayout;

/// Estimated cost of producing a scan's output.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlanCost {
    /// Tuples expected to survive the predicate.
    pub num_tuples: f64,
    pub tuple_size: f64,
    pub cpu_cost: f64,
    pub num_block_ios: f64,
}

const DEFAULT_EQ_SELECTIVITY: f64 = 0.1;
const RANGE_SELECTIVITY: f64 = 1.0 / 3.0;

/// Predicate selectivity from per-column statistics.
#[derive(Debug, Clone, Copy)]
pub struct SelectivityEstimator<'a> {
    schema: &'a Schema,
    stats: &'a TableStats,
}

impl<'a> SelectivityEstimator<'a> {
    pub fn new(schema: &'a Schema, stats: &'a TableStats) -> Self {
        Self { schema, stats }
    }

    pub fn estimate(&self, expr: &Expr) -> f64 {
        match expr {
            Expr::Binary(BinaryExpr {
                left,
                op: BinaryOp::And,
                right,
            }) => self.estimate(left) * self.estimate(right),
            Expr::Binary(BinaryExpr {
                left,
                op: BinaryOp::Or,
                right,
            }) => {
                let (l, r) = (self.estimate(left), self.estimate(right));
                l + r - l * r
            }
            Expr::Binary(_) => self.estimate_comparison(expr),
            _ => 1.0,
        }
    }

    fn estimate_comparison(&self, expr: &Expr) -> f64 {
        let Some((column, op, _)) = normalize_column_predicate(expr) else {
            return 1.0;
        };
        let equality = self.equality_selectivity(&column.name);
        match op {
            BinaryOp::Eq => equality,
            BinaryOp::NotEq => 1.0 - equality,
            BinaryOp::Gt | BinaryOp::GtEq | BinaryOp::Lt | BinaryOp::LtEq => RANGE_SELECTIVITY,
            BinaryOp::And | BinaryOp::Or => 1.0,
        }
    }

    fn equality_selectivity(&self, column: &str) -> f64 {
        self.schema
            .index_of(column)
            .ok()
            .and_then(|idx| self.stats.column_stats.get(idx))
            .filter(|stats| stats.distinct_count > 0)
            .map(|stats| 1.0 / stats.distinct_count as f64)
            .unwrap_or(DEFAULT_EQ_SELECTIVITY)
    }
}

/// Cost model for scans over one tuple file.
#[derive(Debug, Clone, Copy)]
pub struct CostEstimator<'a> {
    schema: &'a Schema,
    stats: &'a TableStats,
}

impl<'a> CostEstimator<'a> {
    pub fn new(schema: &'a Schema, stats: &'a TableStats) -> Self {
        Self { schema, stats }
    }

    fn selectivity(&self, predicate: Option<&Expr>) -> f64 {
        predicate
            .map(|expr| SelectivityEstimator::new(self.schema, self.stats).estimate(expr))
            .unwrap_or(1.0)
            .clamp(0.0, 1.0)
    }

    /// A full scan reads every page and examines every tuple whatever the
    /// predicate.
    pub fn full_scan_cost(&self, predicate: Option<&Expr>) -> PlanCost {
        let num_tuples = self.stats.num_tuples as f64;
        PlanCost {
            num_tuples: num_tuples * self.selectivity(predicate),
            tuple_size: self.stats.avg_tuple_size,
            cpu_cost: num_tuples,
            num_block_ios: self.stats.num_data_pages as f64,
        }
    }

    /// A keyed lookup reads one bucket chain.
    pub fn keyed_lookup_cost(&self, layout: HashLayout, predicate: Option<&Expr>) -> PlanCost {
        let buckets = layout.buckets.max(1) as f64;
        let num_tuples = self.stats.num_tuples as f64;
        PlanCost {
            num_tuples: num_tuples * self.selectivity(predicate),
            tuple_size: self.stats.avg_tuple_size,
            cpu_cost: num_tuples / buckets,
            num_block_ios: 1.0 + layout.overflow_pages as f64 / buckets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, ColumnStats, DataType};

    fn fixture() -> (Schema, TableStats) {
        let schema = Schema::new(vec![
            Column::new("a", DataType::Int32, false),
            Column::new("b", DataType::Int32, false),
        ]);
        let stats = TableStats {
            num_tuples: 1000,
            num_data_pages: 20,
            avg_tuple_size: 24.0,
            column_stats: vec![
                ColumnStats {
                    distinct_count: 50,
                    ..Default::default()
                },
                ColumnStats::default(),
            ],
        };
        (schema, stats)
    }

    #[test]
    fn selectivity_rules() {
        let (schema, stats) = fixture();
        let est = SelectivityEstimator::new(&schema, &stats);
        let a_eq = Expr::column("a").eq(Expr::literal(1i32));
        let b_eq = Expr::column("b").eq(Expr::literal(1i32));
        assert!((est.estimate(&a_eq) - 0.02).abs() < 1e-9);
        assert!((est.estimate(&b_eq) - 0.1).abs() < 1e-9);
        let range = Expr::literal(3i32).lt(Expr::column("a"));
        assert!((est.estimate(&range) - 1.0 / 3.0).abs() < 1e-9);
        let not_eq = Expr::binary(Expr::column("a"), BinaryOp::NotEq, Expr::literal(1i32));
        assert!((est.estimate(&not_eq) - 0.98).abs() < 1e-9);
        assert!((est.estimate(&a_eq.clone().and(b_eq.clone())) - 0.002).abs() < 1e-9);
        assert!((est.estimate(&a_eq.or(b_eq)) - (0.02 + 0.1 - 0.002)).abs() < 1e-9);
    }

    #[test]
    fn full_scan_cost_ignores_selectivity() {
        let (schema, stats) = fixture();
        let cost = CostEstimator::new(&schema, &stats);
        let predicate = Expr::column("a").eq(Expr::literal(1i32));
        let filtered = cost.full_scan_cost(Some(&predicate));
        let unfiltered = cost.full_scan_cost(None);
        assert_eq!(filtered.cpu_cost, unfiltered.cpu_cost);
        assert_eq!(filtered.num_block_ios, 20.0);
        assert!((filtered.num_tuples - 20.0).abs() < 1e-9);
        assert_eq!(unfiltered.num_tuples, 1000.0);
    }

    #[test]
    fn keyed_cost_follows_bucket_occupancy() {
        let (schema, stats) = fixture();
        let cost = CostEstimator::new(&schema, &stats);
        let layout = HashLayout {
            buckets: 10,
            overflow_pages: 5,
        };
        let keyed = cost.keyed_lookup_cost(layout, None);
        assert_eq!(keyed.cpu_cost, 100.0);
        assert_eq!(keyed.num_block_ios, 1.5);
        assert!(keyed.cpu_cost < cost.full_scan_cost(None).cpu_cost);
    }
}
