use crate::expression::{BinaryExpr, BinaryOp, ColumnExpr, Expr, Literal};

/// Splits a predicate on its top-level ANDs.
pub fn collect_conjuncts(expr: &Expr) -> Vec<&Expr> {
    let mut conjuncts = Vec::new();
    collect_into(expr, &mut conjuncts);
    conjuncts
}

fn collect_into<'a>(expr: &'a Expr, conjuncts: &mut Vec<&'a Expr>) {
    match expr {
        Expr::Binary(BinaryExpr {
            left,
            op: BinaryOp::And,
            right,
        }) => {
            collect_into(left, conjuncts);
            collect_into(right, conjuncts);
        }
        other => conjuncts.push(other),
    }
}

/// `column op literal` view of a comparison, flipping `literal op column`.
pub fn normalize_column_predicate(expr: &Expr) -> Option<(&ColumnExpr, BinaryOp, &Literal)> {
    let Expr::Binary(BinaryExpr { left, op, right }) = expr else {
        return None;
    };
    if !op.is_comparison() {
        return None;
    }
    match (left.as_ref(), right.as_ref()) {
        (Expr::Column(column), Expr::Literal(literal)) => Some((column, *op, literal)),
        (Expr::Literal(literal), Expr::Column(column)) => Some((column, op.flip(), literal)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::scalar::ScalarValue;

    #[test]
    fn conjuncts_flatten_nested_and() {
        let a = Expr::column("a").eq(Expr::literal(1i32));
        let b = Expr::column("b").gt(Expr::literal(2i32));
        let c = Expr::column("c")
            .eq(Expr::literal(3i32))
            .or(Expr::column("c").eq(Expr::literal(4i32)));
        let expr = a.clone().and(b.clone().and(c.clone()));
        assert_eq!(collect_conjuncts(&expr), vec![&a, &b, &c]);
        assert_eq!(collect_conjuncts(&a), vec![&a]);
    }

    #[test]
    fn literal_first_comparison_is_flipped() {
        let expr = Expr::literal(5i32).lt(Expr::column("x"));
        let (column, op, literal) = normalize_column_predicate(&expr).unwrap();
        assert_eq!(column.name, "x");
        assert_eq!(op, BinaryOp::Gt);
        assert_eq!(literal.value, ScalarValue::from(5i32));

        let both_columns = Expr::column("x").eq(Expr::column("y"));
        assert!(normalize_column_predicate(&both_columns).is_none());
        let and = Expr::column("x").and(Expr::column("y"));
        assert!(normalize_column_predicate(&and).is_none());
    }
}
