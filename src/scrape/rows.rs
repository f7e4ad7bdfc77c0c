use crate::error::{AppError, Result};

/// Reconcile the caller's row cap with the server total.
///
/// A zero total is `NoResults`. Otherwise the cap wins only when it is set and does not
/// exceed the total.
pub fn effective_row_count(requested: Option<usize>, total: usize, query: &str) -> Result<usize> {
    if total == 0 {
        return Err(AppError::NoResults {
            query: query.to_string(),
        });
    }

    match requested {
        Some(cap) if cap > 0 && cap <= total => Ok(cap),
        _ => Ok(total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_total_is_no_results() {
        let err = effective_row_count(Some(10), 0, "tc=1").expect_err("should fail");
        match err {
            AppError::NoResults { query } => assert_eq!(query, "tc=1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cap_above_total_clamps_to_total() {
        assert_eq!(effective_row_count(Some(5), 2, "").unwrap(), 2);
    }

    #[test]
    fn unset_cap_uses_total() {
        assert_eq!(effective_row_count(None, 3, "").unwrap(), 3);
    }

    #[test]
    fn cap_within_total_wins() {
        assert_eq!(effective_row_count(Some(20), 1204, "").unwrap(), 20);
        assert_eq!(effective_row_count(Some(3), 3, "").unwrap(), 3);
    }
}
