//! Store query metrics, labelled by table, operation and outcome.

use metrics::{counter, histogram};
use std::time::Instant;

/// Tables read or written by the repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Missions,
    TrackingHistory,
    TrackingLive,
    PublicTrackingLinks,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Missions => "missions",
            Table::TrackingHistory => "mission_tracking_history",
            Table::TrackingLive => "mission_tracking_live",
            Table::PublicTrackingLinks => "public_tracking_links",
        }
    }
}

/// Outcome label for a finished query.
pub fn outcome<T>(result: &Result<T, sqlx::Error>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(sqlx::Error::RowNotFound) => "not_found",
        Err(sqlx::Error::PoolTimedOut) => "pool_timeout",
        Err(sqlx::Error::Database(_)) => "database_error",
        Err(_) => "error",
    }
}

/// Times one repository operation.
///
/// ```ignore
/// let timer = QueryTimer::start(Table::TrackingLive, "find_live");
/// let result = sqlx::query_as::<_, TrackingLiveEntity>(...).fetch_optional(&pool).await;
/// timer.finish(result)
/// ```
#[must_use = "call finish() with the query result"]
pub struct QueryTimer {
    table: Table,
    operation: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn start(table: Table, operation: &'static str) -> Self {
        Self {
            table,
            operation,
            start: Instant::now(),
        }
    }

    /// Records duration and outcome, then hands the result back unchanged.
    pub fn finish<T>(self, result: Result<T, sqlx::Error>) -> Result<T, sqlx::Error> {
        let outcome = outcome(&result);
        histogram!(
            "tracking_store_query_duration_seconds",
            "table" => self.table.as_str(),
            "operation" => self.operation,
            "outcome" => outcome
        )
        .record(self.start.elapsed().as_secs_f64());

        if let Err(e) = &result {
            counter!(
                "tracking_store_query_errors_total",
                "table" => self.table.as_str(),
                "operation" => self.operation
            )
            .increment(1);
            tracing::debug!(
                table = self.table.as_str(),
                operation = self.operation,
                error = %e,
                "Store query failed"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_labels_match_schema() {
        assert_eq!(Table::Missions.as_str(), "missions");
        assert_eq!(Table::TrackingHistory.as_str(), "mission_tracking_history");
        assert_eq!(Table::TrackingLive.as_str(), "mission_tracking_live");
        assert_eq!(Table::PublicTrackingLinks.as_str(), "public_tracking_links");
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome::<()>(&Ok(())), "ok");
        assert_eq!(outcome::<()>(&Err(sqlx::Error::RowNotFound)), "not_found");
        assert_eq!(outcome::<()>(&Err(sqlx::Error::PoolTimedOut)), "pool_timeout");
        assert_eq!(outcome::<()>(&Err(sqlx::Error::PoolClosed)), "error");
    }

    #[test]
    fn test_finish_passes_result_through() {
        // No global recorder installed: recording is a no-op.
        let ok = QueryTimer::start(Table::TrackingLive, "find_live").finish(Ok(7));
        assert_eq!(ok.unwrap(), 7);

        let err = QueryTimer::start(Table::Missions, "find_by_id")
            .finish::<()>(Err(sqlx::Error::RowNotFound));
        assert!(matches!(err, Err(sqlx::Error::RowNotFound)));
    }
}
