//! Reduction: collect every record in an account document into a
//! deterministic, oldest-first sequence.

use std::time::Duration;

use tracing::{debug, warn};

use callbrief_gateway_api::document::{RecordScan, parse_records};
use callbrief_gateway_api::{GatewayError, ItemSummary, StorageLocation, StoreGateway};

use crate::retry::with_timeout;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reduced {
    /// Ordered by (timestamp, position in the document)
    pub summaries: Vec<ItemSummary>,
    /// Records that could not be parsed and were left out
    pub malformed: usize,
}

/// Order parsed records oldest first; ties keep document order. The result
/// depends only on the set of records, not on how they were appended.
#[must_use]
pub fn order_records(scan: RecordScan) -> Reduced {
    for bad in &scan.malformed {
        warn!(
            ordinal = bad.ordinal,
            line = bad.line,
            reason = %bad.reason,
            "Skipping malformed record"
        );
    }

    let mut records = scan.records;
    records.sort_by(|a, b| {
        a.summary
            .timestamp
            .cmp(&b.summary.timestamp)
            .then(a.ordinal.cmp(&b.ordinal))
    });

    Reduced {
        summaries: records.into_iter().map(|r| r.summary).collect(),
        malformed: scan.malformed.len(),
    }
}

/// Read the document at `location` and reduce it.
///
/// # Errors
///
/// Propagates the store's read error, or a timeout.
pub async fn reduce(
    store: &dyn StoreGateway,
    location: &StorageLocation,
    timeout: Duration,
) -> Result<Reduced, GatewayError> {
    let doc = with_timeout("read", timeout, store.read(location)).await?;
    let reduced = order_records(parse_records(&doc));
    debug!(
        account = %location.account,
        records = reduced.summaries.len(),
        malformed = reduced.malformed,
        "Reduced document"
    );
    Ok(reduced)
}
