//! Order fulfillment: deduct stock once per paid checkout session.
//!
//! Both the webhook and the confirmation-page poll end up here, possibly at
//! the same time for the same session. The ledger insert is the gate: the
//! first caller to claim the session runs the per-line loop, every other
//! caller sees `AlreadyProcessed` and touches nothing.
//!
//! The claim happens before any line is attempted. A line that fails is
//! logged and reported, never retried; correcting its stock is an
//! operational task.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use nonito_core::{CheckoutSessionId, PaymentStatus, ProductSlug};

use crate::db::RepositoryError;
use crate::payment::CheckoutSession;
use crate::store::{InventoryStore, OrderLedger};

static ITEM_KEY: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^item_(\d+)_").expect("item key pattern is a valid regex")
});

/// Fulfillment could not start.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("ledger unavailable: {0}")]
    Ledger(#[from] RepositoryError),
}

/// A purchased line recovered from order metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentLine {
    pub index: usize,
    pub product: ProductSlug,
    pub quantity: u32,
}

/// Why a metadata line was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingProduct,
    InvalidProduct,
    MissingQuantity,
    InvalidQuantity,
}

/// Result of one stock deduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineResult {
    Deducted { remaining: u32 },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineOutcome {
    pub line: FulfillmentLine,
    pub result: LineResult,
}

/// What a fulfillment call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    /// Payment not completed; nothing recorded.
    NotPaid,
    /// Another call already claimed this session.
    AlreadyProcessed,
    /// This call claimed the session and attempted every valid line.
    Processed {
        lines: Vec<LineOutcome>,
        skipped: Vec<(usize, SkipReason)>,
    },
}

/// Recover purchased lines from `item_<i>_*` metadata, in index order.
///
/// Each index needs `item_<i>_productSlug` and a positive integer
/// `item_<i>_quantity`; indices missing either are skipped.
#[must_use]
pub fn parse_order_lines(
    metadata: &BTreeMap<String, String>,
) -> (Vec<FulfillmentLine>, Vec<(usize, SkipReason)>) {
    let indices: BTreeSet<usize> = metadata
        .keys()
        .filter_map(|key| ITEM_KEY.captures(key))
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect();

    let mut lines = Vec::new();
    let mut skipped = Vec::new();
    for index in indices {
        match parse_line(metadata, index) {
            Ok(line) => lines.push(line),
            Err(reason) => skipped.push((index, reason)),
        }
    }
    (lines, skipped)
}

fn parse_line(
    metadata: &BTreeMap<String, String>,
    index: usize,
) -> Result<FulfillmentLine, SkipReason> {
    let product = metadata
        .get(&format!("item_{index}_productSlug"))
        .ok_or(SkipReason::MissingProduct)?;
    let product = ProductSlug::parse(product).map_err(|_| SkipReason::InvalidProduct)?;

    let quantity = metadata
        .get(&format!("item_{index}_quantity"))
        .ok_or(SkipReason::MissingQuantity)?;
    let quantity = quantity
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|q| *q > 0)
        .ok_or(SkipReason::InvalidQuantity)?;

    Ok(FulfillmentLine {
        index,
        product,
        quantity,
    })
}

/// Fulfill a confirmed checkout session.
///
/// # Errors
///
/// Returns `Ledger` if the claim itself fails; no stock has been touched then.
#[instrument(skip(store, session_id, metadata), fields(session_id = %session_id))]
pub async fn fulfill<S>(
    store: &S,
    session_id: &CheckoutSessionId,
    payment_status: PaymentStatus,
    metadata: &BTreeMap<String, String>,
) -> Result<FulfillmentOutcome, FulfillmentError>
where
    S: InventoryStore + OrderLedger + ?Sized,
{
    if !payment_status.is_paid() {
        info!(?payment_status, "Session not paid, skipping fulfillment");
        return Ok(FulfillmentOutcome::NotPaid);
    }

    if !store.claim(session_id).await? {
        info!("Session already processed");
        return Ok(FulfillmentOutcome::AlreadyProcessed);
    }

    let (lines, skipped) = parse_order_lines(metadata);
    for (index, reason) in &skipped {
        warn!(index, ?reason, "Skipping malformed order line");
    }

    let mut outcomes = Vec::with_capacity(lines.len());
    for line in lines {
        let result = match store.deduct_stock(&line.product, line.quantity).await {
            Ok(remaining) => {
                info!(
                    product = %line.product,
                    quantity = line.quantity,
                    remaining,
                    "Stock deducted"
                );
                LineResult::Deducted { remaining }
            }
            Err(e) => {
                error!(product = %line.product, quantity = line.quantity, error = %e, "Stock deduction failed");
                LineResult::Failed {
                    reason: e.to_string(),
                }
            }
        };
        outcomes.push(LineOutcome { line, result });
    }

    info!(lines = outcomes.len(), skipped = skipped.len(), "Finished processing session");
    Ok(FulfillmentOutcome::Processed {
        lines: outcomes,
        skipped,
    })
}

/// Fulfill from a provider session object.
///
/// # Errors
///
/// See [`fulfill`].
pub async fn fulfill_session<S>(
    store: &S,
    session: &CheckoutSession,
) -> Result<FulfillmentOutcome, FulfillmentError>
where
    S: InventoryStore + OrderLedger + ?Sized,
{
    fulfill(store, &session.id, session.payment_status, &session.metadata).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::{fixture_store, slug};

    fn session_id(s: &str) -> CheckoutSessionId {
        CheckoutSessionId::parse(s).unwrap()
    }

    fn metadata(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_second_invocation_is_noop() {
        let store = fixture_store();
        let meta = metadata(&[
            ("item_0_fabric", "linne"),
            ("item_0_productSlug", "necessar"),
            ("item_0_quantity", "3"),
        ]);
        let id = session_id("cs_test_twice");

        let first = fulfill(&store, &id, PaymentStatus::Paid, &meta).await.unwrap();
        assert!(matches!(first, FulfillmentOutcome::Processed { .. }));
        let second = fulfill(&store, &id, PaymentStatus::Paid, &meta).await.unwrap();
        assert_eq!(second, FulfillmentOutcome::AlreadyProcessed);

        assert_eq!(store.stock(&slug("necessar")), Some(7));
    }

    #[tokio::test]
    async fn test_concurrent_invocations_deduct_once() {
        let store = std::sync::Arc::new(fixture_store());
        let meta = metadata(&[("item_0_productSlug", "necessar"), ("item_0_quantity", "3")]);
        let id = session_id("cs_test_race");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let meta = meta.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    fulfill(store.as_ref(), &id, PaymentStatus::Paid, &meta).await
                })
            })
            .collect();

        let mut processed = 0;
        for handle in handles {
            if matches!(
                handle.await.unwrap().unwrap(),
                FulfillmentOutcome::Processed { .. }
            ) {
                processed += 1;
            }
        }
        assert_eq!(processed, 1);
        assert_eq!(store.stock(&slug("necessar")), Some(7));
    }

    #[tokio::test]
    async fn test_unpaid_session_is_not_claimed() {
        let store = fixture_store();
        let meta = metadata(&[("item_0_productSlug", "necessar"), ("item_0_quantity", "3")]);
        let id = session_id("cs_test_unpaid");

        let outcome = fulfill(&store, &id, PaymentStatus::Unpaid, &meta).await.unwrap();
        assert_eq!(outcome, FulfillmentOutcome::NotPaid);
        assert!(!store.is_processed(&id).await.unwrap());
        assert_eq!(store.stock(&slug("necessar")), Some(10));
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let store = fixture_store();
        let meta = metadata(&[
            ("item_0_productSlug", "necessar"),
            ("item_0_quantity", "2"),
            ("item_1_product", "Utan slug"),
            ("item_1_quantity", "1"),
            ("item_2_productSlug", "mini-pouch"),
            ("item_2_quantity", "0"),
            ("item_3_productSlug", "mini-pouch"),
            ("item_3_quantity", "tre"),
            ("item_4_productSlug", "skotvaska"),
            ("item_4_quantity", "1"),
        ]);

        let outcome = fulfill(&store, &session_id("cs_test_skip"), PaymentStatus::Paid, &meta)
            .await
            .unwrap();
        let FulfillmentOutcome::Processed { lines, skipped } = outcome else {
            panic!("expected processed outcome");
        };

        assert_eq!(lines.len(), 2);
        assert_eq!(
            skipped,
            vec![
                (1, SkipReason::MissingProduct),
                (2, SkipReason::InvalidQuantity),
                (3, SkipReason::InvalidQuantity),
            ]
        );
        assert_eq!(store.stock(&slug("necessar")), Some(8));
        assert_eq!(store.stock(&slug("mini-pouch")), Some(5));
        assert_eq!(store.stock(&slug("skotvaska")), Some(1));
    }

    #[tokio::test]
    async fn test_failed_line_does_not_block_others() {
        let store = fixture_store();
        let meta = metadata(&[
            ("item_0_productSlug", "borttagen"),
            ("item_0_quantity", "1"),
            ("item_1_productSlug", "necessar"),
            ("item_1_quantity", "1"),
        ]);
        let id = session_id("cs_test_partial");

        let outcome = fulfill(&store, &id, PaymentStatus::Paid, &meta).await.unwrap();
        let FulfillmentOutcome::Processed { lines, .. } = outcome else {
            panic!("expected processed outcome");
        };
        assert!(matches!(lines[0].result, LineResult::Failed { .. }));
        assert_eq!(lines[1].result, LineResult::Deducted { remaining: 9 });

        // Recorded even though a line failed.
        assert!(store.is_processed(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_stock_clamped_at_zero() {
        let store = fixture_store();
        let meta = metadata(&[("item_0_productSlug", "skotvaska"), ("item_0_quantity", "5")]);
        fulfill(&store, &session_id("cs_test_clamp"), PaymentStatus::Paid, &meta)
            .await
            .unwrap();
        assert_eq!(store.stock(&slug("skotvaska")), Some(0));
    }

    #[test]
    fn test_parse_orders_indices_numerically() {
        let meta = metadata(&[
            ("item_10_productSlug", "necessar"),
            ("item_10_quantity", "1"),
            ("item_2_productSlug", "mini-pouch"),
            ("item_2_quantity", "1"),
            ("other_key", "x"),
        ]);
        let (lines, skipped) = parse_order_lines(&meta);
        assert!(skipped.is_empty());
        assert_eq!(lines[0].index, 2);
        assert_eq!(lines[1].index, 10);
    }
}
