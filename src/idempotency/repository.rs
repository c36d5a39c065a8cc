//! Idempotency Repository
//!
//! Stores `(key, request_hash, purchase_id)` for purchases created with an
//! `Idempotency-Key` header.

use sqlx::{query, query_as, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::DomainError;
use crate::error::AppResult;

/// What to do with a request carrying an idempotency key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyOutcome {
    /// First use of the key; go ahead and create the purchase
    New,
    /// The key already produced this purchase; return it unchanged
    Replay(Uuid),
}

/// Claim a key inside the purchase transaction.
///
/// A concurrent transaction holding the same key blocks here until it
/// finishes. If it committed, the purchase it created is replayed; if it
/// rolled back, this transaction takes the key over. Expired keys are
/// reclaimed.
///
/// # Errors
/// `IdempotencyConflict` when the key was used for a different request.
pub async fn claim(
    tx: &mut Transaction<'_, Postgres>,
    key: Uuid,
    request_hash: &str,
    ttl_hours: i32,
) -> AppResult<IdempotencyOutcome> {
    let inserted: Option<(Uuid,)> = query_as(
        r#"
        INSERT INTO idempotency_keys (key, request_hash, expires_at)
        VALUES ($1, $2, NOW() + make_interval(hours => $3))
        ON CONFLICT (key) DO UPDATE
            SET request_hash = EXCLUDED.request_hash,
                purchase_id = NULL,
                created_at = NOW(),
                expires_at = EXCLUDED.expires_at
            WHERE idempotency_keys.expires_at < NOW()
        RETURNING key
        "#,
    )
    .bind(key)
    .bind(request_hash)
    .bind(ttl_hours)
    .fetch_optional(&mut **tx)
    .await?;

    if inserted.is_some() {
        return Ok(IdempotencyOutcome::New);
    }

    let (stored_hash, purchase_id): (String, Option<Uuid>) = query_as(
        r#"
        SELECT request_hash, purchase_id
        FROM idempotency_keys
        WHERE key = $1
        "#,
    )
    .bind(key)
    .fetch_one(&mut **tx)
    .await?;

    if stored_hash != request_hash {
        tracing::warn!(idempotency_key = %key, "Idempotency key reused with a different request");
        return Err(DomainError::IdempotencyConflict(key).into());
    }

    match purchase_id {
        Some(purchase_id) => {
            tracing::info!(
                idempotency_key = %key,
                purchase_id = %purchase_id,
                "Replaying purchase for idempotency key"
            );
            Ok(IdempotencyOutcome::Replay(purchase_id))
        }
        // Only reachable if a committed key row lost its purchase.
        None => Err(DomainError::IdempotencyConflict(key).into()),
    }
}

/// Attach the created purchase to a claimed key.
pub async fn complete(
    tx: &mut Transaction<'_, Postgres>,
    key: Uuid,
    purchase_id: Uuid,
) -> AppResult<()> {
    query("UPDATE idempotency_keys SET purchase_id = $2 WHERE key = $1")
        .bind(key)
        .bind(purchase_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Delete expired idempotency keys
pub async fn delete_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let rows = query("DELETE FROM idempotency_keys WHERE expires_at < NOW()")
        .execute(pool)
        .await?
        .rows_affected();

    Ok(rows)
}

/// Compute SHA-256 hash of a request body for conflict detection
pub fn compute_request_hash(body: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_request_hash() {
        let body = br#"{"quantity":2}"#;
        let hash = compute_request_hash(body);

        // Hash should be 64 hex characters (SHA-256)
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, compute_request_hash(body));
        assert_ne!(hash, compute_request_hash(br#"{"quantity":3}"#));
    }

    #[test]
    fn test_outcome_equality() {
        let id = Uuid::new_v4();
        assert_eq!(IdempotencyOutcome::Replay(id), IdempotencyOutcome::Replay(id));
        assert_ne!(IdempotencyOutcome::New, IdempotencyOutcome::Replay(id));
    }
}
