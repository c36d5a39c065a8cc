//! Promo Handler
//!
//! Assigning promos to customers and listing what a customer can use now.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::assignment::{self, AssignedPromo};
use crate::audit::{self, AuditAction, AuditLogBuilder};
use crate::domain::{evaluate, DomainError, OperationContext, PromoAssignment};
use crate::error::AppResult;
use crate::repository::customers;

use super::AssignPromoCommand;

pub struct PromoHandler {
    pool: PgPool,
}

impl PromoHandler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Assign a promo to a customer.
    ///
    /// The promo's own state is not checked: an inactive or expired promo can
    /// be assigned, it just will not be usable until eligible.
    pub async fn assign(
        &self,
        command: AssignPromoCommand,
        context: &OperationContext,
    ) -> AppResult<PromoAssignment> {
        let mut tx = self.pool.begin().await?;

        let assignment = assignment::assign(&mut tx, command.promo_id, command.customer_id).await?;

        audit::log(
            &mut tx,
            AuditLogBuilder::new(AuditAction::PromoAssigned)
                .resource_type("promo_assignment")
                .resource_id(assignment.id)
                .after_state(&assignment),
            context,
        )
        .await?;

        tx.commit().await?;

        Ok(assignment)
    }

    /// All assignments of a customer, used or not
    pub async fn list_for_customer(&self, customer_id: Uuid) -> AppResult<Vec<AssignedPromo>> {
        let mut tx = self.pool.begin().await?;

        if !customers::customer_exists(&mut tx, customer_id).await? {
            return Err(DomainError::CustomerNotFound(customer_id).into());
        }
        let assigned = assignment::list_with_promos(&mut tx, customer_id).await?;

        tx.commit().await?;
        Ok(assigned)
    }

    /// Promos the customer could apply to a purchase at `now`
    pub async fn available_for_customer(
        &self,
        customer_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<AssignedPromo>> {
        let assigned = self.list_for_customer(customer_id).await?;

        Ok(assigned
            .into_iter()
            .filter(|a| evaluate(&a.promo, Some(&a.assignment), customer_id, now).is_eligible())
            .collect())
    }
}
