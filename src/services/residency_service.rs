// src/services/residency_service.rs

use chrono::{DateTime, Duration, SubsecRound, Utc};
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    db::{FlatRepository, UserRepository},
    models::society::{Flat, FlatResidency, PayerResponse},
};

/// Outcome of payer resolution for one flat at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayerSelection {
    pub payer_id: i64,
    pub is_resident: bool,
    /// More than one residency covered the instant. The newest one won.
    pub anomaly: bool,
}

/// Covering residency wins over the owner; among several, the most recently created.
pub fn select_payer(flat: &Flat, residencies: &[FlatResidency], as_of: DateTime<Utc>) -> PayerSelection {
    let mut covering = residencies
        .iter()
        .filter(|r| r.flat_id == flat.id && r.covers(as_of));

    let Some(first) = covering.next() else {
        return PayerSelection {
            payer_id: flat.owner_id,
            is_resident: false,
            anomaly: false,
        };
    };

    let mut anomaly = false;
    let mut newest = first;
    for r in covering {
        anomaly = true;
        if (r.created_at, r.id) > (newest.created_at, newest.id) {
            newest = r;
        }
    }

    PayerSelection {
        payer_id: newest.resident_id,
        is_resident: true,
        anomaly,
    }
}

/// Same as [`select_payer`], but an overlapping-residency anomaly is reported, never swallowed.
pub fn resolve_payer_logged(flat: &Flat, residencies: &[FlatResidency], as_of: DateTime<Utc>) -> PayerSelection {
    let selection = select_payer(flat, residencies, as_of);
    if selection.anomaly {
        tracing::warn!(
            flat_id = flat.id,
            payer_id = selection.payer_id,
            %as_of,
            "data integrity anomaly: several residencies cover the same instant"
        );
    }
    selection
}

/// First instant at or after `at` not already used as an end date, stepping by 1ms.
pub fn next_free_instant(at: DateTime<Utc>, taken: &[DateTime<Utc>]) -> DateTime<Utc> {
    let mut candidate = at;
    while taken.contains(&candidate) {
        candidate += Duration::milliseconds(1);
    }
    candidate
}

#[derive(Clone)]
pub struct ResidencyService {
    pool: PgPool,
    flat_repo: FlatRepository,
    user_repo: UserRepository,
}

impl ResidencyService {
    pub fn new(pool: PgPool, flat_repo: FlatRepository, user_repo: UserRepository) -> Self {
        Self {
            pool,
            flat_repo,
            user_repo,
        }
    }

    pub async fn resolve_payer(
        &self,
        flat_id: i64,
        society_id: i64,
        as_of: DateTime<Utc>,
    ) -> Result<PayerResponse, AppError> {
        let flat = self.scoped_flat(flat_id, society_id).await?;
        let residencies = self
            .flat_repo
            .residencies_covering(&self.pool, flat.id, as_of)
            .await?;

        let selection = resolve_payer_logged(&flat, &residencies, as_of);

        Ok(PayerResponse {
            flat_id: flat.id,
            payer_id: selection.payer_id,
            is_resident: selection.is_resident,
            as_of,
        })
    }

    /// Closes the open residency and opens one for `resident_id`, atomically.
    /// Reassigning the current resident is a no-op.
    pub async fn reassign_resident(
        &self,
        flat_id: i64,
        society_id: i64,
        resident_id: i64,
    ) -> Result<FlatResidency, AppError> {
        // Stored timestamps keep microseconds at most; millisecond steps stay comparable.
        let now = Utc::now().trunc_subsecs(3);

        let mut tx = self.pool.begin().await?;

        // 1. Serialise against other reassignments of this flat
        let flat = self
            .flat_repo
            .lock_by_id(&mut *tx, flat_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Flat {flat_id} not found")))?;
        if flat.society_id != society_id {
            return Err(AppError::Forbidden(format!(
                "Flat {flat_id} does not belong to society {society_id}"
            )));
        }

        self.user_repo
            .find_in(&mut *tx, resident_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {resident_id} not found")))?;

        // 2. Already the active resident?
        let open = self.flat_repo.open_residencies(&mut *tx, flat_id).await?;
        if let [current] = open.as_slice() {
            if current.resident_id == resident_id {
                tracing::info!(flat_id, resident_id, "resident unchanged, nothing to do");
                return Ok(current.clone());
            }
        }
        if open.len() > 1 {
            tracing::warn!(
                flat_id,
                open = open.len(),
                "data integrity anomaly: several open residencies, closing all"
            );
        }

        // 3. Close whatever is open, stepping past end dates this resident already used
        for current in &open {
            let taken = self
                .flat_repo
                .end_dates_from(&mut *tx, flat_id, current.resident_id, now)
                .await?;
            let end_date = next_free_instant(now, &taken);
            self.flat_repo
                .close_residency(&mut *tx, current.id, end_date)
                .await?;

            tracing::info!(
                flat_id,
                residency_id = current.id,
                resident_id = current.resident_id,
                %end_date,
                "residency closed"
            );
        }

        // 4. Open the new one
        let residency = self
            .flat_repo
            .open_residency(&mut *tx, flat_id, resident_id, now)
            .await?;

        tx.commit().await?;

        tracing::info!(flat_id, resident_id, residency_id = residency.id, "residency opened");
        Ok(residency)
    }

    async fn scoped_flat(&self, flat_id: i64, society_id: i64) -> Result<Flat, AppError> {
        let flat = self
            .flat_repo
            .find_by_id(flat_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Flat {flat_id} not found")))?;

        if flat.society_id != society_id {
            return Err(AppError::Forbidden(format!(
                "Flat {flat_id} does not belong to society {society_id}"
            )));
        }
        Ok(flat)
    }
}
