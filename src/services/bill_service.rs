// src/services/bill_service.rs

use std::{collections::HashMap, sync::Arc};

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::{
    common::{
        dates::{end_of_month, parse_month},
        error::AppError,
    },
    db::{bill_repo::NewBill, BillRepository, FlatRepository, SocietyRepository},
    models::{
        bill::{bill_status_after_payment, Bill, BillPaymentInfo, BillRow, BillStatus, BillView},
        payment::PaymentStatus,
        society::FlatResidency,
    },
    services::{
        charge_service::ChargeService,
        notification::{dispatch, Notification, Notifier},
        residency_service::resolve_payer_logged,
    },
};

#[derive(Clone)]
pub struct BillService {
    pool: PgPool,
    repo: BillRepository,
    flat_repo: FlatRepository,
    society_repo: SocietyRepository,
    charge_service: ChargeService,
    notifier: Arc<dyn Notifier>,
}

impl BillService {
    pub fn new(
        pool: PgPool,
        repo: BillRepository,
        flat_repo: FlatRepository,
        society_repo: SocietyRepository,
        charge_service: ChargeService,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            pool,
            repo,
            flat_repo,
            society_repo,
            charge_service,
            notifier,
        }
    }

    // =========================================================================
    //  GENERATION
    // =========================================================================

    /// Bills every flat of the society for `month`, all or nothing.
    pub async fn generate_bills(&self, society_id: i64, month: &str) -> Result<Vec<BillView>, AppError> {
        // 1. Canonical bill_month key
        let bill_month = end_of_month(parse_month(month)?);

        let mut tx = self.pool.begin().await?;

        self.society_repo
            .find_by_id(&mut *tx, society_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Society {society_id} not found")))?;

        if self.repo.exists_for_month(&mut *tx, society_id, bill_month).await? {
            return Err(AppError::BillsAlreadyGenerated);
        }

        // 2. Flats plus the residencies covering bill_month, loaded once
        let flats = self.flat_repo.list_by_society(&mut *tx, society_id).await?;
        let mut residencies: HashMap<i64, Vec<FlatResidency>> = HashMap::new();
        for r in self
            .flat_repo
            .residencies_covering_in_society(&mut *tx, society_id, bill_month)
            .await?
        {
            residencies.entry(r.flat_id).or_default().push(r);
        }

        // 3. One bill per flat; any failure rolls the whole run back
        let mut bill_ids = Vec::with_capacity(flats.len());
        for flat in &flats {
            let covering = residencies.get(&flat.id).map(Vec::as_slice).unwrap_or_default();
            let payer = resolve_payer_logged(flat, covering, bill_month);

            let charges = self
                .charge_service
                .compute_flat_charges(&mut tx, flat, society_id)
                .await?;

            let bill = self
                .repo
                .create(
                    &mut *tx,
                    NewBill {
                        user_id: payer.payer_id,
                        flat_id: flat.id,
                        society_id,
                        bill_month,
                        common_charges: &charges.common_charges,
                        flat_charges: &charges.flat_charges,
                        total_amount: charges.total,
                    },
                )
                .await?;

            bill_ids.push(bill.id);
        }

        // 4. Display shape (fresh bills carry no payments yet)
        let rows = self.repo.rows_by_ids(&mut *tx, &bill_ids).await?;

        tx.commit().await?;

        tracing::info!(society_id, %bill_month, bills = bill_ids.len(), "bills generated");
        Ok(rows.into_iter().map(|row| BillView::from_row(row, Vec::new())).collect())
    }

    // =========================================================================
    //  QUERIES
    // =========================================================================

    pub async fn society_bills(&self, society_id: i64) -> Result<Vec<BillView>, AppError> {
        let rows = self.repo.rows_by_society(society_id).await?;
        self.attach_payments(rows).await
    }

    pub async fn user_bills(&self, society_id: i64, user_id: i64) -> Result<Vec<BillView>, AppError> {
        let rows = self.repo.rows_by_society_and_user(society_id, user_id).await?;
        self.attach_payments(rows).await
    }

    pub async fn find(&self, bill_id: i64) -> Result<Option<Bill>, AppError> {
        self.repo.find_by_id(bill_id).await
    }

    async fn attach_payments(&self, rows: Vec<BillRow>) -> Result<Vec<BillView>, AppError> {
        let ids: Vec<i64> = rows.iter().map(|r| r.bill.id).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_bill: HashMap<i64, Vec<BillPaymentInfo>> = HashMap::new();
        for p in self.repo.payments_for_bills(&self.pool, &ids).await? {
            by_bill.entry(p.bill_id).or_default().push(p);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let payments = by_bill.remove(&row.bill.id).unwrap_or_default();
                BillView::from_row(row, payments)
            })
            .collect())
    }

    // =========================================================================
    //  MANUAL REASSIGNMENT
    // =========================================================================

    /// Moves a bill to a resident who lived in the flat during the bill month.
    /// Only the flat owner may do this.
    pub async fn assign_to_resident(
        &self,
        bill_id: i64,
        acting_user_id: i64,
        resident_id: i64,
    ) -> Result<BillView, AppError> {
        let bill = self
            .repo
            .find_by_id(bill_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Bill {bill_id} not found")))?;

        let flat = self
            .flat_repo
            .find_by_id(bill.flat_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Flat {} not found", bill.flat_id)))?;

        if flat.owner_id != acting_user_id {
            return Err(AppError::Forbidden("Only the flat owner can assign bills".into()));
        }
        if bill.status == BillStatus::Paid {
            return Err(AppError::BillAlreadyPaid(bill_id));
        }

        let covering = self
            .flat_repo
            .residencies_covering(&self.pool, flat.id, bill.bill_month)
            .await?;
        if !covering.iter().any(|r| r.resident_id == resident_id) {
            return Err(AppError::NotFound(
                "Resident not active for this flat in the bill month".into(),
            ));
        }

        self.repo.set_payer(&self.pool, bill_id, resident_id).await?;
        tracing::info!(bill_id, from = bill.user_id, to = resident_id, "bill reassigned");

        let rows = self.repo.rows_by_ids(&self.pool, &[bill_id]).await?;
        self.attach_payments(rows)
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("Bill {bill_id} not found")))
    }

    // =========================================================================
    //  SETTLEMENT
    // =========================================================================

    /// Applies a settled payment to its bill inside the caller's transaction.
    /// Returns the notification to send once that transaction commits.
    pub async fn apply_payment(
        &self,
        conn: &mut PgConnection,
        bill_id: i64,
        payment_status: PaymentStatus,
        paid_amount: Decimal,
    ) -> Result<Option<Notification>, AppError> {
        let Some(bill) = self.repo.lock_by_id(&mut *conn, bill_id).await? else {
            tracing::warn!(bill_id, "payment references a missing bill");
            return Ok(None);
        };

        let next = bill_status_after_payment(bill.status, payment_status, paid_amount, bill.total_amount);
        if next == bill.status {
            if payment_status == PaymentStatus::Success && next == BillStatus::Pending {
                tracing::info!(
                    bill_id,
                    %paid_amount,
                    total = %bill.total_amount,
                    "partial payment, bill stays pending"
                );
            }
            return Ok(None);
        }

        self.repo.set_status(&mut *conn, bill_id, next).await?;
        tracing::info!(bill_id, from = ?bill.status, to = ?next, "bill status updated");

        Ok((next == BillStatus::Paid).then_some(Notification::BillPaid {
            bill_id,
            user_id: bill.user_id,
            amount: paid_amount,
        }))
    }

    pub fn notify(&self, notification: Notification) {
        dispatch(&self.notifier, notification);
    }
}
