//! Upsert layer for mirrored ERP records.
//!
//! All writes key on (tenant_id, remote_id), so replaying a chunk after a
//! crash re-writes the same rows instead of duplicating them.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult,
    QueryFilter, Set,
};

use crate::entities::{invoices, prelude::*, receivables, sales_orders};
use crate::models::erp::{InvoiceRecord, OrderRecord, ReceivableRecord};
use crate::sync::run::SyncError;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn upsert_invoice(&self, record: &InvoiceRecord) -> Result<(), SyncError>;

    async fn upsert_receivable(&self, record: &ReceivableRecord) -> Result<(), SyncError>;

    async fn upsert_order(&self, record: &OrderRecord) -> Result<(), SyncError>;

    /// Distinct product ids referenced by mirrored orders in the window.
    /// Feeds the cache pre-enrichment heuristic.
    async fn distinct_order_product_ids(
        &self,
        tenant_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<String>, SyncError>;
}

pub struct SeaOrmRecordStore {
    db: DatabaseConnection,
}

impl SeaOrmRecordStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for SeaOrmRecordStore {
    async fn upsert_invoice(&self, record: &InvoiceRecord) -> Result<(), SyncError> {
        let now = Utc::now().naive_utc();

        let existing = Invoices::find()
            .filter(invoices::Column::TenantId.eq(&record.tenant_id))
            .filter(invoices::Column::RemoteId.eq(&record.remote_id))
            .one(&self.db)
            .await?;

        match existing {
            Some(row) => {
                let mut model: invoices::ActiveModel = row.into();
                model.number = Set(record.number.clone());
                model.issue_date = Set(record.issue_date);
                model.total_amount = Set(record.total_amount);
                model.status = Set(record.status.clone());
                model.customer_name = Set(record.customer_name.clone());
                model.updated_at = Set(now);
                model.update(&self.db).await?;
            }
            None => {
                let model = invoices::ActiveModel {
                    tenant_id: Set(record.tenant_id.clone()),
                    remote_id: Set(record.remote_id.clone()),
                    number: Set(record.number.clone()),
                    issue_date: Set(record.issue_date),
                    total_amount: Set(record.total_amount),
                    status: Set(record.status.clone()),
                    customer_name: Set(record.customer_name.clone()),
                    updated_at: Set(now),
                    ..Default::default()
                };
                model.insert(&self.db).await?;
            }
        }

        Ok(())
    }

    async fn upsert_receivable(&self, record: &ReceivableRecord) -> Result<(), SyncError> {
        let now = Utc::now().naive_utc();

        let existing = Receivables::find()
            .filter(receivables::Column::TenantId.eq(&record.tenant_id))
            .filter(receivables::Column::RemoteId.eq(&record.remote_id))
            .one(&self.db)
            .await?;

        match existing {
            Some(row) => {
                let mut model: receivables::ActiveModel = row.into();
                model.due_date = Set(record.due_date);
                model.amount = Set(record.amount);
                model.status = Set(record.status.clone());
                model.customer_name = Set(record.customer_name.clone());
                model.updated_at = Set(now);
                model.update(&self.db).await?;
            }
            None => {
                let model = receivables::ActiveModel {
                    tenant_id: Set(record.tenant_id.clone()),
                    remote_id: Set(record.remote_id.clone()),
                    due_date: Set(record.due_date),
                    amount: Set(record.amount),
                    status: Set(record.status.clone()),
                    customer_name: Set(record.customer_name.clone()),
                    updated_at: Set(now),
                    ..Default::default()
                };
                model.insert(&self.db).await?;
            }
        }

        Ok(())
    }

    async fn upsert_order(&self, record: &OrderRecord) -> Result<(), SyncError> {
        let now = Utc::now().naive_utc();
        let items = serde_json::to_value(&record.items)
            .map_err(|e| SyncError::Store(format!("failed to encode order items: {}", e)))?;

        let existing = SalesOrders::find()
            .filter(sales_orders::Column::TenantId.eq(&record.tenant_id))
            .filter(sales_orders::Column::RemoteId.eq(&record.remote_id))
            .one(&self.db)
            .await?;

        match existing {
            Some(row) => {
                let mut model: sales_orders::ActiveModel = row.into();
                model.order_date = Set(record.order_date);
                model.status = Set(record.status.clone());
                model.customer_name = Set(record.customer_name.clone());
                model.total_amount = Set(record.total_amount);
                model.items = Set(items);
                model.updated_at = Set(now);
                model.update(&self.db).await?;
            }
            None => {
                let model = sales_orders::ActiveModel {
                    tenant_id: Set(record.tenant_id.clone()),
                    remote_id: Set(record.remote_id.clone()),
                    order_date: Set(record.order_date),
                    status: Set(record.status.clone()),
                    customer_name: Set(record.customer_name.clone()),
                    total_amount: Set(record.total_amount),
                    items: Set(items),
                    updated_at: Set(now),
                    ..Default::default()
                };
                model.insert(&self.db).await?;
            }
        }

        Ok(())
    }

    async fn distinct_order_product_ids(
        &self,
        tenant_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<String>, SyncError> {
        #[derive(Debug, FromQueryResult)]
        struct ProductIdRow {
            product_id: String,
        }

        // Items live in a jsonb array; Postgres unnests it cheaply.
        let rows: Vec<ProductIdRow> = ProductIdRow::find_by_statement(
            sea_orm::Statement::from_sql_and_values(
                sea_orm::DatabaseBackend::Postgres,
                r#"
                SELECT DISTINCT item->>'product_id' AS product_id
                FROM sales_orders, jsonb_array_elements(items) AS item
                WHERE tenant_id = $1
                  AND order_date BETWEEN $2 AND $3
                  AND item->>'product_id' IS NOT NULL
                "#,
                vec![tenant_id.into(), start.into(), end.into()],
            ),
        )
        .all(&self.db)
        .await?;

        Ok(rows.into_iter().map(|r| r.product_id).collect())
    }
}
