use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::transactions;

pub const TRANSACTION_KIND_CHARGE: &str = "charge";
pub const TRANSACTION_KIND_REFUND: &str = "refund";

/// Append-only ledger row written once money actually moved.
#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = transactions)]
pub struct InsertTransactionEntity {
    pub booking_id: Uuid,
    pub payment_id: Uuid,
    pub kind: String,
    pub gateway: String,
    pub gateway_transaction_id: String,
    pub amount_minor: i64,
    pub currency: String,
}
