use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger row not found for booking {0}")]
    RowNotFound(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Opaque handle to a located ledger row, valid until the next mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowHandle(pub u64);

/// External system-of-record for financial reconciliation.
///
/// Row layout is decided by the caller; the ledger stores positional string
/// fields, spreadsheet-style.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn append_row(&self, fields: &[String]) -> Result<(), LedgerError>;

    /// Locate the row whose id column matches `booking_id`.
    async fn find_row(&self, booking_id: &str) -> Result<RowHandle, LedgerError>;

    async fn update_row(&self, handle: RowHandle, fields: &[String]) -> Result<(), LedgerError>;
}
