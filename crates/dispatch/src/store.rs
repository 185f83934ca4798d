use {anyhow::Result, async_trait::async_trait, sheetbot_common::FieldMap};

/// Remote table that receives one row per accepted submission.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Header row, in column order.
    async fn columns(&self) -> Result<Vec<String>>;

    /// Append `row`. Keys without a matching header are dropped; headers
    /// missing from `row` are written as empty cells.
    async fn write_row(&self, row: &FieldMap) -> Result<()>;
}
