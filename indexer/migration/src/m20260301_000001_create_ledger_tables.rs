use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Blocks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Blocks::Number).big_integer().not_null().primary_key())
                    .col(ColumnDef::new(Blocks::Hash).text().not_null())
                    .col(ColumnDef::new(Blocks::ParentHash).text().not_null())
                    .col(ColumnDef::new(Blocks::Timestamp).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        // Day lookups for derivation
        manager
            .create_index(
                Index::create()
                    .name("idx_blocks_timestamp")
                    .table(Blocks::Table)
                    .col(Blocks::Timestamp)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Transactions::Hash).text().not_null().primary_key())
                    .col(ColumnDef::new(Transactions::BlockNumber).big_integer().not_null())
                    .col(ColumnDef::new(Transactions::FromAddress).text().not_null())
                    .col(ColumnDef::new(Transactions::ToAddress).text())
                    .col(ColumnDef::new(Transactions::Value).decimal_len(38, 0).not_null())
                    .col(ColumnDef::new(Transactions::Success).boolean())
                    .col(ColumnDef::new(Transactions::GasUsed).big_integer())
                    .col(ColumnDef::new(Transactions::MaxFeePerGas).decimal_len(38, 0))
                    .col(ColumnDef::new(Transactions::MaxPriorityFeePerGas).decimal_len(38, 0))
                    .col(ColumnDef::new(Transactions::CreatedContract).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_block")
                    .table(Transactions::Table)
                    .col(Transactions::BlockNumber)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Traces::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Traces::TxHash).text().not_null())
                    .col(ColumnDef::new(Traces::TraceIndex).integer().not_null())
                    .col(ColumnDef::new(Traces::BlockNumber).big_integer().not_null())
                    .col(ColumnDef::new(Traces::FromAddress).text().not_null())
                    .col(ColumnDef::new(Traces::ToAddress).text())
                    .col(ColumnDef::new(Traces::Value).decimal_len(38, 0).not_null())
                    .col(ColumnDef::new(Traces::Reverted).boolean().not_null().default(false))
                    .primary_key(Index::create().col(Traces::TxHash).col(Traces::TraceIndex))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_traces_block")
                    .table(Traces::Table)
                    .col(Traces::BlockNumber)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Transfers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Transfers::TxHash).text().not_null())
                    .col(ColumnDef::new(Transfers::Idx).integer().not_null())
                    .col(ColumnDef::new(Transfers::BlockNumber).big_integer().not_null())
                    .col(ColumnDef::new(Transfers::FromAddress).text().not_null())
                    .col(ColumnDef::new(Transfers::ToAddress).text().not_null())
                    .col(ColumnDef::new(Transfers::Value).decimal_len(38, 0).not_null())
                    .col(ColumnDef::new(Transfers::Source).text().not_null())
                    .primary_key(Index::create().col(Transfers::TxHash).col(Transfers::Idx))
                    .to_owned(),
            )
            .await?;

        // Truncation and day scans
        manager
            .create_index(
                Index::create()
                    .name("idx_transfers_block")
                    .table(Transfers::Table)
                    .col(Transfers::BlockNumber)
                    .to_owned(),
            )
            .await?;

        // Per-address history
        manager
            .create_index(
                Index::create()
                    .name("idx_transfers_from")
                    .table(Transfers::Table)
                    .col(Transfers::FromAddress)
                    .col(Transfers::BlockNumber)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transfers_to")
                    .table(Transfers::Table)
                    .col(Transfers::ToAddress)
                    .col(Transfers::BlockNumber)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SyncState::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SyncState::StreamId).text().not_null().primary_key())
                    .col(ColumnDef::new(SyncState::LastProcessedBlock).big_integer().not_null())
                    .col(ColumnDef::new(SyncState::LastProcessedHash).text())
                    .col(
                        ColumnDef::new(SyncState::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncState::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transfers::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Traces::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Blocks::Table).if_exists().to_owned())
            .await
    }
}

#[derive(Iden)]
enum Blocks {
    Table,
    Number,
    Hash,
    ParentHash,
    Timestamp,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Hash,
    BlockNumber,
    FromAddress,
    ToAddress,
    Value,
    Success,
    GasUsed,
    MaxFeePerGas,
    MaxPriorityFeePerGas,
    CreatedContract,
}

#[derive(Iden)]
enum Traces {
    Table,
    TxHash,
    TraceIndex,
    BlockNumber,
    FromAddress,
    ToAddress,
    Value,
    Reverted,
}

#[derive(Iden)]
enum Transfers {
    Table,
    TxHash,
    Idx,
    BlockNumber,
    FromAddress,
    ToAddress,
    Value,
    Source,
}

#[derive(Iden)]
enum SyncState {
    Table,
    StreamId,
    LastProcessedBlock,
    LastProcessedHash,
    UpdatedAt,
}
