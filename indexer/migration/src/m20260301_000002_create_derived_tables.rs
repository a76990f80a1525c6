use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Static inputs
        manager
            .create_table(
                Table::create()
                    .table(AddressLabels::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AddressLabels::Address).text().not_null().primary_key())
                    .col(ColumnDef::new(AddressLabels::Label).text().not_null())
                    .col(ColumnDef::new(AddressLabels::Category).text().not_null())
                    .col(ColumnDef::new(AddressLabels::Confidence).text().not_null())
                    .col(ColumnDef::new(AddressLabels::Rationale).text().not_null().default(""))
                    .col(ColumnDef::new(AddressLabels::Source).text().not_null())
                    .col(
                        ColumnDef::new(AddressLabels::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_address_labels_category")
                    .table(AddressLabels::Table)
                    .col(AddressLabels::Category)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UnlockSchedule::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UnlockSchedule::UnlockDate).date().not_null())
                    .col(ColumnDef::new(UnlockSchedule::Category).text().not_null())
                    .col(ColumnDef::new(UnlockSchedule::Amount).decimal_len(38, 0).not_null())
                    .col(ColumnDef::new(UnlockSchedule::Basis).text().not_null())
                    .primary_key(
                        Index::create()
                            .col(UnlockSchedule::UnlockDate)
                            .col(UnlockSchedule::Category),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UnlockConfirmations::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UnlockConfirmations::TxHash).text().not_null().primary_key())
                    .col(ColumnDef::new(UnlockConfirmations::Source).text().not_null())
                    .to_owned(),
            )
            .await?;

        // Derived tables
        manager
            .create_table(
                Table::create()
                    .table(DailyBalances::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(DailyBalances::Date).date().not_null())
                    .col(ColumnDef::new(DailyBalances::Address).text().not_null())
                    .col(ColumnDef::new(DailyBalances::NetFlow).decimal_len(38, 0).not_null())
                    .col(ColumnDef::new(DailyBalances::CumulativeBalance).decimal_len(38, 0).not_null())
                    .primary_key(
                        Index::create()
                            .col(DailyBalances::Date)
                            .col(DailyBalances::Address),
                    )
                    .to_owned(),
            )
            .await?;

        // Latest balance per address
        manager
            .create_index(
                Index::create()
                    .name("idx_daily_balances_address_date")
                    .table(DailyBalances::Table)
                    .col(DailyBalances::Address)
                    .col(DailyBalances::Date)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TopHoldersSnapshot::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TopHoldersSnapshot::AsofDate).date().not_null())
                    .col(ColumnDef::new(TopHoldersSnapshot::Rank).integer().not_null())
                    .col(ColumnDef::new(TopHoldersSnapshot::Address).text().not_null())
                    .col(ColumnDef::new(TopHoldersSnapshot::Balance).decimal_len(38, 0).not_null())
                    .primary_key(
                        Index::create()
                            .col(TopHoldersSnapshot::AsofDate)
                            .col(TopHoldersSnapshot::Rank),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_top_holders_address")
                    .table(TopHoldersSnapshot::Table)
                    .col(TopHoldersSnapshot::Address)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ConcentrationTimeseries::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ConcentrationTimeseries::Date).date().not_null().primary_key())
                    .col(ColumnDef::new(ConcentrationTimeseries::Top10Share).double().not_null())
                    .col(ColumnDef::new(ConcentrationTimeseries::Top50Share).double().not_null())
                    .col(ColumnDef::new(ConcentrationTimeseries::Hhi).double().not_null())
                    .col(ColumnDef::new(ConcentrationTimeseries::Gini).double().not_null())
                    .col(ColumnDef::new(ConcentrationTimeseries::HolderCount).big_integer().not_null())
                    .col(
                        ColumnDef::new(ConcentrationTimeseries::SpikeFlag)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SupplyTimeseries::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SupplyTimeseries::Date).date().not_null().primary_key())
                    .col(ColumnDef::new(SupplyTimeseries::TotalSupply).decimal_len(38, 0).not_null())
                    .col(ColumnDef::new(SupplyTimeseries::Circulating).decimal_len(38, 0).not_null())
                    .col(ColumnDef::new(SupplyTimeseries::Locked).decimal_len(38, 0).not_null())
                    .col(
                        ColumnDef::new(SupplyTimeseries::NonCirculatingHeld)
                            .decimal_len(38, 0)
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(HolderFlags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(HolderFlags::AsofDate).date().not_null())
                    .col(ColumnDef::new(HolderFlags::Address).text().not_null())
                    .col(ColumnDef::new(HolderFlags::Flag).text().not_null())
                    .col(ColumnDef::new(HolderFlags::TimeWindow).text().not_null())
                    .col(ColumnDef::new(HolderFlags::Confidence).text().not_null())
                    .col(ColumnDef::new(HolderFlags::Rationale).text().not_null().default(""))
                    .primary_key(
                        Index::create()
                            .col(HolderFlags::AsofDate)
                            .col(HolderFlags::Address)
                            .col(HolderFlags::Flag)
                            .col(HolderFlags::TimeWindow),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_holder_flags_address")
                    .table(HolderFlags::Table)
                    .col(HolderFlags::Address)
                    .col(HolderFlags::AsofDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExchangeFlows::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ExchangeFlows::TimeWindow).text().not_null())
                    .col(ColumnDef::new(ExchangeFlows::AsofDate).date().not_null())
                    .col(ColumnDef::new(ExchangeFlows::Exchange).text().not_null())
                    .col(ColumnDef::new(ExchangeFlows::NetIn).decimal_len(38, 0).not_null())
                    .col(
                        ColumnDef::new(ExchangeFlows::UnlockProximity)
                            .text()
                            .not_null()
                            .default("none"),
                    )
                    .primary_key(
                        Index::create()
                            .col(ExchangeFlows::TimeWindow)
                            .col(ExchangeFlows::AsofDate)
                            .col(ExchangeFlows::Exchange),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_exchange_flows_asof")
                    .table(ExchangeFlows::Table)
                    .col(ExchangeFlows::AsofDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RealizedUnlocks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RealizedUnlocks::UnlockDate).date().not_null())
                    .col(ColumnDef::new(RealizedUnlocks::Category).text().not_null())
                    .col(ColumnDef::new(RealizedUnlocks::ScheduledAmount).decimal_len(38, 0).not_null())
                    .col(ColumnDef::new(RealizedUnlocks::RealizedAmount).decimal_len(38, 0).not_null())
                    .col(ColumnDef::new(RealizedUnlocks::RealizedDate).date().not_null())
                    .col(ColumnDef::new(RealizedUnlocks::TxHashes).json_binary().not_null())
                    .col(ColumnDef::new(RealizedUnlocks::Inferred).boolean().not_null().default(true))
                    .primary_key(
                        Index::create()
                            .col(RealizedUnlocks::UnlockDate)
                            .col(RealizedUnlocks::Category),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DerivationCursors::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(DerivationCursors::Component).text().not_null().primary_key())
                    .col(ColumnDef::new(DerivationCursors::LastComputedDate).date().not_null())
                    .col(
                        ColumnDef::new(DerivationCursors::UpdatedAt)
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
            .drop_table(Table::drop().table(DerivationCursors::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RealizedUnlocks::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExchangeFlows::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(HolderFlags::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SupplyTimeseries::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ConcentrationTimeseries::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TopHoldersSnapshot::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DailyBalances::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UnlockConfirmations::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UnlockSchedule::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AddressLabels::Table).if_exists().to_owned())
            .await
    }
}

#[derive(Iden)]
enum AddressLabels {
    Table,
    Address,
    Label,
    Category,
    Confidence,
    Rationale,
    Source,
    UpdatedAt,
}

#[derive(Iden)]
enum UnlockSchedule {
    Table,
    UnlockDate,
    Category,
    Amount,
    Basis,
}

#[derive(Iden)]
enum UnlockConfirmations {
    Table,
    TxHash,
    Source,
}

#[derive(Iden)]
enum DailyBalances {
    Table,
    Date,
    Address,
    NetFlow,
    CumulativeBalance,
}

#[derive(Iden)]
enum TopHoldersSnapshot {
    Table,
    AsofDate,
    Rank,
    Address,
    Balance,
}

#[derive(Iden)]
enum ConcentrationTimeseries {
    Table,
    Date,
    #[iden = "top10_share"]
    Top10Share,
    #[iden = "top50_share"]
    Top50Share,
    Hhi,
    Gini,
    HolderCount,
    SpikeFlag,
}

#[derive(Iden)]
enum SupplyTimeseries {
    Table,
    Date,
    TotalSupply,
    Circulating,
    Locked,
    NonCirculatingHeld,
}

#[derive(Iden)]
enum HolderFlags {
    Table,
    AsofDate,
    Address,
    Flag,
    TimeWindow,
    Confidence,
    Rationale,
}

#[derive(Iden)]
enum ExchangeFlows {
    Table,
    TimeWindow,
    AsofDate,
    Exchange,
    NetIn,
    UnlockProximity,
}

#[derive(Iden)]
enum RealizedUnlocks {
    Table,
    UnlockDate,
    Category,
    ScheduledAmount,
    RealizedAmount,
    RealizedDate,
    TxHashes,
    Inferred,
}

#[derive(Iden)]
enum DerivationCursors {
    Table,
    Component,
    LastComputedDate,
    UpdatedAt,
}
