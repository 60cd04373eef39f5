use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_catalog_tables::Migration),
            Box::new(m20240101_000002_create_prepared_stock_table::Migration),
            Box::new(m20240101_000003_create_orders_tables::Migration),
            Box::new(m20240101_000004_create_production_runs_table::Migration),
        ]
    }
}

#[derive(DeriveIden)]
enum Inventory {
    Table,
    Id,
    Name,
    BatchPurchaseCost,
    CurrentStock,
    EstimatedUsedPerDay,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Recipes {
    Table,
    Id,
    Name,
    PricePerServing,
    OrdersPerBatch,
    Type,
    Image,
    CreatedAt,
}

#[derive(DeriveIden)]
enum InventoryRecipes {
    Table,
    Id,
    InventoryId,
    RecipeId,
    InventoryQuantity,
}

#[derive(DeriveIden)]
enum Cooked {
    Table,
    Id,
    RecipeId,
    CurrentStock,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    Tax,
    TotalCost,
    OrderTime,
    CashierId,
    IsCompleted,
    CustomerEmail,
    OrderInfo,
    CompletedAt,
}

#[derive(DeriveIden)]
enum OrderRecipes {
    Table,
    Id,
    OrderId,
    RecipeId,
    Quantity,
}

#[derive(DeriveIden)]
enum ProductionRuns {
    Table,
    Id,
    RecipeId,
    ServingsProduced,
    IdempotencyKey,
    CreatedAt,
}

mod m20240101_000001_create_catalog_tables {
    use super::{Inventory, InventoryRecipes, Recipes};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Inventory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Inventory::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Inventory::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Inventory::BatchPurchaseCost)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Inventory::CurrentStock)
                                .integer()
                                .not_null()
                                .default(0)
                                .check(Expr::col(Inventory::CurrentStock).gte(0)),
                        )
                        .col(
                            ColumnDef::new(Inventory::EstimatedUsedPerDay)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Inventory::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Inventory::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Recipes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Recipes::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Recipes::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Recipes::PricePerServing)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Recipes::OrdersPerBatch)
                                .integer()
                                .not_null()
                                .default(1)
                                .check(Expr::col(Recipes::OrdersPerBatch).gte(1)),
                        )
                        .col(ColumnDef::new(Recipes::Type).string_len(16).not_null())
                        .col(ColumnDef::new(Recipes::Image).string().null())
                        .col(
                            ColumnDef::new(Recipes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InventoryRecipes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryRecipes::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(InventoryRecipes::InventoryId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryRecipes::RecipeId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryRecipes::InventoryQuantity)
                                .integer()
                                .not_null()
                                .default(0)
                                .check(Expr::col(InventoryRecipes::InventoryQuantity).gte(0)),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_recipes_inventory_id")
                                .from(InventoryRecipes::Table, InventoryRecipes::InventoryId)
                                .to(Inventory::Table, Inventory::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_recipes_recipe_id")
                                .from(InventoryRecipes::Table, InventoryRecipes::RecipeId)
                                .to(Recipes::Table, Recipes::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // One BOM entry per ingredient and recipe
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_recipes_pair")
                        .table(InventoryRecipes::Table)
                        .col(InventoryRecipes::RecipeId)
                        .col(InventoryRecipes::InventoryId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_recipes_inventory_id")
                        .table(InventoryRecipes::Table)
                        .col(InventoryRecipes::InventoryId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryRecipes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Recipes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Inventory::Table).to_owned())
                .await
        }
    }
}

mod m20240101_000002_create_prepared_stock_table {
    use super::{Cooked, Recipes};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_prepared_stock_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Cooked::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Cooked::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Cooked::RecipeId)
                                .integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Cooked::CurrentStock)
                                .integer()
                                .not_null()
                                .default(0)
                                .check(Expr::col(Cooked::CurrentStock).gte(0)),
                        )
                        .col(
                            ColumnDef::new(Cooked::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cooked_recipe_id")
                                .from(Cooked::Table, Cooked::RecipeId)
                                .to(Recipes::Table, Recipes::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Cooked::Table).to_owned())
                .await
        }
    }
}

mod m20240101_000003_create_orders_tables {
    use super::{OrderRecipes, Orders, Recipes};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_orders_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Orders::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Orders::Tax)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::TotalCost)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::OrderTime)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::CashierId).integer().not_null())
                        .col(
                            ColumnDef::new(Orders::IsCompleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Orders::CustomerEmail).string().null())
                        .col(ColumnDef::new(Orders::OrderInfo).json().not_null())
                        .col(
                            ColumnDef::new(Orders::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_is_completed")
                        .table(Orders::Table)
                        .col(Orders::IsCompleted)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderRecipes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderRecipes::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderRecipes::OrderId).integer().not_null())
                        .col(ColumnDef::new(OrderRecipes::RecipeId).integer().not_null())
                        .col(
                            ColumnDef::new(OrderRecipes::Quantity)
                                .integer()
                                .not_null()
                                .default(0)
                                .check(Expr::col(OrderRecipes::Quantity).gte(0)),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_recipes_order_id")
                                .from(OrderRecipes::Table, OrderRecipes::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_recipes_recipe_id")
                                .from(OrderRecipes::Table, OrderRecipes::RecipeId)
                                .to(Recipes::Table, Recipes::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_recipes_order_recipe")
                        .table(OrderRecipes::Table)
                        .col(OrderRecipes::OrderId)
                        .col(OrderRecipes::RecipeId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderRecipes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }
}

mod m20240101_000004_create_production_runs_table {
    use super::{ProductionRuns, Recipes};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_production_runs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductionRuns::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionRuns::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ProductionRuns::RecipeId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionRuns::ServingsProduced)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionRuns::IdempotencyKey)
                                .string()
                                .null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(ProductionRuns::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_production_runs_recipe_id")
                                .from(ProductionRuns::Table, ProductionRuns::RecipeId)
                                .to(Recipes::Table, Recipes::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_production_runs_recipe_id")
                        .table(ProductionRuns::Table)
                        .col(ProductionRuns::RecipeId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductionRuns::Table).to_owned())
                .await
        }
    }
}
