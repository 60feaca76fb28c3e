use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One row per (group, resource type, pattern); the composite key is also
        // the conflict target of the grant upsert.
        manager
            .create_table(
                Table::create()
                    .table(Permissions::Table)
                    .if_not_exists()
                    .col(string(Permissions::Groupname))
                    .col(integer(Permissions::ResourceType))
                    .col(string(Permissions::Resource))
                    .col(
                        ColumnDef::new(Permissions::Permission)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .primary_key(
                        Index::create()
                            .col(Permissions::Groupname)
                            .col(Permissions::ResourceType)
                            .col(Permissions::Resource),
                    )
                    .to_owned(),
            )
            .await?;

        // Candidate lookups filter by type first
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_permissions_type_resource")
                    .table(Permissions::Table)
                    .col(Permissions::ResourceType)
                    .col(Permissions::Resource)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Permissions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Permissions {
    Table,
    Groupname,
    ResourceType,
    Resource,
    Permission,
}
