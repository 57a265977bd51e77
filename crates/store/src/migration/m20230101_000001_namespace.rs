use sea_orm_migration::prelude::*;

use super::{id_col, millis_col};
use crate::db::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();

        manager
            .create_table(
                Table::create()
                    .table(Paths::Table)
                    .if_not_exists()
                    .col(id_col(backend, Paths::PathId, false))
                    .col(
                        ColumnDef::new(Paths::PathTargetType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(id_col(backend, Paths::PathTargetId, false))
                    .col(ColumnDef::new(Paths::PathIsAlias).boolean().not_null())
                    .col(
                        ColumnDef::new(Paths::PathValue)
                            .string_len(PATH_VALUE_LEN)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Paths::PathValueUnique)
                            .string_len(PATH_VALUE_LEN)
                            .not_null(),
                    )
                    .col(id_col(backend, Paths::PathCreatedBy, false))
                    .col(millis_col(Paths::PathCreated))
                    .col(millis_col(Paths::PathUpdated))
                    .primary_key(Index::create().name("pk_paths").col(Paths::PathId))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("paths_value_unique_idx")
                    .table(Paths::Table)
                    .col(Paths::PathValueUnique)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("paths_target_idx")
                    .table(Paths::Table)
                    .col(Paths::PathTargetType)
                    .col(Paths::PathTargetId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Spaces::Table)
                    .if_not_exists()
                    .col(id_col(backend, Spaces::SpaceId, false))
                    .col(id_col(backend, Spaces::SpaceParentId, true))
                    .col(
                        ColumnDef::new(Spaces::SpaceUid)
                            .string_len(UID_LEN)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Spaces::SpaceDescription).text().not_null())
                    .col(ColumnDef::new(Spaces::SpaceIsPublic).boolean().not_null())
                    .col(id_col(backend, Spaces::SpaceCreatedBy, false))
                    .col(millis_col(Spaces::SpaceCreated))
                    .col(millis_col(Spaces::SpaceUpdated))
                    .primary_key(Index::create().name("pk_spaces").col(Spaces::SpaceId))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("spaces_parent_idx")
                    .table(Spaces::Table)
                    .col(Spaces::SpaceParentId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Repositories::Table)
                    .if_not_exists()
                    .col(id_col(backend, Repositories::RepoId, false))
                    .col(id_col(backend, Repositories::RepoParentId, false))
                    .col(
                        ColumnDef::new(Repositories::RepoUid)
                            .string_len(UID_LEN)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Repositories::RepoDescription)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Repositories::RepoIsPublic)
                            .boolean()
                            .not_null(),
                    )
                    .col(id_col(backend, Repositories::RepoCreatedBy, false))
                    .col(millis_col(Repositories::RepoCreated))
                    .col(millis_col(Repositories::RepoUpdated))
                    .col(
                        ColumnDef::new(Repositories::RepoGitUid)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Repositories::RepoDefaultBranch)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(id_col(backend, Repositories::RepoForkId, true))
                    .col(counter_col(Repositories::RepoNumForks))
                    .col(counter_col(Repositories::RepoNumPulls))
                    .col(counter_col(Repositories::RepoNumClosedPulls))
                    .col(counter_col(Repositories::RepoNumOpenPulls))
                    .primary_key(
                        Index::create()
                            .name("pk_repositories")
                            .col(Repositories::RepoId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("repositories_parent_idx")
                    .table(Repositories::Table)
                    .col(Repositories::RepoParentId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Repositories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Spaces::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Paths::Table).to_owned())
            .await?;
        Ok(())
    }
}

fn counter_col(col: impl Iden + 'static) -> ColumnDef {
    ColumnDef::new(col)
        .big_integer()
        .not_null()
        .default(0)
        .to_owned()
}
