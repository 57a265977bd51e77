use sea_orm_migration::prelude::*;

use super::{id_col, millis_col};
use crate::db::Pipelines;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();

        manager
            .create_table(
                Table::create()
                    .table(Pipelines::Table)
                    .if_not_exists()
                    .col(id_col(backend, Pipelines::PipelineId, false))
                    .col(
                        ColumnDef::new(Pipelines::PipelineDescription)
                            .text()
                            .not_null(),
                    )
                    .col(id_col(backend, Pipelines::PipelineSpaceId, false))
                    .col(
                        ColumnDef::new(Pipelines::PipelineUid)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Pipelines::PipelineSeq)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(id_col(backend, Pipelines::PipelineRepoId, true))
                    .col(
                        ColumnDef::new(Pipelines::PipelineRepoType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Pipelines::PipelineRepoName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Pipelines::PipelineDefaultBranch)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Pipelines::PipelineConfigPath)
                            .string_len(1024)
                            .not_null(),
                    )
                    .col(millis_col(Pipelines::PipelineCreated))
                    .col(millis_col(Pipelines::PipelineUpdated))
                    .col(
                        ColumnDef::new(Pipelines::PipelineVersion)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk_pipelines")
                            .col(Pipelines::PipelineId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("pipelines_space_uid_idx")
                    .table(Pipelines::Table)
                    .col(Pipelines::PipelineSpaceId)
                    .col(Pipelines::PipelineUid)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Pipelines::Table).to_owned())
            .await?;
        Ok(())
    }
}
