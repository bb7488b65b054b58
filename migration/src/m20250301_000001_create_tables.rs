use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Cinemas::Table)
                    .if_not_exists()
                    .col(string(Cinemas::RegionCode))
                    .col(string(Cinemas::Id))
                    .col(string(Cinemas::Region))
                    .col(string(Cinemas::Name))
                    .col(string_null(Cinemas::HomepageUrl))
                    .primary_key(Index::create().col(Cinemas::RegionCode).col(Cinemas::Id))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Movies::Table)
                    .if_not_exists()
                    .col(string(Movies::RegionCode))
                    .col(string(Movies::Id))
                    .col(string(Movies::Region))
                    .col(string(Movies::Title))
                    .col(integer(Movies::ReleaseYear))
                    .col(string_null(Movies::ImageUrl))
                    .col(text(Movies::Cinemas))
                    .col(text(Movies::Showtimes))
                    .col(string(Movies::LastShowtime))
                    .primary_key(Index::create().col(Movies::RegionCode).col(Movies::Id))
                    .to_owned(),
            )
            .await?;

        // backs the "future showtimes only" read query
        manager
            .create_index(
                Index::create()
                    .name("idx_movies_region_last_showtime")
                    .table(Movies::Table)
                    .col(Movies::RegionCode)
                    .col(Movies::LastShowtime)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Movies::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Cinemas::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Cinemas {
    Table,
    RegionCode,
    Id,
    Region,
    Name,
    HomepageUrl,
}

#[derive(DeriveIden)]
enum Movies {
    Table,
    RegionCode,
    Id,
    Region,
    Title,
    ReleaseYear,
    ImageUrl,
    Cinemas,
    Showtimes,
    LastShowtime,
}
