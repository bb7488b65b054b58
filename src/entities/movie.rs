use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "movies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub region_code: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub region: String,
    pub title: String,
    pub release_year: i32,
    pub image_url: Option<String>,
    /// JSON array of `CinemaSummary`.
    #[sea_orm(column_type = "Text")]
    pub cinemas: String,
    /// JSON array of ISO dates.
    #[sea_orm(column_type = "Text")]
    pub showtimes: String,
    /// ISO date; compares correctly as text.
    pub last_showtime: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
