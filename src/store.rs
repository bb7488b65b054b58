use jiff::civil::Date;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    entities::{cinema, movie},
    models::{Cinema, CinemaSummary, Movie},
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbErr),
    #[error("corrupt {what} column: {detail}")]
    Corrupt { what: &'static str, detail: String },
    #[error("could not encode {what} column: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Region-partitioned cinema and movie tables.
///
/// Every table exposes the same three operations: query by partition, batch
/// put and batch delete. Replacing a region is two separate calls and is not
/// atomic; a failure in between leaves the partition empty until the next run.
#[derive(Clone)]
pub struct Store {
    db: DatabaseConnection,
}

impl Store {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn cinemas_by_region(&self, region_code: &str) -> StoreResult<Vec<Cinema>> {
        let rows = cinema::Entity::find()
            .filter(cinema::Column::RegionCode.eq(region_code))
            .order_by_asc(cinema::Column::Name)
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(Cinema::from).collect())
    }

    pub async fn insert_cinemas(&self, cinemas: &[Cinema]) -> StoreResult<u64> {
        if cinemas.is_empty() {
            return Ok(0);
        }

        let models = cinemas.iter().map(|c| cinema::ActiveModel {
            region_code: Set(c.region_code.clone()),
            id: Set(c.id.clone()),
            region: Set(c.region.clone()),
            name: Set(c.name.clone()),
            homepage_url: Set(c.homepage_url.clone()),
        });

        Ok(cinema::Entity::insert_many(models).exec_without_returning(&self.db).await?)
    }

    pub async fn delete_cinemas(&self, cinemas: &[Cinema]) -> StoreResult<u64> {
        let mut deleted = 0;
        for (region_code, ids) in group_keys(cinemas.iter().map(|c| (&c.region_code, &c.id))) {
            let res = cinema::Entity::delete_many()
                .filter(cinema::Column::RegionCode.eq(region_code))
                .filter(cinema::Column::Id.is_in(ids))
                .exec(&self.db)
                .await?;
            deleted += res.rows_affected;
        }
        Ok(deleted)
    }

    pub async fn movies_by_region(&self, region_code: &str) -> StoreResult<Vec<Movie>> {
        self.query_movies(movie_condition(region_code, None)).await
    }

    /// Movies whose last showtime is on or after `today`, soonest-ending first.
    pub async fn upcoming_movies(&self, region_code: &str, today: Date) -> StoreResult<Vec<Movie>> {
        self.query_movies(movie_condition(region_code, Some(today))).await
    }

    async fn query_movies(&self, condition: Condition) -> StoreResult<Vec<Movie>> {
        let rows = movie::Entity::find()
            .filter(condition)
            .order_by_asc(movie::Column::LastShowtime)
            .order_by_asc(movie::Column::Title)
            .all(&self.db)
            .await?;

        rows.into_iter().map(Movie::try_from).collect()
    }

    pub async fn insert_movies(&self, movies: &[Movie]) -> StoreResult<u64> {
        if movies.is_empty() {
            return Ok(0);
        }

        let mut models = Vec::with_capacity(movies.len());
        for m in movies {
            let cinemas = encode_column("cinemas", &m.cinemas)?;
            let showtimes = encode_column("showtimes", &m.showtimes)?;
            models.push(movie::ActiveModel {
                region_code: Set(m.region_code.clone()),
                id: Set(m.id.clone()),
                region: Set(m.region.clone()),
                title: Set(m.title.clone()),
                release_year: Set(m.release_year),
                image_url: Set(m.image_url.clone()),
                cinemas: Set(cinemas),
                showtimes: Set(showtimes),
                last_showtime: Set(m.last_showtime.to_string()),
            });
        }

        Ok(movie::Entity::insert_many(models).exec_without_returning(&self.db).await?)
    }

    pub async fn delete_movies(&self, movies: &[Movie]) -> StoreResult<u64> {
        let mut deleted = 0;
        for (region_code, ids) in group_keys(movies.iter().map(|m| (&m.region_code, &m.id))) {
            let res = movie::Entity::delete_many()
                .filter(movie::Column::RegionCode.eq(region_code))
                .filter(movie::Column::Id.is_in(ids))
                .exec(&self.db)
                .await?;
            deleted += res.rows_affected;
        }
        Ok(deleted)
    }
}

fn encode_column<T: Serialize + ?Sized>(what: &'static str, value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|source| StoreError::Encode { what, source })
}

fn movie_condition(region_code: &str, from: Option<Date>) -> Condition {
    let cond = Condition::all().add(movie::Column::RegionCode.eq(region_code));
    match from {
        Some(today) => cond.add(movie::Column::LastShowtime.gte(today.to_string())),
        None => cond,
    }
}

/// Groups (partition, id) keys by partition, keeping first-seen order.
fn group_keys<'a>(
    keys: impl Iterator<Item = (&'a String, &'a String)>,
) -> Vec<(&'a str, Vec<&'a str>)> {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for (partition, id) in keys {
        match groups.iter_mut().find(|(p, _)| *p == partition.as_str()) {
            Some((_, ids)) => ids.push(id.as_str()),
            None => groups.push((partition.as_str(), vec![id.as_str()])),
        }
    }
    groups
}

impl From<cinema::Model> for Cinema {
    fn from(row: cinema::Model) -> Self {
        Self {
            id: row.id,
            name: row.name,
            homepage_url: row.homepage_url,
            region: row.region,
            region_code: row.region_code,
        }
    }
}

impl TryFrom<movie::Model> for Movie {
    type Error = StoreError;

    fn try_from(row: movie::Model) -> Result<Self, Self::Error> {
        let cinemas: Vec<CinemaSummary> = serde_json::from_str(&row.cinemas)
            .map_err(|e| StoreError::Corrupt { what: "cinemas", detail: e.to_string() })?;
        let showtimes: Vec<Date> = serde_json::from_str(&row.showtimes)
            .map_err(|e| StoreError::Corrupt { what: "showtimes", detail: e.to_string() })?;
        let last_showtime: Date = row.last_showtime.parse().map_err(|e: jiff::Error| {
            StoreError::Corrupt { what: "last_showtime", detail: e.to_string() }
        })?;

        Ok(Self {
            id: row.id,
            title: row.title,
            release_year: row.release_year,
            image_url: row.image_url,
            region: row.region,
            region_code: row.region_code,
            cinemas,
            showtimes,
            last_showtime,
        })
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::memory_db;

    fn cinema(id: &str, name: &str, region_code: &str) -> Cinema {
        Cinema {
            id: id.to_string(),
            name: name.to_string(),
            homepage_url: Some(format!("https://{id}.example.com")),
            region: "Auckland".to_string(),
            region_code: region_code.to_string(),
        }
    }

    fn movie(id: &str, title: &str, showtimes: Vec<Date>) -> Movie {
        Movie {
            id: id.to_string(),
            title: title.to_string(),
            release_year: 1982,
            image_url: Some("https://img.example.com/poster.jpg".to_string()),
            region: "Auckland".to_string(),
            region_code: "auckland".to_string(),
            cinemas: vec![CinemaSummary { name: "Maya Cinemas".to_string(), homepage_url: None }],
            last_showtime: *showtimes.iter().max().unwrap(),
            showtimes,
        }
    }

    #[test]
    fn encode_failures_are_not_reported_as_corruption() {
        // json object keys must be strings
        let unencodable: std::collections::HashMap<(i32, i32), i32> = [((1, 2), 3)].into();

        let err = encode_column("showtimes", &unencodable).unwrap_err();

        assert!(matches!(err, StoreError::Encode { what: "showtimes", .. }));
        assert!(err.to_string().starts_with("could not encode showtimes column: "));
    }

    #[tokio::test]
    async fn cinemas_are_partitioned_by_region() {
        let store = Store::new(memory_db().await);
        let cinemas = vec![
            cinema("a", "Maya Cinemas", "auckland"),
            cinema("b", "Lighthouse Cinemas", "auckland"),
            cinema("c", "Event Cinemas", "canterbury"),
        ];

        assert_eq!(store.insert_cinemas(&cinemas).await.unwrap(), 3);

        let auckland = store.cinemas_by_region("auckland").await.unwrap();
        assert_eq!(auckland, vec![cinemas[1].clone(), cinemas[0].clone()]);

        assert_eq!(store.delete_cinemas(&auckland).await.unwrap(), 2);
        assert!(store.cinemas_by_region("auckland").await.unwrap().is_empty());
        assert_eq!(store.cinemas_by_region("canterbury").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_batches_are_no_ops() {
        let store = Store::new(memory_db().await);

        assert_eq!(store.insert_cinemas(&[]).await.unwrap(), 0);
        assert_eq!(store.delete_movies(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn movies_round_trip_through_json_columns() {
        let store = Store::new(memory_db().await);
        let stored = movie("m1", "Cannery Row", vec![date(2025, 5, 31), date(2025, 6, 1)]);

        store.insert_movies(std::slice::from_ref(&stored)).await.unwrap();

        assert_eq!(store.movies_by_region("auckland").await.unwrap(), vec![stored]);
    }

    #[tokio::test]
    async fn upcoming_movies_filter_on_last_showtime() {
        let store = Store::new(memory_db().await);
        let past = movie("m1", "Mr. Baseball", vec![date(2025, 5, 1), date(2025, 5, 2)]);
        let current = movie("m2", "Cannery Row", vec![date(2025, 5, 30), date(2025, 6, 1)]);
        store.insert_movies(&[past, current.clone()]).await.unwrap();

        let upcoming = store.upcoming_movies("auckland", date(2025, 6, 1)).await.unwrap();

        assert_eq!(upcoming, vec![current]);
    }
}
