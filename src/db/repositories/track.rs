use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::info;

use crate::entities::tracks;

/// Input for one accepted upload; the caller has already written the file.
#[derive(Debug, Clone)]
pub struct NewTrack {
    pub original_name: String,
    pub filename: String,
    pub stored_name: String,
    pub duration_secs: Option<i64>,
    pub user_id: Option<i32>,
}

pub struct TrackRepository {
    conn: DatabaseConnection,
}

impl TrackRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert all records for one upload batch inside a single transaction.
    /// A failure (including a `stored_name` uniqueness violation) rolls the
    /// whole batch back; the caller is responsible for removing the files it
    /// wrote during the request.
    pub async fn insert_batch(&self, batch: &[NewTrack]) -> Result<Vec<tracks::Model>> {
        let txn = self.conn.begin().await?;
        let now = chrono::Utc::now().to_rfc3339();

        let mut inserted = Vec::with_capacity(batch.len());
        for track in batch {
            let model = tracks::ActiveModel {
                original_name: Set(track.original_name.clone()),
                filename: Set(track.filename.clone()),
                stored_name: Set(track.stored_name.clone()),
                duration_secs: Set(track.duration_secs),
                uploaded_at: Set(now.clone()),
                user_id: Set(track.user_id),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .context("Failed to insert track record")?;

            inserted.push(model);
        }

        txn.commit().await?;
        info!("Recorded {} uploaded track(s)", inserted.len());
        Ok(inserted)
    }

    /// Tracks ordered by upload time descending, optionally filtered by a
    /// substring of the original name. SQLite LIKE is case-insensitive for
    /// ASCII, which matches the search contract.
    pub async fn list(
        &self,
        query: Option<&str>,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<tracks::Model>, u64)> {
        let paginator = Self::filtered(query)
            .order_by_desc(tracks::Column::UploadedAt)
            .order_by_desc(tracks::Column::Id)
            .paginate(&self.conn, page_size);

        let total_pages = paginator.num_pages().await?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .context("Failed to fetch track page")?;

        Ok((items, total_pages))
    }

    /// Unpaginated listing for the admin panel.
    pub async fn list_all(&self, query: Option<&str>) -> Result<Vec<tracks::Model>> {
        let items = Self::filtered(query)
            .order_by_desc(tracks::Column::UploadedAt)
            .order_by_desc(tracks::Column::Id)
            .all(&self.conn)
            .await?;

        Ok(items)
    }

    fn filtered(query: Option<&str>) -> sea_orm::Select<tracks::Entity> {
        let mut select = tracks::Entity::find();
        if let Some(q) = query
            && !q.is_empty()
        {
            select = select.filter(tracks::Column::OriginalName.contains(q));
        }
        select
    }

    pub async fn get(&self, id: i32) -> Result<Option<tracks::Model>> {
        let track = tracks::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query track by ID")?;

        Ok(track)
    }

    pub async fn get_by_stored_name(&self, stored_name: &str) -> Result<Option<tracks::Model>> {
        let track = tracks::Entity::find()
            .filter(tracks::Column::StoredName.eq(stored_name))
            .one(&self.conn)
            .await
            .context("Failed to query track by stored name")?;

        Ok(track)
    }

    /// Explicit "all tracks where user_id = X" query used by the
    /// delete-user cascade.
    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<tracks::Model>> {
        let items = tracks::Entity::find()
            .filter(tracks::Column::UserId.eq(user_id))
            .all(&self.conn)
            .await?;

        Ok(items)
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = tracks::Entity::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }
}
