use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tracks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Filename exactly as supplied by the uploader (display only).
    pub original_name: String,

    /// Sanitized version of the original name, safe for download headers.
    pub filename: String,

    /// Random on-disk name; also the playback lookup key.
    #[sea_orm(unique)]
    pub stored_name: String,

    /// Playback length in whole seconds; None when probing failed.
    pub duration_secs: Option<i64>,

    pub uploaded_at: String,

    /// Owning user; None for anonymous uploads.
    pub user_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
