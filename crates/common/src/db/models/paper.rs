//! Paper entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "papers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub abstract_text: Option<String>,

    /// Publication year
    pub year: Option<i32>,

    #[sea_orm(column_type = "Text", nullable)]
    pub url: Option<String>,

    /// Storage key of an uploaded PDF, if any
    #[sea_orm(column_type = "Text", nullable)]
    pub pdf_key: Option<String>,

    /// User who submitted the paper
    pub added_by: Uuid,

    pub added_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AddedBy",
        to = "super::user::Column::Id"
    )]
    User,

    #[sea_orm(has_many = "super::paper_author::Entity")]
    PaperAuthors,

    #[sea_orm(has_many = "super::paper_tag::Entity")]
    PaperTags,

    #[sea_orm(has_many = "super::reference::Entity")]
    References,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::reference::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::References.def()
    }
}

impl Related<super::author::Entity> for Entity {
    fn to() -> RelationDef {
        super::paper_author::Relation::Author.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::paper_author::Relation::Paper.def().rev())
    }
}

impl Related<super::tag::Entity> for Entity {
    fn to() -> RelationDef {
        super::paper_tag::Relation::Tag.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::paper_tag::Relation::Paper.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
