//! SeaORM entity models
//!
//! Database entities for the Papershelf catalog

mod author;
mod paper;
mod paper_author;
mod paper_tag;
mod reference;
mod tag;
mod user;

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
};

pub use paper::{
    Entity as PaperEntity,
    Model as Paper,
    ActiveModel as PaperActiveModel,
    Column as PaperColumn,
};

pub use author::{
    Entity as AuthorEntity,
    Model as Author,
    ActiveModel as AuthorActiveModel,
    Column as AuthorColumn,
};

pub use tag::{
    Entity as TagEntity,
    Model as Tag,
    ActiveModel as TagActiveModel,
    Column as TagColumn,
};

pub use paper_author::{
    Entity as PaperAuthorEntity,
    Model as PaperAuthor,
    ActiveModel as PaperAuthorActiveModel,
    Column as PaperAuthorColumn,
};

pub use paper_tag::{
    Entity as PaperTagEntity,
    Model as PaperTag,
    ActiveModel as PaperTagActiveModel,
    Column as PaperTagColumn,
};

pub use reference::{
    Entity as ReferenceEntity,
    Model as Reference,
    ActiveModel as ReferenceActiveModel,
    Column as ReferenceColumn,
};
