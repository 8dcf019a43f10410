//! SeaORM entity models

mod publication;

pub use publication::{
    ActiveModel as PublicationActiveModel, Column as PublicationColumn,
    Entity as PublicationEntity, Model as Publication, PublicationDraft, PublicationType,
};
