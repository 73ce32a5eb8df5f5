use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    admin_log::{AdminLog, NewAdminLog},
    feedback::{Feedback, NewFeedback},
    petition::{NewPetition, Petition},
    poll::{NewPoll, Poll},
    response::{NewPetitionResponse, PetitionResponse},
    settings::Settings,
    signature::{NewSignature, Signature},
    user::{NewUser, User},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

/// Implement [`MongoCollection`] for every listed type, sharing one collection name.
macro_rules! collection {
    ($name:expr => $($ty:ty),+) => {
        $(
            impl MongoCollection for $ty {
                const NAME: &'static str = $name;
            }
        )+
    };
}

pub const USERS: &str = "users";
collection!(USERS => User, NewUser);

pub const PETITIONS: &str = "petitions";
collection!(PETITIONS => Petition, NewPetition);

pub const SIGNATURES: &str = "signatures";
collection!(SIGNATURES => Signature, NewSignature);

pub const PETITION_RESPONSES: &str = "petition_responses";
collection!(PETITION_RESPONSES => PetitionResponse, NewPetitionResponse);

pub const POLLS: &str = "polls";
collection!(POLLS => Poll, NewPoll);

pub const FEEDBACK: &str = "feedback";
collection!(FEEDBACK => Feedback, NewFeedback);

pub const ADMIN_LOGS: &str = "admin_logs";
collection!(ADMIN_LOGS => AdminLog, NewAdminLog);

pub const SETTINGS: &str = "settings";
collection!(SETTINGS => Settings);

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // One account per email address.
    let user_index = IndexModel::builder()
        .keys(doc! {"email": 1})
        .options(unique.clone())
        .build();
    Coll::<User>::from_db(db)
        .create_index(user_index, None)
        .await?;

    // One signature per user per petition.
    let signature_index = IndexModel::builder()
        .keys(doc! {"petition": 1, "user": 1})
        .options(unique.clone())
        .build();
    Coll::<Signature>::from_db(db)
        .create_index(signature_index, None)
        .await?;

    // One settings document per user.
    let settings_index = IndexModel::builder()
        .keys(doc! {"user": 1})
        .options(unique)
        .build();
    Coll::<Settings>::from_db(db)
        .create_index(settings_index, None)
        .await?;

    // Listing and review queries.
    let petition_index = IndexModel::builder()
        .keys(doc! {"status": 1, "created_at": -1})
        .build();
    Coll::<Petition>::from_db(db)
        .create_index(petition_index, None)
        .await?;

    let log_index = IndexModel::builder()
        .keys(doc! {"created_at": -1})
        .build();
    Coll::<AdminLog>::from_db(db)
        .create_index(log_index, None)
        .await?;

    Ok(())
}
