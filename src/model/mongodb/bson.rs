use std::fmt::{Display, Formatter};
use std::{ops::Deref, str::FromStr};

use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use rocket::{
    form::{self, prelude::ErrorKind, FromFormField, ValueField},
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Formatter as UriFormatter, Path, Query, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};

/// A database ID, serialised in MongoDB's native ObjectId format.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(ObjectId);

impl Id {
    /// Generate a fresh ID.
    pub fn new() -> Self {
        Self(ObjectId::new())
    }

    /// A filter document matching this ID, for use in queries.
    pub fn as_doc(&self) -> Document {
        doc! { "_id": self.0 }
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Id {
    type Target = ObjectId;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

impl FromStr for Id {
    type Err = mongodb::bson::oid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse::<ObjectId>()?))
    }
}

impl From<ObjectId> for Id {
    fn from(id: ObjectId) -> Self {
        Self(id)
    }
}

impl From<Id> for Bson {
    fn from(id: Id) -> Self {
        Bson::ObjectId(id.0)
    }
}

impl<'a> FromParam<'a> for Id {
    type Error = mongodb::bson::oid::Error;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse::<Id>()
    }
}

#[rocket::async_trait]
impl<'r> FromFormField<'r> for Id {
    fn from_value(field: ValueField<'r>) -> form::Result<'r, Self> {
        field
            .value
            .parse::<ObjectId>()
            .map(Id)
            .map_err(|err| ErrorKind::Custom(Box::new(err)).into())
    }
}

impl UriDisplay<Path> for Id {
    fn fmt(&self, formatter: &mut UriFormatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(self.to_string())
    }
}

impl UriDisplay<Query> for Id {
    fn fmt(&self, formatter: &mut UriFormatter<'_, Query>) -> std::fmt::Result {
        formatter.write_value(self.to_string())
    }
}

impl_from_uri_param_identity!([Path] Id);
impl_from_uri_param_identity!([Query] Id);
