use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::id::ApiId,
    common::{PetitionStatus, Priority},
    db::{
        petition::{Petition, PetitionCore},
        response::PetitionResponse,
        signature::Signature,
    },
    mongodb::Id,
};

/// A petition as submitted by a citizen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetitionSpec {
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub signature_goal: u32,
}

impl PetitionSpec {
    /// Validate the spec and turn it into a fresh, active petition.
    pub fn into_petition(self, creator: Id) -> Result<Petition> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(Error::bad_request("Title is required"));
        }
        if self.description.trim().is_empty() {
            return Err(Error::bad_request("Description is required"));
        }
        if self.signature_goal == 0 {
            return Err(Error::bad_request("Signature goal must be at least 1"));
        }
        let now = Utc::now();
        Ok(Petition {
            id: Id::new(),
            petition: PetitionCore {
                title: title.to_string(),
                description: self.description.trim().to_string(),
                category: self.category.trim().to_string(),
                location: self.location.trim().to_string(),
                signature_goal: self.signature_goal,
                signatures_count: 0,
                status: PetitionStatus::Active,
                creator,
                verified: false,
                priority: None,
                created_at: now,
                updated_at: now,
            },
        })
    }
}

/// A petition as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetitionDesc {
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub signature_goal: u32,
    pub signatures_count: u32,
    pub status: PetitionStatus,
    pub creator: ApiId,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Derived from the counts; independent of `status`.
    pub goal_reached: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Petition> for PetitionDesc {
    fn from(petition: Petition) -> Self {
        let goal_reached = petition.goal_reached();
        let core = petition.petition;
        Self {
            id: petition.id.into(),
            title: core.title,
            description: core.description,
            category: core.category,
            location: core.location,
            signature_goal: core.signature_goal,
            signatures_count: core.signatures_count,
            status: core.status,
            creator: core.creator.into(),
            verified: core.verified,
            priority: core.priority,
            goal_reached,
            created_at: core.created_at,
            updated_at: core.updated_at,
        }
    }
}

/// Query filters for listing petitions.
#[derive(Debug, Default, Clone, FromForm)]
pub struct PetitionFilter {
    pub status: Option<PetitionStatus>,
    pub category: Option<String>,
    pub location: Option<String>,
    /// Case-insensitive substring of the title or description.
    pub search: Option<String>,
    /// Only the caller's own petitions.
    pub mine: Option<bool>,
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// A case-insensitive substring match; the term is matched literally.
fn contains_ignore_case(term: &str) -> Document {
    doc! {
        "$regex": regex::escape(term),
        "$options": "i",
    }
}

impl PetitionFilter {
    /// Does this filter need to know who is asking?
    pub fn wants_mine(&self) -> bool {
        self.mine.unwrap_or(false)
    }

    /// Build the MongoDB query for this filter.
    pub fn to_doc(&self, me: Option<Id>) -> Document {
        let mut filter = Document::new();
        if let Some(status) = self.status {
            filter.insert("status", status);
        }
        if let Some(category) = non_blank(&self.category) {
            filter.insert("category", category);
        }
        if let Some(location) = non_blank(&self.location) {
            filter.insert("location", contains_ignore_case(location));
        }
        if let Some(term) = non_blank(&self.search) {
            filter.insert(
                "$or",
                vec![
                    doc! { "title": contains_ignore_case(term) },
                    doc! { "description": contains_ignore_case(term) },
                ],
            );
        }
        if let (true, Some(me)) = (self.wants_mine(), me) {
            filter.insert("creator", me);
        }
        filter
    }
}

/// An official's status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: PetitionStatus,
    #[serde(default)]
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub verified: bool,
}

/// An official's response to a petition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSpec {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDesc {
    pub id: ApiId,
    pub petition: ApiId,
    pub official: ApiId,
    pub official_name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<PetitionResponse> for ResponseDesc {
    fn from(response: PetitionResponse) -> Self {
        Self {
            id: response.id.into(),
            petition: response.petition.into(),
            official: response.official.into(),
            official_name: response.response.official_name,
            message: response.response.message,
            created_at: response.response.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureDesc {
    pub id: ApiId,
    pub petition: ApiId,
    pub user: ApiId,
    pub created_at: DateTime<Utc>,
}

impl From<Signature> for SignatureDesc {
    fn from(signature: Signature) -> Self {
        Self {
            id: signature.id.into(),
            petition: signature.petition.into(),
            user: signature.user.into(),
            created_at: signature.created_at,
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl PetitionSpec {
        pub fn example() -> Self {
            Self {
                title: "Plant more trees".to_string(),
                description: "Every street deserves shade.".to_string(),
                category: "Environment".to_string(),
                location: "Springfield".to_string(),
                signature_goal: 2,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::Bson;

    use super::*;

    #[test]
    fn specs_become_active_unsigned_petitions() {
        let creator = Id::new();
        let petition = PetitionSpec::example().into_petition(creator).unwrap();
        assert_eq!(petition.status, PetitionStatus::Active);
        assert_eq!(petition.signatures_count, 0);
        assert_eq!(petition.creator, creator);
        assert!(!petition.verified);
    }

    #[test]
    fn invalid_specs_are_rejected() {
        let mut spec = PetitionSpec::example();
        spec.title = "  ".to_string();
        assert!(spec.into_petition(Id::new()).is_err());

        let mut spec = PetitionSpec::example();
        spec.signature_goal = 0;
        assert!(spec.into_petition(Id::new()).is_err());
    }

    #[test]
    fn search_terms_are_escaped() {
        let filter = PetitionFilter {
            search: Some("c++ (draft)".to_string()),
            ..Default::default()
        };
        let query = filter.to_doc(None);
        let clauses = query.get_array("$or").unwrap();
        let title = clauses[0].as_document().unwrap().get_document("title").unwrap();
        assert_eq!(title.get_str("$regex").unwrap(), r"c\+\+ \(draft\)");
        assert_eq!(title.get_str("$options").unwrap(), "i");
    }

    #[test]
    fn mine_only_applies_with_a_user() {
        let filter = PetitionFilter {
            mine: Some(true),
            status: Some(PetitionStatus::UnderReview),
            category: Some("  ".to_string()),
            ..Default::default()
        };
        let me = Id::new();
        let query = filter.to_doc(Some(me));
        assert_eq!(query.get("creator"), Some(&Bson::from(me)));
        assert_eq!(query.get_str("status").unwrap(), "under_review");
        assert!(query.get("category").is_none());
        assert!(filter.to_doc(None).get("creator").is_none());
    }

    #[test]
    fn descriptions_report_goal_independently_of_status() {
        let mut petition = PetitionSpec::example().into_petition(Id::new()).unwrap();
        petition.signatures_count = 2;
        let desc = PetitionDesc::from(petition);
        assert!(desc.goal_reached);
        assert_eq!(desc.status, PetitionStatus::Active);
    }
}
