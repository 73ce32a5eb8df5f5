use serde::{Deserialize, Serialize};

use crate::dashboard::aggregate::{breakdown, petition_stats, Bucket, PetitionFacts, PetitionStats};

/// Aggregated petition figures for officials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetitionAnalytics {
    pub stats: PetitionStats,
    pub verified: u32,
    pub total_signatures: u64,
    pub by_category: Vec<Bucket>,
    pub by_location: Vec<Bucket>,
}

impl PetitionAnalytics {
    pub fn from_petitions<P: PetitionFacts>(petitions: &[P]) -> Self {
        Self {
            stats: petition_stats(petitions, None),
            verified: petitions.iter().filter(|p| p.verified()).count() as u32,
            total_signatures: petitions.iter().map(|p| u64::from(p.signatures())).sum(),
            by_category: breakdown(petitions.iter().map(|p| p.category())),
            by_location: breakdown(petitions.iter().map(|p| p.location())),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        common::PetitionStatus,
        db::petition::{Petition, PetitionCore},
        mongodb::Id,
    };

    use super::*;

    fn petition(category: &str, status: PetitionStatus, signatures: u32) -> Petition {
        let mut core = PetitionCore::example(Id::new());
        core.category = category.to_string();
        core.status = status;
        core.signatures_count = signatures;
        Petition {
            id: Id::new(),
            petition: core,
        }
    }

    #[test]
    fn summarises_petitions() {
        let petitions = vec![
            petition("Roads", PetitionStatus::Active, 100),
            petition("Parks", PetitionStatus::Closed, 5),
            petition("Roads", PetitionStatus::UnderReview, 20),
        ];
        let analytics = PetitionAnalytics::from_petitions(&petitions);
        assert_eq!(analytics.stats.total, 3);
        assert_eq!(analytics.stats.goal_reached, 1);
        assert_eq!(analytics.total_signatures, 125);
        assert_eq!(analytics.by_category[0].name, "Roads");
        assert_eq!(analytics.by_category[0].count, 2);
        assert_eq!(analytics.by_location.len(), 1);
    }
}
