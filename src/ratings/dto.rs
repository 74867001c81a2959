use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::store::{Rating, RatingEntry};

/// Body of submit and edit. `stars` is kept raw so malformed values
/// surface as a validation error rather than an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct RateRequest {
    #[serde(default, alias = "rating")]
    pub stars: Option<Value>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RatingView {
    pub id: Uuid,
    pub username: String,
    pub stars: i16,
    pub comment: String,
}

impl From<RatingEntry> for RatingView {
    fn from(r: RatingEntry) -> Self {
        Self {
            id: r.id,
            username: r.username,
            stars: r.stars,
            comment: r.comment,
        }
    }
}

/// The requester's own rating; every field is null when there is none.
#[derive(Debug, Default, Serialize)]
pub struct UserRatingView {
    pub id: Option<Uuid>,
    pub stars: Option<i16>,
    pub comment: Option<String>,
}

impl From<Option<Rating>> for UserRatingView {
    fn from(r: Option<Rating>) -> Self {
        match r {
            Some(r) => Self {
                id: Some(r.id),
                stars: Some(r.stars),
                comment: Some(r.comment),
            },
            None => Self::default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RatingsResponse {
    pub ratings: Vec<RatingView>,
    pub user_rating: UserRatingView,
}
