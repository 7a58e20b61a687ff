//! Driving port for point-in-time recap reads.

use async_trait::async_trait;

use crate::domain::{Error, UserRecapId, UserRecapView};

/// Read the composed recap for one user.
#[async_trait]
pub trait RecapLookupQuery: Send + Sync {
    /// Return the user's view, or an [`crate::domain::ErrorCode::NotFound`]
    /// error when the user has no recap.
    async fn find(&self, user_id: UserRecapId) -> Result<UserRecapView, Error>;
}
