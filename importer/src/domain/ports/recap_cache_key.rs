//! Redis key naming for cached recap views.

use std::fmt;

use crate::domain::UserRecapId;

const RECAP_KEY_PREFIX: &str = "user:recap:";

/// `user:recap:<user_id>`. Only constructible from a [`UserRecapId`], so every
/// adapter agrees on the layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecapCacheKey(String);

impl RecapCacheKey {
    pub fn for_user(user_id: UserRecapId) -> Self {
        Self(format!("{RECAP_KEY_PREFIX}{user_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecapCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::RecapCacheKey;
    use crate::domain::UserRecapId;

    #[rstest]
    #[case(1, "user:recap:1")]
    #[case(9_007_199_254, "user:recap:9007199254")]
    #[case(-3, "user:recap:-3")]
    fn keys_embed_the_user_id(#[case] id: i64, #[case] expected: &str) {
        let key = RecapCacheKey::for_user(UserRecapId::new(id));

        assert_eq!(key.as_str(), expected);
        assert_eq!(key.to_string(), expected);
    }
}
