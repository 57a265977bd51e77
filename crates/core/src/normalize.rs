use std::sync::Arc;

use unicode_normalization::UnicodeNormalization;

use crate::StoreResult;

/// Maps a path value onto the form used for uniqueness and lookup.
///
/// The store calls the same instance on every write path (create, alias,
/// cascade rewrite) and on every lookup.
pub trait PathTransformation: Send + Sync {
    fn transform(&self, value: &str) -> StoreResult<String>;
}

pub type SharedTransformation = Arc<dyn PathTransformation>;

/// NFC-normalized, lowercased comparison: `Acme/Repo` and `acme/repo` collide.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnicodeCaseFold;

impl PathTransformation for UnicodeCaseFold {
    fn transform(&self, value: &str) -> StoreResult<String> {
        Ok(value.nfc().collect::<String>().to_lowercase())
    }
}

/// Exact comparison; only byte-identical values collide.
#[derive(Clone, Copy, Debug, Default)]
pub struct CaseSensitive;

impl PathTransformation for CaseSensitive {
    fn transform(&self, value: &str) -> StoreResult<String> {
        Ok(value.to_string())
    }
}

impl<F> PathTransformation for F
where
    F: Fn(&str) -> StoreResult<String> + Send + Sync,
{
    fn transform(&self, value: &str) -> StoreResult<String> {
        self(value)
    }
}

pub fn transformation_for(case_insensitive: bool) -> SharedTransformation {
    if case_insensitive {
        Arc::new(UnicodeCaseFold)
    } else {
        Arc::new(CaseSensitive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;

    #[test]
    fn case_fold_collides_on_case_and_composition() {
        let fold = UnicodeCaseFold;
        assert_eq!(fold.transform("Acme/Repo1").unwrap(), "acme/repo1");
        // "e" + combining acute vs precomposed "é"
        assert_eq!(
            fold.transform("Caf\u{0065}\u{0301}").unwrap(),
            fold.transform("caf\u{00e9}").unwrap()
        );
    }

    #[test]
    fn case_sensitive_is_identity() {
        assert_eq!(CaseSensitive.transform("Acme").unwrap(), "Acme");
    }

    #[test]
    fn closures_are_transformations() {
        let reject = |value: &str| -> StoreResult<String> {
            Err(StoreError::invalid_path(format!("rejected {value}")))
        };
        assert!(reject.transform("x").is_err());
        let shared = transformation_for(true);
        assert_eq!(shared.transform("ABC").unwrap(), "abc");
    }
}
