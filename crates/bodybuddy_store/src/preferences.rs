//! Typed access to user preferences kept in the store.

use crate::error::StoreResult;
use crate::store::Store;
use crate::types::SequenceNumber;

/// Key of the selected language's short name.
pub const LANGUAGE_KEY: &str = "lang";

/// Preference accessors over a [`Store`].
#[derive(Debug, Clone, Copy)]
pub struct Preferences<'s> {
    store: &'s Store,
}

impl<'s> Preferences<'s> {
    /// Wraps a store.
    #[must_use]
    pub fn new(store: &'s Store) -> Self {
        Self { store }
    }

    /// Short name of the selected language, if one was chosen.
    #[must_use]
    pub fn selected_language(&self) -> Option<String> {
        self.store.preference(LANGUAGE_KEY)
    }

    /// Records the selected language by short name.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub fn set_selected_language(&self, short_name: &str) -> StoreResult<SequenceNumber> {
        self.store.set_preference(LANGUAGE_KEY, Some(short_name))
    }

    /// Forgets the selected language.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub fn clear_selected_language(&self) -> StoreResult<SequenceNumber> {
        self.store.set_preference(LANGUAGE_KEY, None)
    }
}

impl Store {
    /// Typed preference accessors.
    #[must_use]
    pub fn preferences(&self) -> Preferences<'_> {
        Preferences::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_round_trip() {
        let store = Store::open_in_memory().unwrap();
        let prefs = store.preferences();
        assert_eq!(prefs.selected_language(), None);

        prefs.set_selected_language("de").unwrap();
        assert_eq!(prefs.selected_language().as_deref(), Some("de"));
        assert_eq!(store.preference("lang").as_deref(), Some("de"));

        prefs.clear_selected_language().unwrap();
        assert_eq!(prefs.selected_language(), None);
    }
}
