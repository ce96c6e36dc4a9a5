//! Language/audio variant bitmask for episodes and subscription preferences

use bitflags::bitflags;

bitflags! {
    /// Set of simultaneously available language variants for one episode.
    ///
    /// Subscriptions carry the same type as a preference mask. An empty set
    /// means no known variant ("None" in the database).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LanguageFlags: u8 {
        const GER_DUB = 1;
        const ENG_DUB = 2;
        const GER_SUB = 4;
        const ENG_SUB = 8;
    }
}

impl LanguageFlags {
    /// Map a portal language-icon `title` attribute to a flag.
    ///
    /// Unrecognized titles return `None` and are ignored by the scraper.
    pub fn from_portal_title(title: &str) -> Option<Self> {
        match title {
            "Deutsch/German" => Some(Self::GER_DUB),
            "Englisch" => Some(Self::ENG_DUB),
            "Mit deutschem Untertitel" => Some(Self::GER_SUB),
            "Mit englischem Untertitel" => Some(Self::ENG_SUB),
            _ => None,
        }
    }

    /// Bits present in `fresh` but not in `self` (the persisted value).
    ///
    /// Only additions are ever surfaced to subscribers; a variant the portal
    /// lost yields an empty result here.
    pub fn added_in(self, fresh: Self) -> Self {
        fresh.difference(self)
    }

    /// True if any bit is shared with the subscriber preference mask.
    pub fn intersects_preference(self, preference: Self) -> bool {
        !self.intersection(preference).is_empty()
    }

    /// Render as the `<b>GerDub</b>|<b>GerSub</b>` fragment used in
    /// notification texts. Empty set renders as an empty string.
    pub fn to_language_text(self) -> String {
        let mut parts = Vec::new();

        if self.contains(Self::GER_DUB) {
            parts.push("<b>GerDub</b>");
        }
        if self.contains(Self::GER_SUB) {
            parts.push("<b>GerSub</b>");
        }
        if self.contains(Self::ENG_DUB) {
            parts.push("<b>EngDub</b>");
        }
        if self.contains(Self::ENG_SUB) {
            parts.push("<b>EngSub</b>");
        }

        parts.join("|")
    }

    /// Database representation (`INT` column).
    pub fn as_db(self) -> i32 {
        i32::from(self.bits())
    }

    /// Parse the database representation, dropping unknown bits.
    pub fn from_db(value: i32) -> Self {
        Self::from_bits_truncate(value as u8)
    }
}
