//! Travel records, the residence marker, identities and preference blobs.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{CURRENT_SCHEMA_VERSION, MAX_RATING};
use crate::dates::parse_day;
use crate::error::ValidationError;

/// Who the traveller went with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanionType {
    Solo,
    Family,
    Couple,
    Friends,
    Colleagues,
    Custom,
    /// Unset, or a legacy record with no companion data at all
    #[default]
    #[serde(rename = "")]
    Unset,
}

impl CompanionType {
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "solo" => Some(Self::Solo),
            "family" => Some(Self::Family),
            "couple" => Some(Self::Couple),
            "friends" => Some(Self::Friends),
            "colleagues" => Some(Self::Colleagues),
            "custom" => Some(Self::Custom),
            "" => Some(Self::Unset),
            _ => None,
        }
    }

    /// Free-text detail only carries meaning for group travel.
    #[must_use]
    pub const fn takes_detail(self) -> bool {
        !matches!(self, Self::Solo | Self::Unset)
    }
}

/// One recorded stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub country_label: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub city_name: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub companion_type: CompanionType,
    #[serde(default)]
    pub companions: String,
    #[serde(default)]
    pub memo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default = "Entry::current_schema")]
    pub schema_version: u32,
    /// Fields written by collaborators (map markers, photos) that the core
    /// carries through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entry {
    const fn current_schema() -> u32 {
        CURRENT_SCHEMA_VERSION
    }

    /// Rating that participates in aggregates; zero means "not rated".
    #[must_use]
    pub fn effective_rating(&self) -> Option<u8> {
        self.rating.filter(|rating| *rating > 0)
    }

    #[must_use]
    pub fn days(&self) -> i64 {
        crate::dates::calculate_days(&self.start_date, &self.end_date)
    }
}

/// User input for creating or editing an entry. Display strings are
/// resolved by the caller from its country/city table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraft {
    pub country: String,
    pub country_code: String,
    pub country_label: String,
    pub city: String,
    pub city_name: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub companion_type: CompanionType,
    #[serde(default)]
    pub companions: String,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub rating: Option<u8>,
}

impl EntryDraft {
    /// Check the draft and build an entry under `id`.
    ///
    /// # Errors
    ///
    /// Returns the first rule the draft breaks.
    pub fn into_entry(self, id: String, memo_max_len: usize) -> Result<Entry, ValidationError> {
        if self.country_code.trim().is_empty() {
            return Err(ValidationError::MissingField("countryCode"));
        }
        if self.city.trim().is_empty() {
            return Err(ValidationError::MissingField("city"));
        }
        let start = parse_day(&self.start_date).ok_or_else(|| ValidationError::InvalidDate {
            field: "startDate",
            value: self.start_date.clone(),
        })?;
        let end = parse_day(&self.end_date).ok_or_else(|| ValidationError::InvalidDate {
            field: "endDate",
            value: self.end_date.clone(),
        })?;
        if end < start {
            return Err(ValidationError::DateOrder {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if let Some(rating) = self.rating.filter(|r| *r > MAX_RATING) {
            return Err(ValidationError::RatingRange(rating));
        }
        let memo_len = self.memo.chars().count();
        if memo_len > memo_max_len {
            return Err(ValidationError::MemoTooLong {
                len: memo_len,
                max: memo_max_len,
            });
        }
        let companions = if self.companion_type.takes_detail() {
            self.companions
        } else {
            String::new()
        };

        Ok(Entry {
            id,
            country: self.country,
            country_code: self.country_code,
            country_label: self.country_label,
            city: self.city,
            city_name: self.city_name,
            start_date: self.start_date,
            end_date: self.end_date,
            purpose: self.purpose,
            companion_type: self.companion_type,
            companions,
            memo: self.memo,
            rating: self.rating,
            schema_version: CURRENT_SCHEMA_VERSION,
            extra: Map::new(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Home base. Stored with null-valued fields when unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Residence {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

impl Residence {
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.home_country_code().is_some()
    }

    #[must_use]
    pub fn home_country_code(&self) -> Option<&str> {
        self.country_code.as_deref().filter(|code| !code.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub is_logged_in: bool,
}

impl Identity {
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            id: String::new(),
            username: String::new(),
            is_logged_in: false,
        }
    }

    /// Local stand-in for a login; no credentials are checked.
    #[must_use]
    pub fn logged_in(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            is_logged_in: true,
        }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default)]
    pub dark_mode: bool,
    #[serde(default)]
    pub push_notifications: bool,
    #[serde(default)]
    pub sound_effects: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineSort {
    #[default]
    Newest,
    Oldest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingSort {
    #[default]
    Highest,
    Lowest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSettings {
    #[serde(default)]
    pub timeline_sort_type: TimelineSort,
    #[serde(default)]
    pub rating_sort_type: RatingSort,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> EntryDraft {
        EntryDraft {
            country: "Japan".into(),
            country_code: "JP".into(),
            country_label: "일본".into(),
            city: "Tokyo".into(),
            city_name: "도쿄".into(),
            start_date: "2024-04-01".into(),
            end_date: "2024-04-05".into(),
            purpose: "tourism".into(),
            companion_type: CompanionType::Friends,
            companions: "Mina, Joon".into(),
            memo: "벚꽃".into(),
            rating: Some(4),
        }
    }

    #[test]
    fn valid_draft_builds_current_entry() {
        let entry = draft().into_entry("1700000000000".into(), 500).unwrap();
        assert_eq!(entry.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(entry.days(), 5);
        assert_eq!(entry.companions, "Mina, Joon");
    }

    #[test]
    fn solo_drops_companion_detail() {
        let mut d = draft();
        d.companion_type = CompanionType::Solo;
        let entry = d.into_entry("1".into(), 500).unwrap();
        assert_eq!(entry.companions, "");
    }

    #[test]
    fn draft_rules_are_enforced() {
        let mut d = draft();
        d.end_date = "2024-03-30".into();
        assert!(matches!(
            d.into_entry("1".into(), 500),
            Err(ValidationError::DateOrder { .. })
        ));

        let mut d = draft();
        d.rating = Some(6);
        assert_eq!(
            d.into_entry("1".into(), 500),
            Err(ValidationError::RatingRange(6))
        );

        let mut d = draft();
        d.memo = "가".repeat(11);
        assert_eq!(
            d.into_entry("1".into(), 10),
            Err(ValidationError::MemoTooLong { len: 11, max: 10 })
        );

        let mut d = draft();
        d.city = "  ".into();
        assert_eq!(
            d.into_entry("1".into(), 500),
            Err(ValidationError::MissingField("city"))
        );
    }

    #[test]
    fn companion_type_serializes_with_empty_unset_tag() {
        assert_eq!(
            serde_json::to_string(&CompanionType::Unset).unwrap(),
            "\"\""
        );
        assert_eq!(
            serde_json::from_str::<CompanionType>("\"colleagues\"").unwrap(),
            CompanionType::Colleagues
        );
        assert_eq!(CompanionType::from_tag("pets"), None);
    }

    #[test]
    fn residence_without_code_is_unset() {
        let residence: Residence =
            serde_json::from_str(r#"{"country":null,"city":null,"coordinates":null}"#).unwrap();
        assert!(!residence.is_set());
    }
}
