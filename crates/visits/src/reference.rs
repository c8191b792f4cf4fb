//! Reference lists (bait types, chemicals) used for dropdowns and report safety info.

use strum_macros::{Display as StrumDisplay, EnumIter};

#[derive(
    Debug, serde::Serialize, serde::Deserialize, StrumDisplay, EnumIter, Clone, Copy, PartialEq, Eq, Hash
)]
#[serde(rename_all = "camelCase")]
pub enum ReferenceKind {
    #[strum(to_string = "baitTypes")]
    BaitTypes,
    #[strum(to_string = "chemicals")]
    Chemicals,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceItem {
    pub name: String,
    pub active_ingredient: Option<String>,
    pub antidote: Option<String>,
}

impl ReferenceItem {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active_ingredient: None,
            antidote: None,
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReferenceRecord {
    name: String,
    #[serde(default, alias = "active_ingredient")]
    active_ingredient: Option<String>,
    #[serde(default)]
    antidote: Option<String>,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum RawReferenceItem {
    Name(String),
    Record(ReferenceRecord),
}

impl From<RawReferenceItem> for ReferenceItem {
    fn from(raw: RawReferenceItem) -> Self {
        match raw {
            RawReferenceItem::Name(name) => ReferenceItem::named(name.trim()),
            RawReferenceItem::Record(record) => ReferenceItem {
                name: record.name.trim().to_string(),
                active_ingredient: record.active_ingredient,
                antidote: record.antidote,
            },
        }
    }
}

/// A normalized reference list; entries may arrive as bare strings or records.
#[derive(Debug, serde::Serialize, Default, Clone, PartialEq, Eq)]
pub struct ReferenceList(Vec<ReferenceItem>);

impl<'de> serde::Deserialize<'de> for ReferenceList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Vec::<RawReferenceItem>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(ReferenceItem::from)
            .filter(|item| !item.name.is_empty())
            .collect())
    }
}

impl FromIterator<ReferenceItem> for ReferenceList {
    fn from_iter<T: IntoIterator<Item = ReferenceItem>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl ReferenceList {
    pub fn items(&self) -> &[ReferenceItem] {
        &self.0
    }

    pub fn names(&self) -> Vec<&str> {
        self.0
            .iter()
            .map(|item| item.name.as_str())
            .collect()
    }

    /// Case-insensitive lookup by name.
    pub fn find(&self, name: &str) -> Option<&ReferenceItem> {
        let name = name.trim();
        self.0
            .iter()
            .find(|item| item.name.eq_ignore_ascii_case(name))
    }
}
