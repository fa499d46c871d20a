use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::constants::aliases;
use crate::api::models::UserProperty;

/// One spreadsheet row destined for a remote user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    pub email: String,
    #[serde(default)]
    pub year: Value,
    #[serde(default)]
    pub quarter: Value,
    #[serde(default)]
    pub persona: Value,
}

impl InputRecord {
    pub fn new(
        email: impl Into<String>,
        year: impl Into<Value>,
        quarter: impl Into<Value>,
        persona: impl Into<Value>,
    ) -> Self {
        Self {
            email: email.into(),
            year: year.into(),
            quarter: quarter.into(),
            persona: persona.into(),
        }
    }

    /// Value this record assigns to `alias`, if it owns that alias
    pub fn value_for(&self, alias: &str) -> Option<&Value> {
        match alias {
            aliases::MIGRATION_WAVE_DATE => Some(&self.year),
            aliases::MIGRATION_WAVE => Some(&self.quarter),
            aliases::MIGRATION_COMPLETED => Some(&self.persona),
            _ => None,
        }
    }
}

/// Overwrite the three migration properties in place.
///
/// Order and every other alias are left untouched; aliases missing from the
/// list are not added.
pub fn merge_properties(properties: &mut [UserProperty], record: &InputRecord) -> usize {
    let mut touched = 0;
    for property in properties.iter_mut() {
        if let Some(value) = property.alias().and_then(|alias| record.value_for(alias)) {
            property.set_value(value.clone());
            touched += 1;
        }
    }
    touched
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> InputRecord {
        InputRecord::new("a@x.com", 2024, "Q3", "Gold")
    }

    #[test]
    fn test_merge_overwrites_known_alias_and_keeps_others() {
        let mut properties = vec![
            UserProperty::new("o365MigrationWaveDate", json!("2020")),
            UserProperty::new("other", json!("keep")),
        ];

        let touched = merge_properties(&mut properties, &record());

        assert_eq!(touched, 1);
        assert_eq!(
            properties,
            vec![
                UserProperty::new("o365MigrationWaveDate", json!(2024)),
                UserProperty::new("other", json!("keep")),
            ]
        );
    }

    #[test]
    fn test_merge_all_three_aliases_in_original_order() {
        let mut properties = vec![
            UserProperty::new("o365MigrationCompleted", json!(null)),
            UserProperty::new("department", json!("Ops")),
            UserProperty::new("o365MigrationWave", json!("Q1")),
            UserProperty::new("o365MigrationWaveDate", json!(2019)),
        ];

        merge_properties(&mut properties, &record());

        let flattened: Vec<_> = properties
            .iter()
            .map(|p| (p.alias().unwrap_or_default(), p.value().cloned()))
            .collect();
        assert_eq!(
            flattened,
            vec![
                ("o365MigrationCompleted", Some(json!("Gold"))),
                ("department", Some(json!("Ops"))),
                ("o365MigrationWave", Some(json!("Q3"))),
                ("o365MigrationWaveDate", Some(json!(2024))),
            ]
        );
    }

    #[test]
    fn test_alias_match_is_exact() {
        let mut properties = vec![UserProperty::new("O365MIGRATIONWAVE", json!("Q1"))];

        assert_eq!(merge_properties(&mut properties, &record()), 0);
        assert_eq!(properties[0].value(), Some(&json!("Q1")));
    }

    #[test]
    fn test_merge_empty_list_is_noop() {
        let mut properties: Vec<UserProperty> = Vec::new();
        assert_eq!(merge_properties(&mut properties, &record()), 0);
    }
}
