//! Presets: target taxonomies
//!
//! Callers hand presets over as loosely-typed JSON ([`PresetPayload`]). They
//! are validated and converted into a closed [`Preset`] here, before anything
//! reaches the scanner.

use crate::error::ModelError;
use crate::item_type::WorkItemType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Wire form of a preset, as supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetPayload {
    /// Names of enabled types
    #[serde(default)]
    pub enabled_types: Vec<String>,
    /// Parent type name -> allowed child type names
    #[serde(default)]
    pub hierarchy: BTreeMap<String, Vec<String>>,
}

/// Validated target taxonomy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    /// Types allowed in this taxonomy
    pub enabled_types: BTreeSet<WorkItemType>,
    /// Parent type -> child types it may contain
    pub hierarchy: BTreeMap<WorkItemType, BTreeSet<WorkItemType>>,
}

impl Preset {
    /// Create preset from typed parts
    #[must_use]
    pub fn new<E, H, C>(enabled: E, hierarchy: H) -> Self
    where
        E: IntoIterator<Item = WorkItemType>,
        H: IntoIterator<Item = (WorkItemType, C)>,
        C: IntoIterator<Item = WorkItemType>,
    {
        let mut rows: BTreeMap<WorkItemType, BTreeSet<WorkItemType>> = BTreeMap::new();
        for (parent, children) in hierarchy {
            rows.entry(parent).or_default().extend(children);
        }
        Self {
            enabled_types: enabled.into_iter().collect(),
            hierarchy: rows,
        }
    }

    /// Parse and validate a raw JSON payload
    ///
    /// # Errors
    /// `ModelError::MalformedPreset` if the value does not have the payload
    /// shape, plus everything [`Preset::try_from`] rejects.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ModelError> {
        if !value.is_object() {
            return Err(ModelError::malformed("preset payload must be a JSON object"));
        }
        let payload: PresetPayload = serde_json::from_value(value.clone())
            .map_err(|e| ModelError::malformed(e.to_string()))?;
        Self::try_from(payload)
    }

    /// Check whether a type is enabled
    #[inline]
    #[must_use]
    pub fn is_enabled(&self, item_type: WorkItemType) -> bool {
        self.enabled_types.contains(&item_type)
    }

    /// Check whether `parent` may legally contain `child`
    #[inline]
    #[must_use]
    pub fn allows(&self, parent: WorkItemType, child: WorkItemType) -> bool {
        self.hierarchy
            .get(&parent)
            .is_some_and(|children| children.contains(&child))
    }

    /// Types that may legally contain `child`
    #[must_use]
    pub fn parent_types_for(&self, child: WorkItemType) -> BTreeSet<WorkItemType> {
        self.hierarchy
            .iter()
            .filter(|(_, children)| children.contains(&child))
            .map(|(parent, _)| *parent)
            .collect()
    }
}

impl TryFrom<PresetPayload> for Preset {
    type Error = ModelError;

    fn try_from(payload: PresetPayload) -> Result<Self, Self::Error> {
        if payload.enabled_types.is_empty() {
            return Err(ModelError::malformed("enabledTypes must not be empty"));
        }

        let enabled_types = payload
            .enabled_types
            .iter()
            .map(|name| name.parse())
            .collect::<Result<BTreeSet<WorkItemType>, _>>()?;

        let mut hierarchy = BTreeMap::new();
        for (parent, children) in &payload.hierarchy {
            let parent: WorkItemType = parent.parse()?;
            let children = children
                .iter()
                .map(|name| name.parse())
                .collect::<Result<BTreeSet<WorkItemType>, _>>()?;
            hierarchy.insert(parent, children);
        }

        Ok(Self {
            enabled_types,
            hierarchy,
        })
    }
}

impl From<&Preset> for PresetPayload {
    fn from(preset: &Preset) -> Self {
        Self {
            enabled_types: preset
                .enabled_types
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
            hierarchy: preset
                .hierarchy
                .iter()
                .map(|(parent, children)| {
                    (
                        parent.as_str().to_string(),
                        children.iter().map(|c| c.as_str().to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use WorkItemType::*;

    #[test]
    fn converts_valid_payload() {
        let preset = Preset::from_json(&json!({
            "enabledTypes": ["product", "epic", "story"],
            "hierarchy": { "product": ["epic"], "epic": ["story"] }
        }))
        .unwrap();

        assert_eq!(preset, Preset::new([Product, Epic, Story], [(Product, [Epic]), (Epic, [Story])]));
        assert!(preset.is_enabled(Epic));
        assert!(!preset.is_enabled(Feature));
    }

    #[test]
    fn rejects_non_object_payload() {
        let err = Preset::from_json(&json!(["product"])).unwrap_err();
        assert!(matches!(err, ModelError::MalformedPreset(_)));
    }

    #[test]
    fn rejects_wrongly_typed_fields() {
        let err = Preset::from_json(&json!({ "enabledTypes": "product" })).unwrap_err();
        assert!(matches!(err, ModelError::MalformedPreset(_)));
    }

    #[test]
    fn rejects_empty_enabled_types() {
        let err = Preset::from_json(&json!({ "hierarchy": {} })).unwrap_err();
        assert!(matches!(err, ModelError::MalformedPreset(_)));
    }

    #[test]
    fn rejects_unknown_type_names() {
        let err = Preset::from_json(&json!({
            "enabledTypes": ["product"],
            "hierarchy": { "product": ["initiative"] }
        }))
        .unwrap_err();
        assert_eq!(err, ModelError::UnknownType("initiative".to_string()));
    }

    #[test]
    fn parent_types_are_derived_from_hierarchy() {
        let preset = Preset::new(
            [Product, Epic, Feature, Story],
            [(Product, vec![Epic, Feature]), (Epic, vec![Story]), (Feature, vec![Story])],
        );

        assert_eq!(preset.parent_types_for(Story), BTreeSet::from([Epic, Feature]));
        assert!(preset.parent_types_for(Product).is_empty());
    }

    #[test]
    fn payload_round_trips_through_preset() {
        let preset = Preset::new([Product, Epic], [(Product, [Epic])]);
        let payload = PresetPayload::from(&preset);
        assert_eq!(Preset::try_from(payload).unwrap(), preset);
    }
}
