//! Bijection round trips.

use std::collections::BTreeMap;

use proptest::prelude::*;
use vtab_model::VariableEntity;
use vtab_view::{BijectiveFunction, MapFunction, PrefixEntityFunction};

proptest! {
    #[test]
    fn prefix_mapping_round_trips(identifier in "[A-Za-z0-9_-]{1,12}") {
        let function = PrefixEntityFunction::new("Participant", "Subject", "S-");
        let entity = VariableEntity::new("Participant", identifier.as_str());
        let mapped = function.apply(&entity).expect("apply");
        prop_assert_eq!(mapped.identifier(), format!("S-{identifier}"));
        prop_assert_eq!(function.unapply(&mapped).expect("unapply"), entity);
    }

    #[test]
    fn map_function_round_trips(pairs in prop::collection::btree_map("[a-z]{1,6}", 0u32..10_000, 1..20)) {
        let mut seen = BTreeMap::new();
        let injective: Vec<(String, u32)> = pairs
            .into_iter()
            .filter(|(_, target)| seen.insert(*target, ()).is_none())
            .collect();
        let function = MapFunction::new(injective.clone()).expect("injective map");
        prop_assert_eq!(function.len(), injective.len());
        for (source, target) in &injective {
            prop_assert_eq!(function.apply(source).expect("apply"), *target);
            prop_assert_eq!(&function.unapply(target).expect("unapply"), source);
        }
    }
}
