//! Filter chains over value sets and chain-level properties.

use std::sync::Arc;

use proptest::prelude::*;
use vtab_filter::{
    EntityIdFilter, ExcludeAllFilter, Filter, FilterAction, FilterError, FilterState,
    IncludeAllFilter, StateEnvelope, ValueSetFilterChain, VariableFilterChain,
    VariableNameFilter, VariableValueFilter,
};
use vtab_model::{
    MemoryDatasource, MemoryValueTable, ModelError, Value, ValueTable, ValueType, Variable,
    VariableEntity,
};

fn flagged_table() -> Arc<MemoryValueTable> {
    let datasource = MemoryDatasource::new("study");
    let table = datasource.create_table("people", "Participant").expect("table");
    table
        .add_variable(
            Variable::builder("flag", ValueType::Boolean, "Participant")
                .build()
                .expect("variable"),
        )
        .expect("add variable");
    for (id, flag) in [("E1", false), ("E2", true), ("E3", false)] {
        table
            .put_value(&VariableEntity::new("Participant", id), "flag", Value::boolean(flag))
            .expect("put");
    }
    table
}

#[test]
fn value_filter_admits_matching_entities() {
    let table = flagged_table();
    let chain = ValueSetFilterChain::new("flagged")
        .with_filter(ExcludeAllFilter)
        .with_filter(VariableValueFilter::new(
            "flag",
            Some("true".to_string()),
            FilterAction::Include,
        ));
    let context: &(dyn ValueTable + 'static) = &*table;
    let admitted = chain
        .filter(context.value_sets().expect("value sets"), context)
        .expect("filter");
    let ids: Vec<&str> = admitted.iter().map(|vs| vs.entity().identifier()).collect();
    assert_eq!(ids, ["E2"]);
}

#[test]
fn entity_filter_discards() {
    let table = flagged_table();
    let chain = ValueSetFilterChain::new("no E1")
        .with_filter(EntityIdFilter::new("E1", FilterAction::Discard).expect("pattern"))
        .with_filter(IncludeAllFilter);
    let context: &(dyn ValueTable + 'static) = &*table;
    let admitted = chain
        .filter(context.value_sets().expect("value sets"), context)
        .expect("filter");
    assert_eq!(admitted.len(), 2);
}

struct FailingFilter;

impl Filter<vtab_model::ValueSet, dyn ValueTable> for FailingFilter {
    fn apply(
        &self,
        _envelope: &mut StateEnvelope<vtab_model::ValueSet>,
        _table: &(dyn ValueTable + 'static),
    ) -> vtab_filter::Result<()> {
        Err(ModelError::Evaluation("boom".to_string()).into())
    }
}

#[test]
fn failing_filter_aborts_chain() {
    let table = flagged_table();
    let chain = ValueSetFilterChain::new("failing")
        .with_filter(IncludeAllFilter)
        .with_filter(FailingFilter);
    let context: &(dyn ValueTable + 'static) = &*table;
    let err = chain
        .filter(context.value_sets().expect("value sets"), context)
        .expect_err("fail fast");
    assert!(matches!(err, FilterError::Model(ModelError::Evaluation(_))));
}

#[test]
fn missing_variable_propagates() {
    let table = flagged_table();
    let chain = ValueSetFilterChain::new("unknown")
        .with_filter(VariableValueFilter::new("nope", None, FilterAction::Exclude));
    let context: &(dyn ValueTable + 'static) = &*table;
    let err = chain
        .filter(context.value_sets().expect("value sets"), context)
        .expect_err("unknown variable");
    assert!(matches!(
        err,
        FilterError::Model(ModelError::NoSuchVariable { .. })
    ));
}

fn arb_action() -> impl Strategy<Value = FilterAction> {
    prop_oneof![
        Just(FilterAction::Include),
        Just(FilterAction::Exclude),
        Just(FilterAction::Discard),
    ]
}

fn variables(names: &[String]) -> Vec<Variable> {
    names
        .iter()
        .map(|name| {
            Variable::builder(name.as_str(), ValueType::Text, "Participant")
                .build()
                .expect("variable")
        })
        .collect()
}

proptest! {
    #[test]
    fn filtering_is_idempotent(
        names in proptest::collection::vec("[a-d]{1,3}", 0..12),
        steps in proptest::collection::vec(("[a-d]\\.*", arb_action()), 0..5),
    ) {
        let mut chain = VariableFilterChain::new("generated");
        for (pattern, action) in &steps {
            chain.push(Box::new(VariableNameFilter::new(pattern, *action).expect("pattern")));
        }
        let first = chain.filter(variables(&names), &()).expect("first pass");
        let second = chain.filter(variables(&names), &()).expect("second pass");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn discarded_items_never_return(
        name in "[a-d]{1,3}",
        actions in proptest::collection::vec(arb_action(), 0..6),
    ) {
        let mut chain = VariableFilterChain::new("discarding");
        chain.push(Box::new(VariableNameFilter::new(".*", FilterAction::Discard).expect("pattern")));
        for action in actions {
            chain.push(Box::new(VariableNameFilter::new(".*", action).expect("pattern")));
        }
        let envelope = chain
            .evaluate(variables(&[name])[0].clone(), &())
            .expect("evaluate");
        prop_assert_eq!(envelope.state(), FilterState::Discarded);
    }
}
