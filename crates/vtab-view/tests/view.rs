//! Views over the `people` fixture table.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use vtab_filter::{ExcludeAllFilter, FilterAction, VariableFilterChain, VariableNameFilter};
use vtab_model::{Datasource, ModelError, ValueTable, Variable, VariableEntity};
use vtab_view::{
    AllClause, DerivedVariableDefinition, EntityMappingDefinition, FilterChainSelectClause,
    ListClause, MemoryViewPersistence, NoneClause, SelectClause, SelectDefinition,
    ValueSetFilterDefinition, View, ViewDefinition, ViewManager, WhereDefinition,
};

use common::{participant, study};

fn people() -> Arc<dyn ValueTable> {
    study().value_table("people").expect("people")
}

fn names(variables: &[Variable]) -> Vec<&str> {
    variables.iter().map(Variable::name).collect()
}

fn ids(entities: &BTreeSet<VariableEntity>) -> Vec<&str> {
    entities.iter().map(VariableEntity::identifier).collect()
}

#[test]
fn select_projection_keeps_named_variables() {
    let datasource = study();
    let view = ViewDefinition::new("ac", "people")
        .with_select(SelectDefinition::Variables {
            names: vec!["A".to_string(), "C".to_string()],
        })
        .build(datasource.as_ref())
        .expect("build");
    assert_eq!(names(&view.variables().expect("variables")), ["A", "C"]);
    let err = view.variable_value_source("B").unwrap_err();
    assert!(matches!(err, ModelError::NoSuchVariable { ref table, .. } if table == "ac"));
}

#[test]
fn unknown_selected_variable_fails_at_build() {
    let datasource = study();
    let err = ViewDefinition::new("bad", "people")
        .with_select(SelectDefinition::Variables {
            names: vec!["Z".to_string()],
        })
        .build(datasource.as_ref())
        .unwrap_err();
    assert!(matches!(err, vtab_view::ViewError::InvalidDefinition { .. }));
}

#[test]
fn variable_set_law_holds() {
    let source = people();
    let chain = VariableFilterChain::new("a_or_b")
        .with_filter(ExcludeAllFilter)
        .with_filter(VariableNameFilter::new("A|B", FilterAction::Include).expect("filter"));
    let select = FilterChainSelectClause::new(chain);
    let expected: Vec<String> = source
        .variables()
        .expect("source variables")
        .into_iter()
        .filter(|variable| select.select(variable).expect("select"))
        .map(|variable| variable.name().to_string())
        .collect();
    let view = View::builder("ab", Arc::clone(&source))
        .select(select)
        .build()
        .expect("build");
    let actual: Vec<String> = view
        .variables()
        .expect("variables")
        .iter()
        .map(|variable| variable.name().to_string())
        .collect();
    assert_eq!(actual, expected);
}

#[test]
fn empty_source_exposes_only_listed_variables() {
    let datasource = vtab_model::MemoryDatasource::new("empty");
    datasource.create_table("nothing", "Participant").expect("table");
    let view = ViewDefinition::new("computed", "nothing")
        .with_derived(DerivedVariableDefinition::new(
            "one",
            vtab_model::ValueType::Integer,
            "1",
        ))
        .build(&datasource)
        .expect("build");
    assert_eq!(names(&view.variables().expect("variables")), ["one"]);
    assert!(view.variable_entities().expect("entities").is_empty());
}

#[test]
fn where_admits_flagged_entity() {
    let datasource = study();
    let view = ViewDefinition::new("flagged", "people")
        .with_where(WhereDefinition::Filters {
            filters: vec![
                ValueSetFilterDefinition::ExcludeAll,
                ValueSetFilterDefinition::Value {
                    variable: "C".to_string(),
                    value: Some("true".to_string()),
                    action: FilterAction::Include,
                },
            ],
        })
        .build(datasource.as_ref())
        .expect("build");
    let entities = view.variable_entities().expect("entities");
    assert_eq!(ids(&entities), ["E2"]);
    assert!(view.has_value_set(&participant("E2")).expect("has E2"));
    assert!(!view.has_value_set(&participant("E1")).expect("has E1"));
    let err = view.value_set(&participant("E1")).unwrap_err();
    assert!(matches!(err, ModelError::NoSuchValueSet { .. }));
}

#[test]
fn where_script_reads_view_variables() {
    let datasource = study();
    let view = ViewDefinition::new("older", "people")
        .with_where(WhereDefinition::Script {
            script: "$('A') >= 20".to_string(),
        })
        .build(datasource.as_ref())
        .expect("build");
    assert_eq!(ids(&view.variable_entities().expect("entities")), ["E2", "E3"]);
}

#[test]
fn bijective_rename_reads_source_values() {
    let datasource = study();
    let source = datasource.value_table("people").expect("people");
    let view = ViewDefinition::new("subjects", "people")
        .with_entity_mapping(EntityMappingDefinition::Prefix {
            entity_type: "Subject".to_string(),
            prefix: "S-".to_string(),
        })
        .build(datasource.as_ref())
        .expect("build");
    assert_eq!(view.entity_type(), "Subject");
    assert!(
        view.variables()
            .expect("variables")
            .iter()
            .all(|variable| variable.entity_type() == "Subject")
    );

    let renamed = VariableEntity::new("Subject", "S-E2");
    let view_set = view.value_set(&renamed).expect("renamed value set");
    let source_set = source.value_set(&participant("E2")).expect("source value set");
    let view: &dyn ValueTable = &view;
    for name in ["A", "B", "C"] {
        assert_eq!(
            view.value(&view_set, name).expect("view value"),
            source.value(&source_set, name).expect("source value"),
            "{name}"
        );
    }
    let err = view.value_set(&participant("E2")).unwrap_err();
    assert!(matches!(err, ModelError::NoSuchValueSet { .. }));
}

#[test]
fn explicit_mapping_hides_unmapped_entities() {
    let datasource = study();
    let view = ViewDefinition::new("coded", "people")
        .with_entity_mapping(EntityMappingDefinition::Explicit {
            entity_type: "Subject".to_string(),
            pairs: vec![vtab_view::IdentifierPair {
                source: "E3".to_string(),
                target: "003".to_string(),
            }],
        })
        .build(datasource.as_ref())
        .expect("build");
    let entities = view.variable_entities().expect("entities");
    assert_eq!(ids(&entities), ["003"]);
}

#[test]
fn all_and_none_clauses_bound_the_view() {
    let source = people();
    let everything = View::builder("everything", Arc::clone(&source))
        .select(AllClause)
        .where_clause(AllClause)
        .build()
        .expect("build");
    assert_eq!(everything.variables().expect("variables").len(), 3);
    assert_eq!(everything.variable_entities().expect("entities").len(), 3);

    let nothing = View::builder("nothing", source)
        .select(NoneClause)
        .where_clause(NoneClause)
        .list(NoneClause)
        .build()
        .expect("build");
    assert!(nothing.variables().expect("variables").is_empty());
    assert!(nothing.variable_entities().expect("entities").is_empty());
    assert!(nothing.list_clause().variables().is_empty());
    let err = nothing.variable_value_source("A").unwrap_err();
    assert!(matches!(err, ModelError::NoSuchVariable { .. }));
}

#[test]
fn derived_variables_are_computed_and_win_collisions() {
    let datasource = study();
    let view = ViewDefinition::new("derived", "people")
        .with_derived(DerivedVariableDefinition::new(
            "double",
            vtab_model::ValueType::Integer,
            "$('A') * 2",
        ))
        .with_derived(DerivedVariableDefinition::new(
            "B",
            vtab_model::ValueType::Text,
            "concat('b-', $('A'))",
        ))
        .build(datasource.as_ref())
        .expect("build");
    assert_eq!(names(&view.variables().expect("variables")), ["A", "C", "double", "B"]);
    let value_set = view.value_set(&participant("E2")).expect("value set");
    let view: &dyn ValueTable = &view;
    assert_eq!(
        view.value(&value_set, "double").expect("double").as_integer(),
        Some(40)
    );
    assert_eq!(view.value(&value_set, "B").expect("B").as_text(), Some("b-20"));
}

#[test]
fn views_stack_through_the_manager() {
    let manager = ViewManager::new(Arc::new(MemoryViewPersistence::new()));
    let datasource = manager.decorate(study()).expect("decorate");
    manager
        .add_view(
            "study",
            ViewDefinition::new("flagged", "people").with_where(WhereDefinition::Script {
                script: "$('C')".to_string(),
            }),
        )
        .expect("flagged");
    let subjects = manager
        .add_view(
            "study",
            ViewDefinition::new("flagged_subjects", "flagged").with_entity_mapping(
                EntityMappingDefinition::Prefix {
                    entity_type: "Subject".to_string(),
                    prefix: "S-".to_string(),
                },
            ),
        )
        .expect("flagged subjects");
    assert_eq!(ids(&subjects.variable_entities().expect("entities")), ["S-E2"]);
    assert_eq!(
        datasource.table_names().expect("names"),
        ["people", "flagged", "flagged_subjects"]
    );
    assert!(datasource.value_table("flagged").expect("view").is_view());
    let Err(err) = datasource.create_writer("flagged", "Participant") else {
        panic!("views are read-only");
    };
    assert!(matches!(err, ModelError::UnsupportedOperation(_)));
}

#[test]
fn concurrent_readers_agree() {
    let datasource = study();
    let view = Arc::new(
        ViewDefinition::new("older", "people")
            .with_where(WhereDefinition::Script {
                script: "$('A') > 10".to_string(),
            })
            .build(datasource.as_ref())
            .expect("build"),
    );
    let expected = view.variable_entities().expect("entities");
    std::thread::scope(|scope| {
        for _ in 0..4 {
            let view = Arc::clone(&view);
            let expected = &expected;
            scope.spawn(move || {
                for _ in 0..25 {
                    assert_eq!(&view.variable_entities().expect("entities"), expected);
                }
            });
        }
    });
}
