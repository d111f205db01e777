//! Memory datasource: writer lifecycle, lookups and occurrences.

use vtab_model::{
    Datasource, MemoryDatasource, ModelError, Value, ValueTable, ValueType, Variable,
    VariableEntity,
};

fn participant(id: &str) -> VariableEntity {
    VariableEntity::new("Participant", id)
}

fn age() -> Variable {
    Variable::builder("age", ValueType::Integer, "Participant")
        .build()
        .expect("variable")
}

#[test]
fn writers_commit_on_close() {
    let datasource = MemoryDatasource::new("study");
    let writer = datasource
        .create_writer("people", "Participant")
        .expect("writer");

    let mut variables = writer.write_variables().expect("variable writer");
    variables.write_variable(&age()).expect("write variable");
    variables.close().expect("close variables");

    let mut value_set = writer
        .write_value_set(&participant("1"))
        .expect("value set writer");
    value_set
        .write_value(&age(), Value::integer(42))
        .expect("write value");

    let table = datasource.value_table("people").expect("table");
    assert!(table.variable_entities().expect("entities").is_empty());

    value_set.close().expect("close value set");
    writer.close().expect("close writer");

    let table: &dyn ValueTable = &*table;
    let vs = table.value_set(&participant("1")).expect("value set");
    assert_eq!(table.value(&vs, "age").expect("value").as_integer(), Some(42));
}

#[test]
fn dropped_writer_discards() {
    let datasource = MemoryDatasource::new("study");
    let table = datasource.create_table("people", "Participant").expect("table");
    table.add_variable(age()).expect("add variable");
    let writer = datasource
        .create_writer("people", "Participant")
        .expect("writer");
    {
        let mut value_set = writer
            .write_value_set(&participant("9"))
            .expect("value set writer");
        value_set
            .write_value(&age(), Value::integer(1))
            .expect("write value");
    }
    assert!(!table.has_value_set(&participant("9")).expect("lookup"));
}

#[test]
fn lookups_name_the_missing_coordinate() {
    let datasource = MemoryDatasource::new("study");
    let table = datasource.create_table("people", "Participant").expect("table");

    match datasource.value_table("nope") {
        Err(ModelError::NoSuchValueTable { datasource, table }) => {
            assert_eq!(datasource, "study");
            assert_eq!(table, "nope");
        }
        other => panic!("unexpected: {:?}", other.err()),
    }
    match table.variable("height") {
        Err(ModelError::NoSuchVariable { table, variable }) => {
            assert_eq!(table, "people");
            assert_eq!(variable, "height");
        }
        other => panic!("unexpected: {other:?}"),
    }
    match table.value_set(&participant("3")) {
        Err(ModelError::NoSuchValueSet { entity, .. }) => assert_eq!(entity, participant("3")),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn occurrences_follow_longest_sequence() {
    let datasource = MemoryDatasource::new("study");
    let table = datasource.create_table("visits", "Participant").expect("table");
    for (name, value_type) in [("visit_date", ValueType::Date), ("visit_weight", ValueType::Decimal)] {
        table
            .add_variable(
                Variable::builder(name, value_type, "Participant")
                    .repeatable(true)
                    .occurrence_group("visit")
                    .build()
                    .expect("variable"),
            )
            .expect("add variable");
    }
    let entity = participant("1");
    table
        .put_value(
            &entity,
            "visit_date",
            ValueType::Date
                .sequence_of_text("2024-01-01,2024-02-01,2024-03-01")
                .expect("dates"),
        )
        .expect("put dates");
    table
        .put_value(
            &entity,
            "visit_weight",
            ValueType::Decimal.sequence_of_text("70.5,71").expect("weights"),
        )
        .expect("put weights");

    let table: &dyn ValueTable = &*table;
    let vs = table.value_set(&entity).expect("value set");
    let occurrences = table.occurrences(&vs, "visit").expect("occurrences");
    assert_eq!(occurrences.len(), 3);
    assert_eq!(occurrences[2].order(), 2);

    let weight = table
        .occurrence_value(&occurrences[1], "visit_weight")
        .expect("weight");
    assert_eq!(weight.as_decimal(), Some(71.0));
    let missing = table
        .occurrence_value(&occurrences[2], "visit_weight")
        .expect("weight");
    assert!(missing.is_null());
}

#[test]
fn concurrent_readers_see_consistent_rows() {
    let datasource = MemoryDatasource::new("study");
    let table = datasource.create_table("people", "Participant").expect("table");
    table.add_variable(age()).expect("add variable");
    for id in 0..50 {
        table
            .put_value(&participant(&id.to_string()), "age", Value::integer(id))
            .expect("put");
    }
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let table: &dyn ValueTable = &*table;
                for vs in table.value_sets().expect("value sets") {
                    let value = table.value(&vs, "age").expect("value");
                    let id: i64 = vs.entity().identifier().parse().expect("id");
                    assert_eq!(value.as_integer(), Some(id));
                }
            });
        }
    });
}
