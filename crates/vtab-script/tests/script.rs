//! Scripts evaluated against a memory table.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use vtab_filter::{ExcludeAllFilter, FilterAction, FilterError, ValueSetFilterChain};
use vtab_model::{
    MemoryDatasource, MemoryValueTable, ModelError, Value, ValueSet, ValueTable, ValueType,
    Variable, VariableEntity, VariableValueSource,
};
use vtab_script::{MAX_DEPTH, Script, ScriptError, ScriptFilter, ScriptVariableValueSource};

fn people() -> Arc<MemoryValueTable> {
    let datasource = MemoryDatasource::new("study");
    let table = datasource.create_table("people", "Participant").expect("table");
    for (name, value_type) in [
        ("weight", ValueType::Decimal),
        ("height", ValueType::Decimal),
        ("birth", ValueType::Date),
        ("smoker", ValueType::Boolean),
    ] {
        table
            .add_variable(
                Variable::builder(name, value_type, "Participant")
                    .build()
                    .expect("variable"),
            )
            .expect("add variable");
    }
    let rows = [
        ("1", "80", "2.0", "1980-05-01", "true"),
        ("2", "60", "1.5", "1992-11-20", "false"),
        ("3", "", "1.7", "", ""),
    ];
    for (id, weight, height, birth, smoker) in rows {
        let entity = VariableEntity::new("Participant", id);
        table
            .commit_value_set(
                &entity,
                vec![
                    ("weight".to_string(), ValueType::Decimal.value_of(weight).expect("weight")),
                    ("height".to_string(), ValueType::Decimal.value_of(height).expect("height")),
                    ("birth".to_string(), ValueType::Date.value_of(birth).expect("birth")),
                    ("smoker".to_string(), ValueType::Boolean.value_of(smoker).expect("smoker")),
                ],
            )
            .expect("commit");
    }
    table
}

fn value_set(id: &str) -> ValueSet {
    ValueSet::new("people", VariableEntity::new("Participant", id))
}

#[test]
fn constant_script_is_deterministic_across_threads() {
    let table = people();
    let variable = Variable::builder("two", ValueType::Integer, "Participant")
        .script("1+1")
        .build()
        .expect("variable");
    let source = Arc::new(ScriptVariableValueSource::from_variable(variable).expect("source"));
    std::thread::scope(|scope| {
        for id in ["1", "2", "3"] {
            let source = Arc::clone(&source);
            let table = Arc::clone(&table);
            scope.spawn(move || {
                for _ in 0..100 {
                    let value = source.value(&value_set(id), &*table).expect("value");
                    assert_eq!(value, Value::integer(2));
                }
            });
        }
    });
}

#[test]
fn scripts_read_other_variables() {
    let table = people();
    let script = Script::compile("$('weight') / ($('height') * $('height'))").expect("compile");
    let bmi = script.evaluate(&value_set("1"), &*table).expect("bmi");
    assert_eq!(bmi.as_decimal(), Some(20.0));
    let missing = script.evaluate(&value_set("3"), &*table).expect("bmi");
    assert!(missing.is_null());
    assert_eq!(script.variable_names(), ["weight", "height"]);
}

#[test]
fn date_functions_use_the_supplied_clock() {
    let table = people();
    let now = Utc
        .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
        .single()
        .expect("moment");
    let script = Script::compile("year(today()) - $('birth').year()").expect("compile");
    let age = script
        .evaluate_at(&value_set("2"), &*table, now)
        .expect("age");
    assert_eq!(age.as_integer(), Some(33));
    let script = Script::compile("$('birth').isNull() ? 'unknown' : 'known'").expect("compile");
    let label = script.evaluate_at(&value_set("3"), &*table, now).expect("label");
    assert_eq!(label.as_text(), Some("unknown"));
}

#[test]
fn unknown_variable_is_an_execution_error() {
    let table = people();
    let script = Script::compile("$('shoe_size') + 1").expect("compile");
    let err = script.evaluate(&value_set("1"), &*table).unwrap_err();
    assert!(matches!(err, ScriptError::Execution { ref message, .. } if message.contains("shoe_size")));
    let model: ModelError = err.into();
    assert!(matches!(model, ModelError::ScriptExecution { .. }));
}

#[test]
fn syntax_error_reports_position() {
    let err = Script::compile("$('a') +* 2").unwrap_err();
    match err {
        ScriptError::Syntax { position, .. } => assert_eq!(position, 8),
        other => panic!("unexpected error: {other}"),
    }
}

fn nested(levels: usize, inner: &str) -> String {
    format!("{}{inner}{}", "(".repeat(levels), ")".repeat(levels))
}

#[test]
fn deeply_nested_script_is_a_syntax_error() {
    let err = Script::compile(&nested(200_000, "1")).unwrap_err();
    assert!(matches!(err, ScriptError::Syntax { ref message, .. } if message.contains("nested")));
    let err = Script::compile(&format!("{}1", "!".repeat(200_000))).unwrap_err();
    assert!(matches!(err, ScriptError::Syntax { .. }));
    let err = Script::compile(&vec!["1"; 100_000].join(" + ")).unwrap_err();
    assert!(matches!(err, ScriptError::Syntax { .. }));
}

#[test]
fn nesting_within_the_limit_evaluates() {
    let table = people();
    let script = Script::compile(&nested(MAX_DEPTH / 2, "$('weight') * 2")).expect("compile");
    let value = script.evaluate(&value_set("1"), &*table).expect("evaluate");
    assert_eq!(value.as_decimal(), Some(160.0));
}

#[test]
fn malformed_scripts_fail_to_compile() {
    for source in [
        "",
        "(1 + 2",
        "1 + 2)",
        "$('weight'",
        "$(weight)",
        "'unterminated",
        "1 ? 2",
        "concat(1,,2)",
        "1 # 2",
        "99999999999999999999999",
    ] {
        let err = Script::compile(source).unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { .. }), "{source}: {err}");
    }
}

#[test]
fn script_filter_admits_true_rows() {
    let table = people();
    let chain = ValueSetFilterChain::new("smokers")
        .with_filter(ExcludeAllFilter)
        .with_filter(ScriptFilter::new(
            Script::compile("$('smoker')").expect("compile"),
            FilterAction::Include,
        ));
    let context: &(dyn ValueTable + 'static) = &*table;
    let admitted = chain
        .filter(context.value_sets().expect("value sets"), context)
        .expect("filter");
    let ids: Vec<&str> = admitted.iter().map(|vs| vs.entity().identifier()).collect();
    assert_eq!(ids, ["1"]);
}

#[test]
fn script_filter_requires_boolean() {
    let table = people();
    let chain = ValueSetFilterChain::new("weights").with_filter(ScriptFilter::new(
        Script::compile("$('weight')").expect("compile"),
        FilterAction::Exclude,
    ));
    let context: &(dyn ValueTable + 'static) = &*table;
    let err = chain
        .filter(context.value_sets().expect("value sets"), context)
        .unwrap_err();
    assert!(matches!(
        err,
        FilterError::Model(ModelError::ScriptExecution { .. })
    ));
}
