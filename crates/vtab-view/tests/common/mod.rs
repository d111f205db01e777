//! Shared fixture: a `study` datasource with a `people` table.
//!
//! | entity | A  | B   | C     |
//! |--------|----|-----|-------|
//! | E1     | 10 | x   | false |
//! | E2     | 20 | y   | true  |
//! | E3     | 30 |     | false |

#![allow(dead_code)]

use std::sync::Arc;

use vtab_model::{MemoryDatasource, Value, ValueType, Variable, VariableEntity};

pub const ENTITY_TYPE: &str = "Participant";

pub fn participant(id: &str) -> VariableEntity {
    VariableEntity::new(ENTITY_TYPE, id)
}

pub fn study() -> Arc<MemoryDatasource> {
    let datasource = Arc::new(MemoryDatasource::new("study"));
    let table = datasource
        .create_table("people", ENTITY_TYPE)
        .expect("create table");
    for (name, value_type) in [
        ("A", ValueType::Integer),
        ("B", ValueType::Text),
        ("C", ValueType::Boolean),
    ] {
        table
            .add_variable(
                Variable::builder(name, value_type, ENTITY_TYPE)
                    .build()
                    .expect("variable"),
            )
            .expect("add variable");
    }
    let rows = [
        ("E1", 10, Some("x"), false),
        ("E2", 20, Some("y"), true),
        ("E3", 30, None, false),
    ];
    for (id, a, b, c) in rows {
        table
            .commit_value_set(
                &participant(id),
                vec![
                    ("A".to_string(), Value::integer(a)),
                    (
                        "B".to_string(),
                        b.map_or_else(|| ValueType::Text.null_value(), Value::text),
                    ),
                    ("C".to_string(), Value::boolean(c)),
                ],
            )
            .expect("commit row");
    }
    datasource
}
