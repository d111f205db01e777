//! Built-in functions available to scripts.

use chrono::{DateTime, Datelike, Utc};

use vtab_model::{Value, ValueType};

/// Name and accepted argument counts of every built-in.
const FUNCTIONS: &[(&str, usize, Option<usize>)] = &[
    ("now", 0, Some(0)),
    ("today", 0, Some(0)),
    ("year", 1, Some(1)),
    ("month", 1, Some(1)),
    ("day", 1, Some(1)),
    ("weekday", 1, Some(1)),
    ("concat", 0, None),
    ("coalesce", 1, None),
    ("isNull", 1, Some(1)),
    ("size", 1, Some(1)),
];

/// Validate a call at compile time.
pub(crate) fn check_call(name: &str, arity: usize) -> Result<(), String> {
    let Some((_, min, max)) = FUNCTIONS.iter().find(|(function, ..)| *function == name) else {
        return Err(format!("unknown function '{name}'"));
    };
    if arity < *min || max.is_some_and(|max| arity > max) {
        return Err(format!("wrong number of arguments for '{name}': {arity}"));
    }
    Ok(())
}

pub(crate) fn call(name: &str, args: Vec<Value>, now: DateTime<Utc>) -> Result<Value, String> {
    match name {
        "now" => Ok(Value::date_time(now)),
        "today" => Ok(Value::date(now.date_naive())),
        "year" => date_part(&args[0], |date| i64::from(date.year())),
        "month" => date_part(&args[0], |date| i64::from(date.month())),
        "day" => date_part(&args[0], |date| i64::from(date.day())),
        "weekday" => date_part(&args[0], |date| {
            i64::from(date.weekday().number_from_monday())
        }),
        "concat" => Ok(Value::text(
            args.iter()
                .filter_map(Value::to_text)
                .collect::<String>(),
        )),
        "coalesce" => Ok(coalesce(args)),
        "isNull" => Ok(Value::boolean(args[0].is_null())),
        "size" => i64::try_from(args[0].size())
            .map(Value::integer)
            .map_err(|err| err.to_string()),
        other => Err(format!("unknown function '{other}'")),
    }
}

fn date_part(value: &Value, part: impl Fn(chrono::NaiveDate) -> i64) -> Result<Value, String> {
    if !value.value_type().is_date_time() {
        return Err(format!("expected a date, got {}", value.value_type()));
    }
    Ok(match value.as_date() {
        Some(date) => Value::integer(part(date)),
        None => ValueType::Integer.null_value(),
    })
}

/// First non-null argument, or the last argument when all are null.
fn coalesce(args: Vec<Value>) -> Value {
    let mut last = ValueType::Text.null_value();
    for value in args {
        if !value.is_null() {
            return value;
        }
        last = value;
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn moment() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, 9, 30, 0)
            .single()
            .expect("valid moment")
    }

    #[test]
    fn date_parts_of_null_are_null() {
        let value = call("year", vec![ValueType::Date.null_value()], moment()).expect("year");
        assert!(value.is_null());
        assert_eq!(value.value_type(), ValueType::Integer);
    }

    #[test]
    fn weekday_counts_from_monday() {
        let value = call("weekday", vec![Value::date_time(moment())], moment()).expect("weekday");
        assert_eq!(value.as_integer(), Some(4));
    }

    #[test]
    fn date_parts_reject_other_types() {
        assert!(call("month", vec![Value::integer(3)], moment()).is_err());
    }

    #[test]
    fn coalesce_keeps_type_of_last_null() {
        let value = coalesce(vec![
            ValueType::Integer.null_value(),
            ValueType::Date.null_value(),
        ]);
        assert_eq!(value.value_type(), ValueType::Date);
    }
}
