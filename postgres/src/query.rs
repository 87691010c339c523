//! Translation of a compiled [`QueryPlan`] into SQL.
//!
//! Field and operator names come from closed enums, so only literal SQL
//! fragments are pushed; every user value is bound as a parameter. Text is
//! compared under the `"C"` collation so the order matches byte-wise string
//! ordering in the rest of the workspace.

use crate::rows::CONFERENCE_COLUMNS;
use conference_core::query::{Field, Predicate, QueryPlan, SortKey, Value};
use sqlx::{Postgres, QueryBuilder};

const TOPIC_MIN: &str =
    r#"(SELECT min(topic COLLATE "C") FROM unnest(topics) AS topic) NULLS FIRST"#;

/// Build the `SELECT` for a plan.
pub(crate) fn conference_query(plan: &QueryPlan) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {CONFERENCE_COLUMNS} FROM conferences"));

    for (i, predicate) in plan.predicates().iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        push_predicate(&mut builder, predicate);
    }

    builder.push(" ORDER BY ");
    for key in plan.sort() {
        builder.push(sort_expression(*key));
        builder.push(", ");
    }
    builder.push("id");
    builder
}

fn push_predicate(builder: &mut QueryBuilder<'static, Postgres>, predicate: &Predicate) {
    let token = predicate.operator.token();
    match (predicate.field, &predicate.value) {
        (Field::City, Value::Text(value)) => {
            builder.push(format!(r#"city COLLATE "C" {token} "#));
            builder.push_bind(value.clone());
        }
        (Field::Topic, Value::Text(value)) => {
            builder.push(format!(
                r#"EXISTS (SELECT 1 FROM unnest(topics) AS topic WHERE topic COLLATE "C" {token} "#
            ));
            builder.push_bind(value.clone());
            builder.push(")");
        }
        (Field::Month, Value::Integer(value)) => {
            builder.push(format!("month {token} "));
            builder.push_bind(*value);
        }
        (Field::MaxAttendees, Value::Integer(value)) => {
            builder.push(format!("max_attendees {token} "));
            builder.push_bind(*value);
        }
        // compile() never pairs a field with the wrong value type
        _ => {
            builder.push("FALSE");
        }
    }
}

const fn sort_expression(key: SortKey) -> &'static str {
    match key {
        SortKey::Name => r#"name COLLATE "C""#,
        SortKey::Field(Field::City) => r#"city COLLATE "C""#,
        SortKey::Field(Field::Topic) => TOPIC_MIN,
        SortKey::Field(Field::Month) => "month",
        SortKey::Field(Field::MaxAttendees) => "max_attendees",
    }
}
