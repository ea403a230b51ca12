//! PostgREST query-string encoding of a [`Filter`].

use engine::Filter;
use reqwest::Url;
use serde_json::Value;

/// `eq.` operand for a predicate value. Strings are passed through verbatim.
fn operand(value: &Value) -> String {
    match value {
        Value::String(s) => format!("eq.{s}"),
        Value::Null => "is.null".to_string(),
        other => format!("eq.{other}"),
    }
}

/// Append the predicates and ordering of `filter` to `url`.
pub(crate) fn apply(url: &mut Url, filter: &Filter) {
    let mut pairs = url.query_pairs_mut();
    for (column, value) in filter.predicates() {
        pairs.append_pair(column, &operand(value));
    }
    if let Some(order) = filter.order() {
        let direction = if order.descending { "desc" } else { "asc" };
        pairs.append_pair("order", &format!("{}.{direction}", order.column));
    }
}
