//! Internal helpers for record decoding and normalization.
//!
//! These utilities are **not** part of the public API.

use serde::{Deserialize, Deserializer, de::DeserializeOwned};

use crate::{Category, ResultEngine, remote::Row};

/// Decode backend rows into records; one bad row fails the whole batch.
pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> ResultEngine<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Into::into))
        .collect()
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Read a stored category label, mapping labels outside the fixed set to `Other`.
pub(crate) fn lenient_category<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Category, D::Error> {
    let label = Option::<String>::deserialize(deserializer)?;
    Ok(label
        .and_then(|label| label.parse().ok())
        .unwrap_or_default())
}

/// Trim optional free text, collapsing blank input to `None`.
pub fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
