//! JSON codec keyed by convention-derived names.
//!
//! Server payloads wrap models under a snake_case key derived from the
//! model's type name: `{"user_profile": {...}}` for one model,
//! `{"user_profiles": [...]}` for a list. Models opt in through
//! [`JsonModel`], usually via the [`json_model!`](crate::json_model) macro.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;
use crate::request::ResponseParser;

/// A model that travels wrapped under a key derived from its type name.
pub trait JsonModel: DeserializeOwned {
    /// PascalCase name the keys are derived from.
    const TYPE_NAME: &'static str;

    fn json_key() -> String {
        model_key_for(Self::TYPE_NAME)
    }

    fn plural_json_key() -> String {
        plural_key_for(Self::TYPE_NAME)
    }
}

/// Implement [`JsonModel`] for one or more types, using each type's own
/// identifier as its `TYPE_NAME`.
#[macro_export]
macro_rules! json_model {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl $crate::codec::JsonModel for $ty {
                const TYPE_NAME: &'static str = stringify!($ty);
            }
        )+
    };
}

/// `UserProfile` -> `user_profile`. An underscore goes in only where a
/// lowercase letter is followed by an uppercase one.
pub fn model_key_for(type_name: &str) -> String {
    let mut key = String::with_capacity(type_name.len() + 4);
    let mut prev_lower = false;
    for c in type_name.chars() {
        if prev_lower && c.is_ascii_uppercase() {
            key.push('_');
        }
        prev_lower = c.is_ascii_lowercase();
        key.push(c.to_ascii_lowercase());
    }
    key
}

/// `Subscription` -> `subscriptions`, `Category` -> `categories`.
pub fn plural_key_for(type_name: &str) -> String {
    pluralized(&model_key_for(type_name))
}

/// Pluralize a snake_case key. Keys ending in `tion` take a literal `s`.
pub fn pluralized(key: &str) -> String {
    if key.ends_with("tion") {
        return format!("{key}s");
    }
    match key.rsplit_once('_') {
        Some((head, last)) => format!("{head}_{}", pluralize_word(last)),
        None => pluralize_word(key),
    }
}

const UNCOUNTABLE: &[&str] = &[
    "equipment", "information", "rice", "money", "species", "series", "fish", "sheep",
    "deer", "news", "metadata", "feedback", "media",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("ox", "oxen"),
];

const F_TO_VES: &[&str] = &["leaf", "half", "wolf", "shelf", "calf", "loaf", "thief", "self", "elf"];

const FE_TO_VES: &[&str] = &["knife", "wife", "life"];

const O_TO_OES: &[&str] = &["hero", "potato", "tomato", "echo", "veto"];

fn pluralize_word(word: &str) -> String {
    if word.is_empty() || UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == word) {
        return plural.to_string();
    }
    if F_TO_VES.contains(&word) {
        return format!("{}ves", &word[..word.len() - 1]);
    }
    if FE_TO_VES.contains(&word) {
        return format!("{}ves", &word[..word.len() - 2]);
    }
    if O_TO_OES.contains(&word) {
        return format!("{word}es");
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|end| word.ends_with(end)) {
        return format!("{word}es");
    }
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{stem}ies");
        }
    }
    format!("{word}s")
}

/// Decode the object wrapped under `key` (or `T::json_key()`).
///
/// Yields `Ok(None)` when the text is not a JSON object, lacks the key or
/// holds `null` under it.
pub fn decode_single<T: JsonModel>(text: &str, key: Option<&str>) -> Result<Option<T>, ApiError> {
    let key = key.map_or_else(T::json_key, str::to_string);
    decode_at(text, &key)
}

/// Decode the array wrapped under `T::plural_json_key()`, in input order.
pub fn decode_list<T: JsonModel>(text: &str) -> Result<Option<Vec<T>>, ApiError> {
    decode_list_at(text, &T::plural_json_key())
}

/// Decode the array wrapped under an explicit key.
pub fn decode_list_at<T: DeserializeOwned>(text: &str, key: &str) -> Result<Option<Vec<T>>, ApiError> {
    let Some(value) = wrapped_value(text, key)? else {
        return Ok(None);
    };
    let Value::Array(items) = value else {
        return Err(ApiError::Decode(format!("`{key}` is not an array")));
    };
    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(ApiError::from))
        .collect::<Result<Vec<T>, _>>()
        .map(Some)
}

/// Decode any deserializable value wrapped under `key`.
pub fn decode_at<T: DeserializeOwned>(text: &str, key: &str) -> Result<Option<T>, ApiError> {
    wrapped_value(text, key)?
        .map(|value| serde_json::from_value(value).map_err(ApiError::from))
        .transpose()
}

/// A `null` under `key` counts as absent.
fn wrapped_value(text: &str, key: &str) -> Result<Option<Value>, ApiError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(mut map) => Ok(map.remove(key).filter(|value| !value.is_null())),
        _ => Ok(None),
    }
}

/// Parser decoding a single wrapped `T`.
pub fn single_parser<T: JsonModel + 'static>() -> ResponseParser<T> {
    Arc::new(|text: &str| decode_single::<T>(text, None))
}

/// Parser decoding a wrapped list of `T`.
pub fn list_parser<T: JsonModel + 'static>() -> ResponseParser<Vec<T>> {
    Arc::new(|text: &str| decode_list::<T>(text))
}

/// Parser for calls whose response body is irrelevant.
pub fn discard_parser() -> ResponseParser<()> {
    Arc::new(|_: &str| Ok::<_, ApiError>(None))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u64,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u64,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct UserProfile {
        name: String,
    }

    crate::json_model!(User, Item, UserProfile);

    #[test]
    fn model_keys() {
        assert_eq!(model_key_for("UserProfile"), "user_profile");
        assert_eq!(model_key_for("API"), "api");
        assert_eq!(model_key_for("UserID"), "user_id");
        assert_eq!(model_key_for("Item2Box"), "item2box");
        assert_eq!(UserProfile::json_key(), "user_profile");
    }

    #[test]
    fn plural_keys() {
        assert_eq!(plural_key_for("Subscription"), "subscriptions");
        assert_eq!(plural_key_for("Category"), "categories");
        assert_eq!(plural_key_for("Address"), "addresses");
        assert_eq!(plural_key_for("SalesPerson"), "sales_people");
        assert_eq!(plural_key_for("Day"), "days");
        assert_eq!(plural_key_for("Knife"), "knives");
        assert_eq!(plural_key_for("Equipment"), "equipment");
        assert_eq!(Item::plural_json_key(), "items");
    }

    #[test]
    fn decode_single_under_key() {
        let user = decode_single::<User>(r#"{"user":{"id":1}}"#, Some("user")).unwrap();
        assert_eq!(user, Some(User { id: 1 }));
    }

    #[test]
    fn decode_single_uses_type_key_by_default() {
        let profile = decode_single::<UserProfile>(r#"{"user_profile":{"name":"Ada"}}"#, None).unwrap();
        assert_eq!(profile.unwrap().name, "Ada");
    }

    #[test]
    fn decode_single_missing_key_is_absent() {
        assert_eq!(decode_single::<User>(r#"{"other":{}}"#, Some("user")).unwrap(), None);
    }

    #[test]
    fn decode_single_null_is_absent() {
        assert_eq!(decode_single::<User>(r#"{"user":null}"#, None).unwrap(), None);
        assert_eq!(decode_list::<Item>(r#"{"items":null}"#).unwrap(), None);
    }

    #[test]
    fn decode_single_non_object_is_absent() {
        assert_eq!(decode_single::<User>("[1,2]", None).unwrap(), None);
    }

    #[test]
    fn decode_single_malformed_is_error() {
        let err = decode_single::<User>("{not json", None).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn decode_single_type_mismatch_is_error() {
        let err = decode_single::<User>(r#"{"user":{"id":"one"}}"#, None).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn decode_list_keeps_order() {
        let items = decode_list::<Item>(r#"{"items":[{"id":1},{"id":2}]}"#).unwrap().unwrap();
        assert_eq!(items, vec![Item { id: 1 }, Item { id: 2 }]);
    }

    #[test]
    fn decode_list_missing_key_is_absent() {
        assert_eq!(decode_list::<Item>(r#"{"users":[]}"#).unwrap(), None);
    }

    #[test]
    fn decode_list_non_array_is_error() {
        let err = decode_list::<Item>(r#"{"items":{"id":1}}"#).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn ready_made_parsers() {
        let user = single_parser::<User>()(r#"{"user":{"id":9}}"#).unwrap();
        assert_eq!(user, Some(User { id: 9 }));
        assert_eq!(discard_parser()("anything").unwrap(), None);
    }
}
