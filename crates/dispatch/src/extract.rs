use std::sync::LazyLock;

use {
    regex::Regex,
    sheetbot_common::{FieldMap, FieldValue},
};

/// `identifier=value`, value running up to the next comma.
#[allow(clippy::expect_used)]
static FIELD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)=([^,]*)").expect("field pattern compiles"));

/// Extract `key=value` pairs from free text.
///
/// Returns `None` when the text holds no pair at all. Later duplicates
/// overwrite earlier ones.
pub fn extract(text: &str) -> Option<FieldMap> {
    let mut fields = FieldMap::new();
    for caps in FIELD_PATTERN.captures_iter(text) {
        let key = caps[1].trim();
        let value = caps[2].trim();
        fields.insert(key, FieldValue::coerce(value));
    }
    (!fields.is_empty()).then_some(fields)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest};

    fn text(v: &str) -> FieldValue {
        FieldValue::Text(v.to_string())
    }

    #[test]
    fn extracts_and_coerces() {
        let fields = extract("product=Laptop, quantity=5, price=1200.50").unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields.get("product"), Some(&text("Laptop")));
        assert_eq!(fields.get("quantity"), Some(&FieldValue::Integer(5)));
        assert_eq!(fields.get("price"), Some(&FieldValue::Float(1200.5)));
    }

    #[rstest]
    #[case("hello there")]
    #[case("")]
    #[case("= no key")]
    fn no_pairs_is_none(#[case] input: &str) {
        assert!(extract(input).is_none());
    }

    #[test]
    fn ignores_surrounding_prose() {
        let fields = extract("Update sales report: product=Laptop, quantity=5").unwrap();
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["product", "quantity"]);
    }

    #[test]
    fn values_are_trimmed() {
        let fields = extract("name=  Ada Lovelace  ,city= London").unwrap();
        assert_eq!(fields.get("name"), Some(&text("Ada Lovelace")));
        assert_eq!(fields.get("city"), Some(&text("London")));
    }

    #[test]
    fn equals_inside_value_is_kept() {
        let fields = extract("formula=a=b, n=1").unwrap();
        assert_eq!(fields.get("formula"), Some(&text("a=b")));
        assert_eq!(fields.get("n"), Some(&FieldValue::Integer(1)));
        assert!(!fields.contains_key("a"));
    }

    #[test]
    fn last_duplicate_wins() {
        let fields = extract("qty=1, qty=2").unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("qty"), Some(&FieldValue::Integer(2)));
    }

    #[test]
    fn empty_value_is_empty_string() {
        let fields = extract("note=, qty=2").unwrap();
        assert_eq!(fields.get("note"), Some(&text("")));
        assert_eq!(fields.get("qty"), Some(&FieldValue::Integer(2)));
    }
}
