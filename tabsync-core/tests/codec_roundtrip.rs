//! Cell roundtrip tests for the property codec.
//!
//! `encode(decode(s)) == s` for every writable type on representative
//! values. Each `#[case]` is isolated.

use rstest::rstest;
use tabsync_core::{
    codec::{decode, encode},
    CodecError, PropertyType, PropertyValue,
};

// ---------------------------------------------------------------------------
// Parameterised roundtrip test
// ---------------------------------------------------------------------------

#[rstest]
#[case("title", PropertyType::Title, "Quarterly review")]
#[case("rich_text", PropertyType::RichText, "日本語・한국어 & <tags>")]
#[case("number_int", PropertyType::Number, "42")]
#[case("number_frac", PropertyType::Number, "42.5")]
#[case("number_negative", PropertyType::Number, "-0.25")]
#[case("select", PropertyType::Select, "Active")]
#[case("status", PropertyType::Status, "In progress")]
#[case("multi_select", PropertyType::MultiSelect, "A, B")]
#[case("checkbox_true", PropertyType::Checkbox, "TRUE")]
#[case("checkbox_false", PropertyType::Checkbox, "FALSE")]
#[case("date", PropertyType::Date, "2023-12-01")]
#[case("date_range", PropertyType::Date, "2023-12-01 to 2023-12-02")]
#[case("url", PropertyType::Url, "https://example.com/a?b=c")]
#[case("email", PropertyType::Email, "test@example.com")]
#[case("phone", PropertyType::PhoneNumber, "+1 555 0100")]
#[case("empty_text", PropertyType::RichText, "")]
#[case("empty_multi", PropertyType::MultiSelect, "")]
fn cell_roundtrip(#[case] label: &str, #[case] ty: PropertyType, #[case] cell: &str) {
    let value = decode(ty, cell).unwrap_or_else(|e| panic!("[{label}] decode failed: {e}"));
    let back = encode(ty, &value).unwrap_or_else(|e| panic!("[{label}] encode failed: {e}"));
    assert_eq!(back, cell, "[{label}] roundtrip");
}

// ---------------------------------------------------------------------------
// Intermediate values
// ---------------------------------------------------------------------------

#[test]
fn multi_select_splits_and_trims() {
    let value = decode(PropertyType::MultiSelect, "A,  B ").expect("decode");
    assert_eq!(value, PropertyValue::Options(vec!["A".into(), "B".into()]));
    assert_eq!(encode(PropertyType::MultiSelect, &value).unwrap(), "A, B");
}

#[test]
fn boolean_literal_tokens() {
    assert_eq!(
        decode(PropertyType::Checkbox, "TRUE").unwrap(),
        PropertyValue::Checkbox(true)
    );
    assert_eq!(
        encode(PropertyType::Checkbox, &PropertyValue::Checkbox(true)).unwrap(),
        "TRUE"
    );
}

// ---------------------------------------------------------------------------
// Read-only types
// ---------------------------------------------------------------------------

#[rstest]
#[case(PropertyType::People)]
#[case(PropertyType::Formula)]
#[case(PropertyType::Relation)]
fn read_only_types_refuse_decode(#[case] ty: PropertyType) {
    let err = decode(ty, "anything").unwrap_err();
    assert_eq!(err, CodecError::UnsupportedWrite { ty });
    // Even blank cells: a read-only column never decodes.
    assert!(decode(ty, "").is_err());
}

#[test]
fn people_encode_as_joined_display_names() {
    let value = PropertyValue::People(vec!["Ada Lovelace".into(), "Alan Turing".into()]);
    assert_eq!(
        encode(PropertyType::People, &value).unwrap(),
        "Ada Lovelace, Alan Turing"
    );
}
