//! Change-stream images.
//!
//! A change-stream record describes the changed item as a map of attribute
//! name to a type-tagged value (`{"S": "text"}`, `{"N": "42"}`, ...). The
//! attribute model and its mapping onto plain serde types come from
//! `serde_dynamo`, the same crate the stream event types are built on, so an
//! image read off the wire can be decoded straight into the request type.

use serde::de::DeserializeOwned;

use crate::errors::DecodeError;

pub use serde_dynamo::{AttributeValue, Item as Image};

/// Maps a change-stream image onto `T`.
///
/// Fails with [`DecodeError::Image`] when an attribute value cannot be read
/// as the field it lands in (an `N` that is not a number, a `BOOL` where a
/// string is expected) or a required field is absent. An empty image is
/// valid input; whether it decodes depends on `T`'s defaults.
pub fn decode_image<T: DeserializeOwned>(image: &Image) -> Result<T, DecodeError> {
    serde_dynamo::from_item(image.clone()).map_err(|source| DecodeError::Image { source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Request {
        user_uuid: String,
        operation_id: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Counter {
        count: u64,
    }

    fn image(value: serde_json::Value) -> Image {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_decode_image_maps_onto_request() {
        let img = image(json!({
            "user_uuid": { "S": "iao" },
            "operation_id": { "S": "123" },
        }));

        let request: Request = decode_image(&img).unwrap();

        assert_eq!(
            request,
            Request {
                user_uuid: "iao".to_string(),
                operation_id: "123".to_string(),
            }
        );
    }

    #[test]
    fn test_nested_and_collection_attributes() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Inner {
            count: i64,
        }

        #[derive(Debug, Deserialize, PartialEq)]
        struct Rich {
            name: String,
            ratio: f64,
            active: bool,
            missing: Option<String>,
            inner: Inner,
            tags: Vec<String>,
            labels: Vec<String>,
        }

        let img = image(json!({
            "name": { "S": "text" },
            "ratio": { "N": "1.5" },
            "active": { "BOOL": true },
            "missing": { "NULL": true },
            "inner": { "M": { "count": { "N": "-7" } } },
            "tags": { "L": [{ "S": "a" }, { "S": "b" }] },
            "labels": { "SS": ["x", "y"] },
        }));

        let rich: Rich = decode_image(&img).unwrap();

        assert_eq!(
            rich,
            Rich {
                name: "text".to_string(),
                ratio: 1.5,
                active: true,
                missing: None,
                inner: Inner { count: -7 },
                tags: vec!["a".to_string(), "b".to_string()],
                labels: vec!["x".to_string(), "y".to_string()],
            }
        );
    }

    #[test]
    fn test_number_attribute_must_be_numeric() {
        let err = decode_image::<Counter>(&image(json!({ "count": { "N": "many" } }))).unwrap_err();
        assert!(matches!(err, DecodeError::Image { .. }));
    }

    #[test]
    fn test_number_attribute_is_not_trimmed() {
        assert!(decode_image::<Counter>(&image(json!({ "count": { "N": " 42 " } }))).is_err());
        assert_eq!(
            decode_image::<Counter>(&image(json!({ "count": { "N": "42" } }))).unwrap(),
            Counter { count: 42 }
        );
    }

    #[test]
    fn test_shape_mismatch_is_an_image_error() {
        let missing_field = image(json!({ "operation_id": { "S": "123" } }));
        let wrong_type = image(json!({
            "user_uuid": { "BOOL": true },
            "operation_id": { "S": "123" },
        }));

        for img in [missing_field, wrong_type] {
            let err = decode_image::<Request>(&img).unwrap_err();
            assert!(matches!(err, DecodeError::Image { .. }));
        }
    }

    #[test]
    fn test_empty_image_fails_for_required_fields() {
        assert!(decode_image::<Request>(&Image::default()).is_err());
    }
}
