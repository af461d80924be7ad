//! Normalization of caller-supplied identity data into [`Identity`] records.

use serde_json::{Map, Value};

use super::error::DomainError;
use super::identity::{Identity, IdentityAttributes, UserId};

const ID_FIELD: &str = "id";
const USER_ID_FIELD: &str = "userID";

/// The identity shapes callers may hand to the evaluation facade.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityInput {
    /// A bare string or numeric user id.
    Primitive(UserId),
    /// An object exposing an `id` field, such as a database model.
    StructuredWithId {
        id: UserId,
        attributes: Map<String, Value>,
    },
    /// A raw attribute bag.
    StructuredAttributes(Map<String, Value>),
    /// An identity that has already been built.
    Canonical(Identity),
}

impl TryFrom<Value> for IdentityInput {
    type Error = DomainError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(id) => Ok(Self::Primitive(UserId::Text(id))),
            Value::Number(id) => Ok(Self::Primitive(UserId::Number(id))),
            Value::Object(mut attributes) => match attributes.remove(ID_FIELD) {
                Some(Value::String(id)) => Ok(Self::StructuredWithId {
                    id: UserId::Text(id),
                    attributes,
                }),
                Some(Value::Number(id)) => Ok(Self::StructuredWithId {
                    id: UserId::Number(id),
                    attributes,
                }),
                // An explicit null id clears any `userID` the object also carries.
                Some(Value::Null) => {
                    attributes.remove(USER_ID_FIELD);
                    Ok(Self::StructuredAttributes(attributes))
                }
                Some(other) => Err(DomainError::invalid_attributes(format!(
                    "`id` must be a string or number, got {}",
                    value_kind(&other)
                ))),
                None => Ok(Self::StructuredAttributes(attributes)),
            },
            other => Err(DomainError::invalid_input(value_kind(&other))),
        }
    }
}

impl From<Identity> for IdentityInput {
    fn from(identity: Identity) -> Self {
        Self::Canonical(identity)
    }
}

impl From<IdentityAttributes> for IdentityInput {
    fn from(attributes: IdentityAttributes) -> Self {
        Self::Canonical(Identity::new(attributes))
    }
}

impl From<UserId> for IdentityInput {
    fn from(id: UserId) -> Self {
        Self::Primitive(id)
    }
}

impl From<&str> for IdentityInput {
    fn from(id: &str) -> Self {
        Self::Primitive(id.into())
    }
}

impl From<String> for IdentityInput {
    fn from(id: String) -> Self {
        Self::Primitive(id.into())
    }
}

impl From<i64> for IdentityInput {
    fn from(id: i64) -> Self {
        Self::Primitive(id.into())
    }
}

impl From<u64> for IdentityInput {
    fn from(id: u64) -> Self {
        Self::Primitive(id.into())
    }
}

/// Build an identity record from any supported input shape.
///
/// Canonical records are returned unchanged. For objects carrying an `id`
/// field, that value becomes the user id and overrides any `userID` entry.
pub fn build(input: IdentityInput) -> Result<Identity, DomainError> {
    match input {
        IdentityInput::Canonical(identity) => Ok(identity),
        IdentityInput::Primitive(id) => Ok(Identity::new(IdentityAttributes::with_user_id(id))),
        IdentityInput::StructuredAttributes(attributes) => {
            attributes_from_map(attributes).map(Identity::new)
        }
        IdentityInput::StructuredWithId { id, attributes } => {
            let mut attributes = attributes_from_map(attributes)?;
            attributes.user_id = Some(id);
            Ok(Identity::new(attributes))
        }
    }
}

/// Classify an untyped value and build an identity from it.
pub fn build_from_value(value: Value) -> Result<Identity, DomainError> {
    build(IdentityInput::try_from(value)?)
}

fn attributes_from_map(attributes: Map<String, Value>) -> Result<IdentityAttributes, DomainError> {
    serde_json::from_value(Value::Object(attributes))
        .map_err(|err| DomainError::invalid_attributes(err.to_string()))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_records_pass_through_unchanged() {
        let mut identity = Identity::new(IdentityAttributes::with_user_id("42"));
        identity.update(IdentityAttributes {
            locale: Some("fr-FR".into()),
            ..IdentityAttributes::default()
        });
        let memo = identity.to_backend_identity();

        let built = build(identity.clone().into()).expect("canonical input");
        assert_eq!(built, identity);
        assert!(std::sync::Arc::ptr_eq(&memo, &built.to_backend_identity()));
    }

    #[test]
    fn string_primitive_becomes_user_id() {
        let built = build_from_value(json!("guest")).expect("string input");
        assert_eq!(built.user_id(), Some(&UserId::from("guest")));
    }

    #[test]
    fn numeric_primitive_becomes_user_id() {
        let built = build_from_value(json!(1234)).expect("numeric input");
        assert_eq!(built.user_id(), Some(&UserId::from(1234_i64)));
        assert_eq!(built.to_backend_identity().user_id.as_deref(), Some("1234"));
    }

    #[test]
    fn object_id_becomes_user_id_and_other_fields_survive() {
        let built = build_from_value(json!({
            "id": 99,
            "country": "US",
            "plan": "pro",
        }))
        .expect("object with id");

        assert_eq!(built.user_id(), Some(&UserId::from(99_i64)));
        assert_eq!(built.attributes().country.as_deref(), Some("US"));
        assert_eq!(built.attributes().extra.get("plan"), Some(&json!("pro")));
        assert!(!built.attributes().extra.contains_key("id"));
    }

    #[test]
    fn object_id_overrides_explicit_user_id() {
        let built = build_from_value(json!({ "id": "model-1", "userID": "other" }))
            .expect("object with id");
        assert_eq!(built.user_id(), Some(&UserId::from("model-1")));
    }

    #[test]
    fn attribute_bag_is_used_verbatim() {
        let built = build_from_value(json!({
            "userID": "42",
            "country": "US",
            "custom": { "plan": "free" },
        }))
        .expect("attribute bag");

        let backend = built.to_backend_identity();
        assert_eq!(backend.user_id.as_deref(), Some("42"));
        assert_eq!(backend.country.as_deref(), Some("US"));
        assert_eq!(
            backend.custom.as_ref().and_then(|custom| custom.get("plan")),
            Some(&json!("free"))
        );
    }

    #[test]
    fn null_and_boolean_inputs_are_rejected() {
        for (value, kind) in [(json!(null), "null"), (json!(true), "boolean")] {
            match build_from_value(value) {
                Err(DomainError::InvalidIdentityInput { kind: actual }) => assert_eq!(actual, kind),
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[test]
    fn array_input_is_rejected() {
        let err = build_from_value(json!(["a"])).expect_err("arrays are not identities");
        assert_eq!(err, DomainError::invalid_input("array"));
    }

    #[test]
    fn null_object_id_builds_an_anonymous_identity() {
        let built = build_from_value(json!({ "id": null, "userID": "shadowed", "country": "US" }))
            .expect("object with null id");

        assert_eq!(built.user_id(), None);
        let backend = built.to_backend_identity();
        assert_eq!(backend.user_id.as_deref(), Some("0"));
        assert_eq!(backend.country.as_deref(), Some("US"));
    }

    #[test]
    fn non_scalar_id_is_rejected() {
        let err = build_from_value(json!({ "id": { "nested": true } })).expect_err("bad id");
        assert!(matches!(err, DomainError::InvalidAttributes { .. }));
    }

    #[test]
    fn mistyped_recognized_attribute_is_rejected() {
        let err = build_from_value(json!({ "country": 12 })).expect_err("bad country");
        assert!(matches!(err, DomainError::InvalidAttributes { .. }));
    }
}
