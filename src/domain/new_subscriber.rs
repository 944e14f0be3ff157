use serde::Deserialize;
use serde_json::Value;

use super::SubscriberEmail;
use super::SubscriberSource;

pub const INVALID_EMAIL: &str = "Please enter a valid email address.";

/// Raw `POST /api/subscribe` body. Fields are untyped here so that a
/// missing field, or one of the wrong JSON type, is reported with the same
/// message as an invalid one.
#[derive(Deserialize, Debug, Default)]
pub struct SubscribeBody {
    #[serde(default)]
    pub email: Option<Value>,
    #[serde(default)]
    pub source: Option<Value>,
}

/// A validated signup. Fields are checked in order (email, then source) and
/// the first failure is returned.
#[derive(Debug)]
pub struct NewSubscriber {
    pub email: SubscriberEmail,
    pub source: SubscriberSource,
}

impl TryFrom<SubscribeBody> for NewSubscriber {
    type Error = String;

    fn try_from(value: SubscribeBody) -> Result<Self, Self::Error> {
        let email = value
            .email
            .as_ref()
            .and_then(Value::as_str)
            .ok_or_else(|| INVALID_EMAIL.to_string())
            .and_then(|e| SubscriberEmail::parse(e.to_owned()).map_err(|_| INVALID_EMAIL.to_string()))?;
        // non-strings fall through to the unknown-tag message
        let source = value
            .source
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .parse::<SubscriberSource>()?;
        Ok(Self { email, source })
    }
}
