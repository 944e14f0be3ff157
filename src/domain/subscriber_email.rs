use validator::ValidateEmail;

/// A normalized (trimmed, lower-cased) and syntactically valid email address.
/// This is the natural key of a subscriber, so `" Foo@Bar.COM "` and
/// `"foo@bar.com"` parse to the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    pub fn parse(email: String) -> Result<Self, String> {
        let normalized = email.trim().to_lowercase();
        ValidateEmail::validate_email(&normalized)
            .then_some(Self(normalized))
            .ok_or(format!("Invalid email: {email:?}"))
    }
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str { &self.0 }
}

impl std::fmt::Display for SubscriberEmail {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
