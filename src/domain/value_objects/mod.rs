//! Value Objects for the storefront

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use uuid::Uuid;
use validator::ValidationError;

/// URL-safe token derived from a display name.
///
/// Slugs are not unique: two products whose names fold to the same token
/// share a slug, and lookups resolve to whichever comes first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    pub fn from_name(name: &str) -> Self { Self(generate_slug(name)) }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_string(self) -> String { self.0 }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// True when `value` already has slug shape: lowercase alphanumeric runs joined by single hyphens.
    pub fn is_well_formed(value: &str) -> bool {
        !value.is_empty()
            && value.split('-').all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()))
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Folds `name` into a slug: lowercases, transliterates `č ć đ š ž`, drops anything
/// outside `[a-z0-9]`, whitespace and `-`, then joins the remaining words with single hyphens.
pub fn generate_slug(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        match c {
            'č' | 'ć' => folded.push('c'),
            'đ' => folded.push_str("dj"),
            'š' => folded.push('s'),
            'ž' => folded.push('z'),
            c if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' => folded.push(c),
            c if c.is_whitespace() => folded.push(' '),
            _ => {}
        }
    }
    folded
        .split(|c: char| c == ' ' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Correlation key for orders placed without an account.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestDeviceId(String);

impl GuestDeviceId {
    pub fn generate() -> Self { Self(format!("guest_{}", Uuid::new_v4().simple())) }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_string(self) -> String { self.0 }
}

impl From<String> for GuestDeviceId {
    fn from(value: String) -> Self { Self(value) }
}

impl fmt::Display for GuestDeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// How an image or video field should be treated. The store keeps these as plain strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    /// `http://` or `https://` address
    Url,
    /// `data:` URI with inline content
    Inline,
    /// Site-relative path starting with `/`
    Path,
    /// Anything else, e.g. an emoji standing in for a missing photo
    Placeholder,
}

impl MediaKind {
    pub fn classify(value: &str) -> Self {
        if value.starts_with("http") { Self::Url }
        else if value.starts_with("data:") { Self::Inline }
        else if value.starts_with('/') { Self::Path }
        else { Self::Placeholder }
    }

    pub fn is_renderable_image(value: &str) -> bool { Self::classify(value) != Self::Placeholder }
}

// =============================================================================
// Contact field checks
// =============================================================================

fn failure(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() { Err(failure("required", "This field is required")) } else { Ok(()) }
}

/// `local@domain.tld`: no whitespace, exactly one `@`, and a dot inside the domain.
pub fn email_shape(value: &str) -> Result<(), ValidationError> {
    let valid = value.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.contains('@')
            && !value.chars().any(char::is_whitespace)
            && domain.char_indices().any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
    });
    if valid { Ok(()) } else { Err(failure("email", "Enter a valid email address")) }
}

/// Digits, spaces, `+` and `-` only, with at least six digits.
pub fn phone_shape(value: &str) -> Result<(), ValidationError> {
    let allowed = value.chars().all(|c| c.is_ascii_digit() || c == ' ' || c == '+' || c == '-');
    let digits = value.chars().filter(char::is_ascii_digit).count();
    if allowed && digits >= 6 { Ok(()) } else { Err(failure("phone", "Enter a valid phone number")) }
}
