//! Payload encoding for the supported QR content types.
//!
//! A QR reader decides what to do with a scanned code by looking at the text it contains:
//! `mailto:` opens a mail client, `tel:` dials, `WIFI:` joins a network and `BEGIN:VCARD`
//! offers to save a contact. This module turns structured input into those strings.
//!
//! Every function here is pure. [`encode`] returns `None` when the required field of a
//! variant is empty or whitespace-only, which callers treat as a validation failure.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Wi-Fi authentication mode, as written in the `T:` field of a Wi-Fi payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WifiEncryption {
    #[default]
    #[serde(rename = "WPA")]
    Wpa,
    #[serde(rename = "WEP")]
    Wep,
    #[serde(rename = "nopass")]
    NoPass,
}

impl WifiEncryption {
    pub fn as_str(self) -> &'static str {
        match self {
            WifiEncryption::Wpa => "WPA",
            WifiEncryption::Wep => "WEP",
            WifiEncryption::NoPass => "nopass",
        }
    }
}

impl fmt::Display for WifiEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown encryption mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown Wi-Fi encryption mode `{0}` (expected WPA, WEP or nopass)")]
pub struct UnknownEncryption(pub String);

impl FromStr for WifiEncryption {
    type Err = UnknownEncryption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            m if m.eq_ignore_ascii_case("wpa") || m.eq_ignore_ascii_case("wpa2") => {
                Ok(WifiEncryption::Wpa)
            }
            m if m.eq_ignore_ascii_case("wep") => Ok(WifiEncryption::Wep),
            m if m.eq_ignore_ascii_case("nopass") || m.is_empty() => Ok(WifiEncryption::NoPass),
            other => Err(UnknownEncryption(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailFields {
    pub address: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiFields {
    pub ssid: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub encryption: WifiEncryption,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcardFields {
    pub name: String,
    #[serde(default)]
    pub org: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

/// Structured content to be encoded, one variant per content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PayloadRequest {
    Url { url: String },
    Email { email: EmailFields },
    Phone { phone: String },
    Wifi { wifi: WifiFields },
    Vcard { vcard: VcardFields },
}

impl PayloadRequest {
    /// The content kind of this request.
    pub fn kind(&self) -> ContentKind {
        match self {
            PayloadRequest::Url { .. } => ContentKind::Url,
            PayloadRequest::Email { .. } => ContentKind::Email,
            PayloadRequest::Phone { .. } => ContentKind::Phone,
            PayloadRequest::Wifi { .. } => ContentKind::Wifi,
            PayloadRequest::Vcard { .. } => ContentKind::Vcard,
        }
    }
}

/// Discriminant of [`PayloadRequest`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Url,
    Email,
    Phone,
    Wifi,
    Vcard,
}

impl ContentKind {
    pub const ALL: [ContentKind; 5] = [
        ContentKind::Url,
        ContentKind::Email,
        ContentKind::Phone,
        ContentKind::Wifi,
        ContentKind::Vcard,
    ];

    /// Message shown to the user when the required field of this kind is missing.
    pub fn missing_field_message(self) -> &'static str {
        match self {
            ContentKind::Url => "Please enter a URL or text",
            ContentKind::Email => "Please enter an email address",
            ContentKind::Phone => "Please enter a phone number",
            ContentKind::Wifi => "Please enter a network name (SSID)",
            ContentKind::Vcard => "Please enter a full name",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentKind::Url => "url",
            ContentKind::Email => "email",
            ContentKind::Phone => "phone",
            ContentKind::Wifi => "wifi",
            ContentKind::Vcard => "vcard",
        };
        f.write_str(name)
    }
}

/// Encodes a request into the text a QR reader expects for its content type.
///
/// # Arguments
///
/// * `request` - The structured content to encode.
///
/// # Returns
///
/// The payload string, or `None` if the required field of the variant is empty.
///
/// # Example
///
/// ```rust
/// use qrcraft::payload::{encode, PayloadRequest, WifiFields, WifiEncryption};
///
/// let wifi = PayloadRequest::Wifi {
///     wifi: WifiFields {
///         ssid: "Home".into(),
///         password: "secret".into(),
///         encryption: WifiEncryption::Wpa,
///     },
/// };
/// assert_eq!(encode(&wifi).as_deref(), Some("WIFI:S:Home;T:WPA;P:secret;;"));
/// ```
pub fn encode(request: &PayloadRequest) -> Option<String> {
    match request {
        PayloadRequest::Url { url } => encode_url(url),
        PayloadRequest::Email { email } => encode_email(email),
        PayloadRequest::Phone { phone } => encode_phone(phone),
        PayloadRequest::Wifi { wifi } => encode_wifi(wifi),
        PayloadRequest::Vcard { vcard } => encode_vcard(vcard),
    }
}

/// Any text is accepted; no scheme validation is done.
pub fn encode_url(text: &str) -> Option<String> {
    non_blank(text).map(str::to_owned)
}

/// Builds a `mailto:` URI with optional `subject` and `body` query parameters.
pub fn encode_email(fields: &EmailFields) -> Option<String> {
    let address = non_blank(&fields.address)?;
    let mut out = format!("mailto:{address}");

    let params: Vec<String> = [("subject", &fields.subject), ("body", &fields.body)]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect();

    if !params.is_empty() {
        out.push('?');
        out.push_str(&params.join("&"));
    }
    Some(out)
}

pub fn encode_phone(number: &str) -> Option<String> {
    non_blank(number).map(|n| format!("tel:{n}"))
}

/// Builds a `WIFI:` payload. The password is dropped for open networks.
pub fn encode_wifi(fields: &WifiFields) -> Option<String> {
    non_blank(&fields.ssid)?;

    let mut out = format!("WIFI:S:{};", escape_wifi(&fields.ssid));
    match fields.encryption {
        WifiEncryption::NoPass => out.push_str("T:;"),
        mode => {
            out.push_str(&format!("T:{mode};"));
            if !fields.password.is_empty() {
                out.push_str(&format!("P:{};", escape_wifi(&fields.password)));
            }
        }
    }
    out.push(';');
    Some(out)
}

/// Builds a vCard 3.0 record. Optional lines are emitted in a fixed order: ORG, TITLE, TEL, EMAIL.
pub fn encode_vcard(fields: &VcardFields) -> Option<String> {
    non_blank(&fields.name)?;

    let mut lines = vec![
        "BEGIN:VCARD".to_owned(),
        "VERSION:3.0".to_owned(),
        format!("FN:{}", escape_vcard(&fields.name)),
    ];
    for (prop, value) in [
        ("ORG", &fields.org),
        ("TITLE", &fields.title),
        ("TEL", &fields.phone),
        ("EMAIL", &fields.email),
    ] {
        if !value.is_empty() {
            lines.push(format!("{prop}:{}", escape_vcard(value)));
        }
    }
    lines.push("END:VCARD".to_owned());
    Some(lines.join("\n"))
}

/// Backslash-escapes the characters reserved by the Wi-Fi QR convention.
pub fn escape_wifi(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | ';' | ',' | ':') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escapes a vCard 3.0 text value (RFC 2426 section 4).
pub fn escape_vcard(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\\n");
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
