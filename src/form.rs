//! State of the generator form.
//!
//! The form keeps the fields of every content type at once, so switching the selected kind
//! back and forth does not lose what the user typed.

use std::path::PathBuf;

use crate::color::Color;
use crate::compose::LogoSize;
use crate::payload::{self, ContentKind, EmailFields, PayloadRequest, VcardFields, WifiFields};
use crate::render::{RenderOptions, MAX_MARGIN_MODULES};

pub const MIN_SIZE: u32 = 100;
pub const MAX_SIZE: u32 = 400;
pub const SIZE_STEP: u32 = 50;
pub const DEFAULT_SIZE: u32 = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorForm {
    pub kind: ContentKind,
    pub url: String,
    pub email: EmailFields,
    pub phone: String,
    pub wifi: WifiFields,
    pub vcard: VcardFields,
    pub foreground: Color,
    pub background: Color,
    size: u32,
    margin: u32,
    pub logo: Option<PathBuf>,
    pub logo_size: LogoSize,
}

impl Default for GeneratorForm {
    fn default() -> Self {
        Self {
            kind: ContentKind::default(),
            url: String::new(),
            email: EmailFields::default(),
            phone: String::new(),
            wifi: WifiFields::default(),
            vcard: VcardFields::default(),
            foreground: Color::BRAND,
            background: Color::WHITE,
            size: DEFAULT_SIZE,
            margin: 1,
            logo: None,
            logo_size: LogoSize::default(),
        }
    }
}

impl GeneratorForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// A form with `request` selected and its fields filled in.
    pub fn from_request(request: PayloadRequest) -> Self {
        let mut form = Self::default();
        form.set_request(request);
        form
    }

    /// Selects the kind of `request` and fills its fields, leaving other kinds untouched.
    pub fn set_request(&mut self, request: PayloadRequest) {
        self.kind = request.kind();
        match request {
            PayloadRequest::Url { url } => self.url = url,
            PayloadRequest::Email { email } => self.email = email,
            PayloadRequest::Phone { phone } => self.phone = phone,
            PayloadRequest::Wifi { wifi } => self.wifi = wifi,
            PayloadRequest::Vcard { vcard } => self.vcard = vcard,
        }
    }

    /// The request for the currently selected kind.
    pub fn request(&self) -> PayloadRequest {
        match self.kind {
            ContentKind::Url => PayloadRequest::Url {
                url: self.url.clone(),
            },
            ContentKind::Email => PayloadRequest::Email {
                email: self.email.clone(),
            },
            ContentKind::Phone => PayloadRequest::Phone {
                phone: self.phone.clone(),
            },
            ContentKind::Wifi => PayloadRequest::Wifi {
                wifi: self.wifi.clone(),
            },
            ContentKind::Vcard => PayloadRequest::Vcard {
                vcard: self.vcard.clone(),
            },
        }
    }

    /// Encoded payload for the selected kind, or `None` if its required field is empty.
    pub fn payload(&self) -> Option<String> {
        payload::encode(&self.request())
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Sets the code size, clamped to `MIN_SIZE..=MAX_SIZE` and snapped to the nearest step.
    pub fn set_size(&mut self, size: u32) {
        let clamped = size.clamp(MIN_SIZE, MAX_SIZE);
        let steps = (clamped - MIN_SIZE + SIZE_STEP / 2) / SIZE_STEP;
        self.size = MIN_SIZE + steps * SIZE_STEP;
    }

    pub fn margin(&self) -> u32 {
        self.margin
    }

    /// Sets the quiet zone in modules, capped at [`MAX_MARGIN_MODULES`].
    pub fn set_margin(&mut self, margin: u32) {
        self.margin = margin.min(MAX_MARGIN_MODULES);
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            width: self.size,
            margin_modules: self.margin,
            foreground: self.foreground,
            background: self.background,
        }
    }
}
