//! # qrcraft
//!
//! A Rust library for generating styled QR codes from structured content.
//!
//! `qrcraft` turns URLs, e-mail drafts, phone numbers, Wi-Fi credentials and contact cards into
//! the payload strings QR readers understand, renders them with custom colors and size, and can
//! place a logo in the middle of the code. Signed-in users get a generation history, kept through
//! a pluggable backend.
//!
//! ## Features
//!
//! - Payloads for five content types: plain URL/text, `mailto:`, `tel:`, `WIFI:` and vCard 3.0.
//! - Custom foreground/background colors, size and quiet zone.
//! - Logo overlay on a white backing square.
//! - PNG bytes, `data:` URLs, or files on disk.
//! - History and auth ports with in-memory and HTTP implementations.
//!
//! ## Example
//!
//! Encode a payload on its own:
//!
//! ```rust
//! use qrcraft::payload::{encode, PayloadRequest};
//!
//! let phone = PayloadRequest::Phone { phone: "+1 555 0100".into() };
//! assert_eq!(encode(&phone).as_deref(), Some("tel:+1 555 0100"));
//! ```
//!
//! Run the whole flow with in-memory collaborators:
//!
//! ```rust
//! use qrcraft::auth::{InMemoryAuthService, RequestContext};
//! use qrcraft::form::GeneratorForm;
//! use qrcraft::generator::Generator;
//! use qrcraft::history::InMemoryHistoryStore;
//! use qrcraft::payload::PayloadRequest;
//! use qrcraft::render::ModuleRenderer;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let auth = InMemoryAuthService::new();
//! let generator = Generator::new(ModuleRenderer, InMemoryHistoryStore::new(), auth);
//!
//! let form = GeneratorForm::from_request(PayloadRequest::Url {
//!     url: "https://example.com".into(),
//! });
//! let generated = generator
//!     .generate(&RequestContext::anonymous(), &form)
//!     .await
//!     .expect("valid payload");
//! assert!(generated.data_url().unwrap().starts_with("data:image/png;base64,"));
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`payload`]: Payload encoding for each content type.
//! - [`render`]: QR rendering and PNG export.
//! - [`compose`]: Logo overlay.
//! - [`form`]: Generator form state.
//! - [`generator`]: The generation flow.
//! - [`auth`], [`history`]: Backend ports.
//! - [`config`], [`telemetry`]: Environment configuration and logging.

pub mod auth;
pub mod color;
pub mod compose;
pub mod config;
pub mod form;
pub mod generator;
pub mod history;
pub mod payload;
pub mod render;
pub mod telemetry;

pub use color::Color;
pub use generator::{GenerateError, Generated, Generator};
pub use payload::{encode, ContentKind, PayloadRequest};
