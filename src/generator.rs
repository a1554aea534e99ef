//! The generation flow behind the "Generate" button.
//!
//! 1. Encode the selected payload; an empty required field stops here.
//! 2. Render the code and load the logo concurrently, then join.
//! 3. Overlay the logo.
//! 4. If the request belongs to a signed-in user, save it to history in the background.
//!    History failures are logged and never reach the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, RgbaImage};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::auth::{AuthService, RequestContext};
use crate::compose::{load_logo, overlay_logo, ComposeError};
use crate::form::GeneratorForm;
use crate::history::{HistoryError, HistoryRecord, HistoryStore, NewHistoryRecord};
use crate::payload::ContentKind;
use crate::render::{self, QrRenderer, RenderError, RenderOptions};

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// A required field is empty. Nothing was rendered or saved.
    #[error("{0}")]
    Validation(String),

    #[error("Failed to generate QR code: {0}")]
    Render(#[from] RenderError),

    #[error("Failed to load logo: {0}")]
    Logo(#[from] ComposeError),

    #[error("Rendering task failed: {0}")]
    Task(#[from] JoinError),
}

impl GenerateError {
    pub fn missing_field(kind: ContentKind) -> Self {
        GenerateError::Validation(kind.missing_field_message().to_owned())
    }
}

/// A generated code.
#[derive(Debug)]
pub struct Generated {
    pub payload: String,
    pub image: RgbaImage,
    history: Option<JoinHandle<Option<HistoryRecord>>>,
}

impl Generated {
    /// Waits for the background history save, if one was started.
    ///
    /// Returns `None` for anonymous requests and for saves that failed.
    pub async fn saved_record(&mut self) -> Option<HistoryRecord> {
        let handle = self.history.take()?;
        match handle.await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "history task did not complete");
                None
            }
        }
    }

    pub fn to_png(&self) -> Result<Vec<u8>, RenderError> {
        render::to_png_bytes(&self.image)
    }

    pub fn data_url(&self) -> Result<String, RenderError> {
        render::to_data_url(&self.image)
    }

    /// Saves the code as PNG. See [`render::save_png`] for the defaults.
    pub fn save(&self, directory: Option<&Path>, filename: Option<&str>) -> Result<PathBuf, RenderError> {
        render::save_png(&self.image, directory, filename)
    }
}

/// Generates codes and keeps history through injected collaborators.
pub struct Generator<R, H, A> {
    renderer: Arc<R>,
    history: H,
    auth: A,
}

impl<R, H, A> Generator<R, H, A>
where
    R: QrRenderer,
    H: HistoryStore,
    A: AuthService,
{
    pub fn new(renderer: R, history: H, auth: A) -> Self {
        Self {
            renderer: Arc::new(renderer),
            history,
            auth,
        }
    }

    pub fn auth(&self) -> &A {
        &self.auth
    }

    pub fn history_store(&self) -> &H {
        &self.history
    }

    /// Generates a code from the form.
    ///
    /// # Errors
    ///
    /// * [`GenerateError::Validation`] when the selected kind's required field is empty.
    /// * [`GenerateError::Render`] when the payload cannot be encoded.
    /// * [`GenerateError::Logo`] when the logo cannot be read or decoded.
    pub async fn generate(
        &self,
        ctx: &RequestContext,
        form: &GeneratorForm,
    ) -> Result<Generated, GenerateError> {
        let kind = form.kind;
        let payload = form
            .payload()
            .ok_or_else(|| GenerateError::missing_field(kind))?;
        debug!(%kind, len = payload.len(), "encoded payload");

        let (image, logo) = tokio::try_join!(
            render_blocking(Arc::clone(&self.renderer), payload.clone(), form.render_options()),
            load_optional_logo(form.logo.as_deref()),
        )
        .inspect_err(|e| error!(%kind, error = %e, "QR code generation failed"))?;
        let image = overlay_logo(image, logo.as_ref(), form.logo_size);
        info!(%kind, width = image.width(), logo = logo.is_some(), "generated QR code");

        let history = Some(self.spawn_history_save(ctx, &payload, form));
        Ok(Generated {
            payload,
            image,
            history,
        })
    }

    pub async fn history(&self, ctx: &RequestContext) -> Result<Vec<HistoryRecord>, HistoryError> {
        self.history.list(ctx).await
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<bool, HistoryError> {
        let deleted = self.history.delete(ctx, id).await?;
        info!(id, deleted, "deleted history record");
        Ok(deleted)
    }

    fn spawn_history_save(
        &self,
        ctx: &RequestContext,
        payload: &str,
        form: &GeneratorForm,
    ) -> JoinHandle<Option<HistoryRecord>> {
        let auth = self.auth.clone();
        let history = self.history.clone();
        let ctx = ctx.clone();
        let record = NewHistoryRecord::new(payload, form.foreground, form.size());

        tokio::spawn(async move {
            match auth.current_user(&ctx).await {
                Ok(Some(_)) => {}
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, "could not resolve current user, history not saved");
                    return None;
                }
            }
            match history.save(&ctx, record).await {
                Ok(saved) => {
                    info!(id = %saved.id, "saved QR code to history");
                    Some(saved)
                }
                Err(e) => {
                    warn!(error = %e, "failed to save QR code to history");
                    None
                }
            }
        })
    }
}

/// Renders on the blocking pool; encoding large payloads is CPU-bound.
async fn render_blocking<R: QrRenderer>(
    renderer: Arc<R>,
    payload: String,
    options: RenderOptions,
) -> Result<RgbaImage, GenerateError> {
    let image = tokio::task::spawn_blocking(move || renderer.render(&payload, &options)).await??;
    Ok(image)
}

async fn load_optional_logo(path: Option<&Path>) -> Result<Option<DynamicImage>, GenerateError> {
    match path {
        Some(path) => Ok(Some(load_logo(path).await?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{InMemoryAuthService, DEMO_EMAIL, DEMO_PASSWORD};
    use crate::history::InMemoryHistoryStore;
    use crate::payload::{PayloadRequest, WifiEncryption, WifiFields};
    use crate::render::ModuleRenderer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Renderer that counts calls, for checking that validation short-circuits.
    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
    }

    impl QrRenderer for CountingRenderer {
        fn render(&self, payload: &str, options: &RenderOptions) -> Result<RgbaImage, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ModuleRenderer.render(payload, options)
        }
    }

    struct FailingRenderer;

    impl QrRenderer for FailingRenderer {
        fn render(&self, _: &str, _: &RenderOptions) -> Result<RgbaImage, RenderError> {
            Err(RenderError::Encode("data too long".into()))
        }
    }

    /// History store whose every call fails.
    #[derive(Clone)]
    struct BrokenHistory;

    impl HistoryStore for BrokenHistory {
        async fn save(&self, _: &RequestContext, _: NewHistoryRecord) -> Result<HistoryRecord, HistoryError> {
            Err(HistoryError::Status {
                status: 503,
                message: "unavailable".into(),
            })
        }

        async fn list(&self, _: &RequestContext) -> Result<Vec<HistoryRecord>, HistoryError> {
            Ok(Vec::new())
        }

        async fn delete(&self, _: &RequestContext, _: &str) -> Result<bool, HistoryError> {
            Ok(false)
        }
    }

    fn url_form(url: &str) -> GeneratorForm {
        GeneratorForm::from_request(PayloadRequest::Url { url: url.into() })
    }

    fn generator() -> Generator<ModuleRenderer, InMemoryHistoryStore, InMemoryAuthService> {
        let auth = InMemoryAuthService::new();
        Generator::new(ModuleRenderer, InMemoryHistoryStore::with_auth(auth.clone()), auth)
    }

    #[tokio::test]
    async fn blank_input_is_a_validation_error_and_renders_nothing() {
        let generator = Generator::new(
            CountingRenderer::default(),
            InMemoryHistoryStore::new(),
            InMemoryAuthService::new(),
        );
        let err = generator
            .generate(&RequestContext::anonymous(), &url_form("   "))
            .await
            .unwrap_err();

        assert!(matches!(&err, GenerateError::Validation(m) if m == "Please enter a URL or text"));
        assert_eq!(generator.renderer.calls.load(Ordering::SeqCst), 0);
        assert!(generator.history_store().is_empty());
    }

    #[tokio::test]
    async fn anonymous_generation_is_not_saved() {
        let generator = generator();
        let mut generated = generator
            .generate(&RequestContext::anonymous(), &url_form("https://example.com"))
            .await
            .unwrap();

        assert_eq!(generated.payload, "https://example.com");
        assert_eq!(generated.saved_record().await, None);
        assert!(generator.history_store().is_empty());
    }

    #[tokio::test]
    async fn signed_in_generation_is_saved() {
        let generator = generator();
        let session = generator.auth().login(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
        let ctx = session.context();

        let mut form = GeneratorForm::from_request(PayloadRequest::Wifi {
            wifi: WifiFields {
                ssid: "Home".into(),
                password: "secret".into(),
                encryption: WifiEncryption::Wpa,
            },
        });
        form.set_size(300);

        let mut generated = generator.generate(&ctx, &form).await.unwrap();
        let saved = generated.saved_record().await.unwrap();
        assert_eq!(saved.content, "WIFI:S:Home;T:WPA;P:secret;;");
        assert_eq!(saved.size, 300);
        assert_eq!(saved.user_id, session.user.id);

        let history = generator.history(&ctx).await.unwrap();
        assert_eq!(history, vec![saved.clone()]);

        assert!(generator.delete(&ctx, &saved.id).await.unwrap());
        assert!(generator.history(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_failure_does_not_fail_generation() {
        let auth = InMemoryAuthService::new();
        let session = auth.login(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
        let generator = Generator::new(ModuleRenderer, BrokenHistory, auth);

        let mut generated = generator
            .generate(&session.context(), &url_form("https://example.com"))
            .await
            .unwrap();
        assert_eq!(generated.saved_record().await, None);
        assert!(generated.data_url().unwrap().starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn render_failure_is_reported() {
        let generator = Generator::new(
            FailingRenderer,
            InMemoryHistoryStore::new(),
            InMemoryAuthService::new(),
        );
        let err = generator
            .generate(&RequestContext::anonymous(), &url_form("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::Render(RenderError::Encode(_))));
    }

    #[tokio::test]
    async fn missing_logo_aborts_generation() {
        let generator = generator();
        let mut form = url_form("https://example.com");
        form.logo = Some(PathBuf::from("/no/such/logo.png"));

        let err = generator
            .generate(&RequestContext::anonymous(), &form)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::Logo(ComposeError::Read { .. })));
    }

    #[tokio::test]
    async fn logo_is_composited_after_both_loads_finish() {
        let dir = tempfile::tempdir().unwrap();
        let logo_path = dir.path().join("logo.png");
        RgbaImage::from_pixel(8, 8, image::Rgba([255, 0, 0, 255]))
            .save(&logo_path)
            .unwrap();

        let generator = generator();
        let mut form = url_form("https://example.com");
        form.logo = Some(logo_path);

        let plain = generator
            .generate(&RequestContext::anonymous(), &url_form("https://example.com"))
            .await
            .unwrap();
        let with_logo = generator
            .generate(&RequestContext::anonymous(), &form)
            .await
            .unwrap();

        assert_eq!(plain.image.dimensions(), with_logo.image.dimensions());
        let (w, h) = with_logo.image.dimensions();
        let center = with_logo.image.get_pixel(w / 2, h / 2);
        assert!(center[0] > 240 && center[1] < 16 && center[2] < 16);
        assert_ne!(plain.image, with_logo.image);
    }
}
