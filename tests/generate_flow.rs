use pretty_assertions::assert_eq;

use qrcraft::auth::{AuthService, InMemoryAuthService, RequestContext, DEMO_EMAIL, DEMO_PASSWORD};
use qrcraft::form::GeneratorForm;
use qrcraft::history::InMemoryHistoryStore;
use qrcraft::payload::{ContentKind, PayloadRequest, VcardFields};
use qrcraft::render::ModuleRenderer;
use qrcraft::{Color, GenerateError, Generator};

type LocalGenerator = Generator<ModuleRenderer, InMemoryHistoryStore, InMemoryAuthService>;

fn local_generator() -> LocalGenerator {
    let auth = InMemoryAuthService::new();
    Generator::new(ModuleRenderer, InMemoryHistoryStore::with_auth(auth.clone()), auth)
}

#[tokio::test]
async fn every_kind_rejects_an_empty_form() {
    let generator = local_generator();

    for kind in ContentKind::ALL {
        let mut form = GeneratorForm::new();
        form.kind = kind;

        let err = generator
            .generate(&RequestContext::anonymous(), &form)
            .await
            .unwrap_err();
        match err {
            GenerateError::Validation(message) => assert_eq!(message, kind.missing_field_message()),
            other => panic!("expected a validation error for {kind}, got {other:?}"),
        }
    }
    assert!(generator.history_store().is_empty());
}

#[tokio::test]
async fn contact_card_round_trips_through_history() {
    let generator = local_generator();
    let session = generator.auth().login(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
    let ctx = session.context();

    let mut form = GeneratorForm::from_request(PayloadRequest::Vcard {
        vcard: VcardFields {
            name: "Ada Lovelace".into(),
            org: "Analytical, Inc".into(),
            email: "ada@example.com".into(),
            ..Default::default()
        },
    });
    form.foreground = "#000000".parse::<Color>().unwrap();
    form.set_size(260);

    let mut generated = generator.generate(&ctx, &form).await.unwrap();
    assert_eq!(
        generated.payload,
        "BEGIN:VCARD\nVERSION:3.0\nFN:Ada Lovelace\nORG:Analytical\\, Inc\nEMAIL:ada@example.com\nEND:VCARD"
    );

    let saved = generated.saved_record().await.expect("signed-in request is saved");
    assert_eq!(saved.size, 250);
    assert_eq!(saved.color, Color::BLACK);
    assert!(saved.image_url.starts_with("data:image/png;base64,"));

    let history = generator.history(&ctx).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, generated.payload);

    assert!(generator.delete(&ctx, &saved.id).await.unwrap());
    assert!(!generator.delete(&ctx, &saved.id).await.unwrap());
}

#[tokio::test]
async fn histories_are_kept_per_user() {
    let generator = local_generator();
    let demo = generator.auth().login(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
    let grace = generator
        .auth()
        .register("Grace Hopper", "grace@example.com", "cobol")
        .await
        .unwrap();

    let form = GeneratorForm::from_request(PayloadRequest::Phone {
        phone: "+1 555 0100".into(),
    });
    let mut generated = generator.generate(&grace.context(), &form).await.unwrap();
    generated.saved_record().await.expect("saved for grace");

    assert_eq!(generator.history(&grace.context()).await.unwrap().len(), 1);
    assert!(generator.history(&demo.context()).await.unwrap().is_empty());
}

#[tokio::test]
async fn generated_code_is_written_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let generator = local_generator();
    let form = GeneratorForm::from_request(PayloadRequest::Url {
        url: "https://example.com".into(),
    });

    let generated = generator
        .generate(&RequestContext::anonymous(), &form)
        .await
        .unwrap();
    let path = generated.save(Some(dir.path()), Some("example")).unwrap();

    assert_eq!(path, dir.path().join("example.png"));
    let decoded = image::open(&path).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), generated.image.dimensions());
}
