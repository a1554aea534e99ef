use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use qrcraft::auth::{AuthService, HttpAuthService, InMemoryAuthService};
use qrcraft::color::Color;
use qrcraft::compose::LogoSize;
use qrcraft::config::Config;
use qrcraft::form::{GeneratorForm, DEFAULT_SIZE};
use qrcraft::history::{HistoryStore, HttpHistoryStore, InMemoryHistoryStore};
use qrcraft::payload::{EmailFields, PayloadRequest, VcardFields, WifiEncryption, WifiFields};
use qrcraft::render::ModuleRenderer;
use qrcraft::telemetry::init_tracing;
use qrcraft::Generator;

#[derive(Parser)]
#[command(name = "qrcraft", version)]
#[command(about = "Generate styled QR codes for links, e-mail, phone, Wi-Fi and contacts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a URL or any text
    Url {
        text: String,
        #[command(flatten)]
        style: StyleArgs,
    },
    /// Encode a mailto: link
    Email {
        #[arg(long)]
        address: String,
        #[arg(long, default_value = "")]
        subject: String,
        #[arg(long, default_value = "")]
        body: String,
        #[command(flatten)]
        style: StyleArgs,
    },
    /// Encode a tel: link
    Phone {
        number: String,
        #[command(flatten)]
        style: StyleArgs,
    },
    /// Encode Wi-Fi network credentials
    Wifi {
        #[arg(long)]
        ssid: String,
        #[arg(long, default_value = "")]
        password: String,
        /// WPA, WEP or nopass
        #[arg(long, default_value = "WPA")]
        encryption: WifiEncryption,
        #[command(flatten)]
        style: StyleArgs,
    },
    /// Encode a vCard 3.0 contact
    Vcard {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        org: String,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        email: String,
        #[command(flatten)]
        style: StyleArgs,
    },
    /// Log in and print the session token (export it as QRCRAFT_TOKEN)
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Manage generation history
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// List saved codes, most recent first
    List,
    /// Delete a saved code
    Delete { id: String },
}

#[derive(Args)]
struct StyleArgs {
    /// Image size in pixels (100-400, steps of 50)
    #[arg(long, default_value_t = DEFAULT_SIZE)]
    size: u32,

    /// Module color
    #[arg(long, default_value = "#1EAEDB")]
    color: Color,

    /// Background color
    #[arg(long, default_value = "#FFFFFF")]
    background: Color,

    /// Quiet zone in modules (0-16)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(0..=16))]
    margin: u32,

    /// Logo image placed in the center
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Logo width as a percentage of the code (10-50)
    #[arg(long, default_value_t = 20)]
    logo_size: u8,

    /// Output directory [default: $QRCRAFT_OUTPUT_DIR or ./generated]
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Output file name [default: qr-code-<millis>.png]
    #[arg(long)]
    file_name: Option<String>,

    /// Print the PNG as a data: URL instead of writing a file
    #[arg(long)]
    print_data_url: bool,
}

impl StyleArgs {
    fn apply(&self, form: &mut GeneratorForm) -> Result<()> {
        form.set_size(self.size);
        form.foreground = self.color;
        form.background = self.background;
        form.set_margin(self.margin);
        form.logo = self.logo.clone();
        form.logo_size = LogoSize::new(self.logo_size)?;
        Ok(())
    }
}

impl Commands {
    /// Login and history only make sense against a backend that outlives the process.
    fn ensure_backend(&self, config: &Config) -> Result<()> {
        let needs_backend = matches!(self, Commands::Login { .. } | Commands::History { .. });
        if needs_backend && config.api_base_url().is_none() {
            bail!("login and history require QRCRAFT_API_BASE_URL to point at a backend");
        }
        Ok(())
    }

    /// Form and style for the generate subcommands, `None` for the others.
    fn generate_request(self) -> Option<(PayloadRequest, StyleArgs)> {
        let pair = match self {
            Commands::Url { text, style } => (PayloadRequest::Url { url: text }, style),
            Commands::Email {
                address,
                subject,
                body,
                style,
            } => (
                PayloadRequest::Email {
                    email: EmailFields {
                        address,
                        subject,
                        body,
                    },
                },
                style,
            ),
            Commands::Phone { number, style } => (PayloadRequest::Phone { phone: number }, style),
            Commands::Wifi {
                ssid,
                password,
                encryption,
                style,
            } => (
                PayloadRequest::Wifi {
                    wifi: WifiFields {
                        ssid,
                        password,
                        encryption,
                    },
                },
                style,
            ),
            Commands::Vcard {
                name,
                org,
                title,
                phone,
                email,
                style,
            } => (
                PayloadRequest::Vcard {
                    vcard: VcardFields {
                        name,
                        org,
                        title,
                        phone,
                        email,
                    },
                },
                style,
            ),
            Commands::Login { .. } | Commands::History { .. } => return None,
        };
        Some(pair)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::init().context("invalid configuration")?;
    init_tracing(&config);
    let cli = Cli::parse();
    cli.command.ensure_backend(&config)?;

    match config.api_base_url() {
        Some(base_url) => {
            info!(api_base_url = base_url, "using remote history backend");
            let client = reqwest::Client::new();
            let generator = Generator::new(
                ModuleRenderer,
                HttpHistoryStore::new(client.clone(), base_url),
                HttpAuthService::new(client, base_url),
            );
            run(cli, &config, &generator).await
        }
        None => {
            info!("QRCRAFT_API_BASE_URL not set, history is disabled");
            let auth = InMemoryAuthService::new();
            let generator = Generator::new(
                ModuleRenderer,
                InMemoryHistoryStore::with_auth(auth.clone()),
                auth,
            );
            run(cli, &config, &generator).await
        }
    }
}

async fn run<H, A>(cli: Cli, config: &Config, generator: &Generator<ModuleRenderer, H, A>) -> Result<()>
where
    H: HistoryStore,
    A: AuthService,
{
    let ctx = config.request_context();

    match cli.command {
        Commands::Login { email, password } => {
            let session = generator.auth().login(&email, &password).await?;
            info!(user_id = %session.user.id, "logged in as {}", session.user.name);
            println!("{}", session.token);
        }
        Commands::History {
            command: HistoryCommands::List,
        } => {
            for record in generator.history(&ctx).await? {
                println!(
                    "{}\t{}\t{}\t{}px\t{}",
                    record.id,
                    record.created_at.to_rfc3339(),
                    record.color,
                    record.size,
                    record.content.replace('\n', "\\n"),
                );
            }
        }
        Commands::History {
            command: HistoryCommands::Delete { id },
        } => {
            if !generator.delete(&ctx, &id).await? {
                bail!("no QR code with id {id}");
            }
            println!("deleted {id}");
        }
        command => {
            let Some((request, style)) = command.generate_request() else {
                bail!("not a generate command");
            };
            let mut form = GeneratorForm::from_request(request);
            style.apply(&mut form)?;

            let mut generated = generator.generate(&ctx, &form).await?;
            if style.print_data_url {
                println!("{}", generated.data_url()?);
            } else {
                let dir = style.out_dir.as_deref().unwrap_or(config.output_dir());
                let path = generated.save(Some(dir), style.file_name.as_deref())?;
                println!("{}", path.display());
            }

            if let Some(saved) = generated.saved_record().await {
                info!(id = %saved.id, "added to history");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("qrcraft").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn offline_mode_rejects_login_and_history() {
        let config = Config::default();
        for args in [
            &["login", "--email", "demo@example.com", "--password", "password"][..],
            &["history", "list"][..],
            &["history", "delete", "1"][..],
        ] {
            let err = parse(args).command.ensure_backend(&config).unwrap_err();
            assert!(err.to_string().contains("QRCRAFT_API_BASE_URL"), "{args:?}");
        }
    }

    #[test]
    fn offline_mode_still_generates() {
        let config = Config::default();
        assert!(parse(&["url", "https://example.com"])
            .command
            .ensure_backend(&config)
            .is_ok());
    }

    #[test]
    fn margin_flag_is_bounded() {
        assert!(Cli::try_parse_from(["qrcraft", "url", "x", "--margin", "17"]).is_err());
        assert!(Cli::try_parse_from(["qrcraft", "url", "x", "--margin", "16"]).is_ok());
    }
}
