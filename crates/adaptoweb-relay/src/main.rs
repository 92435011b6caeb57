//! AdaptoWeb relay: entry point.

use std::sync::Arc;
use tokio::sync::Mutex;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use adaptoweb::{parse_document, to_html, AdaptationController, ModuleKind, SettingsPatch};
use adaptoweb_relay::config::resolve_settings_path;
use adaptoweb_relay::protocol::ProtocolHandler;
use adaptoweb_relay::store::SettingsStore;
use adaptoweb_relay::transport::StdioTransport;

#[derive(Parser)]
#[command(
    name = "adaptoweb-relay",
    about = "AdaptoWeb relay: simplify web pages for readability over JSON-RPC",
    version
)]
struct Cli {
    /// Path to the settings file.
    #[arg(short, long)]
    settings: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay over stdio (default).
    Serve {
        /// Path to the settings file.
        #[arg(short, long)]
        settings: Option<String>,
    },

    /// Adapt an HTML file once and print the result.
    Adapt {
        /// HTML file to adapt.
        file: String,

        /// Path to the settings file.
        #[arg(short, long)]
        settings: Option<String>,

        /// Write the adapted HTML here instead of stdout.
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Inspect or change the stored settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Print relay capabilities as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   adaptoweb-relay completions bash > ~/.local/share/bash-completion/completions/adaptoweb-relay
    ///   adaptoweb-relay completions zsh > ~/.zfunc/_adaptoweb-relay
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings and status.
    Show,

    /// Merge a JSON object into the settings.
    Set {
        /// Partial settings, e.g. '{"fontSize": 20}'.
        json: String,
    },

    /// Enable or disable one module.
    Toggle {
        /// layoutSimplification, languageSimplification or interactionGuidance.
        module: String,

        /// true or false.
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

const METHODS: &[&str] = &[
    "getSettings",
    "updateSettings",
    "toggleModule",
    "toggleExtension",
    "getStatus",
    "openPage",
    "closePage",
    "renderPage",
    "appendHtml",
    "dispatchEvent",
    "ping",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Commands::Serve { settings: None }) {
        Commands::Serve { settings } => {
            let settings_path = resolve_settings_path(settings.or(cli.settings).as_deref());
            tracing::info!("AdaptoWeb relay");
            tracing::info!("Settings: {settings_path}");
            let store = Arc::new(Mutex::new(SettingsStore::open(&settings_path)));
            let handler = ProtocolHandler::new(store);
            let transport = StdioTransport::new(handler);
            transport.run().await?;
        }

        Commands::Adapt {
            file,
            settings,
            output,
        } => {
            let settings_path = resolve_settings_path(settings.or(cli.settings).as_deref());
            let store = SettingsStore::open(&settings_path);
            let html = std::fs::read_to_string(&file)?;

            let mut controller = AdaptationController::new(parse_document(&html)?);
            let changes = controller.initialize(store.settings().clone());
            tracing::info!("Adapted {file}: {changes:?}");

            let adapted = to_html(controller.document());
            match output {
                Some(path) => std::fs::write(&path, adapted)?,
                None => println!("{adapted}"),
            }
        }

        Commands::Settings { action } => {
            let settings_path = resolve_settings_path(cli.settings.as_deref());
            let mut store = SettingsStore::open(&settings_path);
            let settings = match action {
                SettingsAction::Show => store.settings().clone(),
                SettingsAction::Set { json } => {
                    let patch: SettingsPatch = serde_json::from_str(&json)?;
                    store.update(&patch)
                }
                SettingsAction::Toggle { module, enabled } => {
                    let kind = ModuleKind::from_settings_key(&module)
                        .ok_or_else(|| anyhow::anyhow!("Unknown module: {module}"))?;
                    store.toggle_module(kind, enabled)
                }
            };
            if store.is_dirty() {
                anyhow::bail!("Could not write {settings_path}");
            }
            let info = serde_json::json!({
                "path": settings_path,
                "settings": settings,
                "status": settings.status(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Info => {
            let info = serde_json::json!({
                "server": {
                    "name": "adaptoweb-relay",
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "protocol": "jsonrpc-2.0/ndjson",
                "methods": METHODS,
                "notifications": [adaptoweb_relay::types::SETTINGS_UPDATED],
                "modules": ModuleKind::ALL.iter().map(|k| k.settings_key()).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "adaptoweb-relay", &mut std::io::stdout());
        }
    }

    Ok(())
}
