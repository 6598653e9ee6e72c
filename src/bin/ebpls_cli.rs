//! eBPLS Command Line Interface
//!
//! Drives the address cascade against a live backend (or the built-in
//! sample directory) without the mobile UI.
//!
//! # Usage
//!
//! ```bash
//! # Point at a backend
//! ebpls_cli config set-municipality baybay
//! ebpls_cli config set-url http://localhost:8080/ebpls/api/mobile
//!
//! # Browse the directory
//! ebpls_cli regions
//! ebpls_cli chain 1042
//!
//! # Replay a saved application's addresses
//! ebpls_cli preload 9 --format json
//!
//! # Offline walkthrough on sample data
//! ebpls_cli demo
//! ```

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ebpls_mobile::address::{
    resolve_chain, AddressForm, AddressGroup, AddressLevel, AddressSelection, MirrorFlags,
    StreetDetails,
};
use ebpls_mobile::config::{available_municipalities, municipality_api_url, AppConfig};
use ebpls_mobile::{
    open_for_edit, AddressDirectory, ApplicationSource, CancellationToken, HttpClient,
    InProcessClient,
};
use ebpls_types::{ApplicationAddresses, ApplicationEdit, SavedAddress};

#[derive(Parser)]
#[command(name = "ebpls_cli")]
#[command(version)]
#[command(about = "Drive the eBPLS address cascade from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,

    /// Use the built-in sample directory instead of the configured backend
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or change which backend to use
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// List regions
    Regions,

    /// Walk a barangay up to its region
    Chain { barangay_id: i64 },

    /// Load an application for editing and replay its addresses
    Preload { application_id: String },

    /// Offline walkthrough: cascade, mirror, preload
    Demo,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the stored configuration and the resolved base URL
    Show,
    /// Use a manually entered API URL
    SetUrl { url: String },
    /// Use a municipality preset
    SetMunicipality { code: String },
    /// Forget the stored configuration
    Clear,
    /// List municipality presets
    Municipalities,
}

/// Where directory calls go
enum Backend {
    Http(HttpClient),
    Offline(InProcessClient),
}

impl Backend {
    fn connect(config: &AppConfig, offline: bool) -> Result<Self> {
        if offline {
            return Ok(Self::Offline(demo_directory()));
        }
        let client = config
            .http_client()
            .context("No usable API configuration (try `ebpls_cli config` or --offline)")?;
        Ok(Self::Http(client))
    }

    fn directory(&self) -> &dyn AddressDirectory {
        match self {
            Self::Http(c) => c,
            Self::Offline(c) => c,
        }
    }

    fn applications(&self) -> &dyn ApplicationSource {
        match self {
            Self::Http(c) => c,
            Self::Offline(c) => c,
        }
    }
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ebpls_mobile=info,ebpls_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    let result = run(cli).await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "error": format!("{e:#}") }));
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::from_env()?;
    match cli.command {
        Commands::Config { action } => cmd_config(&config, action, cli.format),
        Commands::Regions => {
            let backend = Backend::connect(&config, cli.offline)?;
            cmd_regions(&backend, cli.format).await
        }
        Commands::Chain { barangay_id } => {
            let backend = Backend::connect(&config, cli.offline)?;
            cmd_chain(&backend, barangay_id, cli.format).await
        }
        Commands::Preload { application_id } => {
            let backend = Backend::connect(&config, cli.offline)?;
            cmd_preload(&backend, &application_id, cli.format).await
        }
        Commands::Demo => cmd_demo(cli.format).await,
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn cmd_config(config: &AppConfig, action: ConfigAction, format: OutputFormat) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let store = config.store()?;
            let resolved = config.base_url();
            if format == OutputFormat::Json {
                let output = serde_json::json!({
                    "path": store.path().display().to_string(),
                    "stored": store.stored(),
                    "base_url": resolved.as_ref().ok(),
                    "error": resolved.as_ref().err().map(|e| e.to_string()),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(());
            }
            println!("{} {}", "Config file:".bold(), store.path().display());
            match resolved {
                Ok(url) => println!("{} {}", "Base URL:".bold(), url.green()),
                Err(e) => println!("{} {}", "Base URL:".bold(), e.to_string().yellow()),
            }
        }
        ConfigAction::SetUrl { url } => {
            config.store()?.set_manual_url(&url)?;
            report(format, "Manual API URL saved");
        }
        ConfigAction::SetMunicipality { code } => {
            config.store()?.set_municipality(&code)?;
            report(format, &format!("Municipality set to {code}"));
        }
        ConfigAction::Clear => {
            config.store()?.clear()?;
            report(format, "API configuration cleared");
        }
        ConfigAction::Municipalities => {
            let codes = available_municipalities();
            if format == OutputFormat::Json {
                let rows: Vec<_> = codes
                    .iter()
                    .map(|code| serde_json::json!({ "code": code, "url": municipality_api_url(code) }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for code in codes {
                    println!("  {:<12} {}", code.cyan(), municipality_api_url(code).unwrap_or_default());
                }
            }
        }
    }
    Ok(())
}

async fn cmd_regions(backend: &Backend, format: OutputFormat) -> Result<()> {
    let regions = backend
        .directory()
        .list_regions()
        .await
        .context("Failed to load regions")?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&regions)?);
    } else {
        println!("{} {} region(s)", "OK".green(), regions.len());
        for region in &regions {
            println!("  [{}] {}", region.id.to_string().dimmed(), region.name);
        }
    }
    Ok(())
}

async fn cmd_chain(backend: &Backend, barangay_id: i64, format: OutputFormat) -> Result<()> {
    let chain = resolve_chain(
        backend.directory(),
        AddressGroup::Taxpayer,
        barangay_id,
        &CancellationToken::new(),
    )
    .await?;

    if format == OutputFormat::Json {
        let output = serde_json::json!({
            "region": chain.region,
            "province": chain.province,
            "municipality": chain.municipality,
            "barangay": chain.barangay,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("  {:<13} [{}] {}", "Region".bold(), chain.region.id, chain.region.name);
        println!("  {:<13} [{}] {}", "Province".bold(), chain.province.id, chain.province.name);
        println!(
            "  {:<13} [{}] {}",
            "Municipality".bold(),
            chain.municipality.id,
            chain.municipality.name
        );
        println!(
            "  {:<13} [{}] {} ({})",
            "Barangay".bold(),
            chain.barangay.id,
            chain.barangay.name,
            chain.barangay.zipcode
        );
    }
    Ok(())
}

async fn cmd_preload(backend: &Backend, application_id: &str, format: OutputFormat) -> Result<()> {
    let mut form = AddressForm::new();
    form.load_initial(backend.directory()).await?;
    let opened = open_for_edit(
        &mut form,
        backend.directory(),
        backend.applications(),
        application_id,
    )
    .await?;

    if format == OutputFormat::Json {
        let output = serde_json::json!({
            "application_id": application_id,
            "status": opened.application.status,
            "business_name": opened.application.business_name,
            "renewal": opened.application.is_renewal_mode(),
            "released": opened.is_released(),
            "mirror": opened.mirror,
            "taxpayer": form.selection(AddressGroup::Taxpayer),
            "main_office": form.selection(AddressGroup::MainOffice),
            "business_location": form.selection(AddressGroup::BusinessLocation),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "{} Application {} {}",
        "OK".green(),
        application_id.bold(),
        opened.application.business_name.as_deref().unwrap_or_default()
    );
    if opened.is_released() {
        println!("  {}", "Released: addresses are read-only".yellow());
    }
    print_form(&form, opened.mirror);
    Ok(())
}

async fn cmd_demo(format: OutputFormat) -> Result<()> {
    let directory = demo_directory();
    let mut form = AddressForm::new();

    step(format, "Loading regions and default region");
    form.load_initial(&directory).await?;

    step(format, "Taxpayer: Leyte / Baybay City / Gaas");
    let g = AddressGroup::Taxpayer;
    form.select(g, AddressLevel::Province, Some(3), &directory).await?;
    form.select(g, AddressLevel::Municipality, Some(7), &directory).await?;
    form.select(g, AddressLevel::Barangay, Some(1042), &directory).await?;
    form.set_details(
        g,
        StreetDetails {
            street: "Rizal St".into(),
            ..Default::default()
        },
    )?;

    step(format, "Main office: same as taxpayer");
    form.set_same_as_payer(true)?;
    step(format, "Business location: same as main office, then off again");
    form.set_same_as_main(true)?;
    form.set_same_as_main(false)?;

    if format == OutputFormat::Pretty {
        print_form(&form, form.mirror_flags());
    }

    step(format, "Opening application 9 for edit");
    form.clear();
    let opened = open_for_edit(&mut form, &directory, &directory, "9").await?;

    if format == OutputFormat::Json {
        let output = serde_json::json!({
            "mirror": opened.mirror,
            "taxpayer": form.selection(AddressGroup::Taxpayer),
            "main_office": form.selection(AddressGroup::MainOffice),
            "business_location": form.selection(AddressGroup::BusinessLocation),
            "calls": directory.calls(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_form(&form, opened.mirror);
        println!("{} {} directory call(s)", "OK".green(), directory.calls().len());
    }
    Ok(())
}

// =============================================================================
// HELPERS
// =============================================================================

fn demo_directory() -> InProcessClient {
    let saved = SavedAddress {
        barangay_id: 1042,
        street: "Rizal St".into(),
        ..Default::default()
    };
    let application = ApplicationEdit {
        status: Some(2),
        business_name: Some("Gaas Sari-Sari Store".into()),
        addresses: Some(ApplicationAddresses {
            payer: Some(saved.clone()),
            main_office: Some(saved),
            business_location: Some(SavedAddress {
                barangay_id: 1060,
                street: "Del Rosario St".into(),
                ..Default::default()
            }),
        }),
        ..Default::default()
    };
    InProcessClient::sample().with_application("9", application)
}

fn report(format: OutputFormat, message: &str) {
    if format == OutputFormat::Json {
        println!("{}", serde_json::json!({ "success": true, "message": message }));
    } else {
        println!("{} {}", "OK".green(), message);
    }
}

fn step(format: OutputFormat, message: &str) {
    if format == OutputFormat::Pretty {
        println!("{} {}", "==>".cyan().bold(), message);
    }
}

fn print_form(form: &AddressForm, mirror: MirrorFlags) {
    for group in AddressGroup::ALL {
        let locked = mirror.locks(group);
        println!(
            "  {}{}",
            group.title().bold(),
            if locked { " (copied)".dimmed().to_string() } else { String::new() }
        );
        print_selection(form.selection(group));
    }
}

fn print_selection(selection: &AddressSelection) {
    if selection.path.is_empty() {
        println!("    {}", "(empty)".dimmed());
        return;
    }
    for (level, choice) in selection.path.iter() {
        let level = level.to_string();
        println!("    {:<13} {}", level, choice.name);
    }
    if !selection.zipcode.is_empty() {
        println!("    {:<13} {}", "zipcode", selection.zipcode);
    }
    if !selection.details.street.is_empty() {
        println!("    {:<13} {}", "street", selection.details.street);
    }
}
