//! Command-line interface for boothscan.
//!
//! Provides commands for running the API server, driving a capture session
//! from files, and working with stored visitors (list, show, enrich, email).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::capture::{FileCamera, FileMicrophone, SessionDriver};
use crate::client::ApiClient;
use crate::config;
use crate::extraction::ExtractionClient;
use crate::notify::{Attachment, MailRelayClient};
use crate::server::{self, AppContext};
use crate::store::VisitorStore;

const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";

/// boothscan - Trade-show visitor capture and AI enrichment
#[derive(Parser, Debug)]
#[command(name = "boothscan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the visitor API server
    Serve {
        /// Address to bind to (overrides config)
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Drive a capture session from files against a running server
    Scan {
        /// Business card image
        #[arg(short, long)]
        image: PathBuf,

        /// Conversation audio recording
        #[arg(short = 'r', long)]
        audio: PathBuf,

        /// Submit the reviewed visitor instead of only printing it
        #[arg(long)]
        submit: bool,

        /// Visitor API base URL
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },

    /// List stored visitors
    Visitors {
        /// Maximum number of visitors to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Visitor API base URL
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },

    /// Show details of a stored visitor
    Show {
        /// Visitor ID
        id: String,

        /// Visitor API base URL
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },

    /// Generate and store an AI conversation summary for a visitor
    Enrich {
        /// Visitor ID
        id: String,

        /// Visitor API base URL
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },

    /// Send the follow-up email for a visitor
    Email {
        /// Visitor ID
        id: String,

        /// Files to attach (repeatable)
        #[arg(short, long)]
        attach: Vec<PathBuf>,

        /// Visitor API base URL
        #[arg(long, default_value = DEFAULT_SERVER)]
        server: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Serve { address } => serve(address).await,
            Commands::Scan {
                image,
                audio,
                submit,
                server,
            } => scan(image, audio, submit, &server).await,
            Commands::Visitors { limit, server } => list_visitors(limit, &server).await,
            Commands::Show { id, server } => show_visitor(&id, &server).await,
            Commands::Enrich { id, server } => enrich_visitor(&id, &server).await,
            Commands::Email { id, attach, server } => send_email(&id, attach, &server).await,
            Commands::Config => show_config(),
        }
    }
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).with_context(|| format!("Invalid visitor id: {}", id))
}

/// Run the API server with collaborators built from config
async fn serve(address: Option<String>) -> Result<()> {
    let cfg = config::config()?;

    let addr = match address {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("Invalid listen address: {}", raw))?,
        None => cfg.listen_addr,
    };

    let store = VisitorStore::open(&cfg.store_path())
        .with_context(|| format!("Failed to open store at {}", cfg.store_path().display()))?;

    let extractor = ExtractionClient::new(
        cfg.extraction_endpoint.clone(),
        cfg.extraction_api_key.clone(),
        cfg.extraction_timeout,
    );

    let mailer = MailRelayClient::new(
        cfg.mail_relay_url.clone(),
        cfg.mail_api_key.clone(),
        cfg.mail_from.clone(),
        cfg.mail_timeout,
    );

    let ctx = Arc::new(AppContext {
        store: Arc::new(store),
        extractor: Arc::new(extractor),
        mailer: Arc::new(mailer),
    });

    server::run(ctx, addr).await;
    Ok(())
}

/// Walk a capture session from files: photo -> fields -> recording ->
/// transcript -> review, optionally submitting at the end.
async fn scan(image: PathBuf, audio: PathBuf, submit: bool, server: &str) -> Result<()> {
    let cfg = config::config()?;

    let extractor = ExtractionClient::new(
        cfg.extraction_endpoint.clone(),
        cfg.extraction_api_key.clone(),
        cfg.extraction_timeout,
    );

    let driver = SessionDriver::new(
        Arc::new(FileCamera::new(image)),
        Arc::new(FileMicrophone::new(audio)),
        Arc::new(extractor),
        Arc::new(ApiClient::new(server)),
    );

    eprintln!("📷 Capturing card image...");
    driver.start_camera().await?;
    driver.capture_photo().await?;

    eprintln!("🔎 Extracting fields...");
    driver.extract_fields().await?;

    let fields = driver
        .fields()
        .context("Extraction finished without fields")?;
    println!("Name:     {}", fields.name);
    println!("Position: {}", fields.position);
    println!("Email:    {}", fields.email);
    println!("Phone:    {}", fields.phone);
    println!("Company:  {}", fields.company);
    println!("Domain:   {}", fields.domain);

    eprintln!("🎙  Transcribing conversation...");
    driver.stop_recording().await?;

    match driver.transcript() {
        Some(transcript) if !transcript.is_empty() => {
            println!("\nTranscript:\n{}", transcript);
        }
        _ => {
            if let Some(error) = driver.error() {
                eprintln!("⚠️  Transcription failed: {}", error);
            }
            println!("\nTranscript: (none)");
        }
    }

    if submit {
        eprintln!("\n📤 Submitting visitor...");
        match driver.submit().await? {
            Some(id) => {
                eprintln!("✅ Visitor saved");
                println!("{}", id);
            }
            None => eprintln!("Submission was superseded, nothing saved"),
        }
    } else {
        eprintln!("\n(dry run - pass --submit to save this visitor)");
    }

    Ok(())
}

/// List visitors, newest first
async fn list_visitors(limit: usize, server: &str) -> Result<()> {
    let client = ApiClient::new(server);
    let visitors = client.list_visitors().await?;

    if visitors.is_empty() {
        println!("No visitors found");
        return Ok(());
    }

    println!("{:<38} {:<24} {:<24} {:<20}", "ID", "NAME", "COMPANY", "CREATED");
    println!("{}", "-".repeat(108));
    for visitor in visitors.iter().take(limit) {
        println!(
            "{:<38} {:<24} {:<24} {:<20}",
            visitor.id,
            visitor.name,
            visitor.company,
            visitor.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }

    Ok(())
}

/// Show one visitor in full
async fn show_visitor(id: &str, server: &str) -> Result<()> {
    let client = ApiClient::new(server);
    let visitor = client.get_visitor(parse_id(id)?).await?;

    println!("ID:       {}", visitor.id);
    println!("Name:     {}", visitor.name);
    println!("Position: {}", visitor.position);
    println!("Email:    {}", visitor.email);
    println!("Phone:    {}", visitor.phone);
    println!("Company:  {}", visitor.company);
    println!("Domain:   {}", visitor.domain);
    println!("Created:  {}", visitor.created_at);

    if let Some(transcript) = &visitor.transcript {
        println!("\nTranscript:\n{}", transcript);
    }

    println!("\nFollow-up subject: {}", visitor.subject);
    println!("Follow-up body:\n{}", visitor.body);

    if !visitor.ai_summary.is_empty() {
        println!("\nAI summary:\n{}", visitor.ai_summary);
        println!("\nKey points:");
        for point in &visitor.enriched_data.key_points {
            println!("  - {}", point);
        }
        println!("Action items:");
        for item in &visitor.enriched_data.action_items {
            println!("  - {}", item);
        }
        println!("Sentiment: {}", visitor.enriched_data.sentiment);
    }

    Ok(())
}

/// Trigger summary generation for a visitor
async fn enrich_visitor(id: &str, server: &str) -> Result<()> {
    let client = ApiClient::new(server);
    let summary = client.enrich_visitor(parse_id(id)?).await?;

    println!("Summary:\n{}", summary.summary);
    println!("\nKey points:");
    for point in &summary.key_points {
        println!("  - {}", point);
    }
    println!("Action items:");
    for item in &summary.action_items {
        println!("  - {}", item);
    }
    println!("Sentiment: {}", summary.sentiment);

    Ok(())
}

/// Send the stored follow-up email, with optional attachments
async fn send_email(id: &str, attach: Vec<PathBuf>, server: &str) -> Result<()> {
    let mut attachments = Vec::new();
    for path in attach {
        let content = std::fs::read(&path)
            .with_context(|| format!("Failed to read attachment: {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "attachment".to_string());
        attachments.push(Attachment { filename, content });
    }

    let client = ApiClient::new(server);
    client.send_follow_up(parse_id(id)?, attachments).await?;

    eprintln!("✅ Email sent");
    Ok(())
}

/// Print the resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("Home:                {}", cfg.home.display());
    println!("Store:               {}", cfg.store_path().display());
    println!("Listen address:      {}", cfg.listen_addr);
    println!("Extraction endpoint: {}", cfg.extraction_endpoint);
    println!(
        "Extraction API key:  {}",
        if cfg.extraction_api_key.is_empty() {
            "(not set)"
        } else {
            "(set)"
        }
    );
    println!("Extraction timeout:  {:?}", cfg.extraction_timeout);
    println!("Mail relay:          {}", cfg.mail_relay_url);
    println!("Mail from:           {}", cfg.mail_from);
    match &cfg.config_file {
        Some(path) => println!("Config file:         {}", path.display()),
        None => println!("Config file:         (none found)"),
    }

    Ok(())
}
