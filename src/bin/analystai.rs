//! AnalystAI CLI: manage analyst reports and their extracted data.
//!
//! Usage:
//!   analystai reports <subcommand> [--db path]
//!   analystai extract <id> [--no-tables ...] [--db path]
//!   analystai download <id> [--format json] [--db path]
//!   analystai user <subcommand> [--db path]
//!   analystai purge [--db path]

use analystai::{
    format_size, Config, ExtractionCoordinator, ExtractionOptions, FileMeta, HttpExtractor,
    OpenStore, ReportId, ReportStore, SqliteStore, UserIdentity,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "analystai", version, about = "Analyst report store")]
struct Cli {
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage uploaded reports
    Reports {
        #[command(subcommand)]
        action: ReportAction,
    },
    /// Run extraction for a report through the remote API
    Extract {
        /// Report ID
        id: String,
        #[arg(long)]
        no_text: bool,
        #[arg(long)]
        no_charts: bool,
        #[arg(long)]
        no_tables: bool,
        #[arg(long)]
        no_insights: bool,
        #[arg(long)]
        no_vectorize: bool,
    },
    /// Download the remote export of a processed report
    Download {
        /// Report ID
        id: String,
        /// Export format
        #[arg(long, default_value = "json")]
        format: String,
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Manage the signed-in user
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Delete all reports and extracted data now if nobody is signed in
    Purge,
}

#[derive(Subcommand)]
enum ReportAction {
    /// List all reports
    List,
    /// Register a PDF file
    Add {
        /// Path to the PDF
        path: PathBuf,
    },
    /// Show a report and its extracted data
    Show {
        /// Report ID
        id: String,
    },
    /// Remove a report and its extracted data
    Remove {
        /// Report ID
        id: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Show the signed-in user
    Show,
    /// Sign in
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        /// User ID (defaults to the email)
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        photo_url: Option<String>,
    },
    /// Sign out
    SignOut,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(config: &Config) -> Result<Arc<ReportStore>, String> {
    let backing = SqliteStore::open(&config.db_path)
        .map_err(|e| format!("Failed to open database: {}", e))?;
    let store = ReportStore::with_store(Arc::new(backing)).with_purge_delay(config.purge_delay);
    store
        .load()
        .map_err(|e| format!("Failed to load store: {}", e))?;
    Ok(Arc::new(store))
}

fn cmd_reports_list(store: &ReportStore) -> i32 {
    let reports = store.list_reports();
    if reports.is_empty() {
        println!("No reports uploaded.");
        return 0;
    }
    println!(
        "{:<36}  {:<28}  {:>9}  {:<10}  {:<20}",
        "ID", "NAME", "SIZE", "STATUS", "UPLOADED"
    );
    println!("{}", "-".repeat(111));
    for report in reports {
        println!(
            "{:<36}  {:<28}  {:>9}  {:<10}  {:<20}",
            report.id,
            report.name,
            format_size(report.size),
            report.status(),
            report.uploaded_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    0
}

fn cmd_reports_add(store: &ReportStore, path: &PathBuf) -> i32 {
    let meta = match FileMeta::from_path(path) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: cannot read '{}': {}", path.display(), e);
            return 1;
        }
    };
    if !meta.is_pdf() {
        eprintln!("Error: only PDF files are accepted ('{}' is {})", meta.name, meta.mime_type);
        return 1;
    }
    let name = meta.name.clone();
    match store.add_report(meta) {
        Ok(id) => {
            println!("Added report '{}' ({})", name, id);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_reports_show(store: &ReportStore, id: &ReportId) -> i32 {
    let Some(report) = store.get_report(id) else {
        eprintln!("Error: report '{}' not found", id);
        return 1;
    };
    println!("Report:    {} ({})", report.name, report.id);
    println!("Size:      {}", format_size(report.size));
    println!("Type:      {}", report.mime_type);
    println!("Uploaded:  {}", report.uploaded_at.to_rfc3339());
    println!("Status:    {}", report.status());

    let Some(data) = store.get_extracted_data(id) else {
        return 0;
    };
    println!();
    println!("Pages:     {}", data.page_count());
    println!("Tables:    {}", data.tables.len());
    println!("Charts:    {}", data.charts.len());
    if let Some(industry) = &data.industry {
        println!("Industry:  {}", industry);
    }
    if let Some(chunks) = data.chunks {
        println!("Chunks:    {}", chunks);
    }
    if let Some(summary) = &data.summary {
        println!("Summary:   {}", summary);
    }
    for insight in &data.insights {
        println!(
            "  [{}] {} ({:.0}%)",
            insight.category,
            insight.text,
            insight.confidence * 100.0
        );
    }
    0
}

fn cmd_reports_remove(store: &ReportStore, id: &ReportId) -> i32 {
    match store.remove_report(id) {
        Ok(true) => {
            println!("Removed report '{}'", id);
            0
        }
        Ok(false) => {
            eprintln!("Error: report '{}' not found", id);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_extract(
    rt: &tokio::runtime::Runtime,
    store: Arc<ReportStore>,
    config: &Config,
    id: &ReportId,
    options: ExtractionOptions,
) -> i32 {
    let coordinator = ExtractionCoordinator::new(Arc::new(HttpExtractor::new(config.api.clone())));
    rt.block_on(async {
        let handle = match coordinator.start(store, id, options) {
            Ok(h) => h,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        };
        match handle.join().await {
            Ok(record) => {
                println!(
                    "Processed report '{}': {} pages, {} tables, {} charts, {} insights",
                    id,
                    record.page_count(),
                    record.tables.len(),
                    record.charts.len(),
                    record.insights.len()
                );
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        }
    })
}

fn cmd_download(
    rt: &tokio::runtime::Runtime,
    store: &ReportStore,
    config: &Config,
    id: &ReportId,
    format: &str,
    output: Option<&PathBuf>,
) -> i32 {
    let Some(data) = store.get_extracted_data(id) else {
        eprintln!("Error: report '{}' has no extracted data", id);
        return 1;
    };
    let extractor = HttpExtractor::new(config.api.clone());
    let bytes = match rt.block_on(extractor.download(&data.id, format)) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match output {
        Some(path) => match std::fs::write(path, &bytes) {
            Ok(()) => {
                println!("Wrote {} to {}", format_size(bytes.len() as u64), path.display());
                0
            }
            Err(e) => {
                eprintln!("Error: cannot write '{}': {}", path.display(), e);
                1
            }
        },
        None => {
            println!("{}", String::from_utf8_lossy(&bytes));
            0
        }
    }
}

fn cmd_user_show(store: &ReportStore) -> i32 {
    match store.user() {
        Some(user) => {
            println!("{} <{}> ({})", user.display_name, user.email, user.id);
            if let Some(photo) = user.photo_url {
                println!("Photo: {}", photo);
            }
        }
        None => println!("Not signed in."),
    }
    0
}

fn cmd_user_set(store: &ReportStore, user: Option<UserIdentity>) -> i32 {
    let signing_in = user.is_some();
    match store.set_user(user) {
        Ok(()) => {
            if signing_in {
                println!("Signed in.");
            } else {
                println!("Signed out.");
                if store.report_count() > 0 {
                    println!(
                        "Reports are purged after {} minutes without a signed-in user \
                         while a process keeps the store open.",
                        store.purge_delay().as_secs() / 60
                    );
                    println!("Run `analystai purge` to delete them now.");
                }
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_purge(store: &ReportStore) -> i32 {
    let reports = store.report_count();
    match store.purge_if_signed_out() {
        Ok(true) => {
            println!("Purged {} reports and their extracted data.", reports);
            0
        }
        Ok(false) if store.is_signed_in() => {
            eprintln!("Error: a user is signed in; sign out before purging");
            1
        }
        Ok(false) => {
            println!("Nothing to purge.");
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::load_or_default();
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };
    // Timers armed by the store need a runtime to attach to.
    let _enter = rt.enter();

    let store = match open_store(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Reports { action } => match action {
            ReportAction::List => cmd_reports_list(&store),
            ReportAction::Add { path } => cmd_reports_add(&store, &path),
            ReportAction::Show { id } => cmd_reports_show(&store, &ReportId::from(id)),
            ReportAction::Remove { id } => cmd_reports_remove(&store, &ReportId::from(id)),
        },
        Commands::Extract {
            id,
            no_text,
            no_charts,
            no_tables,
            no_insights,
            no_vectorize,
        } => {
            let options = ExtractionOptions {
                extract_text: !no_text,
                detect_charts: !no_charts,
                detect_tables: !no_tables,
                generate_insights: !no_insights,
                vectorize: !no_vectorize,
            };
            cmd_extract(&rt, store.clone(), &config, &ReportId::from(id), options)
        }
        Commands::Download { id, format, output } => cmd_download(
            &rt,
            &store,
            &config,
            &ReportId::from(id),
            &format,
            output.as_ref(),
        ),
        Commands::User { action } => match action {
            UserAction::Show => cmd_user_show(&store),
            UserAction::SignIn {
                email,
                name,
                id,
                photo_url,
            } => {
                let mut user = UserIdentity::new(id.unwrap_or_else(|| email.clone()), email, name);
                if let Some(url) = photo_url {
                    user = user.with_photo_url(url);
                }
                cmd_user_set(&store, Some(user))
            }
            UserAction::SignOut => cmd_user_set(&store, None),
        },
        Commands::Purge => cmd_purge(&store),
    };
    std::process::exit(code);
}
