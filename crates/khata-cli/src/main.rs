mod commands;
mod output;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use khata_core::model::{DocumentKind, Institution};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(
    name = "khata",
    version,
    about = "Statement ingestion for bank, card and loan documents and alert e-mails"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a statement (PDF, spreadsheet, CSV or text) into validated transactions
    Parse {
        /// Path to the statement file
        input_file: PathBuf,

        /// Declared mime type (default: guessed from the file extension)
        #[arg(long)]
        mime: Option<String>,

        /// Issuer hint: hdfc, icici, kotak, axis
        #[arg(short, long, value_parser = parse_institution)]
        institution: Option<Institution>,

        /// Document kind hint: bank, card, loan
        #[arg(short, long, value_parser = parse_kind)]
        kind: Option<DocumentKind>,

        /// Password for an encrypted PDF
        #[arg(short, long)]
        password: Option<String>,

        /// Column-mapping template (JSON); overrides routing
        #[arg(short, long, value_name = "FILE")]
        template: Option<PathBuf>,

        /// Custom settings file (JSON)
        #[arg(short, long, value_name = "FILE", conflicts_with = "preset")]
        settings: Option<PathBuf>,

        /// Built-in settings preset: default, strict
        #[arg(long)]
        preset: Option<String>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Write parsed output to a JSON file
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Show how a document would be routed
    Detect {
        /// Path to the statement file
        input_file: PathBuf,

        /// Declared mime type (default: guessed from the file extension)
        #[arg(long)]
        mime: Option<String>,

        /// Password for an encrypted PDF
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Parse one transaction alert e-mail
    Email {
        /// Sender address, e.g. "HDFC Bank <alerts@hdfcbank.net>"
        #[arg(long)]
        sender: String,

        /// Subject line
        #[arg(long, default_value = "")]
        subject: String,

        /// File holding the decoded plain-text body
        #[arg(long, value_name = "FILE")]
        body_file: PathBuf,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Match recorded EMI payments against a loan repayment schedule
    Loan {
        /// Path to the schedule document
        schedule_file: PathBuf,

        /// JSON array of transactions (e.g. from `khata parse -o json`)
        #[arg(long, value_name = "FILE")]
        payments: Option<PathBuf>,

        /// Reference date for overdue installments (default: today)
        #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
        as_of: Option<NaiveDate>,

        /// Password for an encrypted PDF
        #[arg(short, long)]
        password: Option<String>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Inspect and validate settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Draft, inspect and validate column-mapping templates
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print a built-in preset as JSON
    Show {
        /// Preset name
        #[arg(default_value = "default")]
        preset: String,
    },
    /// List built-in presets
    List,
    /// Validate a custom settings file
    Validate {
        /// Path to JSON settings file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum TemplateAction {
    /// Validate a template file
    Validate {
        /// Path to JSON template file
        file: PathBuf,
    },
    /// Print the template format with an example
    Schema,
    /// Draft a template from a sample statement
    Extract {
        /// Path to the sample statement
        input_file: PathBuf,

        /// Declared mime type (default: guessed from the file extension)
        #[arg(long)]
        mime: Option<String>,

        /// Password for an encrypted PDF
        #[arg(short, long)]
        password: Option<String>,

        /// Template name (default: the file name)
        #[arg(long)]
        name: Option<String>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Write the drafted template to a JSON file
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

fn parse_institution(s: &str) -> Result<Institution, String> {
    Institution::from_str_loose(s).ok_or_else(|| {
        format!("unknown institution '{s}'. Expected one of: hdfc, icici, kotak, axis, sbi, generic")
    })
}

fn parse_kind(s: &str) -> Result<DocumentKind, String> {
    DocumentKind::from_str_loose(s)
        .ok_or_else(|| format!("unknown document kind '{s}'. Expected one of: bank, card, loan"))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: logging unavailable: {e}");
    }

    let result = match cli.command {
        Commands::Parse {
            input_file,
            mime,
            institution,
            kind,
            password,
            template,
            settings,
            preset,
            output,
            out,
        } => commands::parse::run(commands::parse::ParseArgs {
            input_file,
            mime,
            institution,
            kind,
            password,
            template,
            settings,
            preset,
            output_format: output,
            out,
        }),
        Commands::Detect {
            input_file,
            mime,
            password,
        } => commands::detect::run(input_file, mime, password),
        Commands::Email {
            sender,
            subject,
            body_file,
            output,
        } => commands::email::run(&sender, &subject, &body_file, &output),
        Commands::Loan {
            schedule_file,
            payments,
            as_of,
            password,
            output,
        } => commands::loan::run(schedule_file, payments, as_of, password, &output),
        Commands::Settings { action } => match action {
            SettingsAction::Show { preset } => commands::settings::show(&preset),
            SettingsAction::List => commands::settings::list(),
            SettingsAction::Validate { file } => commands::settings::validate(&file),
        },
        Commands::Template { action } => match action {
            TemplateAction::Validate { file } => commands::template::validate(&file),
            TemplateAction::Schema => commands::template::schema(),
            TemplateAction::Extract {
                input_file,
                mime,
                password,
                name,
                output,
                out,
            } => commands::template::extract(
                input_file,
                mime,
                password,
                name,
                &output,
                out.as_deref(),
            ),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        if e.needs_passphrase() {
            eprintln!("Hint: pass the document password with --password");
        }
        std::process::exit(1);
    }
}
