use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{fmt, EnvFilter};

use crate::catalog::CatalogRepository;
use crate::db::PgCatalog;

mod catalog;
mod db;
mod models;
mod report;
mod resolve;
mod runlog;
mod sheet;

#[derive(Parser)]
#[command(name = "grade-ingest")]
#[command(about = "Load semester grade distributions into the course catalog", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the catalog schema
    InitDb,
    /// Load a small demo catalog
    Seed,
    /// Import a grade sheet, e.g. `import "Fall 2019.csv" 19F`
    Import {
        /// Grade sheet and semester, when not given as flags
        #[arg(value_name = "ARGS")]
        positional: Vec<String>,
        /// CSV grade file to be parsed
        #[arg(long)]
        file: Option<PathBuf>,
        /// Semester of the grades, ex: 18U, 19F
        #[arg(long)]
        semester: Option<String>,
        #[arg(long, default_value = "logs")]
        log_dir: PathBuf,
    },
    /// Show the sections of a course and their grade distributions
    Sections {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        course_number: String,
        #[arg(long)]
        semester: Option<String>,
    },
}

/// Flags win; positionals fill whatever the flags left out, file first.
fn resolve_import_args(
    positional: Vec<String>,
    file: Option<PathBuf>,
    semester: Option<String>,
) -> Result<(PathBuf, String), &'static str> {
    let mut rest = positional.into_iter();
    let file = file
        .or_else(|| rest.next().map(PathBuf::from))
        .ok_or("a grade sheet is required: pass FILE or --file")?;
    let semester = semester
        .or_else(|| rest.next())
        .ok_or("a semester is required: pass SEMESTER or --semester")?;
    if rest.next().is_some() {
        return Err("too many arguments for import");
    }
    Ok((file, semester))
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to the catalog Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

/// Fatal errors go to standard output with their whole context chain.
fn report_fatal<W: Write>(out: &mut W, err: &anyhow::Error) {
    let _ = writeln!(out, "error: {err:#}");
}

#[tokio::main]
async fn main() -> ExitCode {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_fatal(&mut io::stdout(), &err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect().await?;
            db::seed(&pool).await?;
            println!("Seed catalog inserted.");
        }
        Commands::Import {
            positional,
            file,
            semester,
            log_dir,
        } => {
            let (csv, session) = match resolve_import_args(positional, file, semester) {
                Ok(args) => args,
                Err(message) => Cli::command()
                    .error(ErrorKind::MissingRequiredArgument, message)
                    .exit(),
            };

            let file = sheet::open_grade_sheet(&csv)?;
            let (mut log, log_path) = runlog::open_run_log(&log_dir, &csv)?;
            let catalog = PgCatalog::new(connect().await?);

            let summary = resolve::import_sheet(file, &catalog, &session, &mut log)
                .await
                .with_context(|| format!("could not parse {}", csv.display()))?;
            tracing::info!(entries = log.entries(), "run log {}", log_path.display());
            print!(
                "{}",
                report::build_import_summary(&csv, &session, &summary, &log_path)
            );
        }
        Commands::Sections {
            subject,
            course_number,
            semester,
        } => {
            let catalog = PgCatalog::new(connect().await?);
            let Some(course) = catalog.find_course(&subject, &course_number).await? else {
                println!("Course {subject} {course_number} not found.");
                return Ok(());
            };
            let sections = catalog.course_sections(&course).await?;
            print!(
                "{}",
                report::build_section_listing(&course, &sections, semester.as_deref())
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn import_accepts_positional_arguments() {
        let args = resolve_import_args(strings(&["Fall 2019.csv", "19F"]), None, None).unwrap();
        assert_eq!(args, (PathBuf::from("Fall 2019.csv"), "19F".to_string()));
    }

    #[test]
    fn import_accepts_flags() {
        let cli = Cli::try_parse_from([
            "grade-ingest",
            "import",
            "--file",
            "Fall 2019.csv",
            "--semester",
            "19F",
        ])
        .unwrap();
        let Commands::Import {
            positional,
            file,
            semester,
            log_dir,
        } = cli.command
        else {
            panic!("expected import");
        };
        assert_eq!(log_dir, PathBuf::from("logs"));
        let args = resolve_import_args(positional, file, semester).unwrap();
        assert_eq!(args, (PathBuf::from("Fall 2019.csv"), "19F".to_string()));
    }

    #[test]
    fn positional_fills_in_missing_flag() {
        let args = resolve_import_args(
            strings(&["19S"]),
            Some(PathBuf::from("Spring 2019.csv")),
            None,
        )
        .unwrap();
        assert_eq!(args, (PathBuf::from("Spring 2019.csv"), "19S".to_string()));
    }

    #[test]
    fn import_requires_semester() {
        let err = resolve_import_args(strings(&["Fall 2019.csv"]), None, None).unwrap_err();
        assert!(err.contains("semester"));

        let err = resolve_import_args(Vec::new(), None, Some("19F".to_string())).unwrap_err();
        assert!(err.contains("grade sheet"));
    }

    #[test]
    fn import_rejects_extra_arguments() {
        let err = resolve_import_args(
            strings(&["19F"]),
            Some(PathBuf::from("a.csv")),
            Some("19F".to_string()),
        )
        .unwrap_err();
        assert_eq!(err, "too many arguments for import");
    }

    #[test]
    fn fatal_errors_print_full_context() {
        let err = anyhow::anyhow!("connection refused").context("failed to connect to Postgres");
        let mut out = Vec::new();
        report_fatal(&mut out, &err);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "error: failed to connect to Postgres: connection refused\n"
        );
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
