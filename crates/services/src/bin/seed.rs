use std::fmt;

use chrono::{DateTime, Duration, Utc};
use nexus_core::model::{
    Audience, EventDraft, FormDraft, NewUser, OptionDraft, QuestionDraft, QuestionKind,
    Recurrence, Role, User,
};
use services::{AppServices, AuthError, Clock, ServiceOptions};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    password: String,
    domain: String,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("NEXUS_DB_URL")
            .unwrap_or_else(|_| "sqlite:nexus.sqlite3?mode=rwc".into());
        let mut password =
            std::env::var("NEXUS_SEED_PASSWORD").unwrap_or_else(|_| "changeme123".into());
        let mut domain =
            std::env::var("NEXUS_SEED_DOMAIN").unwrap_or_else(|_| "nexus.example".into());
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--password" => password = require_value(&mut args, "--password")?,
                "--domain" => domain = require_value(&mut args, "--domain")?,
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            password,
            domain,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p services --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:nexus.sqlite3?mode=rwc)");
    eprintln!("  --password <text>         Password for every seeded account (default: changeme123)");
    eprintln!("  --domain <domain>         Email domain for seeded accounts (default: nexus.example)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  NEXUS_DB_URL, NEXUS_SEED_PASSWORD, NEXUS_SEED_DOMAIN");
}

async fn account(
    app: &AppServices,
    admin: &User,
    email: String,
    name: &str,
    role: Role,
    password: &str,
) -> Result<User, Box<dyn std::error::Error>> {
    let draft = NewUser {
        email: email.clone(),
        name: name.to_owned(),
        role,
    };
    match app.auth().create_user(admin, draft, password).await {
        Ok(user) => Ok(user),
        Err(AuthError::EmailTaken) => app
            .auth()
            .list_users(admin, Some(role))
            .await?
            .into_iter()
            .find(|user| user.email == email)
            .ok_or_else(|| format!("{email} exists with another role").into()),
        Err(err) => Err(err.into()),
    }
}

fn safety_quiz() -> FormDraft {
    let option = |text: &str, is_correct: bool| OptionDraft {
        text: text.to_owned(),
        is_correct,
        points: u32::from(is_correct) * 5,
    };
    FormDraft {
        title: "Workplace safety check".into(),
        description: Some("Five points per correct answer.".into()),
        is_quiz: true,
        questions: vec![
            QuestionDraft {
                text: "Where do you go when the fire alarm sounds?".into(),
                kind: QuestionKind::SingleChoice,
                required: true,
                options: vec![
                    option("The nearest marked exit", true),
                    option("The elevator", false),
                    option("Back to your desk", false),
                ],
            },
            QuestionDraft {
                text: "Which of these must be reported?".into(),
                kind: QuestionKind::MultipleChoice,
                required: true,
                options: vec![
                    option("Near misses", true),
                    option("Injuries", true),
                    option("Lunch orders", false),
                ],
            },
        ],
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let clock = args.now.map_or_else(Clock::system, Clock::manual);
    let now = clock.now();
    let app = AppServices::new_sqlite(&args.db_url, clock, ServiceOptions::default()).await?;
    let auth = app.auth();

    let email = |local: &str| format!("{local}@{}", args.domain);
    let admin = auth
        .ensure_admin(&email("admin"), "Platform Admin", &args.password)
        .await?;
    let instructor = account(
        &app,
        &admin,
        email("instructor"),
        "Ines Instructor",
        Role::Instructor,
        &args.password,
    )
    .await?;
    let student = account(
        &app,
        &admin,
        email("student"),
        "Sam Student",
        Role::Student,
        &args.password,
    )
    .await?;

    if !app.courses().list_courses(&admin).await?.is_empty() {
        println!("{} already has courses, accounts refreshed only", args.db_url);
        return Ok(());
    }

    let quiz = app.forms().create_form(&instructor, safety_quiz()).await?;
    app.forms().publish_form(&instructor, quiz.id).await?;

    let courses = app.courses();
    let course = courses
        .create_course(
            &instructor,
            "Workplace Safety 101",
            Some("Mandatory onboarding for every new hire.".into()),
        )
        .await?;
    for title in ["Welcome", "Emergency exits", "Reporting incidents"] {
        courses.add_lesson(&instructor, course.id, title, None).await?;
    }
    courses
        .add_lesson(&instructor, course.id, "Safety check", Some(quiz.id))
        .await?;
    courses.publish(&instructor, course.id).await?;
    app.progress().enroll(student.id, course.id).await?;

    let start = now + Duration::days(1);
    app.calendar()
        .create_event(
            &instructor,
            EventDraft {
                title: "Safety office hours".into(),
                description: Some("Drop in with questions about the course.".into()),
                location: Some("Room 3B".into()),
                start,
                end: start + Duration::hours(1),
                all_day: false,
                audience: Audience::All,
                recurrence: Recurrence::Weekly,
                recurrence_end_date: None,
            },
        )
        .await?;
    app.announcements()
        .create(
            &admin,
            "Welcome to NexusAlpri",
            "Start with Workplace Safety 101 in the course catalog.",
            Audience::All,
        )
        .await?;

    println!(
        "Seeded course {} with 4 lessons, 3 accounts (@{}), one event and one announcement into {}",
        course.id, args.domain, args.db_url
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
