mod tui;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use tracing::{info, warn};

use sidequest::config::Config;
use sidequest::models::{
    Application, Job, Location, MatchResult, NewApplication, Profile, SaveOutcome, today,
};
use sidequest::{ConstraintViolation, Database, logging, schedule};
use tui::truncate;

#[derive(Parser)]
#[command(name = "sidequest")]
#[command(about = "Job search tracking - postings, applications, and your availability")]
struct Cli {
    /// Database file (overrides config and SIDEQUEST_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Manage accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Show or edit your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Manage search locations
    Location {
        #[command(subcommand)]
        command: LocationCommands,
    },

    /// Manage job postings
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },

    /// Track applications
    App {
        #[command(subcommand)]
        command: AppCommands,
    },

    /// Key/value settings
    Setting {
        #[command(subcommand)]
        command: SettingCommands,
    },

    /// Interactive application tracker
    Tracker {
        /// Only show applications with this status
        #[arg(short, long)]
        status: Option<String>,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create an account (password is read from stdin when not given)
    Add {
        username: String,
        #[arg(short, long)]
        email: Option<String>,
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Check a password and record the login
    Login {
        username: String,
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Show an account
    Show { username: String },

    /// List accounts
    List,
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show the profile
    Show,

    /// Update profile fields; list fields take comma-separated values
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        major: Option<String>,
        #[arg(long)]
        skills: Option<String>,
        #[arg(long)]
        interests: Option<String>,
        #[arg(long)]
        min_rate: Option<f64>,
        #[arg(long)]
        max_hours: Option<i64>,
        #[arg(long)]
        job_types: Option<String>,
        #[arg(long)]
        sources: Option<String>,
        /// Resume text file
        #[arg(long)]
        resume: Option<PathBuf>,
    },

    /// Replace the weekly schedule, one block per line ("Mon 9:00-10:30 CS101")
    Schedule {
        /// Schedule file; stdin when omitted
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum LocationCommands {
    /// Add a location
    Add {
        name: String,
        address: String,
        #[arg(long)]
        lat: Option<f64>,
        #[arg(long)]
        lon: Option<f64>,
        #[arg(short, long)]
        radius: Option<i64>,
        /// Make this the default location
        #[arg(short, long)]
        default: bool,
    },

    /// List locations
    List,

    /// Make a location the default
    #[command(name = "default")]
    MakeDefault { id: i64 },

    /// Remove a location
    Remove { id: i64 },
}

#[derive(Subcommand)]
enum JobCommands {
    /// Add a posting by hand
    Add {
        #[arg(long, default_value = "manual")]
        source: String,
        /// Listing id on the source board
        #[arg(long)]
        source_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        company: String,
        #[arg(long)]
        location: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        salary: Option<String>,
        #[arg(long)]
        job_type: Option<String>,
        #[arg(long)]
        posted: Option<String>,
    },

    /// Import postings from a JSON array; already-stored postings are skipped
    Import {
        file: PathBuf,
        /// Overwrite stored postings instead of skipping them
        #[arg(long)]
        update: bool,
    },

    /// List postings
    List {
        #[arg(short, long)]
        source: Option<String>,
        #[arg(short, long)]
        company: Option<String>,
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show a posting
    Show { id: i64 },

    /// Remove a posting
    Remove { id: i64 },

    /// Record match results for a posting
    Match {
        id: i64,
        #[arg(long)]
        score: Option<f64>,
        #[arg(long = "reason")]
        reasons: Vec<String>,
        #[arg(long = "requirement")]
        requirements: Vec<String>,
        /// Whether the posting fits your schedule
        #[arg(long)]
        compatible: Option<bool>,
    },
}

#[derive(Subcommand)]
enum AppCommands {
    /// Start tracking an application for a posting
    Track {
        job_id: i64,
        #[arg(short, long)]
        status: Option<String>,
        /// Application date (YYYY-MM-DD or "today")
        #[arg(short, long)]
        applied: Option<String>,
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// List applications
    List {
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show an application
    Show { id: i64 },

    /// Change an application's status
    Status { id: i64, status: String },

    /// Update notes and the next step
    Note {
        id: i64,
        /// Replaces the current notes
        #[arg(short, long)]
        notes: Option<String>,
        #[arg(long)]
        next_step: Option<String>,
        #[arg(long)]
        next_date: Option<String>,
        /// Cover letter file
        #[arg(long)]
        cover_letter: Option<PathBuf>,
    },

    /// Stop tracking an application
    Remove { id: i64 },

    /// Applications per status
    Stats,
}

#[derive(Subcommand)]
enum SettingCommands {
    Get { key: String },
    Set { key: String, value: String },
    List,
    Unset { key: String },
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn resolve_date(value: String) -> String {
    if value.eq_ignore_ascii_case("today") { today() } else { value }
}

fn read_password(given: Option<String>) -> Result<String> {
    if let Some(password) = given {
        return Ok(password);
    }
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    Ok(password)
}

fn read_input(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => std::io::read_to_string(std::io::stdin()).context("Failed to read stdin"),
    }
}

fn print_job(job: &Job) {
    println!("Job #{}", job.id.unwrap_or_default());
    println!("Title: {}", job.title);
    println!("Company: {}", job.company);
    println!("Location: {}", job.location);
    println!("Source: {} ({})", job.source, job.source_id);
    println!("URL: {}", job.url);
    if let Some(salary) = &job.salary_text {
        println!("Pay: {}", salary);
    }
    if let Some(job_type) = &job.job_type {
        println!("Type: {}", job_type);
    }
    if let Some(posted) = &job.posted_date {
        println!("Posted: {}", posted);
    }
    println!("Scraped: {}", job.scraped_at);
    if let Some(score) = job.match_score {
        println!("Match score: {:.0}", score);
        for reason in &job.match_reasons {
            println!("  + {}", reason);
        }
    }
    if !job.extracted_requirements.is_empty() {
        println!("Requirements: {}", job.extracted_requirements.join(", "));
    }
    match job.schedule_compatible {
        Some(true) => println!("Schedule: compatible"),
        Some(false) => println!("Schedule: conflicts"),
        None => {}
    }
    if !job.description.is_empty() {
        println!("\n--- Description ---\n{}", textwrap::fill(&job.description, 80));
    }
}

fn print_application(app: &Application) {
    println!("Application #{}", app.id.unwrap_or_default());
    match &app.job {
        Some(job) => println!("Job: #{} {} at {}", app.job_id, job.title, job.company),
        None => println!("Job: #{}", app.job_id),
    }
    println!("Status: {}", app.status);
    if let Some(date) = &app.applied_date {
        println!("Applied: {}", date);
    }
    if let Some(step) = &app.next_step {
        println!(
            "Next step: {} ({})",
            step,
            app.next_step_date.as_deref().unwrap_or("unscheduled")
        );
    }
    println!("Created: {}", app.created_at);
    println!("Updated: {}", app.updated_at);
    if !app.notes.is_empty() {
        println!("\n--- Notes ---\n{}", textwrap::fill(&app.notes, 80));
    }
    if let Some(letter) = &app.cover_letter {
        println!("\n--- Cover Letter ---\n{}", letter);
    }
}

fn print_profile(profile: &Profile) {
    fn or_dash(s: &str) -> &str {
        if s.is_empty() { "-" } else { s }
    }
    println!("Name: {}", or_dash(&profile.name));
    println!("Major: {}", or_dash(&profile.major));
    println!("Skills: {}", or_dash(&profile.skills.join(", ")));
    println!("Interests: {}", or_dash(&profile.interests.join(", ")));
    if let Some(rate) = profile.min_hourly_rate {
        println!("Minimum rate: ${:.2}/hr", rate);
    }
    if let Some(hours) = profile.max_hours_per_week {
        println!("Max hours/week: {}", hours);
    }
    println!("Job types: {}", or_dash(&profile.preferred_job_types.join(", ")));
    println!("Sources: {}", or_dash(&profile.preferred_job_sources.join(", ")));
    println!("\nAvailability:\n{}", schedule::availability_summary(&profile.schedule_blocks));
    if let Some(resume) = &profile.resume_text {
        println!("\nResume: {} characters", resume.chars().count());
    }
}

fn import_jobs(db: &mut Database, file: &PathBuf, update: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read job file: {}", file.display()))?;
    let jobs: Vec<Job> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid job file: {}", file.display()))?;

    let (mut added, mut updated, mut skipped, mut failed) = (0, 0, 0, 0);
    for mut job in jobs {
        job.id = None;
        let result = if update {
            db.save_job(&mut job)
        } else {
            db.insert_job(&job).map(|_| SaveOutcome::Inserted)
        };
        match result {
            Ok(SaveOutcome::Inserted) => added += 1,
            Ok(SaveOutcome::Updated) => updated += 1,
            Err(e) if e.is_duplicate() => {
                println!("  skipped {} (already stored)", job.unique_key());
                skipped += 1;
            }
            Err(e) => {
                warn!(key = %job.unique_key(), error = %e, "job import failed");
                println!("  failed {}: {}", job.unique_key(), e);
                failed += 1;
            }
        }
    }

    println!("\nResults:");
    println!("  Jobs added:   {}", added);
    if update {
        println!("  Jobs updated: {}", updated);
    } else {
        println!("  Skipped:      {}", skipped);
    }
    if failed > 0 {
        println!("  Errors:       {}", failed);
    }
    info!(added, updated, skipped, failed, "job import finished");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = Config::load()?;
    if let Some(path) = cli.db {
        config.db_path = path;
    }
    let mut db = Database::open(&config.db_path)
        .with_context(|| format!("Failed to open database: {}", config.db_path.display()))?
        .with_password_cost(config.password_cost);

    if !matches!(cli.command, Commands::Init) {
        db.ensure_initialized()?;
    }

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::User { command } => match command {
            UserCommands::Add {
                username,
                email,
                password,
            } => {
                let password = read_password(password)?;
                let user = db.create_user(&username, &password, email.as_deref())?;
                println!("Created user '{}' (ID: {})", user.username, user.id);
            }

            UserCommands::Login { username, password } => {
                let password = read_password(password)?;
                match db.authenticate_user(&username, &password)? {
                    Some(user) => println!("Logged in as {}", user.username),
                    None => bail!("Invalid username or password"),
                }
            }

            UserCommands::Show { username } => match db.get_user_by_username(&username)? {
                Some(user) => {
                    println!("User #{}", user.id);
                    println!("Username: {}", user.username);
                    if let Some(email) = &user.email {
                        println!("Email: {}", email);
                    }
                    println!("Created: {}", user.created_at);
                    println!("Last login: {}", user.last_login.as_deref().unwrap_or("never"));
                }
                None => println!("User '{}' not found.", username),
            },

            UserCommands::List => {
                let users = db.list_users()?;
                if users.is_empty() {
                    println!("No users found.");
                } else {
                    println!("{:<6} {:<20} {:<30} {:<20}", "ID", "USERNAME", "EMAIL", "LAST LOGIN");
                    println!("{}", "-".repeat(78));
                    for user in users {
                        println!(
                            "{:<6} {:<20} {:<30} {:<20}",
                            user.id,
                            truncate(&user.username, 18),
                            truncate(user.email.as_deref().unwrap_or("-"), 28),
                            user.last_login.as_deref().unwrap_or("never")
                        );
                    }
                }
            }
        },

        Commands::Profile { command } => match command {
            ProfileCommands::Show => match db.get_profile()? {
                Some(profile) => print_profile(&profile),
                None => println!("No profile yet. Use 'sidequest profile set'."),
            },

            ProfileCommands::Set {
                name,
                major,
                skills,
                interests,
                min_rate,
                max_hours,
                job_types,
                sources,
                resume,
            } => {
                let mut profile = db.get_profile()?.unwrap_or_default();
                if let Some(name) = name {
                    profile.name = name;
                }
                if let Some(major) = major {
                    profile.major = major;
                }
                if let Some(skills) = skills {
                    profile.skills = split_list(&skills);
                }
                if let Some(interests) = interests {
                    profile.interests = split_list(&interests);
                }
                if min_rate.is_some() {
                    profile.min_hourly_rate = min_rate;
                }
                if max_hours.is_some() {
                    profile.max_hours_per_week = max_hours;
                }
                if let Some(job_types) = job_types {
                    profile.preferred_job_types = split_list(&job_types);
                }
                if let Some(sources) = sources {
                    profile.preferred_job_sources = split_list(&sources);
                }
                if let Some(path) = resume {
                    profile.resume_text = Some(read_input(Some(&path))?);
                }
                db.save_profile(&mut profile)?;
                println!("Profile saved.");
            }

            ProfileCommands::Schedule { file } => {
                let text = read_input(file.as_ref())?;
                let blocks = schedule::parse_schedule(&text);
                let mut profile = db.get_profile()?.unwrap_or_default();
                profile.schedule_blocks = blocks;
                db.save_profile(&mut profile)?;
                println!(
                    "Saved {} schedule block(s).\n\n{}",
                    profile.schedule_blocks.len(),
                    schedule::availability_summary(&profile.schedule_blocks)
                );
            }
        },

        Commands::Location { command } => match command {
            LocationCommands::Add {
                name,
                address,
                lat,
                lon,
                radius,
                default,
            } => {
                let mut location = Location::new(&name, &address);
                location.latitude = lat;
                location.longitude = lon;
                if let Some(radius) = radius {
                    location.radius_miles = radius;
                }
                location.is_default = default;
                db.save_location(&mut location)?;
                println!("Added location '{}' (ID: {})", name, location.id.unwrap_or_default());
            }

            LocationCommands::List => {
                let locations = db.list_locations()?;
                if locations.is_empty() {
                    println!("No locations found.");
                } else {
                    println!("{:<6} {:<3} {:<20} {:<36} {:>7}", "ID", "", "NAME", "ADDRESS", "RADIUS");
                    println!("{}", "-".repeat(76));
                    for loc in locations {
                        println!(
                            "{:<6} {:<3} {:<20} {:<36} {:>4} mi",
                            loc.id.unwrap_or_default(),
                            if loc.is_default { "*" } else { "" },
                            truncate(&loc.name, 18),
                            truncate(&loc.address, 34),
                            loc.radius_miles
                        );
                    }
                }
            }

            LocationCommands::MakeDefault { id } => {
                let mut location = db
                    .get_location(id)?
                    .ok_or_else(|| anyhow!("Location #{} not found", id))?;
                location.is_default = true;
                db.save_location(&mut location)?;
                println!("'{}' is now the default location.", location.name);
            }

            LocationCommands::Remove { id } => {
                if db.delete_location(id)? {
                    println!("Removed location #{}.", id);
                } else {
                    println!("Location #{} not found.", id);
                }
            }
        },

        Commands::Job { command } => match command {
            JobCommands::Add {
                source,
                source_id,
                title,
                company,
                location,
                url,
                description,
                salary,
                job_type,
                posted,
            } => {
                let mut job = Job {
                    source,
                    source_id,
                    title,
                    company,
                    location,
                    url,
                    description: description.unwrap_or_default(),
                    salary_text: salary,
                    job_type,
                    posted_date: posted.map(resolve_date),
                    ..Job::default()
                };
                match db.save_job(&mut job)? {
                    SaveOutcome::Inserted => println!("Added job #{}", job.id.unwrap_or_default()),
                    SaveOutcome::Updated => {
                        println!("Updated job #{} ({})", job.id.unwrap_or_default(), job.unique_key())
                    }
                }
            }

            JobCommands::Import { file, update } => import_jobs(&mut db, &file, update)?,

            JobCommands::List {
                source,
                company,
                limit,
            } => {
                let mut filter = config.job_filter();
                filter.source = source;
                filter.company = company;
                if let Some(limit) = limit {
                    filter.limit = limit;
                }
                let jobs = db.list_jobs(&filter)?;
                if jobs.is_empty() {
                    println!("No jobs found.");
                } else {
                    println!(
                        "{:<6} {:<10} {:<30} {:<20} {:<16} {:>6}",
                        "ID", "SOURCE", "TITLE", "COMPANY", "LOCATION", "MATCH"
                    );
                    println!("{}", "-".repeat(93));
                    for job in jobs {
                        let score = job
                            .match_score
                            .map(|s| format!("{:.0}", s))
                            .unwrap_or_else(|| "-".to_string());
                        println!(
                            "{:<6} {:<10} {:<30} {:<20} {:<16} {:>6}",
                            job.id.unwrap_or_default(),
                            truncate(&job.source, 10),
                            truncate(&job.title, 28),
                            truncate(&job.company, 18),
                            truncate(&job.location, 16),
                            score
                        );
                    }
                }
            }

            JobCommands::Show { id } => match db.get_job(id)? {
                Some(job) => {
                    print_job(&job);
                    let apps = db.applications_for_job(id)?;
                    if !apps.is_empty() {
                        println!("\nApplications ({}):", apps.len());
                        for app in apps {
                            println!("  #{} - {} ({})", app.id.unwrap_or_default(), app.status, app.updated_at);
                        }
                    }
                }
                None => println!("Job #{} not found.", id),
            },

            JobCommands::Remove { id } => {
                match db.delete_job(id) {
                    Ok(true) => println!("Removed job #{}.", id),
                    Ok(false) => println!("Job #{} not found.", id),
                    Err(e) if e.constraint() == Some(&ConstraintViolation::UnknownJob) => {
                        bail!("Job #{} still has tracked applications; remove them first", id)
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            JobCommands::Match {
                id,
                score,
                reasons,
                requirements,
                compatible,
            } => {
                let result = MatchResult {
                    score,
                    reasons,
                    requirements,
                    schedule_compatible: compatible,
                };
                db.record_match(id, &result)?;
                println!("Recorded match for job #{}.", id);
            }
        },

        Commands::App { command } => match command {
            AppCommands::Track {
                job_id,
                status,
                applied,
                notes,
            } => {
                let new = NewApplication {
                    job_id,
                    status,
                    applied_date: applied.map(resolve_date),
                    notes,
                };
                let id = db
                    .insert_application(&new)
                    .with_context(|| format!("Could not track job #{}", job_id))?;
                println!("Tracking application #{} for job #{}", id, job_id);
            }

            AppCommands::List { status } => {
                let apps = db.list_applications(status.as_deref())?;
                if apps.is_empty() {
                    println!("No applications found.");
                } else {
                    println!(
                        "{:<6} {:<13} {:<30} {:<20} {:<11}",
                        "ID", "STATUS", "TITLE", "COMPANY", "APPLIED"
                    );
                    println!("{}", "-".repeat(84));
                    for app in apps {
                        let (title, company) = app
                            .job
                            .as_ref()
                            .map(|j| (j.title.as_str(), j.company.as_str()))
                            .unwrap_or(("?", "?"));
                        println!(
                            "{:<6} {:<13} {:<30} {:<20} {:<11}",
                            app.id.unwrap_or_default(),
                            truncate(&app.status, 13),
                            truncate(title, 28),
                            truncate(company, 18),
                            app.applied_date.as_deref().unwrap_or("-")
                        );
                    }
                }
            }

            AppCommands::Show { id } => match db.get_application(id)? {
                Some(app) => print_application(&app),
                None => println!("Application #{} not found.", id),
            },

            AppCommands::Status { id, status } => {
                if !config.tracker.statuses.contains(&status) {
                    warn!(status, "status is not one of the configured tracker statuses");
                }
                db.update_application_status(id, &status)?;
                println!("Application #{} is now '{}'.", id, status);
            }

            AppCommands::Note {
                id,
                notes,
                next_step,
                next_date,
                cover_letter,
            } => {
                let mut app = db
                    .get_application(id)?
                    .ok_or_else(|| anyhow!("Application #{} not found", id))?;
                if let Some(notes) = notes {
                    app.notes = notes;
                }
                if next_step.is_some() {
                    app.next_step = next_step;
                }
                if let Some(date) = next_date {
                    app.next_step_date = Some(resolve_date(date));
                }
                if let Some(path) = cover_letter {
                    app.cover_letter = Some(read_input(Some(&path))?);
                }
                db.save_application(&mut app)?;
                println!("Updated application #{}.", id);
            }

            AppCommands::Remove { id } => {
                if db.delete_application(id)? {
                    println!("Removed application #{}.", id);
                } else {
                    println!("Application #{} not found.", id);
                }
            }

            AppCommands::Stats => {
                let stats = db.application_stats()?;
                if stats.is_empty() {
                    println!("No applications tracked.");
                } else {
                    let total: i64 = stats.values().sum();
                    // Configured statuses first, in pipeline order, then anything else.
                    for status in &config.tracker.statuses {
                        if let Some(count) = stats.get(status) {
                            println!("{:<15} {:>5}", status, count);
                        }
                    }
                    for (status, count) in &stats {
                        if !config.tracker.statuses.contains(status) {
                            let label = if status.is_empty() { "(none)" } else { status.as_str() };
                            println!("{:<15} {:>5}", label, count);
                        }
                    }
                    println!("{}", "-".repeat(21));
                    println!("{:<15} {:>5}", "Total", total);
                }
            }
        },

        Commands::Setting { command } => match command {
            SettingCommands::Get { key } => match db.get_setting(&key)? {
                Some(value) => println!("{}", value),
                None => println!("Setting '{}' is not set.", key),
            },

            SettingCommands::Set { key, value } => {
                db.set_setting(&key, &value)?;
                println!("{} = {}", key, value);
            }

            SettingCommands::List => {
                let settings = db.list_settings()?;
                if settings.is_empty() {
                    println!("No settings found.");
                } else {
                    for setting in settings {
                        println!("{:<30} {:<40} {}", setting.key, truncate(&setting.value, 38), setting.updated_at);
                    }
                }
            }

            SettingCommands::Unset { key } => {
                if db.delete_setting(&key)? {
                    println!("Removed setting '{}'.", key);
                } else {
                    println!("Setting '{}' is not set.", key);
                }
            }
        },

        Commands::Tracker { status } => {
            tui::run_tracker(&db, status.as_deref(), config.tracker.statuses.clone())?;
        }
    }

    Ok(())
}
