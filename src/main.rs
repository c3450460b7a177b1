//! Roster CLI - administer companies and their student stores

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use roster::admin::{Admin, RepairOptions};
use roster::auth::{hash_password, Account};
use roster::config::{self, RosterConfig};
use roster::ui::{self, Icons};
use roster::{CompanyForm, StudentForm};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "roster")]
#[command(version)]
#[command(about = "Company and student roster administration")]
#[command(long_about = r#"
Roster keeps a list of companies in a primary SQLite database and one
student store per company (<storage_root>/<storage_key>.db).

Example usage:
  roster init --admin alice --password hunter2
  roster company create "Acme Corp"
  roster student add 1 "Ana Lima" 21
  roster audit --repair
  roster serve
"#)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Only print errors, warnings and requested data
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file and create the databases
    Init {
        /// Superuser account to add
        #[arg(long, requires = "password")]
        admin: Option<String>,

        /// Password for the superuser account
        #[arg(long)]
        password: Option<String>,

        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Run the HTTP admin server
    Serve {
        /// Listen address (overrides the config file)
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Print the digest to store as an account's password_hash
    HashPassword {
        password: String,
    },

    /// Manage companies
    #[command(subcommand)]
    Company(CompanyCommand),

    /// Manage the students of a company
    #[command(subcommand)]
    Student(StudentCommand),

    /// Compare company records with the store files on disk
    Audit {
        /// Fix what can be fixed
        #[arg(long)]
        repair: bool,

        /// With --repair, delete store files that match no company
        #[arg(long, requires = "repair")]
        prune_orphans: bool,
    },

    /// Move students from the primary database into per-company stores
    MigrateLegacy,

    /// Show record and store statistics
    Stats,
}

#[derive(Subcommand)]
enum CompanyCommand {
    /// List companies
    List,
    /// Create a company and its student store
    Create { name: String },
    /// Rename a company, moving its student store
    Rename { id: i64, name: String },
    /// Delete a company and its student store
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum StudentCommand {
    /// List a company's students
    List { company: i64 },
    /// Add a student
    Add { company: i64, name: String, age: String },
    /// Show one student
    Get { company: i64, id: i64 },
    /// Replace a student's name and age
    Update { company: i64, id: i64, name: String, age: String },
    /// Delete a student
    Delete { company: i64, id: i64 },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    ui::set_quiet(cli.quiet);

    if let Err(err) = run(cli) {
        ui::error(&format!("{:#}", err));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let json = cli.json;
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);

    match cli.command {
        Commands::Init { admin, password, force } => {
            let mut config = RosterConfig::default();
            if let (Some(username), Some(password)) = (admin, password) {
                config.accounts.push(Account {
                    username,
                    password_hash: hash_password(&password)?,
                    is_superuser: true,
                });
            }
            config::write_config(&config_path, &config, force)?;

            let config = config::load_or_default(Some(&config_path))?;
            open_admin(&config)?;

            ui::success(&format!("Initialized {}", config_path.display()));
            ui::item(Icons::DATABASE, &config.database.display().to_string());
            ui::info("Storage root", &config.storage_root.display().to_string());
            if config.accounts.is_empty() {
                ui::warn("No superuser configured; add one with --admin/--password or edit the config");
            }
        }

        Commands::Serve { listen } => {
            let mut config = config::load_or_default(Some(&config_path))?;
            if let Some(listen) = listen {
                config.listen = listen;
            }
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(roster::server::start_server(config))?;
        }

        Commands::HashPassword { password } => {
            println!("{}", hash_password(&password)?);
        }

        Commands::Company(command) => {
            let config = config::load_or_default(Some(&config_path))?;
            let admin = open_admin(&config)?;
            run_company(&admin, command, json)?;
        }

        Commands::Student(command) => {
            let config = config::load_or_default(Some(&config_path))?;
            let admin = open_admin(&config)?;
            run_student(&admin, command, json)?;
        }

        Commands::Audit { repair, prune_orphans } => {
            let config = config::load_or_default(Some(&config_path))?;
            let admin = open_admin(&config)?;
            let auditor = admin.auditor();

            let report = auditor.audit()?;
            if json && !repair {
                return emit_json(&report);
            }
            if !json {
                if report.is_clean() {
                    ui::success("Records and store files agree");
                } else {
                    ui::section("Findings");
                    println!("{}", ui::audit_table(&report));
                }
            }

            if repair {
                let summary = auditor.repair(RepairOptions { prune_orphans })?;
                if json {
                    return emit_json(&summary);
                }
                ui::item(Icons::WRENCH, "Repair");
                ui::summary_row("Stores created:", &summary.created.to_string());
                ui::summary_row("Stores renamed:", &summary.renamed.to_string());
                ui::summary_row("Staged files removed:", &summary.removed_staged.to_string());
                ui::summary_row("Orphans pruned:", &summary.pruned.to_string());
                for finding in &summary.unresolved {
                    ui::warn(finding);
                }
            } else if !report.is_clean() {
                anyhow::bail!("storage audit found problems (run with --repair to fix)");
            }
        }

        Commands::MigrateLegacy => {
            let config = config::load_or_default(Some(&config_path))?;
            let admin = open_admin(&config)?;
            let summary = admin.migrate_legacy_students()?;
            if json {
                return emit_json(&summary);
            }
            ui::success(&format!(
                "Migrated {} students from {} companies",
                summary.students, summary.companies
            ));
        }

        Commands::Stats => {
            let config = config::load_or_default(Some(&config_path))?;
            let admin = open_admin(&config)?;
            let stats = admin.stats()?;
            let stores = admin.tenants().scan()?;

            ui::header("Roster statistics");
            let rows = [
                ("Companies", stats.companies.to_string()),
                ("Legacy students", stats.legacy_students.to_string()),
                ("Store files", stores.stores.len().to_string()),
                ("Staged deletions", stores.staged.len().to_string()),
                ("Database", config.database.display().to_string()),
                ("Storage root", config.storage_root.display().to_string()),
            ];
            println!("{}", ui::stats_table(&rows));
        }
    }

    Ok(())
}

fn run_company(admin: &Admin, command: CompanyCommand, json: bool) -> anyhow::Result<()> {
    let companies = admin.companies();
    match command {
        CompanyCommand::List => {
            let list = companies.list()?;
            if json {
                return emit_json(&list);
            }
            if list.is_empty() {
                ui::item(Icons::COMPANY, &ui::dim("No companies yet"));
            } else {
                println!("{}", ui::companies_table(&list));
            }
        }
        CompanyCommand::Create { name } => {
            let company = companies.create(&CompanyForm::new(name))?;
            if json {
                return emit_json(&company);
            }
            ui::item(Icons::COMPANY, &format!("Created {} (id {})", ui::accent(&company.name), company.id));
            ui::info("Store", &admin.tenants().path_for_key(&company.storage_key).display().to_string());
        }
        CompanyCommand::Rename { id, name } => {
            let company = companies.rename(id, &CompanyForm::new(name))?;
            if json {
                return emit_json(&company);
            }
            ui::item(Icons::COMPANY, &format!("Company {} is now {}", company.id, ui::accent(&company.name)));
        }
        CompanyCommand::Delete { id } => {
            let company = companies.delete(id)?;
            if json {
                return emit_json(&company);
            }
            ui::item(Icons::DEL, &format!("Deleted {} and its students", ui::accent(&company.name)));
        }
    }
    Ok(())
}

fn run_student(admin: &Admin, command: StudentCommand, json: bool) -> anyhow::Result<()> {
    let students = admin.students();
    match command {
        StudentCommand::List { company } => {
            let list = students.list(company)?;
            if json {
                return emit_json(&list);
            }
            if list.is_empty() {
                ui::item(Icons::STUDENT, &ui::dim("No students yet"));
            } else {
                println!("{}", ui::students_table(&list));
            }
        }
        StudentCommand::Add { company, name, age } => {
            let student = students.add(company, &student_form(name, age))?;
            if json {
                return emit_json(&student);
            }
            ui::item(Icons::STUDENT, &format!("Added {} (id {})", ui::accent(&student.to_string()), student.id));
        }
        StudentCommand::Get { company, id } => {
            let student = students.get(company, id)?;
            if json {
                return emit_json(&student);
            }
            println!("{}", ui::students_table(&[student]));
        }
        StudentCommand::Update { company, id, name, age } => {
            let student = students.update(company, id, &student_form(name, age))?;
            if json {
                return emit_json(&student);
            }
            ui::item(Icons::STUDENT, &format!("Updated {}", student));
        }
        StudentCommand::Delete { company, id } => {
            students.delete(company, id)?;
            if json {
                return emit_json(&serde_json::json!({"deleted": id}));
            }
            ui::item(Icons::DEL, &format!("Deleted student {}", id));
        }
    }
    Ok(())
}

fn student_form(name: String, age: String) -> StudentForm {
    StudentForm {
        name: Some(name),
        age: Some(serde_json::Value::String(age)),
    }
}

fn open_admin(config: &RosterConfig) -> anyhow::Result<Admin> {
    config::ensure_db_dir(&config.database)?;
    tracing::debug!("Opening {} with stores under {}", config.database.display(), config.storage_root.display());
    Ok(Admin::open(&config.database, &config.storage_root)?)
}

fn emit_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
