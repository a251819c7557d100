use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::application::{AppError, LedgerService};
use crate::domain::{Settlement, format_cents, parse_cents, parse_id, parse_user_ids};
use crate::io::{ExportFormat, Exporter};

/// Splitledger - shared expense ledger
#[derive(Parser)]
#[command(name = "splitledger")]
#[command(about = "Track shared expenses and who owes whom")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "SPLITLEDGER_DB", default_value = "splitledger.db")]
    pub database: String,

    /// Enable verbose (debug) logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// User management commands
    #[command(subcommand)]
    User(UserCommands),

    /// Trip management commands
    #[command(subcommand)]
    Trip(TripCommands),

    /// Expense commands
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// Record a payment that reduces what one user owes another
    Pay {
        /// Amount paid (e.g., "10.00" or "10")
        amount: String,

        /// Id of the user paying
        #[arg(long)]
        from: String,

        /// Id of the user being paid
        #[arg(long)]
        to: String,
    },

    /// Show outstanding balances
    Balances {
        /// Output format: table, csv, json
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show what each user owes and is owed
    Summary,

    /// Export data to CSV or JSON
    Export {
        /// What to export: users, balances, expenses
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Format: csv, json
        #[arg(short, long, default_value = "csv")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a new user
    Add {
        /// Display name
        name: String,

        /// Contact (e.g., email address)
        #[arg(short, long, default_value = "")]
        contact: String,
    },

    /// List all users
    List,
}

#[derive(Subcommand)]
pub enum TripCommands {
    /// Create a new trip
    Create {
        /// Trip name
        name: String,
    },

    /// List all trips
    List,
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record an expense split equally among participants
    Add {
        /// Total amount (e.g., "30.00" or "30")
        amount: String,

        /// Id of the user who paid
        #[arg(long)]
        payer: String,

        /// Trip id the expense belongs to
        #[arg(long)]
        trip: String,

        /// Comma separated participant ids (e.g., "1,2,3")
        #[arg(short, long)]
        participants: String,

        /// Description of the expense
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// List expenses
    List {
        /// Only expenses of this trip
        #[arg(long)]
        trip: Option<String>,
    },

    /// Show an expense and its shares
    Show {
        /// Expense id
        id: String,
    },
}

impl Cli {
    /// Install the stderr log subscriber. `RUST_LOG` takes precedence over `--verbose`.
    pub fn init_logging(&self) {
        let default_level = if self.verbose { "debug" } else { "warn" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("splitledger={}", default_level)));

        // A subscriber may already be installed when several commands run in
        // one process (tests); keep the first one.
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init()
            .ok();
    }

    pub async fn run(self) -> Result<()> {
        if let Commands::Init = self.command {
            LedgerService::init(&self.database).await?;
            println!("Database initialized: {}", self.database);
            return Ok(());
        }

        let service = LedgerService::connect(&self.database).await?;

        match self.command {
            Commands::Init => unreachable!("handled above"),

            Commands::User(cmd) => run_user_command(&service, cmd).await?,

            Commands::Trip(cmd) => run_trip_command(&service, cmd).await?,

            Commands::Expense(cmd) => run_expense_command(&service, cmd).await?,

            Commands::Pay { amount, from, to } => {
                let amount_cents = parse_amount(&amount)?;
                let from = parse_id(&from).context("Invalid --from user id")?;
                let to = parse_id(&to).context("Invalid --to user id")?;

                match service.record_payment(from, to, amount_cents).await {
                    Ok(Settlement::Cleared { previous, overpaid }) => {
                        println!(
                            "Payment recorded: balance of {} settled",
                            format_cents(previous)
                        );
                        if overpaid > 0 {
                            println!("  Overpaid by {} (not carried over)", format_cents(overpaid));
                        }
                    }
                    Ok(Settlement::Reduced { remaining, .. }) => {
                        println!(
                            "Payment recorded: {} still owed",
                            format_cents(remaining)
                        );
                    }
                    Err(AppError::NoSuchBalance { from, to }) => {
                        println!("No such balance exists: user {} owes user {} nothing", from, to);
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            Commands::Balances { format } => run_balances_command(&service, &format).await?,

            Commands::Summary => {
                let positions = service.user_summary().await?;
                if positions.is_empty() {
                    println!("No users found.");
                } else {
                    println!("{:<20} {:>12} {:>12} {:>12}", "NAME", "OWED", "OWES", "NET");
                    println!("{}", "-".repeat(59));
                    for position in positions {
                        println!(
                            "{:<20} {:>12} {:>12} {:>12}",
                            position.user.name,
                            format_cents(position.owed_to),
                            format_cents(position.owes),
                            format_cents(position.net())
                        );
                    }
                }
            }

            Commands::Export {
                export_type,
                output,
                format,
            } => {
                run_export_command(&service, &export_type, output.as_deref(), &format).await?
            }
        }

        Ok(())
    }
}

async fn run_user_command(service: &LedgerService, cmd: UserCommands) -> Result<()> {
    match cmd {
        UserCommands::Add { name, contact } => {
            let user = service.register_user(&name, &contact).await?;
            println!("Registered user: {} (id {})", user.name, user.id);
        }

        UserCommands::List => {
            let users = service.list_users().await?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<6} {:<20} {:<30}", "ID", "NAME", "CONTACT");
                println!("{}", "-".repeat(58));
                for user in users {
                    println!("{:<6} {:<20} {:<30}", user.id, user.name, user.contact);
                }
            }
        }
    }
    Ok(())
}

async fn run_trip_command(service: &LedgerService, cmd: TripCommands) -> Result<()> {
    match cmd {
        TripCommands::Create { name } => {
            let trip = service.create_trip(&name).await?;
            println!("Created trip: {} (id {})", trip.name, trip.id);
        }

        TripCommands::List => {
            let trips = service.list_trips().await?;
            if trips.is_empty() {
                println!("No trips found.");
            } else {
                println!("{:<6} {:<30}", "ID", "NAME");
                println!("{}", "-".repeat(37));
                for trip in trips {
                    println!("{:<6} {:<30}", trip.id, trip.name);
                }
            }
        }
    }
    Ok(())
}

async fn run_expense_command(service: &LedgerService, cmd: ExpenseCommands) -> Result<()> {
    match cmd {
        ExpenseCommands::Add {
            amount,
            payer,
            trip,
            participants,
            description,
        } => {
            let total_cents = parse_amount(&amount)?;
            let payer = parse_id(&payer).context("Invalid --payer user id")?;
            let trip_id = parse_id(&trip).context("Invalid --trip id")?;
            let participants =
                parse_user_ids(&participants).context("Invalid participant list. Use '1,2,3'")?;

            let result = service
                .record_expense(&description, total_cents, payer, trip_id, &participants)
                .await?;

            println!(
                "Recorded expense {}: {} split {} ways ({} each)",
                result.expense.id,
                format_cents(result.expense.total_cents),
                result.shares.len(),
                format_cents(result.share_cents)
            );
            if result.residual_cents != 0 {
                println!(
                    "  {} not covered by equal shares",
                    format_cents(result.residual_cents)
                );
            }
        }

        ExpenseCommands::List { trip } => {
            let trip_id = trip
                .map(|t| parse_id(&t))
                .transpose()
                .context("Invalid --trip id")?;
            let expenses = service.list_expenses(trip_id).await?;
            if expenses.is_empty() {
                println!("No expenses found.");
            } else {
                println!(
                    "{:<6} {:<6} {:<8} {:>12}  {}",
                    "ID", "TRIP", "PAID BY", "TOTAL", "DESCRIPTION"
                );
                println!("{}", "-".repeat(60));
                for expense in expenses {
                    println!(
                        "{:<6} {:<6} {:<8} {:>12}  {}",
                        expense.id,
                        expense.trip_id,
                        expense.paid_by,
                        format_cents(expense.total_cents),
                        expense.description
                    );
                }
            }
        }

        ExpenseCommands::Show { id } => {
            let id = parse_id(&id).context("Invalid expense id")?;
            let detail = service.get_expense(id).await?;
            let expense = &detail.expense;

            println!("Expense: {}", expense.id);
            println!("  Description: {}", expense.description);
            println!("  Total:       {}", format_cents(expense.total_cents));
            println!("  Paid by:     user {}", expense.paid_by);
            println!("  Trip:        {}", expense.trip_id);
            println!(
                "  Created:     {}",
                expense.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!();
            println!("  Shares:");
            for share in &detail.shares {
                println!(
                    "    user {:<6} {:>12}",
                    share.user_id,
                    format_cents(share.share_cents)
                );
            }
        }
    }
    Ok(())
}

async fn run_balances_command(service: &LedgerService, format: &str) -> Result<()> {
    if format != "table" {
        let format = parse_export_format(format)?;
        Exporter::new(service)
            .export_balances(std::io::stdout(), format)
            .await?;
        return Ok(());
    }

    let balances = service.list_balances().await?;
    if balances.is_empty() {
        println!("No outstanding balances.");
    } else {
        for balance in balances {
            println!(
                "{} owes {}: {}",
                balance.debtor_name,
                balance.creditor_name,
                format_cents(balance.amount_cents)
            );
        }
    }
    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    output: Option<&str>,
    format: &str,
) -> Result<()> {
    use std::fs::File;
    use std::io::{Write, stdout};

    let format = parse_export_format(format)?;
    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    let count = match export_type {
        "users" => exporter.export_users(writer, format).await?,
        "balances" => exporter.export_balances(writer, format).await?,
        "expenses" => exporter.export_expenses(writer, format).await?,
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: users, balances, expenses",
                export_type
            );
        }
    };

    if output.is_some() {
        eprintln!("Exported {} {} as {}", count, export_type, format.as_str());
    }
    Ok(())
}

fn parse_amount(input: &str) -> Result<i64> {
    parse_cents(input).with_context(|| format!("Invalid amount '{}'. Use '30.00' or '30'", input))
}

fn parse_export_format(input: &str) -> Result<ExportFormat> {
    ExportFormat::from_str(input)
        .ok_or_else(|| anyhow::anyhow!("Invalid format '{}'. Valid formats: csv, json", input))
}
