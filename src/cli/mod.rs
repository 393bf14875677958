use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use crate::application::MonthlyLedger;
use crate::domain::{MonthlyRecord, Period, RecordKey};
use crate::storage::Repository;

/// Fuelbook - Monthly diesel and range ledger
#[derive(Parser)]
#[command(name = "fuelbook")]
#[command(about = "Track monthly diesel and remaining driving range per label")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "fuelbook.db", env = "FUELBOOK_DATABASE")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Selects one label, and optionally one month of it
#[derive(Args, Debug, Clone)]
pub struct Target {
    /// User ID owning the label
    #[arg(long, env = "FUELBOOK_USER")]
    pub user: Uuid,

    /// Label ID (vehicle or driver)
    #[arg(long)]
    pub label: Uuid,

    /// Month in YYYY-MM format (defaults to the current month)
    #[arg(long)]
    pub period: Option<Period>,
}

impl Target {
    fn key(&self) -> RecordKey {
        RecordKey::new(
            self.user,
            self.label,
            self.period.unwrap_or_else(Period::current),
        )
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Open the month, carrying over last month's remaining range
    Ensure {
        #[command(flatten)]
        target: Target,
    },

    /// Set the diesel average (range per liter) for the month
    SetAverage {
        /// Range units per liter
        average: f64,

        #[command(flatten)]
        target: Target,
    },

    /// Log diesel added this month (locks the average)
    AddFuel {
        /// Liters of diesel
        liters: f64,

        #[command(flatten)]
        target: Target,
    },

    /// Log kilometers driven this month
    AddDistance {
        /// Kilometers driven
        kilometers: f64,

        #[command(flatten)]
        target: Target,
    },

    /// Show the month's record without creating it
    Show {
        #[command(flatten)]
        target: Target,
    },

    /// List every recorded month of a label
    History {
        #[command(flatten)]
        target: Target,
    },

    /// Export a label's history to CSV or JSON
    Export {
        #[command(flatten)]
        target: Target,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Format: csv, json
        #[arg(short, long, default_value = "csv")]
        format: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        if let Commands::Init = self.command {
            MonthlyLedger::init(&self.database).await?;
            println!("Database initialized: {}", self.database);
            return Ok(());
        }

        let ledger = MonthlyLedger::connect(&self.database).await?;

        match self.command {
            Commands::Init => {}

            Commands::Ensure { target } => {
                let record = ledger.ensure_month(&target.key()).await?;
                print_record(&record);
            }

            Commands::SetAverage { average, target } => {
                let record = ledger.set_average(&target.key(), average).await?;
                println!("Average set to {:.2} per liter", record.diesel_average);
                print_record(&record);
            }

            Commands::AddFuel { liters, target } => {
                let record = ledger.add_fuel(&target.key(), liters).await?;
                println!(
                    "Added {:.2} L (+{:.2} range)",
                    liters,
                    liters * record.diesel_average
                );
                print_record(&record);
            }

            Commands::AddDistance { kilometers, target } => {
                let record = ledger.add_distance(&target.key(), kilometers).await?;
                println!("Logged {:.2} km", kilometers);
                print_record(&record);
            }

            Commands::Show { target } => {
                let key = target.key();
                match ledger.get_month(&key).await? {
                    Some(record) => print_record(&record),
                    None => println!("No record for {}.", key.period),
                }
            }

            Commands::History { target } => {
                run_history_command(&ledger, &target).await?;
            }

            Commands::Export {
                target,
                output,
                format,
            } => {
                run_export_command(&ledger, &target, output.as_deref(), &format).await?;
            }
        }

        Ok(())
    }
}

fn period_label(record: &MonthlyRecord) -> String {
    record
        .period()
        .map(|period| period.to_string())
        .unwrap_or_else(|_| format!("{}-{}", record.year, record.month))
}

fn print_record(record: &MonthlyRecord) {
    println!("Month: {}", period_label(record));
    println!("  Label:           {}", record.label_id);
    println!("  Diesel average:  {:.2}", record.diesel_average);
    println!(
        "  Average locked:  {}",
        if record.is_average_locked { "yes" } else { "no" }
    );
    println!("  Carried range:   {:.2}", record.carried_range);
    println!("  Diesel added:    {:.2} L", record.total_diesel_added);
    println!("  Range added:     {:.2}", record.range_added());
    println!("  Driven:          {:.2} km", record.total_km_driven);
    println!("  Remaining range: {:.2}", record.remaining_range);
    println!(
        "  Updated:         {}",
        record.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
}

async fn run_history_command(ledger: &MonthlyLedger<Repository>, target: &Target) -> Result<()> {
    let months = ledger.history(target.user, target.label).await?;
    if months.is_empty() {
        println!("No months recorded for label {}.", target.label);
        return Ok(());
    }

    println!("{}", history_header());
    println!("{}", "-".repeat(68));
    for record in &months {
        println!("{}", history_row(record));
    }
    Ok(())
}

fn history_header() -> String {
    format!(
        "{:<8} {:>8} {:>10} {:>10} {:>10} {:>10} {:>6}",
        "MONTH", "AVERAGE", "CARRIED", "DIESEL", "KM", "REMAINING", "LOCKED"
    )
}

fn history_row(record: &MonthlyRecord) -> String {
    format!(
        "{:<8} {:>8.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>6}",
        period_label(record),
        record.diesel_average,
        record.carried_range,
        record.total_diesel_added,
        record.total_km_driven,
        record.remaining_range,
        if record.is_average_locked { "yes" } else { "no" }
    )
}

async fn run_export_command(
    ledger: &MonthlyLedger<Repository>,
    target: &Target,
    output: Option<&str>,
    format: &str,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(ledger);

    // Determine output writer
    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    let count = match format {
        "csv" => {
            exporter
                .export_history_csv(target.user, target.label, writer)
                .await?
        }
        "json" => {
            exporter
                .export_history_json(target.user, target.label, writer)
                .await?
                .months
                .len()
        }
        other => anyhow::bail!("Unknown export format '{}'. Valid formats: csv, json", other),
    };

    if output.is_some() {
        eprintln!("Exported {} months", count);
    }
    Ok(())
}
