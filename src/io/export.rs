use anyhow::Result;
use serde::Serialize;
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::format_cents;

/// Output format for exports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }
}

/// Exporter for converting ledger data to CSV or JSON
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export users. Returns the number of records written.
    pub async fn export_users<W: Write>(&self, writer: W, format: ExportFormat) -> Result<usize> {
        let users = self.service.list_users().await?;
        match format {
            ExportFormat::Json => write_json(writer, &users),
            ExportFormat::Csv => {
                let mut csv_writer = csv::Writer::from_writer(writer);
                csv_writer.write_record(["id", "name", "contact", "created_at"])?;
                for user in &users {
                    csv_writer.write_record([
                        user.id.to_string(),
                        user.name.clone(),
                        user.contact.clone(),
                        user.created_at.to_rfc3339(),
                    ])?;
                }
                csv_writer.flush()?;
                Ok(users.len())
            }
        }
    }

    /// Export outstanding balances with user names.
    pub async fn export_balances<W: Write>(
        &self,
        writer: W,
        format: ExportFormat,
    ) -> Result<usize> {
        let balances = self.service.list_balances().await?;
        match format {
            ExportFormat::Json => write_json(writer, &balances),
            ExportFormat::Csv => {
                let mut csv_writer = csv::Writer::from_writer(writer);
                csv_writer.write_record(["debtor", "creditor", "amount"])?;
                for balance in &balances {
                    csv_writer.write_record([
                        balance.debtor_name.clone(),
                        balance.creditor_name.clone(),
                        format_cents(balance.amount_cents),
                    ])?;
                }
                csv_writer.flush()?;
                Ok(balances.len())
            }
        }
    }

    /// Export all expenses in creation order.
    pub async fn export_expenses<W: Write>(
        &self,
        writer: W,
        format: ExportFormat,
    ) -> Result<usize> {
        let expenses = self.service.list_expenses(None).await?;
        match format {
            ExportFormat::Json => write_json(writer, &expenses),
            ExportFormat::Csv => {
                let mut csv_writer = csv::Writer::from_writer(writer);
                csv_writer.write_record([
                    "id",
                    "trip_id",
                    "paid_by",
                    "total",
                    "description",
                    "created_at",
                ])?;
                for expense in &expenses {
                    csv_writer.write_record([
                        expense.id.to_string(),
                        expense.trip_id.to_string(),
                        expense.paid_by.to_string(),
                        format_cents(expense.total_cents),
                        expense.description.clone(),
                        expense.created_at.to_rfc3339(),
                    ])?;
                }
                csv_writer.flush()?;
                Ok(expenses.len())
            }
        }
    }
}

fn write_json<W: Write, T: Serialize>(mut writer: W, records: &[T]) -> Result<usize> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writeln!(writer)?;
    Ok(records.len())
}
