use chrono::NaiveDate;
use khata_core::email::EmailOutcome;
use khata_core::model::{CandidateTransaction, Direction, StatementMetadata};
use khata_core::report::WarningSeverity;
use khata_core::strategies::loan::{InstallmentStatus, PaymentStatus};
use khata_core::ParsedStatement;

const DESCRIPTION_WIDTH: usize = 42;

pub fn print_statement(parsed: &ParsedStatement) {
    let d = &parsed.detection;
    println!(
        "=== {} {} ({:?} confidence, {}) ===\n",
        d.institution, d.kind, d.confidence, parsed.strategy
    );

    print_metadata(&parsed.metadata);

    if parsed.transactions.is_empty() {
        println!("  No transactions found.");
    } else {
        println!(
            "  {:<10}  {:<width$}  {:>14}  {:>14}",
            "Date",
            "Description",
            "Amount",
            "Balance",
            width = DESCRIPTION_WIDTH
        );
        println!("  {}", "-".repeat(10 + DESCRIPTION_WIDTH + 14 + 14 + 6));
        for (i, txn) in parsed.transactions.iter().enumerate() {
            let marker = if parsed.flags.iter().any(|f| f.transaction_index == i) {
                " *"
            } else {
                ""
            };
            print_transaction(txn, marker);
        }
    }

    if !parsed.flags.is_empty() {
        println!("\n  Flags:");
        for f in &parsed.flags {
            println!("    #{:<4} {:<22} {}", f.transaction_index + 1, f.kind.to_string(), f.reason);
        }
    }

    if !parsed.warnings.is_empty() {
        println!("\n  Warnings:");
        for w in &parsed.warnings {
            let level = match w.severity {
                WarningSeverity::Important => "!",
                WarningSeverity::Info => "i",
            };
            println!("    [{level}] {}", w.message);
        }
    }

    if parsed.skipped_count() > 0 {
        println!("\n  {} row(s) skipped:", parsed.skipped_count());
        for row in &parsed.skipped_rows {
            let first_line = row.text.lines().next().unwrap_or("");
            println!("    {} ({})", truncate(first_line, 60), row.reason);
        }
    }
}

fn print_transaction(txn: &CandidateTransaction, marker: &str) {
    let sign = match txn.direction {
        Direction::Credit => "+",
        Direction::Debit => "-",
    };
    let balance = txn
        .running_balance
        .map(|b| b.to_string())
        .unwrap_or_default();
    println!(
        "  {:<10}  {:<width$}  {:>14}  {:>14}{}",
        txn.date.to_string(),
        truncate(&txn.description, DESCRIPTION_WIDTH),
        format!("{sign}{}", txn.amount),
        balance,
        marker,
        width = DESCRIPTION_WIDTH
    );
}

fn print_metadata(m: &StatementMetadata) {
    let mut rows: Vec<(&'static str, String)> = Vec::new();
    let mut push = |label: &'static str, value: Option<String>| {
        if let Some(v) = value {
            rows.push((label, v));
        }
    };
    push("Holder", m.holder_name.clone());
    push("Account", m.account_number.clone());
    push("Card", m.card_number.clone());
    push("IFSC", m.routing_code.clone());
    push("Branch", m.branch.clone());
    if let (Some(start), Some(end)) = (m.period_start, m.period_end) {
        push("Period", Some(format!("{start} to {end}")));
    }
    push("Opening", m.opening_balance.map(|v| v.to_string()));
    push("Closing", m.closing_balance.map(|v| v.to_string()));
    push("Total due", m.total_due.map(|v| v.to_string()));
    push("Minimum due", m.minimum_due.map(|v| v.to_string()));
    push("Due date", m.payment_due_date.map(|v| v.to_string()));
    push("Sweep", m.sweep_balance.map(|v| v.to_string()));

    if rows.is_empty() {
        return;
    }
    for (label, value) in rows {
        println!("  {:<12} {}", label, value);
    }
    println!();
}

pub fn print_email(outcome: &EmailOutcome) {
    match outcome {
        EmailOutcome::Matched(m) => {
            let t = &m.transaction;
            println!("{} alert matched rule '{}'\n", m.institution, m.rule);
            println!("  Date:        {}", t.date);
            println!("  Description: {}", t.description);
            println!("  Amount:      {} ({})", t.amount, t.direction);
            if let Some(last4) = &t.extras.account_last4 {
                println!("  Account:     XX{last4}");
            }
            if let Some(vpa) = &t.extras.counterparty {
                println!("  VPA:         {vpa}");
            }
            if let Some(reference) = &t.reference_number {
                println!("  Reference:   {reference}");
            }
        }
        EmailOutcome::Skipped {
            institution,
            reason,
        } => {
            let from = institution
                .map(|i| i.to_string())
                .unwrap_or_else(|| "unknown sender".into());
            println!("Skipped ({from}): {reason:?}");
        }
    }
}

pub fn print_installments(statuses: &[InstallmentStatus], as_of: NaiveDate) {
    println!("Repayment schedule as of {as_of}\n");
    println!("  {:>4}  {:<10}  {:>12}  Status", "#", "Due", "EMI");
    println!("  {}", "-".repeat(48));

    let mut overdue = 0;
    for s in statuses {
        let status = match s.status {
            PaymentStatus::Paid { paid_on, .. } => format!("paid {paid_on}"),
            PaymentStatus::Overdue => {
                overdue += 1;
                "OVERDUE".to_string()
            }
            PaymentStatus::Upcoming => "upcoming".to_string(),
        };
        println!(
            "  {:>4}  {:<10}  {:>12}  {}",
            s.number,
            s.due_date.to_string(),
            s.amount.to_string(),
            status
        );
    }

    if overdue > 0 {
        println!("\n  {overdue} installment(s) overdue");
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let cut: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
