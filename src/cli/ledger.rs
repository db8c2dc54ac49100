use crate::db::{self, LedgerRepository};
use anyhow::Result;

use super::args::LedgerCliArgs;

pub fn handle_ledger_command(args: LedgerCliArgs) -> Result<()> {
    let conn = db::init_db()?;
    let total = LedgerRepository::count(&conn)?;
    let entries = LedgerRepository::recent(&conn, args.limit)?;

    if entries.is_empty() {
        println!("No recordings have been processed yet.");
        return Ok(());
    }

    println!("Showing {} of {} processed recording(s):\n", entries.len(), total);

    for entry in entries {
        println!("File: {}", entry.filename);
        println!("Path: {}", entry.source_path);
        println!("Date: {}", entry.processed_at);
        println!("---");
    }

    Ok(())
}
