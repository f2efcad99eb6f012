//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `shoplist_core` linkage with `ping` and `version`.
//! - Drive archive export/import and print the shopping list for a database
//!   file, for quick local checks.
//!
//! Set `SHOPLIST_CONFIG` to a JSON config file to override core defaults.

use log::error;
use shoplist_core::{init_logging_from_config, CoreConfig, ShoppingService};
use std::process::ExitCode;

const USAGE: &str = "usage: shoplist_cli <ping|version|export <db> <out.json>|import <db> <in.json>|list <db>>";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command: Vec<&str> = args.iter().map(String::as_str).collect();

    match run(&command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_command module=cli status=error error={message}");
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: &[&str]) -> Result<(), String> {
    match command {
        ["ping"] => {
            println!("shoplist_core ping={}", shoplist_core::ping());
            Ok(())
        }
        ["version"] => {
            println!("shoplist_core version={}", shoplist_core::core_version());
            Ok(())
        }
        ["export", db, out] => {
            let service = open_service(db)?;
            let locations = service.export_to_path(out).map_err(|err| err.to_string())?;
            println!("exported locations={locations}");
            Ok(())
        }
        ["import", db, input] => {
            let service = open_service(db)?;
            let report = service
                .import_from_path(input)
                .map_err(|err| err.to_string())?;
            service.flush().map_err(|err| err.to_string())?;
            println!(
                "imported locations_created={} locations_matched={} items_created={} items_skipped={}",
                report.locations_created,
                report.locations_matched,
                report.items_created,
                report.items_skipped
            );
            Ok(())
        }
        ["list", db] => {
            let service = open_service(db)?;
            for section in service.shopping_list_sections(true) {
                let heading = section
                    .location
                    .as_ref()
                    .map_or("All Items", |location| location.name.as_str());
                println!("{heading}");
                for item in &section.items {
                    println!("  {} x{}", item.name, item.quantity);
                }
            }
            Ok(())
        }
        _ => Err(USAGE.to_string()),
    }
}

fn open_service(db: &str) -> Result<ShoppingService, String> {
    let config = match std::env::var_os("SHOPLIST_CONFIG") {
        Some(path) => CoreConfig::load(path).map_err(|err| err.to_string())?,
        None => CoreConfig::default(),
    };
    init_logging_from_config(&config)?;
    ShoppingService::open_sqlite(db, &config).map_err(|err| err.to_string())
}
