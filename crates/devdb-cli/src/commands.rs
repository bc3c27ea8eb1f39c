//! Subcommand handlers.

use crate::{AddArgs, Command, GetTarget};
use anyhow::{Context, Result};
use devdb::{DevDbError, DeviceDb, DeviceDescriptor, DeviceRecord, IntegrityReport, StoreConfig};
use serde::Serialize;
use std::process::ExitCode;
use tracing::info;

/// Exit code when `check` finds issues; matches `Inconsistency`.
const CHECK_FAILED: u8 = 6;

pub fn run(config: StoreConfig, command: &Command, json: bool) -> Result<ExitCode> {
    let db = DeviceDb::open(config).context("Failed to open device database")?;
    let code = dispatch(&db, command, json);
    db.close()?;
    code
}

fn dispatch(db: &DeviceDb, command: &Command, json: bool) -> Result<ExitCode> {
    match command {
        Command::Add(args) => {
            let record = db.add_device(&descriptor(args))?;
            info!("Stored device {}", record.name);
            print_record(&record, json)?;
        }
        Command::Get(target) => get(db, target, json)?,
        Command::Delete { name } => match db.delete_device(name)? {
            Some(record) => print_record(&record, json)?,
            None => return Err(not_found("name", name).into()),
        },
        Command::List => {
            let records = db.list_devices()?;
            if json {
                print_json(&records)?;
            } else {
                for record in &records {
                    println!("{}", summary(record));
                }
            }
        }
        Command::Check => {
            let report = db.check_integrity()?;
            print_report(&report, json)?;
            if !report.is_clean() {
                return Ok(ExitCode::from(CHECK_FAILED));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn descriptor(args: &AddArgs) -> DeviceDescriptor {
    let mut desc = DeviceDescriptor::new(args.name.as_str())
        .with_devnum(args.dev_type.into(), args.major, args.minor)
        .with_mode(args.mode);
    desc.devpath = args.devpath.clone();
    desc.driver = args.driver.clone();
    if let Some([bus, id]) = args.bus.as_deref() {
        desc = desc.with_bus(bus.as_str(), id.as_str());
    }
    if let Some([class, class_dev]) = args.class.as_deref() {
        desc = desc.with_class(class.as_str(), class_dev.as_str());
    }
    desc
}

fn get(db: &DeviceDb, target: &GetTarget, json: bool) -> Result<()> {
    if let Some(path) = &target.path {
        let name = db
            .get_device_by_path(path)?
            .ok_or_else(|| not_found("path", path))?;
        if json {
            print_json(&serde_json::json!({ "name": name }))?;
        } else {
            println!("{}", name);
        }
        return Ok(());
    }

    let record = if let Some(name) = &target.name {
        db.get_device_by_name(name)?
            .ok_or_else(|| not_found("name", name))?
    } else if let Some([bus, id]) = target.bus.as_deref() {
        db.get_device_by_bus(bus, id)?
            .ok_or_else(|| not_found("bus", &format!("{} {}", bus, id)))?
    } else if let Some([class, class_dev]) = target.class.as_deref() {
        db.get_device_by_class(class, class_dev)?
            .ok_or_else(|| not_found("class", &format!("{} {}", class, class_dev)))?
    } else {
        anyhow::bail!("No lookup target given");
    };

    print_record(&record, json)
}

fn not_found(kind: &str, key: &str) -> DevDbError {
    DevDbError::NotFound {
        kind: kind.to_string(),
        key: key.to_string(),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn summary(record: &DeviceRecord) -> String {
    format!(
        "{} {} {}:{} {}",
        record.name, record.dev_type, record.major, record.minor, record.devpath
    )
}

fn print_record(record: &DeviceRecord, json: bool) -> Result<()> {
    if json {
        return print_json(record);
    }
    println!("name:      {}", record.name);
    println!("devpath:   {}", record.devpath);
    println!("bus:       {} {}", record.bus_name, record.bus_id);
    println!("class:     {} {}", record.class_name, record.class_dev_name);
    println!("driver:    {}", record.driver);
    println!("type:      {}", record.dev_type);
    println!("devnum:    {}:{}", record.major, record.minor);
    println!("mode:      {:04o}", record.mode);
    Ok(())
}

fn print_report(report: &IntegrityReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    println!(
        "checked {} record(s), {} index entr{}",
        report.records_checked,
        report.entries_checked,
        if report.entries_checked == 1 { "y" } else { "ies" }
    );
    for issue in &report.issues {
        println!("{:?}\t{}\t{}", issue.kind, issue.key, issue.detail);
    }
    if report.is_clean() {
        println!("ok");
    }
    Ok(())
}
