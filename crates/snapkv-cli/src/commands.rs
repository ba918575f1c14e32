use std::collections::BTreeMap;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context};
use colored::Colorize;
use snapkv_store::{ConcurrentStore, Key, StoreConfig, Value, ValueKind};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => StoreConfig::default(),
    };
    let format = cli.format;

    match cli.command {
        Command::Demo(args) => cmd_demo(args, config, format),
        Command::Set(args) => cmd_set(args, config, format),
        Command::Get(args) => cmd_get(args, config, format),
        Command::Rm(args) => cmd_rm(args, config, format),
        Command::List(args) => cmd_list(args, config, format),
        Command::Stats(args) => cmd_stats(args, config, format),
    }
}

fn cmd_demo(args: DemoArgs, config: StoreConfig, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let store = ConcurrentStore::with_config(config);
    store.set(Key::new("key1")?, "value1");
    store.set(Key::new("key2")?, "value2");

    let saved = store
        .save_snapshot(&args.path)
        .with_context(|| format!("failed to save {}", args.path.display()))?;
    store
        .load_snapshot(&args.path)
        .with_context(|| format!("failed to load {}", args.path.display()))?;

    let value = store.get("key2");
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "snapshot": args.path.display().to_string(),
            "entries": saved.entries,
            "bytes": saved.bytes,
            "key2": value.as_ref().map(to_json),
        }))?,
        OutputFormat::Text => {
            println!(
                "{} Saved {} entries ({} bytes) to {}",
                "✓".green().bold(),
                saved.entries,
                saved.bytes,
                args.path.display().to_string().bold()
            );
            match &value {
                Some(v) => println!("key2: {}", v.to_string().cyan()),
                None => println!("key2 {}", "does not exist".red()),
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_set(args: SetArgs, config: StoreConfig, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let store = open_or_create(&args.snapshot, config)?;
    let key = Key::new(args.key)?;
    let value = parse_value(&args.value, args.value_type)?;
    let previous = store.set(key.clone(), value.clone());
    save(&store, &args.snapshot)?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "key": key.as_str(),
            "value": to_json(&value),
            "previous": previous.as_ref().map(to_json),
        }))?,
        OutputFormat::Text => {
            let verb = if previous.is_some() { "updated" } else { "set" };
            println!(
                "{} {} {} = {}",
                "✓".green().bold(),
                verb,
                key.to_string().yellow(),
                value
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_get(args: GetArgs, config: StoreConfig, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let store = open_existing(&args.snapshot, config)?;
    let value = store.get(&args.key);

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "key": args.key,
            "found": value.is_some(),
            "value": value.as_ref().map(to_json),
        }))?,
        OutputFormat::Text => match &value {
            Some(v) => println!("{v}"),
            None => eprintln!("{} {}", args.key.yellow(), "not found".red()),
        },
    }
    Ok(if value.is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_rm(args: RmArgs, config: StoreConfig, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let store = open_existing(&args.snapshot, config)?;
    let removed = store.remove(&args.key);
    if removed.is_some() {
        save(&store, &args.snapshot)?;
    }

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "key": args.key,
            "removed": removed.as_ref().map(to_json),
        }))?,
        OutputFormat::Text => match removed {
            Some(_) => println!("{} removed {}", "✓".green().bold(), args.key.yellow()),
            None => println!("{} not present", args.key.yellow()),
        },
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_list(args: ListArgs, config: StoreConfig, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let store = open_existing(&args.snapshot, config)?;
    let entries = store.entries();

    match format {
        OutputFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = entries
                .iter()
                .map(|(k, v)| (k.to_string(), to_json(v)))
                .collect();
            print_json(&serde_json::Value::Object(map))?;
        }
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("{}", "(empty)".dimmed());
            }
            for (k, v) in &entries {
                println!(
                    "{}  {}  {}",
                    k.to_string().yellow(),
                    v.kind().to_string().dimmed(),
                    v
                );
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_stats(
    args: StatsArgs,
    config: StoreConfig,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    let store = ConcurrentStore::with_config(config);
    let stats = store
        .load_snapshot(&args.snapshot)
        .with_context(|| format!("failed to load {}", args.snapshot.display()))?;
    let kinds = kind_histogram(&store);

    match format {
        OutputFormat::Json => {
            let by_kind: serde_json::Map<String, serde_json::Value> = kinds
                .iter()
                .map(|(k, n)| (k.to_string(), serde_json::Value::from(*n)))
                .collect();
            print_json(&serde_json::json!({
                "snapshot": args.snapshot.display().to_string(),
                "entries": stats.entries,
                "bytes": stats.bytes,
                "kinds": by_kind,
            }))?;
        }
        OutputFormat::Text => {
            println!("Snapshot: {}", args.snapshot.display().to_string().bold());
            println!("  Entries: {}", stats.entries.to_string().bold());
            println!("  Size:    {} bytes", stats.bytes);
            for (kind, n) in &kinds {
                println!("  {:<6} {}", kind.to_string().cyan(), n);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn open_existing(path: &Path, config: StoreConfig) -> anyhow::Result<ConcurrentStore> {
    let store = ConcurrentStore::with_config(config);
    store
        .load_snapshot(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(store)
}

fn open_or_create(path: &Path, config: StoreConfig) -> anyhow::Result<ConcurrentStore> {
    if path.exists() {
        open_existing(path, config)
    } else {
        Ok(ConcurrentStore::with_config(config))
    }
}

fn save(store: &ConcurrentStore, path: &Path) -> anyhow::Result<()> {
    store
        .save_snapshot(path)
        .with_context(|| format!("failed to save {}", path.display()))?;
    Ok(())
}

fn kind_histogram(store: &ConcurrentStore) -> BTreeMap<ValueKind, usize> {
    let mut kinds = BTreeMap::new();
    for value in store.entries().values() {
        *kinds.entry(value.kind()).or_insert(0) += 1;
    }
    kinds
}

fn parse_value(raw: &str, value_type: ValueType) -> anyhow::Result<Value> {
    let value = match value_type {
        ValueType::Str => Value::from(raw),
        ValueType::Int => Value::Int(
            raw.parse()
                .with_context(|| format!("{raw:?} is not an integer"))?,
        ),
        ValueType::Float => Value::Float(
            raw.parse()
                .with_context(|| format!("{raw:?} is not a number"))?,
        ),
        ValueType::Bool => match raw {
            "true" | "yes" | "1" => Value::Bool(true),
            "false" | "no" | "0" => Value::Bool(false),
            _ => bail!("{raw:?} is not a boolean"),
        },
        ValueType::Null => Value::Null,
    };
    Ok(value)
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        // Non-finite floats have no JSON form and become null.
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => serde_json::Value::String(hex::encode(b)),
        Value::List(items) => {
            serde_json::Value::Array(items.iter().map(to_json).collect())
        }
        Value::Map(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), to_json(v))).collect(),
        ),
    }
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn run(args: &[&str]) -> anyhow::Result<ExitCode> {
        let mut argv = vec!["snapkv"];
        argv.extend_from_slice(args);
        run_command(Cli::parse_from(argv))
    }

    #[test]
    fn parse_value_by_type() {
        assert_eq!(parse_value("42", ValueType::Int).unwrap(), Value::Int(42));
        assert_eq!(
            parse_value("2.5", ValueType::Float).unwrap(),
            Value::Float(2.5)
        );
        assert_eq!(
            parse_value("yes", ValueType::Bool).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            parse_value("ignored", ValueType::Null).unwrap(),
            Value::Null
        );
        assert_eq!(
            parse_value("42", ValueType::Str).unwrap(),
            Value::from("42")
        );
        assert!(parse_value("forty", ValueType::Int).is_err());
        assert!(parse_value("maybe", ValueType::Bool).is_err());
    }

    #[test]
    fn json_rendering() {
        let mut map = std::collections::BTreeMap::new();
        map.insert("b".to_string(), Value::Bytes(vec![0xab]));
        let v = Value::List(vec![
            Value::Float(f64::NAN),
            Value::Map(map),
            Value::Int(-1),
        ]);
        assert_eq!(to_json(&v), serde_json::json!([null, {"b": "ab"}, -1]));
    }

    #[test]
    fn demo_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.snap");
        let code = run(&["demo", "--path", path.to_str().unwrap()]).unwrap();
        assert_eq!(code, ExitCode::SUCCESS);

        let store = ConcurrentStore::new();
        store.load_snapshot(&path).unwrap();
        assert_eq!(store.get("key1"), Some(Value::from("value1")));
        assert_eq!(store.get("key2"), Some(Value::from("value2")));
    }

    #[test]
    fn set_get_rm_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let snap = dir.path().join("cli.snap");
        let snap = snap.to_str().unwrap();

        run(&["set", snap, "count", "7", "--type", "int"]).unwrap();
        run(&["set", snap, "name", "snapkv"]).unwrap();
        assert_eq!(run(&["get", snap, "count"]).unwrap(), ExitCode::SUCCESS);
        assert_eq!(run(&["get", snap, "missing"]).unwrap(), ExitCode::FAILURE);

        run(&["rm", snap, "count"]).unwrap();
        let store = ConcurrentStore::new();
        store.load_snapshot(snap).unwrap();
        assert_eq!(store.get("count"), None);
        assert_eq!(store.get("name"), Some(Value::from("snapkv")));

        assert_eq!(
            run(&["list", snap, "--format", "json"]).unwrap(),
            ExitCode::SUCCESS
        );
        assert_eq!(run(&["stats", snap]).unwrap(), ExitCode::SUCCESS);
    }

    #[test]
    fn get_on_missing_snapshot_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let snap = dir.path().join("absent.snap");
        let err = run(&["get", snap.to_str().unwrap(), "k"]).unwrap_err();
        assert!(err.to_string().contains("failed to load"));
    }

    #[test]
    fn config_file_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("snapkv.toml");
        std::fs::write(
            &cfg,
            "write_mode = \"atomic_rename\"\nsave_mode = \"exclusive\"\n",
        )
        .unwrap();
        let snap = dir.path().join("cfg.snap");

        let code = run(&[
            "--config",
            cfg.to_str().unwrap(),
            "set",
            snap.to_str().unwrap(),
            "k",
            "v",
        ])
        .unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert!(snap.exists());
    }

    #[test]
    fn empty_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let snap = dir.path().join("e.snap");
        assert!(run(&["set", snap.to_str().unwrap(), "", "v"]).is_err());
    }
}
