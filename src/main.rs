use anyhow::Result;
use ordersmith::manifest;
use ordersmith::sorter;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut manifest_path: Option<PathBuf> = None;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                println!("ordersmith");
                println!("  ordersmith <manifest.json>   Sort the plugins described by the manifest");
                println!();
                println!("Prints the calculated load order, one plugin per line.");
                println!("Set RUST_LOG=debug to trace the graph construction.");
                return Ok(());
            }
            other => {
                if manifest_path.is_none() {
                    manifest_path = Some(PathBuf::from(other));
                } else {
                    eprintln!("unexpected argument: {other}");
                }
            }
        }
    }

    let Some(path) = manifest_path else {
        eprintln!("usage: ordersmith <manifest.json>");
        std::process::exit(2);
    };

    let manifest = manifest::load_manifest(&path)?;
    let groups = manifest.groups.clone();
    let hardcoded = manifest.hardcoded.clone();
    let previous_order = manifest.previous_order.clone();
    let plugins = manifest.into_plugins();

    match sorter::build_and_sort(plugins, &groups, &hardcoded, &previous_order) {
        Ok(result) => {
            for warning in &result.warnings {
                eprintln!("warning: {warning}");
            }
            for name in &result.order {
                println!("{name}");
            }
            Ok(())
        }
        Err(failure) => {
            eprintln!("{failure}");
            std::process::exit(1);
        }
    }
}
