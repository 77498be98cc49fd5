use std::env;
use std::path::PathBuf;
use std::process::{self, Command};

const GATEWAY_BINARY: &str = "api-gateway";

fn main() {
    // Thin launcher for the api-gateway binary built alongside this one
    println!("Starting card ledger...");

    let binary_path = match gateway_path() {
        Some(path) => path,
        None => {
            eprintln!("Could not locate the {} binary", GATEWAY_BINARY);
            process::exit(1);
        }
    };

    println!("Launching: {:?}", binary_path);

    let status = Command::new(&binary_path)
        .args(env::args().skip(1))
        .status()
        .unwrap_or_else(|e| {
            eprintln!("Failed to execute {} binary at {:?}: {}", GATEWAY_BINARY, binary_path, e);
            process::exit(1);
        });

    process::exit(status.code().unwrap_or(1));
}

/// Look next to the running executable first, then in the workspace target directory
fn gateway_path() -> Option<PathBuf> {
    let file_name = format!("{}{}", GATEWAY_BINARY, env::consts::EXE_SUFFIX);

    let sibling = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&file_name)));
    if let Some(path) = sibling.filter(|path| path.exists()) {
        return Some(path);
    }

    let profile = if cfg!(debug_assertions) { "debug" } else { "release" };
    let target = env::current_dir().ok()?.join("target").join(profile).join(&file_name);
    target.exists().then_some(target)
}
