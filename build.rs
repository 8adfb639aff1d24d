//! Build script for clonerow - locates the DuckDB library for linking

use std::env;
use std::path::PathBuf;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Bundled DuckDB compiles its own library, nothing to detect.
    if cfg!(feature = "bundled") {
        return;
    }

    if env::var("SKIP_DUCKDB_DETECTION").is_ok() {
        println!("cargo:rustc-link-lib=duckdb");
        return;
    }

    match find_duckdb_library() {
        Some(lib_path) => {
            println!("cargo:rustc-link-search=native={}", lib_path.display());
            println!("cargo:rustc-link-lib=duckdb");
        }
        None => {
            eprintln!("DuckDB library not found.");
            eprintln!();
            eprintln!("Install DuckDB (e.g. brew install duckdb / apt install libduckdb-dev),");
            eprintln!("build with the bundled library (cargo build --features bundled),");
            eprintln!("or point DUCKDB_LIB_PATH at a directory containing libduckdb.");
            panic!("DuckDB library not found");
        }
    }
}

fn find_duckdb_library() -> Option<PathBuf> {
    if let Ok(path) = env::var("DUCKDB_LIB_PATH") {
        let path = PathBuf::from(path);
        if has_duckdb_library(&path) {
            return Some(path);
        }
    }

    if let Some(path) = try_pkg_config() {
        return Some(path);
    }

    standard_paths()
        .into_iter()
        .find(|path| has_duckdb_library(path))
}

fn try_pkg_config() -> Option<PathBuf> {
    let output = Command::new("pkg-config")
        .args(["--libs-only-L", "duckdb"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        if let Some(path_str) = line.strip_prefix("-L") {
            let path = PathBuf::from(path_str.trim());
            if has_duckdb_library(&path) {
                return Some(path);
            }
        }
    }
    None
}

fn standard_paths() -> Vec<PathBuf> {
    if cfg!(target_os = "macos") {
        vec![
            PathBuf::from("/opt/homebrew/lib"),
            PathBuf::from("/usr/local/lib"),
            PathBuf::from("/opt/local/lib"),
        ]
    } else if cfg!(target_os = "linux") {
        vec![
            PathBuf::from("/usr/lib"),
            PathBuf::from("/usr/local/lib"),
            PathBuf::from("/usr/lib/x86_64-linux-gnu"),
            PathBuf::from("/usr/lib64"),
        ]
    } else {
        Vec::new()
    }
}

fn has_duckdb_library(path: &PathBuf) -> bool {
    if !path.exists() {
        return false;
    }
    [
        "libduckdb.so",
        "libduckdb.so.1",
        "libduckdb.dylib",
        "libduckdb.a",
    ]
    .iter()
    .any(|name| path.join(name).exists())
}
