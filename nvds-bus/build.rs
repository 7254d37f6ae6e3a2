//! Locates the DeepStream SDK libraries when the `deepstream` feature is on.
//!
//!   DEEPSTREAM_DIR: SDK root, defaults to /opt/nvidia/deepstream/deepstream

use std::env;
use std::path::PathBuf;

const DEFAULT_DEEPSTREAM_DIR: &str = "/opt/nvidia/deepstream/deepstream";

fn main() {
    println!("cargo:rerun-if-env-changed=DEEPSTREAM_DIR");
    if env::var_os("CARGO_FEATURE_DEEPSTREAM").is_none() {
        return;
    }

    let root = env::var("DEEPSTREAM_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DEEPSTREAM_DIR));
    let lib_dir = root.join("lib");
    if !lib_dir.exists() {
        println!(
            "cargo:warning=DeepStream libraries not found at {}; set DEEPSTREAM_DIR",
            lib_dir.display()
        );
    }
    println!("cargo:rustc-link-search=native={}", lib_dir.display());
    println!("cargo:rustc-link-lib=dylib=nvdsgst_meta");
    println!("cargo:rustc-link-lib=dylib=nvds_meta");
}
