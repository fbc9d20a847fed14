use anyhow::*;
use fs_extra::copy_items;
use fs_extra::dir::CopyOptions;
use std::env;
use std::path::PathBuf;

fn main() -> Result<()> {
    // Rerun when the bundled model or its textures change.
    println!("cargo:rerun-if-changed=assets/*");

    let out_dir = env::var("OUT_DIR")?;
    let mut copy_options = CopyOptions::new();
    copy_options.overwrite = true;
    let paths_to_copy = vec!["assets/"];
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    if manifest_dir.join("assets").exists() {
        copy_items(&paths_to_copy, out_dir, &copy_options)?;
    }

    Ok(())
}
