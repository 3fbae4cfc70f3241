// build.rs
// Compiles the viewer's GLSL shaders to SPIR-V under the workspace target/shaders

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_EXTENSIONS: [&str; 2] = ["vert", "frag"];

/// Compile every shader in `shader_dir` that is newer than its `.spv`
fn compile_shaders(shader_dir: &Path, target_dir: &Path, glslc: &Path) -> usize {
    let entries = match std::fs::read_dir(shader_dir) {
        Ok(entries) => entries,
        Err(e) => {
            println!("cargo:warning=No shader directory at {}: {e}", shader_dir.display());
            return 0;
        }
    };

    let mut compiled = 0;
    for path in entries.filter_map(Result::ok).map(|entry| entry.path()) {
        let is_shader = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SHADER_EXTENSIONS.contains(&ext));
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !is_shader {
            continue;
        }

        // simple.vert -> simple.vert.spv
        let out_file = target_dir.join(format!("{file_name}.spv"));
        let up_to_date = match (std::fs::metadata(&path), std::fs::metadata(&out_file)) {
            (Ok(src), Ok(dst)) => matches!((src.modified(), dst.modified()), (Ok(s), Ok(d)) if s <= d),
            _ => false,
        };
        if up_to_date {
            eprintln!("info: Shader {file_name} is up to date");
            continue;
        }

        match Command::new(glslc).arg(&path).arg("-o").arg(&out_file).status() {
            Ok(status) if status.success() => {
                eprintln!("info: Compiled {file_name} -> {}", out_file.display());
                compiled += 1;
            }
            Ok(status) => {
                println!("cargo:warning=glslc failed for {file_name} with exit code {}", status.code().unwrap_or(-1));
            }
            Err(e) => {
                println!("cargo:warning=Failed to run glslc for {file_name}: {e}");
            }
        }
    }
    compiled
}

fn main() {
    println!("cargo:rerun-if-changed=shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var_os("SKIP_SHADERS").is_some() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let Some(vulkan_sdk) = env::var_os("VULKAN_SDK") else {
        println!("cargo:warning=VULKAN_SDK not set, shader compilation skipped");
        return;
    };
    let glslc = if cfg!(target_os = "windows") {
        PathBuf::from(vulkan_sdk).join("Bin").join("glslc.exe")
    } else {
        PathBuf::from(vulkan_sdk).join("bin").join("glslc")
    };
    if !glslc.exists() {
        println!("cargo:warning=glslc not found at {}, shader compilation skipped", glslc.display());
        return;
    }

    let manifest_dir = PathBuf::from(env::var_os("CARGO_MANIFEST_DIR").unwrap_or_default());
    let shader_dir = manifest_dir.join("shaders");
    let target_dir = manifest_dir.join("..").join("target").join("shaders");
    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        println!("cargo:warning=Failed to create {}: {e}", target_dir.display());
        return;
    }

    let compiled = compile_shaders(&shader_dir, &target_dir, &glslc);
    eprintln!("info: Compiled {compiled} shader(s)");
}
