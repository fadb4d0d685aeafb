// AI Chatbot - Build Task Runner
// Unified build system using cargo xtask pattern

use anyhow::{Context, Result};
use xshell::{cmd, Shell};

fn main() -> Result<()> {
    let sh = Shell::new()?;
    let args: Vec<_> = std::env::args().skip(1).collect();

    match args.first().map(|s| s.as_str()) {
        Some("build") => {
            let release = args.contains(&"--release".to_string());
            build(&sh, release)
        }
        Some("test") => test(&sh),
        Some("format") => {
            let check = args.contains(&"--check".to_string());
            format(&sh, check)
        }
        Some("clippy") => clippy(&sh),
        Some("run") => run(&sh, &args[1..]),
        Some("clean") => clean(&sh),
        Some("ci") => ci(&sh),
        Some("dist") => dist(&sh),
        _ => {
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!("AI Chatbot - Build Commands:");
    println!();
    println!("Usage: cargo xtask <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  build [--release]   Build the backend");
    println!("  test                Run all tests");
    println!("  format [--check]    Format code (check mode doesn't modify)");
    println!("  clippy              Run clippy checks");
    println!("  run [ARGS...]       Build and run the server");
    println!("  clean               Clean build artifacts");
    println!("  ci                  Run all CI checks (format + clippy + build + test)");
    println!("  dist                Create distribution package (tar.gz)");
    println!();
    println!("Examples:");
    println!("  cargo xtask build --release");
    println!("  cargo xtask run -- --port 9000");
    println!("  cargo xtask format --check");
}

/// Build the backend, with clippy first in release mode
fn build(sh: &Shell, release: bool) -> Result<()> {
    println!("🔨 Building AI Chatbot...");
    println!();

    if release {
        println!("🔍 [1/2] Running clippy checks...");
        clippy(sh)?;
        println!("✅ Clippy checks passed");
        println!();
    }

    println!(
        "🦀 [{}/2] Building backend{}...",
        if release { 2 } else { 1 },
        if release { " (release)" } else { "" }
    );
    let _dir = sh.push_dir(project_root());
    if release {
        cmd!(sh, "cargo build --release -p ai-chatbot")
            .run()
            .context("Failed to build backend in release mode")?;
        create_distribution(sh)?;
    } else {
        cmd!(sh, "cargo build -p ai-chatbot")
            .run()
            .context("Failed to build backend")?;
    }

    println!("🎉 Build complete!");
    Ok(())
}

/// Lay out build/dist with the binary, config and env template
fn create_distribution(sh: &Shell) -> Result<()> {
    let project = project_root();
    let dist_dir = project.join("build/dist");

    cmd!(sh, "mkdir -p {dist_dir}/bin").run()?;
    cmd!(sh, "mkdir -p {dist_dir}/conf").run()?;
    cmd!(sh, "mkdir -p {dist_dir}/logs").run()?;
    cmd!(sh, "mkdir -p {dist_dir}/documents").run()?;

    let binary_src = project.join("target/release/ai-chatbot");
    let binary_dst = dist_dir.join("bin/ai-chatbot");
    cmd!(sh, "cp {binary_src} {binary_dst}").run()?;

    let config_src = project.join("conf/config.toml");
    let config_dst = dist_dir.join("conf/config.toml");
    cmd!(sh, "cp {config_src} {config_dst}").run()?;

    let env_src = project.join(".env.example");
    if env_src.exists() {
        let env_dst = dist_dir.join(".env.example");
        cmd!(sh, "cp {env_src} {env_dst}").run()?;
    }

    Ok(())
}

/// Run all tests
fn test(sh: &Shell) -> Result<()> {
    println!("🧪 Running tests...");
    println!();

    let _dir = sh.push_dir(project_root());
    cmd!(sh, "cargo test --workspace")
        .run()
        .context("Tests failed")?;

    println!();
    println!("✅ All tests passed!");
    Ok(())
}

/// Format code
fn format(sh: &Shell, check: bool) -> Result<()> {
    println!("🎨 Formatting Rust code...");
    let _dir = sh.push_dir(project_root());

    if check {
        cmd!(sh, "cargo fmt --all -- --check")
            .run()
            .context("Rust code is not formatted")?;
        println!("✅ Rust code is properly formatted");
    } else {
        cmd!(sh, "cargo fmt --all")
            .run()
            .context("Failed to format Rust code")?;
        println!("✅ Rust code formatted");
    }

    Ok(())
}

/// Run clippy checks
fn clippy(sh: &Shell) -> Result<()> {
    let _dir = sh.push_dir(project_root());

    cmd!(sh, "cargo clippy --release --all-targets -- --deny warnings --allow clippy::uninlined-format-args")
        .run()
        .context("Clippy checks failed")?;

    Ok(())
}

/// Build and run the server
fn run(sh: &Shell, args: &[String]) -> Result<()> {
    println!("🚀 Running AI Chatbot...");
    println!();

    let _dir = sh.push_dir(project_root());
    let mut cmd = cmd!(sh, "cargo run -p ai-chatbot --");
    for arg in args.iter().filter(|a| a.as_str() != "--") {
        cmd = cmd.arg(arg);
    }

    cmd.run().context("Failed to run application")?;
    Ok(())
}

/// Clean build artifacts
fn clean(sh: &Shell) -> Result<()> {
    println!("🧹 Cleaning build artifacts...");

    let project = project_root();
    let _dir = sh.push_dir(&project);
    cmd!(sh, "cargo clean").run()?;

    let build_dir = project.join("build");
    if build_dir.exists() {
        cmd!(sh, "rm -rf {build_dir}").run()?;
    }

    println!("✅ Clean complete!");
    Ok(())
}

/// Run all CI checks (format + clippy + build + test)
fn ci(sh: &Shell) -> Result<()> {
    println!("🔄 Running CI pipeline...");
    println!();

    println!("📝 [1/3] Checking code format...");
    format(sh, true)?;
    println!();

    println!("🔨 [2/3] Building project...");
    build(sh, true)?;
    println!();

    println!("🧪 [3/3] Running tests...");
    test(sh)?;
    println!();

    println!("🎉 CI pipeline completed successfully!");
    Ok(())
}

/// Create distribution package (tar.gz)
fn dist(sh: &Shell) -> Result<()> {
    println!("📦 Creating distribution package...");
    build(sh, true)?;

    let dist_dir = project_root().join("build/dist");
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let package_name = format!("ai-chatbot-{}.tar.gz", timestamp);
    let package_path = dist_dir.join(&package_name);

    println!("📋 Creating tarball: {}...", package_name);
    let _dir = sh.push_dir(&dist_dir);
    cmd!(sh, "tar czf {package_name} bin conf logs documents")
        .run()
        .context("Failed to create tarball")?;

    println!();
    println!("✅ Distribution package created!");
    println!("   Location: {}", package_path.display());
    Ok(())
}

/// Get project root directory
fn project_root() -> std::path::PathBuf {
    std::path::Path::new(&env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(1)
        .unwrap()
        .to_path_buf()
}
