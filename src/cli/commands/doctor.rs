//! Doctor command - verify configuration, credentials and the index.

use crate::cli::Output;
use crate::config::{Credentials, Settings};
use crate::vector_store::{index_file, open_index};
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

fn print_section(title: &str, checks: &[CheckResult]) {
    println!("{}", style(title).bold());
    for check in checks {
        check.print();
    }
    println!();
}

/// Run all diagnostic checks.
pub fn run_doctor(
    settings: &Settings,
    credentials: &Credentials,
    config_path: &Path,
) -> anyhow::Result<()> {
    Output::header("RoadSafe Doctor");
    println!();
    println!("Checking configuration, credentials and the guideline index...\n");

    let mut checks = Vec::new();

    let provider = vec![
        check_api_key(&settings.provider.api_key_env, credentials),
        check_api_base(settings.provider.api_base.as_deref()),
    ];
    print_section("Provider", &provider);
    checks.extend(provider);

    let index = vec![check_index(settings)];
    print_section("Guideline Index", &index);
    checks.extend(index);

    let config = vec![check_config_file(config_path)];
    print_section("Configuration", &config);
    checks.extend(config);

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using RoadSafe.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! RoadSafe is ready to use.");
    }

    Ok(())
}

/// Check the provider API key read at startup.
fn check_api_key(var: &str, credentials: &Credentials) -> CheckResult {
    let hint = format!("Set with: export {}='sk-...' (or add it to .env)", var);
    match credentials.api_key() {
        Some(key) if key.starts_with("sk-") && key.chars().count() > 20 => {
            let chars: Vec<char> = key.chars().collect();
            let masked = format!(
                "{}...{}",
                chars[..7].iter().collect::<String>(),
                chars[chars.len() - 4..].iter().collect::<String>()
            );
            CheckResult::ok(var, &format!("configured ({})", masked))
        }
        Some(_) => CheckResult::warning(
            var,
            "set but format looks unusual",
            "Expected format: sk-... (fine for OpenAI-compatible providers)",
        ),
        None => CheckResult::error(var, "not set", &hint),
    }
}

/// Check that a custom provider base URL parses.
fn check_api_base(api_base: Option<&str>) -> CheckResult {
    match api_base {
        None => CheckResult::ok("Provider", "OpenAI (default endpoint)"),
        Some(base) => match url::Url::parse(base) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                CheckResult::ok("Provider", base)
            }
            Ok(url) => CheckResult::error(
                "Provider",
                &format!("unsupported scheme '{}'", url.scheme()),
                "Use an http:// or https:// base URL in [provider] api_base",
            ),
            Err(e) => CheckResult::error(
                "Provider",
                &format!("invalid api_base: {}", e),
                "Fix [provider] api_base in the config file",
            ),
        },
    }
}

/// Check that the index exists and matches the configured embedding model.
fn check_index(settings: &Settings) -> CheckResult {
    let path = index_file(&settings.index_dir(), settings.vector_store.provider);
    let name = format!("Index ({})", settings.vector_store.provider);

    if !path.exists() {
        return CheckResult::error(
            &name,
            &format!("{} (not built yet)", path.display()),
            "Build it with: roadsafe index <guidelines.xlsx>",
        );
    }

    match open_index(settings) {
        Ok(_) => {
            let size = std::fs::metadata(&path)
                .map(|m| format_size(m.len()))
                .unwrap_or_else(|_| "unknown size".to_string());
            CheckResult::ok(&name, &format!("{} ({})", path.display(), size))
        }
        Err(e) => CheckResult::error(
            &name,
            &e.to_string(),
            "Rebuild with: roadsafe index <guidelines.xlsx>",
        ),
    }
}

/// Check if config file exists.
fn check_config_file(config_path: &Path) -> CheckResult {
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: roadsafe config edit",
        )
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
