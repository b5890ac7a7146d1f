use aegis_domain::config::{Config, ConfigSeverity};

use crate::resources::ResourcesFile;

/// Runs every diagnostic check and prints a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one failed.
pub async fn run(config: &Config, config_path: &str, resources_path: &str) -> anyhow::Result<bool> {
    println!("aegis-gateway doctor");
    println!("=====================\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_policy_engine(config, &mut all_passed).await;
    check_resources_file(resources_path, &mut all_passed);
    check_audit_fallback_dir(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({} error(s))", issues.len(), error_count),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

async fn check_policy_engine(config: &Config, all_passed: &mut bool) {
    let url = &config.policy.engine_url;
    let reachable = match reqwest::Client::builder().timeout(std::time::Duration::from_secs(5)).build() {
        Ok(client) => client.get(url).send().await.is_ok(),
        Err(_) => false,
    };

    print_check(
        "Policy engine reachable",
        reachable,
        if reachable { url.clone() } else { format!("{url} (unreachable)") },
    );

    if !reachable && config.policy.fail_closed {
        // Not reachable but fail_closed=true just denies everything rather
        // than breaking startup; this is a warning, not a hard failure.
        println!("      note: fail_closed is true, so requests will be denied until the engine is reachable");
    } else if !reachable {
        *all_passed = false;
    }
}

fn check_resources_file(resources_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(resources_path).exists();
    if !exists {
        print_check("Resources file exists", false, format!("{resources_path} not found (no resources registered)"));
        *all_passed = false;
        return;
    }
    let file = ResourcesFile::load(std::path::Path::new(resources_path));
    print_check("Resources file exists", true, format!("{} resource(s) declared", file.resources.len()));
}

fn check_audit_fallback_dir(config: &Config, all_passed: &mut bool) {
    let path = std::path::Path::new(&config.audit.local_fallback_path);
    let parent = path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let writable = std::fs::create_dir_all(parent).is_ok();

    print_check(
        "Audit fallback directory writable",
        writable,
        parent.display().to_string(),
    );

    if !writable {
        *all_passed = false;
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
