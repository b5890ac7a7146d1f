use aegis_domain::config::{Config, ConfigSeverity};

use crate::cli::ConfigCommand;

pub fn run(command: ConfigCommand, config: &Config) -> anyhow::Result<bool> {
    match command {
        ConfigCommand::Validate => {
            let issues = config.validate();
            if issues.is_empty() {
                println!("config ok: no issues");
                return Ok(true);
            }
            for issue in &issues {
                println!("{issue}");
            }
            let error_count = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).count();
            Ok(error_count == 0)
        }
        ConfigCommand::Show => {
            let toml = toml::to_string_pretty(config)?;
            println!("{toml}");
            Ok(true)
        }
    }
}
