//! Validate command: resolve every builder in a template

use std::path::Path;

use colored::Colorize;
use imgbuild_config::{BuildConfig, InterpolateContext, ResolveContext, prepare};
use imgbuild_yandex::ClientConfig;
use serde::Serialize;

use crate::error::{CliError, Result};
use crate::template::{BuilderEntry, Template, parse_vars};

/// Options for [`run_validate`]
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    pub vars: Vec<String>,
    pub only: Option<String>,
    pub json: bool,
}

/// Outcome for one builder
#[derive(Debug, Serialize)]
pub struct BuilderReport {
    pub name: String,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<BuildConfig>,
}

impl BuilderReport {
    fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Run the validate command
///
/// Relative file paths inside the template resolve against the
/// template's directory. `YC_*` environment variables are honoured.
pub fn run_validate(template_path: &Path, options: &ValidateOptions) -> Result<()> {
    let template = Template::load(template_path)?;

    let mut variables = template.variable_defaults()?;
    variables.extend(parse_vars(&options.vars)?);

    let mut entries = template.builder_entries()?;
    if let Some(only) = &options.only {
        entries.retain(|entry| &entry.name == only);
        if entries.is_empty() {
            return Err(CliError::user(format!("no builder named '{only}' in template")));
        }
    }

    let base_dir = template_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let base = ResolveContext::from_process_env().with_base_dir(base_dir);

    let reports: Vec<BuilderReport> = entries
        .iter()
        .map(|entry| {
            let interpolation = InterpolateContext::new()
                .with_user_variables(variables.clone())
                .with_build_name(entry.name.clone());
            resolve_builder(entry, &base.clone().with_interpolation(interpolation))
        })
        .collect::<Result<_>>()?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_reports(&reports);
    }

    let failed = reports.iter().filter(|r| !r.ok()).count();
    if failed > 0 {
        return Err(CliError::user(format!(
            "{failed} of {} builder(s) failed validation",
            reports.len()
        )));
    }
    Ok(())
}

fn resolve_builder(entry: &BuilderEntry, ctx: &ResolveContext) -> Result<BuilderReport> {
    tracing::debug!(builder = %entry.name, "Resolving builder");
    let (warnings, result) = prepare(&entry.raw, ctx);

    let report = match result {
        Ok(config) => {
            let client = ClientConfig::from_build_config(&config)?;
            BuilderReport {
                name: entry.name.clone(),
                warnings,
                errors: Vec::new(),
                auth: Some(client.credentials.kind()),
                config: Some(config),
            }
        }
        Err(errors) => BuilderReport {
            name: entry.name.clone(),
            warnings,
            errors: errors.iter().map(|e| e.to_string()).collect(),
            auth: None,
            config: None,
        },
    };
    Ok(report)
}

fn print_reports(reports: &[BuilderReport]) {
    for report in reports {
        println!("{} Builder {}", "=>".blue().bold(), report.name.cyan());

        for warning in &report.warnings {
            println!("   {} {}", "WARN".yellow().bold(), warning);
        }

        match &report.config {
            Some(config) => {
                println!("   {} Configuration is valid.", "OK".green().bold());
                println!("   {} {}", "image:".dimmed(), config.image_name);
                println!("   {} {}", "zone:".dimmed(), config.zone);
                println!("   {} {}", "platform:".dimmed(), config.platform_id);
                if let Some(auth) = report.auth {
                    println!("   {} {}", "auth:".dimmed(), auth);
                }
            }
            None => {
                println!(
                    "   {} {} error(s):",
                    "INVALID".red().bold(),
                    report.errors.len()
                );
                for error in &report.errors {
                    println!("   {} {}", "-".red(), error);
                }
            }
        }
    }
}
