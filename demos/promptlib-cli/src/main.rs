//! Command-line front end for the prompt library.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use promptlib::compose::{PromptForm, UploadedFile, find_language};
use promptlib::config::LibraryConfig;
use promptlib::kernel::{LibraryApp, PromptRequest};
use promptlib::primitives::{RoleId, TemplateId};
use promptlib::store::{FileStateStorage, LibraryExport, StateStorage};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file; environment variables still override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the library state
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log in before running the command
    #[arg(long, global = true, requires = "password")]
    user: Option<String>,

    /// Password for `--user`
    #[arg(long, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List roles
    Roles,
    /// List templates, optionally for one role
    Templates {
        #[arg(long)]
        role: Option<String>,
    },
    /// Compose a prompt from a template
    Compose {
        /// Template identifier
        template: String,
        #[arg(long, default_value = "Untitled")]
        title: String,
        /// Best practice label to include; repeatable
        #[arg(long = "practice")]
        practices: Vec<String>,
        /// Programming language key, e.g. `python`
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        output_validation: Option<String>,
        /// Text file to attach; repeatable
        #[arg(long = "file")]
        files: Vec<PathBuf>,
        /// Enhance the result with these techniques; repeatable
        #[arg(long = "enhance")]
        techniques: Vec<String>,
        /// Enhance even when no technique is given
        #[arg(long)]
        enhanced: bool,
    },
    /// Send free text through the enhancement client
    Enhance {
        text: String,
        #[arg(long = "technique")]
        techniques: Vec<String>,
    },
    /// Import a library export file
    Import { path: PathBuf },
    /// Export the library as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Restore the packaged roles and templates
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    promptlib::telemetry::init_tracing();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => {
            LibraryConfig::from_json_file(path)?.apply_env(|name| std::env::var(name).ok())?
        }
        None => LibraryConfig::from_env()?,
    };
    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir.clone());
    }

    let app = open_app(&config).await?;
    if let (Some(user), Some(password)) = (&cli.user, &cli.password) {
        if app.login(user, password).await?.is_none() {
            bail!("invalid credentials for {user}");
        }
    }

    match cli.command {
        Command::Roles => {
            for role in app.roles().await {
                let marker = if role.is_default { " (built-in)" } else { "" };
                println!("{}\t{}{marker}", role.id, role.name);
            }
        }
        Command::Templates { role } => {
            let templates = match role {
                Some(role) => {
                    let role = RoleId::new(role)?;
                    app.template_store().templates_for_role(&role).await
                }
                None => app.templates().await,
            };
            for template in templates {
                println!("{}\t{}\t{}", template.id, template.role, template.name);
            }
        }
        Command::Compose {
            template,
            title,
            practices,
            language,
            output_validation,
            files,
            techniques,
            enhanced,
        } => {
            let template_id = TemplateId::new(template)?;
            let template = app
                .template_store()
                .get(&template_id)
                .await
                .with_context(|| format!("unknown template {template_id}"))?;

            let mut form = PromptForm::new(title);
            for label in &practices {
                let practice = template
                    .best_practices
                    .iter()
                    .find(|p| p.label.eq_ignore_ascii_case(label))
                    .with_context(|| format!("template has no best practice named {label}"))?;
                form = form.with_practice(practice.clone());
            }
            if let Some(key) = language {
                form = form.with_language(find_language(&key)?.name);
            }
            if let Some(text) = output_validation {
                form = form.with_output_validation(text);
            }
            for path in &files {
                form = form.with_file(read_upload(path).await?);
            }

            let mut request = PromptRequest::new(form).with_template(template_id);
            if enhanced || !techniques.is_empty() {
                request = request.enhanced(techniques);
            }
            let prompt = app.create_prompt(request).await?;
            info!(prompt_id = %prompt.id, "prompt composed");
            println!("{}", prompt.content);
        }
        Command::Enhance { text, techniques } => {
            let enhancer = app
                .enhancer()
                .context("no enhancement provider is configured")?;
            println!("{}", enhancer.enhance(&text, &techniques).await?);
        }
        Command::Import { path } => {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let report = app.import_library(LibraryExport::from_json(&raw)?).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Export { output } => {
            let json = app.export_library().await.to_json_pretty()?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, json)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), "library exported");
                }
                None => println!("{json}"),
            }
        }
        Command::Reset => {
            app.reset_defaults().await?;
            println!("library restored to defaults");
        }
    }

    Ok(())
}

async fn open_app(config: &LibraryConfig) -> Result<LibraryApp> {
    let storage: Arc<dyn StateStorage> = Arc::new(
        FileStateStorage::open(&config.data_dir)
            .await
            .with_context(|| format!("opening {}", config.data_dir.display()))?,
    );
    let mut app = LibraryApp::open(storage)
        .await?
        .with_authenticator(Arc::new(config.authenticator()));

    match config.build_enhancer() {
        Ok(enhancer) => app = app.with_enhancer(enhancer),
        Err(err) => info!(error = %err, "enhancement disabled"),
    }
    Ok(app)
}

async fn read_upload(path: &Path) -> Result<UploadedFile> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(UploadedFile::new(&name, &content))
}
