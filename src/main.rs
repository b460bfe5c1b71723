//! # 模板图片生成客户端 — 命令行入口
//!
//! 本文件只负责参数解析与组件装配，业务逻辑见 `lib.rs` 架构文档。

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use template_studio::api::{HttpApiClient, TemplateBackend};
use template_studio::artifact::Artifact;
use template_studio::config::ClientConfig;
use template_studio::context::UserContext;
use template_studio::error::AppError;
use template_studio::export::{ArtifactExporter, DirectoryBlobSink, SystemClipboard};
use template_studio::notify::LogNotifier;
use template_studio::records::HistoryRecorder;
use template_studio::session::{GenerationOutcome, GenerationSession, Trigger};

#[derive(Parser, Debug)]
#[command(name = "template-studio", version)]
struct Cli {
    /// JSON settings file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List templates with their preview sizes.
    List,
    /// Generate one template and save the result.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Template category.
    category: String,

    /// Template name.
    name: String,

    /// Placeholder value, `key=value`. Repeatable.
    #[arg(short = 'p', long = "param", value_parser = parse_key_value)]
    params: Vec<(String, String)>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = FormatChoice::Svg)]
    format: FormatChoice,

    /// JPEG quality (1-100).
    #[arg(long)]
    quality: Option<u8>,

    /// Output directory.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Signed-in user id; enables history recording.
    #[arg(long)]
    user: Option<String>,

    /// Also copy the SVG markup to the clipboard.
    #[arg(long)]
    copy: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FormatChoice {
    Svg,
    Png,
    Jpeg,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("参数格式应为 key=value：{}", raw))?;
    if key.trim().is_empty() {
        return Err(format!("参数名不能为空：{}", raw));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("❌ {} ({})", err, err.code());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = match &cli.config {
        Some(path) => ClientConfig::load_from_path(path),
        None => ClientConfig::default(),
    }
    .with_env_overrides();
    config.validate()?;

    let client = Arc::new(HttpApiClient::new(&config).map_err(|e| AppError::Config(e.to_string()))?);
    log::info!("⚙️ 后端地址: {}", client.base_url());

    match cli.cmd {
        Command::List => list(&config, client.as_ref()).await,
        Command::Render(args) => render(&config, client, args).await,
    }
}

async fn list(config: &ClientConfig, client: &dyn TemplateBackend) -> Result<(), AppError> {
    let templates = client
        .fetch_template_list()
        .await
        .map_err(|e| AppError::GenerationFailed(format!("获取模板列表失败：{}", e)))?;

    for template in &templates {
        let preview = config.preview_budget.fit(template.dimensions);
        let modal = config.modal_budget.fit(template.dimensions);
        println!(
            "{:<40} {:>5}x{:<5} {:>2} placeholders  preview {}x{}  modal {}x{}",
            template.identity().to_string(),
            template.dimensions.width,
            template.dimensions.height,
            template.placeholders.len(),
            preview.width,
            preview.height,
            modal.width,
            modal.height
        );
    }
    log::info!("📋 共 {} 个模板", templates.len());
    Ok(())
}

async fn render(config: &ClientConfig, client: Arc<HttpApiClient>, args: RenderArgs) -> Result<(), AppError> {
    let templates = client
        .fetch_template_list()
        .await
        .map_err(|e| AppError::GenerationFailed(format!("获取模板列表失败：{}", e)))?;
    let template = templates
        .into_iter()
        .find(|t| t.category == args.category && t.name == args.name)
        .ok_or_else(|| AppError::GenerationFailed(format!("未找到模板 {}/{}", args.category, args.name)))?;
    let identity = template.identity();

    let user = UserContext::signed_in(args.user.unwrap_or_default());
    let notifier = Arc::new(LogNotifier);
    let history = Arc::new(HistoryRecorder::new(client.clone(), user.clone()));
    let out_dir = args.out.unwrap_or_else(|| config.resolved_download_dir());

    let session = GenerationSession::new(
        template,
        client.clone(),
        user,
        config,
        notifier.clone(),
        Some(history.clone()),
    );
    let exporter = ArtifactExporter::new(
        config,
        client.clone(),
        Arc::new(DirectoryBlobSink::new(out_dir)),
        Arc::new(SystemClipboard::from_config(config)),
        notifier,
        Some(history.clone()),
    );

    let mut latest = None;
    for (key, value) in args.params {
        latest = session.on_field_change(&key, value).await?;
    }

    let saved = match args.format {
        FormatChoice::Svg => {
            let outcome = match latest {
                Some(outcome @ GenerationOutcome::Committed(_)) => outcome,
                _ => session.generate(Trigger::Explicit).await,
            };
            let artifact = match outcome {
                GenerationOutcome::Committed(artifact) => artifact,
                GenerationOutcome::Failed(err) => return Err(err),
                GenerationOutcome::Discarded => {
                    return Err(AppError::GenerationFailed("生成结果已过期".to_string()));
                }
            };
            save_vector(&exporter, &artifact, &identity.name, args.copy).await?
        }
        FormatChoice::Png => exporter.download_png(&identity, &session.parameters(), None).await?,
        FormatChoice::Jpeg => {
            exporter
                .download_jpeg(&identity, &session.parameters(), args.quality)
                .await?
        }
    };

    history.flush().await;
    println!("{}", saved.display());
    Ok(())
}

/// 先落盘再复制：剪贴板失败只告警，不影响已保存的文件。
async fn save_vector(
    exporter: &ArtifactExporter,
    artifact: &Artifact,
    suggested_name: &str,
    copy: bool,
) -> Result<PathBuf, AppError> {
    let saved = exporter.download(artifact, suggested_name)?;
    if copy {
        if let Err(err) = exporter.copy_to_clipboard(artifact).await {
            log::warn!("⚠️ 复制失败，文件已保存 - {} ({})", err, err.code());
        }
    }
    Ok(saved)
}
