use anyhow::Result;
use clap::Parser;
use fundus_classifier::{config::Config, image::NormalizationMode, web::serve};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fundus-classifier")]
#[command(about = "Retinal fundus image classification service")]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:8501")]
    bind: String,

    /// Model directory path
    #[arg(long, default_value = "saved_models")]
    models_dir: String,

    /// ONNX model file name inside the model directory
    #[arg(long, default_value = "mobilenet_fundus.onnx")]
    model_file: String,

    /// Class names JSON file name inside the model directory
    #[arg(long, default_value = "class_names.json")]
    class_names_file: String,

    /// Normalization applied when debug mode is off (mobilenet, rescaling, raw)
    #[arg(long, default_value = "mobilenet")]
    default_mode: NormalizationMode,

    /// ONNX Runtime intra-op threads (defaults to 75% of cores)
    #[arg(long)]
    intra_threads: Option<usize>,

    /// Maximum upload size in megabytes
    #[arg(long, default_value_t = 20)]
    max_upload_mb: usize,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable development mode
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志系统
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting fundus classifier service...");
    tracing::info!("Bind address: {}", args.bind);
    tracing::info!("Models directory: {}", args.models_dir);

    let config = Config::new(
        args.bind,
        args.models_dir,
        args.model_file,
        args.class_names_file,
        args.default_mode,
        args.intra_threads,
        args.max_upload_mb,
        args.dev,
    )?;

    serve(config).await?;

    Ok(())
}
