//! # feedback-cli
//!
//! 无画面的反馈播放器宿主，用来试听（看）一份反馈描述。
//!
//! ## 用法
//!
//! ```bash
//! # 按 60 fps 模拟 3 秒，打印时间线
//! cargo run -p feedback-cli -- run feedback-cli/demos/hit.json
//! cargo run -p feedback-cli -- run feedback-cli/demos/slowmo.json --fps 30 --seed 7
//! cargo run -p feedback-cli -- run feedback-cli/demos/hit.json --reverse --intensity 0.5
//!
//! # 静态检查
//! cargo run -p feedback-cli -- check feedback-cli/demos/beat.json
//!
//! # 查看序列的量化结果
//! cargo run -p feedback-cli -- quantize sequence.json --bpm 120
//! ```

mod config;
mod easing;
mod effects;
mod simulate;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use feedback_runtime::{
    Diagnostic, DiagnosticLevel, DiagnosticResult, FeedbackRegistry, PlayerId, Sequence,
    analyze_player, analyze_setup,
};
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;
use crate::simulate::{DemoFile, SimulationOptions, simulate};

#[derive(Parser)]
#[command(name = "feedback-cli")]
#[command(about = "反馈播放器的无画面宿主")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件（默认：feedback-cli.json）
    #[arg(short, long, default_value = "feedback-cli.json", global = true)]
    config: PathBuf,

    /// 日志过滤，覆盖配置文件（EnvFilter 语法）
    #[arg(long, global = true)]
    log: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 模拟播放并打印时间线
    Run {
        /// 演示文件
        file: PathBuf,

        /// 模拟时长（秒）
        #[arg(short, long)]
        seconds: Option<f32>,

        /// 帧率
        #[arg(long)]
        fps: Option<u32>,

        /// 随机种子
        #[arg(long)]
        seed: Option<u64>,

        /// 反向播放
        #[arg(short, long)]
        reverse: bool,

        /// 播放强度
        #[arg(short, long)]
        intensity: Option<f32>,

        /// 初始时钟缩放
        #[arg(long, default_value = "1.0")]
        time_scale: f32,
    },

    /// 检查演示文件（描述 + 构建后的播放器）
    Check {
        /// 演示文件
        file: PathBuf,
    },

    /// 打印序列的量化结果
    Quantize {
        /// 序列文件
        file: PathBuf,

        /// 覆盖目标 BPM
        #[arg(long)]
        bpm: Option<u32>,
    },
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        eprintln!("feedback-cli error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(&cli.config);
    init_tracing(cli.log.as_deref().unwrap_or(&config.log_filter))?;

    match cli.command {
        Commands::Run {
            file,
            seconds,
            fps,
            seed,
            reverse,
            intensity,
            time_scale,
        } => {
            let options = SimulationOptions {
                seconds: seconds.unwrap_or(config.seconds),
                fps: fps.unwrap_or(config.fps),
                seed: seed.or(config.seed),
                reverse,
                intensity,
                time_scale,
            };
            run_demo(&file, &options)
        }
        Commands::Check { file } => check_file(&file),
        Commands::Quantize { file, bpm } => quantize_file(&file, bpm),
    }
}

fn init_tracing(filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(filter).with_context(|| format!("无效的日志过滤: {filter}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn load_demo(path: &Path) -> anyhow::Result<DemoFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取 {}", path.display()))?;
    DemoFile::from_json(&content)
}

//=============================================================================
// run
//=============================================================================

fn run_demo(path: &Path, options: &SimulationOptions) -> anyhow::Result<()> {
    let demo = load_demo(path)?;
    let report = simulate(&demo, &effects::registry(), options)?;

    for diagnostic in &report.diagnostics.diagnostics {
        eprintln!("{diagnostic}");
    }
    for entry in &report.timeline {
        println!("{entry}");
    }

    println!();
    println!(
        "seed {} | {} 条事件 | {} 个信号 | {}",
        report.seed,
        report.timeline.len(),
        report.signal_count(),
        if report.completed { "已完成" } else { "未完成" }
    );
    for (name, position) in &report.scene.objects {
        println!("  {name}: {position}");
    }
    Ok(())
}

//=============================================================================
// check
//=============================================================================

/// 检查描述本身，能构建时再检查构建出的播放器
fn check_demo(source: &str, demo: &DemoFile, registry: &FeedbackRegistry) -> DiagnosticResult {
    let mut result = analyze_setup(source, &demo.setup, registry);
    if result.has_errors() {
        return result;
    }

    match demo.setup.build(PlayerId::new(1), registry) {
        Ok(built) => {
            let mut player = built.player;
            player.initialize();
            // 构建时的未注册类型已由 analyze_setup 报告
            result.merge(analyze_player(&player));
        }
        Err(e) => {
            result.push(Diagnostic::error(source, e.to_string()));
        }
    }
    result
}

fn check_file(path: &Path) -> anyhow::Result<()> {
    let demo = load_demo(path)?;
    let source = path.display().to_string();
    let result = check_demo(&source, &demo, &effects::registry());

    for diagnostic in result.filter_by_level(DiagnosticLevel::Info) {
        eprintln!("{diagnostic}");
    }
    eprintln!(
        "\n==> {} 个错误, {} 个警告",
        result.error_count(),
        result.warn_count()
    );

    if result.has_errors() {
        anyhow::bail!("检查发现错误");
    }
    Ok(())
}

//=============================================================================
// quantize
//=============================================================================

fn quantize_sequence(mut sequence: Sequence, bpm: Option<u32>) -> anyhow::Result<Sequence> {
    if let Some(bpm) = bpm {
        sequence.target_bpm = bpm;
    }
    sequence.sort_original_sequence();
    sequence
        .quantize_original_sequence()
        .context("量化失败")?;
    Ok(sequence)
}

/// 每条轨道一行，`x` 为命中，`.` 为空拍
fn render_grid(sequence: &Sequence) -> Vec<String> {
    sequence
        .tracks
        .iter()
        .zip(&sequence.quantized_sequence)
        .map(|(track, beats)| {
            let cells: String = beats
                .iter()
                .map(|note| if note.id == track.id { 'x' } else { '.' })
                .collect();
            let name = if track.name.is_empty() {
                format!("#{}", track.id)
            } else {
                track.name.clone()
            };
            format!("{name:<8} {cells}")
        })
        .collect()
}

fn quantize_file(path: &Path, bpm: Option<u32>) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取 {}", path.display()))?;
    let sequence: Sequence = serde_json::from_str(&content).context("序列文件解析失败")?;
    let sequence = quantize_sequence(sequence, bpm)?;

    println!(
        "{} | {} bpm | 长度 {:.3}s | {} 拍",
        sequence.name,
        sequence.target_bpm,
        sequence.length,
        sequence.quantized_beat_count()
    );
    for line in render_grid(&sequence) {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMOS: [(&str, &str); 3] = [
        ("hit.json", include_str!("../demos/hit.json")),
        ("slowmo.json", include_str!("../demos/slowmo.json")),
        ("beat.json", include_str!("../demos/beat.json")),
    ];

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "feedback-cli",
            "run",
            "hit.json",
            "--fps",
            "30",
            "--reverse",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Run {
                fps: Some(30),
                reverse: true,
                ..
            }
        ));
        assert_eq!(cli.config, PathBuf::from("feedback-cli.json"));
    }

    #[test]
    fn test_demos_have_no_errors() {
        let registry = effects::registry();
        for (name, json) in DEMOS {
            let demo = DemoFile::from_json(json).unwrap();
            let result = check_demo(name, &demo, &registry);
            assert!(!result.has_errors(), "{name}: {:?}", result.diagnostics);
            assert_eq!(result.warn_count(), 0, "{name}: {:?}", result.diagnostics);
        }
    }

    #[test]
    fn test_demos_complete() {
        let registry = effects::registry();
        for (name, json) in DEMOS {
            let demo = DemoFile::from_json(json).unwrap();
            let options = SimulationOptions {
                seconds: 6.0,
                seed: Some(0),
                ..SimulationOptions::default()
            };
            let report = simulate(&demo, &registry, &options).unwrap();
            assert!(report.completed, "{name} 未完成");
            assert!(report.signal_count() > 0, "{name} 没有信号");
        }
    }

    #[test]
    fn test_check_reports_unknown_type() {
        let demo = DemoFile::from_json(r#"{ "feedbacks": [ { "type": "rumble" } ] }"#).unwrap();
        let result = check_demo("inline", &demo, &effects::registry());
        assert!(!result.has_errors());
        assert!(result.warn_count() >= 1);
    }

    #[test]
    fn test_quantize_grid() {
        let sequence: Sequence = serde_json::from_str(
            r#"{
                "name": "beat",
                "notes": [
                    { "timestamp": 0.5, "id": 2 },
                    { "timestamp": 0.0, "id": 1 },
                    { "timestamp": 1.0, "id": 1 }
                ],
                "tracks": [{ "id": 1, "name": "kick" }, { "id": 2 }],
                "end_silence_duration": 0.5
            }"#,
        )
        .unwrap();
        let sequence = quantize_sequence(sequence, Some(120)).unwrap();

        insta::assert_debug_snapshot!(render_grid(&sequence), @r##"
        [
            "kick     x.x",
            "#2       .x.",
        ]
        "##);
    }
}
