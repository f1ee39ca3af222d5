use digit_pad::core_modules::image_helper::image_helper::{open_image, save_rgba};
use digit_pad::{DrawSession, LinearClassifier, PadConfig, PadState, ReducedMatrix};
use std::env;
use tracing_subscriber::EnvFilter;

/// Gray ramp from empty to full ink, one character per reduced cell.
const SHADES: &[u8] = b" .:-=+*#%@";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        println!("Usage: digit_tester <input_image_path> <output_png_path> [model_json_path]");
        return Ok(());
    }
    let input_path = &args[1];
    let output_path = &args[2];
    let model_path = args.get(3);

    // --- 2. Pad Initialization ---
    // The debug view is the whole point of this tool, so it is always on.
    let config = PadConfig {
        can_visualize_as_28x28: true,
        ..PadConfig::desktop().from_env()?
    };
    let mut session = DrawSession::new(config)?;
    tracing::info!(input = %input_path, canvas = session.config().canvas_side(), "rendering upload onto pad");

    // --- 3. Render The Upload Onto The Pad ---
    let image = open_image(input_path)?;
    session.upload_image(&image)?;

    // --- 4. Report The Reduced Grid ---
    if let Some(reduction) = session.last_reduction() {
        println!("{}", ascii_grid(&reduction.reduced));
    }

    // --- 5. Write The 28x28 Preview ---
    if let Some(preview) = session.visualization() {
        let side = session.config().canvas_side() as u32;
        save_rgba(output_path, side, &preview)?;
        println!("Preview saved to {}", output_path);
    }

    // --- 6. Optional Prediction ---
    if let Some(model_path) = model_path {
        tracing::info!(model = %model_path, "running prediction");
        let classifier = LinearClassifier::from_path(model_path);
        match session.predict_now(&classifier).await? {
            PadState::Showing(prediction) => {
                println!("{}", prediction.label());
                for entry in prediction.ranked() {
                    println!("  {}: {:.4}%", entry.digit, entry.confidence);
                }
            }
            PadState::Failed(message) => println!("Prediction failed: {}", message),
            other => println!("Unexpected pad state: {:?}", other),
        }
    }

    Ok(())
}

/// Renders a reduced grid as text, darker characters for more ink.
fn ascii_grid(reduced: &ReducedMatrix) -> String {
    reduced
        .to_rows()
        .iter()
        .map(|row| {
            row.iter()
                .map(|&v| {
                    let level = (v.clamp(0.0, 255.0) / 255.0 * (SHADES.len() - 1) as f32).round();
                    SHADES[level as usize] as char
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
