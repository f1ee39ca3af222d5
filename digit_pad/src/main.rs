// This file is an example of how to use the `digit_pad` library: it draws a
// vertical bar on an in-memory pad, reduces it, and prints the 28x28 grid.

use digit_pad::{DrawSession, PadConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), digit_pad::PadError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = PadConfig::desktop().from_env()?;
    let mut session = DrawSession::new(config)?;
    let center = session.config().canvas_side() as f32 / 2.0;
    let height = session.config().canvas_side() as f32;

    session.pointer_down(center, height * 0.2);
    session.pointer_move(center, height * 0.8);
    if let Some(request) = session.pointer_up()? {
        tracing::info!(request = request.id.sequence(), shape = ?request.batch.shape(), "drawing reduced");
    }

    if let Some(reduction) = session.last_reduction() {
        for row in reduction.reduced.to_rows() {
            let line: String = row
                .iter()
                .map(|&v| if v >= 128.0 { '#' } else if v > 0.0 { '+' } else { '.' })
                .collect();
            println!("{line}");
        }
    }
    Ok(())
}
