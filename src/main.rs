mod capture;
mod ebml;
mod shm;
mod video;

use clap::Parser;

use video::Canvas;

/// Stream an X11 window as uncompressed BGRA video in a Matroska container
/// on standard output.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Nominal frame rate
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..))]
    fps: u32,

    /// Window to capture, decimal or 0x-prefixed hexadecimal
    #[arg(long = "win", value_parser = parse_window)]
    window: u32,

    /// Canvas size as WxH; defaults to the initial window size
    #[arg(long, value_parser = parse_size)]
    size: Option<Canvas>,

    /// Emit a constant-frame-rate stream (default: variable frame rate)
    #[arg(long)]
    cfr: bool,
}

fn parse_window(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid window id {s:?}: {e}"))
}

fn parse_size(s: &str) -> Result<Canvas, String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("invalid size {s:?}, expected WxH"))?;
    let width = w.parse().map_err(|e| format!("invalid width {w:?}: {e}"))?;
    let height = h.parse().map_err(|e| format!("invalid height {h:?}: {e}"))?;
    if width == 0 || height == 0 {
        return Err("size must be non-zero".into());
    }
    Ok(Canvas { width, height })
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let tags = vec![
        (
            "DATE_RECORDED".to_owned(),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S %z").to_string(),
        ),
        ("WINDOW_ID".to_owned(), format!("{:#x}", args.window)),
    ];

    let config = capture::Config {
        window: args.window,
        fps: args.fps,
        size: args.size,
        cfr: args.cfr,
        tags,
    };
    if let Err(e) = capture::run(config) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_ids_parse_in_both_bases() {
        assert_eq!(parse_window("23068730").unwrap(), 23068730);
        assert_eq!(parse_window("0x160003a").unwrap(), 0x160003a);
        assert_eq!(parse_window("0X1A").unwrap(), 0x1A);
        assert!(parse_window("zz").is_err());
    }

    #[test]
    fn sizes_parse_width_then_height() {
        let canvas = parse_size("800x600").unwrap();
        assert_eq!(canvas, Canvas { width: 800, height: 600 });
        assert!(parse_size("800").is_err());
        assert!(parse_size("0x600").is_err());
        assert!(parse_size("800x").is_err());
    }
}
