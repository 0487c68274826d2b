//! Check engine and font availability.

use clipburn_common::config::{config_file_path, AppConfig};
use clipburn_model::style::StyleDescriptor;
use clipburn_raster::{FontQuery, SystemFontResolver};
use clipburn_render_engine::EngineConfig;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Clipburn System Check");
    println!("{}", "=".repeat(50));
    println!("Config: {}", config_file_path().display());
    println!();

    let mut ready = true;
    match EngineConfig::resolve(&config.engine) {
        Ok(engine) => {
            println!("[OK] ffmpeg: {}", engine.ffmpeg.display());
            println!("     {}", engine.version);
            match &engine.ffprobe {
                Some(path) => println!("[OK] ffprobe: {}", path.display()),
                None => println!("[WARN] ffprobe not found; frame rate defaults to 30"),
            }
        }
        Err(err) => {
            ready = false;
            println!("[FAIL] {err}");
        }
    }

    let resolver = SystemFontResolver::default();
    println!("[OK] {} font faces installed", resolver.face_count());
    let defaults = [
        ("title", StyleDescriptor::title_default()),
        ("caption", StyleDescriptor::caption_default()),
        ("credit", StyleDescriptor::credit_default()),
    ];
    for (element, style) in defaults {
        match resolver.find(&FontQuery::for_style(&style)) {
            Some(face) => println!("[OK] {element} font: {face}"),
            None => println!(
                "[WARN] {element} font {} not installed; a fallback family will be used",
                style.font_family
            ),
        }
    }

    println!();
    if ready {
        println!("Clipburn is ready to render.");
    } else {
        println!("The render engine is missing. See above for details.");
    }

    Ok(())
}
