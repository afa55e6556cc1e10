use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use lithophane::config::FileConfig;
use lithophane::domain::{
    CropMode, CropRegion, GrayscaleParameters, Image, Operation, Process,
};
use lithophane::mesh::{StlFormat, estimate_stl_size, validate_mesh};
use lithophane::pipeline::{self, LithophaneSettings};

/// Turn an image into a 3D-printable lithophane STL
///
/// Examples:
///   # 100 x 100 mm lithophane with default thickness (0.8 - 5.0 mm)
///   lithophane photo.jpg
///
///   # Wide panel, softened, printed standing at 10 degrees
///   lithophane photo.jpg --width 150 --height 100 --blur 0.3 --angle 10 -o panel.stl
///
///   # Use only part of the image and keep its aspect ratio
///   lithophane photo.jpg --crop 200,100,800,600 --crop-mode pad
///
///   # Keep the left half of the image, whatever its size
///   lithophane photo.jpg --crop-fraction 0,0,0.5,1
///
///   # Apply a saved process document
///   lithophane photo.jpg --process portrait.json --format ascii
#[derive(Parser, Debug)]
#[command(name = "lithophane")]
#[command(version, about, long_about = None)]
struct Args {
    /// Source image (PNG or JPEG)
    image: PathBuf,

    /// Process document (JSON) with the operation sequence to apply
    #[arg(long, conflicts_with_all = [
        "width", "height", "min_thickness", "max_thickness", "resolution",
        "blur", "angle", "crop_mode", "invert",
    ])]
    process: Option<PathBuf>,

    /// Path to config file (optional, auto-searches lithophane.toml if not provided)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output STL file path (defaults to the image name with .stl)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// STL encoding
    #[arg(long, value_enum)]
    format: Option<StlFormat>,

    /// Width of the lithophane in mm
    #[arg(long)]
    width: Option<f32>,

    /// Height of the lithophane in mm
    #[arg(long)]
    height: Option<f32>,

    /// Thickness of the brightest areas in mm
    #[arg(long)]
    min_thickness: Option<f32>,

    /// Thickness of the darkest areas in mm
    #[arg(long)]
    max_thickness: Option<f32>,

    /// Height field samples per mm
    #[arg(long)]
    resolution: Option<f32>,

    /// Gaussian blur radius (sigma) in mm
    #[arg(long)]
    blur: Option<f32>,

    /// Build angle of the back surface in degrees, 0 for a flat back
    #[arg(long)]
    angle: Option<f32>,

    /// How the crop is fitted onto the lithophane
    #[arg(long, value_enum)]
    crop_mode: Option<CropMode>,

    /// Make bright areas thick and dark areas thin
    #[arg(long)]
    invert: bool,

    /// Crop rectangle in pixels: X,Y,W,H
    #[arg(long, value_parser = parse_crop)]
    crop: Option<CropRegion>,

    /// Crop rectangle as fractions of the image size: X,Y,W,H in [0, 1]
    #[arg(long, value_parser = parse_crop_fraction, conflicts_with = "crop")]
    crop_fraction: Option<[f64; 4]>,

    /// Write the resolved operation sequence to a process document
    #[arg(long)]
    save_process: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn parse_crop(s: &str) -> std::result::Result<CropRegion, String> {
    let parts: Vec<u32> = s
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("crop must be X,Y,W,H in whole pixels: {e}"))?;
    match parts.as_slice() {
        &[x, y, w, h] => Ok(CropRegion::new(x, y, w, h)),
        _ => Err(format!("crop needs 4 values (X,Y,W,H), got {}", parts.len())),
    }
}

fn parse_crop_fraction(s: &str) -> std::result::Result<[f64; 4], String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("crop fraction must be X,Y,W,H as numbers: {e}"))?;
    let fractions: [f64; 4] = parts
        .as_slice()
        .try_into()
        .map_err(|_| format!("crop fraction needs 4 values (X,Y,W,H), got {}", parts.len()))?;
    if let Some(bad) = fractions.iter().find(|v| !(0.0..=1.0).contains(*v)) {
        return Err(format!("crop fraction values must be in [0, 1], got {bad}"));
    }
    Ok(fractions)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let total_start = Instant::now();

    let file_config = match args.config {
        Some(ref config_path) => {
            if !config_path.exists() {
                bail!("Config file not found: {:?}", config_path);
            }
            FileConfig::from_path(config_path)?
        }
        None => FileConfig::load().unwrap_or_default(),
    };
    let verbose = args.verbose || file_config.verbose;
    init_tracing(verbose);

    let operations = match args.process {
        Some(ref path) => {
            let process = Process::load(path)
                .with_context(|| format!("Failed to load process file: {}", path.display()))?;
            process.compile().context("Invalid process document")?
        }
        None => operations_from_flags(&args, &file_config),
    };
    // Fail on unsupported or malformed steps before decoding the image
    let settings = LithophaneSettings::resolve(&operations).context("Invalid operation sequence")?;

    let output_path = args
        .output
        .clone()
        .or_else(|| file_config.output.clone())
        .unwrap_or_else(|| args.image.with_extension("stl"));
    let format = args.format.unwrap_or(file_config.format);

    println!("lithophane - Image to STL Generator");
    println!("===================================");
    println!();

    if verbose {
        let p = &settings.params;
        println!("Configuration:");
        println!("  Image: {}", args.image.display());
        println!("  Size: {}mm x {}mm", p.width_mm, p.height_mm);
        println!(
            "  Thickness: {}mm (bright) -> {}mm (dark)",
            p.min_thickness_mm, p.max_thickness_mm
        );
        println!("  Resolution: {} px/mm", p.resolution_px_per_mm);
        println!("  Blur: {}mm", p.blur_mm);
        println!("  Build angle: {} deg", p.build_angle_deg);
        println!("  Crop mode: {:?}", p.crop_mode);
        println!("  Invert: {}", settings.invert);
        if let Some(crop) = &args.crop {
            println!("  Crop: {}x{} at ({}, {})", crop.w, crop.h, crop.x, crop.y);
        }
        if let Some([x, y, w, h]) = args.crop_fraction {
            println!("  Crop: {w} x {h} of the image at ({x}, {y})");
        }
        println!("  Output: {} ({:?})", output_path.display(), format);
        println!();
    }

    if let Some(ref path) = args.save_process {
        save_process(path, &args.image, &operations)?;
        println!("Saved process: {}", path.display());
    }

    let spinner = create_spinner("Loading image...");
    let start = Instant::now();
    let decoded = image::open(&args.image)
        .with_context(|| format!("Failed to open image: {}", args.image.display()))?;
    let source = Image::from(&decoded);
    spinner.finish_with_message(format!(
        "Loaded {}x{} image [{:.1}s]",
        source.width(),
        source.height(),
        start.elapsed().as_secs_f32()
    ));

    let crop = match args.crop_fraction {
        Some([x, y, w, h]) => Some(CropRegion::from_normalized(&source, x, y, w, h)),
        None => args.crop,
    };

    let spinner = create_spinner("Building lithophane mesh...");
    let start = Instant::now();
    let output = match pipeline::build(&source, crop, &operations) {
        Ok(output) => output,
        Err(e) => {
            spinner.abandon_with_message("Build failed");
            return Err(e).context("Failed to build lithophane");
        }
    };
    spinner.finish_with_message(format!(
        "Generated {}x{} height field, {} triangles [{:.1}s]",
        output.height_field.width(),
        output.height_field.height(),
        output.stats.triangle_count,
        start.elapsed().as_secs_f32()
    ));

    let spinner = create_spinner("Validating and writing STL file...");
    let start = Instant::now();
    let report = validate_mesh(&output.mesh);
    if verbose {
        for warning in &report.warnings {
            println!("  Warning: {}", warning);
        }
    }

    pipeline::export(&output.mesh, &output_path, format).context("Failed to write STL file")?;
    let file_size = match format {
        StlFormat::Binary => estimate_stl_size(output.stats.triangle_count) as u64,
        StlFormat::Ascii => std::fs::metadata(&output_path).map(|m| m.len()).unwrap_or(0),
    };

    spinner.finish_with_message(format!(
        "Wrote {} triangles ({:.1} KB) [{:.1}s]",
        output.stats.triangle_count,
        file_size as f64 / 1024.0,
        start.elapsed().as_secs_f32()
    ));

    let [x, y, z] = output.stats.extents();
    println!();
    println!(
        "Done! Total time: {:.1}s",
        total_start.elapsed().as_secs_f32()
    );
    println!();
    println!("Output: {}", output_path.display());
    println!("  Dimensions: {:.2} x {:.2} x {:.2} mm", x, y, z);
    println!("  Triangles: {}", output.stats.triangle_count);
    println!("  {}", report.summary());

    Ok(())
}

/// Operation sequence described by flags and the config file
fn operations_from_flags(args: &Args, config: &FileConfig) -> Vec<Operation> {
    let mut params = config.parameters();
    if let Some(v) = args.width {
        params.width_mm = v;
    }
    if let Some(v) = args.height {
        params.height_mm = v;
    }
    if let Some(v) = args.min_thickness {
        params.min_thickness_mm = v;
    }
    if let Some(v) = args.max_thickness {
        params.max_thickness_mm = v;
    }
    if let Some(v) = args.resolution {
        params.resolution_px_per_mm = v;
    }
    if let Some(v) = args.blur {
        params.blur_mm = v;
    }
    if let Some(v) = args.angle {
        params.build_angle_deg = v;
    }
    if let Some(mode) = args.crop_mode {
        params.crop_mode = mode;
    }

    vec![
        Operation::Grayscale(GrayscaleParameters {
            invert: args.invert || config.invert,
        }),
        Operation::SetLithophaneParameters(params),
    ]
}

fn save_process(path: &Path, image: &Path, operations: &[Operation]) -> Result<()> {
    let name = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled Process".to_string());
    let mut process = Process::new(name);
    for op in operations {
        process.push(op);
    }
    process
        .save(path)
        .with_context(|| format!("Failed to save process file: {}", path.display()))
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "lithophane=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}
