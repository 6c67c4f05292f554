// ============================================================================
// Visionary CLI — headless batch processing of the local (non-AI) tools
// ============================================================================
//
// Usage examples:
//   visionary -i photo.png --crop 0.1,0.1,0.8,0.8 -o cropped.png
//   visionary -i "shots/*.jpg" --preset film1 --intensity 60 --output-dir graded/
//   visionary -i photo.png --mask mask.png --pad-ratio auto -o cutout.png
//   visionary -i photo.png --info
//   visionary -i "shots/*.png" --info --json
//
// Steps always run in the order crop -> mask -> filter -> pad. Nothing here
// talks to a generation service.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::components::crop::CropRect;
use crate::error::{EditorError, Result};
use crate::io::{SaveFormat, encode_and_write, load_image};
use crate::ops::aspect::AspectRatio;
use crate::ops::filters::{FilterChain, apply_filter_blend};
use crate::ops::luts::find_preset;
use crate::ops::mask::apply_luminance_mask;
use crate::ops::palette::ImageInfo;
use crate::ops::transform::{crop, pad_to_aspect_ratio};
use crate::raster::RasterImage;
use crate::settings::EditorSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Visionary headless image processor.
#[derive(Parser, Debug)]
#[command(
    name = "visionary",
    about = "Visionary headless batch image processor",
    long_about = "Crop, mask, colour-grade and pad image files without opening the editor.\n\
                  Steps run in the fixed order crop, mask, filter, pad.\n\n\
                  Example:\n  \
                  visionary -i photo.png --crop 0.1,0.1,0.8,0.8 -o out.png\n  \
                  visionary -i *.jpg --preset film1 --output-dir graded/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Normalized crop rectangle `x,y,w,h` (fractions of the image).
    #[arg(long, value_name = "X,Y,W,H", value_parser = parse_rect)]
    pub crop: Option<CropRect>,

    /// CSS-style filter expression, e.g. "sepia(0.4) contrast(1.2)".
    #[arg(long, value_name = "EXPR", conflicts_with = "preset")]
    pub filter: Option<String>,

    /// Built-in look by id, e.g. "film1" or "noir".
    #[arg(long, value_name = "ID")]
    pub preset: Option<String>,

    /// Filter strength in percent (0-100).
    #[arg(long, default_value_t = 100.0, value_name = "0-100")]
    pub intensity: f32,

    /// Pad onto black to an aspect ratio (1:1, 3:4, 4:3, 9:16, 16:9 or auto).
    #[arg(long, value_name = "RATIO")]
    pub pad_ratio: Option<String>,

    /// Silhouette mask; its luminance becomes the image's alpha.
    #[arg(long, value_name = "FILE")]
    pub mask: Option<PathBuf>,

    /// Where the image sits inside the mask, `x,y,w,h` normalized.
    #[arg(long, value_name = "X,Y,W,H", value_parser = parse_inset, requires = "mask")]
    pub mask_inset: Option<CropRect>,

    /// Print size, format and palette of each result.
    #[arg(long)]
    pub info: bool,

    /// Print `--info` reports as one JSON object per line.
    #[arg(long, requires = "info")]
    pub json: bool,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png or jpeg. Inferred from --output, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1-100, default 90).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Per-file timing and debug logging on stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

/// What to do to every input, resolved once up front.
#[derive(Debug)]
struct Pipeline {
    crop: Option<CropRect>,
    mask: Option<(RasterImage, CropRect)>,
    filter: Option<(String, f32)>,
    pad: Option<PadTarget>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum PadTarget {
    Auto,
    Fixed(AspectRatio),
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    let destination = match Destination::from_args(&args, inputs.len()) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let pipeline = match build_pipeline(&args) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let save_format = match parse_format(args.format.as_deref(), args.output.as_deref()) {
        Some(f) => f,
        None => {
            eprintln!("error: unsupported output format (use png or jpeg).");
            return ExitCode::FAILURE;
        }
    };

    if let Destination::Directory(dir) = &destination
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let settings = EditorSettings::load();
    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let result = load_image(input_path).and_then(|img| run_one(img, &pipeline));
        let image = match result {
            Ok(img) => img,
            Err(e) => {
                eprintln!("  error: {}", e);
                log::error!("{}: {}", input_path.display(), e);
                any_failure = true;
                continue;
            }
        };

        if args.info {
            match ImageInfo::of(&image, &settings.palette_options()).and_then(|info| info_line(&info, args.json)) {
                Ok(line) => println!("{}", line),
                Err(e) => {
                    eprintln!("  error: {}", e);
                    any_failure = true;
                    continue;
                }
            }
        }

        let output_path = match destination.path_for(input_path, save_format) {
            Ok(Some(path)) => path,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
                continue;
            }
        };

        let saved = image
            .to_rgba()
            .and_then(|px| encode_and_write(&px, &output_path, save_format, args.quality));
        match saved {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  -> {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: save failed: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn build_pipeline(args: &CliArgs) -> Result<Pipeline> {
    let filter = match (&args.filter, &args.preset) {
        (Some(expr), _) => {
            FilterChain::parse(expr)?;
            Some((expr.clone(), args.intensity))
        }
        (None, Some(id)) => {
            let preset = find_preset(id).ok_or_else(|| EditorError::Config(format!("unknown preset '{}'", id)))?;
            Some((preset.filter.to_string(), args.intensity))
        }
        (None, None) => None,
    };

    let pad = match args.pad_ratio.as_deref() {
        None => None,
        Some(s) if s.eq_ignore_ascii_case("auto") => Some(PadTarget::Auto),
        Some(s) => Some(PadTarget::Fixed(
            AspectRatio::parse(s).ok_or_else(|| EditorError::Config(format!("unsupported aspect ratio '{}'", s)))?,
        )),
    };

    let mask = match &args.mask {
        Some(path) => Some((load_image(path)?, args.mask_inset.unwrap_or(CropRect::FULL))),
        None => None,
    };

    Ok(Pipeline { crop: args.crop, mask, filter, pad })
}

fn run_one(mut image: RasterImage, pipeline: &Pipeline) -> Result<RasterImage> {
    // -- Step 1: Crop ----------------------------------------------------
    if let Some(rect) = &pipeline.crop {
        image = crop(&image, rect)?;
    }

    // -- Step 2: Mask ----------------------------------------------------
    if let Some((mask, inset)) = &pipeline.mask {
        image = apply_luminance_mask(&image, mask, inset)?;
    }

    // -- Step 3: Filter --------------------------------------------------
    if let Some((expr, intensity)) = &pipeline.filter {
        image = apply_filter_blend(&image, expr, *intensity)?;
    }

    // -- Step 4: Pad -----------------------------------------------------
    if let Some(target) = pipeline.pad {
        let ratio = match target {
            PadTarget::Auto => AspectRatio::closest(image.width(), image.height()),
            PadTarget::Fixed(r) => r,
        };
        image = pad_to_aspect_ratio(&image, ratio.value())?.image;
    }

    Ok(image)
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_four(s: &str) -> std::result::Result<[f64; 4], String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("'{}': {}", s, e))?;
    parts
        .try_into()
        .map_err(|_| format!("'{}': expected four comma-separated numbers", s))
}

/// `x,y,w,h` as a clamped [`CropRect`].
fn parse_rect(s: &str) -> std::result::Result<CropRect, String> {
    let [x, y, w, h] = parse_four(s)?;
    Ok(CropRect::new(x, y, w, h).clamped())
}

/// `x,y,w,h` locating the image inside its mask. Clipped to the unit square
/// but, unlike a crop, allowed to be arbitrarily thin.
fn parse_inset(s: &str) -> std::result::Result<CropRect, String> {
    let [x, y, w, h] = parse_four(s)?;
    if [x, y, w, h].iter().any(|v| !v.is_finite()) {
        return Err(format!("'{}': values must be finite", s));
    }
    let (x, y) = (x.clamp(0.0, 1.0), y.clamp(0.0, 1.0));
    let (w, h) = (w.min(1.0 - x), h.min(1.0 - y));
    if w <= 0.0 || h <= 0.0 {
        return Err(format!("'{}': inset has no area", s));
    }
    Ok(CropRect::new(x, y, w, h))
}

/// Literal paths first, then glob matches; each file listed once, in the
/// order first named.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    patterns
        .iter()
        .flat_map(|pattern| expand_pattern(pattern))
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

fn expand_pattern(pattern: &str) -> Vec<PathBuf> {
    let literal = PathBuf::from(pattern);
    if literal.is_file() {
        return vec![literal];
    }
    let matches: Vec<PathBuf> = match glob::glob(pattern) {
        Ok(paths) => paths.filter_map(|entry| entry.ok()).filter(|p| p.is_file()).collect(),
        Err(e) => {
            eprintln!("warning: invalid glob '{}': {}", pattern, e);
            return Vec::new();
        }
    };
    if matches.is_empty() {
        eprintln!("warning: '{}' matched no image files.", pattern);
    }
    matches
}

fn info_line(info: &ImageInfo, json: bool) -> Result<String> {
    if json {
        return serde_json::to_string(info).map_err(|e| EditorError::Encode(e.to_string()));
    }
    Ok(format!(
        "  {}x{} {} {} palette {}",
        info.width,
        info.height,
        info.format,
        info.size,
        info.palette.join(" ")
    ))
}

/// `--format` wins, then the output extension, then PNG. `None` for an
/// explicit but unsupported format.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> Option<SaveFormat> {
    if let Some(f) = format_arg {
        return SaveFormat::parse(f);
    }
    Some(output.and_then(SaveFormat::from_path).unwrap_or_default())
}

/// Where each processed image ends up.
#[derive(Clone, Debug, PartialEq)]
enum Destination {
    /// `--info` with no output flags: print, write nothing.
    Report,
    /// `-o FILE`, single input only.
    File(PathBuf),
    /// `--output-dir DIR`, named after the input.
    Directory(PathBuf),
    /// Next to the input; `_edited` is appended when the name would collide.
    Beside,
}

impl Destination {
    fn from_args(args: &CliArgs, input_count: usize) -> Result<Destination> {
        match (&args.output, &args.output_dir) {
            (_, Some(dir)) => Ok(Destination::Directory(dir.clone())),
            (Some(_), None) if input_count > 1 => Err(EditorError::Config(format!(
                "{} input files given but --output names a single file; use --output-dir for batches",
                input_count
            ))),
            (Some(file), None) => Ok(Destination::File(file.clone())),
            (None, None) if args.info => Ok(Destination::Report),
            (None, None) => Ok(Destination::Beside),
        }
    }

    /// Output path for `input`, `None` when only reporting.
    fn path_for(&self, input: &Path, format: SaveFormat) -> Result<Option<PathBuf>> {
        let file_name = |suffix: &str| -> Result<String> {
            let stem = input
                .file_stem()
                .ok_or_else(|| EditorError::Config(format!("'{}' has no file name", input.display())))?;
            Ok(format!("{}{}.{}", stem.to_string_lossy(), suffix, format.extension()))
        };
        let path = match self {
            Destination::Report => return Ok(None),
            Destination::File(path) => path.clone(),
            Destination::Directory(dir) => dir.join(file_name("")?),
            Destination::Beside => {
                let parent = input.parent().unwrap_or(Path::new("."));
                let same = parent.join(file_name("")?);
                if same == input { parent.join(file_name("_edited")?) } else { same }
            }
        };
        Ok(Some(path))
    }
}
