//! soilcarbon CLI - yearly composites and soil-carbon change by land-cover transition

mod config;
mod manifest;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array3;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use soilcarbon_algorithms::imagery::{Catalog, Compositor, Instrument, SensorDataset};
use soilcarbon_algorithms::landcover::{
    aggregate, ClassTaxonomy, DivergingChart, EpochLayers, Epochs, RasterPair, TaxonomyDefinition,
};
use soilcarbon_colormap::{
    categorical_to_rgba, raster_to_rgba, visualize_rgb, ColorScheme, ColormapParams,
};
use soilcarbon_core::io::{read_geotiff, write_rgba_geotiff};
use soilcarbon_core::{BBox, MultiBandImage, Raster, RasterElement, Region, CRS};
use soilcarbon_export::blocking::export_all;
use soilcarbon_export::{ExportOutcome, ExportRequest, LocalDirBackend, SchedulerOptions};

use crate::config::AppConfig;
use crate::manifest::ManifestSource;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "soilcarbon")]
#[command(author, version, about = "Soil organic carbon change and satellite composites", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: ./soilcarbon.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Validate a region and print its bounding box and center
    Region {
        #[command(flatten)]
        region: RegionArgs,
    },
    /// Sensor catalog queries
    Catalog {
        #[command(subcommand)]
        action: CatalogCommands,
    },
    /// Build yearly median composites from a scene manifest and export them
    Composite(CompositeArgs),
    /// Aggregate stock change by land-cover transition
    Transitions(TransitionArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
enum CatalogCommands {
    /// List every dataset with its years and collections
    List,
    /// Show the full record of one dataset as JSON
    Show {
        /// Dataset name, e.g. Sentinel-2 or Landsat-8
        dataset: String,
    },
    /// Which dataset an instrument uses for a year
    Resolve {
        /// landsat or sentinel
        instrument: String,
        year: i32,
    },
}

#[derive(Args)]
struct RegionArgs {
    /// GeoJSON Polygon, Feature or FeatureCollection file
    #[arg(long, conflicts_with = "bbox")]
    geojson: Option<PathBuf>,
    /// Bounding box as xmin,ymin,xmax,ymax (degrees)
    #[arg(long, allow_hyphen_values = true)]
    bbox: Option<String>,
}

#[derive(Args)]
struct CompositeArgs {
    /// landsat or sentinel
    #[arg(short, long)]
    instrument: String,
    /// First year
    #[arg(long)]
    start: i32,
    /// Last year (inclusive)
    #[arg(long)]
    stop: i32,
    /// JSON scene manifest
    #[arg(short, long)]
    scenes: PathBuf,
    #[command(flatten)]
    region: RegionArgs,
    /// Output directory (default: [export].output_dir)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Composite the years that can be, reporting the others
    #[arg(long)]
    keep_going: bool,
    /// Stop all exports at the first failure
    #[arg(long)]
    fail_fast: bool,
    /// Also write RGBA renderings of every visualization layer
    #[arg(long)]
    render: bool,
}

#[derive(Args)]
struct TransitionArgs {
    #[command(flatten)]
    region: RegionArgs,
    /// First epoch (default: [epochs].before)
    #[arg(long)]
    before: Option<i32>,
    /// Second epoch (default: [epochs].after)
    #[arg(long)]
    after: Option<i32>,
    /// Directory holding the stock and land-cover layers
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Class table (TOML or JSON) replacing the built-in ESA-CCI table
    #[arg(long)]
    taxonomy: Option<PathBuf>,
    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Write the rendered stock change map (RGBA GeoTIFF)
    #[arg(long)]
    change_map: Option<PathBuf>,
    /// Write rendered land-cover maps as <prefix>_<year>.tif
    #[arg(long)]
    land_cover_maps: Option<PathBuf>,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_layer<T: RasterElement>(path: &Path, what: &str) -> Result<Raster<T>> {
    let pb = spinner(&format!("Reading {}...", what));
    let raster: Raster<T> = read_geotiff(path)
        .with_context(|| format!("Failed to read {} from {}", what, path.display()))?;
    pb.finish_and_clear();
    info!("{}: {} x {}", what, raster.cols(), raster.rows());
    Ok(raster)
}

fn write_rgba<T: RasterElement>(rgba: Vec<u8>, like: &Raster<T>, path: &Path) -> Result<()> {
    let (rows, cols) = like.shape();
    let array = Array3::from_shape_vec((rows, cols, 4), rgba).context("Bad rendering size")?;
    write_rgba_geotiff(&array, like.transform(), like.crs().and_then(|c| c.epsg()), path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

impl RegionArgs {
    fn region(&self) -> Result<Option<Region>> {
        if let Some(path) = &self.geojson {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let value: serde_json::Value =
                serde_json::from_str(&text).context("Region file is not JSON")?;
            return Ok(Some(Region::from_geojson(&value)?));
        }
        if let Some(s) = &self.bbox {
            return Ok(Some(Region::from_bbox(&BBox::parse(s)?)));
        }
        Ok(None)
    }

    /// Validated bounding box of the region, if one was given
    fn validated_bbox(&self, config: &AppConfig) -> Result<Option<BBox>> {
        match self.region()? {
            Some(region) => Ok(Some(
                region
                    .validate(config.region.max_area)
                    .context("Region rejected")?,
            )),
            None => Ok(None),
        }
    }
}

fn load_taxonomy(path: Option<&Path>) -> Result<ClassTaxonomy> {
    let Some(path) = path else {
        return Ok(ClassTaxonomy::esa_cci());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read taxonomy {}", path.display()))?;
    let definition: TaxonomyDefinition = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&text).context("Invalid taxonomy JSON")?,
        _ => toml::from_str(&text).context("Invalid taxonomy TOML")?,
    };
    Ok(ClassTaxonomy::from_definition(definition)?)
}

fn years_label(dataset: SensorDataset, catalog: &Catalog) -> String {
    let years = dataset.descriptor().years.years(catalog.current_year());
    if years.is_empty() {
        "none".to_string()
    } else {
        format!("{}-{}", years.start(), years.end())
    }
}

// ─── Commands ───────────────────────────────────────────────────────────

fn run_info(input: &Path) -> Result<()> {
    let raster: Raster<f64> = read_layer(input, "raster")?;
    let (rows, cols) = raster.shape();
    let bounds = raster.bounds();
    let stats = raster.statistics();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
    println!("Cell size: {}", raster.cell_size());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if let Some(crs) = raster.crs() {
        println!("CRS: {}", crs);
    }
    println!("\nStatistics:");
    if let Some(min) = stats.min {
        println!("  Min: {:.4}", min);
    }
    if let Some(max) = stats.max {
        println!("  Max: {:.4}", max);
    }
    if let Some(mean) = stats.mean {
        println!("  Mean: {:.4}", mean);
    }
    if !raster.is_empty() {
        println!(
            "  Valid cells: {} ({:.1}%)",
            stats.valid_count,
            100.0 * stats.valid_count as f64 / raster.len() as f64
        );
    }
    Ok(())
}

fn run_region(args: &RegionArgs, config: &AppConfig) -> Result<()> {
    let Some(region) = args.region()? else {
        bail!("Give a region with --geojson or --bbox");
    };
    let bbox = region.validate(config.region.max_area).context("Region rejected")?;
    let report = json!({
        "bbox": bbox,
        "area": bbox.area(),
        "max_area": config.region.max_area,
        "center": region.center().map(|(lat, lon)| json!({ "lat": lat, "lon": lon })),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_catalog(action: CatalogCommands) -> Result<()> {
    let catalog = Catalog::new();
    match action {
        CatalogCommands::List => {
            for &dataset in SensorDataset::ALL {
                let d = dataset.descriptor();
                println!(
                    "{:<12} years {:<10} scale {:>3} m  {}",
                    d.slug,
                    years_label(dataset, &catalog),
                    d.scale,
                    d.collections.join(", ")
                );
            }
            for &instrument in Instrument::ALL {
                if let Some((first, last)) = catalog.year_range(instrument) {
                    println!("{:<12} composites {}-{}", instrument.name(), first, last);
                }
            }
        }
        CatalogCommands::Show { dataset } => {
            let dataset: SensorDataset = dataset.parse()?;
            println!("{}", serde_json::to_string_pretty(dataset.descriptor())?);
        }
        CatalogCommands::Resolve { instrument, year } => {
            let instrument: Instrument = instrument.parse()?;
            let descriptor = catalog.resolve(instrument, year)?;
            let window = descriptor.date_window(year)?;
            println!("{} {} -> {} ({})", instrument, year, descriptor.slug, window);
        }
    }
    Ok(())
}

/// Write one RGBA rendering per visualization layer, on the composite's grid
fn render_layers(request: &ExportRequest, dir: &Path) -> Result<Vec<PathBuf>> {
    let image: &MultiBandImage = &request.image;
    if image.band_count() == 0 {
        return Ok(Vec::new());
    }
    let grid = image.grid();
    let epsg = grid.crs.as_ref().and_then(CRS::epsg);
    let mut written = Vec::new();
    for preset in request.dataset.descriptor().vis_layers {
        let rgba = visualize_rgb(image, &preset.to_params())?;
        let name = preset.bands.join("").to_lowercase();
        let path = dir.join(format!("{}_{}.tif", request.description, name));
        write_rgba_geotiff(&rgba, &grid.transform, epsg, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("rendered {}", path.display());
        written.push(path);
    }
    Ok(written)
}

fn run_composite(args: CompositeArgs, config: &AppConfig) -> Result<()> {
    let instrument: Instrument = args.instrument.parse()?;
    let mut source = ManifestSource::open(&args.scenes)?;
    if let Some(bbox) = args.region.validated_bbox(config)? {
        source = source.with_clip(bbox);
    }
    let grid = source.grid()?;
    info!(
        "{} scenes listed, compositing on a {} x {} grid",
        source.len(),
        grid.cols,
        grid.rows
    );

    let compositor = Compositor::new(Catalog::new(), &source);
    let pb = spinner(&format!("Compositing {} {}-{}...", instrument, args.start, args.stop));
    let start = Instant::now();
    let mut composites = Vec::new();
    let mut failed_years = Vec::new();
    if args.keep_going {
        for (year, result) in compositor.build_each_year(instrument, args.start, args.stop, &grid) {
            match result {
                Ok(c) => composites.push(c),
                Err(e) => {
                    warn!("{}: {}", year, e);
                    failed_years.push(year);
                }
            }
        }
    } else {
        composites = compositor
            .build_year_composites(instrument, args.start, args.stop, &grid)
            .context("Compositing failed")?;
    }
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    for c in &composites {
        println!(
            "{} {:<12} {} of {} scenes{}",
            c.year,
            c.dataset.slug(),
            c.scenes_used,
            c.scenes_considered,
            if c.is_empty() { "  (empty)" } else { "" }
        );
    }

    let mut settings = config.export.clone();
    if let Some(dir) = args.output_dir {
        settings.output_dir = dir;
    }
    if args.fail_fast {
        settings.fail_fast = true;
    }

    let backend = LocalDirBackend::new(&settings.output_dir)
        .with_context(|| format!("Cannot use {}", settings.output_dir.display()))?;
    let requests: Vec<ExportRequest> = composites
        .into_iter()
        .map(|c| ExportRequest::from(c).with_prefix(&settings.prefix))
        .collect();
    if args.render {
        for request in &requests {
            render_layers(request, &settings.output_dir)?;
        }
    }
    let pb = spinner(&format!("Exporting {} composites...", requests.len()));
    let outcomes = export_all(backend, SchedulerOptions::from(&settings), requests)?;
    pb.finish_and_clear();

    for o in &outcomes {
        println!("{} {:<28} {}", o.year, o.description, o.outcome);
    }
    done("Composites", &settings.output_dir, elapsed);

    let export_failures = outcomes
        .iter()
        .filter(|o| o.outcome != ExportOutcome::Completed)
        .count();
    if export_failures > 0 || !failed_years.is_empty() {
        bail!(
            "{} export(s) did not complete, {} year(s) could not be composited",
            export_failures,
            failed_years.len()
        );
    }
    Ok(())
}

fn run_transitions(args: TransitionArgs, config: &AppConfig) -> Result<()> {
    let mut epochs = Epochs::from(&config.epochs);
    if let Some(y) = args.before {
        epochs.before = y;
    }
    if let Some(y) = args.after {
        epochs.after = y;
    }
    let mut data = config.data.clone();
    if let Some(dir) = args.data_dir {
        data.dir = dir;
    }
    let taxonomy = load_taxonomy(args.taxonomy.as_deref().or(data.taxonomy.as_deref()))?;
    let bbox = args.region.validated_bbox(config)?;

    let before = EpochLayers::new(
        read_layer(&data.stock_path(epochs.before), "stock (before)")?,
        read_layer(&data.land_cover_path(epochs.before), "land cover (before)")?,
    );
    let after = EpochLayers::new(
        read_layer(&data.stock_path(epochs.after), "stock (after)")?,
        read_layer(&data.land_cover_path(epochs.after), "land cover (after)")?,
    );
    let mut pair = RasterPair::new(epochs, before, after).context("Layers cannot be paired")?;
    if let Some(bbox) = &bbox {
        pair = pair.clip(bbox);
        if pair.is_empty() {
            warn!("region does not overlap the layers");
        }
    }

    let pb = spinner("Aggregating transitions...");
    let start = Instant::now();
    let summary = aggregate(&pair, &taxonomy).context("Aggregation failed")?;
    let chart = DivergingChart::from_summary(&summary, &taxonomy, epochs)?;
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    let report = json!({
        "epochs": epochs,
        "bbox": bbox,
        "cells": summary.cells(),
        "total": summary.total(),
        "transitions": summary,
        "within_group": summary.within_group(),
        "chart": chart,
    });
    let text = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            done("Transition report", path, elapsed);
        }
        None => println!("{}", text),
    }

    if let Some(path) = &args.change_map {
        let change = pair.stock_change();
        let rgba = raster_to_rgba(&change, &ColormapParams::new(ColorScheme::StockChange));
        write_rgba(rgba, &change, path)?;
        info!("stock change map written to {}", path.display());
    }
    if let Some(prefix) = &args.land_cover_maps {
        let palette = taxonomy.palette();
        for (year, layer) in [(epochs.before, pair.before()), (epochs.after, pair.after())] {
            let path = PathBuf::from(format!("{}_{}.tif", prefix.display(), year));
            let rgba = categorical_to_rgba(&layer.land_cover, &palette);
            write_rgba(rgba, &layer.land_cover, &path)?;
            info!("land cover {} written to {}", year, path.display());
        }
    }
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { input } => run_info(&input),
        Commands::Region { region } => run_region(&region, &config),
        Commands::Catalog { action } => run_catalog(action),
        Commands::Composite(args) => run_composite(args, &config),
        Commands::Transitions(args) => run_transitions(args, &config),
        Commands::Config => {
            print!("{}", config.to_display_toml()?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_flags_parse() {
        let cli = Cli::try_parse_from([
            "soilcarbon",
            "transitions",
            "--bbox",
            "-60.5,-3.2,-59.9,-2.8",
            "--before",
            "2005",
        ])
        .unwrap();
        match cli.command {
            Commands::Transitions(args) => {
                assert_eq!(args.before, Some(2005));
                assert!(args.after.is_none());
                let region = args.region.region().unwrap().unwrap();
                assert_eq!(region.bbox(), BBox::new(-60.5, -3.2, -59.9, -2.8));
            }
            _ => panic!("expected transitions"),
        }
    }

    #[test]
    fn test_geojson_and_bbox_conflict() {
        let parsed = Cli::try_parse_from([
            "soilcarbon",
            "region",
            "--geojson",
            "area.geojson",
            "--bbox",
            "0,0,1,1",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_oversized_region_is_rejected() {
        let args = RegionArgs {
            geojson: None,
            bbox: Some("100,-10,110,0".into()),
        };
        assert!(args.validated_bbox(&AppConfig::default()).is_err());
    }

    /// EPSG code recorded in the GeoKeyDirectory of a written TIFF
    fn written_epsg(path: &Path) -> Option<u16> {
        let file = std::fs::File::open(path).unwrap();
        let mut decoder = tiff::decoder::Decoder::new(file).unwrap();
        let keys = decoder
            .get_tag_u16_vec(tiff::tags::Tag::from_u16_exhaustive(34735))
            .unwrap();
        keys[4..]
            .chunks_exact(4)
            .find(|k| k[0] == 2048 || k[0] == 3072)
            .map(|k| k[3])
    }

    #[test]
    fn test_renderings_take_the_composite_crs() {
        use soilcarbon_core::{GeoTransform, GridSpec};

        let dir = tempfile::tempdir().unwrap();
        let dataset = SensorDataset::Sentinel2;
        let grid = GridSpec::new(2, 2, GeoTransform::new(12_600_000.0, -110_000.0, 10.0, -10.0))
            .with_crs(CRS::web_mercator());
        let bands = dataset
            .descriptor()
            .composite_bands()
            .into_iter()
            .map(|b| (b, Raster::filled(2, 2, 0.3)));
        let image = MultiBandImage::from_bands(grid, bands).unwrap();
        let request = ExportRequest::new(2018, dataset, image);

        let written = render_layers(&request, dir.path()).unwrap();
        assert_eq!(written.len(), 3);
        for path in &written {
            assert_eq!(written_epsg(path), Some(3857));
        }
    }

    #[test]
    fn test_taxonomy_file_formats() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("classes.json");
        std::fs::write(
            &json_path,
            r##"{"groups":[{"name":"Forest","color":"#006400"}],
                "classes":[{"code":1,"name":"Forest","group":"Forest","color":"#006400"}]}"##,
        )
        .unwrap();
        let taxonomy = load_taxonomy(Some(&json_path)).unwrap();
        assert_eq!(taxonomy.group_of(1).unwrap(), "Forest");

        let toml_path = dir.path().join("classes.toml");
        std::fs::write(&toml_path, "groups = []\nclasses = []\n").unwrap();
        assert!(load_taxonomy(Some(&toml_path)).unwrap().is_empty());

        assert_eq!(load_taxonomy(None).unwrap().group_of(190).unwrap(), "Urban areas");
    }
}
