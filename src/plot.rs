//! Rendering of efficiency curves and maps
//!
//! Plots are defined per channel from the names of the histograms that its
//! analysis stores, and drawn with plotters onto any of its backends.

use crate::{
    analysis::ak8::{self, Region},
    config::Channel,
    efficiency::{Efficiency1D, Efficiency2D, DISPLAY_RANGE},
    output::HistogramFile,
    Result,
};
use eyre::{bail, WrapErr};
use plotters::{coord::Shift, prelude::*};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info};

/// Canvas size in pixels
const CANVAS: (u32, u32) = (800, 700);

/// Marker colors, in curve order
const COLORS: [RGBColor; 7] = [
    RGBColor(0, 0, 0),
    RGBColor(0, 0, 255),
    RGBColor(0, 204, 0),
    RGBColor(204, 0, 0),
    RGBColor(255, 153, 51),
    RGBColor(153, 0, 153),
    RGBColor(0, 128, 128),
];

/// Image file format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    /// Raster image
    Png,
    /// Vector image
    Svg,
}
//
impl ImageFormat {
    /// File name extension
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }
}
//
impl FromStr for ImageFormat {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "svg" => Ok(Self::Svg),
            other => bail!("Unsupported image format '{other}', expected png or svg"),
        }
    }
}
//
impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// What goes around the plots
#[derive(Clone, Debug)]
pub struct PlotOptions {
    /// Data-taking year shown in the header
    pub year: String,

    /// Formats to save each plot in
    pub formats: Vec<ImageFormat>,

    /// Directory where images are saved
    pub directory: PathBuf,
}

/// Several efficiency curves sharing a denominator
#[derive(Clone, Debug, PartialEq)]
pub struct CurvePage {
    /// Image file name, without extension
    pub stem: String,

    /// Denominator histogram
    pub denominator: String,

    /// Legend label and numerator histogram of each curve
    pub numerators: Vec<(String, String)>,
}

/// One efficiency map
#[derive(Clone, Debug, PartialEq)]
pub struct MapPage {
    /// Image file name, without extension
    pub stem: String,

    /// Denominator histogram
    pub denominator: String,

    /// Numerator histogram
    pub numerator: String,
}

/// Names of the histograms with a given prefix, with that prefix removed
fn suffixes_after<'file>(file: &'file HistogramFile, prefix: &'file str) -> impl Iterator<Item = &'file str> {
    file.histograms
        .iter()
        .filter_map(move |(name, _)| name.strip_prefix(prefix))
}

/// Plots of a channel, given the histograms that are available
pub fn pages(channel: Channel, file: &HistogramFile) -> (Vec<CurvePage>, MapPage) {
    let label = channel.label();
    match channel {
        Channel::Pfht => {
            let curves = ["pfht", "pv"]
                .into_iter()
                .map(|var| CurvePage {
                    stem: format!("TrgEffs_{label}_{var}"),
                    denominator: format!("h_{var}_all"),
                    numerators: vec![
                        ("L1 seed".to_owned(), format!("h_{var}_passedL1")),
                        ("HLT path".to_owned(), format!("h_{var}_passedHLT")),
                    ],
                })
                .collect();
            let map = MapPage {
                stem: format!("Eff2D_{label}trigger_PFHTvsPV"),
                denominator: "h_pfht_vs_pv_all".to_owned(),
                numerator: "h_pfht_vs_pv_passed".to_owned(),
            };
            (curves, map)
        }

        Channel::Ak8 => {
            // Paths are listed in the inclusive pT histograms. Only the AK8
            // jet paths are overlaid on the logical OR.
            let paths = suffixes_after(file, "h_AK8_pt_pass_HLT_")
                .filter(|rest| !rest.contains("_plateau") && rest.starts_with("AK8"))
                .map(str::to_owned)
                .collect::<Vec<_>>();
            let regions = [
                Region::Inclusive,
                Region::PlateauPt,
                Region::PlateauMsd,
                Region::PlateauMsdPt,
            ];
            let mut curves = Vec::new();
            for region in regions {
                for var in &ak8::VARIABLES {
                    let mut numerators = vec![(
                        "TrgOR".to_owned(),
                        ak8::hist_name(var.name, "_passTrgOR", region),
                    )];
                    numerators.extend(paths.iter().map(|path| {
                        (
                            format!("HLT_{path}"),
                            ak8::hist_name(var.name, &format!("_pass_HLT_{path}"), region),
                        )
                    }));
                    curves.push(CurvePage {
                        stem: format!("TrgEffs_{label}_{}{}", var.name, region.suffix()),
                        denominator: ak8::hist_name(var.name, "", region),
                        numerators,
                    });
                }
            }
            let map = MapPage {
                stem: format!("Eff2D_{label}trigger_mSDvsPt"),
                denominator: "h_AK8_mSD_vs_pt".to_owned(),
                numerator: "h_AK8_mSD_vs_pt_passTrgOR".to_owned(),
            };
            (curves, map)
        }

        Channel::Met => {
            let curves = ["met_pt", "pv"]
                .into_iter()
                .map(|var| {
                    let prefix = format!("h_{var}_passtrig_HLT_");
                    let mut numerators = vec![("logical OR".to_owned(), format!("h_{var}_passed"))];
                    numerators.extend(
                        suffixes_after(file, &prefix)
                            .map(|path| (format!("HLT_{path}"), format!("{prefix}{path}"))),
                    );
                    CurvePage {
                        stem: format!("TrgEffs_{label}_{var}"),
                        denominator: format!("h_{var}_all"),
                        numerators,
                    }
                })
                .collect();
            let map = MapPage {
                stem: format!("Eff2D_{label}trigger_METvsPV"),
                denominator: "h_met_pt_vs_pv_all".to_owned(),
                numerator: "h_met_pt_vs_pv_passed".to_owned(),
            };
            (curves, map)
        }
    }
}

/// Render every plot of a histogram file, returning the paths of the images
pub fn plot_all(file: &HistogramFile, options: &PlotOptions) -> Result<Vec<PathBuf>> {
    let channel = file.channel;
    info!("Plotting {channel} trigger efficiencies from {}", file.directory);
    fs::create_dir_all(&options.directory).wrap_err_with(|| {
        format!("Failed to create output directory {}", options.directory.display())
    })?;

    let (curves, map) = pages(channel, file);
    let mut saved = Vec::new();
    for page in &curves {
        // Compute the efficiencies before drawing anything
        let total = file.get_1d(&page.denominator)?;
        debug!("{} has {} entries", page.denominator, total.entries());
        let mut efficiencies = Vec::with_capacity(page.numerators.len());
        for (label, numerator) in &page.numerators {
            let eff = Efficiency1D::new(file.get_1d(numerator)?, total)
                .wrap_err_with(|| format!("Cannot divide {numerator} by {}", page.denominator))?;
            for point in &eff.points {
                debug!(
                    "{numerator} @ {:.1}: {:.3} [{:.3}, {:.3}]",
                    point.x, point.value.central, point.value.low, point.value.high
                );
            }
            efficiencies.push((label.as_str(), eff));
        }

        for &format in &options.formats {
            let path = image_path(&options.directory, &page.stem, format);
            match format {
                ImageFormat::Png => draw_curves(
                    BitMapBackend::new(&path, CANVAS).into_drawing_area(),
                    &efficiencies,
                    &options.year,
                ),
                ImageFormat::Svg => draw_curves(
                    SVGBackend::new(&path, CANVAS).into_drawing_area(),
                    &efficiencies,
                    &options.year,
                ),
            }
            .wrap_err_with(|| format!("Failed to draw {}", path.display()))?;
            info!("Saved {}", path.display());
            saved.push(path);
        }
    }

    let (passed, total) = (file.get_2d(&map.numerator)?, file.get_2d(&map.denominator)?);
    debug!("{} has {} entries", map.denominator, total.entries());
    let eff = Efficiency2D::new(passed, total)
        .wrap_err_with(|| format!("Cannot divide {} by {}", map.numerator, map.denominator))?;
    for &format in &options.formats {
        let path = image_path(&options.directory, &map.stem, format);
        match format {
            ImageFormat::Png => draw_map(
                BitMapBackend::new(&path, CANVAS).into_drawing_area(),
                &eff,
                &options.year,
            ),
            ImageFormat::Svg => draw_map(
                SVGBackend::new(&path, CANVAS).into_drawing_area(),
                &eff,
                &options.year,
            ),
        }
        .wrap_err_with(|| format!("Failed to draw {}", path.display()))?;
        info!("Saved {}", path.display());
        saved.push(path);
    }
    Ok(saved)
}

fn image_path(directory: &Path, stem: &str, format: ImageFormat) -> PathBuf {
    directory.join(format!("{stem}.{}", format.extension()))
}

/// Experiment, tutorial and run labels above the plotting area
fn draw_header<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, year: &str) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let cms = TextStyle::from(("sans-serif", 30).into_font().style(FontStyle::Bold));
    let tutorial = TextStyle::from(("sans-serif", 26).into_font().style(FontStyle::Italic));
    let run = TextStyle::from(("sans-serif", 22).into_font());
    root.draw_text("CMS", &cms, (90, 22))?;
    root.draw_text("HLT tutorial", &tutorial, (170, 25))?;
    root.draw_text(&format!("{year}, √s = 13.6 TeV"), &run, (500, 28))?;
    Ok(())
}

/// Overlay efficiency curves sharing a denominator, with a legend
fn draw_curves<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    efficiencies: &[(&str, Efficiency1D)],
    year: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let Some((_, first)) = efficiencies.first() else {
        bail!("Nothing to draw");
    };
    root.fill(&WHITE)?;
    draw_header(&root, year)?;

    let (x_low, x_high) = (first.binning.low(), first.binning.high());
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .margin_top(60)
        .margin_right(40)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_low..x_high, DISPLAY_RANGE.0..DISPLAY_RANGE.1)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(first.x_title.as_str())
        .y_desc("efficiency (L1+HLT)")
        .draw()?;

    for (idx, (label, eff)) in efficiencies.iter().enumerate() {
        let color = COLORS[idx % COLORS.len()];

        // Horizontal bars span the bin, vertical bars the interval
        chart.draw_series(eff.points.iter().map(|p| {
            PathElement::new(
                vec![(p.x_range.0, p.value.central), (p.x_range.1, p.value.central)],
                color,
            )
        }))?;
        chart.draw_series(eff.points.iter().map(|p| {
            ErrorBar::new_vertical(p.x, p.value.low, p.value.central, p.value.high, color, 6)
        }))?;
        chart
            .draw_series(eff.points.iter().map(|p| {
                EmptyElement::at((p.x, p.value.central))
                    + Rectangle::new([(-4, -4), (4, 4)], color.filled())
            }))?
            .label(*label)
            .legend(move |(x, y)| Rectangle::new([(x - 4, y - 4), (x + 4, y + 4)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(TRANSPARENT)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Color of an efficiency value, from blue (0) to red (1)
fn heat_color(eff: f64) -> HSLColor {
    HSLColor((1. - eff.clamp(0., 1.)) * 240. / 360., 0.9, 0.5)
}

/// Draw an efficiency map with its palette bar
fn draw_map<DB: DrawingBackend>(root: DrawingArea<DB, Shift>, eff: &Efficiency2D, year: &str) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    draw_header(&root, year)?;
    let (map_area, bar_area) = root.split_horizontally(680);

    let (xb, yb) = (&eff.x_binning, &eff.y_binning);
    let mut chart = ChartBuilder::on(&map_area)
        .margin(20)
        .margin_top(60)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(xb.low()..xb.high(), yb.low()..yb.high())?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(eff.x_title.as_str())
        .y_desc(eff.y_title.as_str())
        .draw()?;
    chart.draw_series((0..xb.num_bins()).flat_map(|ix| {
        (0..yb.num_bins()).filter_map(move |iy| {
            let value = eff.values[(ix, iy)]?;
            let (x0, x1) = xb.bin_range(ix + 1);
            let (y0, y1) = yb.bin_range(iy + 1);
            Some(Rectangle::new([(x0, y0), (x1, y1)], heat_color(value).filled()))
        })
    }))?;

    // Palette bar
    const STEPS: usize = 100;
    let mut bar = ChartBuilder::on(&bar_area)
        .margin(20)
        .margin_top(60)
        .x_label_area_size(50)
        .y_label_area_size(0)
        .right_y_label_area_size(40)
        .build_cartesian_2d(0.0..1.0, 0.0..1.0)?;
    bar.configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_labels(6)
        .draw()?;
    bar.draw_series((0..STEPS).map(|step| {
        let low = step as f64 / STEPS as f64;
        let high = (step + 1) as f64 / STEPS as f64;
        Rectangle::new([(0., low), (1., high)], heat_color(low).filled())
    }))?;
    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{ak8::Ak8Analysis, met::MetAnalysis, pfht::PfhtAnalysis, TriggerAnalysis},
        config::Configuration,
    };

    fn empty_file<A: TriggerAnalysis>(channel: Channel) -> HistogramFile {
        let config = Configuration::for_channel(channel).unwrap();
        HistogramFile {
            channel,
            directory: config.directory.clone(),
            histograms: A::new(&config).into_histograms(),
        }
    }

    /// Every histogram which a page refers to must exist
    fn assert_pages_resolve(file: &HistogramFile) -> (Vec<CurvePage>, MapPage) {
        let (curves, map) = pages(file.channel, file);
        for page in &curves {
            file.get_1d(&page.denominator).unwrap();
            for (_, numerator) in &page.numerators {
                file.get_1d(numerator).unwrap();
            }
        }
        file.get_2d(&map.denominator).unwrap();
        file.get_2d(&map.numerator).unwrap();
        (curves, map)
    }

    #[test]
    fn ak8_pages() {
        let (curves, map) = assert_pages_resolve(&empty_file::<Ak8Analysis>(Channel::Ak8));
        assert_eq!(curves.len(), 12);
        // Logical OR plus the four AK8 jet paths
        assert!(curves.iter().all(|page| page.numerators.len() == 5));
        assert!(curves.iter().any(|page| page.stem == "TrgEffs_AK8_mSD_plateauPt"));
        assert_eq!(curves[0].numerators[1].0, "HLT_AK8PFJet420_MassSD30");
        assert_eq!(map.stem, "Eff2D_AK8trigger_mSDvsPt");
    }

    #[test]
    fn met_pages() {
        let (curves, map) = assert_pages_resolve(&empty_file::<MetAnalysis>(Channel::Met));
        assert_eq!(curves.len(), 2);
        assert_eq!(curves[0].stem, "TrgEffs_MET_met_pt");
        assert_eq!(curves[1].numerators.len(), 4);
        assert_eq!(curves[1].numerators[0].0, "logical OR");
        assert_eq!(map.stem, "Eff2D_METtrigger_METvsPV");
    }

    #[test]
    fn pfht_pages() {
        let (curves, map) = assert_pages_resolve(&empty_file::<PfhtAnalysis>(Channel::Pfht));
        assert_eq!(curves.len(), 2);
        assert_eq!(curves[0].denominator, "h_pfht_all");
        assert_eq!(map.numerator, "h_pfht_vs_pv_passed");
    }

    #[test]
    fn custom_group_name_keeps_its_plots() {
        let mut file = empty_file::<MetAnalysis>(Channel::Met);
        file.directory = "myMetStudy".to_owned();
        let path = std::env::temp_dir().join(format!("trigeff-custom-{}.json", std::process::id()));
        file.save(&path).unwrap();
        let loaded = HistogramFile::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.channel, Channel::Met);
        assert_eq!(loaded.directory, "myMetStudy");
        assert_pages_resolve(&loaded);
    }

    #[test]
    fn image_formats() {
        assert_eq!(".png".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("SVG".parse::<ImageFormat>().unwrap(), ImageFormat::Svg);
        assert!(".pdf".parse::<ImageFormat>().is_err());
        assert_eq!(
            image_path(Path::new("plots"), "TrgEffs_MET_pv", ImageFormat::Svg),
            PathBuf::from("plots/TrgEffs_MET_pv.svg")
        );
    }

    #[test]
    fn heat_colors_span_blue_to_red() {
        assert_eq!(heat_color(0.).0, 240. / 360.);
        assert_eq!(heat_color(1.).0, 0.);
        assert_eq!(heat_color(2.).0, 0.);
    }
}
