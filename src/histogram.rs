//! Fixed-binning event-count histograms
//!
//! Both axes of every histogram carry an underflow bin (index 0) and an
//! overflow bin (index n+1), so that no fill is ever lost. Values below the
//! first edge go to underflow, values at or above the last edge (and NaN) go
//! to overflow.

use crate::numeric::Real;
use eyre::ensure;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bin edges of one histogram axis
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Real>", into = "Vec<Real>")]
pub struct Binning {
    /// Strictly increasing bin edges, at least two of them
    edges: Vec<Real>,
}
//
impl Binning {
    /// Axis with explicit, possibly non-uniform, bin edges
    ///
    /// Panics if the edges are not strictly increasing. Binnings are defined
    /// by the analysis code, so this is a programming error.
    ///
    pub fn variable(edges: &[Real]) -> Self {
        match Self::try_from(edges.to_vec()) {
            Ok(binning) => binning,
            Err(e) => panic!("Invalid binning {edges:?}: {e}"),
        }
    }

    /// Axis with num_bins bins of equal width in [low, high)
    pub fn uniform(num_bins: usize, low: Real, high: Real) -> Self {
        assert!(num_bins > 0, "An axis needs at least one bin");
        let width = (high - low) / num_bins as Real;
        let edges = (0..=num_bins)
            .map(|i| if i == num_bins { high } else { low + i as Real * width })
            .collect::<Vec<_>>();
        Self::variable(&edges)
    }

    /// Number of regular bins (excluding underflow and overflow)
    pub fn num_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Lower edge of the first regular bin
    pub fn low(&self) -> Real {
        self.edges[0]
    }

    /// Upper edge of the last regular bin
    pub fn high(&self) -> Real {
        self.edges[self.num_bins()]
    }

    /// Lower and upper edge of a regular bin (1-based)
    pub fn bin_range(&self, bin: usize) -> (Real, Real) {
        assert!((1..=self.num_bins()).contains(&bin), "Not a regular bin");
        (self.edges[bin - 1], self.edges[bin])
    }

    /// Center of a regular bin (1-based)
    pub fn bin_center(&self, bin: usize) -> Real {
        let (low, high) = self.bin_range(bin);
        0.5 * (low + high)
    }

    /// Index of the bin which a value falls into
    pub fn find_bin(&self, x: Real) -> usize {
        let n = self.num_bins();
        if x < self.edges[0] {
            0
        } else if !(x < self.edges[n]) {
            n + 1
        } else {
            // Number of edges at or below x, which is at least 1 and at most n
            self.edges.partition_point(|&edge| edge <= x)
        }
    }
}
//
impl TryFrom<Vec<Real>> for Binning {
    type Error = eyre::Report;

    fn try_from(edges: Vec<Real>) -> eyre::Result<Self> {
        ensure!(edges.len() >= 2, "An axis needs at least two edges");
        ensure!(
            edges.iter().all(|edge| edge.is_finite()),
            "Bin edges must be finite"
        );
        ensure!(
            edges.windows(2).all(|pair| pair[0] < pair[1]),
            "Bin edges must be strictly increasing"
        );
        Ok(Self { edges })
    }
}
//
impl From<Binning> for Vec<Real> {
    fn from(binning: Binning) -> Self {
        binning.edges
    }
}

/// One-dimensional event-count histogram
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHist1D")]
pub struct Hist1D {
    /// Title of the x axis
    pub x_title: String,

    /// Binning of the x axis
    binning: Binning,

    /// Counts, including underflow (first) and overflow (last)
    counts: Vec<u64>,

    /// Number of fills
    entries: u64,
}
//
impl Hist1D {
    /// Book an empty histogram
    pub fn new(x_title: impl Into<String>, binning: Binning) -> Self {
        let num_counts = binning.num_bins() + 2;
        Self {
            x_title: x_title.into(),
            binning,
            counts: vec![0; num_counts],
            entries: 0,
        }
    }

    /// Record one event at value x
    pub fn fill(&mut self, x: Real) {
        let bin = self.binning.find_bin(x);
        self.counts[bin] += 1;
        self.entries += 1;
    }

    /// Axis binning
    pub fn binning(&self) -> &Binning {
        &self.binning
    }

    /// Count in one bin, 0 being underflow and n+1 overflow
    pub fn count(&self, bin: usize) -> u64 {
        self.counts[bin]
    }

    /// Counts of every bin, including underflow and overflow
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Total number of fills
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Add the counts of another histogram with the same binning
    pub fn merge(&mut self, other: &Self) {
        assert_eq!(self.binning, other.binning, "Merged histograms must share binning");
        for (count, other_count) in self.counts.iter_mut().zip(&other.counts) {
            *count += other_count;
        }
        self.entries += other.entries;
    }
}

/// Two-dimensional event-count histogram
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHist2D")]
pub struct Hist2D {
    /// Title of the x axis
    pub x_title: String,

    /// Title of the y axis
    pub y_title: String,

    /// Binning of the x axis
    x_binning: Binning,

    /// Binning of the y axis
    y_binning: Binning,

    /// Counts, rows are x bins and columns are y bins, flow bins included
    counts: DMatrix<u64>,

    /// Number of fills
    entries: u64,
}
//
impl Hist2D {
    /// Book an empty histogram
    pub fn new(
        x_title: impl Into<String>,
        x_binning: Binning,
        y_title: impl Into<String>,
        y_binning: Binning,
    ) -> Self {
        let counts = DMatrix::from_element(x_binning.num_bins() + 2, y_binning.num_bins() + 2, 0);
        Self {
            x_title: x_title.into(),
            y_title: y_title.into(),
            x_binning,
            y_binning,
            counts,
            entries: 0,
        }
    }

    /// Record one event at (x, y)
    pub fn fill(&mut self, x: Real, y: Real) {
        let cell = (self.x_binning.find_bin(x), self.y_binning.find_bin(y));
        self.counts[cell] += 1;
        self.entries += 1;
    }

    /// Binning of the x axis
    pub fn x_binning(&self) -> &Binning {
        &self.x_binning
    }

    /// Binning of the y axis
    pub fn y_binning(&self) -> &Binning {
        &self.y_binning
    }

    /// Count in one cell, flow bins included
    pub fn count(&self, x_bin: usize, y_bin: usize) -> u64 {
        self.counts[(x_bin, y_bin)]
    }

    /// Counts of every cell
    pub fn counts(&self) -> &DMatrix<u64> {
        &self.counts
    }

    /// Total number of fills
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Add the counts of another histogram with the same binning
    pub fn merge(&mut self, other: &Self) {
        assert_eq!(self.x_binning, other.x_binning, "Merged histograms must share binning");
        assert_eq!(self.y_binning, other.y_binning, "Merged histograms must share binning");
        self.counts += &other.counts;
        self.entries += other.entries;
    }
}

/// Persisted form of a `Hist1D`, checked before use
#[derive(Deserialize)]
struct RawHist1D {
    x_title: String,
    binning: Binning,
    counts: Vec<u64>,
    entries: u64,
}
//
impl TryFrom<RawHist1D> for Hist1D {
    type Error = eyre::Report;

    fn try_from(raw: RawHist1D) -> eyre::Result<Self> {
        let expected = raw.binning.num_bins() + 2;
        ensure!(
            raw.counts.len() == expected,
            "Histogram of {} has {} counts, expected {expected}",
            raw.x_title,
            raw.counts.len()
        );
        ensure!(
            raw.counts.iter().sum::<u64>() == raw.entries,
            "Histogram of {} has counts which do not add up to its entries",
            raw.x_title
        );
        Ok(Self {
            x_title: raw.x_title,
            binning: raw.binning,
            counts: raw.counts,
            entries: raw.entries,
        })
    }
}

/// Persisted form of a `Hist2D`, checked before use
#[derive(Deserialize)]
struct RawHist2D {
    x_title: String,
    y_title: String,
    x_binning: Binning,
    y_binning: Binning,
    counts: DMatrix<u64>,
    entries: u64,
}
//
impl TryFrom<RawHist2D> for Hist2D {
    type Error = eyre::Report;

    fn try_from(raw: RawHist2D) -> eyre::Result<Self> {
        let expected = (raw.x_binning.num_bins() + 2, raw.y_binning.num_bins() + 2);
        ensure!(
            raw.counts.shape() == expected,
            "Histogram of {} vs {} has {:?} cells, expected {expected:?}",
            raw.y_title,
            raw.x_title,
            raw.counts.shape()
        );
        ensure!(
            raw.counts.iter().sum::<u64>() == raw.entries,
            "Histogram of {} vs {} has counts which do not add up to its entries",
            raw.y_title,
            raw.x_title
        );
        Ok(Self {
            x_title: raw.x_title,
            y_title: raw.y_title,
            x_binning: raw.x_binning,
            y_binning: raw.y_binning,
            counts: raw.counts,
            entries: raw.entries,
        })
    }
}

/// Histogram of either dimensionality, as persisted
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Histogram {
    /// 1-D histogram
    #[serde(rename = "TH1")]
    OneD(Hist1D),

    /// 2-D histogram
    #[serde(rename = "TH2")]
    TwoD(Hist2D),
}

/// Named histograms, sorted by name for reproducible output
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistogramSet(BTreeMap<String, Histogram>);
//
impl HistogramSet {
    /// Start an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a histogram under a name which must not be taken yet
    pub fn insert(&mut self, name: impl Into<String>, histogram: Histogram) {
        let name = name.into();
        assert!(!self.0.contains_key(&name), "Histogram {name} booked twice");
        self.0.insert(name, histogram);
    }

    /// Register a 1-D histogram
    pub fn insert_1d(&mut self, name: impl Into<String>, histogram: Hist1D) {
        self.insert(name, Histogram::OneD(histogram))
    }

    /// Register a 2-D histogram
    pub fn insert_2d(&mut self, name: impl Into<String>, histogram: Hist2D) {
        self.insert(name, Histogram::TwoD(histogram))
    }

    /// Look up a histogram by name
    pub fn get(&self, name: &str) -> Option<&Histogram> {
        self.0.get(name)
    }

    /// Look up a 1-D histogram by name
    pub fn get_1d(&self, name: &str) -> Option<&Hist1D> {
        match self.get(name)? {
            Histogram::OneD(h) => Some(h),
            Histogram::TwoD(_) => None,
        }
    }

    /// Look up a 2-D histogram by name
    pub fn get_2d(&self, name: &str) -> Option<&Hist2D> {
        match self.get(name)? {
            Histogram::TwoD(h) => Some(h),
            Histogram::OneD(_) => None,
        }
    }

    /// Iterate over histograms in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Histogram)> {
        self.0.iter().map(|(name, h)| (name.as_str(), h))
    }

    /// Number of histograms
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Truth that no histogram has been registered
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
