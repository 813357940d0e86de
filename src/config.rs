//! Mechanism for loading and sharing the job configuration

use crate::{preselection::Preselection, Result};
use eyre::{bail, ensure, eyre, WrapErr};
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::PathBuf, str::FromStr};
use tracing::info;

/// Trigger whose efficiency is being measured
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Hadronic energy sum trigger, probed with single-muon events
    Pfht,
    /// Large-radius jet triggers, probed with single-muon events
    Ak8,
    /// Missing transverse momentum triggers, probed with single-muon events
    Met,
}
//
impl Channel {
    /// Group name under which the histograms of this channel are stored
    pub fn directory(self) -> &'static str {
        match self {
            Self::Pfht => "pfhtTrigAnalyzerNanoAOD",
            Self::Ak8 => "hadTrigAnalyzerNanoAOD",
            Self::Met => "metTrigAnalyzerNanoAOD",
        }
    }

    /// Default histogram file
    pub fn default_output(self) -> &'static str {
        match self {
            Self::Pfht => "histos_PFHTTrigNanoAOD.json",
            Self::Ak8 => "histos_HadTrigNanoAOD.json",
            Self::Met => "histos_METTrigNanoAOD.json",
        }
    }

    /// Default preselection expression
    pub fn default_preselection(self) -> &'static str {
        match self {
            Self::Pfht | Self::Met => "(HLT_Mu50 == 1 || HLT_IsoMu24 == 1)",
            Self::Ak8 => {
                "(HLT_Mu50 == 1 || HLT_IsoMu24 == 1) && \
                 (Sum$(FatJet_pt > 200 && abs(FatJet_eta)<2.5) > 0)"
            }
        }
    }

    /// Default reference paths
    pub fn default_reference(self) -> &'static [&'static str] {
        &["Mu50", "IsoMu24"]
    }

    /// Default signal paths
    pub fn default_signal(self) -> &'static [&'static str] {
        match self {
            Self::Pfht => &["PFHT1050"],
            Self::Ak8 => &[
                "AK8PFJet420_MassSD30",
                "AK8PFJet425_SoftDropMass40",
                "AK8PFJet450",
                "AK8PFJet500",
                "PFJet500",
                "PFHT1050",
            ],
            Self::Met => &[
                "PFMET120_PFMHT120_IDTight",
                "PFMETNoMu120_PFMHTNoMu120_IDTight",
                "PFMETNoMu120_PFMHTNoMu120_IDTight_FilterHF",
            ],
        }
    }

    /// Default L1 seeds
    pub fn default_l1(self) -> &'static [&'static str] {
        match self {
            Self::Pfht => &["HTT280er"],
            Self::Ak8 | Self::Met => &[],
        }
    }

    /// Short label used in plot file names
    pub fn label(self) -> &'static str {
        match self {
            Self::Pfht => "PFHT",
            Self::Ak8 => "AK8",
            Self::Met => "MET",
        }
    }
}
//
impl FromStr for Channel {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pfht" => Ok(Self::Pfht),
            "ak8" => Ok(Self::Ak8),
            "met" => Ok(Self::Met),
            _ => bail!("Unknown channel '{s}', expected one of pfht, ak8, met"),
        }
    }
}
//
impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label().to_lowercase())
    }
}

/// Job configuration
#[derive(Clone, Debug)]
pub struct Configuration {
    /// Trigger being measured
    pub channel: Channel,

    /// Event files, processed in this order
    pub inputs: Vec<PathBuf>,

    /// Filter applied while reading events
    pub preselection: Preselection,

    /// Reference HLT paths, at least one of which must fire
    pub reference_paths: Vec<String>,

    /// Signal HLT paths whose efficiency is measured
    pub signal_paths: Vec<String>,

    /// L1 seeds of the signal paths
    pub l1_seeds: Vec<String>,

    /// Where the histograms are saved
    pub output: PathBuf,

    /// Group name under which the histograms are saved
    pub directory: String,
}
//
impl Configuration {
    /// Default configuration of a channel, without any input
    pub fn for_channel(channel: Channel) -> Result<Self> {
        let owned = |paths: &[&str]| paths.iter().map(|&p| p.to_owned()).collect();
        Ok(Self {
            channel,
            inputs: Vec::new(),
            preselection: Preselection::compile(channel.default_preselection())
                .wrap_err("Invalid default preselection")?,
            reference_paths: owned(channel.default_reference()),
            signal_paths: owned(channel.default_signal()),
            l1_seeds: owned(channel.default_l1()),
            output: channel.default_output().into(),
            directory: channel.directory().to_owned(),
        })
    }

    /// Load the configuration from a file, check it, and print it out
    pub fn load(file_name: &str) -> Result<Self> {
        // Read out the job's configuration file or die trying
        let config_str = fs::read_to_string(file_name)
            .wrap_err_with(|| format!("Could not read configuration file {file_name}"))?;
        let config = config_str.parse::<Self>()?;
        config.print();
        Ok(config)
    }

    /// Display the configuration
    pub fn print(&self) {
        info!("Channel         : {}", self.channel);
        for input in &self.inputs {
            info!("Input           : {}", input.display());
        }
        info!("Preselection    : {}", self.preselection);
        info!("Reference paths : {}", self.reference_paths.join(", "));
        info!("Signal paths    : {}", self.signal_paths.join(", "));
        if !self.l1_seeds.is_empty() {
            info!("L1 seeds        : {}", self.l1_seeds.join(", "));
        }
        info!("Output          : {} ({})", self.output.display(), self.directory);
    }
}
//
impl FromStr for Configuration {
    type Err = eyre::Report;

    fn from_str(config_str: &str) -> Result<Self> {
        // Each meaningful line is a key followed by its value(s). Comments
        // start with '#' and run until the end of the line.
        let items = config_str
            .lines()
            .enumerate()
            .filter_map(|(idx, line)| {
                let line = line.split('#').next().unwrap_or("").trim();
                let (key, data) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
                (!key.is_empty()).then(|| ConfigItem::new(key, data.trim(), idx + 1))
            })
            .collect::<Vec<_>>();

        // The channel determines every default, so it must be known first
        let mut channel_items = items.iter().filter(|item| item.key == "channel");
        let channel = channel_items
            .next()
            .ok_or_else(|| eyre!("Missing configuration of channel"))?
            .parse::<Channel>()?;
        if let Some(dup) = channel_items.next() {
            bail!("Duplicate configuration of channel at line {}", dup.line);
        }
        let mut config = Self::for_channel(channel)?;

        // Override defaults with the remaining items
        let mut seen = Vec::new();
        for item in items.iter().filter(|item| item.key != "channel") {
            if item.key != "input" {
                ensure!(
                    !seen.contains(&item.key),
                    "Duplicate configuration of {} at line {}",
                    item.key,
                    item.line
                );
                seen.push(item.key);
            }
            match item.key {
                "input" => config.inputs.extend(item.list()?.into_iter().map(PathBuf::from)),
                "preselection" => {
                    config.preselection = Preselection::compile(item.data).wrap_err_with(|| {
                        format!("Could not parse configuration of preselection at line {}", item.line)
                    })?
                }
                "reference" => config.reference_paths = item.list()?,
                "signal" => config.signal_paths = item.list()?,
                "l1" => config.l1_seeds = item.words()?,
                "output" => config.output = item.single()?.into(),
                "directory" => config.directory = item.single()?.to_owned(),
                other => bail!("Unknown configuration key '{other}' at line {}", item.line),
            }
        }

        // A job without events has nothing to measure
        ensure!(!config.inputs.is_empty(), "Please provide at least one input file");
        Ok(config)
    }
}

/// A value from the configuration file, tagged with its key and location for
/// error reporting purposes.
struct ConfigItem<'data> {
    key: &'data str,
    data: &'data str,
    line: usize,
}
//
impl<'data> ConfigItem<'data> {
    /// Build a config item from a key, its raw data and its line number
    fn new(key: &'data str, data: &'data str, line: usize) -> Self {
        Self { key, data, line }
    }

    /// Parse this data using Rust's standard parsing logic
    fn parse<T: FromStr>(&self) -> Result<T>
    where
        <T as FromStr>::Err: fmt::Display,
    {
        self.data.parse::<T>().map_err(|e| {
            eyre!(
                "Could not parse configuration of {} at line {}: {e}",
                self.key,
                self.line
            )
        })
    }

    /// Exactly one whitespace-free value
    fn single(&self) -> Result<&'data str> {
        let mut words = self.data.split_whitespace();
        match (words.next(), words.next()) {
            (Some(word), None) => Ok(word),
            _ => bail!(
                "Configuration of {} at line {} should be a single value",
                self.key,
                self.line
            ),
        }
    }

    /// Whitespace-separated values, each appearing at most once
    fn words(&self) -> Result<Vec<String>> {
        let mut values = Vec::<String>::new();
        for word in self.data.split_whitespace() {
            ensure!(
                !values.iter().any(|known| known == word),
                "Configuration of {} at line {} lists {word} twice",
                self.key,
                self.line
            );
            values.push(word.to_owned());
        }
        Ok(values)
    }

    /// One or more distinct whitespace-separated values
    fn list(&self) -> Result<Vec<String>> {
        let values = self.words()?;
        ensure!(
            !values.is_empty(),
            "Configuration of {} at line {} needs at least one value",
            self.key,
            self.line
        );
        Ok(values)
    }
}
