//! # Brokerage Weights
//!
//! Maps brokerage names to a score multiplier. Houses with a stronger track
//! record get > 1.0; anything unknown gets `default_weight` (1.0).
//!
//! - Built-in seed via `default_seed()`.
//! - Optional override file, TOML or JSON (`default_weight`, `weights`, `aliases`).
//! - Case-insensitive lookup with whitespace/punctuation normalization.
//! - Lookup order: aliases → exact match → default.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

pub const ENV_BROKERAGE_WEIGHTS_PATH: &str = "BROKERAGE_WEIGHTS_PATH";

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerageWeights {
    #[serde(default = "default_default_weight")]
    pub default_weight: f64,
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    /// Alternative spelling → canonical name.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

fn default_default_weight() -> f64 {
    1.0
}

impl Default for BrokerageWeights {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl BrokerageWeights {
    /// Load from an explicit path; the extension picks TOML or JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading brokerage weights from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let raw: Self = match ext.as_str() {
            "toml" => toml::from_str(&content).context("parsing brokerage weights toml")?,
            "json" => serde_json::from_str(&content).context("parsing brokerage weights json")?,
            other => return Err(anyhow!("unsupported brokerage weights format '{other}'")),
        };
        Ok(raw.normalized())
    }

    /// Resolution order:
    /// 1) explicit `path` (from $BROKERAGE_WEIGHTS_PATH)
    /// 2) config/brokerage_weights.toml
    /// 3) config/brokerage_weights.json
    /// 4) built-in seed
    pub fn load_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            if !p.exists() {
                return Err(anyhow!(
                    "{ENV_BROKERAGE_WEIGHTS_PATH} points to non-existent path {}",
                    p.display()
                ));
            }
            return Self::load_from(p);
        }
        for candidate in [
            "config/brokerage_weights.toml",
            "config/brokerage_weights.json",
        ] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Ok(Self::default_seed())
    }

    /// Multiplier for `brokerage`.
    pub fn weight_for(&self, brokerage: &str) -> f64 {
        let b = normalize(brokerage);

        if let Some(canon) = self.aliases.get(&b) {
            if let Some(&w) = self.weights.get(&normalize(canon)) {
                return w;
            }
        }
        if let Some(&w) = self.weights.get(&b) {
            return w;
        }
        self.default_weight
    }

    pub fn default_seed() -> Self {
        let weights = [
            ("The Goldman Sachs Group", 1.5),
            ("JP Morgan", 1.4),
            ("Morgan Stanley", 1.3),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let aliases = [
            ("Goldman Sachs", "The Goldman Sachs Group"),
            ("JPMorgan Chase & Co.", "JP Morgan"),
            ("J.P. Morgan", "JP Morgan"),
        ]
        .into_iter()
        .map(|(a, c)| (a.to_string(), c.to_string()))
        .collect();

        Self {
            default_weight: default_default_weight(),
            weights,
            aliases,
        }
        .normalized()
    }

    /// Normalize keys and drop weights that cannot act as a multiplier.
    fn normalized(self) -> Self {
        let weights = self
            .weights
            .into_iter()
            .filter(|(k, w)| {
                let ok = w.is_finite() && *w > 0.0;
                if !ok {
                    tracing::warn!(brokerage = %k, weight = w, "ignoring invalid brokerage weight");
                }
                ok
            })
            .map(|(k, w)| (normalize(&k), w))
            .collect();
        let aliases = self
            .aliases
            .into_iter()
            .map(|(a, c)| (normalize(&a), normalize(&c)))
            .collect();
        let default_weight = if self.default_weight.is_finite() && self.default_weight > 0.0 {
            self.default_weight
        } else {
            default_default_weight()
        };
        Self {
            default_weight,
            weights,
            aliases,
        }
    }
}

/// Lowercase, drop periods and commas, collapse whitespace.
fn normalize(s: &str) -> String {
    let out = s.trim().to_ascii_lowercase().replace(['.', ','], "");
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
