use crate::errors::ConfigError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fully-resolved gate thresholds. All pass rates are fractions in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    pub s1_min_pass_rate: f64,
    pub overall_min_pass_rate: f64,
    pub max_worst_case_delta: f64,
    pub latency_p95_max_ratio: f64,
    pub token_delta_max_ratio: f64,
    pub fail_on_new_regression: bool,
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            s1_min_pass_rate: 1.0,
            overall_min_pass_rate: 0.8,
            max_worst_case_delta: 0.0,
            latency_p95_max_ratio: 1.5,
            token_delta_max_ratio: 1.25,
            fail_on_new_regression: true,
        }
    }
}

/// Partial rule block: unset fields inherit from whatever they overlay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleOverlay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s1_min_pass_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_min_pass_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_worst_case_delta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_p95_max_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_delta_max_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_on_new_regression: Option<bool>,
}

impl RuleOverlay {
    fn apply(&self, rules: &mut Ruleset) {
        if let Some(v) = self.s1_min_pass_rate {
            rules.s1_min_pass_rate = v;
        }
        if let Some(v) = self.overall_min_pass_rate {
            rules.overall_min_pass_rate = v;
        }
        if let Some(v) = self.max_worst_case_delta {
            rules.max_worst_case_delta = v;
        }
        if let Some(v) = self.latency_p95_max_ratio {
            rules.latency_p95_max_ratio = v;
        }
        if let Some(v) = self.token_delta_max_ratio {
            rules.token_delta_max_ratio = v;
        }
        if let Some(v) = self.fail_on_new_regression {
            rules.fail_on_new_regression = v;
        }
    }
}

/// Match conditions for an override entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchWhen {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub when: MatchWhen,
    #[serde(default)]
    pub rules: RuleOverlay,
}

/// The gate configuration document: a default block plus ordered overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    #[serde(default)]
    pub default: RuleOverlay,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<OverrideEntry>,
}

impl GateConfig {
    /// Resolve the effective ruleset for a run context. Starts from the
    /// built-in defaults, overlays the `default` block, then every override
    /// entry in document order whose `when` matches any label (case
    /// insensitive) or any changed file against any glob.
    pub fn resolve(&self, labels: &[String], changed_files: &[String]) -> Ruleset {
        let mut rules = Ruleset::default();
        self.default.apply(&mut rules);
        for entry in &self.overrides {
            if entry_matches(&entry.when, labels, changed_files) {
                entry.rules.apply(&mut rules);
            }
        }
        rules
    }
}

fn entry_matches(when: &MatchWhen, labels: &[String], changed_files: &[String]) -> bool {
    // An entry with no conditions never matches (safety net against a
    // stray override silently rewriting every run).
    if when.labels.is_empty() && when.paths.is_empty() {
        return false;
    }
    let label_hit = when.labels.iter().any(|rule_label| {
        labels.iter().any(|l| l.eq_ignore_ascii_case(rule_label))
    });
    let path_hit = when
        .paths
        .iter()
        .any(|pat| changed_files.iter().any(|f| glob_match(pat, f)));
    label_hit || path_hit
}

/// Load the configuration document. With no explicit path, `.agentreg.yml`
/// (or `.yaml`) in the working directory is picked up; otherwise built-in
/// defaults apply. An explicit path that does not exist is a usage error.
pub fn load_config(path: Option<&Path>) -> Result<GateConfig> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                anyhow::bail!(ConfigError(format!("config file not found: {}", p.display())));
            }
            p.to_path_buf()
        }
        None => {
            let candidates = [".agentreg.yml", ".agentreg.yaml"];
            match candidates.iter().map(Path::new).find(|p| p.exists()) {
                Some(p) => p.to_path_buf(),
                None => return Ok(GateConfig::default()),
            }
        }
    };

    let raw = std::fs::read_to_string(&path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
    let cfg: GateConfig = serde_yaml::from_str(&raw)
        .map_err(|e| ConfigError(format!("failed to parse config {}: {}", path.display(), e)))?;
    validate(&cfg, &path)?;
    Ok(cfg)
}

fn validate(cfg: &GateConfig, path: &Path) -> Result<()> {
    let blocks = std::iter::once(&cfg.default).chain(cfg.overrides.iter().map(|o| &o.rules));
    for block in blocks {
        for (field, value) in [
            ("s1_min_pass_rate", block.s1_min_pass_rate),
            ("overall_min_pass_rate", block.overall_min_pass_rate),
        ] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    anyhow::bail!(ConfigError(format!(
                        "{}: {} {} out of range [0, 1]",
                        path.display(),
                        field,
                        v
                    )));
                }
            }
        }
        for (field, value) in [
            ("latency_p95_max_ratio", block.latency_p95_max_ratio),
            ("token_delta_max_ratio", block.token_delta_max_ratio),
        ] {
            if let Some(v) = value {
                if v <= 0.0 {
                    anyhow::bail!(ConfigError(format!(
                        "{}: {} must be positive, got {}",
                        path.display(),
                        field,
                        v
                    )));
                }
            }
        }
    }
    Ok(())
}

/// fnmatch-style glob: `*` matches any run of characters (including `/`),
/// `?` matches a single character. `**` therefore behaves like `*`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();
    glob_match_at(&pat, &txt)
}

fn glob_match_at(pat: &[char], txt: &[char]) -> bool {
    match pat.first() {
        None => txt.is_empty(),
        Some('*') => {
            // Collapse consecutive stars, then try every suffix.
            let rest = &pat[pat.iter().take_while(|c| **c == '*').count()..];
            (0..=txt.len()).any(|i| glob_match_at(rest, &txt[i..]))
        }
        Some('?') => !txt.is_empty() && glob_match_at(&pat[1..], &txt[1..]),
        Some(c) => txt.first() == Some(c) && glob_match_at(&pat[1..], &txt[1..]),
    }
}
