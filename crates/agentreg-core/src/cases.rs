use crate::errors::ConfigError;
use crate::model::{Case, Severity};
use anyhow::{Context, Result};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

/// Load and validate a case suite from a tabular UTF-8 file.
///
/// The first row is the header. Required columns:
/// `case_id,name,input_prompt,expected_output,severity`; optional columns
/// `owner,tags,min_pass_rate,category` are tolerated when missing.
/// Returned order matches file order (reports render deterministically
/// from it).
pub fn load_cases(path: &Path) -> Result<Vec<Case>> {
    if !path.exists() {
        anyhow::bail!(ConfigError(format!("cases file not found: {}", path.display())));
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read cases file: {}", path.display()))?;
    parse_cases(&raw).map_err(|e| {
        anyhow::Error::new(ConfigError(format!("{}: {}", path.display(), e)))
    })
}

/// Load a suite from either a single CSV file or a directory of CSV files.
pub fn load_suite(path: &Path) -> Result<Vec<Case>> {
    if path.is_dir() {
        load_cases_from_dir(path)
    } else {
        load_cases(path)
    }
}

/// Load every `*.csv` suite in a directory, in filename order. The merged
/// result is still one suite: a `case_id` defined in two files fails fast.
pub fn load_cases_from_dir(dir: &Path) -> Result<Vec<Case>> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read cases directory: {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    files.sort();

    let mut seen = HashSet::new();
    let mut all = Vec::new();
    for file in files {
        let cases = load_cases(&file)?;
        for case in &cases {
            if !seen.insert(case.case_id.clone()) {
                anyhow::bail!(ConfigError(format!(
                    "{}: duplicate case_id '{}' already defined in another suite file",
                    file.display(),
                    case.case_id
                )));
            }
        }
        all.extend(cases);
    }
    Ok(all)
}

fn parse_cases(raw: &str) -> std::result::Result<Vec<Case>, String> {
    let mut rows = split_csv(raw);
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let header = rows.remove(0);
    let col = |name: &str| header.iter().position(|h| h.trim() == name);

    let required = ["case_id", "name", "input_prompt", "expected_output", "severity"];
    for name in required {
        if col(name).is_none() {
            return Err(format!("missing required column '{}'", name));
        }
    }
    let idx_case_id = col("case_id").unwrap();
    let idx_name = col("name").unwrap();
    let idx_prompt = col("input_prompt").unwrap();
    let idx_expected = col("expected_output").unwrap();
    let idx_severity = col("severity").unwrap();
    let idx_owner = col("owner");
    let idx_tags = col("tags");
    let idx_min_rate = col("min_pass_rate");
    let idx_category = col("category");

    let field = |row: &[String], idx: usize| -> String {
        row.get(idx).map(|s| s.trim().to_string()).unwrap_or_default()
    };
    let opt_field = |row: &[String], idx: Option<usize>| -> Option<String> {
        idx.map(|i| field(row, i)).filter(|s| !s.is_empty())
    };

    let mut seen = HashSet::new();
    let mut cases = Vec::new();
    for (line_no, row) in rows.iter().enumerate() {
        // Tolerate a blank trailing row.
        if row.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let row_label = line_no + 2; // 1-based, after the header

        let case_id = field(row, idx_case_id);
        if case_id.is_empty() {
            return Err(format!("row {}: empty case_id", row_label));
        }
        if !seen.insert(case_id.clone()) {
            return Err(format!("row {}: duplicate case_id '{}'", row_label, case_id));
        }

        let raw_severity = field(row, idx_severity);
        let severity = Severity::parse(&raw_severity)
            .ok_or_else(|| format!("row {}: unknown severity '{}'", row_label, raw_severity))?;

        let min_pass_rate = match opt_field(row, idx_min_rate) {
            Some(raw) => {
                let v: f64 = raw.parse().map_err(|_| {
                    format!("row {}: min_pass_rate '{}' is not a number", row_label, raw)
                })?;
                if !(0.0..=1.0).contains(&v) {
                    return Err(format!(
                        "row {}: min_pass_rate {} out of range [0, 1]",
                        row_label, v
                    ));
                }
                Some(v)
            }
            None => None,
        };

        let tags = opt_field(row, idx_tags)
            .map(|raw| split_tags(&raw))
            .unwrap_or_default();

        cases.push(Case {
            case_id,
            name: field(row, idx_name),
            input_prompt: field(row, idx_prompt),
            expected_output: field(row, idx_expected),
            severity,
            owner: opt_field(row, idx_owner),
            tags,
            min_pass_rate,
            category: opt_field(row, idx_category),
        });
    }
    Ok(cases)
}

fn split_tags(raw: &str) -> BTreeSet<String> {
    raw.split(['|', ','])
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Minimal RFC-4180 field splitting: quoted fields may contain commas,
/// doubled quotes, and newlines.
fn split_csv(raw: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

/// Render cases back to the tabular format. Used by tests to assert the
/// load → render → load round-trip.
pub fn render_cases(cases: &[Case]) -> String {
    let mut out = String::from(
        "case_id,name,input_prompt,expected_output,severity,owner,tags,min_pass_rate,category\n",
    );
    for c in cases {
        let tags = c.tags.iter().cloned().collect::<Vec<_>>().join("|");
        let min_rate = c.min_pass_rate.map(|v| v.to_string()).unwrap_or_default();
        let fields = [
            c.case_id.as_str(),
            c.name.as_str(),
            c.input_prompt.as_str(),
            c.expected_output.as_str(),
            c.severity.as_str(),
            c.owner.as_deref().unwrap_or(""),
            tags.as_str(),
            min_rate.as_str(),
            c.category.as_deref().unwrap_or(""),
        ];
        let line: Vec<String> = fields.iter().map(|f| quote_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

fn quote_field(f: &str) -> String {
    if f.contains([',', '"', '\n']) {
        format!("\"{}\"", f.replace('"', "\"\""))
    } else {
        f.to_string()
    }
}
