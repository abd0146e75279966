//! Application configuration for PageGraph.
//!
//! User config lives at `~/.pagegraph/pagegraph.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PageGraphError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pagegraph.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pagegraph";

// ---------------------------------------------------------------------------
// Config structs (matching pagegraph.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tree walking and serializer settings.
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Graph normalization settings.
    #[serde(default)]
    pub normalize: NormalizeConfig,

    /// Document building and chunking settings.
    #[serde(default)]
    pub documents: DocumentsConfig,
}

impl AppConfig {
    /// Check values that serde cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        for (name, pattern) in [
            ("normalize.award_pattern", &self.normalize.award_pattern),
            ("documents.interesting_topics", &self.documents.interesting_topics),
        ] {
            Regex::new(pattern)
                .map_err(|e| PageGraphError::config(format!("invalid {name}: {e}")))?;
        }
        if self.documents.max_words == 0 {
            return Err(PageGraphError::config("documents.max_words must be positive"));
        }
        if self.documents.paragraphs_per_chunk < 2 {
            return Err(PageGraphError::config(
                "documents.paragraphs_per_chunk must be at least 2",
            ));
        }
        Ok(())
    }
}

/// `[extract]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Domains treated as internal. Empty means "same site as the page".
    #[serde(default)]
    pub domains: Vec<String>,

    /// Noise tags dropped from the output; their children are spliced into the parent.
    #[serde(default = "default_exclude_tags")]
    pub exclude_tags: Vec<String>,

    /// Tags whose own text is discarded along with the tag.
    #[serde(default = "default_discard_text_tags")]
    pub discard_text_tags: Vec<String>,

    /// Layout wrappers collapsed when they add nothing.
    #[serde(default = "default_wrapper_tags")]
    pub wrapper_tags: Vec<String>,

    /// Attributes that make a wrapper worth keeping.
    #[serde(default = "default_distinguishing_attrs")]
    pub distinguishing_attrs: Vec<String>,

    /// Footnote marker tags.
    #[serde(default = "default_disclosure_tags")]
    pub disclosure_tags: Vec<String>,

    /// Attribute on a marker tag that carries the external reference id.
    #[serde(default = "default_disclosure_id_attr")]
    pub disclosure_id_attr: String,

    /// CSS selectors used when ingesting raw HTML.
    #[serde(default)]
    pub html: HtmlSelectors,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            exclude_tags: default_exclude_tags(),
            discard_text_tags: default_discard_text_tags(),
            wrapper_tags: default_wrapper_tags(),
            distinguishing_attrs: default_distinguishing_attrs(),
            disclosure_tags: default_disclosure_tags(),
            disclosure_id_attr: default_disclosure_id_attr(),
            html: HtmlSelectors::default(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn default_exclude_tags() -> Vec<String> {
    strings(&[
        "script",
        "style",
        "noscript",
        "template",
        "svg",
        "br",
        "gb-adv-grid",
        "gb-wrapper",
        "gb-responsive-image",
        "adv-col",
        "gb-tab-nav",
        "gb-flyout",
        "gb-main-flyout",
        "gb-sub-flyout",
        "gb-sublinks",
    ])
}
fn default_discard_text_tags() -> Vec<String> {
    strings(&["script", "style", "noscript", "template", "svg"])
}
fn default_wrapper_tags() -> Vec<String> {
    strings(&[
        "div",
        "section",
        "article",
        "nav",
        "aside",
        "header",
        "main",
        "footer",
        "picture",
        "adv-grid",
        "gb-secondary-nav",
    ])
}
fn default_distinguishing_attrs() -> Vec<String> {
    strings(&["class", "id", "role"])
}
fn default_disclosure_tags() -> Vec<String> {
    strings(&["gb-disclosure"])
}
fn default_disclosure_id_attr() -> String {
    "data-disclosure-id".into()
}

/// `[extract.html]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlSelectors {
    #[serde(default = "default_navbar_selector")]
    pub navbar: String,
    #[serde(default = "default_main_selector")]
    pub main: String,
    #[serde(default = "default_footer_selector")]
    pub footer: String,
}

impl Default for HtmlSelectors {
    fn default() -> Self {
        Self {
            navbar: default_navbar_selector(),
            main: default_main_selector(),
            footer: default_footer_selector(),
        }
    }
}

fn default_navbar_selector() -> String {
    "header".into()
}
fn default_main_selector() -> String {
    "main".into()
}
fn default_footer_selector() -> String {
    "footer".into()
}

/// How to settle two different non-null values for the same price field
/// when neither side carries a recency indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    LastWriteWins,
    FirstWriteWins,
}

/// `[normalize]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Brand names stripped from the head title to find the model name.
    #[serde(default = "default_brands")]
    pub brands: Vec<String>,

    /// Known trim names, matched case-insensitively on pages.
    #[serde(default = "default_trim_names")]
    pub trim_names: Vec<String>,

    /// Heading that introduces the trim selector.
    #[serde(default = "default_models_heading")]
    pub models_heading: String,

    /// Maximum siblings scanned after the models heading.
    #[serde(default = "default_trim_window")]
    pub trim_window: usize,

    /// Currency stamped on every price.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Attribute holding the per-region price JSON.
    #[serde(default = "default_regional_price_attr")]
    pub regional_price_attr: String,

    #[serde(default = "default_from_key")]
    pub from_key: String,

    #[serde(default = "default_as_shown_key")]
    pub as_shown_key: String,

    /// Lower-case cues that mark a price block as the starting price.
    #[serde(default = "default_from_cues")]
    pub from_cues: Vec<String>,

    /// Lower-case cues that mark a price block as the as-shown price.
    #[serde(default = "default_as_shown_cues")]
    pub as_shown_cues: Vec<String>,

    /// Case-insensitive pattern for award-like section headings.
    #[serde(default = "default_award_pattern")]
    pub award_pattern: String,

    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            brands: default_brands(),
            trim_names: default_trim_names(),
            models_heading: default_models_heading(),
            trim_window: default_trim_window(),
            currency: default_currency(),
            regional_price_attr: default_regional_price_attr(),
            from_key: default_from_key(),
            as_shown_key: default_as_shown_key(),
            from_cues: default_from_cues(),
            as_shown_cues: default_as_shown_cues(),
            award_pattern: default_award_pattern(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

fn default_brands() -> Vec<String> {
    strings(&["Chevrolet", "GMC", "Buick", "Cadillac"])
}
fn default_trim_names() -> Vec<String> {
    strings(&[
        "WT",
        "Custom",
        "Custom Trail Boss",
        "LT",
        "LT Trail Boss",
        "RST",
        "LTZ",
        "High Country",
        "ZR2",
    ])
}
fn default_models_heading() -> String {
    "Models".into()
}
fn default_trim_window() -> usize {
    8
}
fn default_currency() -> String {
    "CAD".into()
}
fn default_regional_price_attr() -> String {
    "regional-information-json".into()
}
fn default_from_key() -> String {
    "startingPrice".into()
}
fn default_as_shown_key() -> String {
    "asShownPrice".into()
}
fn default_from_cues() -> Vec<String> {
    strings(&["from:", "starting"])
}
fn default_as_shown_cues() -> Vec<String> {
    strings(&["as shown", "as configured"])
}
fn default_award_pattern() -> String {
    r"(?i)\b(award|awards|accolade|accolades|dependab\w*)\b".into()
}

/// `[documents]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    /// Upper bound on words per emitted chunk, title line and cue included.
    #[serde(default = "default_max_words")]
    pub max_words: usize,

    /// Paragraphs grouped per feature chunk before size splitting.
    #[serde(default = "default_paragraphs_per_chunk")]
    pub paragraphs_per_chunk: usize,

    /// Case-insensitive pattern selecting sections that become feature documents.
    #[serde(default = "default_interesting_topics")]
    pub interesting_topics: String,

    /// Cue appended when a chunk references disclosures.
    #[serde(default = "default_disclosure_cue")]
    pub disclosure_cue: String,

    /// Characters scanned after a measurement for an existing converted unit.
    #[serde(default = "default_unit_window")]
    pub unit_window: usize,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            max_words: default_max_words(),
            paragraphs_per_chunk: default_paragraphs_per_chunk(),
            interesting_topics: default_interesting_topics(),
            disclosure_cue: default_disclosure_cue(),
            unit_window: default_unit_window(),
        }
    }
}

fn default_max_words() -> usize {
    350
}
fn default_paragraphs_per_chunk() -> usize {
    3
}
fn default_interesting_topics() -> String {
    r"(?i)towing|trailering|performance|interior|safety|technology|capability|award|accolade|dependab"
        .into()
}
fn default_disclosure_cue() -> String {
    "[See disclosures]".into()
}
fn default_unit_window() -> usize {
    24
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pagegraph/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PageGraphError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pagegraph/pagegraph.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PageGraphError::io(path, e))?;
    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        PageGraphError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let config: AppConfig =
        toml::from_str(content).map_err(|e| PageGraphError::config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PageGraphError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PageGraphError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PageGraphError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
