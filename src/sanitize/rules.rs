use std::collections::HashMap;

/// How aggressively injection stripping treats a string leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripMode {
    /// Remove the sentinel and both brace characters.
    Strict,
    /// Remove only sentinel-prefixed operator keywords and sentinel-dot sequences.
    Lenient,
    /// Pass through untouched.
    None,
}

/// Per-request stripping configuration.
///
/// Resolution order for a string leaf: explicit path override, field-name
/// override, password-like field name, then the default mode.
#[derive(Debug, Clone)]
pub struct SanitizeRules {
    default_mode: StripMode,
    by_path: HashMap<String, StripMode>,
    by_field: HashMap<String, StripMode>,
    password_fields: Vec<String>,
}

impl Default for SanitizeRules {
    fn default() -> Self {
        Self {
            default_mode: StripMode::Strict,
            by_path: HashMap::new(),
            by_field: HashMap::new(),
            password_fields: Vec::new(),
        }
    }
}

impl SanitizeRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override a single location, e.g. `address.street` or `photos[2]`.
    pub fn with_path(mut self, path: impl Into<String>, mode: StripMode) -> Self {
        self.by_path.insert(path.into(), mode);
        self
    }

    /// Override every occurrence of a field name, at any depth.
    pub fn with_field(mut self, field: impl Into<String>, mode: StripMode) -> Self {
        self.by_field.insert(field.into().to_ascii_lowercase(), mode);
        self
    }

    /// Declare an additional password-like field beyond the name heuristic.
    pub fn with_password_field(mut self, field: impl Into<String>) -> Self {
        self.password_fields.push(field.into().to_ascii_lowercase());
        self
    }

    pub fn resolve(&self, path: &str, field: &str) -> StripMode {
        if let Some(mode) = self.by_path.get(path) {
            return *mode;
        }
        let field = field.to_ascii_lowercase();
        if let Some(mode) = self.by_field.get(&field) {
            return *mode;
        }
        if self.is_password_like(&field) {
            return StripMode::Lenient;
        }
        self.default_mode
    }

    fn is_password_like(&self, field: &str) -> bool {
        field.contains("password")
            || field.contains("token")
            || field == "confirmpassword"
            || self.password_fields.iter().any(|name| name == field)
    }
}
