use optima_core::ConfigSnapshot;

/// Validation limits applied to every uploaded image
#[derive(Debug, Clone)]
pub struct ImageRules {
    /// Absolute max payload size
    pub max_bytes: u64,

    pub max_width: u32,

    pub max_height: u32,

    /// Accepted MIME types, matched against the sniffed format
    pub allowed_types: Vec<String>,
}

impl Default for ImageRules {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024, // 5MB
            max_width: 4096,
            max_height: 4096,
            allowed_types: vec!["image/jpeg".to_string(), "image/png".to_string()],
        }
    }
}

impl ImageRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_bytes(mut self, bytes: u64) -> Self {
        self.max_bytes = bytes;
        self
    }

    pub fn with_max_dimensions(mut self, width: u32, height: u32) -> Self {
        self.max_width = width;
        self.max_height = height;
        self
    }

    pub fn with_allowed_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn allows(&self, content_type: &str) -> bool {
        self.allowed_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(content_type))
    }
}

/// Image handling configuration
#[derive(Debug, Clone)]
pub struct AssetConfig {
    pub rules: ImageRules,

    /// Thumbnails are resized to exactly this width and height
    pub thumbnail_size: u32,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            rules: ImageRules::default(),
            thumbnail_size: 100,
        }
    }
}

impl AssetConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `images.*` keys, falling back to defaults for anything missing
    pub fn from_snapshot(snapshot: &ConfigSnapshot) -> Self {
        let defaults = Self::default();
        let rules = ImageRules {
            max_bytes: snapshot
                .get_u64("images.max_bytes")
                .unwrap_or(defaults.rules.max_bytes),
            max_width: snapshot
                .get_u32("images.max_width")
                .unwrap_or(defaults.rules.max_width),
            max_height: snapshot
                .get_u32("images.max_height")
                .unwrap_or(defaults.rules.max_height),
            allowed_types: snapshot
                .get_list("images.allowed_types")
                .unwrap_or(defaults.rules.allowed_types),
        };

        Self {
            rules,
            thumbnail_size: snapshot
                .get_u32("images.thumbnail_size")
                .filter(|size| *size > 0)
                .unwrap_or(defaults.thumbnail_size),
        }
    }

    pub fn with_rules(mut self, rules: ImageRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_thumbnail_size(mut self, size: u32) -> Self {
        self.thumbnail_size = size;
        self
    }
}
