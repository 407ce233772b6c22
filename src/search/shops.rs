use std::collections::HashMap;

const BUILTIN_SHOP_NAMES: &[(&str, &str)] = &[
    ("gudvin", "Gudvin Group"),
    ("promispb", "Promispb"),
    ("hozka", "Hozka.pro"),
    ("artplast", "ArtPlast"),
    ("newpackspb", "NewPacksPB"),
    ("promindus", "Promindus"),
];

/// Shop key to human-readable heading.
#[derive(Debug, Clone, Default)]
pub struct ShopNames {
    overrides: HashMap<String, String>,
}

impl ShopNames {
    pub fn new(overrides: HashMap<String, String>) -> Self {
        let overrides = overrides
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self { overrides }
    }

    pub fn display_name(&self, key: &str) -> String {
        let lower = key.to_lowercase();
        if let Some(name) = self.overrides.get(&lower) {
            return name.clone();
        }
        if let Some((_, name)) = BUILTIN_SHOP_NAMES.iter().find(|(k, _)| *k == lower) {
            return (*name).to_string();
        }
        capitalize(key)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
