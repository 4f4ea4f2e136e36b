//! Keyword-based context extraction from free-text chat messages.
//!
//! Guesses catalog coordinates (crop, problem, application type, product
//! name) from the user's wording so the retrieval layer can query the
//! catalog with exact column values. Detection is intentionally simple:
//! ordered keyword tables, specific terms before generic ones.

use serde::Serialize;

/// Context extracted from a single message, or accumulated over a
/// conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessageContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Generic pH wording that could mean acidity or salinity; retrieval
    /// searches both problem categories.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub ph_generic: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub timing_question: bool,
}

/// Marker problem value for generic pH questions. Retrieval expands it
/// into both acidity and salinity searches.
pub const PH_GENERIC_PROBLEM: &str = "pH Issues";

/// Catalog problem names for the two specific pH classes.
pub const PROBLEM_SOIL_ACIDITY: &str = "Soil Acidity";
pub const PROBLEM_SOIL_SALINITY: &str = "Soil Salinity";

/// Spelling variants of catalog product names. First hit wins.
const PRODUCT_ALIASES: &[(&[&str], &str)] = &[
    (
        &["kelpboost plus", "kelpboost", "kelp boost", "kelpboost+"],
        "KelpBoost Plus",
    ),
    (&["cal-mag", "calmag", "cal mag"], "Cal-Mag"),
    (&["aquafeed", "aqua feed", "aqua-feed"], "AquaFeed"),
    (&["softcal", "soft cal"], "SoftCal"),
];

/// Keyword-to-catalog-crop table, ordered with specific terms before
/// generic ones so e.g. "soybeans" never falls through to "beans".
const CROP_KEYWORDS: &[(&str, &str)] = &[
    ("soybeans", "Soyas and other legumes"),
    ("soybean", "Soyas and other legumes"),
    ("macadamias", "Macadamias & Avos (Other Subtropicals)"),
    ("macadamia", "Macadamias & Avos (Other Subtropicals)"),
    ("avocados", "Macadamias & Avos (Other Subtropicals)"),
    ("avocado", "Macadamias & Avos (Other Subtropicals)"),
    ("seedlings", "Seedlings (Tobacco included)"),
    ("seedling", "Seedlings (Tobacco included)"),
    ("pecans", "Pecan Nuts"),
    ("pecan", "Pecan Nuts"),
    ("subtropicals", "Macadamias & Avos (Other Subtropicals)"),
    ("subtropical", "Macadamias & Avos (Other Subtropicals)"),
    ("tomatoes", "Tomatoes & Vegetables"),
    ("tomato", "Tomatoes & Vegetables"),
    ("potatoes", "Potatoes"),
    ("potato", "Potatoes"),
    ("tobacco", "Field Tobacco"),
    ("maize", "Maize & Wheat"),
    ("corn", "Maize & Wheat"),
    ("wheat", "Maize & Wheat"),
    ("barley", "Maize & Wheat"),
    ("lettuce", "Lettuce"),
    ("cabbage", "Cabbage"),
    ("onions", "Onions"),
    ("onion", "Onions"),
    ("carrots", "Carrots"),
    ("carrot", "Carrots"),
    ("spinach", "Spinach"),
    ("apples", "Deciduous Fruit"),
    ("apple", "Deciduous Fruit"),
    ("pears", "Deciduous Fruit"),
    ("pear", "Deciduous Fruit"),
    ("peaches", "Deciduous Fruit"),
    ("peach", "Deciduous Fruit"),
    ("plums", "Deciduous Fruit"),
    ("plum", "Deciduous Fruit"),
    ("cherries", "Deciduous Fruit"),
    ("cherry", "Deciduous Fruit"),
    ("grapes", "Deciduous Fruit"),
    ("grape", "Deciduous Fruit"),
    ("oranges", "Deciduous Fruit"),
    ("orange", "Deciduous Fruit"),
    ("lemons", "Deciduous Fruit"),
    ("lemon", "Deciduous Fruit"),
    ("citrus", "Deciduous Fruit"),
    ("deciduous", "Deciduous Fruit"),
    ("grass", "Grass pastures"),
    ("pasture", "Grass pastures"),
    ("nursery", "Seedlings (Tobacco included)"),
    ("transplants", "Seedlings (Tobacco included)"),
    ("transplant", "Seedlings (Tobacco included)"),
    ("vegetables", "Tomatoes & Vegetables"),
    ("veggie", "Tomatoes & Vegetables"),
    ("fruits", "Deciduous Fruit"),
    ("fruit", "Deciduous Fruit"),
    ("avos", "Macadamias & Avos (Other Subtropicals)"),
    ("soyas", "Soyas and other legumes"),
    ("soya", "Soyas and other legumes"),
    ("legumes", "Soyas and other legumes"),
    ("legume", "Soyas and other legumes"),
    ("beans", "Soyas and other legumes"),
    ("bean", "Soyas and other legumes"),
    ("peas", "Soyas and other legumes"),
    ("pea", "Soyas and other legumes"),
];

const APPLICATION_KEYWORDS: &[(&str, &[&str])] = &[
    ("Foliar", &["foliar", "spray", "spraying", "leaf", "leaves"]),
    ("Soil", &["soil", "ground", "root", "roots", "planting"]),
    (
        "Water",
        &["water", "irrigation", "irrigate", "hydroponic"],
    ),
];

/// Keyword-to-catalog-problem table. Values are the exact problem names
/// stored in the catalog.
const PROBLEM_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Plant Nutrition",
        &[
            "plant nutrition",
            "nutrient deficiency",
            "nutrients needed",
            "feeding program",
            "npk requirements",
            "nutritional needs",
            "nutrition of",
        ],
    ),
    (
        "Fertilizer Efficiency",
        &[
            "fertilizer efficiency",
            "efficient fertilizer",
            "effectiveness of fertilizer",
            "improve efficiency",
        ],
    ),
    (
        "Soil Health",
        &[
            "disease control",
            "disease prevention",
            "fungus control",
            "pest control",
            "pest management",
            "health problems",
            "soil health",
        ],
    ),
    (
        PROBLEM_SOIL_SALINITY,
        &[
            "soil salinity",
            "salt problems",
            "salty soil",
            "high salinity",
            "alkaline soil",
            "alkaline",
            "high ph",
            "ph too high",
        ],
    ),
    (
        PROBLEM_SOIL_ACIDITY,
        &[
            "soil acidity",
            "acid soil",
            "acidic soil",
            "low ph",
            "ph too low",
            "sour soil",
        ],
    ),
    (
        "Irrigation efficiency",
        &[
            "irrigation efficiency",
            "water efficiency",
            "watering efficiency",
            "irrigation problems",
        ],
    ),
    (
        "Shelf life management",
        &["shelf life", "storage life", "preservation", "post harvest"],
    ),
];

const HIGH_PH_INDICATORS: &[&str] = &[
    "alkaline",
    "alkalinity",
    "high ph",
    "ph too high",
    "ph is high",
    "salty soil",
    "salt problems",
    "high salinity",
    "lime needs",
    "ph above",
    "ph over",
    "basic soil",
];

const LOW_PH_INDICATORS: &[&str] = &[
    "acidic",
    "acidity",
    "acid soil",
    "low ph",
    "ph too low",
    "ph is low",
    "sour soil",
    "ph below",
    "ph under",
];

const TIMING_KEYWORDS: &[&str] = &[
    "timing",
    "when should",
    "what time",
    "schedule",
    "frequency",
    "interval",
    "how often",
    "application timing",
    "spray timing",
    "fertilizer timing",
    "season",
    "seasonal",
    "before planting",
    "after planting",
    "during growing",
    "monthly",
    "weekly",
    "daily",
    "days apart",
    "weeks apart",
    "months apart",
    "how many times",
];

/// True when `needle` appears in `haystack` with non-alphanumeric (or
/// string-edge) characters on both sides. Keeps "nut" from matching
/// "nutrition" and "ph" from matching "phosphorus".
fn contains_word(haystack: &str, needle: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let abs = start + pos;
        let before_ok = abs == 0
            || !haystack[..abs]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let after_ok = !haystack[abs + needle.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = abs + needle.len();
    }
    false
}

/// Classify pH wording into a specific catalog problem, a generic marker,
/// or nothing.
fn classify_ph(message: &str) -> Option<&'static str> {
    if HIGH_PH_INDICATORS.iter().any(|k| message.contains(k)) {
        return Some(PROBLEM_SOIL_SALINITY);
    }
    if LOW_PH_INDICATORS.iter().any(|k| message.contains(k)) {
        return Some(PROBLEM_SOIL_ACIDITY);
    }
    if contains_word(message, "ph") {
        return Some(PH_GENERIC_PROBLEM);
    }
    None
}

/// Extract catalog coordinates from a user message.
pub fn extract_context(message: &str) -> MessageContext {
    let lower = message.to_lowercase();
    let mut ctx = MessageContext::default();

    // Direct product mentions win over everything else.
    'products: for (aliases, canonical) in PRODUCT_ALIASES {
        for alias in *aliases {
            if lower.contains(alias) {
                ctx.product_name = Some((*canonical).to_string());
                break 'products;
            }
        }
    }

    // "nuts" is checked as a whole word first so "nutrition" never reads
    // as a crop.
    if contains_word(&lower, "nuts") || contains_word(&lower, "nut") {
        ctx.crop = Some("Pecan Nuts".to_string());
    } else {
        for (keyword, canonical) in CROP_KEYWORDS {
            if contains_word(&lower, keyword) {
                ctx.crop = Some((*canonical).to_string());
                break;
            }
        }
    }

    for (app_type, keywords) in APPLICATION_KEYWORDS {
        if keywords.iter().any(|k| lower.contains(k)) {
            ctx.application_type = Some((*app_type).to_string());
            break;
        }
    }

    match classify_ph(&lower) {
        Some(PH_GENERIC_PROBLEM) => {
            ctx.ph_generic = true;
            ctx.problem = Some(PH_GENERIC_PROBLEM.to_string());
        }
        Some(specific) => ctx.problem = Some(specific.to_string()),
        None => {
            for (problem, keywords) in PROBLEM_KEYWORDS {
                if keywords.iter().any(|k| lower.contains(k)) {
                    ctx.problem = Some((*problem).to_string());
                    break;
                }
            }
        }
    }

    if TIMING_KEYWORDS.iter().any(|k| lower.contains(k)) {
        ctx.timing_question = true;
    }

    ctx
}

impl MessageContext {
    /// Fold `newer` on top of `self`: newer fields override, flags are
    /// sticky once set.
    pub fn merge_from(&mut self, newer: &MessageContext) {
        if newer.product_name.is_some() {
            self.product_name = newer.product_name.clone();
        }
        if newer.crop.is_some() {
            self.crop = newer.crop.clone();
        }
        if newer.application_type.is_some() {
            self.application_type = newer.application_type.clone();
        }
        if newer.problem.is_some() {
            self.problem = newer.problem.clone();
            self.ph_generic = newer.ph_generic;
        }
        if newer.growth_stage.is_some() {
            self.growth_stage = newer.growth_stage.clone();
        }
        if newer.location.is_some() {
            self.location = newer.location.clone();
        }
        self.timing_question |= newer.timing_question;
    }

    pub fn is_empty(&self) -> bool {
        self.product_name.is_none()
            && self.crop.is_none()
            && self.application_type.is_none()
            && self.problem.is_none()
            && self.growth_stage.is_none()
            && self.location.is_none()
            && !self.ph_generic
            && !self.timing_question
    }
}

/// Accumulate context across prior user messages (oldest first) so newer
/// turns override older ones.
pub fn accumulate_context<'a, I>(user_messages: I) -> MessageContext
where
    I: IntoIterator<Item = &'a str>,
{
    let mut accumulated = MessageContext::default();
    for message in user_messages {
        let ctx = extract_context(message);
        if !ctx.is_empty() {
            accumulated.merge_from(&ctx);
        }
    }
    accumulated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_crop_with_word_boundaries() {
        let ctx = extract_context("What fertilizer should I use for my potatoes?");
        assert_eq!(ctx.crop.as_deref(), Some("Potatoes"));
    }

    #[test]
    fn nutrition_is_not_a_nut_crop() {
        let ctx = extract_context("I want better plant nutrition this season");
        assert_ne!(ctx.crop.as_deref(), Some("Pecan Nuts"));
        assert_eq!(ctx.problem.as_deref(), Some("Plant Nutrition"));
    }

    #[test]
    fn whole_word_nuts_maps_to_pecans() {
        let ctx = extract_context("something for my nut trees");
        assert_eq!(ctx.crop.as_deref(), Some("Pecan Nuts"));
    }

    #[test]
    fn specific_crops_win_over_generic_terms() {
        let ctx = extract_context("my soybean field needs help");
        assert_eq!(ctx.crop.as_deref(), Some("Soyas and other legumes"));

        let ctx = extract_context("growing vegetables in tunnels");
        assert_eq!(ctx.crop.as_deref(), Some("Tomatoes & Vegetables"));
    }

    #[test]
    fn detects_product_alias() {
        let ctx = extract_context("how much kelp boost do I apply per hectare");
        assert_eq!(ctx.product_name.as_deref(), Some("KelpBoost Plus"));
    }

    #[test]
    fn detects_application_type() {
        let ctx = extract_context("can I use a foliar spray on lettuce");
        assert_eq!(ctx.application_type.as_deref(), Some("Foliar"));
        assert_eq!(ctx.crop.as_deref(), Some("Lettuce"));
    }

    #[test]
    fn high_ph_classifies_as_salinity() {
        let ctx = extract_context("my soil is alkaline, ph too high");
        assert_eq!(ctx.problem.as_deref(), Some(PROBLEM_SOIL_SALINITY));
        assert!(!ctx.ph_generic);
    }

    #[test]
    fn low_ph_classifies_as_acidity() {
        let ctx = extract_context("acidic soil is hurting my crop");
        assert_eq!(ctx.problem.as_deref(), Some(PROBLEM_SOIL_ACIDITY));
    }

    #[test]
    fn bare_ph_is_generic() {
        let ctx = extract_context("how do I fix my soil ph");
        assert_eq!(ctx.problem.as_deref(), Some(PH_GENERIC_PROBLEM));
        assert!(ctx.ph_generic);
    }

    #[test]
    fn phosphorus_does_not_trigger_ph() {
        let ctx = extract_context("do I need more phosphorus");
        assert_eq!(ctx.problem, None);
        assert!(!ctx.ph_generic);
    }

    #[test]
    fn detects_timing_question() {
        let ctx = extract_context("how often should I spray my tomatoes?");
        assert!(ctx.timing_question);
        assert_eq!(ctx.crop.as_deref(), Some("Tomatoes & Vegetables"));
    }

    #[test]
    fn merge_newer_overrides_older() {
        let mut older = extract_context("I grow potatoes");
        let newer = extract_context("actually it is field tobacco with salty soil");
        older.merge_from(&newer);

        assert_eq!(older.crop.as_deref(), Some("Field Tobacco"));
        assert_eq!(older.problem.as_deref(), Some(PROBLEM_SOIL_SALINITY));
    }

    #[test]
    fn merge_keeps_older_fields_the_newer_message_lacks() {
        let mut older = extract_context("I have salty soil on my farm");
        let newer = extract_context("the crop is maize");
        older.merge_from(&newer);

        assert_eq!(older.crop.as_deref(), Some("Maize & Wheat"));
        assert_eq!(older.problem.as_deref(), Some(PROBLEM_SOIL_SALINITY));
    }

    #[test]
    fn accumulate_folds_oldest_to_newest() {
        let ctx = accumulate_context(vec![
            "I grow grass pastures",
            "the problem is soil acidity",
            "I meant my potato lands",
        ]);

        assert_eq!(ctx.crop.as_deref(), Some("Potatoes"));
        assert_eq!(ctx.problem.as_deref(), Some(PROBLEM_SOIL_ACIDITY));
    }

    #[test]
    fn timing_flag_is_sticky_across_merges() {
        let mut ctx = extract_context("how often should I apply it?");
        ctx.merge_from(&extract_context("on my apples"));
        assert!(ctx.timing_question);
    }
}
