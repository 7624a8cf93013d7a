//! Fixed topic vocabulary and the fixed-shape score vector built from it.
//!
//! Every row carries exactly one score per vocabulary entry. Topic ids
//! never appear or disappear once a run has started; unknown ids coming
//! from the annotations are reported and dropped.

use std::collections::HashMap;

/// Prefix every topic id carries; stripped for display.
pub const TOPIC_PREFIX: &str = "topic_";

/// Built-in vocabulary. Must stay in sync with the `prop_topic_*`
/// attributes the extraction rules emit.
pub const DEFAULT_TOPICS: &[&str] = &[
    "topic_3D_printing", "topic_agriculture", "topic_artificial_intelligence",
    "topic_baby_boomers", "topic_big_data", "topic_bitcoin", "topic_bitcoin_cash",
    "topic_blockchain", "topic_buybacks", "topic_cars", "topic_catholic",
    "topic_clean_energy", "topic_cleantech", "topic_climate_change",
    "topic_cloud_computing", "topic_coal", "topic_coins", "topic_computer_vision",
    "topic_consumer_preference", "topic_cybersecurity", "topic_demographics",
    "topic_development", "topic_drip_irrigation", "topic_driverless_cars",
    "topic_drone", "topic_ecommerce", "topic_electric_vehicle",
    "topic_employeetreatment", "topic_entrepreneurship", "topic_environmental",
    "topic_esg", "topic_ethereum", "topic_fintech", "topic_food", "topic_fossil_free",
    "topic_gaming", "topic_gen_x", "topic_gender", "topic_geothermal",
    "topic_global_goals", "topic_governance", "topic_health_tech",
    "topic_home_ownership", "topic_human_rights", "topic_hydro", "topic_immunotherapy",
    "topic_insurtech", "topic_iot", "topic_IPOs", "topic_leisure",
    "topic_lending_platforms", "topic_lgbt", "topic_logistics", "topic_luxury",
    "topic_manufacturing", "topic_marijuana", "topic_medical_devices",
    "topic_military", "topic_military_spending", "topic_millenials", "topic_mri",
    "topic_music", "topic_natural_language_processing", "topic_nuclear",
    "topic_organic", "topic_outsourcing", "topic_payments", "topic_pets",
    "topic_philantropy", "topic_precision_agriculture", "topic_qsr",
    "topic_renewable_energy", "topic_ripple", "topic_roboadvisors", "topic_robotics",
    "topic_seniors", "topic_sensors", "topic_shale", "topic_social",
    "topic_social_media", "topic_solar_energy", "topic_spinoffs", "topic_sports",
    "topic_stemcell", "topic_streaming", "topic_tech", "topic_travel", "topic_vice",
    "topic_virtual_reality", "topic_water", "topic_wealthtech", "topic_wearable_tech",
    "topic_wellness", "topic_wind_energy", "topic_women", "topic_precision_medicine",
    "topic_forestry", "topic_telecom", "topic_smartphones", "topic_quantum",
    "topic_nanotech", "topic_saas", "topic_waste_management", "topic_cancer_treatment",
    "topic_vegan", "topic_adult_entertainment", "topic_healthcare",
    "topic_digital_health", "topic_medical_tech", "topic_toys", "topic_children",
    "topic_infrastructure", "topic_productivity", "topic_data_center",
    "topic_agribusiness", "topic_movie", "topic_space", "topic_halloween",
    "topic_islam", "topic_education", "topic_battery_tech", "topic_art_theme",
    "topic_books", "topic_adtech", "topic_edtech", "topic_dating", "topic_agrotech",
    "topic_diversity", "topic_innovation", "topic_veteran", "topic_fiveg",
    "topic_esg_theme",
];

// ── Vocabulary ───────────────────────────────────────────────────────

/// The run-wide topic vocabulary plus the cosmetic display-name remap.
#[derive(Debug, Clone)]
pub struct TopicVocabulary {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    /// Stripped name → prettier name
    remap: HashMap<String, String>,
}

impl TopicVocabulary {
    /// Build a vocabulary. Duplicate ids keep their first position.
    pub fn new<I, S>(ids: I, remap: HashMap<String, String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = Vec::new();
        let mut index = HashMap::new();
        for id in ids {
            let id: String = id.into();
            if index.contains_key(&id) {
                continue;
            }
            index.insert(id.clone(), out.len());
            out.push(id);
        }
        Self {
            ids: out,
            index,
            remap,
        }
    }

    pub fn builtin(remap: HashMap<String, String>) -> Self {
        Self::new(DEFAULT_TOPICS.iter().copied(), remap)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Column name used in the output tables: `topic_` stripped, then remapped.
    pub fn display_name(&self, id: &str) -> String {
        let stripped = id.strip_prefix(TOPIC_PREFIX).unwrap_or(id);
        self.remap
            .get(stripped)
            .cloned()
            .unwrap_or_else(|| stripped.to_string())
    }

    /// Vocabulary positions ordered case-insensitively by id, for presentation.
    pub fn presentation_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.ids.len()).collect();
        order.sort_by_key(|&i| self.ids[i].to_lowercase());
        order
    }
}

// ── Scores ───────────────────────────────────────────────────────────

/// One score per vocabulary entry, addressed by vocabulary position.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicScores {
    values: Vec<f64>,
}

impl TopicScores {
    /// All-zero scores shaped by `vocab`.
    pub fn zeroed(vocab: &TopicVocabulary) -> Self {
        Self {
            values: vec![0.0; vocab.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, pos: usize) -> f64 {
        self.values.get(pos).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, pos: usize, value: f64) {
        if let Some(slot) = self.values.get_mut(pos) {
            *slot = value;
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Apply `f` to every score, keeping the shape.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }

    pub fn is_all_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }
}

/// Render a score the way the CSV consumers expect: integral values keep
/// one decimal ("1.0"), zero is never signed.
pub fn format_score(value: f64) -> String {
    if value == 0.0 {
        "0.0".to_string()
    } else if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}
