use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Five nutrition facts, always in this order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    pub calories: f64,
    pub total_fat: f64,
    pub sugar: f64,
    pub sodium: f64,
    pub protein: f64,
}

impl Nutrition {
    pub const LABELS: [&'static str; 5] = ["calories", "total fat", "sugar", "sodium", "protein"];

    pub fn as_array(&self) -> [f64; 5] {
        [
            self.calories,
            self.total_fat,
            self.sugar,
            self.sodium,
            self.protein,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.as_array().iter().all(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub n_steps: u32,
    pub n_ingredients: u32,
    pub minutes: f64,
    pub nutrition: Nutrition,
    #[serde(default)]
    pub is_vegetarian: bool,
    #[serde(default)]
    pub is_vegan: bool,
    #[serde(default)]
    pub is_gluten_free: bool,
    #[serde(default)]
    pub is_dairy_free: bool,
}

impl Recipe {
    /// Derived from the current step and ingredient counts on every call.
    pub fn difficulty(&self) -> Difficulty {
        Difficulty::from_counts(self.n_steps, self.n_ingredients)
    }

    /// Reject records that would render as garbage downstream.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("empty id".into());
        }
        if self.name.trim().is_empty() {
            return Err(format!("recipe {} has an empty name", self.id));
        }
        if !self.minutes.is_finite() || self.minutes < 0.0 {
            return Err(format!(
                "recipe {} has an invalid cook time {}",
                self.id, self.minutes
            ));
        }
        if !self.nutrition.is_finite() {
            return Err(format!("recipe {} has non-finite nutrition facts", self.id));
        }
        Ok(())
    }
}

/// Trim ingredient names and drop the empty ones.
pub fn normalize_ingredients<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// `min(2, (n_steps + n_ingredients) / 10)`.
    pub fn from_counts(n_steps: u32, n_ingredients: u32) -> Self {
        let bucket = (u64::from(n_steps) + u64::from(n_ingredients)) / 10;
        match bucket.min(2) {
            0 => Difficulty::Easy,
            1 => Difficulty::Medium,
            _ => Difficulty::Hard,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" | "0" => Ok(Difficulty::Easy),
            "medium" | "1" => Ok(Difficulty::Medium),
            "hard" | "2" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}' (expected easy, medium or hard)")),
        }
    }
}
