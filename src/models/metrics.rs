// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Body metrics and the derived nutrition targets.
//!
//! Basal metabolic rate uses the Mifflin-St Jeor equation. Everything in
//! [`DerivedMetrics`] is recomputable from [`BodyMetrics`] and must be
//! recomputed whenever any input changes.

use serde::{Deserialize, Serialize};

/// Biological sex, used only to select equation coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    #[default]
    Male,
    Female,
}

/// Activity multiplier applied to BMR to get TDEE.
///
/// Serialized as the bare coefficient (e.g. `1.375`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum ActivityLevel {
    #[default]
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    pub const ALL: [ActivityLevel; 5] = [
        ActivityLevel::Sedentary,
        ActivityLevel::Light,
        ActivityLevel::Moderate,
        ActivityLevel::Active,
        ActivityLevel::VeryActive,
    ];

    pub fn coefficient(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.9,
        }
    }
}

impl TryFrom<f64> for ActivityLevel {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|level| (level.coefficient() - value).abs() < 1e-9)
            .ok_or_else(|| format!("unsupported activity coefficient {value}"))
    }
}

impl From<ActivityLevel> for f64 {
    fn from(level: ActivityLevel) -> f64 {
        level.coefficient()
    }
}

/// Default deficit percentage for new profiles.
pub const DEFAULT_DEFICIT_PERCENT: u8 = 10;

/// Raw body metrics as entered by the user.
///
/// Height, weight and age stay `None` until entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyMetrics {
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub sex: Sex,
    pub age: Option<u32>,
    pub activity: ActivityLevel,
    /// Percent of TDEE to subtract, 1..=20
    pub deficit_percent: u8,
}

impl Default for BodyMetrics {
    fn default() -> Self {
        Self {
            height_cm: None,
            weight_kg: None,
            sex: Sex::Male,
            age: None,
            activity: ActivityLevel::Sedentary,
            deficit_percent: DEFAULT_DEFICIT_PERCENT,
        }
    }
}

/// Daily macro targets in grams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Macros {
    pub carb_g: u32,
    pub protein_g: u32,
    pub fat_g: u32,
}

impl Macros {
    /// Energy content of the macros in kcal (4/4/9).
    pub fn kcal(&self) -> u32 {
        self.carb_g * 4 + self.protein_g * 4 + self.fat_g * 9
    }
}

/// Nutrition targets derived from [`BodyMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub bmr: u32,
    pub tdee: u32,
    pub target_calories: u32,
    pub macros: Macros,
}

const FAT_SHARE: f64 = 0.25;

/// Compute BMR, TDEE, target intake and macros.
///
/// Returns `None` while height, weight or age is missing or non-positive;
/// that means "not yet computable", never a zero target.
pub fn derive_metrics(metrics: &BodyMetrics) -> Option<DerivedMetrics> {
    let height = metrics.height_cm.filter(|h| *h > 0.0)?;
    let weight = metrics.weight_kg.filter(|w| *w > 0.0)?;
    let age = f64::from(metrics.age.filter(|a| *a > 0)?);

    let base = 10.0 * weight + 6.25 * height - 5.0 * age;
    let bmr = match metrics.sex {
        Sex::Male => base + 5.0,
        Sex::Female => base - 161.0,
    };

    let tdee = bmr * metrics.activity.coefficient();
    let target_calories = tdee * (1.0 - f64::from(metrics.deficit_percent) / 100.0);

    let protein_g = match metrics.sex {
        Sex::Male => weight * 2.0,
        Sex::Female => weight * 1.5,
    };
    let protein_kcal = protein_g * 4.0;
    let fat_kcal = target_calories * FAT_SHARE;
    let carb_kcal = (target_calories - protein_kcal - fat_kcal).max(0.0);

    Some(DerivedMetrics {
        bmr: round_kcal(bmr),
        tdee: round_kcal(tdee),
        target_calories: round_kcal(target_calories),
        macros: Macros {
            carb_g: round_kcal(carb_kcal / 4.0),
            protein_g: round_kcal(protein_g),
            fat_g: round_kcal(fat_kcal / 9.0),
        },
    })
}

fn round_kcal(value: f64) -> u32 {
    value.round().max(0.0) as u32
}
