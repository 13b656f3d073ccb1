// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Meal and workout suggestions returned by the recommendation service.

use serde::{Deserialize, Serialize};

/// A day's suggested meals and workouts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default)]
    pub diet: Vec<MealSuggestion>,
    #[serde(default)]
    pub workouts: Vec<WorkoutSuggestion>,
}

/// One suggested meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealSuggestion {
    /// Breakfast, lunch, dinner, snack...
    #[serde(rename = "type")]
    pub meal_type: String,
    pub menu: String,
    #[serde(default)]
    pub kcal: f64,
    /// Protein grams
    #[serde(default)]
    pub protein: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSuggestion {
    pub name: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub intensity: String,
    #[serde(default)]
    pub description: String,
}
