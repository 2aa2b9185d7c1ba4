use std::fmt::Write;

use crate::catalog::{Nutrition, Recipe};
use crate::search::QueryResult;

/// Uppercase the first character, like the recipe cards do.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

pub fn format_results(result: &QueryResult, details: bool) -> String {
    let mut out = String::new();
    for (i, m) in result.iter().enumerate() {
        let recipe = &m.recipe;
        let _ = write!(
            out,
            "{}. {} [{}]",
            i + 1,
            capitalize(&recipe.name),
            recipe.difficulty()
        );
        if let Some(sim) = m.similarity {
            let _ = write!(out, "  {sim:.2}% match");
        }
        let _ = writeln!(out, "  (id {})", recipe.id);
        let _ = writeln!(out, "   {}", summary_line(recipe));
        if details {
            out.push_str(&format_details(recipe, "   "));
        }
    }
    out
}

fn summary_line(recipe: &Recipe) -> String {
    format!(
        "{} min · {} steps · {} ingredients · {} kcal",
        format_number(recipe.minutes),
        recipe.n_steps,
        recipe.n_ingredients,
        format_number(recipe.nutrition.calories)
    )
}

fn diet_tags(recipe: &Recipe) -> Vec<&'static str> {
    let mut tags = Vec::new();
    if recipe.is_vegetarian {
        tags.push("vegetarian");
    }
    if recipe.is_vegan {
        tags.push("vegan");
    }
    if recipe.is_gluten_free {
        tags.push("gluten free");
    }
    if recipe.is_dairy_free {
        tags.push("dairy free");
    }
    tags
}

fn format_details(recipe: &Recipe, indent: &str) -> String {
    let mut out = String::new();

    let tags = diet_tags(recipe);
    if !tags.is_empty() {
        let _ = writeln!(out, "{indent}Diet: {}", tags.join(", "));
    }

    let facts: Vec<String> = Nutrition::LABELS
        .iter()
        .zip(recipe.nutrition.as_array())
        .map(|(label, value)| format!("{label} {}", format_number(value)))
        .collect();
    let _ = writeln!(out, "{indent}Nutrition: {}", facts.join(", "));

    let _ = writeln!(out, "{indent}Ingredients ({}):", recipe.n_ingredients);
    for (i, ingredient) in recipe.ingredients.iter().enumerate() {
        let _ = writeln!(out, "{indent}  {}. {}", i + 1, capitalize(ingredient));
    }
    let _ = writeln!(out, "{indent}Steps:");
    for (i, step) in recipe.steps.iter().enumerate() {
        let _ = writeln!(out, "{indent}  Step {}: {}", i + 1, capitalize(step));
    }
    out
}

/// Full card for a single recipe.
pub fn format_recipe(recipe: &Recipe) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} (id {})", capitalize(&recipe.name), recipe.id);
    let _ = writeln!(out, "Difficulty: {}", recipe.difficulty());
    let _ = writeln!(out, "{}", summary_line(recipe));
    out.push_str(&format_details(recipe, ""));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::recipe;
    use crate::search::Match;

    #[test]
    fn capitalize_first_letter() {
        assert_eq!(capitalize("chicken curry"), "Chicken curry");
        assert_eq!(capitalize("élan"), "Élan");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn numbered_results_with_scores() {
        let result = QueryResult {
            matches: vec![
                Match {
                    recipe: recipe("3", "pancakes"),
                    similarity: Some(87.5),
                },
                Match {
                    recipe: recipe("8", "waffles"),
                    similarity: None,
                },
            ],
        };
        let text = format_results(&result, false);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "1. Pancakes [Easy]  87.50% match  (id 3)");
        assert_eq!(lines[1], "   10 min · 2 steps · 2 ingredients · 100 kcal");
        assert_eq!(lines[2], "2. Waffles [Easy]  (id 8)");
    }

    #[test]
    fn details_list_nutrition_in_order() {
        let mut r = recipe("1", "salad");
        r.is_vegan = true;
        let card = format_recipe(&r);
        assert!(card.contains("Diet: vegan"));
        assert!(
            card.contains("Nutrition: calories 100, total fat 1, sugar 2, sodium 3, protein 4")
        );
        assert!(card.contains("  Step 2: Serve"));
    }
}
