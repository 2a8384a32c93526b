// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model pricing tables and cost calculation.
//!
//! USD per million tokens, list prices as of 2026-03:
//!
//! Claude Haiku:      input=$0.80  output=$4.00
//! Claude Sonnet:     input=$3.00  output=$15.00
//! Claude Opus:       input=$15.00 output=$75.00
//! GPT-4o mini:       input=$0.15  output=$0.60
//! GPT-4o / GPT-4.1:  input=$2.50  output=$10.00
//! Gemini Flash:      input=$0.10  output=$0.40
//! Gemini Pro:        input=$1.25  output=$10.00

use switchboard_core::TokenUsage;

/// Per-model pricing in USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

const fn price(input_per_mtok: f64, output_per_mtok: f64) -> ModelPricing {
    ModelPricing {
        input_per_mtok,
        output_per_mtok,
    }
}

/// Look up pricing for a model identifier by family substring.
///
/// OpenRouter-style ids ("anthropic/claude-3.5-haiku") match the same way.
/// Unknown models are priced like a mid-tier model so spend is never
/// under-reported as zero.
pub fn get_pricing(model: &str) -> ModelPricing {
    let lower = model.to_lowercase();
    let table: [(&str, ModelPricing); 7] = [
        ("opus", price(15.0, 75.0)),
        ("haiku", price(0.80, 4.0)),
        ("sonnet", price(3.0, 15.0)),
        ("gpt-4o-mini", price(0.15, 0.60)),
        ("gpt-4.1-mini", price(0.40, 1.60)),
        ("flash", price(0.10, 0.40)),
        ("gemini", price(1.25, 10.0)),
    ];
    table
        .iter()
        .find(|(family, _)| lower.contains(family))
        .map(|(_, p)| *p)
        .unwrap_or_else(|| {
            if lower.contains("gpt-4") {
                price(2.50, 10.0)
            } else {
                price(3.0, 15.0)
            }
        })
}

/// Cost in USD: (tokens / 1M) * price for each direction.
pub fn calculate_cost(usage: &TokenUsage, pricing: &ModelPricing) -> f64 {
    let input = (usage.prompt_tokens as f64 / 1_000_000.0) * pricing.input_per_mtok;
    let output = (usage.completion_tokens as f64 / 1_000_000.0) * pricing.output_per_mtok;
    input + output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_families() {
        assert_eq!(get_pricing("claude-sonnet-4-20250514"), price(3.0, 15.0));
        assert_eq!(get_pricing("claude-haiku-4-5"), price(0.80, 4.0));
        assert_eq!(get_pricing("anthropic/claude-opus-4"), price(15.0, 75.0));
    }

    #[test]
    fn openai_and_gemini_families() {
        assert_eq!(get_pricing("gpt-4o-mini"), price(0.15, 0.60));
        assert_eq!(get_pricing("gpt-4o-2024-08-06"), price(2.50, 10.0));
        assert_eq!(get_pricing("gemini-2.0-flash"), price(0.10, 0.40));
        assert_eq!(get_pricing("google/gemini-2.5-pro"), price(1.25, 10.0));
    }

    #[test]
    fn unknown_model_is_never_free() {
        let p = get_pricing("mystery-model");
        assert!(p.input_per_mtok > 0.0 && p.output_per_mtok > 0.0);
    }

    #[test]
    fn cost_formula() {
        let usage = TokenUsage {
            prompt_tokens: 1000,
            completion_tokens: 500,
        };
        let cost = calculate_cost(&usage, &get_pricing("claude-sonnet-4"));
        let expected = 0.003 + 0.0075;
        assert!((cost - expected).abs() < 1e-10, "expected {expected}, got {cost}");
        assert_eq!(calculate_cost(&TokenUsage::default(), &get_pricing("gpt-4o")), 0.0);
    }
}
