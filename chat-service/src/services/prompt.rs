//! System-prompt assembly for the advisory chat.
//!
//! Turns catalog rows and extracted context into the system prompt sent to
//! the model: persona and formatting rules, a numbered product-context
//! section, the known user context, and a per-scenario guidance block.

use crate::models::Product;
use crate::services::context::MessageContext;
use serde::Serialize;

const SYSTEM_PROMPT_BASE: &str = "\
You are an agricultural product advisor for a speciality fertilizer catalog.

YOUR ROLE:
- Give practical farming advice using only products from the catalog context below
- Make clear, friendly recommendations in conversational language
- Help growers choose the right product for their crop, problem and application method

BOUNDARIES:
- Only discuss products that appear in the catalog context
- Never recommend competitor products
- Stay on farming and agriculture; never give legal advice

FORMATTING:
- Use ## for section headings and ### for product names
- Use short bullet lists under each product for application and timing details
- Reproduce document URLs exactly as they appear in the context, as \"Name - URL\" lines
- Write like a helpful agronomist, not a database; never show internal analysis to the user
";

const SAFETY_GUIDELINES: &str = "\
SAFETY REMINDERS:
- Always follow product label instructions
- Use appropriate protective equipment
- Consider local weather and soil conditions
- Consult local agricultural extension services for regional advice
";

/// How complete the gathered context is, and what to ask for next.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SufficiencyAnalysis {
    pub sufficient: bool,
    pub missing_params: Vec<&'static str>,
    pub completeness_score: f32,
    pub scenario: Scenario,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_message: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    ProductDirect,
    CropOnly,
    ProblemFocused,
    ProblemAndCrop,
    ApplicationOnly,
    Insufficient,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::ProductDirect => "product_direct",
            Scenario::CropOnly => "crop_only",
            Scenario::ProblemFocused => "problem_focused",
            Scenario::ProblemAndCrop => "problem_and_crop",
            Scenario::ApplicationOnly => "application_only",
            Scenario::Insufficient => "insufficient",
        }
    }
}

/// Decide whether the merged context supports a targeted recommendation.
pub fn analyze_context(context: &MessageContext) -> SufficiencyAnalysis {
    if context.product_name.is_some() {
        return SufficiencyAnalysis {
            sufficient: true,
            missing_params: vec![],
            completeness_score: 1.0,
            scenario: Scenario::ProductDirect,
            prompt_message: None,
        };
    }

    let has_crop = context.crop.is_some();
    let has_problem = context.problem.is_some();
    let has_application = context.application_type.is_some();

    if has_crop && !has_problem && !has_application {
        return SufficiencyAnalysis {
            sufficient: false,
            missing_params: vec!["problem", "application_type"],
            completeness_score: 0.33,
            scenario: Scenario::CropOnly,
            prompt_message: Some(
                "I see you mentioned a crop. To provide the best recommendation, could you \
                 tell me what specific problem you're trying to solve or what application \
                 method you plan to use?",
            ),
        };
    }

    if has_problem && !has_crop {
        return SufficiencyAnalysis {
            sufficient: true,
            missing_params: vec!["crop"],
            completeness_score: 0.67,
            scenario: Scenario::ProblemFocused,
            prompt_message: Some(
                "I can show you products for this problem. For more targeted \
                 recommendations, what crop are you working with?",
            ),
        };
    }

    if has_problem && has_crop {
        return SufficiencyAnalysis {
            sufficient: true,
            missing_params: vec![],
            completeness_score: 1.0,
            scenario: Scenario::ProblemAndCrop,
            prompt_message: None,
        };
    }

    if has_application && !has_problem {
        return SufficiencyAnalysis {
            sufficient: false,
            missing_params: vec!["problem"],
            completeness_score: 0.33,
            scenario: Scenario::ApplicationOnly,
            prompt_message: Some(
                "I see you mentioned an application method. What specific problem are \
                 you trying to solve?",
            ),
        };
    }

    SufficiencyAnalysis {
        sufficient: false,
        missing_params: vec!["problem"],
        completeness_score: 0.0,
        scenario: Scenario::Insufficient,
        prompt_message: Some(
            "To help you find the right products, could you tell me what problem \
             you're trying to solve with your crops?",
        ),
    }
}

/// Normalize scheme-relative catalog URLs to https.
fn normalize_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        url.to_string()
    }
}

/// Format catalog rows for context injection. Numbered entries, one block
/// per row, with document links last.
pub fn format_product_context(products: &[Product], timing_question: bool) -> String {
    if products.is_empty() {
        return "No specific products found for this query.".to_string();
    }

    let mut blocks = Vec::with_capacity(products.len());
    for (i, product) in products.iter().enumerate() {
        let mut lines = vec![
            format!("{}. {}", i + 1, product.product_name),
            format!(
                "   Crop: {}",
                product.crop.as_deref().unwrap_or("Not specified")
            ),
            format!(
                "   Application: {}",
                product.application.as_deref().unwrap_or("Not specified")
            ),
            format!(
                "   Growth Stage: {}",
                product.growth_stage.as_deref().unwrap_or("Not specified")
            ),
            format!(
                "   Problem: {}",
                product.problem.as_deref().unwrap_or("Not specified")
            ),
        ];

        if let Some(notes) = &product.notes {
            lines.push(format!("   Notes: {}", notes));
        }

        if timing_question && product.has_documents() {
            lines.push("   TIMING INFORMATION AVAILABLE in documents".to_string());
        }

        let mut docs = Vec::new();
        if let Some(url) = &product.directions {
            let name = if timing_question {
                "Application Directions"
            } else {
                "Product Directions"
            };
            docs.push(format!("{} - {}", name, normalize_url(url)));
        }
        if let Some(url) = &product.label {
            docs.push(format!("Product Label - {}", normalize_url(url)));
        }
        if let Some(url) = &product.msds {
            docs.push(format!("Safety Data - {}", normalize_url(url)));
        }
        if let Some(url) = &product.tech_doc {
            docs.push(format!("Technical Document - {}", normalize_url(url)));
        }

        if !docs.is_empty() {
            lines.push("   Documents:".to_string());
            for doc in docs {
                lines.push(format!("   - {}", doc));
            }
        }

        blocks.push(lines.join("\n"));
    }

    blocks.join("\n\n")
}

/// Format the known user context as a bullet list.
pub fn format_user_context(context: &MessageContext) -> String {
    let mut parts = Vec::new();
    if let Some(crop) = &context.crop {
        parts.push(format!("- Target Crop: {}", crop));
    }
    if let Some(location) = &context.location {
        parts.push(format!("- Location: {}", location));
    }
    if let Some(app_type) = &context.application_type {
        parts.push(format!("- Application Type: {}", app_type));
    }
    if let Some(problem) = &context.problem {
        parts.push(format!("- Problem: {}", problem));
    }
    if let Some(stage) = &context.growth_stage {
        parts.push(format!("- Growth Stage: {}", stage));
    }

    if parts.is_empty() {
        "General farming inquiry".to_string()
    } else {
        parts.join("\n")
    }
}

/// Scenario-specific guidance appended after the user context.
fn guidance_block(
    products: &[Product],
    context: &MessageContext,
    analysis: &SufficiencyAnalysis,
    ph_unified: bool,
) -> String {
    if context.timing_question {
        return format!(
            "TIMING QUESTION DETECTED - RESPONSE FORMAT:\n\
             1. Start with: \"For detailed application timing information, please check the \
             documentation for the following products that match your criteria:\"\n\
             2. List all {} products with crop, application details, growth stage and problem, \
             and include every documentation link (directions, labels, technical documents).\n\
             3. End with: \"These product documents contain specific timing schedules, \
             application frequencies, and seasonal recommendations for optimal results.\"",
            products.len()
        );
    }

    if products.is_empty() {
        let prompt_msg = analysis
            .prompt_message
            .unwrap_or("Could you tell me what specific problem you're trying to solve?");
        return format!(
            "NO PRODUCTS FOUND - PROVIDE HELPFUL GUIDANCE:\n\
             Respond with a friendly message that acknowledges the inquiry, asks: \"{}\" \
             and mentions that the catalog covers many different crops and problems. \
             Do not mention technical details or database searches.",
            prompt_msg
        );
    }

    if ph_unified {
        return format!(
            "PH ISSUES DETECTED - UNIFIED SOLUTION:\n\
             The user mentioned pH concerns that could mean acidic or alkaline soil. \
             The {} products below balance soil pH in both directions.\n\
             1. Start with: \"Great news! I found products that help balance soil pH whether \
             your soil is too acidic (low pH) or too alkaline (high pH).\"\n\
             2. Present each product, explaining its dual-purpose nature and how it buffers \
             soil pH naturally, with application instructions and timing.\n\
             3. Include all document links for each product.",
            products.len()
        );
    }

    match analysis.scenario {
        Scenario::ProductDirect => "PRODUCT DIRECT REQUEST:\n\
             Present the specific product(s) the user asked about with complete details, \
             benefits, application instructions and every document link."
            .to_string(),
        Scenario::CropOnly => format!(
            "CROP ONLY PROVIDED:\n\
             Show the available products for this crop, then ask: \"{}\" and explain that \
             knowing the specific problem or application method allows better recommendations.",
            analysis.prompt_message.unwrap_or_default()
        ),
        Scenario::ProblemFocused => format!(
            "PROBLEM FOCUSED REQUEST:\n\
             Present all {} products that address the problem with complete details and \
             application instructions, then ask: \"{}\"",
            products.len(),
            analysis.prompt_message.unwrap_or_default()
        ),
        Scenario::ProblemAndCrop => format!(
            "OPTIMAL CONTEXT PROVIDED:\n\
             Present all {} products that match the user's crop and problem with complete \
             details, benefits and application instructions, include every document link, \
             and explain the differences when several products are suitable.",
            products.len()
        ),
        Scenario::ApplicationOnly | Scenario::Insufficient => format!(
            "PARTIAL CONTEXT ({}% complete):\n\
             Present the matching products, then ask: \"{}\"",
            (analysis.completeness_score * 100.0).round() as i32,
            analysis
                .prompt_message
                .unwrap_or("Could you provide more details about what you need help with?")
        ),
    }
}

/// Assemble the complete system prompt.
pub fn build_system_prompt(
    products: &[Product],
    context: &MessageContext,
    analysis: &SufficiencyAnalysis,
    ph_unified: bool,
) -> String {
    let product_section = format_product_context(products, context.timing_question);
    let user_section = format!(
        "{}\n\n{}",
        format_user_context(context),
        guidance_block(products, context, analysis, ph_unified)
    );

    format!(
        "{}\nRELEVANT CATALOG PRODUCTS:\n{}\n\nUSER FARMING CONTEXT:\n{}\n\n{}",
        SYSTEM_PROMPT_BASE, product_section, user_section, SAFETY_GUIDELINES
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::context::extract_context;

    fn product(name: &str) -> Product {
        Product {
            product_name: name.to_string(),
            crop: Some("Potatoes".to_string()),
            application: Some("2-4L per ha".to_string()),
            application_type: Some("Foliar".to_string()),
            growth_stage: Some("Flowering".to_string()),
            problem: Some("Plant Nutrition".to_string()),
            directions: Some("//catalog.example.com/directions.pdf".to_string()),
            label: Some("https://catalog.example.com/label.pdf".to_string()),
            msds: None,
            tech_doc: None,
            notes: None,
            m_intervention: None,
        }
    }

    #[test]
    fn product_direct_scenario_is_fully_sufficient() {
        let ctx = extract_context("tell me about softcal");
        let analysis = analyze_context(&ctx);
        assert_eq!(analysis.scenario, Scenario::ProductDirect);
        assert!(analysis.sufficient);
        assert!(analysis.missing_params.is_empty());
    }

    #[test]
    fn crop_only_asks_for_more_detail() {
        let ctx = extract_context("I farm potatoes");
        let analysis = analyze_context(&ctx);
        assert_eq!(analysis.scenario, Scenario::CropOnly);
        assert!(!analysis.sufficient);
        assert!(analysis.missing_params.contains(&"problem"));
        assert!(analysis.prompt_message.is_some());
    }

    #[test]
    fn problem_without_crop_is_sufficient_but_prompts_for_crop() {
        let ctx = extract_context("I need help with soil salinity");
        let analysis = analyze_context(&ctx);
        assert_eq!(analysis.scenario, Scenario::ProblemFocused);
        assert!(analysis.sufficient);
        assert_eq!(analysis.missing_params, vec!["crop"]);
    }

    #[test]
    fn problem_and_crop_is_complete() {
        let ctx = extract_context("soil salinity in my tobacco lands");
        let analysis = analyze_context(&ctx);
        assert_eq!(analysis.scenario, Scenario::ProblemAndCrop);
        assert_eq!(analysis.completeness_score, 1.0);
    }

    #[test]
    fn empty_context_is_insufficient() {
        let ctx = extract_context("hello there");
        let analysis = analyze_context(&ctx);
        assert_eq!(analysis.scenario, Scenario::Insufficient);
        assert!(!analysis.sufficient);
    }

    #[test]
    fn product_context_normalizes_scheme_relative_urls() {
        let formatted = format_product_context(&[product("KelpBoost Plus")], false);
        assert!(formatted.contains("https://catalog.example.com/directions.pdf"));
        assert!(formatted.contains("Product Directions - https://"));
        assert!(!formatted.contains("- //catalog"));
    }

    #[test]
    fn timing_questions_mark_documented_products() {
        let formatted = format_product_context(&[product("KelpBoost Plus")], true);
        assert!(formatted.contains("TIMING INFORMATION AVAILABLE"));
        assert!(formatted.contains("Application Directions - "));
    }

    #[test]
    fn empty_catalog_yields_placeholder() {
        let formatted = format_product_context(&[], false);
        assert_eq!(formatted, "No specific products found for this query.");
    }

    #[test]
    fn system_prompt_contains_all_sections() {
        let ctx = extract_context("soil salinity in my tobacco lands");
        let analysis = analyze_context(&ctx);
        let prompt = build_system_prompt(&[product("SoftCal")], &ctx, &analysis, false);

        assert!(prompt.contains("RELEVANT CATALOG PRODUCTS:"));
        assert!(prompt.contains("USER FARMING CONTEXT:"));
        assert!(prompt.contains("- Target Crop: Field Tobacco"));
        assert!(prompt.contains("OPTIMAL CONTEXT PROVIDED"));
        assert!(prompt.contains("SAFETY REMINDERS"));
    }

    #[test]
    fn timing_guidance_takes_priority() {
        let mut ctx = extract_context("when should I spray my tobacco for soil salinity");
        assert!(ctx.timing_question);
        let analysis = analyze_context(&ctx);
        let prompt = build_system_prompt(&[product("SoftCal")], &ctx, &analysis, false);
        assert!(prompt.contains("TIMING QUESTION DETECTED"));

        ctx.timing_question = false;
        let prompt = build_system_prompt(&[product("SoftCal")], &ctx, &analysis, false);
        assert!(!prompt.contains("TIMING QUESTION DETECTED"));
    }
}
