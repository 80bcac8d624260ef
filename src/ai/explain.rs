// src/ai/explain.rs
//! Plain-language explanations of real estate terms.

use super::AiAssistant;
use crate::models::ai::{Explanation, ResponseSource};
use regex::Regex;
use serde_json::Value;

const MAX_CONTEXT_CHARS: usize = 1000;
const MAX_RELATED_TERMS: usize = 8;

lazy_static::lazy_static! {
    static ref JSON_FENCE: Regex = Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").unwrap();
    static ref SECTION_LABEL: Regex = Regex::new(
        r"(?im)^[ \t]*(?:#{1,6}[ \t]*|\d+[.)][ \t]*|[-*•][ \t]*)?(definition|meaning|implications?|why it matters|what it means for you|related terms?|related concepts|see also)[ \t]*[:\-–][ \t]*"
    ).unwrap();
    static ref LIST_MARKER: Regex = Regex::new(r"^(?:[-*•]|\d+[.)])\s*").unwrap();
}

struct GlossaryEntry {
    keys: &'static [&'static str],
    definition: &'static str,
    implications: &'static str,
    related: &'static [&'static str],
}

const GLOSSARY: &[GlossaryEntry] = &[
    GlossaryEntry {
        keys: &["cma", "comparative market analysis"],
        definition: "A comparative market analysis estimates a home's value from the recent sale prices of similar nearby properties.",
        implications: "Sellers use it to set a list price and buyers to judge whether an offer is reasonable; it is an estimate, not an appraisal.",
        related: &["Appraisal", "Comparables", "List price"],
    },
    GlossaryEntry {
        keys: &["mls", "multiple listing service"],
        definition: "The Multiple Listing Service is the shared database where licensed agents publish properties for sale in a region.",
        implications: "Most listings you see online come from the MLS, so status and price changes there drive what buyers see.",
        related: &["IDX", "Listing agent", "Days on market"],
    },
    GlossaryEntry {
        keys: &["escrow"],
        definition: "Escrow is a neutral third party holding funds and documents until every condition of the sale has been met.",
        implications: "Your deposit and closing funds are protected until closing; after closing, an escrow account may also collect taxes and insurance.",
        related: &["Earnest money", "Closing", "Title company"],
    },
    GlossaryEntry {
        keys: &["contingency", "contingencies"],
        definition: "A contingency is a condition in the purchase contract that must be satisfied for the sale to go through.",
        implications: "Inspection, financing and appraisal contingencies let a buyer withdraw without losing the deposit if the condition fails.",
        related: &["Inspection", "Appraisal contingency", "Financing contingency"],
    },
    GlossaryEntry {
        keys: &["earnest money", "earnest money deposit", "emd"],
        definition: "Earnest money is the deposit a buyer makes with an offer to show the seller they are serious.",
        implications: "It is usually credited toward closing costs, but it can be forfeited if the buyer backs out outside the contract's contingencies.",
        related: &["Escrow", "Contingency", "Purchase agreement"],
    },
    GlossaryEntry {
        keys: &["closing costs"],
        definition: "Closing costs are the fees and expenses paid to finalize a real estate transaction, beyond the purchase price.",
        implications: "Buyers typically pay 2-5% of the loan amount for lender, title and government fees, so budget for them alongside the down payment.",
        related: &["Loan estimate", "Closing disclosure", "Title insurance"],
    },
    GlossaryEntry {
        keys: &["appraisal"],
        definition: "An appraisal is a licensed appraiser's independent opinion of a property's market value.",
        implications: "Lenders base the loan on it; a low appraisal can force a price renegotiation or a larger down payment.",
        related: &["CMA", "Appraisal gap", "Loan-to-value"],
    },
    GlossaryEntry {
        keys: &["pmi", "private mortgage insurance"],
        definition: "Private mortgage insurance protects the lender when a conventional loan has less than 20% down.",
        implications: "It adds a monthly cost until you reach roughly 20% equity, at which point it can usually be removed.",
        related: &["Down payment", "Loan-to-value", "Conventional loan"],
    },
    GlossaryEntry {
        keys: &["pre-approval", "preapproval", "mortgage pre-approval"],
        definition: "A pre-approval is a lender's conditional commitment to lend up to a stated amount after reviewing your finances.",
        implications: "Sellers take pre-approved buyers more seriously, and it tells you the realistic price range to shop in.",
        related: &["Pre-qualification", "Debt-to-income ratio", "Loan estimate"],
    },
    GlossaryEntry {
        keys: &["hoa", "homeowners association", "homeowners' association"],
        definition: "A homeowners association manages shared areas and enforces rules in a community, funded by owners' dues.",
        implications: "Dues add to monthly costs and the association's rules can limit renovations, rentals or exterior changes.",
        related: &["CC&Rs", "Special assessment", "Condominium"],
    },
    GlossaryEntry {
        keys: &["title insurance"],
        definition: "Title insurance protects the owner or lender against losses from defects in the property's ownership history.",
        implications: "A one-time premium at closing covers claims such as undisclosed liens or recording errors discovered later.",
        related: &["Title search", "Lien", "Deed"],
    },
    GlossaryEntry {
        keys: &["equity", "home equity"],
        definition: "Equity is the share of a property you own outright: its market value minus what you still owe on it.",
        implications: "Equity grows as you pay down the loan and as values rise, and it can be borrowed against or realized when you sell.",
        related: &["Loan-to-value", "HELOC", "Appreciation"],
    },
];

impl AiAssistant {
    /// Explains `term`, optionally in the context of a document excerpt.
    pub async fn explain_term(&self, term: &str, context: Option<&str>) -> Explanation {
        let term = term.trim();
        let prompt = build_explain_prompt(term, context);

        match self.complete(&prompt).await {
            Ok(reply) => {
                if let Some(explanation) = parse_structured(term, &reply) {
                    return explanation;
                }
                tracing::info!("Explanation for '{}' was not valid JSON, using heuristic parser", term);
                parse_heuristic(term, &reply)
            }
            Err(e) => {
                tracing::warn!("Explain-term upstream failed for '{}': {}. Using fallback", term, e);
                fallback_explanation(term)
            }
        }
    }
}

fn build_explain_prompt(term: &str, context: Option<&str>) -> String {
    let context_clause = match context.map(str::trim).filter(|c| !c.is_empty()) {
        Some(ctx) => {
            let excerpt: String = ctx.chars().take(MAX_CONTEXT_CHARS).collect();
            format!(" as it is used in this document excerpt:\n\"\"\"\n{}\n\"\"\"\n", excerpt)
        }
        None => String::new(),
    };

    format!(
        "You are a real estate expert helping home buyers and sellers understand terminology.\n\
         Explain the term \"{term}\"{context_clause}.\n\
         Respond with only a JSON object of the form \
         {{\"definition\": \"...\", \"implications\": \"...\", \"relatedTerms\": [\"...\"]}}.\n\
         definition: the plain-language meaning in two or three sentences.\n\
         implications: what it means in practice for a buyer or seller.\n\
         relatedTerms: up to five related real estate terms."
    )
}

/// Accepts a bare JSON object, one wrapped in a ```json fence, or one embedded in prose.
pub(crate) fn parse_structured(term: &str, reply: &str) -> Option<Explanation> {
    let candidate = match JSON_FENCE.captures(reply) {
        Some(caps) => caps.get(1)?.as_str().to_string(),
        None => {
            let start = reply.find('{')?;
            let end = reply.rfind('}')?;
            if end <= start {
                return None;
            }
            reply[start..=end].to_string()
        }
    };

    let value: Value = serde_json::from_str(&candidate).ok()?;
    let definition = text_field(&value, &["definition", "meaning"])?;
    let implications = text_field(&value, &["implications", "implication", "whyItMatters"])?;

    let related_terms = ["relatedTerms", "related_terms", "related"]
        .iter()
        .find_map(|key| value.get(*key))
        .map(|v| match v {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect::<Vec<_>>(),
            Value::String(s) => split_terms(s),
            _ => Vec::new(),
        })
        .unwrap_or_default();

    Some(Explanation {
        term: term.to_string(),
        definition,
        implications,
        related_terms: clean_terms(related_terms),
        source: ResponseSource::Ai,
    })
}

fn text_field(value: &Value, keys: &[&str]) -> Option<String> {
    let raw = keys.iter().find_map(|key| value.get(*key))?;
    let text = match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(" "),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Recovers labelled sections ("Definition:", "Implications:", "Related terms:")
/// from a free-text reply. Always yields non-empty definition and implications.
pub(crate) fn parse_heuristic(term: &str, reply: &str) -> Explanation {
    let text = reply.replace("**", "").replace("__", "");

    let labels: Vec<(String, usize, usize)> = SECTION_LABEL
        .captures_iter(&text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let label = caps.get(1)?.as_str().to_lowercase();
            Some((label, whole.start(), whole.end()))
        })
        .collect();

    let mut definition = None;
    let mut implications = None;
    let mut related_terms = Vec::new();

    for (i, (label, _, body_start)) in labels.iter().enumerate() {
        let body_end = labels.get(i + 1).map(|(_, start, _)| *start).unwrap_or(text.len());
        let body = text[*body_start..body_end].trim();
        if body.is_empty() {
            continue;
        }

        if label == "definition" || label == "meaning" {
            definition.get_or_insert_with(|| collapse_whitespace(body));
        } else if label.starts_with("implication") || label == "why it matters" || label == "what it means for you" {
            implications.get_or_insert_with(|| collapse_whitespace(body));
        } else {
            related_terms.extend(split_terms(body));
        }
    }

    let paragraphs: Vec<String> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty() && !p.starts_with('{') && !SECTION_LABEL.is_match(p))
        .map(|p| collapse_whitespace(p.trim_start_matches('#').trim()))
        .collect();

    let definition = definition
        .or_else(|| paragraphs.first().cloned())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| generic_definition(term));
    let implications = implications
        .or_else(|| paragraphs.get(1).cloned())
        .filter(|i| !i.is_empty())
        .unwrap_or_else(|| generic_implications(term));

    Explanation {
        term: term.to_string(),
        definition,
        implications,
        related_terms: clean_terms(related_terms),
        source: ResponseSource::Heuristic,
    }
}

pub(crate) fn fallback_explanation(term: &str) -> Explanation {
    let normalized = term.trim().to_lowercase();
    match GLOSSARY.iter().find(|entry| entry.keys.contains(&normalized.as_str())) {
        Some(entry) => Explanation {
            term: term.to_string(),
            definition: entry.definition.to_string(),
            implications: entry.implications.to_string(),
            related_terms: entry.related.iter().map(|s| s.to_string()).collect(),
            source: ResponseSource::Fallback,
        },
        None => Explanation {
            term: term.to_string(),
            definition: generic_definition(term),
            implications: generic_implications(term),
            related_terms: Vec::new(),
            source: ResponseSource::Fallback,
        },
    }
}

fn generic_definition(term: &str) -> String {
    format!(
        "\"{}\" is a real estate term whose exact meaning depends on the transaction and local practice.",
        term
    )
}

fn generic_implications(term: &str) -> String {
    format!(
        "Review how \"{}\" applies to your contract or listing with your agent, lender or attorney before relying on it.",
        term
    )
}

fn split_terms(body: &str) -> Vec<String> {
    body.split(|c| c == ',' || c == ';' || c == '\n')
        .map(|t| LIST_MARKER.replace(t.trim(), "").trim().trim_end_matches('.').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn clean_terms(terms: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::new();
    for term in terms {
        let term = term.trim().to_string();
        if term.is_empty() || term.len() > 60 {
            continue;
        }
        if cleaned.iter().any(|t| t.eq_ignore_ascii_case(&term)) {
            continue;
        }
        cleaned.push(term);
        if cleaned.len() == MAX_RELATED_TERMS {
            break;
        }
    }
    cleaned
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::test_support::{assistant, StubGenerator};

    fn assert_complete(explanation: &Explanation) {
        assert!(!explanation.definition.trim().is_empty());
        assert!(!explanation.implications.trim().is_empty());
    }

    #[tokio::test]
    async fn test_structured_reply_is_used_directly() {
        let reply = r#"```json
{"definition": "Money held by a neutral party.", "implications": "Protects both sides.", "relatedTerms": ["Earnest money", "Closing"]}
```"#;
        let ai = assistant(StubGenerator::Reply(reply.to_string()));
        let explanation = ai.explain_term("Escrow", None).await;

        assert_eq!(explanation.source, ResponseSource::Ai);
        assert_eq!(explanation.definition, "Money held by a neutral party.");
        assert_eq!(explanation.related_terms, vec!["Earnest money", "Closing"]);
    }

    #[tokio::test]
    async fn test_free_text_reply_goes_through_heuristic_parser() {
        let reply = "**Definition:** A contingency is a condition that must be met.\n\n\
                     **Implications:** Buyers can walk away if it fails.\n\n\
                     **Related terms:** Inspection, Appraisal, Financing";
        let ai = assistant(StubGenerator::Reply(reply.to_string()));
        let explanation = ai.explain_term("Contingency", None).await;

        assert_eq!(explanation.source, ResponseSource::Heuristic);
        assert_eq!(explanation.definition, "A contingency is a condition that must be met.");
        assert_eq!(explanation.implications, "Buyers can walk away if it fails.");
        assert_eq!(explanation.related_terms, vec!["Inspection", "Appraisal", "Financing"]);
    }

    #[tokio::test]
    async fn test_timeout_falls_back_with_complete_fields() {
        let ai = assistant(StubGenerator::Hang);
        let explanation = ai.explain_term("CMA", None).await;

        assert_eq!(explanation.source, ResponseSource::Fallback);
        assert_complete(&explanation);
        assert!(!explanation.related_terms.is_empty());
    }

    #[tokio::test]
    async fn test_upstream_error_falls_back_for_unknown_term() {
        let ai = assistant(StubGenerator::Fail);
        let explanation = ai.explain_term("Riparian rights", Some("the parcel borders a creek")).await;

        assert_eq!(explanation.source, ResponseSource::Fallback);
        assert_complete(&explanation);
        assert!(explanation.related_terms.is_empty());
        assert!(explanation.definition.contains("Riparian rights"));
    }

    #[test]
    fn test_heuristic_uses_paragraphs_without_labels() {
        let reply = "Escrow means a third party holds the money.\n\nIt keeps the deposit safe until closing.";
        let explanation = parse_heuristic("Escrow", reply);
        assert_eq!(explanation.definition, "Escrow means a third party holds the money.");
        assert_eq!(explanation.implications, "It keeps the deposit safe until closing.");
        assert!(explanation.related_terms.is_empty());
    }

    #[test]
    fn test_heuristic_never_returns_empty_fields() {
        let explanation = parse_heuristic("HOA", "Definition:\n\nImplications:");
        assert_complete(&explanation);
    }

    #[test]
    fn test_heuristic_splits_bulleted_related_terms() {
        let reply = "Definition: The share you own.\nImplications: It can be borrowed against.\nRelated terms:\n- HELOC\n- Loan-to-value\n- heloc";
        let explanation = parse_heuristic("Equity", reply);
        assert_eq!(explanation.related_terms, vec!["HELOC", "Loan-to-value"]);
    }

    #[test]
    fn test_structured_requires_both_fields() {
        assert!(parse_structured("x", r#"{"definition": "only this"}"#).is_none());
        assert!(parse_structured("x", "no json here").is_none());
    }

    #[test]
    fn test_glossary_matches_aliases_case_insensitively() {
        let explanation = fallback_explanation("Private Mortgage Insurance");
        assert!(explanation.definition.contains("20%"));
        assert_eq!(explanation.term, "Private Mortgage Insurance");
    }
}
