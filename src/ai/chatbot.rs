// src/ai/chatbot.rs
use super::{AiAssistant, MAX_INPUT_CHARS};
use crate::models::ai::{ChatTurn, ChatbotReply, ResponseSource};

const MAX_HISTORY_TURNS: usize = 10;

const PROPERTY_REPLY: &str = "I can help you find a home! Browse the Properties page to filter listings by city, \
price and bedrooms, or use the MLS search to see what's on the market right now. Save the homes you like and \
message the listing agent directly from any property page.";
const FINANCING_REPLY: &str = "For financing, start with a mortgage pre-approval so you know your budget. Our \
Financing page compares lenders by rate range and minimum down payment, and you can contact them directly from there.";
const SERVICES_REPLY: &str = "Our service marketplace lists vetted inspectors, appraisers, contractors and other \
experts. Open the Services page to compare ratings and book an appointment.";
const VALUATION_REPLY: &str = "To estimate what a home is worth, try our Comparative Market Analysis (CMA) tool. It \
compares the property with similar homes nearby and gives you a value range.";
const GENERIC_REPLY: &str = "I'm having trouble reaching our assistant right now. I can still point you to \
properties, financing options, service providers or a home value estimate. What would you like to explore?";

impl AiAssistant {
    /// Answers a marketplace help-desk question.
    pub async fn chat(&self, message: &str, history: &[ChatTurn]) -> ChatbotReply {
        let prompt = build_chat_prompt(message, history);

        match self.complete(&prompt).await {
            Ok(reply) => ChatbotReply {
                response: reply.trim().to_string(),
                source: ResponseSource::Ai,
            },
            Err(e) => {
                tracing::warn!("Chatbot upstream failed: {}. Using keyword fallback", e);
                ChatbotReply {
                    response: fallback_reply(message).to_string(),
                    source: ResponseSource::Fallback,
                }
            }
        }
    }
}

fn build_chat_prompt(message: &str, history: &[ChatTurn]) -> String {
    let mut prompt = String::from(
        "You are the friendly assistant of a real estate marketplace. You help users browse properties, \
         find service providers such as inspectors and contractors, compare financing options and understand \
         the buying and selling process. Keep answers short and practical. If you are unsure, suggest contacting \
         a licensed professional.\n\n",
    );

    let skip = history.len().saturating_sub(MAX_HISTORY_TURNS);
    for turn in history.iter().skip(skip) {
        let speaker = match turn.role.as_str() {
            "assistant" | "model" | "bot" => "Assistant",
            _ => "User",
        };
        let content: String = turn.content.trim().chars().take(MAX_INPUT_CHARS).collect();
        prompt.push_str(&format!("{}: {}\n", speaker, content));
    }

    prompt.push_str(&format!("User: {}\nAssistant:", message.trim()));
    prompt
}

/// Canned answer picked by keyword when the model is unavailable.
pub(crate) fn fallback_reply(message: &str) -> &'static str {
    let text = message.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| text.contains(w));

    if mentions(&["property", "house", "home", "listing", "apartment", "condo"]) {
        PROPERTY_REPLY
    } else if mentions(&["mortgage", "loan", "financ", "rate", "down payment"]) {
        FINANCING_REPLY
    } else if mentions(&["expert", "inspect", "service", "contractor", "plumber", "electrician"]) {
        SERVICES_REPLY
    } else if mentions(&["price", "value", "worth", "cma", "apprais"]) {
        VALUATION_REPLY
    } else {
        GENERIC_REPLY
    }
}
