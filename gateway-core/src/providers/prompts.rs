//! Prompts and reply decoding shared by the chat-style adapters
//!
//! Chat models are asked to answer in JSON; the reply is located inside
//! whatever prose or code fences surround it and decoded into the gateway's
//! types. Anything that does not decode is an [`AdapterError::Decode`].

use crate::protocol::types::clamp_unit;
use crate::protocol::{CategoryScore, Entity, KeywordScore, Operation, Options, QualityScore};
use crate::providers::error::{AdapterError, AdapterResult};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

pub const SYSTEM_PROMPT: &str =
    "You are a precise text-analysis service. Follow the output format exactly.";

/// Option key: sentence budget for summaries
pub const MAX_SENTENCES: &str = "max_sentences";
/// Option key: keyword budget
pub const MAX_KEYWORDS: &str = "max_keywords";

const DEFAULT_MAX_SENTENCES: u64 = 3;
const DEFAULT_MAX_KEYWORDS: u64 = 10;

/// Default completion budget per operation
pub fn default_max_tokens(operation: Operation) -> u64 {
    match operation {
        Operation::Summarize => 512,
        Operation::ExtractEntities | Operation::GenerateKeywords => 768,
        _ => 256,
    }
}

pub fn summarize(text: &str, options: &Options) -> String {
    let sentences = options
        .get_u64(MAX_SENTENCES)
        .unwrap_or(DEFAULT_MAX_SENTENCES);
    format!(
        "Summarize the following text in at most {} sentences. \
         Reply with the summary only.\n\nText:\n{}",
        sentences, text
    )
}

pub fn extract_entities(text: &str) -> String {
    format!(
        "Extract the named entities from the text below. Reply with a JSON array \
         of objects with the fields \"text\", \"type\" (PERSON, ORGANIZATION, \
         LOCATION, DATE or OTHER) and \"confidence\" between 0 and 1.\n\nText:\n{}",
        text
    )
}

pub fn classify(text: &str, categories: &[String]) -> String {
    format!(
        "Score how well the text below fits each of these categories: {}. \
         Reply with a JSON array of objects with the fields \"category\" and \
         \"score\" between 0 and 1.\n\nText:\n{}",
        serde_json::to_string(categories).unwrap_or_default(),
        text
    )
}

pub fn generate_keywords(text: &str, options: &Options) -> String {
    let limit = options
        .get_u64(MAX_KEYWORDS)
        .unwrap_or(DEFAULT_MAX_KEYWORDS);
    format!(
        "List up to {} keywords for the text below. Reply with a JSON array of \
         objects with the fields \"keyword\" and \"score\" between 0 and 1, most \
         relevant first.\n\nText:\n{}",
        limit, text
    )
}

pub fn score_quality(text: &str) -> String {
    format!(
        "Rate the writing quality of the text below. Reply with a JSON object \
         with the fields \"score\" between 0 and 1 and \"breakdown\", an object \
         scoring clarity, coherence, grammar and relevance between 0 and 1.\n\n\
         Text:\n{}",
        text
    )
}

/// Locate the JSON value in a model reply.
///
/// Accepts bare JSON, JSON in a fenced block, or JSON surrounded by prose.
pub fn extract_json(reply: &str) -> AdapterResult<Value> {
    let trimmed = reply.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let start = trimmed.find(['[', '{']);
    let end = trimmed.rfind([']', '}']);
    match (start, end) {
        (Some(start), Some(end)) if end > start => serde_json::from_str(&trimmed[start..=end])
            .map_err(|e| AdapterError::decode(format!("Model reply is not valid JSON: {}", e))),
        _ => Err(AdapterError::decode("Model reply contains no JSON")),
    }
}

/// Accept either a bare array or an object wrapping one array
fn as_array(value: Value, field: &str) -> AdapterResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove(field) {
            Some(Value::Array(items)) => Ok(items),
            _ => map
                .into_iter()
                .find_map(|(_, v)| match v {
                    Value::Array(items) => Some(items),
                    _ => None,
                })
                .ok_or_else(|| AdapterError::decode(format!("Expected a JSON array of {}", field))),
        },
        _ => Err(AdapterError::decode(format!("Expected a JSON array of {}", field))),
    }
}

fn decode_items<T: for<'de> Deserialize<'de>>(reply: &str, field: &str) -> AdapterResult<Vec<T>> {
    as_array(extract_json(reply)?, field)?
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(AdapterError::from))
        .collect()
}

#[derive(Deserialize)]
struct RawEntity {
    text: String,
    #[serde(rename = "type", alias = "entity_type")]
    entity_type: String,
    #[serde(default = "half")]
    confidence: f64,
}

fn half() -> f64 {
    0.5
}

pub fn decode_entities(reply: &str) -> AdapterResult<Vec<Entity>> {
    Ok(decode_items::<RawEntity>(reply, "entities")?
        .into_iter()
        .map(|e| Entity::new(e.text, e.entity_type, e.confidence))
        .collect())
}

/// Decode category scores, reported in the order the caller asked for.
///
/// Categories the model skipped score 0; ones it invented are dropped.
pub fn decode_categories(reply: &str, categories: &[String]) -> AdapterResult<Vec<CategoryScore>> {
    let scored: HashMap<String, f64> = decode_items::<CategoryScore>(reply, "categories")?
        .into_iter()
        .map(|c| (c.category.to_lowercase(), c.score))
        .collect();

    Ok(categories
        .iter()
        .map(|category| CategoryScore {
            category: category.clone(),
            score: clamp_unit(*scored.get(&category.to_lowercase()).unwrap_or(&0.0)),
        })
        .collect())
}

pub fn decode_keywords(reply: &str) -> AdapterResult<Vec<KeywordScore>> {
    Ok(decode_items::<KeywordScore>(reply, "keywords")?
        .into_iter()
        .filter(|k| !k.keyword.trim().is_empty())
        .map(|k| KeywordScore {
            keyword: k.keyword,
            score: clamp_unit(k.score),
        })
        .collect())
}

pub fn decode_quality(reply: &str) -> AdapterResult<QualityScore> {
    let mut quality: QualityScore = serde_json::from_value(extract_json(reply)?)?;
    quality.score = clamp_unit(quality.score);
    for value in quality.breakdown.values_mut() {
        *value = clamp_unit(*value);
    }
    Ok(quality)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_fenced_reply() {
        let reply = "Here you go:\n```json\n[{\"keyword\": \"rust\", \"score\": 0.9}]\n```";
        let keywords = decode_keywords(reply).unwrap();
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords[0].keyword, "rust");
    }

    #[test]
    fn test_reply_without_json_is_decode_error() {
        assert!(matches!(
            extract_json("I cannot help with that."),
            Err(AdapterError::Decode { .. })
        ));
    }

    #[test]
    fn test_entities_accept_wrapped_array_and_clamp() {
        let reply = r#"{"entities": [{"text": "Ada Lovelace", "type": "PERSON", "confidence": 1.4},
                        {"text": "London", "type": "LOCATION"}]}"#;
        let entities = decode_entities(reply).unwrap();
        assert_eq!(entities[0].confidence, 1.0);
        assert_eq!(entities[1].confidence, 0.5);
        assert_eq!(entities[1].entity_type, "LOCATION");
    }

    #[test]
    fn test_categories_follow_requested_order() {
        let reply = r#"[{"category": "Sports", "score": 0.8}, {"category": "cooking", "score": 0.3}]"#;
        let categories = vec!["news".to_string(), "sports".to_string()];
        let scores = decode_categories(reply, &categories).unwrap();

        assert_eq!(scores[0].category, "news");
        assert_eq!(scores[0].score, 0.0);
        assert_eq!(scores[1].category, "sports");
        assert_eq!(scores[1].score, 0.8);
    }

    #[test]
    fn test_quality_scores_clamped() {
        let reply = r#"{"score": 1.2, "breakdown": {"clarity": -0.1, "grammar": 0.9}}"#;
        let quality = decode_quality(reply).unwrap();
        assert_eq!(quality.score, 1.0);
        assert_eq!(quality.breakdown["clarity"], 0.0);
        assert_eq!(quality.breakdown["grammar"], 0.9);
    }

    #[test]
    fn test_prompt_options() {
        let options = Options::new().with(MAX_SENTENCES, 1).with(MAX_KEYWORDS, 4);
        assert!(summarize("t", &options).contains("at most 1 sentences"));
        assert!(generate_keywords("t", &options).contains("up to 4 keywords"));
        assert!(classify("t", &["a".to_string()]).contains("[\"a\"]"));
    }
}
