//! Maps provider response shapes onto stable result types

use serde_json::{Map, Value};
use tracing::debug;

use crate::core::errors::{ProxyError, Result};
use crate::core::models::{
    TokenizationMode, TokenizationOutput, TokenizationResult, TranslationResult,
};

/// Task name reported with tokenization results
pub const SIMILARITY_TASK: &str = "sentence-similarity";

const TOKEN_KEYS: &[&str] = &["token", "token_str", "word"];
const ID_KEYS: &[&str] = &["id", "token_id", "ids"];

/// Tokenization shapes the provider is known to return
#[derive(Debug, Clone, PartialEq)]
pub enum TokenizationPayload {
    /// Tokens paired with opaque ids
    TokenAndIdList {
        tokens: Vec<String>,
        ids: Vec<Value>,
    },
    /// One similarity score per compared sentence
    SimilarityScores(Vec<f64>),
    /// No known shape matched
    RawPassthrough(Value),
}

fn contract(message: impl Into<String>) -> ProxyError {
    ProxyError::ContractViolation {
        message: message.into(),
    }
}

/// Extract the translation from a provider response
pub fn normalize_translation(raw: &Value) -> Result<TranslationResult> {
    let entry = match raw {
        Value::Array(items) => items
            .first()
            .ok_or_else(|| contract("Provider returned an empty translation array"))?,
        Value::Object(_) => raw,
        other => {
            return Err(contract(format!(
                "Unexpected translation response: {}",
                other
            )))
        }
    };

    let translation_text = entry
        .get("translation_text")
        .and_then(Value::as_str)
        .ok_or_else(|| contract("No translation_text in provider response"))?;

    if translation_text.is_empty() {
        return Err(contract("Provider returned an empty translation"));
    }

    Ok(TranslationResult {
        translation_text: translation_text.to_string(),
    })
}

fn first_key<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key))
}

/// Token/id pairs from a list of objects, if every element has both
fn token_pairs(items: &[Value]) -> Option<(Vec<String>, Vec<Value>)> {
    let mut tokens = Vec::with_capacity(items.len());
    let mut ids = Vec::with_capacity(items.len());

    for item in items {
        let object = item.as_object()?;
        let token = first_key(object, TOKEN_KEYS)?.as_str()?;
        let id = first_key(object, ID_KEYS)?;
        if !(id.is_number() || id.is_array()) {
            return None;
        }
        tokens.push(token.to_string());
        ids.push(id.clone());
    }

    Some((tokens, ids))
}

/// Parallel `tokens` / `ids` arrays on one object
fn token_columns(object: &Map<String, Value>) -> Option<(Vec<String>, Vec<Value>)> {
    let tokens = object
        .get("tokens")?
        .as_array()?
        .iter()
        .map(|t| t.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()?;
    let ids = first_key(object, &["ids", "input_ids"])?.as_array()?.clone();
    Some((tokens, ids))
}

/// Decide which tokenization shape the provider returned
pub fn classify_tokenization(raw: Value) -> Result<TokenizationPayload> {
    let known = match &raw {
        Value::Array(items) if items.is_empty() => None,
        Value::Array(items) if items.iter().all(Value::is_number) => Some(
            TokenizationPayload::SimilarityScores(items.iter().filter_map(Value::as_f64).collect()),
        ),
        Value::Array(items) => token_pairs(items)
            .map(|(tokens, ids)| TokenizationPayload::TokenAndIdList { tokens, ids }),
        Value::Object(object) if object.contains_key("error") => {
            return Err(contract(format!("Provider reported an error: {}", raw)));
        }
        Value::Object(object) => token_columns(object)
            .map(|(tokens, ids)| TokenizationPayload::TokenAndIdList { tokens, ids }),
        _ => None,
    };

    Ok(known.unwrap_or(TokenizationPayload::RawPassthrough(raw)))
}

/// Build a tokenization result for `text` from a provider response
pub fn normalize_tokenization(text: &str, model: &str, raw: Value) -> Result<TokenizationResult> {
    let (output, mode) = match classify_tokenization(raw)? {
        TokenizationPayload::TokenAndIdList { tokens, ids } => (
            TokenizationOutput::Tokens { tokens, ids },
            TokenizationMode::TokenIds,
        ),
        TokenizationPayload::SimilarityScores(scores) => (
            TokenizationOutput::Tokens {
                tokens: vec![text.to_string()],
                ids: scores.into_iter().map(Value::from).collect(),
            },
            TokenizationMode::SimilarityScores,
        ),
        TokenizationPayload::RawPassthrough(result) => {
            (TokenizationOutput::Raw { result }, TokenizationMode::Raw)
        }
    };

    debug!("Tokenization normalized as {}", mode);

    Ok(TokenizationResult {
        output,
        mode,
        model: model.to_string(),
        task: SIMILARITY_TASK.to_string(),
        input: text.to_string(),
        success: true,
    })
}
