use std::time::Duration;

use chrono::Utc;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::error::{MarkbookError, Result};
use crate::models::{AnswerSubmission, MarkedSubmission, MarkingResult, Question, Submission};

#[derive(Debug, Clone)]
pub struct MarkerConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_ms: u64,
}

impl MarkerConfig {
    /// Marking is opt-in: without `MARKBOOK_MARKER_URL` the application
    /// still runs and every evaluation takes the zero-score fallback path.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("MARKBOOK_MARKER_URL").ok()?;
        let model = std::env::var("MARKBOOK_MARKER_MODEL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "gemini-2.0-flash".to_string());
        let timeout_ms = std::env::var("MARKBOOK_MARKER_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30_000);

        Some(Self {
            endpoint,
            api_key: std::env::var("MARKBOOK_MARKER_API_KEY").ok(),
            model,
            timeout_ms,
        })
    }
}

/// HTTP client for the external marking model, speaking the common
/// chat-completion wire shape.
#[derive(Clone)]
pub struct Marker {
    config: MarkerConfig,
    http: Client,
}

impl std::fmt::Debug for Marker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Marker")
            .field("endpoint", &self.config.endpoint)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl Marker {
    pub fn new(config: MarkerConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                MarkbookError::Validation(format!("invalid MARKBOOK_MARKER_API_KEY: {e}"))
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self { config, http })
    }

    #[must_use]
    pub fn config(&self) -> &MarkerConfig {
        &self.config
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
        });
        let resp = self.http.post(&self.config.endpoint).json(&body).send()?;
        if !resp.status().is_success() {
            return Err(MarkbookError::Internal(format!(
                "marker endpoint returned status {}",
                resp.status()
            )));
        }
        let value = resp.json::<Value>()?;
        extract_model_content(&value).ok_or_else(|| {
            MarkbookError::Internal("marker response carried no content".to_string())
        })
    }

    /// Score one answer against its model answer. Errors stay internal:
    /// the contract is a usable result for every answer, so any transport
    /// or parse failure degrades to zero marks with an explanation.
    #[must_use]
    pub fn evaluate_answer(&self, question: &Question, student_answer: &str) -> MarkingResult {
        match self.try_evaluate_answer(question, student_answer) {
            Ok(result) => result,
            Err(_) => fallback_result(question),
        }
    }

    fn try_evaluate_answer(
        &self,
        question: &Question,
        student_answer: &str,
    ) -> Result<MarkingResult> {
        let prompt = evaluation_prompt(question, student_answer);
        let text = self.complete(&prompt)?;
        let fragment = extract_json_fragment(&text).ok_or_else(|| {
            MarkbookError::Validation("no JSON object in marker reply".to_string())
        })?;
        let evaluation: Value = serde_json::from_str(&fragment)?;

        let score = evaluation
            .get("score")
            .and_then(score_from_value)
            .ok_or_else(|| MarkbookError::Validation("marker reply missing score".to_string()))?;
        let feedback = evaluation
            .get("feedback")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("No feedback provided")
            .to_string();

        Ok(MarkingResult {
            question_id: question.id.clone(),
            score: score.min(question.marks),
            max_marks: question.marks,
            feedback,
        })
    }

    fn overall_feedback(&self, total: u32, max: u32, results: &[MarkingResult]) -> String {
        let prompt = summary_prompt(total, max, results);
        self.complete(&prompt)
            .map(|text| text.trim().to_string())
            .ok()
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| default_overall_feedback(total, max))
    }
}

/// Mark a whole submission. With no configured marker every answer takes
/// the fallback path; the endpoint therefore always produces a complete
/// `MarkedSubmission` and never propagates a collaborator failure.
#[must_use]
pub fn mark_submission(
    marker: Option<&Marker>,
    questions: &[Question],
    submission: &Submission,
) -> MarkedSubmission {
    let results: Vec<MarkingResult> = submission
        .answers
        .iter()
        .map(|answer| mark_answer(marker, questions, answer))
        .collect();

    let total_score = results.iter().map(|r| r.score).sum();
    let max_score = results.iter().map(|r| r.max_marks).sum();
    let feedback = match marker {
        Some(marker) => marker.overall_feedback(total_score, max_score, &results),
        None => default_overall_feedback(total_score, max_score),
    };

    MarkedSubmission {
        submission_id: submission.id.clone(),
        results,
        total_score,
        max_score,
        feedback,
        marked_at: Utc::now().to_rfc3339(),
    }
}

fn mark_answer(
    marker: Option<&Marker>,
    questions: &[Question],
    answer: &AnswerSubmission,
) -> MarkingResult {
    let Some(question) = questions.iter().find(|q| q.id == answer.question_id) else {
        return MarkingResult {
            question_id: answer.question_id.clone(),
            score: 0,
            max_marks: 0,
            feedback: "Question not found".to_string(),
        };
    };
    match marker {
        Some(marker) => marker.evaluate_answer(question, &answer.answer),
        None => fallback_result(question),
    }
}

fn fallback_result(question: &Question) -> MarkingResult {
    MarkingResult {
        question_id: question.id.clone(),
        score: 0,
        max_marks: question.marks,
        feedback: "The answer could not be evaluated automatically. Please try again.".to_string(),
    }
}

#[must_use]
pub fn default_overall_feedback(total: u32, max: u32) -> String {
    format!("Overall score: {total}/{max}. Keep practicing to improve your understanding.")
}

fn evaluation_prompt(question: &Question, student_answer: &str) -> String {
    format!(
        "You are an expert marker for academic assignments. Evaluate the student answer \
         against the model answer.\n\n\
         Question: {}\n\
         Maximum Marks: {}\n\
         Model Answer: {}\n\
         Student Answer: {}\n\n\
         Consider correctness, completeness, terminology, and clarity of reasoning.\n\
         Return ONLY a JSON object of the form \
         {{\"score\": <number between 0 and {}>, \"feedback\": \"<explanation>\"}}",
        question.text, question.marks, question.answer, student_answer, question.marks
    )
}

fn summary_prompt(total: u32, max: u32, results: &[MarkingResult]) -> String {
    let mut lines = String::new();
    for result in results {
        lines.push_str(&format!(
            "- Question {}: {}/{}\n",
            result.question_id, result.score, result.max_marks
        ));
    }
    format!(
        "As an academic evaluator, write a brief overall feedback for a student who scored \
         {total} out of {max}.\n\nIndividual question performances:\n{lines}\n\
         Keep it to 2-3 encouraging sentences naming strengths and areas for improvement."
    )
}

/// Pull the assistant text out of the common completion-response shapes
/// (chat `message.content`, OpenAI-style `choices[0].message.content`, and
/// bare `response`).
#[must_use]
pub fn extract_model_content(value: &Value) -> Option<String> {
    if let Some(content) = value
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
    {
        return Some(content.to_string());
    }
    if let Some(content) = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
    {
        return Some(content.to_string());
    }
    if let Some(content) = value.get("response").and_then(Value::as_str) {
        return Some(content.to_string());
    }
    None
}

/// Slice the first `{`/`[` through the last `}`/`]` out of a model reply,
/// which may wrap its JSON in prose or code fences.
#[must_use]
pub fn extract_json_fragment(text: &str) -> Option<String> {
    let start = text
        .char_indices()
        .find(|(_, c)| *c == '{' || *c == '[')
        .map(|(idx, _)| idx)?;
    let sliced = &text[start..];
    let end = sliced
        .char_indices()
        .rev()
        .find(|(_, c)| *c == '}' || *c == ']')
        .map(|(idx, c)| idx + c.len_utf8())?;
    Some(sliced[..end].to_string())
}

/// Models return scores as integers or floats; negatives clamp to zero.
fn score_from_value(value: &Value) -> Option<u32> {
    if let Some(raw) = value.as_u64() {
        return Some(u32::try_from(raw).unwrap_or(u32::MAX));
    }
    if let Some(raw) = value.as_i64() {
        return Some(if raw <= 0 {
            0
        } else {
            u32::try_from(raw).unwrap_or(u32::MAX)
        });
    }
    if let Some(raw) = value.as_f64()
        && raw.is_finite()
    {
        let rounded = raw.round().clamp(0.0, f64::from(u32::MAX));
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "value is pre-clamped to the representable non-negative u32 range"
        )]
        return Some(rounded as u32);
    }
    None
}
