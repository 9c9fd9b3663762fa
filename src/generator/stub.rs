use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use parking_lot::Mutex;

use crate::{
    error::ServiceError,
    generator::{GenerationParams, ModelInfo, ResponseGenerator, word_tokens},
};

pub const STUB_MODEL_ID: &str = "minivault-stubbed";

/// Prompt categories, in match priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Technical,
    Creative,
    Question,
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Technical => "technical",
            Category::Creative => "creative",
            Category::Question => "question",
            Category::General => "general",
        }
    }
}

/// Keyword sets evaluated in fixed priority order; the question category
/// additionally matches a trailing question mark. First hit wins, no hit
/// falls through to general.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Technical,
        &[
            "function",
            "code",
            "implement",
            "algorithm",
            "technical",
            "api",
            "database",
            "system",
        ],
    ),
    (
        Category::Creative,
        &["story", "creative", "imagine", "write", "poem", "fiction"],
    ),
    (
        Category::Question,
        &["what", "how", "why", "when", "where", "explain"],
    ),
];

pub fn categorize(prompt: &str) -> Category {
    let lower = prompt.to_lowercase();
    for (category, keywords) in CATEGORY_KEYWORDS {
        let hit = keywords.iter().any(|k| lower.contains(k))
            || (*category == Category::Question && lower.trim_end().ends_with('?'));
        if hit {
            return *category;
        }
    }
    Category::General
}

const TECHNICAL_TEMPLATES: &[&str] = &[
    "Here's a technical explanation of {topic}: {explanation}",
    "From a technical perspective, {topic} involves {details}",
    "The implementation of {topic} typically requires {requirements}",
    "Key technical considerations for {topic} include {considerations}",
];

const CREATIVE_TEMPLATES: &[&str] = &[
    "Let me paint a picture of {concept}: {description}",
    "Imagine {scenario} where {details}",
    "In a world where {premise}, {story}",
    "Picture this: {creative_response}",
];

const QUESTION_TEMPLATES: &[&str] = &[
    "That's an excellent question about {subject}. {answer}",
    "To address your question about {topic}: {response}",
    "Great question! Regarding {subject}, {explanation}",
    "Your question touches on {area}. Here's my perspective: {answer}",
];

const GENERAL_TEMPLATES: &[&str] = &[
    "Based on your prompt about {topic}, {response}",
    "Regarding {subject}, here are some key points: {details}",
    "Your request about {topic} brings up {considerations}",
    "In response to your query about {subject}: {answer}",
];

const TECHNICAL_FILLERS: &[(&str, &str)] = &[
    ("topic", "the technical implementation"),
    (
        "explanation",
        "a systematic approach involving careful design and robust architecture",
    ),
    (
        "details",
        "proper planning, scalable design patterns, and thorough testing",
    ),
    (
        "requirements",
        "understanding of core principles, appropriate tools, and best practices",
    ),
    (
        "considerations",
        "performance optimization, security measures, and maintainability",
    ),
];

const CREATIVE_FILLERS: &[(&str, &str)] = &[
    ("concept", "a vivid narrative"),
    ("description", "rich details that bring the story to life"),
    ("scenario", "creativity meets inspiration"),
    ("details", "characters develop and plots unfold naturally"),
    ("premise", "imagination knows no bounds"),
    ("story", "every word contributes to a compelling tale"),
    (
        "creative_response",
        "a unique perspective that captures the essence of your request",
    ),
];

const QUESTION_FILLERS: &[(&str, &str)] = &[
    ("subject", "your inquiry"),
    (
        "answer",
        "comprehensive information that addresses your specific needs",
    ),
    ("topic", "the subject you've raised"),
    ("response", "detailed insights based on established knowledge"),
    ("explanation", "clear reasoning and practical examples"),
    (
        "area",
        "an important domain that requires careful consideration",
    ),
];

const GENERAL_FILLERS: &[(&str, &str)] = &[
    ("topic", "your request"),
    ("response", "thoughtful analysis and relevant information"),
    ("subject", "the matter at hand"),
    (
        "details",
        "key insights, practical considerations, and actionable recommendations",
    ),
    (
        "considerations",
        "multiple perspectives and potential approaches",
    ),
    (
        "answer",
        "a well-rounded response that addresses your needs effectively",
    ),
];

const COMPLEXITY_SUFFIX: &str =
    " Given the complexity of your request, there are several additional angles worth exploring.";
const QUESTION_SUFFIX: &str = " I hope this answers your question.";
const GENERIC_SUFFIX: &str = " Let me know if you'd like me to elaborate on any part of this.";

fn category_templates(category: Category) -> (&'static [&'static str], &'static [(&'static str, &'static str)]) {
    match category {
        Category::Technical => (TECHNICAL_TEMPLATES, TECHNICAL_FILLERS),
        Category::Creative => (CREATIVE_TEMPLATES, CREATIVE_FILLERS),
        Category::Question => (QUESTION_TEMPLATES, QUESTION_FILLERS),
        Category::General => (GENERAL_TEMPLATES, GENERAL_FILLERS),
    }
}

fn fill_template(template: &str, fillers: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in fillers {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

fn suffix_for(prompt: &str) -> &'static str {
    if prompt.chars().count() > 100 {
        COMPLEXITY_SUFFIX
    } else if prompt.contains('?') {
        QUESTION_SUFFIX
    } else {
        GENERIC_SUFFIX
    }
}

/// Template-based generator used when no backend is configured. Template
/// choice is the only randomized step; the RNG is seedable so tests can pin
/// the outcome.
pub struct StubGenerator {
    rng: Mutex<fastrand::Rng>,
    stream_delay: Duration,
    loaded_at: DateTime<Utc>,
}

impl StubGenerator {
    pub fn new(stream_delay: Duration) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
            stream_delay,
            loaded_at: Utc::now(),
        }
    }

    pub fn seeded(seed: u64, stream_delay: Duration) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
            stream_delay,
            loaded_at: Utc::now(),
        }
    }

    pub fn render(&self, prompt: &str) -> String {
        let category = categorize(prompt);
        let (templates, fillers) = category_templates(category);
        let index = self.rng.lock().usize(..templates.len());
        let mut text = fill_template(templates[index], fillers);
        text.push_str(suffix_for(prompt));
        text
    }
}

#[async_trait]
impl ResponseGenerator for StubGenerator {
    fn model_id(&self) -> &str {
        STUB_MODEL_ID
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            model_type: "stubbed".to_string(),
            model_name: "intelligent_stubbed_responses".to_string(),
            loaded_at: self.loaded_at,
            status: "active".to_string(),
            capabilities: vec![
                "text_generation".to_string(),
                "streaming".to_string(),
                "category_based_responses".to_string(),
            ],
        }
    }

    async fn generate(
        &self,
        prompt: &str,
        _params: GenerationParams,
    ) -> Result<String, ServiceError> {
        Ok(self.render(prompt))
    }

    fn generate_stream(
        &self,
        prompt: String,
        params: GenerationParams,
    ) -> BoxStream<'static, String> {
        let tokens = word_tokens(&self.render(&prompt), Some(params.max_tokens as usize));
        let delay = self.stream_delay;
        Box::pin(async_stream::stream! {
            for token in tokens {
                yield token;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        })
    }
}
