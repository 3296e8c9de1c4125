//! Object detection through an external vision model.
//!
//! The detector never fails. Each reply is interpreted by a fixed chain of
//! strategies and the one that produced the objects is reported alongside them:
//!
//! 1. call failed or reply empty -> placeholder objects
//! 2. reply is JSON but not a usable array -> placeholder objects
//! 3. reply is not JSON -> keyword scan over the raw text
//! 4. otherwise -> the valid array elements, in reply order

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::vision_client::{VisionModel, VisionRequest};

pub const UNCATEGORIZED: &str = "Uncategorized";
pub const KEYWORD_CONFIDENCE: f64 = 0.8;
pub const MAX_KEYWORD_MATCHES: usize = 8;
pub const PLACEHOLDER_CONFIDENCE: f64 = 0.5;

const DETECTION_PROMPT: &str = "Analyze this image and identify all visible objects in it. \
Be comprehensive and specific. For each object, include:\n\n\
1. The name of the object\n\
2. A confidence score between 0 and 1\n\
3. A brief description of the object's appearance\n\
4. The category it belongs to (e.g., furniture, electronic, food, clothing, etc.)\n\n\
Respond ONLY with a valid JSON array containing objects with this exact structure:\n\
[{\"name\": \"object_name\", \"confidence\": 0.95, \"description\": \"brief description\", \"category\": \"object_category\"}]\n\n\
Do not include any explanations, markdown formatting, or text outside of the JSON array.";

/// Nouns looked for when the model answers in prose. Order is the output order.
const COMMON_OBJECTS: &[&str] = &[
    "person", "people", "man", "woman", "child", "baby",
    "car", "vehicle", "bicycle", "motorcycle", "bus", "truck",
    "tree", "plant", "flower", "grass", "leaf",
    "building", "house", "window", "door", "wall",
    "table", "chair", "sofa", "bed", "desk",
    "phone", "computer", "laptop", "screen", "keyboard",
    "book", "paper", "pen", "pencil",
    "cup", "glass", "bottle", "plate", "bowl",
    "food", "fruit", "apple", "banana", "orange",
    "dog", "cat", "bird", "animal",
    "sky", "cloud", "sun", "moon", "star",
    "water", "river", "lake", "ocean", "beach",
    "mountain", "hill", "rock", "stone",
    "road", "street", "path", "bridge",
    "light", "lamp", "candle", "fire",
    "bag", "backpack", "suitcase", "box",
    "clock", "watch", "mirror", "picture",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub name: String,
    pub confidence: f64,
    pub description: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderReason {
    NotConfigured,
    CallFailed(String),
    EmptyReply,
    InvalidShape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionStrategy {
    Structured,
    KeywordScan,
    Placeholder(PlaceholderReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub objects: Vec<DetectedObject>,
    pub strategy: DetectionStrategy,
}

impl Detection {
    fn placeholder(reason: PlaceholderReason) -> Self {
        Self {
            objects: placeholder_objects(),
            strategy: DetectionStrategy::Placeholder(reason),
        }
    }
}

pub struct ObjectDetector {
    model: Option<Arc<dyn VisionModel>>,
}

impl ObjectDetector {
    pub fn new(model: Option<Arc<dyn VisionModel>>) -> Self {
        Self { model }
    }

    pub async fn detect(&self, bytes: &[u8], mime_type: &str) -> Detection {
        let Some(model) = &self.model else {
            warn!("Vision model not configured, using placeholder objects");
            return Detection::placeholder(PlaceholderReason::NotConfigured);
        };

        let request = VisionRequest {
            prompt: DETECTION_PROMPT.to_string(),
            image_data_uri: to_data_uri(bytes, mime_type),
        };

        match model.complete(request).await {
            Ok(content) => interpret_reply(&content),
            Err(e) => {
                warn!("Vision API call failed, using placeholder objects: {}", e);
                Detection::placeholder(PlaceholderReason::CallFailed(e.to_string()))
            }
        }
    }
}

pub fn to_data_uri(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// Turns the raw model reply into detected objects.
pub fn interpret_reply(content: &str) -> Detection {
    let cleaned = strip_code_fence(content);
    if cleaned.is_empty() {
        warn!("Vision API returned an empty reply");
        return Detection::placeholder(PlaceholderReason::EmptyReply);
    }

    match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Array(items)) => {
            let total = items.len();
            let objects: Vec<DetectedObject> = items.iter().filter_map(parse_object).collect();
            if total > 0 && objects.is_empty() {
                warn!("Vision API reply has no usable objects");
                return Detection::placeholder(PlaceholderReason::InvalidShape);
            }
            if objects.len() < total {
                debug!("Dropped {} malformed objects", total - objects.len());
            }
            Detection {
                objects,
                strategy: DetectionStrategy::Structured,
            }
        }
        Ok(_) => {
            warn!("Vision API reply is JSON but not an array");
            Detection::placeholder(PlaceholderReason::InvalidShape)
        }
        Err(e) => {
            warn!("Vision API reply is not JSON ({}), scanning text", e);
            Detection {
                objects: scan_keywords(content),
                strategy: DetectionStrategy::KeywordScan,
            }
        }
    }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let body = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        return trimmed;
    };
    let body = body.trim();
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn parse_object(value: &Value) -> Option<DetectedObject> {
    let object = value.as_object()?;
    let name = object.get("name")?.as_str()?;
    let confidence = object.get("confidence")?.as_f64()?;
    if !(0.0..=1.0).contains(&confidence) {
        return None;
    }

    Some(DetectedObject {
        name: name.to_string(),
        confidence,
        description: object
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        category: object
            .get("category")
            .and_then(Value::as_str)
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(UNCATEGORIZED)
            .to_string(),
    })
}

/// Case-insensitive substring scan over [`COMMON_OBJECTS`].
pub fn scan_keywords(text: &str) -> Vec<DetectedObject> {
    let lower = text.to_lowercase();
    COMMON_OBJECTS
        .iter()
        .filter(|word| lower.contains(*word))
        .take(MAX_KEYWORD_MATCHES)
        .map(|word| DetectedObject {
            name: word.to_string(),
            confidence: KEYWORD_CONFIDENCE,
            description: format!("Detected {} in the image", word),
            category: UNCATEGORIZED.to_string(),
        })
        .collect()
}

pub fn placeholder_objects() -> Vec<DetectedObject> {
    ["unknown_object_1", "unknown_object_2"]
        .iter()
        .map(|name| DetectedObject {
            name: name.to_string(),
            confidence: PLACEHOLDER_CONFIDENCE,
            description: "Object detected but not identified".to_string(),
            category: UNCATEGORIZED.to_string(),
        })
        .collect()
}
