//! Response schemas passed to the model in JSON mode
//!
//! Written in the OpenAPI subset the Gemini API accepts.

use serde_json::{json, Value};

fn string() -> Value {
    json!({ "type": "STRING" })
}

fn strings() -> Value {
    json!({ "type": "ARRAY", "items": string() })
}

fn array_of(item: Value) -> Value {
    json!({ "type": "ARRAY", "items": item })
}

fn related_word() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "word": string(),
            "pos": string(),
            "meaning": string(),
            "examples": strings()
        },
        "required": ["word", "pos", "meaning"]
    })
}

pub fn word_details() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "word": string(),
            "pronunciation": string(),
            "definitions": array_of(json!({
                "type": "OBJECT",
                "properties": {
                    "partOfSpeech": string(),
                    "commonMeanings": string(),
                    "meanings": array_of(json!({
                        "type": "OBJECT",
                        "properties": {
                            "meaning": string(),
                            "examples": strings()
                        },
                        "required": ["meaning", "examples"]
                    }))
                },
                "required": ["partOfSpeech", "commonMeanings", "meanings"]
            }))
        },
        "required": ["word", "pronunciation", "definitions"]
    })
}

pub fn grammar_quiz() -> Value {
    array_of(json!({
        "type": "OBJECT",
        "properties": {
            "question": string(),
            "questionTranslation": string(),
            "options": strings(),
            "correctAnswer": string(),
            "explanation": string(),
            "relatedTheory": string()
        },
        "required": ["question", "questionTranslation", "options", "correctAnswer", "explanation", "relatedTheory"]
    }))
}

pub fn error_correction_quiz() -> Value {
    array_of(json!({
        "type": "OBJECT",
        "properties": {
            "sentence": string(),
            "errorTarget": string(),
            "correctForm": string(),
            "translation": string(),
            "explanation": string(),
            "relatedTheory": string()
        },
        "required": ["sentence", "errorTarget", "correctForm", "translation", "explanation", "relatedTheory"]
    }))
}

pub fn nuance_quiz() -> Value {
    array_of(json!({
        "type": "OBJECT",
        "properties": {
            "contextQuestion": string(),
            "options": array_of(json!({
                "type": "OBJECT",
                "properties": { "text": string(), "nuance": string() },
                "required": ["text", "nuance"]
            })),
            "correctOptionIndex": { "type": "INTEGER" },
            "explanation": string(),
            "topic": string()
        },
        "required": ["contextQuestion", "options", "correctOptionIndex", "explanation", "topic"]
    }))
}

pub fn assessment() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "generalComment": string(),
            "strengths": strings(),
            "weaknesses": strings(),
            "advice": string()
        },
        "required": ["generalComment", "strengths", "weaknesses", "advice"]
    })
}

pub fn writing_check() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "isCorrect": { "type": "BOOLEAN" },
            "feedback": string()
        },
        "required": ["isCorrect", "feedback"]
    })
}

pub fn exam_question() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "id": string(),
            "type": string(),
            "context": string(),
            "subQuestions": array_of(json!({
                "type": "OBJECT",
                "properties": {
                    "id": string(),
                    "questionText": string(),
                    "options": strings(),
                    "correctAnswer": string(),
                    "explanation": string()
                }
            })),
            "arrangementItems": strings(),
            "correctArrangement": strings(),
            "explanation": string()
        },
        "required": ["id", "type", "context"]
    })
}

pub fn translation_feedback() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "score": { "type": "NUMBER" },
            "generalComment": string(),
            "specificCorrections": array_of(json!({
                "type": "OBJECT",
                "properties": {
                    "originalPhrase": string(),
                    "correctedPhrase": string(),
                    "explanation": string()
                }
            })),
            "correctedVersion": string(),
            "highlights": strings()
        },
        "required": ["score", "generalComment", "correctedVersion"]
    })
}

pub fn writing_feedback() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "score": { "type": "NUMBER" },
            "correctedText": string(),
            "grammarMistakes": array_of(json!({
                "type": "OBJECT",
                "properties": {
                    "original": string(),
                    "correction": string(),
                    "explanation": string()
                }
            })),
            "vocabularySuggestions": strings(),
            "generalComment": string()
        },
        "required": ["score", "correctedText", "generalComment"]
    })
}

pub fn vocab_module() -> Value {
    array_of(json!({
        "type": "OBJECT",
        "properties": {
            "word": string(),
            "pronunciation": string(),
            "meaning": string(),
            "examples": strings(),
            "synonyms": array_of(related_word()),
            "antonyms": array_of(related_word())
        },
        "required": ["word", "pronunciation", "meaning", "examples"]
    }))
}

pub fn grammar_lesson() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": string(),
            "description": string(),
            "content": string(),
            "examples": strings()
        },
        "required": ["title", "description", "content", "examples"]
    })
}
